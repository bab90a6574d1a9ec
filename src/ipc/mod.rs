//! IPC codec and wire protocol: MessagePack framing between the
//! mediation host and the plugin process.

pub mod codec;
pub mod protocol;

use std::path::PathBuf;

/// Resolve the plugin socket path.
///
/// An explicit path wins; otherwise `$XDG_RUNTIME_DIR/fbinstant/plugin.sock`.
/// Returns `None` when neither is available.
pub fn resolve_socket_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        std::env::var_os("XDG_RUNTIME_DIR")
            .map(|dir| PathBuf::from(dir).join("fbinstant").join("plugin.sock"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/tmp/custom.sock");
        assert_eq!(resolve_socket_path(Some(explicit.clone())), Some(explicit));
    }
}
