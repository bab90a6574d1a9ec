//! CLI client for plugin host operations.
//!
//! One-shot commands: connect to the host, perform a single request,
//! print the result, and exit. Because the adapter lives in the host,
//! lifecycle guards persist across client invocations.

mod format;
mod plugin_client;

use std::path::PathBuf;

use crate::cli::ClientAction;
use plugin_client::PluginClient;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The host answered with an error response.
    #[error("{reason}{}", .detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
    Plugin {
        reason: String,
        detail: Option<String>,
    },
    #[error("connection: {0}")]
    Connection(String),
}

/// Run the client command against the host at `socket`.
pub async fn run(socket: Option<PathBuf>, action: ClientAction) -> Result<(), ClientError> {
    let socket_path = crate::ipc::resolve_socket_path(socket).ok_or_else(|| {
        ClientError::Connection("$XDG_RUNTIME_DIR is not set and no --socket was given".into())
    })?;
    let mut plugin = PluginClient::connect(&socket_path).await?;

    match action {
        ClientAction::Initialize => {
            plugin.initialize().await?;
            format::print_ack(plugin.plugin(), "initialize");
        }
        ClientAction::LoadStart => {
            plugin.load_start().await?;
            format::print_ack(plugin.plugin(), "load-start");
        }
        ClientAction::LoadStop => {
            plugin.load_stop().await?;
            format::print_ack(plugin.plugin(), "load-stop");
        }
        ClientAction::ShowFullScreen { placement } => {
            let result = plugin.show_full_screen_ad(&placement).await?;
            format::print_show_result(&placement, &result);
        }
        ClientAction::ShowRewarded { ad_type, placement } => {
            let result = plugin.show_rewarded_ad(&ad_type, &placement).await?;
            format::print_show_result(&placement, &result);
        }
    }

    Ok(())
}
