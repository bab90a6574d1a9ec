//! Plugin host: serves the adapter to an out-of-process mediation host.
//!
//! Listens on a Unix domain socket. Every connection speaks the
//! MessagePack protocol in [`crate::ipc`], and all connections share a
//! single [`FbInstantAdapter`], so initialization guards and the ad
//! instance cache are process-wide.
//!
//! The served adapter is backed by the sandbox SDK, whose outcomes are
//! scripted from the command line.

mod connection;
mod handler;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};

use connection::ConnectionId;
use handler::HostContext;

use crate::adapter::FbInstantAdapter;
use crate::sdk::{InstantSdk, SdkError};
use crate::sdk::sandbox::{OutcomePlan, SandboxScriptLoader, SandboxSdk};

/// Host startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("$XDG_RUNTIME_DIR is not set and no --socket was given")]
    NoRuntimeDir,
    #[error("plugin host already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host configuration, assembled from the command line.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Explicit socket path; defaults to `$XDG_RUNTIME_DIR/fbinstant/plugin.sock`.
    pub socket: Option<PathBuf>,
    /// `(placement, code)` pairs whose acquisition fails.
    pub acquire_errors: Vec<(String, String)>,
    /// `(placement, code)` pairs whose preload fails.
    pub preload_errors: Vec<(String, String)>,
    /// `(placement, code)` pairs whose present fails.
    pub present_errors: Vec<(String, String)>,
    /// Hold each acquisition pending this long.
    pub acquire_delay: Option<Duration>,
    /// Make SDK script loading fail.
    pub offline: bool,
}

impl HostConfig {
    /// Build the sandbox outcome plan. An empty code means a failure
    /// without a structured code.
    fn outcome_plan(&self) -> OutcomePlan {
        let failure = |stage: &str, code: &str| {
            let message = format!("sandbox {stage} failure");
            if code.is_empty() {
                SdkError::uncoded(message)
            } else {
                SdkError::with_code(code, message)
            }
        };

        let mut plan = OutcomePlan::new();
        for (placement, code) in &self.acquire_errors {
            plan = plan.fail_acquire(placement.as_str(), failure("acquire", code));
        }
        for (placement, code) in &self.preload_errors {
            plan = plan.fail_preload(placement.as_str(), failure("preload", code));
        }
        for (placement, code) in &self.present_errors {
            plan = plan.fail_present(placement.as_str(), failure("present", code));
        }
        plan
    }
}

/// Run the plugin host until SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns `HostError` if no socket path can be resolved, socket bind
/// fails, or another host is already running on the socket.
pub async fn run(config: HostConfig) -> Result<(), HostError> {
    let socket_path =
        crate::ipc::resolve_socket_path(config.socket.clone()).ok_or(HostError::NoRuntimeDir)?;

    let mut sdk = SandboxSdk::new(config.outcome_plan());
    if let Some(delay) = config.acquire_delay {
        sdk = sdk.with_acquire_delay(delay);
    }
    let host = Arc::new(HostContext::new(
        FbInstantAdapter::new(Arc::new(sdk)),
        Arc::new(SandboxScriptLoader::new(config.offline)),
    ));

    let listener = bind_socket(&socket_path).await?;
    tracing::info!(
        path = %socket_path.display(),
        plugin = host.adapter.name(),
        "plugin host listening"
    );

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(listener, host, shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    tracing::info!("plugin host stopped");
    Ok(())
}

/// Accept connections until `shutdown` resolves.
async fn serve<S: InstantSdk>(
    listener: UnixListener,
    host: Arc<HostContext<S>>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _addr)) => {
                    let conn_id = ConnectionId::allocate();
                    connection::spawn_connection(stream, conn_id, Arc::clone(&host));
                    tracing::debug!(?conn_id, "accepted connection");
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
            () = &mut shutdown => break,
        }
    }
}

/// Create the socket directory if missing and bind the Unix listener.
///
/// If the path is in use, a successful connect means another host is
/// running; otherwise the socket is stale and is replaced.
async fn bind_socket(path: &Path) -> Result<UnixListener, HostError> {
    // Only a directory created here is made private; an existing parent keeps its mode.
    if let Some(parent) = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        let mkdir_failed = |e: std::io::Error| HostError::MkdirFailed {
            path: parent.to_path_buf(),
            source: e,
        };
        std::fs::create_dir_all(parent).map_err(mkdir_failed)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                .map_err(mkdir_failed)?;
        }
    }

    let bind_failed = |e: std::io::Error| HostError::BindFailed {
        path: path.to_path_buf(),
        source: e,
    };

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(HostError::AlreadyRunning(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio::sync::oneshot;
    use tokio_util::codec::Framed;

    use crate::adapter::{ErrorReason, ShowResult};
    use crate::ipc::codec::LengthPrefixedCodec;
    use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status};

    type Conn = Framed<UnixStream, LengthPrefixedCodec>;

    /// Start a host on `path` with the given config's sandbox plan.
    /// Returns the shared SDK (for call-count assertions) and a shutdown
    /// trigger.
    async fn start_host(
        path: &Path,
        config: HostConfig,
    ) -> (Arc<SandboxSdk>, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let mut sdk = SandboxSdk::new(config.outcome_plan());
        if let Some(delay) = config.acquire_delay {
            sdk = sdk.with_acquire_delay(delay);
        }
        let sdk = Arc::new(sdk);
        let host = Arc::new(HostContext::new(
            FbInstantAdapter::new(Arc::clone(&sdk)),
            Arc::new(SandboxScriptLoader::new(config.offline)),
        ));
        let listener = bind_socket(path).await.unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, host, async move {
            let _ = stop_rx.await;
        }));
        (sdk, stop_tx, task)
    }

    async fn connect(path: &Path) -> Conn {
        let stream = UnixStream::connect(path).await.unwrap();
        Framed::new(stream, LengthPrefixedCodec::new())
    }

    async fn send_recv(conn: &mut Conn, msg: Message) -> Message {
        conn.send(msg).await.unwrap();
        conn.next().await.unwrap().unwrap()
    }

    async fn handshake(conn: &mut Conn) {
        let ack = send_recv(
            conn,
            Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
            },
        )
        .await;
        match ack {
            Message::HelloAck {
                status: Status::Ok,
                plugin,
                ..
            } => assert_eq!(plugin.as_deref(), Some("facebookinstant")),
            other => panic!("handshake failed: {other:?}"),
        }
    }

    fn error_reason(msg: &Message) -> Option<&str> {
        match msg {
            Message::Response {
                status: Status::Error,
                error,
                ..
            } => error.as_deref(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn full_plugin_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let config = HostConfig {
            preload_errors: vec![("empty".into(), "ADS_NO_FILL".into())],
            present_errors: vec![("broken".into(), String::new())],
            ..HostConfig::default()
        };
        let (sdk, _stop, _task) = start_host(&sock, config).await;

        let mut conn = connect(&sock).await;
        handshake(&mut conn).await;

        assert_eq!(
            send_recv(&mut conn, Message::Initialize { id: 1 }).await,
            Message::ok(1)
        );
        let resp = send_recv(&mut conn, Message::Initialize { id: 2 }).await;
        assert_eq!(error_reason(&resp), Some("double_initialization"));

        assert_eq!(
            send_recv(&mut conn, Message::LoadStart { id: 3 }).await,
            Message::ok(3)
        );
        assert_eq!(
            send_recv(&mut conn, Message::LoadStop { id: 4 }).await,
            Message::ok(4)
        );

        let resp = send_recv(
            &mut conn,
            Message::ShowFullScreenAd {
                id: 5,
                placement_id: "ok".into(),
            },
        )
        .await;
        assert_eq!(resp, Message::show_result(5, ShowResult::shown()));

        let resp = send_recv(
            &mut conn,
            Message::ShowRewardedAd {
                id: 6,
                ad_type: "video".into(),
                placement_id: "empty".into(),
            },
        )
        .await;
        assert_eq!(
            resp,
            Message::show_result(6, ShowResult::not_shown(ErrorReason::NoAdAvailable))
        );

        let resp = send_recv(
            &mut conn,
            Message::ShowFullScreenAd {
                id: 7,
                placement_id: "broken".into(),
            },
        )
        .await;
        assert_eq!(error_reason(&resp), Some("sdk_failure"));

        let resp = send_recv(
            &mut conn,
            Message::ShowRewardedAd {
                id: 8,
                ad_type: "bogus".into(),
                placement_id: "ok".into(),
            },
        )
        .await;
        assert_eq!(error_reason(&resp), Some("unsupported_ad_type"));

        // ok, empty, broken: one acquisition each; bogus never reached the SDK.
        assert_eq!(sdk.acquisitions(), 3);
    }

    #[tokio::test]
    async fn guards_are_shared_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let (_sdk, _stop, _task) = start_host(&sock, HostConfig::default()).await;

        let mut first = connect(&sock).await;
        handshake(&mut first).await;
        assert_eq!(
            send_recv(&mut first, Message::Initialize { id: 1 }).await,
            Message::ok(1)
        );

        let mut second = connect(&sock).await;
        handshake(&mut second).await;
        let resp = send_recv(&mut second, Message::Initialize { id: 1 }).await;
        assert_eq!(error_reason(&resp), Some("double_initialization"));
    }

    #[tokio::test]
    async fn pipelined_same_placement_shows_acquire_once() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let config = HostConfig {
            acquire_delay: Some(Duration::from_millis(50)),
            ..HostConfig::default()
        };
        let (sdk, _stop, _task) = start_host(&sock, config).await;

        let mut conn = connect(&sock).await;
        handshake(&mut conn).await;

        // Send both requests before reading either response.
        for id in [1, 2] {
            conn.send(Message::ShowRewardedAd {
                id,
                ad_type: "interstitial".into(),
                placement_id: "p".into(),
            })
            .await
            .unwrap();
        }

        let mut ids = Vec::new();
        for _ in 0..2 {
            match conn.next().await.unwrap().unwrap() {
                Message::Response {
                    id,
                    status: Status::Ok,
                    result: Some(result),
                    ..
                } => {
                    assert!(result.did_show_ad());
                    ids.push(id);
                }
                other => panic!("unexpected response: {other:?}"),
            }
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(sdk.acquisitions(), 1);
    }

    #[tokio::test]
    async fn version_mismatch_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let (_sdk, _stop, _task) = start_host(&sock, HostConfig::default()).await;

        let mut conn = connect(&sock).await;
        let resp = send_recv(
            &mut conn,
            Message::Hello {
                id: 0,
                version: 999,
            },
        )
        .await;
        match resp {
            Message::HelloAck { status, error, .. } => {
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("version_mismatch"));
            }
            other => panic!("expected HelloAck error, got {other:?}"),
        }

        assert!(conn.next().await.is_none(), "expected connection closed");
    }

    #[tokio::test]
    async fn non_hello_first_message_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let (sdk, _stop, _task) = start_host(&sock, HostConfig::default()).await;

        let mut conn = connect(&sock).await;
        conn.send(Message::ShowFullScreenAd {
            id: 1,
            placement_id: "p".into(),
        })
        .await
        .unwrap();

        let next = conn.next().await;
        assert!(next.is_none(), "expected connection closed, got {next:?}");
        assert_eq!(sdk.acquisitions(), 0);
    }

    #[tokio::test]
    async fn unknown_type_returns_error_keeps_connection() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let (_sdk, _stop, _task) = start_host(&sock, HostConfig::default()).await;

        let mut conn = connect(&sock).await;
        handshake(&mut conn).await;

        #[derive(serde::Serialize)]
        struct FakeMsg {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let payload = rmp_serde::to_vec_named(&FakeMsg {
            msg_type: "show_banner",
            id: 42,
        })
        .unwrap();
        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        conn.get_mut().write_all(&frame).await.unwrap();

        let resp = conn.next().await.unwrap().unwrap();
        match &resp {
            Message::Response { id, .. } => assert_eq!(*id, 42),
            other => panic!("expected Response, got {other:?}"),
        }
        assert_eq!(error_reason(&resp), Some("unknown_type"));

        // Connection is still usable.
        assert_eq!(
            send_recv(&mut conn, Message::LoadStart { id: 43 }).await,
            Message::ok(43)
        );
    }

    #[tokio::test]
    async fn shutdown_stops_accept_loop() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let (_sdk, stop, task) = start_host(&sock, HostConfig::default()).await;

        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");

        // Bind and drop a listener; the socket file stays behind.
        drop(UnixListener::bind(&sock).unwrap());
        assert!(sock.exists());

        let listener = bind_socket(&sock).await.unwrap();
        drop(listener);
    }

    #[tokio::test]
    async fn live_socket_is_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let _live = bind_socket(&sock).await.unwrap();

        let err = bind_socket(&sock).await.unwrap_err();
        assert!(matches!(err, HostError::AlreadyRunning(p) if p == sock));
    }

    #[tokio::test]
    async fn bind_creates_private_parent_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("fbinstant").join("plugin.sock");
        let _listener = bind_socket(&sock).await.unwrap();

        let mode = std::fs::metadata(sock.parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn bind_leaves_existing_parent_mode_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared");
        std::fs::create_dir(&shared).unwrap();
        std::fs::set_permissions(&shared, std::fs::Permissions::from_mode(0o1777)).unwrap();

        let _listener = bind_socket(&shared.join("plugin.sock")).await.unwrap();

        let mode = std::fs::metadata(&shared).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o1777);
    }

    #[tokio::test]
    async fn outcome_plan_maps_empty_code_to_uncoded() {
        let config = HostConfig {
            present_errors: vec![("p".into(), String::new())],
            preload_errors: vec![("q".into(), "ADS_NO_FILL".into())],
            ..HostConfig::default()
        };
        // The plan is opaque; exercise it through the sandbox.
        let sdk = SandboxSdk::new(config.outcome_plan());

        let p = sdk.get_interstitial_ad_async("p").await.unwrap();
        p.load_async().await.unwrap();
        assert_eq!(p.show_async().await.unwrap_err().code, None);

        let q = sdk.get_interstitial_ad_async("q").await.unwrap();
        let err = q.load_async().await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ADS_NO_FILL"));
    }
}
