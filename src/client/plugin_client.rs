//! Plugin client: one-shot requests against a running plugin host.
//!
//! Connects, performs the handshake, then issues requests one at a time;
//! each response must echo the request `id`.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::adapter::ShowResult;
use crate::ipc::codec::LengthPrefixedCodec;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status};

use super::ClientError;

pub struct PluginClient {
    framed: Framed<UnixStream, LengthPrefixedCodec>,
    next_id: u32,
    plugin: String,
}

impl PluginClient {
    /// Connect to the host at `socket_path` and perform the handshake.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            ClientError::Connection(format!("connect {}: {e}", socket_path.display()))
        })?;
        let mut framed = Framed::new(stream, LengthPrefixedCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
            })
            .await
            .map_err(|e| ClientError::Connection(format!("send hello: {e}")))?;

        let plugin = match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok,
                plugin,
                ..
            })) => plugin.unwrap_or_default(),
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(ClientError::Connection(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Connection(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        };

        Ok(Self {
            framed,
            next_id: 1, // 0 = Hello
            plugin,
        })
    }

    /// Plugin name announced in the handshake.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub async fn initialize(&mut self) -> Result<(), ClientError> {
        self.call(|id| Message::Initialize { id }).await.map(drop)
    }

    pub async fn load_start(&mut self) -> Result<(), ClientError> {
        self.call(|id| Message::LoadStart { id }).await.map(drop)
    }

    pub async fn load_stop(&mut self) -> Result<(), ClientError> {
        self.call(|id| Message::LoadStop { id }).await.map(drop)
    }

    pub async fn show_full_screen_ad(&mut self, placement_id: &str) -> Result<ShowResult, ClientError> {
        let result = self
            .call(|id| Message::ShowFullScreenAd {
                id,
                placement_id: placement_id.to_string(),
            })
            .await?;
        result.ok_or_else(|| ClientError::Connection("response carried no show result".into()))
    }

    pub async fn show_rewarded_ad(
        &mut self,
        ad_type: &str,
        placement_id: &str,
    ) -> Result<ShowResult, ClientError> {
        let result = self
            .call(|id| Message::ShowRewardedAd {
                id,
                ad_type: ad_type.to_string(),
                placement_id: placement_id.to_string(),
            })
            .await?;
        result.ok_or_else(|| ClientError::Connection("response carried no show result".into()))
    }

    /// Send one request and wait for its response.
    async fn call(
        &mut self,
        request: impl FnOnce(u32) -> Message,
    ) -> Result<Option<ShowResult>, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        self.framed
            .send(request(id))
            .await
            .map_err(|e| ClientError::Connection(format!("send request: {e}")))?;

        match self.framed.next().await {
            Some(Ok(Message::Response {
                id: resp_id,
                status: Status::Ok,
                result,
                ..
            })) if resp_id == id => Ok(result),
            Some(Ok(Message::Response {
                id: resp_id,
                error,
                detail,
                ..
            })) if resp_id == id => Err(ClientError::Plugin {
                reason: error.unwrap_or_default(),
                detail,
            }),
            other => Err(ClientError::Connection(format!(
                "unexpected response: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    use crate::adapter::ErrorReason;

    /// Accept one connection, ack the handshake, then answer each request
    /// with the next scripted response (its `id` rewritten to match).
    fn scripted_host(listener: UnixListener, replies: Vec<Message>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, LengthPrefixedCodec::new());

            match framed.next().await.unwrap().unwrap() {
                Message::Hello { id: 0, .. } => {}
                other => panic!("expected hello, got {other:?}"),
            }
            framed
                .send(Message::HelloAck {
                    id: 0,
                    status: Status::Ok,
                    error: None,
                    plugin: Some("facebookinstant".into()),
                })
                .await
                .unwrap();

            for reply in replies {
                let request_id = match framed.next().await.unwrap().unwrap() {
                    Message::Initialize { id }
                    | Message::LoadStart { id }
                    | Message::LoadStop { id }
                    | Message::ShowFullScreenAd { id, .. }
                    | Message::ShowRewardedAd { id, .. } => id,
                    other => panic!("unexpected request {other:?}"),
                };
                let reply = match reply {
                    Message::Response {
                        status,
                        error,
                        detail,
                        result,
                        ..
                    } => Message::Response {
                        id: request_id,
                        status,
                        error,
                        detail,
                        result,
                    },
                    other => other,
                };
                framed.send(reply).await.unwrap();
            }
        })
    }

    #[tokio::test]
    async fn requests_map_responses() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        let host = scripted_host(
            listener,
            vec![
                Message::ok(0),
                Message::show_result(0, ShowResult::not_shown(ErrorReason::TimeConstraint)),
                Message::error(0, "double_initialization", Some("twice".into())),
            ],
        );

        let mut client = PluginClient::connect(&sock).await.unwrap();
        assert_eq!(client.plugin(), "facebookinstant");

        client.load_start().await.unwrap();

        let result = client.show_rewarded_ad("video", "p").await.unwrap();
        assert_eq!(result.error_reason(), Some(ErrorReason::TimeConstraint));

        match client.initialize().await.unwrap_err() {
            ClientError::Plugin { reason, detail } => {
                assert_eq!(reason, "double_initialization");
                assert_eq!(detail.as_deref(), Some("twice"));
            }
            other => panic!("expected plugin error, got {other:?}"),
        }

        host.await.unwrap();
    }

    #[tokio::test]
    async fn show_without_result_is_a_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("plugin.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        let host = scripted_host(listener, vec![Message::ok(0)]);

        let mut client = PluginClient::connect(&sock).await.unwrap();
        let err = client.show_full_screen_ad("p").await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));

        host.await.unwrap();
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = PluginClient::connect(&dir.path().join("absent.sock"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("absent.sock"));
    }
}
