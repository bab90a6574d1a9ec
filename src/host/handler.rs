//! Message dispatch: maps protocol requests onto adapter calls.
//!
//! No I/O of its own. Each request yields exactly one response carrying
//! the request's `id`. Adapter faults become error responses with a
//! machine-readable reason; classified ad outcomes are successes.

use std::sync::Arc;

use crate::adapter::{AdapterError, FbInstantAdapter, ShowResult};
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status};
use crate::sdk::{InstantSdk, ScriptLoader};

/// Everything a connection needs to serve requests.
///
/// Shared by all connections, so lifecycle guards and the instance cache
/// are process-wide for the host.
pub struct HostContext<S> {
    pub adapter: FbInstantAdapter<S>,
    pub loader: Arc<dyn ScriptLoader>,
}

impl<S: InstantSdk> HostContext<S> {
    pub fn new(adapter: FbInstantAdapter<S>, loader: Arc<dyn ScriptLoader>) -> Self {
        Self { adapter, loader }
    }
}

/// Validate the handshake and build the `hello_ack`.
pub fn handle_hello(id: u32, version: u32, plugin: &str) -> Message {
    // hello.id must be 0.
    if id != 0 {
        return hello_error("invalid_hello_id");
    }
    if version != PROTOCOL_VERSION {
        return hello_error("version_mismatch");
    }
    Message::HelloAck {
        id: 0,
        status: Status::Ok,
        error: None,
        plugin: Some(plugin.to_string()),
    }
}

fn hello_error(reason: &str) -> Message {
    Message::HelloAck {
        id: 0,
        status: Status::Error,
        error: Some(reason.into()),
        plugin: None,
    }
}

/// Dispatch a post-handshake request to the adapter.
pub async fn handle_request<S: InstantSdk>(host: &HostContext<S>, request: Message) -> Message {
    match request {
        Message::Initialize { id } => {
            match host.adapter.initialize(host.loader.as_ref()).await {
                Ok(()) => Message::ok(id),
                Err(e) => adapter_error(id, e),
            }
        }
        Message::LoadStart { id } => {
            host.adapter.load_start();
            Message::ok(id)
        }
        Message::LoadStop { id } => match host.adapter.load_stop().await {
            Ok(()) => Message::ok(id),
            Err(e) => adapter_error(id, e),
        },
        Message::ShowFullScreenAd { id, placement_id } => {
            let outcome = host.adapter.show_full_screen_ad(&placement_id).await;
            show_response(id, outcome)
        }
        Message::ShowRewardedAd {
            id,
            ad_type,
            placement_id,
        } => {
            let outcome = host.adapter.show_rewarded_ad(&ad_type, &placement_id).await;
            show_response(id, outcome)
        }
        Message::Hello { id, .. } => Message::error(id, "already_connected", None),
        // Host-originated messages should never be sent by peers.
        Message::HelloAck { id, .. } | Message::Response { id, .. } => {
            Message::error(id, "unknown_type", None)
        }
    }
}

fn show_response(id: u32, outcome: Result<ShowResult, AdapterError>) -> Message {
    match outcome {
        Ok(result) => Message::show_result(id, result),
        Err(e) => adapter_error(id, e),
    }
}

fn adapter_error(id: u32, error: AdapterError) -> Message {
    let reason = match &error {
        AdapterError::DoubleInitialization => "double_initialization",
        AdapterError::UnsupportedAdType(_) => "unsupported_ad_type",
        AdapterError::Script(_) => "script_load_failed",
        AdapterError::Sdk(_) => "sdk_failure",
    };
    Message::error(id, reason, Some(error.to_string()))
}
