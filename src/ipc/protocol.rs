//! Wire protocol message types for plugin-host IPC.
//!
//! All messages are MessagePack-encoded maps with at minimum `type` and `id`
//! fields. Every request gets exactly one `response` carrying the same `id`;
//! responses may arrive out of request order.

use serde::{Deserialize, Serialize};

use crate::adapter::ShowResult;

/// All wire protocol messages.
///
/// Serialized as a tagged union on the `type` field via MessagePack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32 },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Plugin name; present on a successful handshake.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plugin: Option<String>,
    },

    // -- Lifecycle --
    #[serde(rename = "initialize")]
    Initialize { id: u32 },

    #[serde(rename = "load_start")]
    LoadStart { id: u32 },

    #[serde(rename = "load_stop")]
    LoadStop { id: u32 },

    // -- Show requests --
    #[serde(rename = "show_full_screen_ad")]
    ShowFullScreenAd { id: u32, placement_id: String },

    /// `ad_type` is passed through as text; unsupported values are
    /// rejected by the adapter, not by the decoder.
    #[serde(rename = "show_rewarded_ad")]
    ShowRewardedAd {
        id: u32,
        ad_type: String,
        placement_id: String,
    },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Human-readable failure detail (e.g. the SDK's code and message).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        /// Outcome of a show request.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ShowResult>,
    },
}

impl Message {
    /// Plain success response.
    pub fn ok(id: u32) -> Self {
        Message::Response {
            id,
            status: Status::Ok,
            error: None,
            detail: None,
            result: None,
        }
    }

    /// Success response carrying a show outcome.
    pub fn show_result(id: u32, result: ShowResult) -> Self {
        Message::Response {
            id,
            status: Status::Ok,
            error: None,
            detail: None,
            result: Some(result),
        }
    }

    /// Error response with a machine-readable reason.
    pub fn error(id: u32, reason: &str, detail: Option<String>) -> Self {
        Message::Response {
            id,
            status: Status::Error,
            error: Some(reason.to_string()),
            detail,
            result: None,
        }
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages.
///
/// Used by the host as a fallback when [`Message`] deserialization fails
/// (e.g. unknown `type` tag), so the error response can echo the request
/// `id`.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Consumed by serde for structural matching; not read by host code.
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub msg_type: String,
    pub id: u32,
}
