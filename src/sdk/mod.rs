//! Instant Games SDK surface: the collaborators the adapter drives.
//!
//! The adapter never owns the SDK or its ad instances. It holds them as
//! capability references and calls the handful of async entry points
//! below. A binding to the real SDK implements these traits; the
//! [`sandbox`] module provides an in-memory implementation.

pub mod sandbox;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Script URL of the Instant Games SDK loaded during initialization.
pub const SDK_SCRIPT_URL: &str = "https://connect.facebook.net/en_US/fbinstant.7.1.js";

/// Structured failure value reported by the SDK.
///
/// `code` is the SDK's machine-readable error code (e.g. `ADS_NO_FILL`).
/// Failures without a code are possible and are never classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code: {})", .code.as_deref().unwrap_or("none"))]
pub struct SdkError {
    pub code: Option<String>,
    pub message: String,
}

impl SdkError {
    /// Failure carrying an SDK error code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Failure without a structured code.
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

/// Script loading failed before the SDK global became callable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load script {url}: {reason}")]
pub struct ScriptError {
    pub url: String,
    pub reason: String,
}

/// Host capability: fetch and execute an external script.
///
/// Resolves once the SDK's global entry point is callable.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load_script(&self, url: &str) -> Result<(), ScriptError>;
}

/// One preloadable/presentable ad unit for a placement.
///
/// `Send + Sync` is required because the same instance is shared by every
/// show request for its placement, possibly from several tasks.
#[async_trait]
pub trait AdInstance: Send + Sync {
    /// Preload the ad. Fails if no ad could be loaded.
    async fn load_async(&self) -> Result<(), SdkError>;

    /// Present the ad. Resolves when the user finished watching; fails
    /// if presentation failed or the ad was closed early.
    async fn show_async(&self) -> Result<(), SdkError>;
}

/// The global SDK object.
#[async_trait]
pub trait InstantSdk: Send + Sync + 'static {
    /// Initialize the SDK. Must precede every other SDK call.
    async fn initialize_async(&self) -> Result<(), SdkError>;

    /// Report initial loading progress, `0..=100`.
    fn set_loading_progress(&self, percentage: u8);

    /// Signal that loading finished and the game is ready to start.
    async fn start_game_async(&self) -> Result<(), SdkError>;

    async fn get_interstitial_ad_async(
        &self,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError>;

    async fn get_rewarded_interstitial_async(
        &self,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError>;

    async fn get_rewarded_video_async(
        &self,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError>;
}
