//! Ad-lifecycle adapter: the plugin the mediation host talks to.
//!
//! Wraps the Instant Games SDK behind the host's plugin contract:
//! one-time initialization, loading-progress signals, and show requests
//! whose SDK failures are reshaped into [`ShowResult`]s.
//!
//! All lifecycle state lives in [`FbInstantAdapter`]; separate adapters
//! share nothing. The adapter is `Send + Sync` and is meant to be shared
//! behind an `Arc`.

mod cache;
mod guard;
mod outcome;
mod show;

use std::str::FromStr;
use std::sync::Arc;

use crate::sdk::{InstantSdk, SDK_SCRIPT_URL, ScriptError, ScriptLoader, SdkError};

pub use outcome::{ErrorReason, ShowResult};

use cache::{AdType, InstanceCache, InstanceKey};
use guard::OneShot;

/// Plugin identifier reported to the host.
pub const PLUGIN_NAME: &str = "facebookinstant";

/// Progress reported to the SDK by `load_start`.
pub const LOADING_PROGRESS_PERCENT: u8 = 50;

/// Adapter faults.
///
/// Classified ad outcomes are never errors; they come back as
/// `Ok(ShowResult)` with `did_show_ad == false`.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("plugin is being initialized more than once")]
    DoubleInitialization,
    #[error("unsupported ad type: {0}")]
    UnsupportedAdType(String),
    #[error("script load failed: {0}")]
    Script(#[from] ScriptError),
    #[error("SDK failure: {0}")]
    Sdk(#[from] SdkError),
}

/// Format requested through `show_rewarded_ad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardedAdKind {
    Interstitial,
    Video,
}

impl RewardedAdKind {
    fn ad_type(self) -> AdType {
        match self {
            RewardedAdKind::Interstitial => AdType::RewardedInterstitial,
            RewardedAdKind::Video => AdType::RewardedVideo,
        }
    }
}

impl FromStr for RewardedAdKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interstitial" => Ok(RewardedAdKind::Interstitial),
            "video" => Ok(RewardedAdKind::Video),
            other => Err(AdapterError::UnsupportedAdType(other.to_string())),
        }
    }
}

/// Instant Games plugin state.
pub struct FbInstantAdapter<S> {
    sdk: Arc<S>,
    initialized: OneShot,
    load_start_signaled: OneShot,
    load_stop_signaled: OneShot,
    instances: InstanceCache,
}

impl<S: InstantSdk> FbInstantAdapter<S> {
    pub fn new(sdk: Arc<S>) -> Self {
        Self {
            sdk,
            initialized: OneShot::new(),
            load_start_signaled: OneShot::new(),
            load_stop_signaled: OneShot::new(),
            instances: InstanceCache::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    /// Load the SDK script and initialize the SDK.
    ///
    /// # Errors
    ///
    /// `DoubleInitialization` on every call after the first, whether the
    /// first succeeded, failed, or is still pending. Script and SDK
    /// failures are returned unchanged; no retry is attempted.
    pub async fn initialize(&self, loader: &dyn ScriptLoader) -> Result<(), AdapterError> {
        if !self.initialized.fire() {
            return Err(AdapterError::DoubleInitialization);
        }
        tracing::debug!(url = SDK_SCRIPT_URL, "loading SDK script");
        loader.load_script(SDK_SCRIPT_URL).await?;
        self.sdk.initialize_async().await?;
        tracing::info!("SDK initialized");
        Ok(())
    }

    /// Report initial loading progress. Only the first call has an effect.
    pub fn load_start(&self) {
        if !self.load_start_signaled.fire() {
            return;
        }
        self.sdk.set_loading_progress(LOADING_PROGRESS_PERCENT);
        tracing::debug!(percentage = LOADING_PROGRESS_PERCENT, "loading progress reported");
    }

    /// Signal that the game is ready. Only the first call has an effect.
    pub async fn load_stop(&self) -> Result<(), AdapterError> {
        if !self.load_stop_signaled.fire() {
            return Ok(());
        }
        self.sdk.start_game_async().await?;
        tracing::debug!("game started");
        Ok(())
    }

    pub async fn show_full_screen_ad(&self, placement_id: &str) -> Result<ShowResult, AdapterError> {
        self.show_ad(AdType::Interstitial, placement_id).await
    }

    /// Show a rewarded ad. `ad_type` is `"interstitial"` or `"video"`.
    ///
    /// # Errors
    ///
    /// `UnsupportedAdType` for any other `ad_type`, before the SDK is
    /// touched.
    pub async fn show_rewarded_ad(
        &self,
        ad_type: &str,
        placement_id: &str,
    ) -> Result<ShowResult, AdapterError> {
        let kind: RewardedAdKind = ad_type.parse()?;
        self.show_ad(kind.ad_type(), placement_id).await
    }

    async fn show_ad(&self, ad_type: AdType, placement_id: &str) -> Result<ShowResult, AdapterError> {
        show::show_ad(
            &self.sdk,
            &self.instances,
            InstanceKey::new(ad_type, placement_id),
        )
        .await
    }
}
