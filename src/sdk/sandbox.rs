//! Sandbox SDK: an in-memory stand-in for the Instant Games SDK.
//!
//! Outcomes are scripted per placement through an [`OutcomePlan`]; every
//! call is appended to a shared log so callers can assert on exactly
//! which SDK entry points were hit and how often.
//!
//! Only tests read the log. The served host records into it but never
//! inspects it, so [`SandboxCall`] payloads are unread outside tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{AdInstance, InstantSdk, ScriptError, ScriptLoader, SdkError};

/// A single recorded SDK call.
#[derive(Debug, Clone, PartialEq, Eq)]
// Payloads are read by test assertions only.
#[cfg_attr(not(test), allow(dead_code))]
pub enum SandboxCall {
    Initialize,
    LoadingProgress(u8),
    StartGame,
    Acquire {
        entry_point: &'static str,
        placement_id: String,
    },
    Preload(String),
    Present(String),
}

/// Scripted failures, keyed by placement ID.
///
/// Placements without an entry succeed at every stage.
#[derive(Debug, Clone, Default)]
pub struct OutcomePlan {
    initialize: Option<SdkError>,
    start_game: Option<SdkError>,
    acquire: HashMap<String, SdkError>,
    preload: HashMap<String, SdkError>,
    present: HashMap<String, SdkError>,
}

impl OutcomePlan {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn fail_initialize(mut self, error: SdkError) -> Self {
        self.initialize = Some(error);
        self
    }

    #[cfg(test)]
    pub fn fail_start_game(mut self, error: SdkError) -> Self {
        self.start_game = Some(error);
        self
    }

    pub fn fail_acquire(mut self, placement_id: impl Into<String>, error: SdkError) -> Self {
        self.acquire.insert(placement_id.into(), error);
        self
    }

    pub fn fail_preload(mut self, placement_id: impl Into<String>, error: SdkError) -> Self {
        self.preload.insert(placement_id.into(), error);
        self
    }

    pub fn fail_present(mut self, placement_id: impl Into<String>, error: SdkError) -> Self {
        self.present.insert(placement_id.into(), error);
        self
    }
}

type CallLog = Arc<Mutex<Vec<SandboxCall>>>;

fn record(log: &CallLog, call: SandboxCall) {
    log.lock().unwrap_or_else(PoisonError::into_inner).push(call);
}

/// In-memory [`InstantSdk`] driven by an [`OutcomePlan`].
#[derive(Debug)]
pub struct SandboxSdk {
    plan: OutcomePlan,
    acquire_delay: Option<Duration>,
    log: CallLog,
}

impl SandboxSdk {
    pub fn new(plan: OutcomePlan) -> Self {
        Self {
            plan,
            acquire_delay: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Hold every acquisition pending for `delay` before resolving it.
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = Some(delay);
        self
    }

    /// Snapshot of all calls recorded so far, oldest first.
    #[cfg(test)]
    pub fn calls(&self) -> Vec<SandboxCall> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded calls matching `pred`.
    #[cfg(test)]
    pub fn count(&self, pred: impl Fn(&SandboxCall) -> bool) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    /// Number of acquisition calls across all three entry points.
    #[cfg(test)]
    pub fn acquisitions(&self) -> usize {
        self.count(|c| matches!(c, SandboxCall::Acquire { .. }))
    }

    async fn acquire(
        &self,
        entry_point: &'static str,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError> {
        record(
            &self.log,
            SandboxCall::Acquire {
                entry_point,
                placement_id: placement_id.to_string(),
            },
        );
        if let Some(delay) = self.acquire_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.plan.acquire.get(placement_id) {
            return Err(error.clone());
        }
        Ok(Arc::new(SandboxAd {
            placement_id: placement_id.to_string(),
            preload_error: self.plan.preload.get(placement_id).cloned(),
            present_error: self.plan.present.get(placement_id).cloned(),
            log: Arc::clone(&self.log),
        }))
    }
}

#[async_trait]
impl InstantSdk for SandboxSdk {
    async fn initialize_async(&self) -> Result<(), SdkError> {
        record(&self.log, SandboxCall::Initialize);
        match &self.plan.initialize {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn set_loading_progress(&self, percentage: u8) {
        record(&self.log, SandboxCall::LoadingProgress(percentage));
    }

    async fn start_game_async(&self) -> Result<(), SdkError> {
        record(&self.log, SandboxCall::StartGame);
        match &self.plan.start_game {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn get_interstitial_ad_async(
        &self,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError> {
        self.acquire("getInterstitialAdAsync", placement_id).await
    }

    async fn get_rewarded_interstitial_async(
        &self,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError> {
        self.acquire("getRewardedInterstitialAsync", placement_id)
            .await
    }

    async fn get_rewarded_video_async(
        &self,
        placement_id: &str,
    ) -> Result<Arc<dyn AdInstance>, SdkError> {
        self.acquire("getRewardedVideoAsync", placement_id).await
    }
}

/// Ad instance handed out by [`SandboxSdk`].
struct SandboxAd {
    placement_id: String,
    preload_error: Option<SdkError>,
    present_error: Option<SdkError>,
    log: CallLog,
}

#[async_trait]
impl AdInstance for SandboxAd {
    async fn load_async(&self) -> Result<(), SdkError> {
        record(&self.log, SandboxCall::Preload(self.placement_id.clone()));
        match &self.preload_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn show_async(&self) -> Result<(), SdkError> {
        record(&self.log, SandboxCall::Present(self.placement_id.clone()));
        match &self.present_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Script loader that succeeds immediately unless configured offline.
#[derive(Debug, Default)]
pub struct SandboxScriptLoader {
    offline: bool,
    loaded: Mutex<Vec<String>>,
}

impl SandboxScriptLoader {
    pub fn new(offline: bool) -> Self {
        Self {
            offline,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far, including failed attempts.
    #[cfg(test)]
    pub fn loaded(&self) -> Vec<String> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ScriptLoader for SandboxScriptLoader {
    async fn load_script(&self, url: &str) -> Result<(), ScriptError> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        if self.offline {
            return Err(ScriptError {
                url: url.to_string(),
                reason: "network unavailable".into(),
            });
        }
        Ok(())
    }
}
