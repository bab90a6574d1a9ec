//! Ad-instance cache: one acquisition per (ad type, placement).
//!
//! The cache stores the acquisition future itself, not its result. The
//! entry is inserted under the lock before anything is awaited, so
//! concurrent first-time callers for a key join the same in-flight SDK
//! call instead of issuing their own. Entries are never evicted: an ad
//! instance represents a placement slot and is reused for the adapter's
//! lifetime. A failed acquisition stays cached as well.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::sdk::{AdInstance, InstantSdk, SdkError};

/// Ad format, each backed by its own SDK acquisition entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdType {
    Interstitial,
    RewardedInterstitial,
    RewardedVideo,
}

impl AdType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdType::Interstitial => "interstitial",
            AdType::RewardedInterstitial => "rewarded-interstitial",
            AdType::RewardedVideo => "rewarded-video",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key: ad format plus the opaque placement ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub ad_type: AdType,
    pub placement_id: String,
}

impl InstanceKey {
    pub fn new(ad_type: AdType, placement_id: impl Into<String>) -> Self {
        Self {
            ad_type,
            placement_id: placement_id.into(),
        }
    }
}

/// Pending-or-resolved acquisition, cloneable by every waiter.
pub type Acquisition = Shared<BoxFuture<'static, Result<Arc<dyn AdInstance>, SdkError>>>;

/// Memoized ad-instance acquisitions.
#[derive(Default)]
pub struct InstanceCache {
    entries: Mutex<HashMap<InstanceKey, Acquisition>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the acquisition for `key`, dispatching it on first use.
    ///
    /// The SDK call runs when the returned future is first polled; every
    /// clone observes the same outcome.
    pub fn acquire<S: InstantSdk>(&self, sdk: &Arc<S>, key: InstanceKey) -> Acquisition {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(key)
            .or_insert_with_key(|key| {
                tracing::debug!(
                    ad_type = %key.ad_type,
                    placement_id = %key.placement_id,
                    "dispatching ad instance acquisition"
                );
                dispatch(Arc::clone(sdk), key.clone())
            })
            .clone()
    }

    /// Number of distinct keys ever requested.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn dispatch<S: InstantSdk>(sdk: Arc<S>, key: InstanceKey) -> Acquisition {
    async move {
        let placement_id = key.placement_id.as_str();
        match key.ad_type {
            AdType::Interstitial => sdk.get_interstitial_ad_async(placement_id).await,
            AdType::RewardedInterstitial => {
                sdk.get_rewarded_interstitial_async(placement_id).await
            }
            AdType::RewardedVideo => sdk.get_rewarded_video_async(placement_id).await,
        }
    }
    .boxed()
    .shared()
}
