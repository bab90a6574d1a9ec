//! Show flow: acquire, preload, present, classify.

use std::sync::Arc;

use crate::sdk::{AdInstance, InstantSdk, SdkError};

use super::AdapterError;
use super::cache::{InstanceCache, InstanceKey};
use super::outcome::{ShowResult, classify};

/// Run one show request against the cached instance for `key`.
///
/// Acquisition failures propagate as faults without classification.
/// Preload and present failures are classified; unrecognized ones are
/// re-raised with the original SDK payload.
pub(super) async fn show_ad<S: InstantSdk>(
    sdk: &Arc<S>,
    cache: &InstanceCache,
    key: InstanceKey,
) -> Result<ShowResult, AdapterError> {
    let ad_type = key.ad_type;
    let placement_id = key.placement_id.clone();

    let ad = cache.acquire(sdk, key).await.map_err(AdapterError::Sdk)?;

    let error = match preload_and_present(ad.as_ref()).await {
        Ok(()) => {
            tracing::debug!(%ad_type, %placement_id, "ad shown");
            return Ok(ShowResult::shown());
        }
        Err(e) => e,
    };

    match classify(&error) {
        Some(reason) => {
            tracing::info!(
                %ad_type,
                %placement_id,
                reason = reason.as_str(),
                "ad not shown"
            );
            Ok(ShowResult::not_shown(reason))
        }
        None => {
            tracing::warn!(
                %ad_type,
                %placement_id,
                code = error.code.as_deref().unwrap_or("none"),
                error = %error,
                "unclassified ad failure"
            );
            Err(AdapterError::Sdk(error))
        }
    }
}

async fn preload_and_present(ad: &dyn AdInstance) -> Result<(), SdkError> {
    ad.load_async().await?;
    ad.show_async().await
}
