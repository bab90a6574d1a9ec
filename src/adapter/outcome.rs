//! Show outcomes and SDK failure classification.

use serde::{Deserialize, Serialize};

use crate::sdk::SdkError;

/// Expected, non-exceptional reasons an ad was not shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorReason {
    NoAdAvailable,
    TimeConstraint,
    UserDismissed,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorReason::NoAdAvailable => "no-ad-available",
            ErrorReason::TimeConstraint => "time-constraint",
            ErrorReason::UserDismissed => "user-dismissed",
        }
    }
}

/// Result of a show request, as reported to the host.
///
/// `did_show_ad` is true exactly when `error_reason` is `None`; the
/// constructors are the only way to build one, and decoding rejects
/// payloads that break the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ShowResultWire")]
pub struct ShowResult {
    did_show_ad: bool,
    error_reason: Option<ErrorReason>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowResultWire {
    did_show_ad: bool,
    error_reason: Option<ErrorReason>,
}

impl TryFrom<ShowResultWire> for ShowResult {
    type Error = String;

    fn try_from(wire: ShowResultWire) -> Result<Self, Self::Error> {
        match (wire.did_show_ad, wire.error_reason) {
            (true, None) => Ok(ShowResult::shown()),
            (false, Some(reason)) => Ok(ShowResult::not_shown(reason)),
            (true, Some(reason)) => Err(format!(
                "show result reports a shown ad with reason {}",
                reason.as_str()
            )),
            (false, None) => Err("show result reports no ad shown without a reason".into()),
        }
    }
}

impl ShowResult {
    pub fn shown() -> Self {
        Self {
            did_show_ad: true,
            error_reason: None,
        }
    }

    pub fn not_shown(reason: ErrorReason) -> Self {
        Self {
            did_show_ad: false,
            error_reason: Some(reason),
        }
    }

    #[cfg(test)]
    pub fn did_show_ad(&self) -> bool {
        self.did_show_ad
    }

    pub fn error_reason(&self) -> Option<ErrorReason> {
        self.error_reason
    }
}

/// Map an SDK failure to a known reason by its error code.
///
/// Returns `None` for unrecognized codes and for failures without a
/// code; the caller must surface those as faults.
pub fn classify(error: &SdkError) -> Option<ErrorReason> {
    match error.code.as_deref()? {
        "ADS_NO_FILL" => Some(ErrorReason::NoAdAvailable),
        "ADS_FREQUENT_LOAD" | "RATE_LIMITED" => Some(ErrorReason::TimeConstraint),
        "USER_INPUT" => Some(ErrorReason::UserDismissed),
        _ => None,
    }
}
