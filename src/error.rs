//! Error taxonomy for the capture core.
//!
//! Nothing here crosses the page/background boundary as a Rust value;
//! the protocol layer flattens every error into `{success:false, error}`.

use thiserror::Error;

/// A refusal from the host platform's privileged primitives
/// (screenshot, window creation, storage).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("capture quota exceeded: too many screenshots in a short window")]
    RateLimited,
    #[error("no active tab to capture")]
    NoActiveTab,
    #[error("this page cannot be captured: {0}")]
    Restricted(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Every failure the capture core can produce.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No response, or a response that could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("capture unavailable: {0}")]
    CaptureUnavailable(#[from] HostError),

    /// Degenerate or off-screen selection. Handled locally, never sent.
    #[error("invalid selection: {0}")]
    SelectionInvalid(String),

    #[error("full-page capture aborted at tile {tile} of {total}: {reason}")]
    StitchAbort {
        tile: usize,
        total: usize,
        reason: String,
    },

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// A request kind that this context does not serve.
    #[error("unsupported request in {context} context: {action}")]
    Unsupported {
        context: &'static str,
        action: String,
    },
}

impl CaptureError {
    /// Whether the user can reasonably try the same thing again.
    ///
    /// Quota and permission failures are not retryable; the user has to
    /// wait or change something first.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::CaptureUnavailable(host) => !matches!(
                host,
                HostError::RateLimited | HostError::PermissionDenied(_) | HostError::Restricted(_)
            ),
            CaptureError::StitchAbort { reason, .. } => !reason.contains("quota"),
            CaptureError::Protocol(_) | CaptureError::Decode(_) => true,
            CaptureError::SelectionInvalid(_) => true,
            CaptureError::Encode(_) | CaptureError::Storage(_) => false,
            CaptureError::Unsupported { .. } => false,
        }
    }

    /// Explanatory, actionable text for the notification collaborator.
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::CaptureUnavailable(HostError::RateLimited) => {
                "Screenshots are being taken too quickly. Wait a moment and try again.".to_string()
            }
            CaptureError::CaptureUnavailable(HostError::PermissionDenied(_)) => {
                "The extension does not have permission to capture this tab. Grant access in the extension settings.".to_string()
            }
            CaptureError::CaptureUnavailable(HostError::Restricted(_)) => {
                "This page is protected by the browser and cannot be captured.".to_string()
            }
            CaptureError::CaptureUnavailable(HostError::NoActiveTab) => {
                "Open the page you want to capture and try again.".to_string()
            }
            CaptureError::SelectionInvalid(_) => {
                "The selected area is not visible. Scroll it into view or select again.".to_string()
            }
            CaptureError::StitchAbort { .. } => {
                "Full-page capture was interrupted. Try again once the page has finished loading.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Recover the guard from a poisoned mutex. Capture state is plain data,
/// so a panic elsewhere never leaves it half-written in a way we care about.
pub(crate) fn lock<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_failures_are_not_retryable() {
        let err = CaptureError::from(HostError::RateLimited);
        assert!(!err.is_retryable());
        assert!(err.user_message().contains("Wait a moment"));
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(CaptureError::from(HostError::Unavailable("busy".into())).is_retryable());
        assert!(CaptureError::Protocol("no response".into()).is_retryable());
    }

    #[test]
    fn stitch_abort_names_the_tile() {
        let err = CaptureError::StitchAbort {
            tile: 3,
            total: 4,
            reason: "tab closed".into(),
        };
        assert_eq!(
            err.to_string(),
            "full-page capture aborted at tile 3 of 4: tab closed"
        );
    }
}
