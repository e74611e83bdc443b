//! Error types: the crate-wide [`RelayError`] and the transport failure
//! taxonomy the delivery engine keys its recovery on.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failure taxonomy at the transport boundary. Telegram reports these as API
/// error strings; [`TransportError::classify`] maps them to variants so the
/// delivery engine can match instead of substring-probing at every call site.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Edit whose new text equals the old. Not a failure; callers skip it.
    #[error("message is not modified")]
    NotModified,

    /// Transport asked us to slow down; retry after the given delay.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Text exceeded the per-message ceiling despite chunking expectations.
    #[error("message is too long")]
    TooLong,

    /// The target message is gone or otherwise unusable (e.g. deleted by the user).
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Classifies a transport error string. Telegram's API phrases are stable
    /// enough to match on ("message is not modified", "Retry after Ns",
    /// "MESSAGE_TOO_LONG", "message to edit not found").
    pub fn classify(error: &str) -> Self {
        let lower = error.to_lowercase();
        if lower.contains("message is not modified") || lower.contains("exactly the same") {
            return TransportError::NotModified;
        }
        if let Some(secs) = extract_retry_after_seconds(&lower) {
            return TransportError::RateLimited {
                retry_after: Duration::from_secs(secs),
            };
        }
        if lower.contains("too long") || lower.contains("message_too_long") {
            return TransportError::TooLong;
        }
        if lower.contains("not found")
            || lower.contains("message can't be")
            || lower.contains("message to edit")
            || lower.contains("message identifier is not specified")
        {
            return TransportError::BadRequest(error.to_string());
        }
        TransportError::Other(error.to_string())
    }
}

/// Parses "retry after Ns" (or "retry after N") out of a lowercased error
/// string; returns `Some(seconds)` when the transport told us how long to wait.
fn extract_retry_after_seconds(error: &str) -> Option<u64> {
    let pattern = "retry after ";
    let start = error.find(pattern)? + pattern.len();
    let digits: String = error[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_modified() {
        assert_eq!(
            TransportError::classify(
                "Bad Request: message is not modified: specified new message content \
                 and reply markup are exactly the same"
            ),
            TransportError::NotModified
        );
    }

    #[test]
    fn test_classify_rate_limited_parses_seconds() {
        assert_eq!(
            TransportError::classify("Too Many Requests: Retry after 7s"),
            TransportError::RateLimited {
                retry_after: Duration::from_secs(7)
            }
        );
        assert_eq!(
            TransportError::classify("retry after 12"),
            TransportError::RateLimited {
                retry_after: Duration::from_secs(12)
            }
        );
    }

    #[test]
    fn test_classify_too_long() {
        assert_eq!(
            TransportError::classify("Bad Request: message is too long"),
            TransportError::TooLong
        );
    }

    #[test]
    fn test_classify_bad_request_target_gone() {
        assert!(matches!(
            TransportError::classify("Bad Request: message to edit not found"),
            TransportError::BadRequest(_)
        ));
        assert!(matches!(
            TransportError::classify("Bad Request: message can't be deleted"),
            TransportError::BadRequest(_)
        ));
    }

    #[test]
    fn test_classify_unknown_falls_through_to_other() {
        assert!(matches!(
            TransportError::classify("Gateway Timeout"),
            TransportError::Other(_)
        ));
    }
}
