use std::time::Duration;

/// Errors surfaced by the SDK.
///
/// Only `Validation` ever reaches a caller, from `Siteline::new`. The other
/// variants are produced inside the tracking pipeline and logged there.
#[derive(Debug, thiserror::Error)]
pub enum SitelineError {
    #[error("[siteline] {0}")]
    Validation(String),

    #[error("[siteline] {0}")]
    Transport(#[from] TransportError),

    #[error("[siteline] Failed to spawn dispatch worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failure modes of a single intake POST.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("intake returned HTTP {0}")]
    Status(u16),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_prefixed() {
        let err = SitelineError::Validation("Missing websiteKey.".to_string());
        assert_eq!(err.to_string(), "[siteline] Missing websiteKey.");
    }

    #[test]
    fn transport_error_converts() {
        let err: SitelineError = TransportError::Status(503).into();
        assert!(matches!(err, SitelineError::Transport(TransportError::Status(503))));
        assert_eq!(err.to_string(), "[siteline] intake returned HTTP 503");
    }

    #[test]
    fn timeout_display_includes_duration() {
        let err = TransportError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "request timed out after 250ms");
    }
}
