use thiserror::Error;

/// Main error type for the device supervisor
#[derive(Error, Debug)]
pub enum DevwatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid probe target: {0}")]
    InvalidTarget(String),

    // Probe errors
    #[error("Probe for {family} timed out after {timeout_secs}s")]
    ProbeTimeout { family: String, timeout_secs: u64 },

    #[error("Probe for {family} failed: {reason}")]
    ProbeFailed { family: String, reason: String },

    #[error("Device family {family} unavailable: {reason}")]
    FamilyUnavailable { family: String, reason: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for DevwatchError
pub type Result<T> = std::result::Result<T, DevwatchError>;

impl DevwatchError {
    /// Whether this error came from the per-family probe timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, DevwatchError::ProbeTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = DevwatchError::ProbeTimeout {
            family: "camera".to_string(),
            timeout_secs: 5,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Probe for camera timed out after 5s");
    }

    #[test]
    fn test_probe_failed_is_not_timeout() {
        let err = DevwatchError::ProbeFailed {
            family: "plug".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_unavailable_display() {
        let err = DevwatchError::FamilyUnavailable {
            family: "doorbell".to_string(),
            reason: "vendor SDK missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Device family doorbell unavailable: vendor SDK missing"
        );
    }
}
