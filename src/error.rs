use thiserror::Error;

/// Main error type for the regulation core
#[derive(Error, Debug)]
pub enum BulwarkError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for BulwarkError
pub type Result<T> = std::result::Result<T, BulwarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_every_violation() {
        let err = BulwarkError::InvalidConfig(vec![
            "loss_trigger must be >= 1".to_string(),
            "capacity must be >= 1".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: loss_trigger must be >= 1; capacity must be >= 1"
        );
    }
}
