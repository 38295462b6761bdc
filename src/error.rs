// Error types shared across the runtime

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid drive configuration: {reason}")]
    InvalidDrive { reason: String },
}

/// Startup failures of the runtime
#[derive(Debug, thiserror::Error)]
pub enum RoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
