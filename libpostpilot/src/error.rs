//! Error types for Postpilot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostpilotError>;

#[derive(Error, Debug)]
pub enum PostpilotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostpilotError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PostpilotError::InvalidInput(_) => 3,
            PostpilotError::Platform(PlatformError::Authentication(_)) => 2,
            PostpilotError::Platform(_) => 1,
            PostpilotError::Config(_) => 2,
            PostpilotError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure shapes of the external platform, as far as the engine
/// distinguishes them. `Duplicate` and `NotFound` drive status
/// transitions; everything else is "some error" to the lanes.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Content already published on the platform (existing ref: {existing_ref:?})")]
    Duplicate { existing_ref: Option<String> },

    #[error("Resource not found on the platform: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Platform request failed: {0}")]
    Api(String),
}
