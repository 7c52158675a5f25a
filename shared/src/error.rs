//! Error types for the scheduler Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the scheduler Lambda functions.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reported by the SQL pipeline endpoint
    #[error("Database error: {0}")]
    Database(String),

    /// Transport failure reaching the SQL pipeline endpoint
    #[error("Database request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation("title is required".into()).status_code(), 400);
        assert_eq!(Error::NotFound("meeting 7".into()).status_code(), 404);
        assert_eq!(Error::Database("no such table: people".into()).status_code(), 500);
        assert_eq!(Error::Config("TURSO_DATABASE_URL not set".into()).status_code(), 500);
    }
}
