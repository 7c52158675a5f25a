//! Configuration management for Lambda functions.

use std::env;

use crate::{Error, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the hosted database (libsql:// or https://)
    pub database_url: String,
    /// Auth token for the database, if provided directly
    pub auth_token: Option<String>,
    /// ARN of the secret containing the auth token, if provided via Secrets Manager
    pub token_secret_arn: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// The auth token comes from `TURSO_AUTH_TOKEN` when set, otherwise from
    /// the secret named by `TURSO_TOKEN_SECRET_ARN`. At least one is required.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("TURSO_DATABASE_URL")
            .map_err(|_| Error::Config("TURSO_DATABASE_URL not set".to_string()))?;
        let auth_token = env::var("TURSO_AUTH_TOKEN").ok();
        let token_secret_arn = env::var("TURSO_TOKEN_SECRET_ARN").ok();

        if auth_token.is_none() && token_secret_arn.is_none() {
            return Err(Error::Config(
                "Either TURSO_AUTH_TOKEN or TURSO_TOKEN_SECRET_ARN must be set".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            auth_token,
            token_secret_arn,
        })
    }
}
