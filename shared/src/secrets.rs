//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;

use crate::{Config, Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Database token secret payload.
#[derive(Debug, Deserialize)]
pub struct DatabaseToken {
    pub token: String,
    pub url: Option<String>,
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    // Check cache first
    {
        let cache = get_cache().read().await;
        if let Some(value) = cache.get(secret_arn) {
            return Ok(value.clone());
        }
    }

    // Fetch from Secrets Manager
    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
        .to_string();

    // Cache the result
    {
        let mut cache = get_cache().write().await;
        cache.insert(secret_arn.to_string(), secret_string.clone());
    }

    Ok(secret_string)
}

/// Parse a token secret string.
///
/// Accepts either the JSON payload written by provisioning (`{"token": ...}`)
/// or a bare token string.
pub fn parse_database_token(secret_string: &str) -> Result<String> {
    if secret_string.trim_start().starts_with('{') {
        let parsed: DatabaseToken = serde_json::from_str(secret_string)
            .map_err(|e| Error::Aws(format!("Failed to parse database token secret: {}", e)))?;
        Ok(parsed.token)
    } else {
        Ok(secret_string.to_string())
    }
}

/// Resolve the database auth token for the given configuration.
///
/// Prefers the token from the environment; falls back to Secrets Manager.
pub async fn resolve_auth_token(config: &Config) -> Result<String> {
    if let Some(token) = &config.auth_token {
        return Ok(token.clone());
    }

    let secret_arn = config
        .token_secret_arn
        .as_deref()
        .ok_or_else(|| Error::Config("No auth token source configured".to_string()))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = SecretsClient::new(&aws_config);

    let secret_string = get_secret(&client, secret_arn).await?;
    parse_database_token(&secret_string)
}

/// Clear the secrets cache (useful for testing or credential rotation).
pub async fn clear_cache() {
    let mut cache = get_cache().write().await;
    cache.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_json() {
        let json = r#"{"token":"eyJhbGciOiJFZERTQSJ9.x.y","url":"libsql://cong.turso.io"}"#;
        let token = parse_database_token(json).unwrap();
        assert_eq!(token, "eyJhbGciOiJFZERTQSJ9.x.y");
    }

    #[test]
    fn test_parse_token_bare() {
        let token = parse_database_token("eyJhbGciOiJFZERTQSJ9.x.y").unwrap();
        assert_eq!(token, "eyJhbGciOiJFZERTQSJ9.x.y");
    }

    #[test]
    fn test_parse_token_bad_json() {
        assert!(parse_database_token(r#"{"no_token": true}"#).is_err());
    }
}
