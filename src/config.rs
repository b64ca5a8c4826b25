//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development; in production every
//! value comes from the process environment.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::env;

/// Default Strava REST API base URL.
pub const STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
/// Default Strava OAuth base URL.
pub const STRAVA_OAUTH_URL: &str = "https://www.strava.com/oauth";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Database connection string (SQLite URL)
    pub database_url: String,
    /// Externally visible base URL, used for OAuth and webhook callbacks.
    /// When unset the callback host is taken from the request.
    pub public_url: Option<String>,
    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth base URL
    pub strava_oauth_url: String,
    /// bcrypt work factor for new password hashes
    pub bcrypt_cost: u32,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Session signing key (raw bytes of SECRET_KEY)
    pub secret_key: Vec<u8>,
    /// Key for signing the OAuth `state` parameter, derived from the secret key
    pub oauth_state_key: Vec<u8>,
    /// Token Strava echoes back when validating the webhook subscription
    pub webhook_verify_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret_key = env::var("SECRET_KEY")
            .map_err(|_| ConfigError::Missing("SECRET_KEY"))?
            .into_bytes();

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("BCRYPT_COST", raw))?,
            Err(_) => bcrypt::DEFAULT_COST,
        };

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://wax_tracker.db".to_string()),
            public_url: env::var("PUBLIC_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| STRAVA_API_URL.to_string()),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL")
                .unwrap_or_else(|_| STRAVA_OAUTH_URL.to_string()),
            bcrypt_cost,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            oauth_state_key: derive_state_key(&secret_key),
            secret_key,
            webhook_verify_token: env::var("WEBHOOK_VERIFY_TOKEN")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| "wax-tracker".to_string()),
        })
    }

    /// Config for tests: in-memory database, cheap bcrypt, fake credentials.
    pub fn test_default() -> Self {
        let secret_key = b"test_secret_key_32_bytes_minimum!".to_vec();
        Self {
            strava_client_id: "test_client_id".to_string(),
            database_url: "sqlite::memory:".to_string(),
            public_url: Some("http://localhost:8080".to_string()),
            strava_api_url: STRAVA_API_URL.to_string(),
            strava_oauth_url: STRAVA_OAUTH_URL.to_string(),
            bcrypt_cost: 4,
            port: 8080,
            strava_client_secret: "test_secret".to_string(),
            oauth_state_key: derive_state_key(&secret_key),
            secret_key,
            webhook_verify_token: "test_verify_token".to_string(),
        }
    }
}

/// Derive the OAuth state signing key so it never equals the session key.
fn derive_state_key(secret_key: &[u8]) -> Vec<u8> {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(secret_key).expect("HMAC accepts any key length");
    mac.update(b"wax-tracker/oauth-state");
    mac.finalize().into_bytes().to_vec()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
