//! Account model: the application user and bike owner.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Account row as stored in the `accounts` table.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// bcrypt hash (salt embedded)
    pub password_hash: String,
    /// Current Strava access token
    pub access_token: Option<String>,
    /// Strava refresh token
    pub refresh_token: Option<String>,
    /// When the access token expires; None until the first exchange
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Whether the Strava OAuth linkage completed
    pub strava_linked: bool,
    /// Linked Strava athlete ID
    pub strava_athlete_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// True if a refresh must happen before the access token is usable.
    ///
    /// A missing expiry counts as expired.
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.token_expires_at {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

/// Public view of an account (never exposes hashes or tokens).
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub strava_linked: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            strava_linked: account.strava_linked,
        }
    }
}

/// Fresh credentials from a code exchange or refresh.
#[derive(Debug, Clone)]
pub struct StravaCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}
