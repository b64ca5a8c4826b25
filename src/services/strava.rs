// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for OAuth and gear lookups.
//!
//! Handles:
//! - Authorization URL construction
//! - Code exchange, token refresh and deauthorization
//! - Athlete profile and gear fetching
//! - Webhook push subscription creation

use crate::db::Database;
use crate::error::AppError;
use crate::models::account::StravaCredentials;
use crate::models::bike::meters_to_miles;
use crate::models::{Account, Bike, DEFAULT_WAX_LIMIT};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;

/// Scopes every authorization request carries.
pub const BASE_SCOPES: &[&str] = &["read", "profile:read_all"];

/// Scopes appended to the base set after the URL is built.
pub const EXTRA_SCOPES: &[&str] = &["activity:read_all"];

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials and endpoint bases.
    pub fn new(
        client_id: String,
        client_secret: String,
        api_url: String,
        oauth_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            oauth_url: oauth_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        }
    }

    /// Build the URL the browser is sent to for Strava authorization.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AppError> {
        let base_scope = BASE_SCOPES.join(",");
        let mut url = Url::parse_with_params(
            &format!("{}/authorize", self.oauth_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("approval_prompt", "auto"),
                ("scope", base_scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid OAuth URL: {}", e)))?;

        append_scopes(&mut url, EXTRA_SCOPES)?;
        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Revoke the application's access for the token's athlete.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Deauthorization request failed: {}", e)))?;

        self.check_response(response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// Get the authenticated athlete, including their bikes.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError> {
        let url = format!("{}/athlete", self.api_url);
        self.get_json(&url, access_token).await
    }

    /// Get a single gear record.
    pub async fn get_gear(&self, access_token: &str, gear_id: &str) -> Result<StravaGear, AppError> {
        let url = format!("{}/gear/{}", self.api_url, urlencoding::encode(gear_id));
        self.get_json(&url, access_token).await
    }

    /// Register the webhook callback with Strava.
    pub async fn create_push_subscription(
        &self,
        callback_url: &str,
        verify_token: &str,
    ) -> Result<PushSubscription, AppError> {
        let response = self
            .http
            .post(format!("{}/push_subscriptions", self.api_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("callback_url", callback_url),
                ("verify_token", verify_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Subscription request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::StravaApi("Rate limit exceeded".to_string()));
        }

        if status.as_u16() == 401 {
            return Err(AppError::StravaApi("Token rejected (HTTP 401)".to_string()));
        }

        Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            self.check_response(response).await?;
            return Err(AppError::StravaApi("Unexpected response status".to_string()));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Add scopes to the `scope` query parameter of an already-built URL.
///
/// Other query parameters keep their order. Fails if there is no `scope`
/// parameter to extend.
fn append_scopes(url: &mut Url, extra: &[&str]) -> Result<(), AppError> {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if !pairs.iter().any(|(k, _)| k == "scope") {
        return Err(AppError::Internal(anyhow::anyhow!(
            "Authorization URL has no scope parameter"
        )));
    }

    let mut query = url.query_pairs_mut();
    query.clear();
    for (key, value) in pairs {
        if key == "scope" {
            let mut scopes: Vec<&str> = value.split(',').filter(|s| !s.is_empty()).collect();
            for scope in extra {
                if !scopes.contains(scope) {
                    scopes.push(*scope);
                }
            }
            query.append_pair(&key, &scopes.join(","));
        } else {
            query.append_pair(&key, &value);
        }
    }
    drop(query);

    Ok(())
}

/// Token response from a code exchange (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Athlete profile. `bikes` is only populated with `profile:read_all`.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: i64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub bikes: Vec<StravaGear>,
}

/// Gear record; `distance` is in meters.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaGear {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub distance: f64,
    #[serde(default)]
    pub primary: bool,
}

/// Created push subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct PushSubscription {
    pub id: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a mileage sync; callers are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All bikes updated in one transaction
    Updated(usize),
    /// Account has no Strava token
    Skipped,
    /// Something failed; nothing was written
    Failed,
}

/// Counts from a gear import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

/// Strava client plus the database, for operations that touch both.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: Database,
}

impl StravaService {
    pub fn new(client: StravaClient, db: Database) -> Self {
        Self { client, db }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Refresh the account's token pair if its expiry is unset or has passed.
    ///
    /// The new pair is written to `account` and persisted. Returns whether a
    /// refresh happened. Accounts without a refresh token are left alone.
    /// Strava failures propagate; there is no retry.
    pub async fn refresh_if_expired(&self, account: &mut Account) -> Result<bool, AppError> {
        let Some(refresh_token) = account.refresh_token.clone() else {
            tracing::debug!(account_id = account.id, "No refresh token, skipping refresh");
            return Ok(false);
        };

        if !account.token_expired(Utc::now()) {
            return Ok(false);
        }

        tracing::info!(account_id = account.id, "Access token expired, refreshing");

        let refreshed = self.client.refresh_token(&refresh_token).await?;
        let credentials = StravaCredentials {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at: timestamp_to_utc(refreshed.expires_at)?,
        };

        self.db.set_tokens(account.id, &credentials).await?;

        account.access_token = Some(credentials.access_token);
        account.refresh_token = Some(credentials.refresh_token);
        account.token_expires_at = Some(credentials.expires_at);

        tracing::info!(account_id = account.id, "Token refreshed");
        Ok(true)
    }

    /// Get a usable access token, refreshing first if needed.
    pub async fn valid_access_token(&self, account: &mut Account) -> Result<String, AppError> {
        self.refresh_if_expired(account).await?;
        account
            .access_token
            .clone()
            .ok_or_else(|| AppError::BadRequest("Strava account not linked".to_string()))
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange an authorization code and link the athlete to the account.
    pub async fn handle_oauth_callback(
        &self,
        account_id: i64,
        code: &str,
    ) -> Result<StravaAthlete, AppError> {
        let response = self.client.exchange_code(code).await?;

        let credentials = StravaCredentials {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: timestamp_to_utc(response.expires_at)?,
        };

        self.db
            .link_strava(account_id, response.athlete.id, &credentials)
            .await?;

        tracing::info!(
            account_id,
            athlete_id = response.athlete.id,
            "OAuth callback handled, tokens stored"
        );

        Ok(response.athlete)
    }

    /// Revoke access at Strava and forget local credentials. Bikes stay.
    pub async fn deauthorize(&self, account: &mut Account) -> Result<(), AppError> {
        let access_token = self.valid_access_token(account).await?;
        self.client.deauthorize(&access_token).await?;
        self.db.unlink_strava(account.id).await?;

        account.access_token = None;
        account.refresh_token = None;
        account.token_expires_at = None;
        account.strava_linked = false;
        account.strava_athlete_id = None;
        Ok(())
    }

    // ─── Gear ────────────────────────────────────────────────────────────────

    /// Create or refresh one local bike per gear listed on the athlete profile.
    pub async fn import_gear(&self, account: &mut Account) -> Result<ImportSummary, AppError> {
        let access_token = self.valid_access_token(account).await?;
        let athlete = self.client.get_athlete(&access_token).await?;

        let mut summary = ImportSummary::default();
        for gear in &athlete.bikes {
            let name = gear.name.clone().unwrap_or_else(|| gear.id.clone());
            let created = self
                .db
                .upsert_bike(
                    account.id,
                    &gear.id,
                    &name,
                    meters_to_miles(gear.distance),
                    DEFAULT_WAX_LIMIT,
                )
                .await?;
            if created {
                summary.created += 1;
            } else {
                summary.updated += 1;
            }
        }

        tracing::info!(
            account_id = account.id,
            created = summary.created,
            updated = summary.updated,
            "Gear imported"
        );
        Ok(summary)
    }

    /// Re-fetch one bike's gear record and store its mileage.
    pub async fn sync_bike(&self, account: &mut Account, bike: &Bike) -> Result<f64, AppError> {
        let access_token = self.valid_access_token(account).await?;
        let gear = self.client.get_gear(&access_token, &bike.id).await?;
        let miles = meters_to_miles(gear.distance);
        self.db.update_current_mileage(&bike.id, miles).await?;
        Ok(miles)
    }

    /// Pull the odometer of every bike the account owns.
    ///
    /// Every gear record is fetched first; the writes then share one
    /// transaction, so any failure leaves every bike unchanged.
    /// Errors are logged, not returned.
    pub async fn sync_mileage(&self, account: &Account) -> SyncOutcome {
        let Some(access_token) = account.access_token.as_deref() else {
            tracing::debug!(account_id = account.id, "Account not linked, skipping sync");
            return SyncOutcome::Skipped;
        };

        match self.sync_mileage_tx(account.id, access_token).await {
            Ok(count) => {
                tracing::info!(account_id = account.id, bikes = count, "Mileage synced");
                SyncOutcome::Updated(count)
            }
            Err(e) => {
                tracing::error!(
                    account_id = account.id,
                    error = %e,
                    "Mileage sync failed, changes rolled back"
                );
                SyncOutcome::Failed
            }
        }
    }

    async fn sync_mileage_tx(&self, account_id: i64, access_token: &str) -> Result<usize, AppError> {
        let bikes = self.db.list_bikes(account_id).await?;
        if bikes.is_empty() {
            return Ok(0);
        }

        // Fetch everything before touching the database so no write lock is
        // held across Strava round trips.
        let mut readings = Vec::with_capacity(bikes.len());
        for bike in &bikes {
            let gear = self.client.get_gear(access_token, &bike.id).await?;
            readings.push((bike.id.as_str(), meters_to_miles(gear.distance)));
        }

        let mut tx = self.db.begin().await?;

        let mut result = Ok(());
        for (bike_id, miles) in &readings {
            if let Err(e) = Database::set_current_mileage(&mut *tx, bike_id, *miles).await {
                result = Err(e);
                break;
            }
        }

        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(readings.len())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

fn timestamp_to_utc(expires_at: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(expires_at, 0).ok_or_else(|| {
        AppError::StravaApi(format!("Invalid token expiry timestamp: {}", expires_at))
    })
}
