// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava linkage routes: OAuth, gear import, deauthorization and the
//! webhook subscription.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::routes::{base_url, current_account, user_path};
use crate::services::oauth_state;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add_bike", get(add_bike))
        .route("/stravacallback", get(strava_callback))
        .route("/get_bikes", get(get_bikes))
        .route("/deauthorize", post(deauthorize))
        .route("/webhooksub", post(create_webhook_subscription))
}

/// Start OAuth flow - redirect to Strava authorization.
async fn add_bike(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let signed_state = oauth_state::sign(user.account_id, &state.config.oauth_state_key)?;
    let callback_url = format!("{}/stravacallback", base_url(&state, &headers));

    let auth_url = state
        .strava
        .client()
        .authorization_url(&callback_url, &signed_state)?;

    tracing::info!(
        account_id = user.account_id,
        callback_url = %callback_url,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(auth_url.as_str()))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and link the account.
async fn strava_callback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let account = current_account(&state, user).await?;

    // User declined, or Strava reported a problem
    if let Some(error) = params.error {
        tracing::warn!(account_id = account.id, error = %error, "OAuth error from Strava");
        let redirect = format!(
            "{}?error={}",
            user_path(&account.username),
            urlencoding::encode(&error)
        );
        return Ok(Redirect::to(&redirect));
    }

    let signed_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;
    match oauth_state::verify(&signed_state, &state.config.oauth_state_key) {
        Some(id) if id == account.id => {}
        _ => {
            tracing::warn!(account_id = account.id, "Invalid or foreign OAuth state");
            return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
        }
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!(account_id = account.id, "Exchanging authorization code for tokens");
    let athlete = state.strava.handle_oauth_callback(account.id, &code).await?;

    tracing::info!(
        account_id = account.id,
        athlete_id = athlete.id,
        firstname = athlete.firstname.as_deref().unwrap_or(""),
        "Strava account linked"
    );

    Ok(Redirect::to("/get_bikes"))
}

/// Import the athlete's bikes.
async fn get_bikes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let mut account = current_account(&state, user).await?;
    state.strava.import_gear(&mut account).await?;
    Ok(Redirect::to(&user_path(&account.username)))
}

/// Revoke Strava access and forget the tokens.
async fn deauthorize(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let mut account = current_account(&state, user).await?;
    state.strava.deauthorize(&mut account).await?;

    tracing::info!(account_id = account.id, "Strava access revoked");
    Ok(Redirect::to(&user_path(&account.username)))
}

#[derive(Serialize)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub callback_url: String,
}

/// Register this service's webhook endpoint with Strava.
async fn create_webhook_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionResponse>> {
    let callback_url = format!("{}/webhook", base_url(&state, &headers));

    let subscription = state
        .strava
        .client()
        .create_push_subscription(&callback_url, &state.config.webhook_verify_token)
        .await?;

    tracing::info!(
        account_id = user.account_id,
        subscription_id = subscription.id,
        callback_url = %callback_url,
        "Webhook subscription created"
    );

    Ok(Json(SubscriptionResponse {
        id: subscription.id,
        callback_url,
    }))
}
