// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    mode: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: Option<String>,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let token_matches =
        params.verify_token.as_deref() == Some(state.config.webhook_verify_token.as_str());

    match params.challenge {
        Some(challenge) if token_matches => {
            tracing::info!(mode = ?params.mode, "Webhook subscription verified");
            (StatusCode::OK, Json(VerifyResponse { challenge }))
        }
        _ => {
            tracing::warn!(mode = ?params.mode, "Webhook verification failed: invalid token");
            (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
        }
    }
}

/// Strava webhook event payload. Every field is optional so that partial
/// or unexpected events still parse.
#[derive(Deserialize, Debug, Default)]
struct WebhookEvent {
    #[serde(default)]
    object_type: Option<String>, // "activity" or "athlete"
    #[serde(default)]
    object_id: Option<i64>,
    #[serde(default)]
    aspect_type: Option<String>, // "create", "update", "delete"
    #[serde(default)]
    owner_id: Option<i64>,
    #[serde(default)]
    gear_id: Option<String>,
    #[serde(default)]
    updates: Option<HashMap<String, serde_json::Value>>,
}

impl WebhookEvent {
    /// Gear id carried at the top level or inside `updates`.
    fn gear_id(&self) -> Option<String> {
        if let Some(id) = self.gear_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        self.updates
            .as_ref()
            .and_then(|u| u.get("gear_id"))
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Strava sends: object_type="athlete", aspect_type="update",
    /// updates={"authorized": "false"}
    fn is_deauthorization(&self) -> bool {
        self.object_type.as_deref() == Some("athlete")
            && self
                .updates
                .as_ref()
                .and_then(|u| u.get("authorized"))
                .is_some_and(|v| v == false || v == "false")
    }
}

/// Handle incoming webhook events (POST).
async fn handle_event(State(state): State<Arc<AppState>>, body: Bytes) -> Result<StatusCode> {
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse webhook event");
            return Ok(StatusCode::OK); // Still return 200 to Strava to avoid retries
        }
    };

    tracing::info!(
        object_type = ?event.object_type,
        object_id = ?event.object_id,
        aspect_type = ?event.aspect_type,
        owner_id = ?event.owner_id,
        "Webhook event received"
    );

    if let Some(gear_id) = event.gear_id() {
        return handle_gear_event(&state, &gear_id).await;
    }

    if event.is_deauthorization() {
        let athlete_id = event.owner_id.or(event.object_id);
        handle_deauthorization(&state, athlete_id).await;
        return Ok(StatusCode::OK);
    }

    match (event.object_type.as_deref(), event.aspect_type.as_deref()) {
        (Some("activity"), Some("create" | "update")) => {
            if let Some(owner_id) = event.owner_id {
                handle_activity_event(&state, owner_id).await;
            }
        }
        _ => {
            tracing::debug!(
                object_type = ?event.object_type,
                aspect_type = ?event.aspect_type,
                "Ignoring unhandled event type"
            );
        }
    }

    Ok(StatusCode::OK)
}

/// Re-read one bike from Strava. Unknown gear is 404; an unlinked owner is a no-op.
async fn handle_gear_event(state: &AppState, gear_id: &str) -> Result<StatusCode> {
    let bike = state
        .db
        .get_bike(gear_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bike {} not found", gear_id)))?;

    let mut account = state
        .db
        .get_account(bike.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Owner of bike {} not found", gear_id)))?;

    // Strava may still deliver events after the owner unlinked.
    if account.access_token.is_none() {
        tracing::warn!(
            bike_id = %bike.id,
            account_id = account.id,
            "Gear event for unlinked account, ignoring"
        );
        return Ok(StatusCode::OK);
    }

    let miles = state.strava.sync_bike(&mut account, &bike).await?;
    tracing::info!(bike_id = %bike.id, current_mileage = miles, "Bike updated from webhook");

    Ok(StatusCode::OK)
}

async fn handle_deauthorization(state: &AppState, athlete_id: Option<i64>) {
    let Some(athlete_id) = athlete_id else {
        return;
    };

    match state.db.get_account_by_athlete_id(athlete_id).await {
        Ok(Some(account)) => {
            if let Err(e) = state.db.unlink_strava(account.id).await {
                tracing::error!(error = %e, account_id = account.id, "Failed to unlink account");
            } else {
                tracing::info!(account_id = account.id, athlete_id, "Athlete deauthorized");
            }
        }
        Ok(None) => tracing::debug!(athlete_id, "Deauthorization for unknown athlete"),
        Err(e) => tracing::error!(error = %e, "Failed to look up athlete"),
    }
}

/// A new or edited ride changes odometers; resync the owner's bikes.
async fn handle_activity_event(state: &AppState, owner_id: i64) {
    let mut account = match state.db.get_account_by_athlete_id(owner_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            tracing::debug!(owner_id, "Activity for unknown athlete");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up athlete");
            return;
        }
    };

    if let Err(e) = state.strava.refresh_if_expired(&mut account).await {
        tracing::error!(error = %e, account_id = account.id, "Token refresh failed");
        return;
    }

    state.strava.sync_mileage(&account).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_gear_id_top_level_or_updates() {
        assert_eq!(
            parse(serde_json::json!({"gear_id": "b1"})).gear_id().as_deref(),
            Some("b1")
        );
        assert_eq!(
            parse(serde_json::json!({"updates": {"gear_id": "b2"}}))
                .gear_id()
                .as_deref(),
            Some("b2")
        );
        assert_eq!(parse(serde_json::json!({"gear_id": ""})).gear_id(), None);
        assert_eq!(WebhookEvent::default().gear_id(), None);
    }

    #[test]
    fn test_is_deauthorization() {
        let event = parse(serde_json::json!({
            "object_type": "athlete",
            "aspect_type": "update",
            "object_id": 1,
            "owner_id": 1,
            "updates": {"authorized": "false"}
        }));
        assert!(event.is_deauthorization());

        let event = parse(serde_json::json!({
            "object_type": "activity",
            "updates": {"authorized": "false"}
        }));
        assert!(!event.is_deauthorization());

        let event = parse(serde_json::json!({
            "object_type": "athlete",
            "updates": {"title": "x"}
        }));
        assert!(!event.is_deauthorization());
    }
}
