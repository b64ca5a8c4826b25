// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and logout.

use axum::{
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::forms::{validate_form, LoginForm, RegistrationForm};
use crate::middleware::auth::{
    create_jwt, removal_cookie, session_cookie, REMEMBER_ME_TTL, SESSION_TTL,
};
use crate::models::account::AccountSummary;
use crate::routes::user_path;
use crate::services::password::{hash_password, verify_password};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
}

/// Create an account.
async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegistrationForm>,
) -> Result<(StatusCode, Json<AccountSummary>)> {
    validate_form(&form)?;

    // bcrypt is CPU-bound; keep it off the async workers
    let cost = state.config.bcrypt_cost;
    let password = form.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let account = state
        .db
        .create_account(&form.username, &form.email, &password_hash)
        .await?;

    tracing::info!(account_id = account.id, username = %account.username, "Account registered");

    Ok((StatusCode::CREATED, Json(AccountSummary::from(&account))))
}

/// Check credentials and start a session.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect)> {
    validate_form(&form)?;

    let Some(account) = state.db.get_account_by_username(&form.username).await? else {
        tracing::info!(username = %form.username, "Login for unknown username");
        return Err(AppError::InvalidCredentials);
    };

    let password = form.password.clone();
    let hash = account.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    if !valid {
        tracing::info!(account_id = account.id, "Login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let remember = form.remember();
    let ttl = if remember { REMEMBER_ME_TTL } else { SESSION_TTL };
    let jwt = create_jwt(account.id, &state.config.secret_key, ttl)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let secure = state
        .config
        .public_url
        .as_deref()
        .is_some_and(|url| url.starts_with("https://"));

    tracing::info!(account_id = account.id, remember, "Logged in");

    Ok((
        jar.add(session_cookie(jwt, remember, secure)),
        Redirect::to(&user_path(&account.username)),
    ))
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.remove(removal_cookie()), Redirect::to("/"))
}
