// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account page plus bike and part management (authenticated).

use crate::error::{AppError, Result};
use crate::forms::{validate_form, AddPartForm, EditStartingForm, SetLimitForm};
use crate::middleware::auth::AuthUser;
use crate::models::account::AccountSummary;
use crate::models::part::PartView;
use crate::models::{Bike, BikeView};
use crate::routes::{current_account, user_path};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/{username}", get(user_page))
        .route("/bike/{bike_id}", get(bike_detail))
        .route("/part/{part_id}", get(part_detail))
        .route("/add_part/{bike_id}", post(add_part))
        .route("/set_limit/{bike_id}", post(set_limit))
        .route("/wax/{bike_id}", post(wax))
        .route("/edit_starting/{bike_id}", post(edit_starting))
        .route("/delete/{bike_id}", post(delete_bike))
}

// ─── Account Page ────────────────────────────────────────────

#[derive(Serialize)]
pub struct UserPageResponse {
    pub account: AccountSummary,
    pub bikes: Vec<BikeView>,
}

/// The logged-in user's page: refresh, sync, then list bikes.
async fn user_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<Json<UserPageResponse>> {
    let mut account = current_account(&state, user).await?;
    if account.username != username {
        return Err(AppError::Forbidden(
            "You can only view your own page".to_string(),
        ));
    }

    if account.strava_linked {
        state.strava.refresh_if_expired(&mut account).await?;
        state.strava.sync_mileage(&account).await;
    }

    let bikes = state.db.list_bikes(account.id).await?;

    Ok(Json(UserPageResponse {
        account: AccountSummary::from(&account),
        bikes: bikes.iter().map(BikeView::from).collect(),
    }))
}

// ─── Bikes ───────────────────────────────────────────────────

/// Fetch a bike the caller owns; anything else is 404.
async fn owned_bike(state: &AppState, user: AuthUser, bike_id: &str) -> Result<Bike> {
    state
        .db
        .get_bike_for_account(bike_id, user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bike {} not found", bike_id)))
}

fn bike_path(bike_id: &str) -> String {
    format!("/bike/{}", urlencoding::encode(bike_id))
}

async fn bike_detail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(bike_id): Path<String>,
) -> Result<Json<BikeView>> {
    let bike = owned_bike(&state, user, &bike_id).await?;
    let parts = state.db.list_parts(&bike.id).await?;

    let mut view = BikeView::from(&bike);
    view.parts = Some(parts.into_iter().map(PartView::from).collect());
    Ok(Json(view))
}

async fn set_limit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(bike_id): Path<String>,
    Form(form): Form<SetLimitForm>,
) -> Result<Redirect> {
    validate_form(&form)?;
    let bike = owned_bike(&state, user, &bike_id).await?;

    state.db.set_wax_limit(&bike.id, form.wax_limit).await?;
    tracing::info!(bike_id = %bike.id, wax_limit = form.wax_limit, "Wax limit set");

    Ok(Redirect::to(&bike_path(&bike.id)))
}

/// Record a wax: the current odometer becomes the new baseline.
async fn wax(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(bike_id): Path<String>,
) -> Result<Redirect> {
    let bike = owned_bike(&state, user, &bike_id).await?;

    state.db.wax_bike(&bike.id).await?;
    tracing::info!(
        bike_id = %bike.id,
        miles_since_wax = bike.miles_since_wax(),
        "Bike waxed"
    );

    Ok(Redirect::to(&bike_path(&bike.id)))
}

async fn edit_starting(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(bike_id): Path<String>,
    Form(form): Form<EditStartingForm>,
) -> Result<Redirect> {
    validate_form(&form)?;
    let bike = owned_bike(&state, user, &bike_id).await?;

    state
        .db
        .set_starting_mileage(&bike.id, form.starting_mileage)
        .await?;

    Ok(Redirect::to(&bike_path(&bike.id)))
}

/// Delete a bike and, through the foreign key, its parts.
async fn delete_bike(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(bike_id): Path<String>,
) -> Result<Redirect> {
    let account = current_account(&state, user).await?;
    let bike = owned_bike(&state, user, &bike_id).await?;

    state.db.delete_bike(&bike.id).await?;
    tracing::info!(account_id = account.id, bike_id = %bike.id, "Bike deleted");

    Ok(Redirect::to(&user_path(&account.username)))
}

// ─── Parts ───────────────────────────────────────────────────

async fn part_detail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(part_id): Path<i64>,
) -> Result<Json<PartView>> {
    let not_found = || AppError::NotFound(format!("Part {} not found", part_id));

    let part = state.db.get_part(part_id).await?.ok_or_else(not_found)?;
    // Ownership goes through the bike
    state
        .db
        .get_bike_for_account(&part.bike_id, user.account_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(PartView::from(part)))
}

async fn add_part(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(bike_id): Path<String>,
    Form(form): Form<AddPartForm>,
) -> Result<Redirect> {
    validate_form(&form)?;
    let part_type = form.part_type()?;
    let bike = owned_bike(&state, user, &bike_id).await?;

    let part = state
        .db
        .create_part(&bike, &form.name, part_type, form.mileage_limit)
        .await?;
    tracing::info!(bike_id = %bike.id, part_id = part.id, "Part added");

    Ok(Redirect::to(&bike_path(&bike.id)))
}
