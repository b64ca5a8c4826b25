// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unauthenticated diagnostic listing of accounts.
//!
//! Only non-secret columns are exposed.

use crate::error::Result;
use crate::models::account::AccountSummary;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/read", get(read_accounts))
}

#[derive(Serialize)]
pub struct AccountListing {
    #[serde(flatten)]
    pub account: AccountSummary,
    pub bike_count: usize,
}

async fn read_accounts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<AccountListing>>> {
    let accounts = state.db.list_accounts().await?;

    let mut listing = Vec::with_capacity(accounts.len());
    for account in &accounts {
        let bike_count = state.db.list_bikes(account.id).await?.len();
        listing.push(AccountListing {
            account: AccountSummary::from(account),
            bike_count,
        });
    }

    Ok(Json(listing))
}
