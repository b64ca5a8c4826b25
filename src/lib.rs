// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Wax Tracker: keep bike chains waxed on schedule
//!
//! This crate provides the backend for linking Strava accounts, importing
//! bike gear and tracking mileage against each bike's wax limit.

pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Database;
use services::{StravaClient, StravaService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub strava: StravaService,
}

impl AppState {
    /// Wire the Strava service to the configured endpoints and database.
    pub fn new(config: Config, db: Database) -> Self {
        let client = StravaClient::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            config.strava_api_url.clone(),
            config.strava_oauth_url.clone(),
        );
        Self {
            strava: StravaService::new(client, db.clone()),
            db,
            config,
        }
    }
}
