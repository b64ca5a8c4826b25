// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod oauth_state;
pub mod password;
pub mod strava;

pub use strava::{ImportSummary, StravaClient, StravaService, SyncOutcome};
