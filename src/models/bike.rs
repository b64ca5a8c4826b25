// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Bike model: a Strava gear record with a wax baseline.

use serde::Serialize;
use sqlx::FromRow;

use crate::models::part::PartView;

/// Wax limit assigned to newly imported bikes (miles).
pub const DEFAULT_WAX_LIMIT: f64 = 300.0;

/// Stored bike record.
#[derive(Debug, Clone, FromRow)]
pub struct Bike {
    /// Strava gear ID (e.g. "b1234567")
    pub id: String,
    /// Display name from Strava
    pub name: String,
    /// Owning account
    pub account_id: i64,
    /// Odometer reading at the last wax (miles)
    pub starting_mileage: f64,
    /// Latest odometer reading synced from Strava (miles)
    pub current_mileage: f64,
    /// Miles between waxes
    pub wax_limit: f64,
}

impl Bike {
    /// Miles ridden since the last wax.
    pub fn miles_since_wax(&self) -> f64 {
        round_tenth(self.current_mileage - self.starting_mileage)
    }

    /// Miles left before the wax limit is reached (never negative).
    pub fn miles_remaining(&self) -> f64 {
        round_tenth((self.wax_limit - self.miles_since_wax()).max(0.0))
    }

    pub fn needs_wax(&self) -> bool {
        self.miles_since_wax() >= self.wax_limit
    }
}

/// Bike as returned by the API, with derived wax status.
#[derive(Debug, Clone, Serialize)]
pub struct BikeView {
    pub id: String,
    pub name: String,
    pub starting_mileage: f64,
    pub current_mileage: f64,
    pub wax_limit: f64,
    pub miles_since_wax: f64,
    pub miles_remaining: f64,
    pub needs_wax: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<PartView>>,
}

impl From<&Bike> for BikeView {
    fn from(bike: &Bike) -> Self {
        Self {
            id: bike.id.clone(),
            name: bike.name.clone(),
            starting_mileage: bike.starting_mileage,
            current_mileage: bike.current_mileage,
            wax_limit: bike.wax_limit,
            miles_since_wax: bike.miles_since_wax(),
            miles_remaining: bike.miles_remaining(),
            needs_wax: bike.needs_wax(),
            parts: None,
        }
    }
}

/// Convert a distance in meters (as Strava reports it) to miles,
/// rounded to one decimal place.
pub fn meters_to_miles(meters: f64) -> f64 {
    const METERS_PER_MILE: f64 = 1609.344;
    round_tenth(meters / METERS_PER_MILE)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
