// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod account;
pub mod bike;
pub mod part;

pub use account::Account;
pub use bike::{Bike, BikeView, DEFAULT_WAX_LIMIT};
pub use part::{Part, PartType};
