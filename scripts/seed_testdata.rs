// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Insert the demo accounts `bob` and `joe` (password `password`).
//!
//! Both rows go in one transaction. Running it against an already seeded
//! database rolls back and reports the conflict.

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wax_tracker::{
    config::Config, db::Database, error::AppError, services::password::hash_password,
};

const DEMO_ACCOUNTS: &[(&str, &str)] = &[("bob", "bob@bob.com"), ("joe", "joe@joe.com")];
const DEMO_PASSWORD: &str = "password";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("info"))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;

    let mut tx = db.begin().await?;
    let mut conflict = None;

    for &(username, email) in DEMO_ACCOUNTS {
        let password_hash = hash_password(DEMO_PASSWORD, config.bcrypt_cost)?;
        let result = sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, strava_linked, created_at) \
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => tracing::info!(username, "Demo account added"),
            Err(e) if AppError::is_unique_violation(&e) => {
                conflict = Some((username, e));
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    match conflict {
        None => {
            tx.commit().await?;
            tracing::info!(count = DEMO_ACCOUNTS.len(), "Test data seeded");
        }
        Some((username, e)) => {
            tx.rollback().await?;
            tracing::warn!(username, error = %e, "Demo data already present, nothing changed");
        }
    }

    Ok(())
}
