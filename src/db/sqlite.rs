// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Accounts (credentials and Strava tokens)
//! - Bikes (imported Strava gear)
//! - Parts (components attached to bikes)

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteExecutor, SqlitePool, Transaction};

use crate::db::SQLITE_INIT;
use crate::error::AppError;
use crate::models::account::StravaCredentials;
use crate::models::{Account, Bike, Part, PartType};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, access_token, refresh_token, \
     token_expires_at, strava_linked, strava_athlete_id, created_at";

/// Database handle shared by all handlers.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and apply the schema.
    ///
    /// In-memory URLs are pinned to a single long-lived connection, since
    /// every SQLite connection to `:memory:` opens a distinct database.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:");
        let mut pool_opts = SqlitePoolOptions::new();
        if in_memory {
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_opts
            .connect_with(connect_opts)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        apply_schema(&pool).await?;

        tracing::info!(in_memory, "Database ready");
        Ok(Self { pool })
    }

    /// Start a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Insert a new account. Duplicate usernames or emails become
    /// validation errors.
    pub async fn create_account(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, AppError> {
        let sql = format!(
            "INSERT INTO accounts (username, email, password_hash, strava_linked, created_at) \
             VALUES (?, ?, ?, 0, ?) RETURNING {}",
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if !AppError::is_unique_violation(&e) {
                    return AppError::from(e);
                }
                if e.to_string().contains("accounts.email") {
                    AppError::validation("Please use a different email address.")
                } else {
                    AppError::validation("Please use a different username.")
                }
            })
    }

    pub async fn get_account(&self, account_id: i64) -> Result<Option<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts WHERE username = ?", ACCOUNT_COLUMNS);
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Find the account linked to a Strava athlete.
    pub async fn get_account_by_athlete_id(
        &self,
        athlete_id: i64,
    ) -> Result<Option<Account>, AppError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE strava_athlete_id = ?",
            ACCOUNT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(athlete_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS);
        Ok(sqlx::query_as::<_, Account>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Overwrite the stored token pair and expiry.
    pub async fn set_tokens(
        &self,
        account_id: i64,
        credentials: &StravaCredentials,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = ?, refresh_token = ?, token_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&credentials.access_token)
        .bind(&credentials.refresh_token)
        .bind(credentials.expires_at)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store tokens from a completed code exchange and mark the account linked.
    ///
    /// A previous link of the same athlete to another account is released first.
    pub async fn link_strava(
        &self,
        account_id: i64,
        athlete_id: i64,
        credentials: &StravaCredentials,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE accounts
            SET strava_athlete_id = NULL, strava_linked = 0,
                access_token = NULL, refresh_token = NULL, token_expires_at = NULL
            WHERE strava_athlete_id = ? AND id != ?
            "#,
        )
        .bind(athlete_id)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = ?, refresh_token = ?, token_expires_at = ?,
                strava_linked = 1, strava_athlete_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&credentials.access_token)
        .bind(&credentials.refresh_token)
        .bind(credentials.expires_at)
        .bind(athlete_id)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Forget all Strava credentials for an account.
    pub async fn unlink_strava(&self, account_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = NULL, refresh_token = NULL, token_expires_at = NULL,
                strava_linked = 0, strava_athlete_id = NULL
            WHERE id = ?
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Bike Operations ─────────────────────────────────────────

    /// Insert a bike imported from Strava, or refresh its name and mileage.
    ///
    /// New bikes start with their baseline equal to the current odometer.
    /// Returns `true` if the bike was newly created. A gear id already owned
    /// by a different account is left untouched and reported as `false`.
    pub async fn upsert_bike(
        &self,
        account_id: i64,
        gear_id: &str,
        name: &str,
        current_mileage: f64,
        wax_limit: f64,
    ) -> Result<bool, AppError> {
        let existing = self.get_bike(gear_id).await?;

        match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO bikes (id, name, account_id, starting_mileage, current_mileage, wax_limit)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(gear_id)
                .bind(name)
                .bind(account_id)
                .bind(current_mileage)
                .bind(current_mileage)
                .bind(wax_limit)
                .execute(&self.pool)
                .await?;
                Ok(true)
            }
            Some(bike) if bike.account_id == account_id => {
                sqlx::query("UPDATE bikes SET name = ?, current_mileage = ? WHERE id = ?")
                    .bind(name)
                    .bind(current_mileage)
                    .bind(gear_id)
                    .execute(&self.pool)
                    .await?;
                Ok(false)
            }
            Some(bike) => {
                tracing::warn!(
                    gear_id,
                    owner = bike.account_id,
                    account_id,
                    "Gear already owned by another account, skipping"
                );
                Ok(false)
            }
        }
    }

    pub async fn get_bike(&self, bike_id: &str) -> Result<Option<Bike>, AppError> {
        Ok(sqlx::query_as::<_, Bike>(
            r#"
            SELECT id, name, account_id, starting_mileage, current_mileage, wax_limit
            FROM bikes
            WHERE id = ?
            "#,
        )
        .bind(bike_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Get a bike only if it belongs to the given account.
    pub async fn get_bike_for_account(
        &self,
        bike_id: &str,
        account_id: i64,
    ) -> Result<Option<Bike>, AppError> {
        Ok(self
            .get_bike(bike_id)
            .await?
            .filter(|bike| bike.account_id == account_id))
    }

    pub async fn list_bikes(&self, account_id: i64) -> Result<Vec<Bike>, AppError> {
        Ok(sqlx::query_as::<_, Bike>(
            r#"
            SELECT id, name, account_id, starting_mileage, current_mileage, wax_limit
            FROM bikes
            WHERE account_id = ?
            ORDER BY name, id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Set a bike's current odometer on any executor (pool or transaction).
    pub async fn set_current_mileage<'e>(
        executor: impl SqliteExecutor<'e>,
        bike_id: &str,
        miles: f64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE bikes SET current_mileage = ? WHERE id = ?")
            .bind(miles)
            .bind(bike_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_current_mileage(&self, bike_id: &str, miles: f64) -> Result<(), AppError> {
        Self::set_current_mileage(&self.pool, bike_id, miles).await?;
        Ok(())
    }

    pub async fn set_wax_limit(&self, bike_id: &str, wax_limit: f64) -> Result<(), AppError> {
        sqlx::query("UPDATE bikes SET wax_limit = ? WHERE id = ?")
            .bind(wax_limit)
            .bind(bike_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_starting_mileage(&self, bike_id: &str, miles: f64) -> Result<(), AppError> {
        sqlx::query("UPDATE bikes SET starting_mileage = ? WHERE id = ?")
            .bind(miles)
            .bind(bike_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reset the wax baseline to the current odometer.
    pub async fn wax_bike(&self, bike_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE bikes SET starting_mileage = current_mileage WHERE id = ?")
            .bind(bike_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a bike; its parts go with it.
    pub async fn delete_bike(&self, bike_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM bikes WHERE id = ?")
            .bind(bike_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Part Operations ─────────────────────────────────────────

    /// Create a part whose mileage baseline is the bike's current odometer.
    pub async fn create_part(
        &self,
        bike: &Bike,
        name: &str,
        part_type: PartType,
        mileage_limit: f64,
    ) -> Result<Part, AppError> {
        sqlx::query_as::<_, Part>(
            r#"
            INSERT INTO parts (name, part_type, bike_id, starting_mileage, current_mileage, mileage_limit)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, part_type, bike_id, starting_mileage, current_mileage, mileage_limit
            "#,
        )
        .bind(name)
        .bind(part_type.as_str())
        .bind(&bike.id)
        .bind(bike.current_mileage)
        .bind(bike.current_mileage)
        .bind(mileage_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::validation("Please use a different part name.")
            } else {
                AppError::from(e)
            }
        })
    }

    pub async fn get_part(&self, part_id: i64) -> Result<Option<Part>, AppError> {
        Ok(sqlx::query_as::<_, Part>(
            r#"
            SELECT id, name, part_type, bike_id, starting_mileage, current_mileage, mileage_limit
            FROM parts
            WHERE id = ?
            "#,
        )
        .bind(part_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_parts(&self, bike_id: &str) -> Result<Vec<Part>, AppError> {
        Ok(sqlx::query_as::<_, Part>(
            r#"
            SELECT id, name, part_type, bike_id, starting_mileage, current_mileage, mileage_limit
            FROM parts
            WHERE bike_id = ?
            ORDER BY id
            "#,
        )
        .bind(bike_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), AppError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
