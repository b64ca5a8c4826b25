//! SQL DDL for the three application tables.

/// Schema applied at startup; every statement is idempotent.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY NOT NULL,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    access_token TEXT NULL,
    refresh_token TEXT NULL,
    token_expires_at TEXT NULL, -- RFC3339
    strava_linked INTEGER NOT NULL DEFAULT 0,
    strava_athlete_id INTEGER NULL UNIQUE,
    created_at TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Bikes are keyed by the Strava gear id
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS bikes (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    starting_mileage REAL NOT NULL DEFAULT 0,
    current_mileage REAL NOT NULL DEFAULT 0,
    wax_limit REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bikes_account_id ON bikes(account_id);

CREATE TABLE IF NOT EXISTS parts (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    part_type TEXT NOT NULL CHECK (part_type IN ('chain', 'cassette', 'chainring', 'tire', 'brake_pad')),
    bike_id TEXT NOT NULL REFERENCES bikes(id) ON DELETE CASCADE,
    starting_mileage REAL NOT NULL DEFAULT 0,
    current_mileage REAL NOT NULL DEFAULT 0,
    mileage_limit REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_parts_bike_id ON parts(bike_id);
"#;
