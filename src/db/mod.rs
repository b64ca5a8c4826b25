//! Database layer (SQLite via sqlx).

pub mod schema;
pub mod sqlite;

pub use schema::SQLITE_INIT;
pub use sqlite::Database;
