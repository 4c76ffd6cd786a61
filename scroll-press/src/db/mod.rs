// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent storage for Scroll Press supporting both Postgres and SQLite databases.
//!
//! The main interface is [`SqlStore`] which offers an interface onto the database with one
//! `impl` block per concern (scrolls, users, sessions, tokens, subjects) in [`stores`].
use anyhow::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::{Any, AnyPool, AnyPoolOptions};
use sqlx::migrate;
use sqlx::migrate::MigrateDatabase;

pub mod errors;
pub mod models;
pub mod stores;

/// SQL based persistent storage for scrolls, subjects, accounts, sessions and one-time tokens.
#[derive(Clone, Debug)]
pub struct SqlStore {
    pub(crate) pool: Pool,
}

impl SqlStore {
    /// Create a new `SqlStore` using the provided db `Pool`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Re-export of generic connection pool type.
pub type Pool = AnyPool;

/// Create database when not existing.
pub async fn create_database(url: &str) -> Result<()> {
    if !Any::database_exists(url).await? {
        Any::create_database(url).await?;
    }

    Ok(())
}

/// Create a database agnostic connection pool.
pub async fn connection_pool(url: &str, max_connections: u32) -> Result<Pool, Error> {
    let pool: Pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    Ok(pool)
}

/// Run any pending database migrations from inside the application.
pub async fn run_pending_migrations(pool: &Pool) -> Result<()> {
    migrate!().run(pool).await?;
    Ok(())
}

/// Serializes a timestamp into the fixed-width RFC 3339 format stored in TEXT columns.
///
/// The fixed width (microseconds, "Z" suffix) makes lexicographic comparison in SQL equal to
/// chronological comparison, which the expiry queries rely on.
pub(crate) fn to_db_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp column back into `DateTime<Utc>`.
pub(crate) fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("invalid timestamp '{}': {}", value, err))
}

/// Returns true when the database rejected a statement because of a unique constraint.
///
/// Concurrent duplicate uploads race past the lookup check, the constraint violation is the
/// backstop and gets translated into the same user-facing "already exists" condition.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // 23505: Postgres unique_violation, 1555/2067: SQLite constraint codes
            let code_matches = db_err
                .code()
                .map(|code| code == "23505" || code == "1555" || code == "2067")
                .unwrap_or(false);

            code_matches || db_err.message().to_uppercase().contains("UNIQUE")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{parse_db_timestamp, to_db_timestamp};

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let encoded = to_db_timestamp(&now);
        let decoded = parse_db_timestamp(&encoded).unwrap();

        assert_eq!(to_db_timestamp(&decoded), encoded);
    }

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let now = Utc::now();
        let later = now + Duration::hours(1);

        assert!(to_db_timestamp(&now) < to_db_timestamp(&later));
    }
}
