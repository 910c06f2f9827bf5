//! # Database Persistence Layer
//!
//! Provides Postgres persistence for credentials and role profiles via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When a database URL is configured,
//! credential records and student/teacher/volunteer profiles are written
//! through to PostgreSQL and loaded back at startup. When absent, the API
//! operates in in-memory-only mode (suitable for development and testing).
//!
//! Groups, lessons, assignments, attendance and progress are held in memory
//! only.
//!
//! Functions take any `PgExecutor` so registration can write the profile and
//! the credential in one transaction.

pub mod profiles;
pub mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Connect to `url` and run embedded migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Whether `err` is a unique-constraint violation reported by Postgres.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

/// Wrap a stored value that no longer parses as a decode error.
pub(crate) fn decode_error(
    err: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_pool_without_url_is_in_memory() {
        assert!(init_pool(None).await.unwrap().is_none());
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
