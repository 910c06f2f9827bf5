//! Credential persistence operations.
//!
//! All functions operate on the `users` table.

use chrono::{DateTime, Utc};
use edu_core::{Email, ProfileId, Role, UserId};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::decode_error;
use crate::records::CredentialRecord;

/// Insert a new credential record.
pub async fn insert<'e>(
    exec: impl PgExecutor<'e>,
    record: &CredentialRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, role, profile_id,
         is_active, last_login, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id.as_uuid())
    .bind(record.email.as_str())
    .bind(&record.password_hash)
    .bind(record.role.as_str())
    .bind(record.profile_id.map(|p| *p.as_uuid()))
    .bind(record.is_active)
    .bind(record.last_login)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Record a successful login.
pub async fn record_login<'e>(
    exec: impl PgExecutor<'e>,
    id: UserId,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET last_login = $1, updated_at = $1 WHERE id = $2")
        .bind(at)
        .bind(id.as_uuid())
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the stored password hash.
pub async fn update_password<'e>(
    exec: impl PgExecutor<'e>,
    id: UserId,
    password_hash: &str,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(password_hash)
        .bind(at)
        .bind(id.as_uuid())
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all credentials from the database into the in-memory store on startup.
pub async fn load_all<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<CredentialRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, role, profile_id,
         is_active, last_login, created_at, updated_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(exec)
    .await?;

    rows.into_iter().map(UserRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    profile_id: Option<Uuid>,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> Result<CredentialRecord, sqlx::Error> {
        let email = Email::parse(&self.email).map_err(decode_error)?;
        let role: Role = self.role.parse().map_err(decode_error)?;
        Ok(CredentialRecord {
            id: UserId::from(self.id),
            email,
            password_hash: self.password_hash,
            role,
            profile_id: self.profile_id.map(ProfileId::from),
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
