//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! AppState is the explicitly constructed application context. It holds:
//! - **Credential and profile stores**: users, students, teachers, volunteers
//! - **Resource stores**: groups, memberships, learning modules, lessons,
//!   assignments, submissions, attendance, progress
//! - **Credential cryptography**: the token signer and password hasher,
//!   built once from configuration and read-only afterwards
//! - **Database pool** (optional): write-through persistence for credentials
//!   and profiles
//!
//! Nothing here is a process global; `main` builds one `AppState` and the
//! router clones it into handlers.

use std::collections::HashMap;
use std::sync::Arc;

use edu_crypto::{CryptoError, PasswordCost, PasswordHasher, TokenConfig, TokenSigner};
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::records::{
    AssignmentRecord, AttendanceRecord, CredentialRecord, GroupRecord, LearningModuleRecord,
    LessonRecord,
    ProgressRecord, StudentGroupRecord, StudentRecord, SubmissionRecord, TeacherGroupRecord,
    TeacherRecord, VolunteerRecord,
};

// -- Generic In-Memory Store --------------------------------------------------

/// A write would give two records the same key.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a record with the same key already exists")]
pub struct DuplicateKey;

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert a record unless another record already has the same `key`.
    ///
    /// The scan and the insert happen under one write lock, so two racing
    /// inserts with the same key cannot both succeed.
    pub fn insert_unique<K: PartialEq>(
        &self,
        id: Uuid,
        value: T,
        key: impl Fn(&T) -> K,
    ) -> Result<(), DuplicateKey> {
        let mut guard = self.data.write();
        let new_key = key(&value);
        if guard.contains_key(&id) || guard.values().any(|existing| key(existing) == new_key) {
            return Err(DuplicateKey);
        }
        guard.insert(id, value);
        Ok(())
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// First record matching `pred`, in no particular order.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// All records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Update a record, rejecting the change if its `key` would then collide
    /// with another record. The stored record is untouched on rejection.
    ///
    /// Returns `None` if the record doesn't exist.
    pub fn update_unique<K: PartialEq>(
        &self,
        id: &Uuid,
        key: impl Fn(&T) -> K,
        f: impl FnOnce(&mut T),
    ) -> Option<Result<T, DuplicateKey>> {
        let mut guard = self.data.write();
        let mut candidate = guard.get(id)?.clone();
        f(&mut candidate);
        let new_key = key(&candidate);
        let collides = guard
            .iter()
            .any(|(other_id, other)| other_id != id && key(other) == new_key);
        if collides {
            return Some(Err(DuplicateKey));
        }
        guard.insert(*id, candidate.clone());
        Some(Ok(candidate))
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure runs under a single write lock and may reject the update
    /// by returning `Err`. Returns `None` if the record doesn't exist.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Remove every record matching `pred` under one write lock. Returns how
    /// many were removed.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        let mut guard = self.data.write();
        let before = guard.len();
        guard.retain(|_, v| !pred(v));
        before - guard.len()
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Application State --------------------------------------------------------

/// Application configuration, assembled once at startup.
///
/// Custom `Debug` redacts the database URL; the token secret is redacted by
/// [`TokenConfig`]'s own `Debug`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Identity token signing configuration.
    pub token: TokenConfig,
    /// Argon2 cost for newly hashed passwords.
    pub password_cost: PasswordCost,
    /// Postgres connection string. `None` runs in-memory only.
    pub database_url: Option<String>,
    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("token", &self.token)
            .field("password_cost", &self.password_cost)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_json", &self.log_json)
            .finish()
    }
}

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each `Store`.
#[derive(Debug, Clone)]
pub struct AppState {
    // -- Identity --
    pub users: Store<CredentialRecord>,
    pub students: Store<StudentRecord>,
    pub teachers: Store<TeacherRecord>,
    pub volunteers: Store<VolunteerRecord>,

    // -- Resources --
    pub groups: Store<GroupRecord>,
    pub student_groups: Store<StudentGroupRecord>,
    pub teacher_groups: Store<TeacherGroupRecord>,
    pub modules: Store<LearningModuleRecord>,
    pub lessons: Store<LessonRecord>,
    pub assignments: Store<AssignmentRecord>,
    pub submissions: Store<SubmissionRecord>,
    pub attendance: Store<AttendanceRecord>,
    pub progress: Store<ProgressRecord>,

    // -- Credential cryptography --
    pub tokens: Arc<TokenSigner>,
    pub passwords: Arc<PasswordHasher>,

    // -- Database persistence (optional) --
    /// When `Some`, credentials and profiles are written through to Postgres.
    /// When `None`, the API operates in in-memory-only mode.
    pub db_pool: Option<PgPool>,

    // -- Configuration --
    pub config: AppConfig,
}

impl AppState {
    /// Build the application state, rejecting invalid token or password
    /// configuration.
    pub fn try_with_config(config: AppConfig, db_pool: Option<PgPool>) -> Result<Self, CryptoError> {
        let tokens = TokenSigner::new(&config.token)?;
        let passwords = PasswordHasher::new(config.password_cost)?;

        Ok(Self {
            users: Store::new(),
            students: Store::new(),
            teachers: Store::new(),
            volunteers: Store::new(),
            groups: Store::new(),
            student_groups: Store::new(),
            teacher_groups: Store::new(),
            modules: Store::new(),
            lessons: Store::new(),
            assignments: Store::new(),
            submissions: Store::new(),
            attendance: Store::new(),
            progress: Store::new(),
            tokens: Arc::new(tokens),
            passwords: Arc::new(passwords),
            db_pool,
            config,
        })
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available. Loads every
    /// persisted credential and profile so lookups stay synchronous.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let students = crate::db::profiles::load_students(pool).await?;
        let student_count = students.len();
        for record in students {
            self.students.insert(record.id, record);
        }

        let teachers = crate::db::profiles::load_teachers(pool).await?;
        let teacher_count = teachers.len();
        for record in teachers {
            self.teachers.insert(record.id, record);
        }

        let volunteers = crate::db::profiles::load_volunteers(pool).await?;
        let volunteer_count = volunteers.len();
        for record in volunteers {
            self.volunteers.insert(record.id, record);
        }

        let users = crate::db::users::load_all(pool).await?;
        let user_count = users.len();
        for record in users {
            self.users.insert(*record.id.as_uuid(), record);
        }

        tracing::info!(
            users = user_count,
            students = student_count,
            teachers = teacher_count,
            volunteers = volunteer_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}
