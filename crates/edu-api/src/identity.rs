//! # Identity Resolution
//!
//! Turns credentials into sessions and bearer tokens into principals.
//!
//! - [`register`] creates the role profile, then the credential that points
//!   at it, then issues a token.
//! - [`login`] verifies an email/password pair, stamps `last_login` and
//!   issues a token.
//! - [`resolve_principal`] verifies a token and reloads the credential and
//!   profile it names. It runs on every authenticated request.
//! - [`change_password`] re-hashes the caller's password after checking the
//!   current one.
//!
//! Every login failure (unknown email, inactive account, wrong password)
//! returns the same [`IdentityError::InvalidCredentials`]; the real reason is
//! only logged.

use chrono::{DateTime, Duration, Utc};
use edu_core::{Email, Principal, ProfileId, Role, UserId, ValidationError};
use edu_crypto::{CryptoError, TokenError};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::records::{
    CredentialRecord, StaffStatus, StudentRecord, StudentStatus, TeacherRecord, VolunteerRecord,
};
use crate::state::AppState;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Why an identity operation failed.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("no bearer token presented")]
    MissingToken,

    #[error("token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("token names user {0}, which no longer exists")]
    UnknownUser(UserId),

    #[error("user {0} is inactive")]
    Inactive(UserId),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("current password is incorrect")]
    WrongCurrentPassword,

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("invalid role")]
    InvalidRole,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("credential cryptography failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("credential persistence failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// The role-specific profile behind a credential.
///
/// Serializes as the bare profile record; `Admin` serializes as `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RoleProfile {
    Student(StudentRecord),
    Teacher(TeacherRecord),
    Volunteer(VolunteerRecord),
    Admin,
}

impl RoleProfile {
    /// Profile id, or `None` for admins.
    pub fn id(&self) -> Option<ProfileId> {
        match self {
            Self::Student(r) => Some(ProfileId::from(r.id)),
            Self::Teacher(r) => Some(ProfileId::from(r.id)),
            Self::Volunteer(r) => Some(ProfileId::from(r.id)),
            Self::Admin => None,
        }
    }
}

/// A verified token's principal together with what `/me` reports.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub principal: Principal,
    pub email: Email,
    /// `None` when a non-admin's profile record has gone missing.
    pub profile: Option<RoleProfile>,
}

/// Result of a successful register or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub email: Email,
    pub token: String,
}

/// Registration input before validation.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: String,
}

fn principal_of(user: &CredentialRecord) -> Principal {
    Principal {
        user_id: user.id,
        role: user.role,
        profile_id: user.profile_id,
        is_active: user.is_active,
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Missing(field))
    } else {
        Ok(trimmed)
    }
}

/// Reject blank or short passwords.
pub fn validate_password(password: &str, field: &'static str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Build the profile a new account of `role` starts with.
fn initial_profile(
    role: Role,
    first_name: &str,
    last_name: &str,
    email: &Email,
    phone: Option<String>,
    now: DateTime<Utc>,
) -> RoleProfile {
    let id = Uuid::new_v4();
    match role {
        Role::Student => RoleProfile::Student(StudentRecord {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.clone(),
            phone,
            address: None,
            date_of_birth: None,
            enrollment_date: now,
            status: StudentStatus::Active,
            notes: None,
            created_at: now,
            updated_at: now,
        }),
        Role::Teacher => RoleProfile::Teacher(TeacherRecord {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.clone(),
            phone,
            specialization: None,
            hire_date: now,
            status: StaffStatus::Active,
            notes: None,
            created_at: now,
            updated_at: now,
        }),
        Role::Volunteer => RoleProfile::Volunteer(VolunteerRecord {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.clone(),
            phone,
            status: StaffStatus::Active,
            notes: None,
            created_at: now,
            updated_at: now,
        }),
        Role::Admin => RoleProfile::Admin,
    }
}

/// Put a new profile in its store. Profile emails are unique per kind.
fn store_profile(state: &AppState, profile: &RoleProfile) -> Result<(), IdentityError> {
    let outcome = match profile {
        RoleProfile::Student(r) => state
            .students
            .insert_unique(r.id, r.clone(), |s| s.email.clone()),
        RoleProfile::Teacher(r) => state
            .teachers
            .insert_unique(r.id, r.clone(), |t| t.email.clone()),
        RoleProfile::Volunteer(r) => state
            .volunteers
            .insert_unique(r.id, r.clone(), |v| v.email.clone()),
        RoleProfile::Admin => Ok(()),
    };
    outcome.map_err(|_| IdentityError::DuplicateEmail)
}

fn discard_profile(state: &AppState, profile: &RoleProfile) {
    match profile {
        RoleProfile::Student(r) => {
            state.students.remove(&r.id);
        }
        RoleProfile::Teacher(r) => {
            state.teachers.remove(&r.id);
        }
        RoleProfile::Volunteer(r) => {
            state.volunteers.remove(&r.id);
        }
        RoleProfile::Admin => {}
    }
}

/// Write the profile and credential in one transaction.
async fn persist_registration(
    pool: &PgPool,
    profile: &RoleProfile,
    user: &CredentialRecord,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    match profile {
        RoleProfile::Student(r) => crate::db::profiles::upsert_student(&mut *tx, r).await?,
        RoleProfile::Teacher(r) => crate::db::profiles::upsert_teacher(&mut *tx, r).await?,
        RoleProfile::Volunteer(r) => crate::db::profiles::upsert_volunteer(&mut *tx, r).await?,
        RoleProfile::Admin => {}
    }
    crate::db::users::insert(&mut *tx, user).await?;
    tx.commit().await
}

/// Create a role profile and its credential, and issue a token.
pub async fn register(state: &AppState, form: Registration) -> Result<Session, IdentityError> {
    let first_name = required(&form.first_name, "firstName")?;
    let last_name = required(&form.last_name, "lastName")?;
    let email = Email::parse(&form.email)?;
    validate_password(&form.password, "password")?;
    let role_name = required(&form.role, "role")?;

    if state.users.find(|u| u.email == email).is_some() {
        tracing::warn!("registration rejected: email already registered");
        return Err(IdentityError::DuplicateEmail);
    }
    let role: Role = role_name.parse().map_err(|_| {
        tracing::warn!(role = %role_name, "registration rejected: unknown role");
        IdentityError::InvalidRole
    })?;

    let password_hash = state.passwords.hash(&form.password)?;
    let now = Utc::now();
    let phone = form
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let profile = initial_profile(role, first_name, last_name, &email, phone, now);
    store_profile(state, &profile)?;

    let user = CredentialRecord {
        id: UserId::new(),
        email: email.clone(),
        password_hash,
        role,
        profile_id: profile.id(),
        is_active: true,
        last_login: None,
        created_at: now,
        updated_at: now,
    };

    if state
        .users
        .insert_unique(*user.id.as_uuid(), user.clone(), |u| u.email.clone())
        .is_err()
    {
        discard_profile(state, &profile);
        tracing::warn!("registration rejected: lost race for email");
        return Err(IdentityError::DuplicateEmail);
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = persist_registration(pool, &profile, &user).await {
            state.users.remove(user.id.as_uuid());
            discard_profile(state, &profile);
            if crate::db::is_unique_violation(&e) {
                return Err(IdentityError::DuplicateEmail);
            }
            tracing::error!(user_id = %user.id, error = %e, "failed to persist registration");
            return Err(IdentityError::Database(e));
        }
    }

    let token = state.tokens.issue(user.id)?;
    tracing::info!(user_id = %user.id, role = %role, "user registered");

    Ok(Session {
        principal: principal_of(&user),
        email,
        token,
    })
}

/// Next `last_login` value: now, or just past the previous stamp if the
/// clock has not moved beyond it.
fn next_login_stamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if prev >= now => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Verify an email/password pair and issue a token.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<Session, IdentityError> {
    required(email, "email")?;
    if password.is_empty() {
        return Err(ValidationError::Missing("password").into());
    }

    let email = match Email::parse(email) {
        Ok(email) => email,
        Err(_) => {
            tracing::warn!(reason = "malformed email", "login rejected");
            return Err(IdentityError::InvalidCredentials);
        }
    };

    let Some(user) = state.users.find(|u| u.email == email) else {
        tracing::warn!(reason = "unknown email", "login rejected");
        return Err(IdentityError::InvalidCredentials);
    };
    if !user.is_active {
        tracing::warn!(user_id = %user.id, reason = "account inactive", "login rejected");
        return Err(IdentityError::InvalidCredentials);
    }
    if !state.passwords.verify(password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, reason = "password mismatch", "login rejected");
        return Err(IdentityError::InvalidCredentials);
    }

    let now = Utc::now();
    let Some(user) = state.users.update(user.id.as_uuid(), |u| {
        u.last_login = Some(next_login_stamp(u.last_login, now));
        u.updated_at = now;
    }) else {
        tracing::warn!(user_id = %user.id, reason = "account removed during login", "login rejected");
        return Err(IdentityError::InvalidCredentials);
    };

    if let (Some(pool), Some(at)) = (&state.db_pool, user.last_login) {
        if let Err(e) = crate::db::users::record_login(pool, user.id, at).await {
            tracing::error!(user_id = %user.id, error = %e, "failed to persist last_login");
            return Err(IdentityError::Database(e));
        }
    }

    let token = state.tokens.issue(user.id)?;
    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Session {
        principal: principal_of(&user),
        email: user.email,
        token,
    })
}

/// Verify `token` and load the credential and profile it names.
pub fn resolve_principal(state: &AppState, token: &str) -> Result<ResolvedIdentity, IdentityError> {
    let user_id = state.tokens.verify(token)?;

    let user = state
        .users
        .get(user_id.as_uuid())
        .ok_or(IdentityError::UnknownUser(user_id))?;
    if !user.is_active {
        return Err(IdentityError::Inactive(user_id));
    }

    let profile = match (user.role, user.profile_id) {
        (Role::Admin, _) => Some(RoleProfile::Admin),
        (Role::Student, Some(id)) => state.students.get(id.as_uuid()).map(RoleProfile::Student),
        (Role::Teacher, Some(id)) => state.teachers.get(id.as_uuid()).map(RoleProfile::Teacher),
        (Role::Volunteer, Some(id)) => state
            .volunteers
            .get(id.as_uuid())
            .map(RoleProfile::Volunteer),
        (_, None) => None,
    };
    if profile.is_none() {
        tracing::warn!(user_id = %user.id, role = %user.role, "credential has no profile record");
    }

    Ok(ResolvedIdentity {
        principal: principal_of(&user),
        email: user.email,
        profile,
    })
}

/// Replace the caller's password after verifying the current one.
pub async fn change_password(
    state: &AppState,
    principal: &Principal,
    current: &str,
    new: &str,
) -> Result<(), IdentityError> {
    if current.is_empty() {
        return Err(ValidationError::Missing("currentPassword").into());
    }
    validate_password(new, "newPassword")?;

    let user = state
        .users
        .get(principal.user_id.as_uuid())
        .ok_or(IdentityError::UnknownUser(principal.user_id))?;
    if !state.passwords.verify(current, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "password change rejected: current password mismatch");
        return Err(IdentityError::WrongCurrentPassword);
    }

    let password_hash = state.passwords.hash(new)?;
    let now = Utc::now();
    state
        .users
        .update(user.id.as_uuid(), |u| {
            u.password_hash = password_hash.clone();
            u.updated_at = now;
        })
        .ok_or(IdentityError::UnknownUser(user.id))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::update_password(pool, user.id, &password_hash, now).await {
            tracing::error!(user_id = %user.id, error = %e, "failed to persist password change");
            return Err(IdentityError::Database(e));
        }
    }

    tracing::info!(user_id = %user.id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    fn form(email: &str, role: &str) -> Registration {
        Registration {
            first_name: "A".into(),
            last_name: "B".into(),
            email: email.into(),
            phone: None,
            password: "secret1".into(),
            role: role.into(),
        }
    }

    #[tokio::test]
    async fn register_student_creates_profile_and_credential() {
        let state = test_state();
        let session = register(&state, form("a@x.com", "student")).await.unwrap();

        assert_eq!(session.principal.role, Role::Student);
        assert!(session.principal.is_active);
        let profile_id = session.principal.profile_id.unwrap();
        let profile = state.students.get(profile_id.as_uuid()).unwrap();
        assert_eq!(profile.email.as_str(), "a@x.com");
        assert_eq!(profile.status, StudentStatus::Active);
        assert_eq!(state.users.len(), 1);
    }

    #[tokio::test]
    async fn register_admin_has_no_profile() {
        let state = test_state();
        let session = register(&state, form("root@x.com", "admin")).await.unwrap();
        assert!(session.principal.profile_id.is_none());
        assert!(state.students.is_empty());
        assert!(state.teachers.is_empty());
        assert!(state.volunteers.is_empty());
    }

    #[tokio::test]
    async fn register_each_profile_role() {
        let state = test_state();
        register(&state, form("t@x.com", "teacher")).await.unwrap();
        register(&state, form("v@x.com", "volunteer")).await.unwrap();
        assert_eq!(state.teachers.len(), 1);
        assert_eq!(state.volunteers.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_in_any_case_rejected() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();
        let err = register(&state, form("  A@X.COM ", "teacher")).await.unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail));
        assert_eq!(state.users.len(), 1);
        assert!(state.teachers.is_empty());
    }

    #[tokio::test]
    async fn unknown_role_rejected_without_side_effects() {
        let state = test_state();
        let err = register(&state, form("a@x.com", "principal")).await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidRole));
        assert!(state.users.is_empty());
        assert!(state.students.is_empty());
    }

    #[tokio::test]
    async fn profile_email_clash_rejects_and_stores_nothing() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();
        // Credential removed out of band; the student profile still holds the email.
        let user_id = *state.users.list()[0].id.as_uuid();
        state.users.remove(&user_id);

        let err = register(&state, form("a@x.com", "student")).await.unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail));
        assert!(state.users.is_empty());
        assert_eq!(state.students.len(), 1);
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let state = test_state();

        let mut missing_first = form("a@x.com", "student");
        missing_first.first_name = "  ".into();
        assert!(matches!(
            register(&state, missing_first).await.unwrap_err(),
            IdentityError::Validation(ValidationError::Missing("firstName"))
        ));

        let mut short = form("a@x.com", "student");
        short.password = "abc".into();
        assert!(matches!(
            register(&state, short).await.unwrap_err(),
            IdentityError::Validation(ValidationError::PasswordTooShort { .. })
        ));

        assert!(matches!(
            register(&state, form("no-at-sign", "student")).await.unwrap_err(),
            IdentityError::Validation(ValidationError::InvalidEmail(_))
        ));
        assert!(state.users.is_empty());
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();
        let user = &state.users.list()[0];
        assert_ne!(user.password_hash, "secret1");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn login_with_correct_password_issues_resolvable_token() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();

        let session = login(&state, " A@x.com", "secret1").await.unwrap();
        let resolved = resolve_principal(&state, &session.token).unwrap();
        assert_eq!(resolved.principal, session.principal);
        assert_eq!(resolved.email.as_str(), "a@x.com");
        assert!(matches!(resolved.profile, Some(RoleProfile::Student(_))));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();
        register(&state, form("off@x.com", "student")).await.unwrap();
        let off_id = *state.users.find(|u| u.email.as_str() == "off@x.com").unwrap().id.as_uuid();
        state.users.update(&off_id, |u| u.is_active = false);

        for (email, password) in [
            ("a@x.com", "wrong"),
            ("nobody@x.com", "secret1"),
            ("off@x.com", "secret1"),
        ] {
            let err = login(&state, email, password).await.unwrap_err();
            assert!(matches!(err, IdentityError::InvalidCredentials), "{email}");
        }
    }

    #[tokio::test]
    async fn failed_login_leaves_last_login_untouched() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();
        let _ = login(&state, "a@x.com", "wrong").await;
        assert!(state.users.list()[0].last_login.is_none());
    }

    #[tokio::test]
    async fn last_login_advances_monotonically() {
        let state = test_state();
        register(&state, form("a@x.com", "student")).await.unwrap();

        let mut previous = None;
        for _ in 0..3 {
            login(&state, "a@x.com", "secret1").await.unwrap();
            let stamp = state.users.list()[0].last_login.unwrap();
            if let Some(prev) = previous {
                assert!(stamp > prev);
            }
            previous = Some(stamp);
        }
    }

    #[test]
    fn next_login_stamp_steps_past_stale_clock() {
        let now = Utc::now();
        assert_eq!(next_login_stamp(None, now), now);
        assert!(next_login_stamp(Some(now), now) > now);
        let later = now + Duration::seconds(5);
        assert!(next_login_stamp(Some(later), now) > later);
        let earlier = now - Duration::seconds(5);
        assert_eq!(next_login_stamp(Some(earlier), now), now);
    }

    #[tokio::test]
    async fn resolve_rejects_expired_token() {
        let state = test_state();
        let session = register(&state, form("a@x.com", "student")).await.unwrap();
        let stale = state
            .tokens
            .issue_at(session.principal.user_id, Utc::now() - Duration::days(365))
            .unwrap();
        assert!(matches!(
            resolve_principal(&state, &stale).unwrap_err(),
            IdentityError::Token(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn resolve_rejects_removed_and_inactive_users() {
        let state = test_state();
        let session = register(&state, form("a@x.com", "student")).await.unwrap();
        let id = *session.principal.user_id.as_uuid();

        state.users.update(&id, |u| u.is_active = false);
        assert!(matches!(
            resolve_principal(&state, &session.token).unwrap_err(),
            IdentityError::Inactive(_)
        ));

        state.users.remove(&id);
        assert!(matches!(
            resolve_principal(&state, &session.token).unwrap_err(),
            IdentityError::UnknownUser(_)
        ));
    }

    #[tokio::test]
    async fn resolve_with_missing_profile_yields_none() {
        let state = test_state();
        let session = register(&state, form("t@x.com", "teacher")).await.unwrap();
        let profile_id = session.principal.profile_id.unwrap();
        state.teachers.remove(profile_id.as_uuid());

        let resolved = resolve_principal(&state, &session.token).unwrap();
        assert!(resolved.profile.is_none());
        assert_eq!(resolved.principal.profile_id, Some(profile_id));
    }

    #[tokio::test]
    async fn change_password_requires_current() {
        let state = test_state();
        let session = register(&state, form("a@x.com", "student")).await.unwrap();

        let err = change_password(&state, &session.principal, "wrong1", "newsecret")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::WrongCurrentPassword));

        change_password(&state, &session.principal, "secret1", "newsecret")
            .await
            .unwrap();
        assert!(login(&state, "a@x.com", "secret1").await.is_err());
        assert!(login(&state, "a@x.com", "newsecret").await.is_ok());
    }

    #[tokio::test]
    async fn change_password_validates_new_password() {
        let state = test_state();
        let session = register(&state, form("a@x.com", "student")).await.unwrap();
        let err = change_password(&state, &session.principal, "secret1", "123")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IdentityError::Validation(ValidationError::PasswordTooShort { .. })
        ));
    }

    #[test]
    fn admin_profile_serializes_as_null() {
        assert_eq!(serde_json::to_value(RoleProfile::Admin).unwrap(), serde_json::Value::Null);
    }
}
