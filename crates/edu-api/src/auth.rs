//! # Authentication Middleware & Gate Helpers
//!
//! Bearer-token middleware that resolves the caller before any protected
//! handler runs, and the helpers handlers use to apply the Authorization
//! Gate.
//!
//! ## Request flow
//!
//! ```text
//! Authorization: Bearer <jwt>
//!   → auth_middleware          401 if missing, invalid, expired, unknown or inactive
//!   → ResolvedIdentity in request extensions
//!   → handler: require_roles   403 if the role is not in the route's set
//!   → handler: require_owner   403 if neither admin nor owner (owned resources only)
//! ```
//!
//! Every protected route checks its role set before it looks anything up, so
//! a rejected caller learns nothing about whether the resource exists.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use edu_core::{authorize, authorize_ownership, Principal, ProfileId, Role};

use crate::error::AppError;
use crate::identity::{self, IdentityError, ResolvedIdentity};
use crate::state::AppState;

/// Resolve the bearer token into a [`ResolvedIdentity`] and attach it to the
/// request. Mounted with `from_fn_with_state` on every protected router.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>()
    else {
        tracing::warn!(path = %request.uri().path(), "authentication failed: no bearer token");
        return Err(IdentityError::MissingToken.into());
    };

    match identity::resolve_principal(&state, bearer.token()) {
        Ok(resolved) => {
            request.extensions_mut().insert(resolved);
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::warn!(path = %request.uri().path(), reason = %err, "authentication failed");
            Err(err.into())
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ResolvedIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedIdentity>()
            .cloned()
            .ok_or_else(|| IdentityError::MissingToken.into())
    }
}

/// The authenticated principal for the current request.
///
/// Returns 401 if the auth middleware did not run for this route.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolved = ResolvedIdentity::from_request_parts(parts, state).await?;
        Ok(Caller(resolved.principal))
    }
}

/// Admit the caller only if its role is in `allowed`.
pub fn require_roles(principal: &Principal, allowed: &[Role]) -> Result<(), AppError> {
    authorize(principal, allowed).map_err(|denied| {
        tracing::warn!(user_id = %principal.user_id, reason = %denied, "authorization denied");
        AppError::from(denied)
    })
}

/// Admit an admin or the owning profile. `action` names the refused action
/// in the rejection message, e.g. `"delete this assignment"`.
pub fn require_owner(principal: &Principal, owner: ProfileId, action: &str) -> Result<(), AppError> {
    authorize_ownership(principal, owner).map_err(|denied| {
        tracing::warn!(
            user_id = %principal.user_id,
            owner = %owner,
            reason = %denied,
            "ownership check failed"
        );
        AppError::not_owner(action)
    })
}
