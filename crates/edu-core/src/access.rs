//! # Authorization Gate
//!
//! Two checks decide whether an authenticated request may proceed:
//!
//! - [`authorize`] admits a [`Principal`] whose role is in the route's
//!   declared set. Each route lists its own set; there is no hierarchy and
//!   `Admin` is admitted only where a route names it.
//! - [`authorize_ownership`] admits an admin, or a principal whose profile is
//!   the recorded owner of the resource being mutated.
//!
//! Both are terminal: the result is admit or [`AccessDenied`], never a retry
//! or partial outcome. Authentication failures are not represented here; by
//! the time a `Principal` exists the caller is already authenticated.

use thiserror::Error;

use crate::identity::{ProfileId, UserId};
use crate::role::Role;

/// The authenticated identity for one request.
///
/// Built fresh from the resolved token on every request and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    /// The role profile this account is bound to. `None` for admins.
    pub profile_id: Option<ProfileId>,
    pub is_active: bool,
}

/// The principal is authenticated but not permitted to perform the action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    /// Role not in the route's allowed set.
    #[error("role '{role}' is not permitted on this route")]
    Role { role: Role },

    /// Principal is neither admin nor the resource owner.
    #[error("principal does not own this resource")]
    NotOwner,
}

impl Principal {
    /// Whether the principal's role is one of `allowed`.
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }

    /// Whether the principal is the recorded owner of a resource.
    pub fn owns(&self, owner: ProfileId) -> bool {
        self.profile_id == Some(owner)
    }
}

/// Admit iff the principal's role is in `allowed`.
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), AccessDenied> {
    if principal.has_any_role(allowed) {
        Ok(())
    } else {
        Err(AccessDenied::Role {
            role: principal.role,
        })
    }
}

/// Admit iff the principal is an admin or owns the resource.
pub fn authorize_ownership(principal: &Principal, owner: ProfileId) -> Result<(), AccessDenied> {
    if principal.role == Role::Admin || principal.owns(owner) {
        Ok(())
    } else {
        Err(AccessDenied::NotOwner)
    }
}
