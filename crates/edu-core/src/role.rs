//! # Roles
//!
//! The four account roles. Unlike a privilege ladder, roles here are
//! unordered: each route names the exact set it admits, and `Admin` is
//! never implied by anything.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account role stored on the credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Enrolled learner; owns submissions.
    Student,
    /// Instructor; owns the assignments they create.
    Teacher,
    /// Volunteer helper with a profile but no route grants by default.
    Volunteer,
    /// Operator account with no role profile.
    Admin,
}

/// The role string did not name one of the four known roles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid role")]
pub struct ParseRoleError(pub String);

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Volunteer, Role::Admin];

    /// Return the wire representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Volunteer => "volunteer",
            Self::Admin => "admin",
        }
    }

    /// Whether accounts with this role carry a role profile.
    pub fn has_profile(&self) -> bool {
        !matches!(self, Self::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "volunteer" => Ok(Self::Volunteer),
            "admin" => Ok(Self::Admin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
