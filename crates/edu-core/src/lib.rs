//! # edu-core: Foundational Types for the Education Service
//!
//! Leaf crate of the workspace. Defines the identity and access-control
//! vocabulary shared by every other crate: typed identifiers, the normalized
//! [`Email`], the closed [`Role`] enum, the per-request [`Principal`], and the
//! Authorization Gate ([`authorize`], [`authorize_ownership`]).
//!
//! ## Crate Policy
//!
//! - No dependencies on other `edu-*` crates.
//! - No I/O, no async. Everything here is a pure function of its inputs.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod access;
pub mod email;
pub mod error;
pub mod identity;
pub mod role;

pub use access::{authorize, authorize_ownership, AccessDenied, Principal};
pub use email::Email;
pub use error::ValidationError;
pub use identity::{ProfileId, UserId};
pub use role::{ParseRoleError, Role};
