//! # edu-crypto: Credential Cryptography
//!
//! The two CPU-bound steps of identity resolution live here:
//!
//! - **Password hashing** ([`PasswordHasher`]): Argon2id with a fresh random
//!   salt per record and a configurable cost. Verification reads the cost and
//!   salt back out of the stored PHC string, so raising the cost never breaks
//!   existing hashes.
//! - **Identity tokens** ([`TokenSigner`]): HS256 JWTs carrying only the user
//!   id (`sub`), issue time and expiry. There is no refresh token; an expired
//!   token means logging in again.
//!
//! Both are synchronous and hold no mutable state after construction.
//!
//! ## Crate Policy
//!
//! - Depends only on `edu-core` internally.
//! - Key material and hashes never appear in `Debug` output or logs.

pub mod error;
pub mod password;
pub mod token;

pub use error::{CryptoError, TokenError};
pub use password::{PasswordCost, PasswordHasher};
pub use token::{Claims, TokenConfig, TokenSigner, MAX_TTL_SECS};
