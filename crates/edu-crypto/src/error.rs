//! # Crypto Errors

use thiserror::Error;

/// Failure constructing a hasher/signer or producing a hash.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Argon2 cost parameters rejected.
    #[error("invalid password cost: {0}")]
    InvalidCost(String),

    /// Hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// A stored hash could not be parsed as a PHC string.
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    /// Token signer configuration rejected.
    #[error("invalid token configuration: {0}")]
    InvalidTokenConfig(String),

    /// Token encoding failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Why a presented token was not accepted.
///
/// The distinction is for logs; clients see a single unauthenticated error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signature valid but `exp` has passed.
    #[error("token has expired")]
    Expired,

    /// Bad signature, bad structure, or an unparseable subject.
    #[error("token is not valid: {0}")]
    Invalid(String),
}
