//! # Validation Errors
//!
//! Field-level validation failures for the identity vocabulary. All of these
//! surface to HTTP clients as 400 responses; the message names the field.

use thiserror::Error;

/// A required field was absent or a value was malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("{0} is required")]
    Missing(&'static str),

    /// The email address could not be parsed.
    #[error("email '{0}' is not a valid address")]
    InvalidEmail(String),

    /// Password shorter than the minimum length.
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum accepted length in characters.
        min: usize,
    },

    /// A numeric field fell outside its permitted range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
}
