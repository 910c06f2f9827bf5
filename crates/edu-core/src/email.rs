//! # Normalized Email
//!
//! Credential lookups are case-insensitive and ignore surrounding whitespace.
//! [`Email`] folds both at construction so every comparison, map key and
//! persisted column sees the same canonical form.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Upper bound from RFC 5321 on the length of a forward path.
const MAX_EMAIL_LEN: usize = 254;

/// A trimmed, lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse and normalize an email address.
    ///
    /// Accepts `local@domain` with both halves non-empty and no interior
    /// whitespace. Anything finer-grained is left to the mail system.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::Missing("email"));
        }
        if normalized.len() > MAX_EMAIL_LEN || normalized.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidEmail(normalized));
        }
        match normalized.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(normalized))
            }
            _ => Err(ValidationError::InvalidEmail(normalized)),
        }
    }

    /// Return the normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Email::parse(&raw).map_err(serde::de::Error::custom)
    }
}
