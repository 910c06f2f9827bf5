//! # Identity Tokens
//!
//! HS256 JWTs whose only identity claim is the user id. Role and profile are
//! deliberately not embedded: every request reloads the credential record, so
//! deactivation or deletion takes effect on the next request rather than at
//! token expiry.

use chrono::{DateTime, Utc};
use edu_core::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, TokenError};

/// Secrets shorter than this still work but are logged as weak.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Token signer configuration.
///
/// Custom `Debug` redacts the secret to prevent key leakage in logs.
#[derive(Clone)]
pub struct TokenConfig {
    /// Shared HMAC secret.
    pub secret: String,
    /// Lifetime of an issued token in seconds.
    pub ttl_secs: i64,
    /// Clock skew tolerance applied to `exp`, in seconds.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id (credential record), as a UUID string.
    pub sub: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Issues and verifies identity tokens with a process-wide key.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Build a signer from configuration.
    pub fn new(config: &TokenConfig) -> Result<Self, CryptoError> {
        if config.secret.is_empty() {
            return Err(CryptoError::InvalidTokenConfig(
                "signing secret must not be empty".into(),
            ));
        }
        if config.ttl_secs <= 0 {
            return Err(CryptoError::InvalidTokenConfig(
                "token lifetime must be positive".into(),
            ));
        }
        if config.ttl_secs > MAX_TTL_SECS {
            return Err(CryptoError::InvalidTokenConfig(format!(
                "token lifetime must not exceed {MAX_TTL_SECS} seconds"
            )));
        }
        if config.secret.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                len = config.secret.len(),
                "token signing secret is shorter than {RECOMMENDED_SECRET_LEN} bytes"
            );
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl_secs: config.ttl_secs,
        })
    }

    /// Issue a token for `user_id`, valid from now for the configured lifetime.
    pub fn issue(&self, user_id: UserId) -> Result<String, CryptoError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if at `issued_at`.
    pub fn issue_at(&self, user_id: UserId, issued_at: DateTime<Utc>) -> Result<String, CryptoError> {
        let iat = issued_at.timestamp();
        let exp = iat
            .checked_add(self.ttl_secs)
            .ok_or_else(|| CryptoError::Signing("token expiry is out of range".into()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, returning the embedded user id.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|e| TokenError::Invalid(format!("subject is not a user id: {e}")))
    }

    /// Configured token lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(&TokenConfig {
            secret: secret.to_string(),
            ttl_secs: 3600,
            leeway_secs: 0,
        })
        .unwrap()
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let s = signer("0123456789abcdef0123456789abcdef");
        let user = UserId::new();
        let token = s.issue(user).unwrap();
        assert_eq!(s.verify(&token).unwrap(), user);
    }

    #[test]
    fn expired_token_rejected() {
        let s = signer("0123456789abcdef0123456789abcdef");
        let token = s
            .issue_at(UserId::new(), Utc::now() - Duration::hours(2))
            .unwrap();
        assert_eq!(s.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn token_from_other_key_rejected() {
        let a = signer("0123456789abcdef0123456789abcdef");
        let b = signer("fedcba9876543210fedcba9876543210");
        let token = a.issue(UserId::new()).unwrap();
        assert!(matches!(b.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_payload_rejected() {
        let s = signer("0123456789abcdef0123456789abcdef");
        let token = s.issue(UserId::new()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        // Swap the payload for one naming a different user; signature no longer matches.
        let forged = s.issue(UserId::new()).unwrap();
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        let tampered = parts.join(".");
        assert!(matches!(s.verify(&tampered), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn garbage_rejected() {
        let s = signer("0123456789abcdef0123456789abcdef");
        assert!(matches!(s.verify("invalidtoken"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn non_uuid_subject_rejected() {
        let secret = "0123456789abcdef0123456789abcdef";
        let s = signer(secret);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "admin".into(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(s.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn empty_secret_rejected() {
        let err = TokenSigner::new(&TokenConfig {
            secret: String::new(),
            ttl_secs: 60,
            leeway_secs: 0,
        })
        .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidTokenConfig(_)));
    }

    #[test]
    fn non_positive_ttl_rejected() {
        assert!(TokenSigner::new(&TokenConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
            ttl_secs: 0,
            leeway_secs: 0,
        })
        .is_err());
    }

    #[test]
    fn oversized_ttl_rejected() {
        for ttl_secs in [MAX_TTL_SECS + 1, i64::MAX] {
            let err = TokenSigner::new(&TokenConfig {
                secret: "0123456789abcdef0123456789abcdef".into(),
                ttl_secs,
                leeway_secs: 0,
            })
            .unwrap_err();
            assert!(matches!(err, CryptoError::InvalidTokenConfig(_)));
        }
    }

    #[test]
    fn longest_ttl_issues_unexpired_token() {
        let s = TokenSigner::new(&TokenConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
            ttl_secs: MAX_TTL_SECS,
            leeway_secs: 0,
        })
        .unwrap();
        let user = UserId::new();
        let token = s.issue(user).unwrap();
        assert_eq!(s.verify(&token).unwrap(), user);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = TokenConfig {
            secret: "super-secret-value".into(),
            ttl_secs: 60,
            leeway_secs: 0,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
