//! # Command-Line & Environment Configuration
//!
//! Every setting can come from a flag or from the environment variable named
//! beside it. The parsed [`Cli`] is folded once into an immutable
//! [`AppConfig`].

use clap::Parser;
use edu_crypto::{PasswordCost, TokenConfig};

use crate::state::AppConfig;

/// Thirty days, in seconds.
const DEFAULT_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Education-management API server.
#[derive(Parser, Clone)]
#[command(name = "edu-api", version, about, long_about = None)]
pub struct Cli {
    /// Port to bind the HTTP server to.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// HMAC key for identity tokens. At least 32 bytes is recommended.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Token lifetime in seconds.
    #[arg(long, env = "JWT_EXPIRE_SECS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub jwt_expire_secs: i64,

    /// Clock skew tolerated when checking token expiry, in seconds.
    #[arg(long, env = "JWT_LEEWAY_SECS", default_value_t = 0)]
    pub jwt_leeway_secs: u64,

    /// Argon2 memory cost in KiB.
    #[arg(long, env = "PASSWORD_MEMORY_KIB", default_value_t = PasswordCost::default().memory_kib)]
    pub password_memory_kib: u32,

    /// Argon2 passes.
    #[arg(long, env = "PASSWORD_ITERATIONS", default_value_t = PasswordCost::default().iterations)]
    pub password_iterations: u32,

    /// Argon2 lanes.
    #[arg(long, env = "PASSWORD_PARALLELISM", default_value_t = PasswordCost::default().parallelism)]
    pub password_parallelism: u32,

    /// Postgres connection string. Omit to run in memory only.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expire_secs", &self.jwt_expire_secs)
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("password_memory_kib", &self.password_memory_kib)
            .field("password_iterations", &self.password_iterations)
            .field("password_parallelism", &self.password_parallelism)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Cli {
    /// Fold the parsed arguments into the application configuration.
    pub fn into_app_config(self) -> AppConfig {
        AppConfig {
            port: self.port,
            token: TokenConfig {
                secret: self.jwt_secret,
                ttl_secs: self.jwt_expire_secs,
                leeway_secs: self.jwt_leeway_secs,
            },
            password_cost: PasswordCost {
                memory_kib: self.password_memory_kib,
                iterations: self.password_iterations,
                parallelism: self.password_parallelism,
            },
            database_url: self.database_url.filter(|url| !url.trim().is_empty()),
            log_json: self.log_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_secret_given() {
        let cli = Cli::try_parse_from(["edu-api", "--jwt-secret", "s3cret"]).unwrap();
        let config = cli.into_app_config();
        assert_eq!(config.port, 5000);
        assert_eq!(config.token.ttl_secs, 2_592_000);
        assert_eq!(config.token.leeway_secs, 0);
        assert_eq!(config.password_cost, PasswordCost::default());
        assert!(!config.log_json);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "edu-api",
            "--port",
            "8080",
            "--jwt-secret",
            "s3cret",
            "--jwt-expire-secs",
            "3600",
            "--password-memory-kib",
            "4096",
            "--database-url",
            "postgres://localhost/edu",
            "--log-json",
        ])
        .unwrap();
        let config = cli.into_app_config();
        assert_eq!(config.port, 8080);
        assert_eq!(config.token.ttl_secs, 3600);
        assert_eq!(config.password_cost.memory_kib, 4096);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/edu"));
        assert!(config.log_json);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cli = Cli::try_parse_from(["edu-api", "--jwt-secret", "s", "--database-url", " "])
            .unwrap();
        assert!(cli.into_app_config().database_url.is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let cli = Cli::try_parse_from(["edu-api", "--jwt-secret", "do-not-print-me"]).unwrap();
        assert!(!format!("{cli:?}").contains("do-not-print-me"));
    }
}
