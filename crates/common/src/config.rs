//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Administrator credentials.
    pub admin: AdminConfig,
    /// Voter verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Blockchain mirror settings.
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    /// `WebAuthn` relying party settings.
    #[serde(default)]
    pub webauthn: WebAuthnSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance (also the `WebAuthn` origin).
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Administrator login configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Admin username.
    pub username: String,
    /// Argon2 PHC hash of the admin password.
    pub password_hash: String,
    /// Lifetime of an admin session token in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,
}

/// OTP and verification policy.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// How long an OTP stays valid, in seconds.
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: i64,
    /// Failed OTP attempts allowed before the voter is locked out.
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i32,
    /// Lockout duration after too many failed attempts, in seconds.
    #[serde(default = "default_lockout")]
    pub lockout_secs: i64,
    /// Return the OTP in the API response (no SMS/email channel exists).
    #[serde(default = "default_true")]
    pub expose_otp: bool,
    /// Refuse votes from voters who have not finished OTP + biometric checks.
    #[serde(default = "default_true")]
    pub require_verified_voter: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            otp_ttl_secs: default_otp_ttl(),
            otp_max_attempts: default_otp_max_attempts(),
            lockout_secs: default_lockout(),
            expose_otp: true,
            require_verified_voter: true,
        }
    }
}

/// Which blockchain mirror backs vote records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockchainMode {
    /// No mirror; votes are only stored in the database.
    Disabled,
    /// In-process simulated chain.
    #[default]
    Mock,
}

/// Blockchain mirror configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockchainConfig {
    /// Mirror backend.
    #[serde(default)]
    pub mode: BlockchainMode,
}

/// `WebAuthn` relying party configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebAuthnSettings {
    /// Relying party name shown by authenticators.
    #[serde(default = "default_rp_name")]
    pub rp_name: String,
}

impl Default for WebAuthnSettings {
    fn default() -> Self {
        Self {
            rp_name: default_rp_name(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_session_ttl() -> i64 {
    8 * 60 * 60
}

const fn default_otp_ttl() -> i64 {
    300
}

const fn default_otp_max_attempts() -> i32 {
    3
}

const fn default_lockout() -> i64 {
    30 * 60
}

const fn default_true() -> bool {
    true
}

fn default_rp_name() -> String {
    "E-Voting".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `EVOTE_ENV`)
    /// 3. Environment variables with `EVOTE_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("EVOTE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("EVOTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("EVOTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                url = "http://localhost:5000"

                [database]
                url = "postgres://localhost/evote"

                [admin]
                username = "admin"
                password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.verification.otp_max_attempts, 3);
        assert_eq!(config.verification.otp_ttl_secs, 300);
        assert!(config.verification.expose_otp);
        assert_eq!(config.blockchain.mode, BlockchainMode::Mock);
        assert_eq!(config.webauthn.rp_name, "E-Voting");
        assert_eq!(config.admin.session_ttl_secs, 28_800);
    }

    #[test]
    fn test_blockchain_mode_parses_lowercase() {
        let config: BlockchainConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"mode = "disabled""#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.mode, BlockchainMode::Disabled);
    }
}
