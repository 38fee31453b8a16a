//! Authorization server configuration.
//!
//! All sections deserialize with defaults so a partial TOML file (or none at
//! all) yields a working server.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::token::jwt::SigningAlgorithm;

/// Shortest accepted authorization code lifetime.
pub const MIN_CODE_LIFETIME: Duration = Duration::from_secs(60);

/// Longest accepted authorization code lifetime.
pub const MAX_CODE_LIFETIME: Duration = Duration::from_secs(600);

/// Root authorization server configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.oauth]
/// authorization_code_lifetime = "5m"
/// access_token_lifetime = "1h"
///
/// [auth.signing]
/// algorithm = "ES384"
/// key_rotation_interval = "7d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer identifier embedded as `iss` in every token and advertised
    /// through discovery metadata.
    pub issuer: String,

    /// OAuth 2.0 flow settings.
    pub oauth: OAuthConfig,

    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Background purge of expired codes and refresh tokens.
    pub reaper: ReaperConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:9050".to_string(),
            oauth: OAuthConfig::default(),
            signing: SigningConfig::default(),
            reaper: ReaperConfig::default(),
        }
    }
}

/// OAuth 2.0 configuration.
///
/// Controls code and token lifetimes and scope handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime. Must be between 60 seconds and 10 minutes.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Rotate refresh tokens on use.
    /// When enabled, each refresh revokes the presented token and issues a new one.
    pub refresh_token_rotation: bool,

    /// Reject requests that ask for scopes the client is not registered for,
    /// instead of silently narrowing them.
    pub strict_scopes: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(300), // 5 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
            refresh_token_rotation: true,
            strict_scopes: false,
        }
    }
}

/// Token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm.
    /// Supported: "RS256", "RS384", "ES384"
    pub algorithm: String,

    /// How often a new signing key is generated. Zero disables rotation.
    #[serde(with = "humantime_serde")]
    pub key_rotation_interval: Duration,

    /// Retired keys always kept for validation, newest first.
    /// Older retired keys stay until the tokens they signed have expired.
    pub keys_to_keep: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            key_rotation_interval: Duration::ZERO,
            keys_to_keep: 3,
        }
    }
}

impl SigningConfig {
    /// Parses the configured algorithm name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unsupported algorithms.
    pub fn algorithm(&self) -> Result<SigningAlgorithm, ConfigError> {
        self.algorithm.parse().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid signing algorithm: '{}'. Must be RS256, RS384, or ES384",
                self.algorithm
            ))
        })
    }

    /// Returns `true` if periodic key rotation is enabled.
    #[must_use]
    pub fn rotation_enabled(&self) -> bool {
        !self.key_rotation_interval.is_zero()
    }
}

/// Expired entry purge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Run the purge task.
    pub enabled: bool,

    /// Interval between purge runs.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the issuer is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - The issuer is not an absolute URL
    /// - The signing algorithm is not supported
    /// - The authorization code lifetime is outside 60s..=600s
    /// - The access or refresh token lifetime is zero
    /// - `keys_to_keep` is zero
    /// - The reaper is enabled with a zero interval
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Missing("auth.issuer".to_string()));
        }
        url::Url::parse(&self.issuer).map_err(|e| {
            ConfigError::InvalidValue(format!("issuer '{}' is not a URL: {e}", self.issuer))
        })?;

        self.signing.algorithm()?;

        let code_lifetime = self.oauth.authorization_code_lifetime;
        if !(MIN_CODE_LIFETIME..=MAX_CODE_LIFETIME).contains(&code_lifetime) {
            return Err(ConfigError::InvalidValue(format!(
                "authorization_code_lifetime must be between 60s and 600s, got {}s",
                code_lifetime.as_secs()
            )));
        }

        if self.oauth.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.oauth.refresh_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.signing.keys_to_keep == 0 {
            return Err(ConfigError::InvalidValue(
                "keys_to_keep must be > 0".to_string(),
            ));
        }

        if self.reaper.enabled && self.reaper.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "reaper interval must be > 0 when the reaper is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.issuer, "http://localhost:9050");
        assert!(config.oauth.refresh_token_rotation);
        assert!(!config.oauth.strict_scopes);
        assert_eq!(config.signing.algorithm, "RS256");
        assert!(!config.signing.rotation_enabled());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_issuer_fails_validation() {
        let mut config = AuthConfig::default();
        config.issuer = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_relative_issuer_fails_validation() {
        let mut config = AuthConfig::default();
        config.issuer = "auth.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_invalid_algorithm_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.algorithm = "HS256".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing algorithm"));
    }

    #[test]
    fn test_valid_algorithms() {
        for alg in ["RS256", "RS384", "ES384"] {
            let mut config = AuthConfig::default();
            config.signing.algorithm = alg.to_string();
            assert!(config.validate().is_ok(), "Algorithm {alg} should be valid");
        }
    }

    #[test]
    fn test_code_lifetime_bounds() {
        let mut config = AuthConfig::default();

        config.oauth.authorization_code_lifetime = Duration::from_secs(59);
        assert!(config.validate().is_err());

        config.oauth.authorization_code_lifetime = Duration::from_secs(60);
        assert!(config.validate().is_ok());

        config.oauth.authorization_code_lifetime = Duration::from_secs(600);
        assert!(config.validate().is_ok());

        config.oauth.authorization_code_lifetime = Duration::from_secs(601);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("authorization_code_lifetime"));
    }

    #[test]
    fn test_zero_keys_to_keep_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.keys_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_reaper_skips_interval_check() {
        let mut config = AuthConfig::default();
        config.reaper.enabled = false;
        config.reaper.interval = Duration::ZERO;
        assert!(config.validate().is_ok());

        config.reaper.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_durations_deserialize() {
        let json = r#"{
            "oauth": { "authorization_code_lifetime": "2m", "access_token_lifetime": "15m" },
            "signing": { "algorithm": "ES384", "key_rotation_interval": "7days" }
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.oauth.authorization_code_lifetime,
            Duration::from_secs(120)
        );
        assert_eq!(config.oauth.access_token_lifetime, Duration::from_secs(900));
        assert!(config.signing.rotation_enabled());
        assert_eq!(config.signing.algorithm().unwrap(), SigningAlgorithm::ES384);
        // Unset sections keep their defaults
        assert_eq!(config.issuer, "http://localhost:9050");
        assert!(config.reaper.enabled);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");

        let err = ConfigError::Missing("required_field".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required configuration: required_field"
        );
    }
}
