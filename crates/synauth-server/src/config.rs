use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use synauth_auth::config::AuthConfig;
use synauth_auth::oauth::password::is_supported_encoding;
use synauth_auth::types::{GrantType, RegisteredClient, ScopeSet};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authorization server settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Clients and users registered at startup
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }

        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;

        self.bootstrap.validate()
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9050
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Clients and users loaded into the in-memory stores at startup.
///
/// Defining `[[bootstrap.clients]]` or `[[bootstrap.users]]` replaces the
/// corresponding defaults entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub clients: Vec<ClientDefinition>,
    pub users: Vec<UserDefinition>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            clients: vec![ClientDefinition {
                client_id: "gateway-client".into(),
                client_secret: "{noop}secret".into(),
                redirect_uris: vec![
                    "http://localhost:8000/login/oauth2/code/gateway-client".into(),
                ],
                scopes: vec![
                    "openid".into(),
                    "products.read".into(),
                    "products.write".into(),
                ],
                grant_types: vec!["authorization_code".into(), "refresh_token".into()],
            }],
            users: vec![UserDefinition {
                username: "miguelotech".into(),
                password: "{noop}926100349".into(),
                authorities: vec!["ROLE_USER".into(), "ROLE_ADMIN".into()],
            }],
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut client_ids = HashSet::new();
        for client in &self.clients {
            client.to_registered()?;
            if !client_ids.insert(client.client_id.as_str()) {
                return Err(format!(
                    "bootstrap.clients: duplicate client_id '{}'",
                    client.client_id
                ));
            }
        }

        let mut usernames = HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err("bootstrap.users: username must not be empty".into());
            }
            if !is_supported_encoding(&user.password) {
                return Err(format!(
                    "bootstrap.users '{}': password must be {{noop}}<plain> or an argon2 hash",
                    user.username
                ));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(format!(
                    "bootstrap.users: duplicate username '{}'",
                    user.username
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDefinition {
    pub client_id: String,
    /// `{noop}<plain>` or an argon2 PHC string
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
}

fn default_grant_types() -> Vec<String> {
    vec!["authorization_code".into()]
}

impl ClientDefinition {
    /// Builds and validates the registration.
    pub fn to_registered(&self) -> Result<RegisteredClient, String> {
        let prefix = format!("bootstrap.clients '{}'", self.client_id);

        if !is_supported_encoding(&self.client_secret) {
            return Err(format!(
                "{prefix}: client_secret must be {{noop}}<plain> or an argon2 hash"
            ));
        }

        let mut client = RegisteredClient::new(&self.client_id, &self.client_secret)
            .with_scopes(self.scopes.iter().map(String::as_str).collect::<ScopeSet>());
        client.grant_types.clear();
        for grant_type in &self.grant_types {
            let grant_type: GrantType = grant_type
                .parse()
                .map_err(|other| format!("{prefix}: unsupported grant type '{other}'"))?;
            client = client.with_grant_type(grant_type);
        }
        for uri in &self.redirect_uris {
            client = client.with_redirect_uri(uri);
        }

        client.validate().map_err(|e| format!("{prefix}: {e}"))?;
        Ok(client)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDefinition {
    pub username: String,
    /// `{noop}<plain>` or an argon2 PHC string
    pub password: String,
    #[serde(default)]
    pub authorities: Vec<String>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, read when no path is given.
    pub const DEFAULT_CONFIG_PATH: &str = "synauth.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., SYNAUTH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("SYNAUTH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 9050);
        assert_eq!(cfg.server.body_limit_bytes, 64 * 1024);
        assert_eq!(cfg.auth.issuer, "http://localhost:9050");
    }

    #[test]
    fn default_bootstrap_client() {
        let cfg = BootstrapConfig::default();
        let client = cfg.clients[0].to_registered().unwrap();
        assert_eq!(client.client_id, "gateway-client");
        assert!(client.is_redirect_uri_allowed(
            "http://localhost:8000/login/oauth2/code/gateway-client"
        ));
        assert!(client.is_scope_allowed("products.read"));
        assert!(client.is_scope_allowed("products.write"));
        assert!(client.is_grant_type_allowed(GrantType::RefreshToken));
    }

    #[test]
    fn default_bootstrap_user_has_authorities() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.users[0].username, "miguelotech");
        assert!(!cfg.users[0].authorities.is_empty());
    }

    #[test]
    fn rejects_bad_bootstrap_entries() {
        let mut cfg = BootstrapConfig::default();
        cfg.clients[0].grant_types.push("password".into());
        assert!(cfg.validate().unwrap_err().contains("unsupported grant type"));

        let mut cfg = BootstrapConfig::default();
        cfg.clients.push(cfg.clients[0].clone());
        assert!(cfg.validate().unwrap_err().contains("duplicate client_id"));

        let mut cfg = BootstrapConfig::default();
        cfg.users[0].password = "plain".into();
        assert!(cfg.validate().is_err());

        let mut cfg = BootstrapConfig::default();
        cfg.clients[0].redirect_uris.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }
}
