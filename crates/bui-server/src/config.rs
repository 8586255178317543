//! Server configuration

use std::path::Path;

use bui_core::BasicAcl;
use serde::{Deserialize, Serialize};

use crate::tls::TlsConfig;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,
    /// JSON fixture feeding the in-memory backend
    pub fixture: Option<String>,
    /// Response cache
    pub cache: CacheConfig,
    /// Token authentication
    pub auth: AuthConfig,
    /// Access control
    pub acl: AclConfig,
    /// TLS termination (disabled when no certificate is set)
    pub tls: TlsConfig,
    /// Expose Prometheus metrics without auth
    pub metrics_public: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            fixture: None,
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            acl: AclConfig::default(),
            tls: TlsConfig::default(),
            metrics_public: true,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML configuration
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Apply `BUI_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("BUI_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(fixture) = lookup("BUI_FIXTURE") {
            self.fixture = Some(fixture);
        }
        if let Some(ttl) = lookup("BUI_CACHE_TTL").and_then(|v| v.parse().ok()) {
            self.cache.ttl_secs = ttl;
        }
    }

    /// Disable the response cache
    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Enable ACL checks with the given rules
    pub fn with_acl(mut self, rules: BasicAcl) -> Self {
        self.acl = AclConfig {
            enabled: true,
            rules,
        };
        self
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 1800,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require an API token (every caller is `anonymous` otherwise)
    pub enabled: bool,
    pub users: Vec<UserConfig>,
}

/// A user allowed to call the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Hex SHA-256 digest of the user's API token
    pub token_sha256: String,
}

/// ACL configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub rules: BasicAcl,
}
