use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domains::DomainAllowlist;
use crate::error::{HereNowError, Result};

/// Top-level configuration for the here/now service.
///
/// Loaded from `~/.herenow/config.toml` by default. The activity window
/// and cache TTL here are the single source of truth shared between
/// server-side aggregation and the generated widget script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HereNowConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for HereNowConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            tracking: TrackingConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl HereNowConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HereNowConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if
    /// the file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HereNowError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// `ALLOWED_DOMAINS` (comma-separated) replaces
    /// `tracking.allowed_domains` entirely when set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(csv) = std::env::var("ALLOWED_DOMAINS") {
            let parsed = DomainAllowlist::from_csv(&csv);
            if !parsed.domains().is_empty() {
                self.tracking.allowed_domains = parsed.domains().to_vec();
                info!(
                    domains = ?self.tracking.allowed_domains,
                    "Domain allowlist overridden from ALLOWED_DOMAINS"
                );
            }
        }
    }

    /// The domain allowlist built from the current configuration.
    pub fn allowlist(&self) -> DomainAllowlist {
        DomainAllowlist::new(self.tracking.allowed_domains.clone())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite event log.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.herenow/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address. The widget is embedded cross-origin, so the
    /// default exposes the service rather than binding loopback-only.
    pub bind: String,
    /// Listen port.
    pub port: u16,
    /// Base URL baked into the widget script for its API calls.
    /// When unset, the request's Host header is used instead.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3210,
            public_base_url: None,
        }
    }
}

/// Visit tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Domains allowed to record and query presence data.
    pub allowed_domains: Vec<String>,
    /// Trailing window defining "now", in seconds. Also the client
    /// heartbeat cadence, so the keep-alive rate and the server window
    /// stay aligned.
    pub activity_window_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            allowed_domains: vec!["localhost".to_string()],
            activity_window_secs: 300,
        }
    }
}

/// Stats cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a cached snapshot is served without recomputation.
    pub ttl_secs: u64,
    /// Soft ceiling on cached entries; exceeding it triggers a lazy
    /// sweep of entries older than twice the TTL.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            max_entries: 100,
        }
    }
}
