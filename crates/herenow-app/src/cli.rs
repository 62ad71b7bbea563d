//! CLI argument definitions for the here/now server.
//!
//! Uses `clap` with derive macros. Priority resolution:
//! CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// here/now — a lightweight presence-analytics service with an
/// embeddable live-visitor widget.
#[derive(Parser, Debug)]
#[command(name = "herenow", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite event log.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > HERENOW_CONFIG env var >
    /// ~/.herenow/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("HERENOW_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > HERENOW_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("HERENOW_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Resolve the data directory path.
    ///
    /// Returns `None` when not overridden (use config value).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level. Returns `None` when not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".herenow").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_config_port() {
        let args = CliArgs::parse_from(["herenow", "--port", "9999"]);
        assert_eq!(args.resolve_port(3210), 9999);
    }

    #[test]
    fn test_config_port_used_without_flag() {
        let args = CliArgs::parse_from(["herenow"]);
        assert_eq!(args.resolve_port(3210), 3210);
    }

    #[test]
    fn test_explicit_config_path() {
        let args = CliArgs::parse_from(["herenow", "--config", "/tmp/custom.toml"]);
        assert_eq!(
            args.resolve_config_path(),
            PathBuf::from("/tmp/custom.toml")
        );
    }

    #[test]
    fn test_data_dir_override() {
        let args = CliArgs::parse_from(["herenow", "--data-dir", "/srv/herenow"]);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/srv/herenow"));

        let args = CliArgs::parse_from(["herenow"]);
        assert!(args.resolve_data_dir().is_none());
    }
}
