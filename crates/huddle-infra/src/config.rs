//! Server configuration loader for Huddle.
//!
//! Reads `config.toml` from the data directory (`~/.huddle/` in production)
//! and deserializes it into [`ServerConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use huddle_types::config::ServerConfig;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "HUDDLE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `HUDDLE_DATA_DIR` environment variable
/// 2. `~/.huddle`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".huddle");
    }

    PathBuf::from(".huddle")
}

/// Directory holding uploaded images served under `/media`.
pub fn media_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("media")
}

/// Scratch directory for in-flight multipart uploads.
pub fn staging_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("staging")
}

/// Load server configuration from `{data_dir}/config.toml`.
///
/// A missing file yields [`ServerConfig::default()`]. A file that cannot be
/// read or parsed is logged and also yields the default.
pub async fn load_config(data_dir: &Path) -> ServerConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ServerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ServerConfig::default();
        }
    };

    match toml::from_str::<ServerConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServerConfig::default()
        }
    }
}
