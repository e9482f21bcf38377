//! Server configuration for Huddle.
//!
//! `ServerConfig` represents `{data_dir}/config.toml`. Every field has a
//! default, so an empty or missing file yields a working local setup.

use serde::{Deserialize, Serialize};

use crate::media::MAX_IMAGE_BYTES;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for URLs handed out by the local object store.
    /// Derived from `host`/`port` when absent.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Largest accepted image upload, in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Lifetime of issued bearer tokens.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,

    /// Outbound queue length per live connection.
    #[serde(default = "default_live_channel_capacity")]
    pub live_channel_capacity: usize,

    #[serde(default = "default_group_photo")]
    pub default_group_photo: String,

    #[serde(default = "default_profile_photo")]
    pub default_profile_photo: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_image_bytes() -> u64 {
    MAX_IMAGE_BYTES
}

fn default_token_ttl_days() -> i64 {
    7
}

fn default_live_channel_capacity() -> usize {
    256
}

fn default_group_photo() -> String {
    "https://icon-library.com/images/persons-icon/persons-icon-11.jpg".to_string()
}

fn default_profile_photo() -> String {
    "https://icon-library.com/images/my-profile-icon-png/my-profile-icon-png-14.jpg".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
            max_image_bytes: default_max_image_bytes(),
            token_ttl_days: default_token_ttl_days(),
            live_channel_capacity: default_live_channel_capacity(),
            default_group_photo: default_group_photo(),
            default_profile_photo: default_profile_photo(),
        }
    }
}

impl ServerConfig {
    /// Base URL for public links, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_image_bytes, 1024 * 1024);
        assert_eq!(config.token_ttl_days, 7);
        assert_eq!(config.base_url(), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_server_config_deserialize_with_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.live_channel_capacity, 256);
        assert!(config.public_base_url.is_none());
    }

    #[test]
    fn test_server_config_deserialize_with_values() {
        let toml_str = r#"
host = "0.0.0.0"
port = 8080
public_base_url = "https://chat.example.com/"
max_image_bytes = 2048
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_image_bytes, 2048);
        assert_eq!(config.base_url(), "https://chat.example.com");
    }
}
