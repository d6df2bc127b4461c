//! Configuration management for connector-setup

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::crypto::DecryptParams;
use crate::error::{ConnectorError, ConnectorResult};
use crate::token::DEFAULT_FILE_REF_LEN;

/// Environment variable overriding the profile download endpoint
pub const ENV_BASE_URL: &str = "OPENVPN_CLOUD_BASEURL";
/// Environment variable relocating the installation root (development chroots)
pub const ENV_ROOT_DIR: &str = "OPENVPN_CONNECTOR_ROOT_DIR";
/// Environment variable enabling debug output
pub const ENV_DEBUG: &str = "OPENVPN_CONNECTOR_DEBUG";

/// Main connector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Endpoint the file reference is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Length of the file reference suffix of a setup token
    #[serde(default = "default_file_ref_len")]
    pub file_ref_len: usize,
    /// Top level installation directory
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// User-Agent sent with the profile download
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Honour HTTP(S)_PROXY from the environment for the download
    #[serde(default = "default_system_proxy")]
    pub system_proxy: bool,
    /// Verbose diagnostics
    #[serde(default)]
    pub debug: bool,
    /// Payload decryption parameters
    #[serde(default)]
    pub decrypt: DecryptParams,
}

fn default_base_url() -> String {
    "https://cloud-backend.openvpn.com/cvpn/api/v1/profiles/".to_string()
}

fn default_file_ref_len() -> usize {
    DEFAULT_FILE_REF_LEN
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/")
}

fn default_user_agent() -> String {
    "openvpn-connector-setup".to_string()
}

fn default_system_proxy() -> bool {
    true
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            file_ref_len: default_file_ref_len(),
            root_dir: default_root_dir(),
            user_agent: default_user_agent(),
            system_proxy: default_system_proxy(),
            debug: false,
            decrypt: DecryptParams::default(),
        }
    }
}

impl ConnectorConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Overlay values found through `lookup`, keyed by environment variable name
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(root) = lookup(ENV_ROOT_DIR) {
            self.root_dir = PathBuf::from(root);
        }
        // Presence alone enables debugging
        if lookup(ENV_DEBUG).is_some() {
            self.debug = true;
        }
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> ConnectorResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConnectorError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ConnectorError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConnectorResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConnectorError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConnectorError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// True when installing into the live system rather than a relocated root
    pub fn is_system_root(&self) -> bool {
        self.root_dir == Path::new("/")
    }

    /// Directory openvpn3-autoload scans for profiles
    pub fn autoload_dir(&self) -> PathBuf {
        self.root_dir.join("etc/openvpn3/autoload")
    }
}
