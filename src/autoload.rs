//! openvpn3-autoload configuration
//!
//! openvpn3-autoload pairs every `<name>.conf` profile with a `<name>.autoload`
//! JSON file describing how the profile is started.

use serde_json::{Map, Value};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};

/// Keys accepted in the `tunnel` section
const TUNNEL_KEYS: &[&str] = &["ipv6", "persist", "dns-fallback", "dns-setup-disabled"];

/// Autoload settings for a saved profile
#[derive(Debug, Clone)]
pub struct AutoloadConfig {
    path: PathBuf,
    properties: Map<String, Value>,
}

impl AutoloadConfig {
    /// Settings for the profile saved at `profile_path`
    pub fn new(profile_path: &Path) -> Self {
        let stem = profile_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = profile_path.with_file_name(format!("{}.autoload", stem));

        Self {
            path,
            properties: Map::new(),
        }
    }

    /// Path the autoload file is written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_name(&mut self, name: &str) {
        self.properties.insert("name".to_string(), Value::from(name));
    }

    pub fn set_autostart(&mut self, autostart: bool) {
        self.properties.insert("autostart".to_string(), Value::from(autostart));
    }

    /// Set a value in the `tunnel` section
    pub fn set_tunnel_param(&mut self, key: &str, value: impl Into<Value>) -> ConnectorResult<()> {
        if !TUNNEL_KEYS.contains(&key) {
            return Err(ConnectorError::InvalidParameter(
                format!("Incorrect key \"{}\" for \"tunnel\" section", key)
            ));
        }

        let section = self
            .properties
            .entry("tunnel")
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        if let Value::Object(tunnel) = section {
            tunnel.insert(key.to_string(), value.into());
        }
        Ok(())
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Write the settings as JSON indented with four spaces
    pub fn save(&self) -> ConnectorResult<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.properties.serialize(&mut ser)?;

        std::fs::write(&self.path, buf)?;
        debug!("Wrote autoload configuration {:?}", self.path);
        Ok(())
    }
}
