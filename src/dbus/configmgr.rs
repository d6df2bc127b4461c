//! OpenVPN 3 Linux configuration manager client
//!
//! Imports the decrypted profile into `net.openvpn.v3.configuration` and locks
//! it down so the connector session runs with the settings the backend chose.

use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::Connection;

use super::{call_method, PROPERTIES_INTERFACE};
use crate::error::{ConnectorError, ConnectorResult};
use crate::validation::normalize_profile_name;

const CONFIGMGR_SERVICE: &str = "net.openvpn.v3.configuration";
const CONFIGMGR_PATH: &str = "/net/openvpn/v3/configuration";
const CONFIGMGR_INTERFACE: &str = "net.openvpn.v3.configuration";

/// Imports a connector profile under a given configuration name
pub struct ConfigImport {
    connection: Connection,
    requested_name: String,
    config_name: String,
    overwrite: Vec<OwnedObjectPath>,
    config_path: Option<OwnedObjectPath>,
}

impl ConfigImport {
    /// Prepare an import, failing if `name` is already taken unless `force` is set
    ///
    /// Only profiles visible to the current user are checked for duplicates.
    pub async fn new(connection: Connection, name: &str, force: bool) -> ConnectorResult<Self> {
        let config_name = normalize_profile_name(name)?;
        if config_name != name {
            info!("Spaces stripped from configuration name. New name: {}", config_name);
        }

        let existing = find_configs_named(&connection, &config_name).await?;
        if !existing.is_empty() && !force {
            return Err(ConnectorError::AlreadyExists(format!(
                "Configuration profile name \"{}\" already exists",
                config_name
            )));
        }

        Ok(Self {
            connection,
            requested_name: name.to_string(),
            config_name,
            overwrite: existing,
            config_path: None,
        })
    }

    /// Name the profile is imported as
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// True when the requested name had to be changed
    pub fn name_was_changed(&self) -> bool {
        self.requested_name != self.config_name
    }

    /// True when importing will replace existing profiles
    pub fn will_overwrite(&self) -> bool {
        !self.overwrite.is_empty()
    }

    /// Object path of the imported profile
    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_ref().map(|p| p.as_str())
    }

    /// Import the profile as a persistent configuration
    pub async fn import(&mut self, profile: &str) -> ConnectorResult<()> {
        for old in self.overwrite.drain(..) {
            warn!("Removing old configuration profile {} with same name", old.as_str());
            call_method::<_, ()>(
                &self.connection,
                CONFIGMGR_SERVICE,
                old.as_str(),
                CONFIGMGR_INTERFACE,
                "Remove",
                &(),
            )
            .await?;
        }

        // Import(s name, s config_str, b single_use, b persistent) -> o
        let path: OwnedObjectPath = call_method(
            &self.connection,
            CONFIGMGR_SERVICE,
            CONFIGMGR_PATH,
            CONFIGMGR_INTERFACE,
            "Import",
            &(self.config_name.as_str(), profile, false, true),
        )
        .await?;
        debug!("Configuration path: {}", path.as_str());
        self.config_path = Some(path);

        self.set_property("locked_down", Value::from(true)).await?;
        self.set_override("persist-tun", Value::from(true)).await?;
        self.set_override("log-level", Value::from("5")).await?;
        info!("Imported configuration profile \"{}\"", self.config_name);
        Ok(())
    }

    /// Use Data Channel Offload for this profile
    pub async fn enable_dco(&self) -> ConnectorResult<()> {
        self.set_property("dco", Value::from(true)).await
    }

    /// Let the root user take over sessions started from this profile
    pub async fn enable_ownership_transfer(&self) -> ConnectorResult<()> {
        self.set_property("transfer_owner_session", Value::from(true)).await?;
        call_method::<_, ()>(
            &self.connection,
            CONFIGMGR_SERVICE,
            self.imported_path()?,
            CONFIGMGR_INTERFACE,
            "AccessGrant",
            &(0u32,),
        )
        .await
    }

    fn imported_path(&self) -> ConnectorResult<&str> {
        self.config_path().ok_or_else(|| {
            ConnectorError::InvalidState("Configuration profile has not been imported".to_string())
        })
    }

    async fn set_property(&self, name: &str, value: Value<'_>) -> ConnectorResult<()> {
        call_method::<_, ()>(
            &self.connection,
            CONFIGMGR_SERVICE,
            self.imported_path()?,
            PROPERTIES_INTERFACE,
            "Set",
            &(CONFIGMGR_INTERFACE, name, value),
        )
        .await
    }

    async fn set_override(&self, name: &str, value: Value<'_>) -> ConnectorResult<()> {
        call_method::<_, ()>(
            &self.connection,
            CONFIGMGR_SERVICE,
            self.imported_path()?,
            CONFIGMGR_INTERFACE,
            "SetOverride",
            &(name, value),
        )
        .await
    }
}

/// Object paths of available profiles named `name`
async fn find_configs_named(
    connection: &Connection,
    name: &str,
) -> ConnectorResult<Vec<OwnedObjectPath>> {
    let available: Vec<OwnedObjectPath> = call_method(
        connection,
        CONFIGMGR_SERVICE,
        CONFIGMGR_PATH,
        CONFIGMGR_INTERFACE,
        "FetchAvailableConfigs",
        &(),
    )
    .await?;

    let mut matches = Vec::new();
    for path in available {
        let value: OwnedValue = call_method(
            connection,
            CONFIGMGR_SERVICE,
            path.as_str(),
            PROPERTIES_INTERFACE,
            "Get",
            &(CONFIGMGR_INTERFACE, "name"),
        )
        .await?;

        let config_name = String::try_from(value).map_err(|e| {
            ConnectorError::ServiceError(format!("Unexpected name property type: {}", e))
        })?;
        if config_name == name {
            matches.push(path);
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires OpenVPN 3 Linux on the system bus
    async fn test_duplicate_lookup() {
        let connection = crate::dbus::system_bus().await.unwrap();
        let result = find_configs_named(&connection, "connector-setup-test-unused").await;
        assert!(result.unwrap().is_empty());
    }
}
