//! systemd service unit management

use tracing::info;
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

use super::call_method;
use crate::error::ConnectorResult;

const SYSTEMD_SERVICE: &str = "org.freedesktop.systemd1";
const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";
const SYSTEMD_MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";

/// Unit starting every profile found in the autoload directory
pub const AUTOLOAD_UNIT: &str = "openvpn3-autoload.service";

/// Unit starting a single imported configuration profile
pub fn session_unit_name(config_name: &str) -> String {
    format!("openvpn3-session@{}.service", config_name)
}

/// A systemd unit managed through the systemd1 manager object
pub struct SystemdServiceUnit {
    connection: Connection,
    unit_name: String,
}

impl SystemdServiceUnit {
    pub fn new(connection: Connection, unit_name: impl Into<String>) -> Self {
        Self {
            connection,
            unit_name: unit_name.into(),
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Enable the unit to be started at boot
    pub async fn enable(&self) -> ConnectorResult<()> {
        // EnableUnitFiles(as files, b runtime, b force) -> (b carries_install_info, a(sss) changes)
        let (_, changes): (bool, Vec<(String, String, String)>) = call_method(
            &self.connection,
            SYSTEMD_SERVICE,
            SYSTEMD_PATH,
            SYSTEMD_MANAGER_INTERFACE,
            "EnableUnitFiles",
            &(vec![self.unit_name.as_str()], false, true),
        )
        .await?;

        for (kind, file, target) in changes {
            info!("systemd: {} {} -> {}", kind, file, target);
        }
        Ok(())
    }

    /// Start the unit, replacing any queued job for it
    pub async fn start(&self) -> ConnectorResult<()> {
        let job: OwnedObjectPath = call_method(
            &self.connection,
            SYSTEMD_SERVICE,
            SYSTEMD_PATH,
            SYSTEMD_MANAGER_INTERFACE,
            "StartUnit",
            &(self.unit_name.as_str(), "replace"),
        )
        .await?;

        info!("systemd: started {} (job {})", self.unit_name, job.as_str());
        Ok(())
    }
}
