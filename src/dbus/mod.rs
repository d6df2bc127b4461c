//! System bus collaborators
//!
//! Thin clients for the services the connector hands its profile to:
//!
//! - `configmgr`: OpenVPN 3 Linux configuration manager (profile import)
//! - `systemd`: systemd service units (enable at boot, start)
//! - `polkit`: authorization checks for managing unit files
//!
//! All calls go through [`call_method`] on a shared [`zbus::Connection`].

pub mod configmgr;
pub mod polkit;
pub mod systemd;

pub use configmgr::ConfigImport;
pub use polkit::PolkitAuthCheck;
pub use systemd::SystemdServiceUnit;

use crate::error::{ConnectorError, ConnectorResult};
use zbus::Connection;

/// Standard D-Bus properties interface
pub(crate) const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Connect to the D-Bus system bus
pub async fn system_bus() -> ConnectorResult<Connection> {
    Connection::system()
        .await
        .map_err(|e| ConnectorError::ServiceError(format!("Failed to connect to D-Bus: {}", e)))
}

/// Call a method and deserialize its reply
pub(crate) async fn call_method<B, R>(
    connection: &Connection,
    destination: &str,
    path: &str,
    interface: &str,
    method: &str,
    body: &B,
) -> ConnectorResult<R>
where
    B: serde::ser::Serialize + zbus::zvariant::DynamicType,
    R: serde::de::DeserializeOwned + zbus::zvariant::Type,
{
    connection
        .call_method(Some(destination), path, Some(interface), method, body)
        .await
        .map_err(|e| ConnectorError::ServiceError(format!("D-Bus call {}.{} failed: {}", interface, method, e)))?
        .body()
        .deserialize()
        .map_err(|e| ConnectorError::ServiceError(format!("Failed to deserialize {} response: {}", method, e)))
}
