//! Simplified polkit authorization checker

use std::collections::HashMap;
use tracing::debug;
use zbus::zvariant::Value;
use zbus::Connection;

use super::call_method;
use crate::error::ConnectorResult;

const POLKIT_SERVICE: &str = "org.freedesktop.PolicyKit1";
const POLKIT_PATH: &str = "/org/freedesktop/PolicyKit1/Authority";
const POLKIT_AUTHORITY_INTERFACE: &str = "org.freedesktop.PolicyKit1.Authority";

/// Action guarding enable/disable of systemd unit files
pub const MANAGE_UNIT_FILES_ACTION: &str = "org.freedesktop.systemd1.manage-unit-files";

/// Checks polkit actions for the current process
pub struct PolkitAuthCheck {
    connection: Connection,
}

impl PolkitAuthCheck {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Check whether this process is authorized for `action_id`
    pub async fn check_authorization(
        &self,
        action_id: &str,
        allow_user_interaction: bool,
    ) -> ConnectorResult<bool> {
        let subject = unix_process_subject();

        let flags: u32 = if allow_user_interaction { 1 } else { 0 };
        let (authorized, challenge, _details): (bool, bool, HashMap<String, String>) = call_method(
            &self.connection,
            POLKIT_SERVICE,
            POLKIT_PATH,
            POLKIT_AUTHORITY_INTERFACE,
            "CheckAuthorization",
            &(subject, action_id, HashMap::<&str, &str>::new(), flags, ""),
        )
        .await?;

        debug!("polkit: {} authorized={} challenge={}", action_id, authorized, challenge);
        Ok(authorized)
    }
}

/// polkit subject for this process, identified by its real user ID
fn unix_process_subject() -> (&'static str, HashMap<&'static str, Value<'static>>) {
    let mut details = HashMap::new();
    details.insert("pid", Value::from(std::process::id()));
    details.insert("start-time", Value::from(0u64));
    details.insert("uid", Value::from(real_uid() as i32));
    ("unix-process", details)
}

/// Real user ID of this process
pub fn real_uid() -> u32 {
    #[cfg(unix)]
    {
        unsafe { libc::getuid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

/// Effective user ID of this process
pub fn current_uid() -> u32 {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

/// Check if running as root
pub fn is_root() -> bool {
    current_uid() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_root_matches_uid() {
        assert_eq!(is_root(), current_uid() == 0);
    }

    #[test]
    fn test_subject_uses_real_uid() {
        let (kind, details) = unix_process_subject();
        assert_eq!(kind, "unix-process");
        assert_eq!(details["uid"], Value::from(real_uid() as i32));
        assert_eq!(details["pid"], Value::from(std::process::id()));
        #[cfg(unix)]
        assert_eq!(real_uid(), unsafe { libc::getuid() });
    }

    #[tokio::test]
    #[ignore] // Requires system bus with polkit
    async fn test_check_authorization() {
        let connection = crate::dbus::system_bus().await.unwrap();
        let polkit = PolkitAuthCheck::new(connection);
        assert!(polkit.check_authorization(MANAGE_UNIT_FILES_ACTION, false).await.is_ok());
    }
}
