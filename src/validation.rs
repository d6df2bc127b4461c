//! Input validation and sanitization
//!
//! Names given on the command line end up in D-Bus calls, systemd unit names
//! and file names under the autoload directory.

use crate::error::{ConnectorError, ConnectorResult};

/// Maximum length for configuration profile names
const MAX_PROFILE_NAME_LEN: usize = 200;

/// Maximum length for autoload file prefixes
const MAX_FILE_PREFIX_LEN: usize = 64;

/// Strip spaces from a configuration profile name and validate the result
///
/// The name is used verbatim in `openvpn3-session@<name>.service`, so only
/// characters systemd accepts in a unit instance are allowed.
pub fn normalize_profile_name(name: &str) -> ConnectorResult<String> {
    let stripped: String = name.chars().filter(|c| *c != ' ').collect();

    if stripped.is_empty() {
        return Err(ConnectorError::InvalidParameter(
            "Configuration profile name cannot be empty".to_string()
        ));
    }

    if stripped.len() > MAX_PROFILE_NAME_LEN {
        return Err(ConnectorError::InvalidParameter(
            format!("Configuration profile name too long (max {} characters)", MAX_PROFILE_NAME_LEN)
        ));
    }

    for c in stripped.chars() {
        if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.' | ':') {
            return Err(ConnectorError::InvalidParameter(
                format!("Invalid configuration profile name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    Ok(stripped)
}

/// Validate the file name prefix used for autoload files
pub fn validate_file_prefix(prefix: &str) -> ConnectorResult<()> {
    if prefix.is_empty() {
        return Err(ConnectorError::InvalidParameter(
            "Autoload file prefix cannot be empty".to_string()
        ));
    }

    if prefix.len() > MAX_FILE_PREFIX_LEN {
        return Err(ConnectorError::InvalidParameter(
            format!("Autoload file prefix too long (max {} characters)", MAX_FILE_PREFIX_LEN)
        ));
    }

    // Keeps the files inside the autoload directory
    if prefix.starts_with('.') {
        return Err(ConnectorError::InvalidParameter(
            "Autoload file prefix cannot start with a dot".to_string()
        ));
    }

    for c in prefix.chars() {
        if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
            return Err(ConnectorError::InvalidParameter(
                format!("Invalid autoload file prefix '{}': contains invalid character '{}'", prefix, c)
            ));
        }
    }

    Ok(())
}
