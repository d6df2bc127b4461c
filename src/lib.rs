//! connector-setup - CloudConnexa connector provisioning library
//!
//! Turns a setup token from the CloudConnexa portal into an OpenVPN 3 Linux
//! configuration profile:
//! - token: split the setup token into password and file reference
//! - profile: download the encrypted profile for the file reference
//! - crypto: PBKDF2 key derivation and AES-GCM decryption of the payload
//! - autoload / dbus: hand the plaintext profile to openvpn3-autoload, the
//!   configuration manager and systemd
//!
//! ```rust,no_run
//! use libconnector::{ConnectorConfig, ProfileFetch, SetupToken};
//!
//! # async fn run(raw_token: &str) -> libconnector::ConnectorResult<()> {
//! let config = ConnectorConfig::from_env();
//! let token = SetupToken::decode(raw_token, config.file_ref_len)?;
//! let mut profile = ProfileFetch::new(token, &config)?;
//! profile.download().await?;
//! println!("{}", profile.profile()?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod validation;
pub mod token;
pub mod crypto;
pub mod profile;
pub mod autoload;
pub mod dbus;

// Re-export commonly used types
pub use error::{ConnectorError, ConnectorResult, DecryptError};
pub use config::ConnectorConfig;
pub use token::{SetupToken, SetupTokenBuilder, DEFAULT_FILE_REF_LEN};
pub use crypto::{DecryptParams, DerivedKeyMaterial, ProfileDecryptor};
pub use profile::ProfileFetch;
pub use autoload::AutoloadConfig;
pub use dbus::{ConfigImport, PolkitAuthCheck, SystemdServiceUnit};
