//! Error types for connector-setup

use std::io;
use thiserror::Error;

/// Failures while turning a downloaded payload into a plaintext profile
#[derive(Debug, Error)]
pub enum DecryptError {
    /// Payload is not valid base64
    #[error("could not decode profile ({0})")]
    Decode(String),
    /// Payload is too short to hold salt and authentication tag
    #[error("could not decode profile (payload is {length} bytes, expected at least {minimum})")]
    Truncated { length: usize, minimum: usize },
    /// PBKDF2 could not produce the key material
    #[error("PBKDF2 key derivation failed ({0})")]
    KeyDerivation(String),
    /// GCM tag did not verify: wrong token or tampered transfer
    #[error("invalid authentication tag")]
    InvalidTag,
    /// Any other cipher failure
    #[error("error while decrypting data: {0}")]
    Cipher(String),
}

impl DecryptError {
    /// True when the payload failed authentication, as opposed to being malformed
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DecryptError::InvalidTag)
    }
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Setup token shorter than the file reference suffix
    #[error("Incorrect token value (length {length}, expected at least {expected})")]
    MalformedToken { length: usize, expected: usize },
    /// Key segment of the token is not base64
    #[error("Invalid token key encoding: {0}")]
    InvalidKeyEncoding(String),
    /// Transport failure reaching the profile endpoint
    #[error("Failed to download profile: {message}")]
    Download { message: String, url: String },
    /// Downloaded profile could not be decrypted
    #[error("Failed decrypting the downloaded profile: {0}")]
    Decrypt(#[from] DecryptError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Operation called in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// D-Bus service error (configuration manager, systemd, polkit)
    #[error("Service error: {0}")]
    ServiceError(String),
}

impl ConnectorError {
    /// URL of a failed download, if this is a download error
    pub fn url(&self) -> Option<&str> {
        match self {
            ConnectorError::Download { url, .. } => Some(url.as_str()),
            _ => None,
        }
    }

    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ConnectorError::Download { .. } => 5,
            ConnectorError::Decrypt(_) => 4,
            _ => 3,
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(error: serde_json::Error) -> Self {
        ConnectorError::Config(error.to_string())
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let download = ConnectorError::Download {
            message: "connection refused".to_string(),
            url: "https://example.invalid/x".to_string(),
        };
        assert_eq!(download.exit_code(), 5);
        assert_eq!(download.url(), Some("https://example.invalid/x"));

        let decrypt = ConnectorError::from(DecryptError::InvalidTag);
        assert_eq!(decrypt.exit_code(), 4);
        assert_eq!(decrypt.url(), None);

        let malformed = ConnectorError::MalformedToken { length: 3, expected: 40 };
        assert_eq!(malformed.exit_code(), 3);
    }

    #[test]
    fn test_auth_failure_is_distinct() {
        assert!(DecryptError::InvalidTag.is_auth_failure());
        assert!(!DecryptError::Cipher("bad key length".to_string()).is_auth_failure());
        assert!(!DecryptError::Decode("bad".to_string()).is_auth_failure());
        assert_eq!(DecryptError::InvalidTag.to_string(), "invalid authentication tag");
    }
}
