//! Setup token codec
//!
//! A setup token is issued by the CloudConnexa portal and carries two things:
//!
//! ```text
//! [ENCRYPTION_KEY][FILEREF]
//! ```
//!
//! - `ENCRYPTION_KEY`: base64 text of the password protecting the profile, variable length
//! - `FILEREF`: reference to the encrypted profile on the backend, always the
//!   last [`DEFAULT_FILE_REF_LEN`] characters
//!
//! There is no delimiter. Changing the suffix length has to be coordinated with
//! the issuing side.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;

use crate::crypto::BASE64_LENIENT;
use crate::error::{ConnectorError, ConnectorResult};

/// Length of the file reference suffix in the current token format
pub const DEFAULT_FILE_REF_LEN: usize = 40;

/// Decoded setup token
#[derive(Clone, PartialEq, Eq)]
pub struct SetupToken {
    key: String,
    file_ref: String,
}

impl SetupToken {
    /// Split a wire token, taking the last `split_point` characters as file reference
    ///
    /// Only the length is checked here. An invalid key segment is reported by
    /// [`SetupToken::key`].
    pub fn decode(token: &str, split_point: usize) -> ConnectorResult<Self> {
        let length = token.chars().count();
        if length < split_point {
            return Err(ConnectorError::MalformedToken {
                length,
                expected: split_point,
            });
        }

        let boundary = token
            .char_indices()
            .nth(length - split_point)
            .map(|(idx, _)| idx)
            .unwrap_or(token.len());
        let (key, file_ref) = token.split_at(boundary);

        Ok(Self {
            key: key.to_string(),
            file_ref: file_ref.to_string(),
        })
    }

    /// Builder for tokens with arbitrary key and file reference
    pub fn builder() -> SetupTokenBuilder {
        SetupTokenBuilder::default()
    }

    /// Password bytes protecting the profile
    pub fn key(&self) -> ConnectorResult<Vec<u8>> {
        BASE64_LENIENT
            .decode(&self.key)
            .map_err(|e| ConnectorError::InvalidKeyEncoding(e.to_string()))
    }

    /// Key segment as it appeared in the token (base64 text)
    pub fn key_segment(&self) -> &str {
        &self.key
    }

    /// Reference of the encrypted profile on the backend
    pub fn file_ref(&self) -> &str {
        &self.file_ref
    }

    /// Replace the key with the base64 encoding of `raw_password`. Used for testing and debugging.
    pub fn with_password(mut self, raw_password: &str) -> Self {
        self.key = STANDARD.encode(raw_password.as_bytes());
        self
    }

    /// Replace the file reference. Used for testing and debugging.
    pub fn with_file_ref(mut self, file_ref: impl Into<String>) -> Self {
        self.file_ref = file_ref.into();
        self
    }
}

impl fmt::Debug for SetupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupToken")
            .field("key", &"<redacted>")
            .field("file_ref", &self.file_ref)
            .finish()
    }
}

/// Constructs a [`SetupToken`] from its parts without going through the wire format
#[derive(Debug, Default, Clone)]
pub struct SetupTokenBuilder {
    key: String,
    file_ref: String,
}

impl SetupTokenBuilder {
    /// Raw password; stored base64 encoded like a decoded token
    pub fn password(mut self, raw_password: impl AsRef<[u8]>) -> Self {
        self.key = STANDARD.encode(raw_password.as_ref());
        self
    }

    /// Key segment exactly as it would appear on the wire
    pub fn key_segment(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn file_ref(mut self, file_ref: impl Into<String>) -> Self {
        self.file_ref = file_ref.into();
        self
    }

    pub fn build(self) -> SetupToken {
        SetupToken {
            key: self.key,
            file_ref: self.file_ref,
        }
    }

    /// Wire representation of the token being built
    pub fn encode(&self) -> String {
        format!("{}{}", self.key, self.file_ref)
    }
}
