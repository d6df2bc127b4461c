//! Encrypted profile payloads
//!
//! The backend delivers the connector profile as base64 text of
//!
//! ```text
//! salt (32) || AES-GCM ciphertext (N) || GCM tag (16)
//! ```
//!
//! Key and IV come from PBKDF2-HMAC-SHA256 over the token password and the
//! salt, producing `key_len + iv_len` bytes split at `key_len`. The sizes and
//! the iteration count in [`DecryptParams::default`] are fixed by the backend.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce, Tag};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::Engine as _;
use hmac::Hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::error::DecryptError;

pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 25000;

/// Standard alphabet decoder that tolerates non-zero trailing bits
pub(crate) const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Payload layout and key derivation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptParams {
    pub key_len: usize,
    pub salt_len: usize,
    pub iv_len: usize,
    pub tag_len: usize,
    pub iterations: u32,
}

impl Default for DecryptParams {
    fn default() -> Self {
        Self {
            key_len: KEY_LEN,
            salt_len: SALT_LEN,
            iv_len: IV_LEN,
            tag_len: TAG_LEN,
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl DecryptParams {
    /// Smallest decoded payload that can hold salt and tag
    pub fn min_payload_len(&self) -> Result<usize, DecryptError> {
        self.salt_len.checked_add(self.tag_len).ok_or_else(|| {
            DecryptError::Cipher(format!(
                "salt length {} and tag length {} overflow",
                self.salt_len, self.tag_len
            ))
        })
    }

    /// AES-GCM here supports 128/256-bit keys, 96-bit IVs and full 128-bit tags
    fn check_cipher(&self) -> Result<(), DecryptError> {
        if self.key_len != 16 && self.key_len != 32 {
            return Err(DecryptError::Cipher(format!(
                "unsupported AES key length {}",
                self.key_len
            )));
        }
        if self.iv_len != IV_LEN {
            return Err(DecryptError::Cipher(format!(
                "unsupported GCM IV length {}",
                self.iv_len
            )));
        }
        if self.tag_len != TAG_LEN {
            return Err(DecryptError::Cipher(format!(
                "unsupported GCM tag length {}",
                self.tag_len
            )));
        }
        Ok(())
    }
}

/// Decryption key and IV derived from a password and salt
pub struct DerivedKeyMaterial {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl DerivedKeyMaterial {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

impl Drop for DerivedKeyMaterial {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeyMaterial")
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.len())
            .finish()
    }
}

/// Run PBKDF2-HMAC-SHA256 and split the output into key and IV
pub fn derive_key_material(
    password: &[u8],
    salt: &[u8],
    params: &DecryptParams,
) -> Result<DerivedKeyMaterial, DecryptError> {
    if params.iterations == 0 {
        return Err(DecryptError::KeyDerivation(
            "iteration count must be greater than 0".to_string(),
        ));
    }

    params.check_cipher()?;

    let output_len = params.key_len.checked_add(params.iv_len).ok_or_else(|| {
        DecryptError::KeyDerivation("key and IV length overflow".to_string())
    })?;
    let mut output = vec![0u8; output_len];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, params.iterations, &mut output)
        .map_err(|e| DecryptError::KeyDerivation(e.to_string()))?;

    let iv = output.split_off(params.key_len);
    Ok(DerivedKeyMaterial { key: output, iv })
}

/// Decrypts profile payloads protected by a setup token password
pub struct ProfileDecryptor {
    password: Zeroizing<Vec<u8>>,
    params: DecryptParams,
}

impl ProfileDecryptor {
    /// Decryptor using the backend's fixed parameters
    pub fn new(password: &[u8]) -> Self {
        Self::with_params(password, DecryptParams::default())
    }

    pub fn with_params(password: &[u8], params: DecryptParams) -> Self {
        Self {
            password: Zeroizing::new(password.to_vec()),
            params,
        }
    }

    pub fn params(&self) -> &DecryptParams {
        &self.params
    }

    /// Key material for `salt` under this decryptor's password
    pub fn derive_key_material(&self, salt: &[u8]) -> Result<DerivedKeyMaterial, DecryptError> {
        derive_key_material(&self.password, salt, &self.params)
    }

    /// Decode, authenticate and decrypt a base64 payload
    pub fn retrieve(&self, payload_b64: &str) -> Result<Vec<u8>, DecryptError> {
        self.params.check_cipher()?;
        let payload = decode_payload(payload_b64)?;

        let minimum = self.params.min_payload_len()?;
        if payload.len() < minimum {
            return Err(DecryptError::Truncated {
                length: payload.len(),
                minimum,
            });
        }

        let (salt, rest) = payload.split_at(self.params.salt_len);
        let (ciphertext, tag) = rest.split_at(rest.len() - self.params.tag_len);
        debug!("Decrypting profile payload: {} bytes of ciphertext", ciphertext.len());

        let material = self.derive_key_material(salt)?;
        let mut buffer = ciphertext.to_vec();
        if let Err(e) = open_in_place(&self.params, &material, &mut buffer, tag) {
            buffer.zeroize();
            return Err(e);
        }
        Ok(buffer)
    }
}

impl fmt::Debug for ProfileDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileDecryptor")
            .field("password", &"<redacted>")
            .field("params", &self.params)
            .finish()
    }
}

/// Build a payload the way the backend does, with a caller supplied salt
pub fn seal(
    password: &[u8],
    salt: &[u8],
    plaintext: &[u8],
    params: &DecryptParams,
) -> Result<String, DecryptError> {
    if salt.len() != params.salt_len {
        return Err(DecryptError::KeyDerivation(format!(
            "salt must be {} bytes, got {}",
            params.salt_len,
            salt.len()
        )));
    }
    params.check_cipher()?;

    let material = derive_key_material(password, salt, params)?;
    let mut buffer = plaintext.to_vec();
    let nonce = Nonce::<U12>::from_slice(material.iv());
    let tag = match params.key_len {
        16 => Aes128Gcm::new_from_slice(material.key())
            .map_err(|e| DecryptError::Cipher(e.to_string()))?
            .encrypt_in_place_detached(nonce, b"", &mut buffer),
        _ => Aes256Gcm::new_from_slice(material.key())
            .map_err(|e| DecryptError::Cipher(e.to_string()))?
            .encrypt_in_place_detached(nonce, b"", &mut buffer),
    }
    .map_err(|e| DecryptError::Cipher(e.to_string()))?;

    let mut payload = Vec::with_capacity(salt.len() + buffer.len() + tag.len());
    payload.extend_from_slice(salt);
    payload.extend_from_slice(&buffer);
    payload.extend_from_slice(&tag);
    Ok(STANDARD.encode(payload))
}

/// [`seal`] with a fresh random salt
pub fn seal_random(
    password: &[u8],
    plaintext: &[u8],
    params: &DecryptParams,
) -> Result<String, DecryptError> {
    let mut salt = vec![0u8; params.salt_len];
    rand::thread_rng().fill_bytes(&mut salt);
    seal(password, &salt, plaintext, params)
}

fn decode_payload(payload_b64: &str) -> Result<Vec<u8>, DecryptError> {
    // HTTP bodies often carry a trailing newline
    let compact: String = payload_b64
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    BASE64_LENIENT
        .decode(compact)
        .map_err(|e| DecryptError::Decode(e.to_string()))
}

fn open_in_place(
    params: &DecryptParams,
    material: &DerivedKeyMaterial,
    buffer: &mut [u8],
    tag: &[u8],
) -> Result<(), DecryptError> {
    params.check_cipher()?;

    let nonce = Nonce::<U12>::from_slice(material.iv());
    let tag = Tag::<U16>::from_slice(tag);
    let result = match params.key_len {
        16 => Aes128Gcm::new_from_slice(material.key())
            .map_err(|e| DecryptError::Cipher(e.to_string()))?
            .decrypt_in_place_detached(nonce, b"", buffer, tag),
        _ => Aes256Gcm::new_from_slice(material.key())
            .map_err(|e| DecryptError::Cipher(e.to_string()))?
            .decrypt_in_place_detached(nonce, b"", buffer, tag),
    };

    // With key, IV and tag sizes checked, the only way GCM fails is a tag mismatch
    result.map_err(|_| DecryptError::InvalidTag)
}
