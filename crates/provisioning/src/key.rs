//! Derived device keys

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Key derivation errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("enrollment key is not valid base64: {0}")]
    InvalidEnrollmentKey(#[from] base64::DecodeError),

    #[error("enrollment key rejected by HMAC: {0}")]
    InvalidKeyLength(String),
}

/// Derive the per-device symmetric key from the fleet enrollment key.
///
/// The derived key is Base64(HMAC-SHA256(base64-decode(enrollment_key),
/// station_id)). A blank enrollment key passes through unchanged so a
/// fleet without group enrollment can pin raw per-device keys.
pub fn derive_device_key(enrollment_key: &str, station_id: &str) -> Result<String, KeyError> {
    if enrollment_key.trim().is_empty() {
        return Ok(enrollment_key.to_string());
    }

    let key_bytes = STANDARD.decode(enrollment_key)?;
    let mut mac = HmacSha256::new_from_slice(&key_bytes)
        .map_err(|e| KeyError::InvalidKeyLength(e.to_string()))?;
    mac.update(station_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
