//! Connection credential format
//!
//! The credential cached per station is an opaque string of the form
//! `host=<assigned-host>;device=<station-id>;key=<device-key>`. Only this
//! crate and the transport parse it; everything else treats it as opaque.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Parsed connection credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub host: String,
    pub device_id: String,
    pub key: String,
}

/// Credential string parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialParseError {
    #[error("credential segment without '=': {0}")]
    MalformedSegment(String),

    #[error("credential is missing the {0} field")]
    MissingField(&'static str),
}

impl Credential {
    pub fn new(
        host: impl Into<String>,
        device_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            device_id: device_id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={};device={};key={}",
            self.host, self.device_id, self.key
        )
    }
}

impl FromStr for Credential {
    type Err = CredentialParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut host = None;
        let mut device_id = None;
        let mut key = None;
        for segment in s.split(';').filter(|s| !s.is_empty()) {
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| CredentialParseError::MalformedSegment(segment.to_string()))?;
            match name {
                "host" => host = Some(value.to_string()),
                "device" => device_id = Some(value.to_string()),
                "key" => key = Some(value.to_string()),
                // unknown segments are ignored for forward compatibility
                _ => {}
            }
        }
        Ok(Self {
            host: host.ok_or(CredentialParseError::MissingField("host"))?,
            device_id: device_id.ok_or(CredentialParseError::MissingField("device"))?,
            key: key.ok_or(CredentialParseError::MissingField("key"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let cred = Credential::new("hub.example.net", "Station-7", "c2VjcmV0a2V5PT0=");
        let parsed: Credential = cred.to_string().parse().unwrap();
        assert_eq!(parsed, cred);
    }

    #[test]
    fn base64_key_with_padding_survives() {
        // the key value itself contains '=' characters
        let parsed: Credential = "host=h;device=d;key=YWJjZA==".parse().unwrap();
        assert_eq!(parsed.key, "YWJjZA==");
    }

    #[test]
    fn missing_field_is_an_error() {
        let err = "host=h;device=d".parse::<Credential>().unwrap_err();
        assert_eq!(err, CredentialParseError::MissingField("key"));
    }
}
