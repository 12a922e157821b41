//! Credential Provisioning
//!
//! Derives per-device keys from the fleet enrollment key and exchanges
//! them with the registration service for a connection credential bound
//! to an assigned ingestion host. Provisioning is idempotent; repeating
//! the exchange for an already-registered device returns the same
//! assignment.

mod credential;
mod key;
mod rest;

pub use credential::{Credential, CredentialParseError};
pub use key::{derive_device_key, KeyError};
pub use rest::RestProvisioner;

use async_trait::async_trait;
use thiserror::Error;

/// Provisioning errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The registration service refused the device
    #[error("registration rejected with status {0}")]
    Rejected(String),

    /// The exchange itself failed (network, decode)
    #[error("registration request failed: {0}")]
    Request(String),
}

/// Successful registration: the host this device was assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub assigned_host: String,
}

/// Exchange a derived device key for a host assignment.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(
        &self,
        station_id: &str,
        device_key: &str,
    ) -> Result<Registration, ProvisionError>;
}
