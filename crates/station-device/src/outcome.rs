//! Device operation results and orchestrator notifications

use chrono::{DateTime, Utc};

/// Result of one provisioning exchange.
///
/// Invariant: `credential` is non-empty only when `success` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningOutcome {
    pub station_id: String,
    pub credential: String,
    pub success: bool,
}

impl ProvisioningOutcome {
    pub fn assigned(station_id: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            credential: credential.into(),
            success: true,
        }
    }

    pub fn failed(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            credential: String::new(),
            success: false,
        }
    }
}

/// Result of one telemetry send, carrying the record's capture timestamp
/// so the orchestrator can advance the station's last-upload mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub station_id: String,
    pub captured_at: DateTime<Utc>,
    pub success: bool,
}

impl SendOutcome {
    pub fn sent(station_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.into(),
            captured_at,
            success: true,
        }
    }

    pub fn failed(station_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.into(),
            captured_at,
            success: false,
        }
    }
}

/// Notifications a device sends to the fleet orchestrator. Delivered over
/// a channel and drained once per polling cycle, never invoked re-entrantly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device reconnected under a fresh credential that must be persisted
    CredentialChanged {
        station_id: String,
        credential: String,
    },
    /// The cached credential was rejected and wiped; persist the wipe so a
    /// restart also re-provisions
    ReprovisionNeeded { station_id: String },
}
