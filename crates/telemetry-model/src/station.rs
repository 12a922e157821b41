//! Station registry entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical sensor station as stored in the registry.
///
/// The station ID doubles as the device ID at the ingestion endpoint.
/// An empty `credential` means the device has not been provisioned yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Unique station ID
    pub station_id: String,
    /// Display name
    pub station_name: String,
    /// Timestamp of the last successful telemetry upload
    pub last_upload: DateTime<Utc>,
    /// Cached connection credential (opaque; empty = unprovisioned)
    pub credential: String,
}

impl Station {
    /// Create a station that has never uploaded and holds no credential
    pub fn new(station_id: impl Into<String>, station_name: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            station_name: station_name.into(),
            last_upload: DateTime::UNIX_EPOCH,
            credential: String::new(),
        }
    }

    /// Whether a provisioning exchange has produced a credential
    pub fn is_provisioned(&self) -> bool {
        !self.credential.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_station_is_unprovisioned() {
        let station = Station::new("Station-1", "Weather Station 1");
        assert!(!station.is_provisioned());
        assert_eq!(station.last_upload, DateTime::UNIX_EPOCH);
    }
}
