//! Complete telemetry record and its wire encoding

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::groups::{AirHumidity, AtmosPressure, Pavement, Precipitation, Snow, Wind};

/// Content type of the wire payload
pub const TELEMETRY_CONTENT_TYPE: &str = "application/json";

/// One complete, timestamped set of readings for a station.
///
/// A record exists only when all six sensor groups are present for the
/// same (station, timestamp) pair; the eligibility query guarantees that,
/// so the groups are not optional here.
///
/// `captured_at` and `station_id` travel in message metadata, not in the
/// body: the device connection already identifies the station, and the
/// message creation time carries the capture timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherTelemetry {
    #[serde(skip)]
    pub captured_at: DateTime<Utc>,
    #[serde(skip)]
    pub station_id: String,
    #[serde(rename = "AirHumidity")]
    pub air_humidity: AirHumidity,
    #[serde(rename = "AtmosPressure")]
    pub atmos_pressure: AtmosPressure,
    #[serde(rename = "Pavement")]
    pub pavement: Pavement,
    #[serde(rename = "Precipitation")]
    pub precipitation: Precipitation,
    #[serde(rename = "Snow")]
    pub snow: Snow,
    #[serde(rename = "Wind")]
    pub wind: Wind,
}

impl WeatherTelemetry {
    /// Encode the six sensor groups as the message body
    pub fn wire_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> WeatherTelemetry {
        WeatherTelemetry {
            captured_at: Utc::now(),
            station_id: "Station-1".to_string(),
            air_humidity: AirHumidity {
                rh: 72.5,
                dew_point: 8.1,
                ..Default::default()
            },
            atmos_pressure: AtmosPressure { atm_pressure: 905.0 },
            pavement: Pavement::default(),
            precipitation: Precipitation::default(),
            snow: Snow::default(),
            wind: Wind {
                wind_spd: 12.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn payload_excludes_metadata() {
        let body: serde_json::Value =
            serde_json::from_slice(&record().wire_payload().unwrap()).unwrap();
        assert!(body.get("station_id").is_none());
        assert!(body.get("captured_at").is_none());
        assert!(body.get("StationID").is_none());
        assert!(body.get("TmStamp").is_none());
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let body: serde_json::Value =
            serde_json::from_slice(&record().wire_payload().unwrap()).unwrap();
        assert_eq!(body["AirHumidity"]["RH"], 72.5);
        assert_eq!(body["AirHumidity"]["Dew_Point"], 8.1);
        assert_eq!(body["AtmosPressure"]["AtmPressure"], 905.0);
        assert_eq!(body["Wind"]["WindSpd"], 12.0);
        assert!(body["Snow"].get("HS").is_some());
        assert!(body["Pavement"].get("PvmntSrfCvTh").is_some());
    }
}
