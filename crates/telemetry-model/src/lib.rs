//! Shared Data Model
//!
//! Station registry entries, the six sensor-group reading types and the
//! complete telemetry record that is dispatched to the ingestion endpoint.

mod groups;
mod reading;
mod station;
mod telemetry;

pub use groups::{AirHumidity, AtmosPressure, Pavement, Precipitation, Snow, Wind};
pub use reading::{Reading, ReadingBatch};
pub use station::Station;
pub use telemetry::{WeatherTelemetry, TELEMETRY_CONTENT_TYPE};
