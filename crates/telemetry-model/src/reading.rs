//! Stored sensor rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::groups::{AirHumidity, AtmosPressure, Pavement, Precipitation, Snow, Wind};

/// One stored sensor row: a group reading plus its capture context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading<T> {
    pub captured_at: DateTime<Utc>,
    pub station_id: String,
    /// Logger record number
    pub rec_num: i32,
    /// Sensor array identifier code
    pub identifier: i32,
    pub data: T,
}

impl<T> Reading<T> {
    pub fn new(
        captured_at: DateTime<Utc>,
        station_id: impl Into<String>,
        identifier: i32,
        data: T,
    ) -> Self {
        Self {
            captured_at,
            station_id: station_id.into(),
            rec_num: 0,
            identifier,
            data,
        }
    }
}

/// A batch of rows across all six groups, inserted in one store call.
#[derive(Debug, Clone, Default)]
pub struct ReadingBatch {
    pub air_humidity: Vec<Reading<AirHumidity>>,
    pub atmos_pressure: Vec<Reading<AtmosPressure>>,
    pub pavement: Vec<Reading<Pavement>>,
    pub precipitation: Vec<Reading<Precipitation>>,
    pub snow: Vec<Reading<Snow>>,
    pub wind: Vec<Reading<Wind>>,
}

impl ReadingBatch {
    /// Total rows across all groups
    pub fn len(&self) -> usize {
        self.air_humidity.len()
            + self.atmos_pressure.len()
            + self.pavement.len()
            + self.precipitation.len()
            + self.snow.len()
            + self.wind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
