//! In-memory store

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use telemetry_model::{
    AirHumidity, AtmosPressure, Pavement, Precipitation, Reading, ReadingBatch, Snow, Station,
    WeatherTelemetry, Wind,
};
use tracing::debug;

use crate::{CredentialUpdate, FleetStore, StoreError, UploadMark};

#[derive(Default)]
struct Inner {
    stations: BTreeMap<String, Station>,
    air_humidity: Vec<Reading<AirHumidity>>,
    atmos_pressure: Vec<Reading<AtmosPressure>>,
    pavement: Vec<Reading<Pavement>>,
    precipitation: Vec<Reading<Precipitation>>,
    snow: Vec<Reading<Snow>>,
    wind: Vec<Reading<Wind>>,
}

/// Mutex-guarded in-memory store. Backs the test suites and small
/// tooling that does not want a database file.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Database(format!("lock error: {e}")))
    }
}

/// Collects group rows for one (timestamp, station) pair until complete.
#[derive(Default)]
struct RecordBuilder {
    air_humidity: Option<AirHumidity>,
    atmos_pressure: Option<AtmosPressure>,
    pavement: Option<Pavement>,
    precipitation: Option<Precipitation>,
    snow: Option<Snow>,
    wind: Option<Wind>,
}

impl RecordBuilder {
    fn build(self, captured_at: DateTime<Utc>, station_id: String) -> Option<WeatherTelemetry> {
        Some(WeatherTelemetry {
            captured_at,
            station_id,
            air_humidity: self.air_humidity?,
            atmos_pressure: self.atmos_pressure?,
            pavement: self.pavement?,
            precipitation: self.precipitation?,
            snow: self.snow?,
            wind: self.wind?,
        })
    }
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn list_stations(&self) -> Result<Vec<Station>, StoreError> {
        // BTreeMap iteration is already ordered by station ID
        Ok(self.lock()?.stations.values().cloned().collect())
    }

    async fn add_station(&self, station: &Station) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .stations
            .entry(station.station_id.clone())
            .and_modify(|existing| existing.station_name = station.station_name.clone())
            .or_insert_with(|| station.clone());
        Ok(())
    }

    async fn update_credentials(&self, updates: &[CredentialUpdate]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        for update in updates {
            inner
                .stations
                .entry(update.station_id.clone())
                .and_modify(|s| s.credential = update.credential.clone())
                .or_insert_with(|| {
                    let mut station =
                        Station::new(update.station_id.clone(), update.station_id.clone());
                    station.credential = update.credential.clone();
                    station
                });
        }
        Ok(())
    }

    async fn update_last_upload(&self, marks: &[UploadMark<'_>]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        for mark in marks {
            if let Some(station) = inner.stations.get_mut(mark.station_id) {
                if mark.uploaded_at > station.last_upload {
                    station.last_upload = mark.uploaded_at;
                }
            }
        }
        Ok(())
    }

    async fn insert_readings(&self, batch: &ReadingBatch) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.air_humidity.extend(batch.air_humidity.iter().cloned());
        inner
            .atmos_pressure
            .extend(batch.atmos_pressure.iter().cloned());
        inner.pavement.extend(batch.pavement.iter().cloned());
        inner
            .precipitation
            .extend(batch.precipitation.iter().cloned());
        inner.snow.extend(batch.snow.iter().cloned());
        inner.wind.extend(batch.wind.iter().cloned());
        debug!(rows = batch.len(), "inserted reading batch");
        Ok(())
    }

    async fn eligible_telemetry(&self) -> Result<Vec<WeatherTelemetry>, StoreError> {
        let inner = self.lock()?;

        // BTreeMap key (timestamp, station) yields the required ordering
        let mut builders: BTreeMap<(DateTime<Utc>, String), RecordBuilder> = BTreeMap::new();
        let newer_than_upload = |station_id: &str, captured_at: DateTime<Utc>| {
            inner
                .stations
                .get(station_id)
                .map(|s| captured_at > s.last_upload)
                .unwrap_or(false)
        };

        macro_rules! collect_group {
            ($rows:expr, $slot:ident) => {
                for row in $rows.iter() {
                    if newer_than_upload(&row.station_id, row.captured_at) {
                        builders
                            .entry((row.captured_at, row.station_id.clone()))
                            .or_default()
                            .$slot = Some(row.data);
                    }
                }
            };
        }
        collect_group!(inner.air_humidity, air_humidity);
        collect_group!(inner.atmos_pressure, atmos_pressure);
        collect_group!(inner.pavement, pavement);
        collect_group!(inner.precipitation, precipitation);
        collect_group!(inner.snow, snow);
        collect_group!(inner.wind, wind);

        Ok(builders
            .into_iter()
            .filter_map(|((captured_at, station_id), builder)| {
                builder.build(captured_at, station_id)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use telemetry_model::Reading;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn full_batch(station_id: &str, captured_at: DateTime<Utc>) -> ReadingBatch {
        ReadingBatch {
            air_humidity: vec![Reading::new(
                captured_at,
                station_id,
                131,
                AirHumidity::default(),
            )],
            atmos_pressure: vec![Reading::new(
                captured_at,
                station_id,
                131,
                AtmosPressure::default(),
            )],
            pavement: vec![Reading::new(captured_at, station_id, 137, Pavement::default())],
            precipitation: vec![Reading::new(
                captured_at,
                station_id,
                132,
                Precipitation::default(),
            )],
            snow: vec![Reading::new(captured_at, station_id, 132, Snow::default())],
            wind: vec![Reading::new(captured_at, station_id, 134, Wind::default())],
        }
    }

    async fn store_with_station(id: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .add_station(&Station::new(id, format!("Weather {id}")))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn complete_records_are_eligible() {
        let store = store_with_station("Station-1").await;
        store
            .insert_readings(&full_batch("Station-1", ts(0)))
            .await
            .unwrap();

        let records = store.eligible_telemetry().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].station_id, "Station-1");
        assert_eq!(records[0].captured_at, ts(0));
    }

    #[tokio::test]
    async fn five_of_six_groups_is_not_eligible() {
        let store = store_with_station("Station-1").await;
        let mut batch = full_batch("Station-1", ts(0));
        batch.wind.clear();
        store.insert_readings(&batch).await.unwrap();

        assert!(store.eligible_telemetry().await.unwrap().is_empty());

        // the sixth group arriving completes the record
        store
            .insert_readings(&ReadingBatch {
                wind: vec![Reading::new(ts(0), "Station-1", 134, Wind::default())],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.eligible_telemetry().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn uploaded_records_are_filtered_out() {
        let store = store_with_station("Station-1").await;
        store
            .insert_readings(&full_batch("Station-1", ts(0)))
            .await
            .unwrap();
        store
            .insert_readings(&full_batch("Station-1", ts(5)))
            .await
            .unwrap();

        store
            .update_last_upload(&[UploadMark {
                station_id: "Station-1",
                uploaded_at: ts(0),
            }])
            .await
            .unwrap();

        let records = store.eligible_telemetry().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].captured_at, ts(5));
    }

    #[tokio::test]
    async fn eligibility_is_ordered_by_timestamp_then_station() {
        let store = MemoryStore::new();
        for id in ["Station-2", "Station-1"] {
            store.add_station(&Station::new(id, id)).await.unwrap();
            store.insert_readings(&full_batch(id, ts(5))).await.unwrap();
        }
        store
            .insert_readings(&full_batch("Station-2", ts(1)))
            .await
            .unwrap();

        let records = store.eligible_telemetry().await.unwrap();
        let order: Vec<_> = records
            .iter()
            .map(|r| (r.captured_at, r.station_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (ts(1), "Station-2"),
                (ts(5), "Station-1"),
                (ts(5), "Station-2"),
            ]
        );
    }

    #[tokio::test]
    async fn last_upload_never_decreases() {
        let store = store_with_station("Station-1").await;
        for minute in [5, 2, 9, 1] {
            store
                .update_last_upload(&[UploadMark {
                    station_id: "Station-1",
                    uploaded_at: ts(minute),
                }])
                .await
                .unwrap();
        }
        let stations = store.list_stations().await.unwrap();
        assert_eq!(stations[0].last_upload, ts(9));
    }

    #[tokio::test]
    async fn credential_updates_are_last_write_wins() {
        let store = store_with_station("Station-1").await;
        store
            .update_credentials(&[
                CredentialUpdate {
                    station_id: "Station-1".into(),
                    credential: "host=a;device=Station-1;key=k1".into(),
                },
                CredentialUpdate {
                    station_id: "Station-1".into(),
                    credential: "host=b;device=Station-1;key=k2".into(),
                },
            ])
            .await
            .unwrap();

        let stations = store.list_stations().await.unwrap();
        assert_eq!(stations[0].credential, "host=b;device=Station-1;key=k2");
    }

    #[tokio::test]
    async fn stations_list_is_ordered_by_id() {
        let store = MemoryStore::new();
        for id in ["Station-3", "Station-1", "Station-2"] {
            store.add_station(&Station::new(id, id)).await.unwrap();
        }
        let ids: Vec<_> = store
            .list_stations()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.station_id)
            .collect();
        assert_eq!(ids, vec!["Station-1", "Station-2", "Station-3"]);
    }
}
