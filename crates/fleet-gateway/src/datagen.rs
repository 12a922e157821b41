//! Synthetic station data generator
//!
//! Stands in for real logger ingest during development and load tests.
//! Each round writes one complete six-group reading set per station,
//! all sharing a single timestamp, so every round becomes one eligible
//! record per station. Absent sensors carry the logger's -6999
//! sentinel rather than being omitted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_store::{FleetStore, StoreError};
use rand::Rng;
use telemetry_model::{
    AirHumidity, AtmosPressure, Pavement, Precipitation, Reading, ReadingBatch, Snow, Station,
    Wind,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::GeneratorSettings;

/// Sensor array identifier codes, as the loggers report them.
const ID_ATMOSPHERIC: i32 = 131;
const ID_PRECIP_SNOW: i32 = 132;
const ID_WIND: i32 = 134;
const ID_PAVEMENT: i32 = 137;

/// Sentinel for a sensor the station does not carry.
const ABSENT: f32 = -6999.0;

pub struct DataGenerator {
    store: Arc<dyn FleetStore>,
    settings: GeneratorSettings,
}

impl DataGenerator {
    pub fn new(store: Arc<dyn FleetStore>, settings: GeneratorSettings) -> Self {
        Self { store, settings }
    }

    /// Generate one round per interval until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), StoreError> {
        let stations = self.ensure_stations().await?;
        info!(stations = stations.len(), "data generator started");
        let interval = std::time::Duration::from_secs(self.settings.generation_interval_secs);

        while !cancel.is_cancelled() {
            let batch = synth_batch(&stations, Utc::now(), &mut rand::thread_rng());
            let rows = batch.len();
            match self.store.insert_readings(&batch).await {
                Ok(()) => debug!(rows, "generated readings"),
                Err(e) => error!(error = %e, "failed to store generated readings"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("data generator stopped");
        Ok(())
    }

    /// Make sure `Station-1 ..= Station-{count}` exist, creating only
    /// the missing ones. Stations under other IDs keep their rows but
    /// get no generated data.
    async fn ensure_stations(&self) -> Result<Vec<Station>, StoreError> {
        let mut by_id: HashMap<String, Station> = self
            .store
            .list_stations()
            .await?
            .into_iter()
            .map(|s| (s.station_id.clone(), s))
            .collect();

        let target = self.settings.station_count as usize;
        let mut stations = Vec::with_capacity(target);
        for i in 1..=target {
            let station_id = format!("Station-{i}");
            match by_id.remove(&station_id) {
                Some(existing) => stations.push(existing),
                None => {
                    let station = Station::new(station_id, format!("Weather Station {i}"));
                    self.store.add_station(&station).await?;
                    stations.push(station);
                }
            }
        }

        Ok(stations)
    }
}

/// Build one round of readings for every station at a shared timestamp.
pub fn synth_batch(
    stations: &[Station],
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> ReadingBatch {
    let mut batch = ReadingBatch::default();

    for station in stations {
        let id = station.station_id.as_str();

        batch.air_humidity.push(Reading::new(
            now,
            id,
            ID_ATMOSPHERIC,
            AirHumidity {
                max_air_temp1: rng.gen_range(10.0..25.0),
                cur_air_temp1: rng.gen_range(5.0..25.0),
                min_air_temp1: rng.gen_range(5.0..25.0),
                air_temp_q: 300.0,
                air_temp2: ABSENT,
                air_temp2_q: -100.0,
                rh: rng.gen_range(50.0..100.0),
                dew_point: rng.gen_range(5.0..15.0),
            },
        ));

        batch.atmos_pressure.push(Reading::new(
            now,
            id,
            ID_ATMOSPHERIC,
            AtmosPressure {
                atm_pressure: rng.gen_range(900.0..915.0),
            },
        ));

        let pvmnt_temp1 = rng.gen_range(6.0..15.0);
        batch.pavement.push(Reading::new(
            now,
            id,
            ID_PAVEMENT,
            Pavement {
                pvmnt_temp1,
                pavement_q1: 500.0,
                alt_pave_temp1: pvmnt_temp1,
                frz_pnt_temp1: ABSENT,
                frz_pnt_temp1_q: ABSENT,
                pvmnt_cond: rng.gen_range(1.0..5.0),
                pvmnt_cond1_q: 500.0,
                sb_asphlt_temp: rng.gen_range(10.0..15.0),
                pv_base_temp1: ABSENT,
                pv_base_temp1_q: ABSENT,
                pvmnt_srf_cv_th: ABSENT,
                pvmnt_srf_cv_th_q: ABSENT,
            },
        ));

        batch.precipitation.push(Reading::new(
            now,
            id,
            ID_PRECIP_SNOW,
            Precipitation {
                gauge_tot: rng.gen_range(400.0..450.0),
                new_precip: rng.gen_range(0.0..3.0),
                hrly_precip: rng.gen_range(0.0..3.0),
                precip_gauge_q: 500.0,
                precip_det_ratio: 0.0,
                precip_det_q: 500.0,
            },
        ));

        batch.snow.push(Reading::new(
            now,
            id,
            ID_PRECIP_SNOW,
            Snow {
                hs: ABSENT,
                h_std: 0.0,
                hrly_snow: 0.0,
                snow_q: 500.0,
            },
        ));

        batch.wind.push(Reading::new(
            now,
            id,
            ID_WIND,
            Wind {
                max_wind_spd: rng.gen_range(1.0..25.0),
                mean_wind_spd: rng.gen_range(1.0..25.0),
                wind_spd: rng.gen_range(1.0..25.0),
                wind_spd_q: 500.0,
                mean_wind_dir: rng.gen_range(0.0..360.0),
                st_dev_wind: rng.gen_range(0.0..100.0),
                wind_dir: rng.gen_range(0.0..360.0),
                derime_stat: ABSENT,
            },
        ));
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_store::MemoryStore;

    #[tokio::test]
    async fn ensure_stations_fills_gaps_without_renaming_existing_rows() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_station(&Station::new("Roadside-7", "Legacy Roadside 7"))
            .await
            .unwrap();
        store
            .add_station(&Station::new("Station-2", "Weather Station 2"))
            .await
            .unwrap();

        let generator = DataGenerator::new(
            store.clone(),
            GeneratorSettings {
                enabled: true,
                generation_interval_secs: 60,
                station_count: 3,
            },
        );
        let stations = generator.ensure_stations().await.unwrap();

        let ids: Vec<_> = stations.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["Station-1", "Station-2", "Station-3"]);

        // the legacy row survives untouched, no target IDs are duplicated
        let all: Vec<_> = store
            .list_stations()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.station_id)
            .collect();
        assert_eq!(all, vec!["Roadside-7", "Station-1", "Station-2", "Station-3"]);
    }

    #[test]
    fn one_round_is_six_rows_per_station_at_one_timestamp() {
        let stations = vec![
            Station::new("Station-1", "Weather Station 1"),
            Station::new("Station-2", "Weather Station 2"),
        ];
        let now = Utc::now();
        let batch = synth_batch(&stations, now, &mut rand::thread_rng());

        assert_eq!(batch.len(), 12);
        assert_eq!(batch.wind.len(), 2);
        assert!(batch.air_humidity.iter().all(|r| r.captured_at == now));
        assert_eq!(batch.pavement[0].identifier, ID_PAVEMENT);
        assert_eq!(batch.snow[1].station_id, "Station-2");
    }

    #[test]
    fn absent_sensors_carry_the_sentinel() {
        let stations = vec![Station::new("Station-1", "Weather Station 1")];
        let batch = synth_batch(&stations, Utc::now(), &mut rand::thread_rng());

        assert_eq!(batch.air_humidity[0].data.air_temp2, ABSENT);
        assert_eq!(batch.snow[0].data.hs, ABSENT);
        assert_eq!(batch.wind[0].data.derime_stat, ABSENT);
        assert_eq!(batch.pavement[0].data.frz_pnt_temp1, ABSENT);
    }

    #[test]
    fn generated_values_stay_in_range() {
        let stations = vec![Station::new("Station-1", "Weather Station 1")];
        let batch = synth_batch(&stations, Utc::now(), &mut rand::thread_rng());

        let air = &batch.air_humidity[0].data;
        assert!((10.0..25.0).contains(&air.max_air_temp1));
        assert!((50.0..100.0).contains(&air.rh));
        assert!((900.0..915.0).contains(&batch.atmos_pressure[0].data.atm_pressure));
        let pavement = &batch.pavement[0].data;
        assert_eq!(pavement.alt_pave_temp1, pavement.pvmnt_temp1);
    }
}
