//! SQLite store backed by sqlx

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use telemetry_model::{
    AirHumidity, AtmosPressure, Pavement, Precipitation, ReadingBatch, Snow, Station,
    WeatherTelemetry, Wind,
};
use tracing::{debug, info};

use crate::{CredentialUpdate, FleetStore, StoreError, UploadMark};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS stations (
        station_id   TEXT PRIMARY KEY,
        station_name TEXT NOT NULL,
        last_upload  TEXT NOT NULL,
        credential   TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS air_humidity (
        captured_at TEXT NOT NULL, station_id TEXT NOT NULL,
        rec_num INTEGER NOT NULL, identifier INTEGER NOT NULL,
        max_air_temp1 REAL, cur_air_temp1 REAL, min_air_temp1 REAL,
        air_temp_q REAL, air_temp2 REAL, air_temp2_q REAL,
        rh REAL, dew_point REAL,
        PRIMARY KEY (station_id, captured_at)
    )",
    "CREATE TABLE IF NOT EXISTS atmos_pressure (
        captured_at TEXT NOT NULL, station_id TEXT NOT NULL,
        rec_num INTEGER NOT NULL, identifier INTEGER NOT NULL,
        atm_pressure REAL,
        PRIMARY KEY (station_id, captured_at)
    )",
    "CREATE TABLE IF NOT EXISTS pavement (
        captured_at TEXT NOT NULL, station_id TEXT NOT NULL,
        rec_num INTEGER NOT NULL, identifier INTEGER NOT NULL,
        pvmnt_temp1 REAL, pavement_q1 REAL, alt_pave_temp1 REAL,
        frz_pnt_temp1 REAL, frz_pnt_temp1_q REAL, pvmnt_cond REAL,
        pvmnt_cond1_q REAL, sb_asphlt_temp REAL, pv_base_temp1 REAL,
        pv_base_temp1_q REAL, pvmnt_srf_cv_th REAL, pvmnt_srf_cv_th_q REAL,
        PRIMARY KEY (station_id, captured_at)
    )",
    "CREATE TABLE IF NOT EXISTS precipitation (
        captured_at TEXT NOT NULL, station_id TEXT NOT NULL,
        rec_num INTEGER NOT NULL, identifier INTEGER NOT NULL,
        gauge_tot REAL, new_precip REAL, hrly_precip REAL,
        precip_gauge_q REAL, precip_det_ratio REAL, precip_det_q REAL,
        PRIMARY KEY (station_id, captured_at)
    )",
    "CREATE TABLE IF NOT EXISTS snow (
        captured_at TEXT NOT NULL, station_id TEXT NOT NULL,
        rec_num INTEGER NOT NULL, identifier INTEGER NOT NULL,
        hs REAL, h_std REAL, hrly_snow REAL, snow_q REAL,
        PRIMARY KEY (station_id, captured_at)
    )",
    "CREATE TABLE IF NOT EXISTS wind (
        captured_at TEXT NOT NULL, station_id TEXT NOT NULL,
        rec_num INTEGER NOT NULL, identifier INTEGER NOT NULL,
        max_wind_spd REAL, mean_wind_spd REAL, wind_spd REAL,
        wind_spd_q REAL, mean_wind_dir REAL, st_dev_wind REAL,
        wind_dir REAL, derime_stat REAL,
        PRIMARY KEY (station_id, captured_at)
    )",
];

// All six group rows must join on (station, timestamp), and the timestamp
// must be strictly newer than the station's last upload. TEXT timestamps
// are fixed-width RFC 3339 UTC, so lexicographic comparison is
// chronological.
const ELIGIBLE_QUERY: &str = "\
    SELECT ah.captured_at, ah.station_id,
           ah.max_air_temp1, ah.cur_air_temp1, ah.min_air_temp1, ah.air_temp_q,
           ah.air_temp2, ah.air_temp2_q, ah.rh, ah.dew_point,
           ap.atm_pressure,
           pv.pvmnt_temp1, pv.pavement_q1, pv.alt_pave_temp1, pv.frz_pnt_temp1,
           pv.frz_pnt_temp1_q, pv.pvmnt_cond, pv.pvmnt_cond1_q, pv.sb_asphlt_temp,
           pv.pv_base_temp1, pv.pv_base_temp1_q, pv.pvmnt_srf_cv_th, pv.pvmnt_srf_cv_th_q,
           pc.gauge_tot, pc.new_precip, pc.hrly_precip, pc.precip_gauge_q,
           pc.precip_det_ratio, pc.precip_det_q,
           sn.hs, sn.h_std, sn.hrly_snow, sn.snow_q,
           wn.max_wind_spd, wn.mean_wind_spd, wn.wind_spd, wn.wind_spd_q,
           wn.mean_wind_dir, wn.st_dev_wind, wn.wind_dir, wn.derime_stat
    FROM stations st
    JOIN air_humidity ah  ON ah.station_id = st.station_id AND ah.captured_at > st.last_upload
    JOIN atmos_pressure ap ON ap.station_id = ah.station_id AND ap.captured_at = ah.captured_at
    JOIN pavement pv      ON pv.station_id = ah.station_id AND pv.captured_at = ah.captured_at
    JOIN precipitation pc ON pc.station_id = ah.station_id AND pc.captured_at = ah.captured_at
    JOIN snow sn          ON sn.station_id = ah.station_id AND sn.captured_at = ah.captured_at
    JOIN wind wn          ON wn.station_id = ah.station_id AND wn.captured_at = ah.captured_at
    ORDER BY ah.captured_at, ah.station_id";

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("bad timestamp {raw:?}: {e}")))
}

/// SQLite-backed store. The schema is created on connect.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url).await.map_err(db_err)?;
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&pool).await.map_err(db_err)?;
        }
        info!(%url, "connected to fleet database");
        Ok(Self { pool })
    }
}

fn station_from_row(row: &SqliteRow) -> Result<Station, StoreError> {
    let last_upload: String = row.try_get("last_upload").map_err(db_err)?;
    Ok(Station {
        station_id: row.try_get("station_id").map_err(db_err)?,
        station_name: row.try_get("station_name").map_err(db_err)?,
        last_upload: decode_ts(&last_upload)?,
        credential: row.try_get("credential").map_err(db_err)?,
    })
}

fn telemetry_from_row(row: &SqliteRow) -> Result<WeatherTelemetry, StoreError> {
    let captured_at: String = row.try_get("captured_at").map_err(db_err)?;
    let f = |name: &str| -> Result<f32, StoreError> { row.try_get(name).map_err(db_err) };
    Ok(WeatherTelemetry {
        captured_at: decode_ts(&captured_at)?,
        station_id: row.try_get("station_id").map_err(db_err)?,
        air_humidity: AirHumidity {
            max_air_temp1: f("max_air_temp1")?,
            cur_air_temp1: f("cur_air_temp1")?,
            min_air_temp1: f("min_air_temp1")?,
            air_temp_q: f("air_temp_q")?,
            air_temp2: f("air_temp2")?,
            air_temp2_q: f("air_temp2_q")?,
            rh: f("rh")?,
            dew_point: f("dew_point")?,
        },
        atmos_pressure: AtmosPressure {
            atm_pressure: f("atm_pressure")?,
        },
        pavement: Pavement {
            pvmnt_temp1: f("pvmnt_temp1")?,
            pavement_q1: f("pavement_q1")?,
            alt_pave_temp1: f("alt_pave_temp1")?,
            frz_pnt_temp1: f("frz_pnt_temp1")?,
            frz_pnt_temp1_q: f("frz_pnt_temp1_q")?,
            pvmnt_cond: f("pvmnt_cond")?,
            pvmnt_cond1_q: f("pvmnt_cond1_q")?,
            sb_asphlt_temp: f("sb_asphlt_temp")?,
            pv_base_temp1: f("pv_base_temp1")?,
            pv_base_temp1_q: f("pv_base_temp1_q")?,
            pvmnt_srf_cv_th: f("pvmnt_srf_cv_th")?,
            pvmnt_srf_cv_th_q: f("pvmnt_srf_cv_th_q")?,
        },
        precipitation: Precipitation {
            gauge_tot: f("gauge_tot")?,
            new_precip: f("new_precip")?,
            hrly_precip: f("hrly_precip")?,
            precip_gauge_q: f("precip_gauge_q")?,
            precip_det_ratio: f("precip_det_ratio")?,
            precip_det_q: f("precip_det_q")?,
        },
        snow: Snow {
            hs: f("hs")?,
            h_std: f("h_std")?,
            hrly_snow: f("hrly_snow")?,
            snow_q: f("snow_q")?,
        },
        wind: Wind {
            max_wind_spd: f("max_wind_spd")?,
            mean_wind_spd: f("mean_wind_spd")?,
            wind_spd: f("wind_spd")?,
            wind_spd_q: f("wind_spd_q")?,
            mean_wind_dir: f("mean_wind_dir")?,
            st_dev_wind: f("st_dev_wind")?,
            wind_dir: f("wind_dir")?,
            derime_stat: f("derime_stat")?,
        },
    })
}

#[async_trait]
impl FleetStore for SqliteStore {
    async fn list_stations(&self) -> Result<Vec<Station>, StoreError> {
        let rows = sqlx::query(
            "SELECT station_id, station_name, last_upload, credential
             FROM stations ORDER BY station_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(station_from_row).collect()
    }

    async fn add_station(&self, station: &Station) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO stations (station_id, station_name, last_upload, credential)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(station_id) DO UPDATE SET station_name = excluded.station_name",
        )
        .bind(&station.station_id)
        .bind(&station.station_name)
        .bind(encode_ts(station.last_upload))
        .bind(&station.credential)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_credentials(&self, updates: &[CredentialUpdate]) -> Result<(), StoreError> {
        for update in updates {
            sqlx::query(
                "INSERT INTO stations (station_id, station_name, last_upload, credential)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(station_id) DO UPDATE SET credential = excluded.credential",
            )
            .bind(&update.station_id)
            .bind(&update.station_id)
            .bind(encode_ts(DateTime::UNIX_EPOCH))
            .bind(&update.credential)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        debug!(count = updates.len(), "persisted credential updates");
        Ok(())
    }

    async fn update_last_upload(&self, marks: &[UploadMark<'_>]) -> Result<(), StoreError> {
        for mark in marks {
            sqlx::query(
                "UPDATE stations
                 SET last_upload = MAX(last_upload, ?)
                 WHERE station_id = ?",
            )
            .bind(encode_ts(mark.uploaded_at))
            .bind(mark.station_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        debug!(count = marks.len(), "persisted last-upload marks");
        Ok(())
    }

    async fn insert_readings(&self, batch: &ReadingBatch) -> Result<(), StoreError> {
        for r in &batch.air_humidity {
            sqlx::query(
                "INSERT OR REPLACE INTO air_humidity
                 (captured_at, station_id, rec_num, identifier,
                  max_air_temp1, cur_air_temp1, min_air_temp1, air_temp_q,
                  air_temp2, air_temp2_q, rh, dew_point)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(encode_ts(r.captured_at))
            .bind(&r.station_id)
            .bind(r.rec_num)
            .bind(r.identifier)
            .bind(r.data.max_air_temp1)
            .bind(r.data.cur_air_temp1)
            .bind(r.data.min_air_temp1)
            .bind(r.data.air_temp_q)
            .bind(r.data.air_temp2)
            .bind(r.data.air_temp2_q)
            .bind(r.data.rh)
            .bind(r.data.dew_point)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        for r in &batch.atmos_pressure {
            sqlx::query(
                "INSERT OR REPLACE INTO atmos_pressure
                 (captured_at, station_id, rec_num, identifier, atm_pressure)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(encode_ts(r.captured_at))
            .bind(&r.station_id)
            .bind(r.rec_num)
            .bind(r.identifier)
            .bind(r.data.atm_pressure)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        for r in &batch.pavement {
            sqlx::query(
                "INSERT OR REPLACE INTO pavement
                 (captured_at, station_id, rec_num, identifier,
                  pvmnt_temp1, pavement_q1, alt_pave_temp1, frz_pnt_temp1,
                  frz_pnt_temp1_q, pvmnt_cond, pvmnt_cond1_q, sb_asphlt_temp,
                  pv_base_temp1, pv_base_temp1_q, pvmnt_srf_cv_th, pvmnt_srf_cv_th_q)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(encode_ts(r.captured_at))
            .bind(&r.station_id)
            .bind(r.rec_num)
            .bind(r.identifier)
            .bind(r.data.pvmnt_temp1)
            .bind(r.data.pavement_q1)
            .bind(r.data.alt_pave_temp1)
            .bind(r.data.frz_pnt_temp1)
            .bind(r.data.frz_pnt_temp1_q)
            .bind(r.data.pvmnt_cond)
            .bind(r.data.pvmnt_cond1_q)
            .bind(r.data.sb_asphlt_temp)
            .bind(r.data.pv_base_temp1)
            .bind(r.data.pv_base_temp1_q)
            .bind(r.data.pvmnt_srf_cv_th)
            .bind(r.data.pvmnt_srf_cv_th_q)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        for r in &batch.precipitation {
            sqlx::query(
                "INSERT OR REPLACE INTO precipitation
                 (captured_at, station_id, rec_num, identifier,
                  gauge_tot, new_precip, hrly_precip, precip_gauge_q,
                  precip_det_ratio, precip_det_q)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(encode_ts(r.captured_at))
            .bind(&r.station_id)
            .bind(r.rec_num)
            .bind(r.identifier)
            .bind(r.data.gauge_tot)
            .bind(r.data.new_precip)
            .bind(r.data.hrly_precip)
            .bind(r.data.precip_gauge_q)
            .bind(r.data.precip_det_ratio)
            .bind(r.data.precip_det_q)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        for r in &batch.snow {
            sqlx::query(
                "INSERT OR REPLACE INTO snow
                 (captured_at, station_id, rec_num, identifier, hs, h_std, hrly_snow, snow_q)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(encode_ts(r.captured_at))
            .bind(&r.station_id)
            .bind(r.rec_num)
            .bind(r.identifier)
            .bind(r.data.hs)
            .bind(r.data.h_std)
            .bind(r.data.hrly_snow)
            .bind(r.data.snow_q)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        for r in &batch.wind {
            sqlx::query(
                "INSERT OR REPLACE INTO wind
                 (captured_at, station_id, rec_num, identifier,
                  max_wind_spd, mean_wind_spd, wind_spd, wind_spd_q,
                  mean_wind_dir, st_dev_wind, wind_dir, derime_stat)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(encode_ts(r.captured_at))
            .bind(&r.station_id)
            .bind(r.rec_num)
            .bind(r.identifier)
            .bind(r.data.max_wind_spd)
            .bind(r.data.mean_wind_spd)
            .bind(r.data.wind_spd)
            .bind(r.data.wind_spd_q)
            .bind(r.data.mean_wind_dir)
            .bind(r.data.st_dev_wind)
            .bind(r.data.wind_dir)
            .bind(r.data.derime_stat)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        debug!(rows = batch.len(), "inserted reading batch");
        Ok(())
    }

    async fn eligible_telemetry(&self) -> Result<Vec<WeatherTelemetry>, StoreError> {
        let rows = sqlx::query(ELIGIBLE_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(telemetry_from_row).collect()
    }
}
