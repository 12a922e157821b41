//! Fleet Store
//!
//! Durable station registry and telemetry source. The gateway consumes
//! it read-only for listing and the eligibility query, and writes back
//! credentials and last-upload timestamps. All updates are idempotent
//! upserts keyed by station ID, so a failed cycle can safely be retried
//! wholesale.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use telemetry_model::{ReadingBatch, Station, WeatherTelemetry};
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Credential write-back for one station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub station_id: String,
    /// New credential; empty wipes the cached one so the device gets
    /// re-provisioned on the next sweep
    pub credential: String,
}

/// Last-successful-upload write-back for one station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadMark<'a> {
    pub station_id: &'a str,
    pub uploaded_at: DateTime<Utc>,
}

/// Station registry and telemetry source contract.
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// All stations, ordered by station ID
    async fn list_stations(&self) -> Result<Vec<Station>, StoreError>;

    /// Upsert one station by ID
    async fn add_station(&self, station: &Station) -> Result<(), StoreError>;

    /// Batched credential upsert, last-write-wins per station ID
    async fn update_credentials(&self, updates: &[CredentialUpdate]) -> Result<(), StoreError>;

    /// Batched last-upload upsert; a mark older than the stored value is
    /// ignored, keeping the timestamp monotonically non-decreasing
    async fn update_last_upload(&self, marks: &[UploadMark<'_>]) -> Result<(), StoreError>;

    /// Insert a batch of sensor rows
    async fn insert_readings(&self, batch: &ReadingBatch) -> Result<(), StoreError>;

    /// Records ready for dispatch: all six sensor groups present for the
    /// same (station, timestamp) and the timestamp strictly newer than
    /// the station's last upload. Ordered by timestamp, then station ID.
    async fn eligible_telemetry(&self) -> Result<Vec<WeatherTelemetry>, StoreError>;
}
