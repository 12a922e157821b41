//! Road-Weather Station Fleet Gateway
//!
//! Drives a fleet of virtual station devices against an IoT ingestion
//! endpoint: provisions them, keeps them connected, and ships each
//! station's complete weather records from the backing store as
//! telemetry. A built-in generator can synthesize station data for
//! development runs.

pub mod batch;
pub mod config;
pub mod datagen;
pub mod orchestrator;

pub use self::config::Settings;
pub use datagen::DataGenerator;
pub use orchestrator::{FleetGateway, GatewayError};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
