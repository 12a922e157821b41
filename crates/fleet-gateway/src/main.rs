//! Fleet Gateway - Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use fleet_gateway::{init_logging, DataGenerator, FleetGateway, Settings};
use fleet_store::{FleetStore, SqliteStore};
use hub_transport::MqttTransport;
use provisioning::RestProvisioner;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Road-Weather Fleet Gateway v{} ===", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load().context("failed to load settings")?;

    // the station database is the one dependency we cannot run without
    let store = SqliteStore::connect(&settings.database.url)
        .await
        .context("failed to open the station database")?;
    let store: Arc<dyn FleetStore> = Arc::new(store);

    let cancel = CancellationToken::new();
    let mut pumps = Vec::new();

    if settings.generator.enabled {
        let generator = DataGenerator::new(store.clone(), settings.generator.clone());
        let token = cancel.child_token();
        pumps.push(tokio::spawn(async move {
            if let Err(e) = generator.run(token).await {
                error!(error = %e, "data generator stopped with an error");
            }
        }));
    }

    if settings.gateway.enabled {
        let provisioner = Arc::new(RestProvisioner::new(
            settings.hub.endpoint.clone(),
            settings.hub.model_id.clone(),
        ));
        let transport = Arc::new(MqttTransport::new(settings.hub.mqtt_port));
        let gateway = FleetGateway::new(
            store.clone(),
            provisioner,
            transport,
            settings.hub.enrollment_key.clone(),
            settings.gateway.clone(),
        );
        let token = cancel.child_token();
        pumps.push(tokio::spawn(async move {
            if let Err(e) = gateway.run(token).await {
                error!(error = %e, "gateway stopped with an error");
            }
        }));
    }

    if pumps.is_empty() {
        info!("generator and gateway both disabled, nothing to do");
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    cancel.cancel();

    for pump in pumps {
        let _ = pump.await;
    }
    info!("stopped");

    Ok(())
}
