//! Fleet orchestrator
//!
//! Owns the device registry and drives it through fixed-order polling
//! cycles: provision the unprovisioned, reconnect the disconnected,
//! then dispatch whatever telemetry the store deems eligible. All
//! registry mutation happens on this task; devices talk back through
//! an event channel that is drained once per cycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_store::{CredentialUpdate, FleetStore, StoreError, UploadMark};
use hub_transport::Transport;
use provisioning::Provisioner;
use station_device::{DeviceEvent, SendOutcome, StationDevice};
use telemetry_model::{Station, WeatherTelemetry};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::{run_batched, BatchPolicy};
use crate::config::GatewaySettings;

/// Errors that end a polling cycle early. The failed cycle's work is
/// retried wholesale on the next one.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

type SharedDevice = Arc<Mutex<StationDevice>>;

/// The fleet orchestrator. One per process; consumed by [`run`].
///
/// [`run`]: FleetGateway::run
pub struct FleetGateway {
    store: Arc<dyn FleetStore>,
    provisioner: Arc<dyn Provisioner>,
    transport: Arc<dyn Transport>,
    enrollment_key: String,
    settings: GatewaySettings,
    devices: HashMap<String, SharedDevice>,
    events_tx: mpsc::UnboundedSender<DeviceEvent>,
    events_rx: mpsc::UnboundedReceiver<DeviceEvent>,
    /// Credential write-backs not yet persisted. Survives failed store
    /// writes; cleared only after one succeeds.
    pending_credentials: Vec<CredentialUpdate>,
}

impl FleetGateway {
    pub fn new(
        store: Arc<dyn FleetStore>,
        provisioner: Arc<dyn Provisioner>,
        transport: Arc<dyn Transport>,
        enrollment_key: impl Into<String>,
        settings: GatewaySettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            provisioner,
            transport,
            enrollment_key: enrollment_key.into(),
            settings,
            devices: HashMap::new(),
            events_tx,
            events_rx,
            pending_credentials: Vec::new(),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, station_id: &str) -> Option<SharedDevice> {
        self.devices.get(station_id).cloned()
    }

    /// Populate the registry from the station table. Devices for
    /// stations that appear later are created lazily by the send sweep.
    pub async fn load_devices(&mut self) -> Result<(), GatewayError> {
        let stations = self.store.list_stations().await?;
        for station in stations {
            self.insert_device(station);
        }
        info!(devices = self.devices.len(), "device registry loaded");
        Ok(())
    }

    /// Run polling cycles until cancelled, then close every session.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), GatewayError> {
        self.load_devices().await?;
        let refresh = std::time::Duration::from_secs(self.settings.refresh_interval_secs);

        while !cancel.is_cancelled() {
            if let Err(e) = self.run_cycle(&cancel).await {
                error!(error = %e, "polling cycle failed, retrying next cycle");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(refresh) => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// One polling cycle. Sweep order is fixed: provision, connect,
    /// dispatch. Store failures end the cycle early.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        let updates = self.provision_sweep(cancel).await;
        self.pending_credentials.extend(updates);
        self.connect_sweep(cancel).await;
        let drained = self.drain_events();
        self.pending_credentials.extend(drained);
        self.flush_credentials().await?;

        let telemetry = self.store.eligible_telemetry().await?;
        if telemetry.is_empty() {
            debug!("no eligible telemetry this cycle");
            return Ok(());
        }
        info!(records = telemetry.len(), "dispatching eligible telemetry");

        let marks = self.send_sweep(telemetry, cancel).await;

        // sends themselves never re-provision, but persist anything a
        // late status drain produced before marking uploads
        let late = self.drain_events();
        self.pending_credentials.extend(late);
        self.flush_credentials().await?;
        if !marks.is_empty() {
            let marks: Vec<UploadMark<'_>> = marks
                .iter()
                .map(|(station_id, uploaded_at)| UploadMark {
                    station_id,
                    uploaded_at: *uploaded_at,
                })
                .collect();
            self.store.update_last_upload(&marks).await?;
        }

        Ok(())
    }

    /// Provision every device without a cached credential, throttled by
    /// the connection limit. Returns the credential write-backs, empty
    /// credentials included so a failed exchange wipes the stale one.
    async fn provision_sweep(&mut self, cancel: &CancellationToken) -> Vec<CredentialUpdate> {
        let targets: Vec<SharedDevice> = {
            let mut unprovisioned = Vec::new();
            for device in self.devices.values() {
                let guard = device.lock().await;
                if !guard.station().is_provisioned() {
                    unprovisioned.push(device.clone());
                }
            }
            unprovisioned
        };
        if targets.is_empty() {
            return Vec::new();
        }
        debug!(devices = targets.len(), "provision sweep");

        let policy = BatchPolicy::provision(self.settings.concurrent_connection_limit);
        let outcomes = run_batched(targets, &policy, cancel, |device| async move {
            device.lock().await.provision().await
        })
        .await;

        let provisioned = outcomes.iter().filter(|o| o.success).count();
        info!(provisioned, total = outcomes.len(), "provision sweep complete");

        outcomes
            .into_iter()
            .map(|outcome| CredentialUpdate {
                station_id: outcome.station_id,
                credential: outcome.credential,
            })
            .collect()
    }

    /// Persist queued credential write-backs. On failure the queue is
    /// kept intact so the next cycle retries the same updates; the store
    /// applies them in order, so a later update for the same station
    /// still wins.
    async fn flush_credentials(&mut self) -> Result<(), GatewayError> {
        if self.pending_credentials.is_empty() {
            return Ok(());
        }
        self.store
            .update_credentials(&self.pending_credentials)
            .await?;
        self.pending_credentials.clear();
        Ok(())
    }

    /// Drain status changes on provisioned devices, then reconnect the
    /// ones that are not connected, throttled by the connection limit.
    /// Unprovisioned devices are skipped; the provision sweep just
    /// handled them, and connecting without a credential cannot succeed.
    async fn connect_sweep(&mut self, cancel: &CancellationToken) {
        let targets: Vec<SharedDevice> = {
            let mut provisioned = Vec::new();
            for device in self.devices.values() {
                if device.lock().await.station().is_provisioned() {
                    provisioned.push(device.clone());
                }
            }
            provisioned
        };
        if targets.is_empty() {
            return;
        }

        let policy = BatchPolicy::connect(self.settings.concurrent_connection_limit);
        let results = run_batched(targets, &policy, cancel, |device| async move {
            let mut guard = device.lock().await;
            guard.poll_status().await;
            if guard.is_connected() {
                true
            } else {
                guard.connect().await
            }
        })
        .await;

        let connected = results.iter().filter(|ok| **ok).count();
        debug!(connected, total = results.len(), "connect sweep complete");
    }

    /// Send each eligible record from its station's device, throttled
    /// by the message limit. Unknown stations get a device on the spot;
    /// it is unprovisioned, so its sends fail until the next cycle's
    /// provision sweep picks it up. Returns the newest successfully
    /// sent timestamp per station.
    async fn send_sweep(
        &mut self,
        telemetry: Vec<WeatherTelemetry>,
        cancel: &CancellationToken,
    ) -> HashMap<String, DateTime<Utc>> {
        let mut work: Vec<(SharedDevice, WeatherTelemetry)> = Vec::with_capacity(telemetry.len());
        for record in telemetry {
            let device = match self.devices.get(&record.station_id) {
                Some(device) => device.clone(),
                None => {
                    debug!(station_id = %record.station_id, "creating device for new station");
                    self.insert_device(Station::new(record.station_id.clone(), ""))
                }
            };
            work.push((device, record));
        }

        let policy = BatchPolicy::send(self.settings.concurrent_message_limit);
        let outcomes: Vec<SendOutcome> =
            run_batched(work, &policy, cancel, |(device, record)| async move {
                device.lock().await.send(&record).await
            })
            .await;

        let mut marks: HashMap<String, DateTime<Utc>> = HashMap::new();
        let mut sent = 0usize;
        for outcome in outcomes {
            if !outcome.success {
                continue;
            }
            sent += 1;
            let mark = marks.entry(outcome.station_id).or_insert(outcome.captured_at);
            if outcome.captured_at > *mark {
                *mark = outcome.captured_at;
            }
        }
        info!(sent, stations = marks.len(), "send sweep complete");
        marks
    }

    /// Turn queued device events into credential write-backs.
    fn drain_events(&mut self) -> Vec<CredentialUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                DeviceEvent::CredentialChanged {
                    station_id,
                    credential,
                } => {
                    debug!(station_id, "device reconnected under a fresh credential");
                    updates.push(CredentialUpdate {
                        station_id,
                        credential,
                    });
                }
                DeviceEvent::ReprovisionNeeded { station_id } => {
                    warn!(station_id, "credential rejected, wiping the cached one");
                    updates.push(CredentialUpdate {
                        station_id,
                        credential: String::new(),
                    });
                }
            }
        }
        updates
    }

    fn insert_device(&mut self, station: Station) -> SharedDevice {
        let station_id = station.station_id.clone();
        let device = Arc::new(Mutex::new(StationDevice::new(
            station,
            self.enrollment_key.clone(),
            self.provisioner.clone(),
            self.transport.clone(),
            self.events_tx.clone(),
        )));
        self.devices.insert(station_id, device.clone());
        device
    }

    async fn shutdown(&mut self) {
        info!(devices = self.devices.len(), "closing device sessions");
        for device in self.devices.values() {
            device.lock().await.shutdown().await;
        }
    }
}
