//! Station device implementation

use std::sync::Arc;
use std::time::Duration;

use hub_transport::{OutboundMessage, Session, SessionStatus, Transport, TransportError};
use provisioning::{derive_device_key, Credential, Provisioner};
use telemetry_model::{Station, WeatherTelemetry, TELEMETRY_CONTENT_TYPE};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::outcome::{DeviceEvent, ProvisioningOutcome, SendOutcome};
use crate::state::{LinkEvent, LinkState};

/// Connect retry bounds: `max_attempts` total attempts with a delay of
/// `delay_unit * attempt_number` between consecutive attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_unit: Duration::from_secs(2),
        }
    }
}

/// One virtual device, bound to one station.
///
/// Owned by the fleet orchestrator's registry; all operations run from
/// the orchestrator's batches, so no two operations for the same device
/// ever overlap. The `connecting` guard additionally makes sends during
/// a reconnection cascade fail fast.
pub struct StationDevice {
    station: Station,
    enrollment_key: String,
    state: LinkState,
    connecting: bool,
    session: Option<Box<dyn Session>>,
    provisioner: Arc<dyn Provisioner>,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<DeviceEvent>,
    retry: RetryPolicy,
}

impl StationDevice {
    pub fn new(
        station: Station,
        enrollment_key: impl Into<String>,
        provisioner: Arc<dyn Provisioner>,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        let state = if station.is_provisioned() {
            LinkState::Disconnected
        } else {
            LinkState::Unprovisioned
        };
        Self {
            station,
            enrollment_key: enrollment_key.into(),
            state,
            connecting: false,
            session: None,
            provisioner,
            transport,
            events,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Derive the per-device key and exchange it for a credential bound
    /// to the assigned host. Never raises; all failures come back in the
    /// outcome with an empty credential. The caller persists the result.
    pub async fn provision(&mut self) -> ProvisioningOutcome {
        let station_id = self.station.station_id.clone();
        debug!(station_id, "provisioning device");
        self.state = self.state.apply(LinkEvent::ProvisionStarted);

        let device_key = match derive_device_key(&self.enrollment_key, &station_id) {
            Ok(key) => key,
            Err(e) => {
                error!(station_id, error = %e, "device key derivation failed");
                self.state = self.state.apply(LinkEvent::ProvisionFailed);
                return ProvisioningOutcome::failed(station_id);
            }
        };

        match self.provisioner.provision(&station_id, &device_key).await {
            Ok(registration) => {
                let credential =
                    Credential::new(registration.assigned_host, &station_id, device_key)
                        .to_string();
                self.station.credential = credential.clone();
                self.state = self.state.apply(LinkEvent::ProvisionSucceeded);
                debug!(station_id, "device provisioned");
                ProvisioningOutcome::assigned(station_id, credential)
            }
            Err(e) => {
                error!(station_id, error = %e, "provisioning failed");
                self.station.credential.clear();
                self.state = self.state.apply(LinkEvent::ProvisionFailed);
                ProvisioningOutcome::failed(station_id)
            }
        }
    }

    /// Open a transport session with the cached credential.
    ///
    /// Fails fast without a credential. An authorization rejection wipes
    /// the credential, emits `ReprovisionNeeded` and aborts without
    /// retrying; transient failures retry up to the policy bound with a
    /// linearly increasing delay. Returns true only once the session
    /// reports healthy.
    pub async fn connect(&mut self) -> bool {
        let station_id = self.station.station_id.clone();
        if self.station.credential.is_empty() {
            error!(station_id, "device is not provisioned, connection failed");
            return false;
        }

        self.connecting = true;
        self.state = self.state.apply(LinkEvent::ConnectStarted);

        for attempt in 1..=self.retry.max_attempts {
            match self.transport.open(&self.station.credential).await {
                Ok(session) => {
                    self.session = Some(session);
                    self.state = self.state.apply(LinkEvent::SessionUp);
                    self.connecting = false;
                    if attempt > 1 {
                        debug!(station_id, attempt, "connected after retry");
                    }
                    return true;
                }
                Err(TransportError::Unauthorized(reason)) => {
                    error!(
                        station_id,
                        reason,
                        "credential rejected; device will be re-provisioned"
                    );
                    self.station.credential.clear();
                    self.session = None;
                    self.state = self.state.apply(LinkEvent::CredentialRejected);
                    let _ = self.events.send(DeviceEvent::ReprovisionNeeded {
                        station_id: station_id.clone(),
                    });
                    self.connecting = false;
                    return false;
                }
                Err(e) => {
                    warn!(station_id, attempt, error = %e, "connect attempt failed");
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_unit * attempt).await;
            }
        }

        self.state = self.state.apply(LinkEvent::ConnectFailed);
        self.connecting = false;
        false
    }

    /// Send one telemetry record over the active session.
    ///
    /// Fails fast with no transport call while a reconnect is in flight
    /// or the link is not connected; retry belongs to the next polling
    /// cycle, never to this method.
    pub async fn send(&mut self, record: &WeatherTelemetry) -> SendOutcome {
        let station_id = self.station.station_id.clone();
        let captured_at = record.captured_at;

        if self.connecting || !self.is_connected() {
            debug!(station_id, state = ?self.state, "link not ready, skipping send");
            return SendOutcome::failed(station_id, captured_at);
        }
        let Some(session) = self.session.as_mut() else {
            return SendOutcome::failed(station_id, captured_at);
        };

        let payload = match record.wire_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(station_id, error = %e, "telemetry encoding failed");
                return SendOutcome::failed(station_id, captured_at);
            }
        };

        match session
            .send(OutboundMessage {
                payload,
                content_type: TELEMETRY_CONTENT_TYPE.to_string(),
                captured_at,
            })
            .await
        {
            Ok(()) => SendOutcome::sent(station_id, captured_at),
            Err(e) => {
                error!(station_id, error = %e, "telemetry send failed");
                SendOutcome::failed(station_id, captured_at)
            }
        }
    }

    /// Drain queued connectivity-status changes and react to them.
    ///
    /// Runs on the orchestrator's polling task, so recovery cascades for
    /// one device are always sequential.
    pub async fn poll_status(&mut self) {
        while let Some(status) = self.session.as_mut().and_then(|s| s.try_status()) {
            match status {
                SessionStatus::Connected => {
                    self.state = self.state.apply(LinkEvent::SessionUp);
                }
                SessionStatus::Disabled => {
                    info!(
                        station_id = %self.station.station_id,
                        "device disabled by the endpoint, not recovering"
                    );
                    self.state = self.state.apply(LinkEvent::SessionDisabled);
                }
                SessionStatus::Disconnected => {
                    if !self.connecting {
                        self.recover().await;
                    }
                }
            }
        }
    }

    /// Reconnection cascade: discard the stale session, reconnect with
    /// the existing credential, re-provision on failure, and reconnect
    /// with the fresh credential. A fresh credential that connects is
    /// surfaced as `CredentialChanged` for the orchestrator to persist.
    async fn recover(&mut self) {
        let station_id = self.station.station_id.clone();
        info!(station_id, "session lost, starting reconnection cascade");
        self.state = self.state.apply(LinkEvent::SessionLost);

        if let Some(mut session) = self.session.take() {
            session.close().await;
        }

        if self.connect().await {
            info!(station_id, "reconnected with the existing credential");
            return;
        }

        let outcome = self.provision().await;
        if !outcome.success {
            warn!(
                station_id,
                "re-provisioning failed; device stays disconnected until the next sweep"
            );
            return;
        }

        if self.connect().await {
            info!(station_id, "reconnected with a fresh credential");
            let _ = self.events.send(DeviceEvent::CredentialChanged {
                station_id,
                credential: outcome.credential,
            });
        }
    }

    /// Tear down the session on shutdown, before the registry is dropped.
    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.state = self.state.apply(LinkEvent::SessionLost);
    }
}
