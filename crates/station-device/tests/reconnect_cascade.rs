//! Connection retry and recovery behavior against scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hub_transport::{OutboundMessage, Session, SessionStatus, Transport, TransportError};
use provisioning::{ProvisionError, Provisioner, Registration};
use station_device::{DeviceEvent, RetryPolicy, StationDevice};
use telemetry_model::Station;
use tokio::sync::mpsc;

#[derive(Clone, Copy)]
enum OpenScript {
    Healthy,
    Auth,
    Transient,
}

type StatusFeed = Arc<Mutex<VecDeque<SessionStatus>>>;

struct ScriptedSession {
    statuses: StatusFeed,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn send(&mut self, _message: OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }

    fn try_status(&mut self) -> Option<SessionStatus> {
        self.statuses.lock().unwrap().pop_front()
    }

    async fn close(&mut self) {}
}

/// Transport that answers `open` from a script and hands the test a
/// status feed per healthy session so disconnects can be injected.
struct ScriptedTransport {
    script: Mutex<VecDeque<OpenScript>>,
    opens: AtomicUsize,
    status_feeds: Mutex<Vec<StatusFeed>>,
}

impl ScriptedTransport {
    fn new(script: Vec<OpenScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            opens: AtomicUsize::new(0),
            status_feeds: Mutex::new(Vec::new()),
        })
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn feed(&self, index: usize) -> StatusFeed {
        self.status_feeds.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, _credential: &str) -> Result<Box<dyn Session>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OpenScript::Transient);
        match step {
            OpenScript::Healthy => {
                let statuses: StatusFeed = Arc::new(Mutex::new(VecDeque::new()));
                self.status_feeds.lock().unwrap().push(statuses.clone());
                Ok(Box::new(ScriptedSession { statuses }))
            }
            OpenScript::Auth => Err(TransportError::Unauthorized("device revoked".into())),
            OpenScript::Transient => Err(TransportError::Transient("connection reset".into())),
        }
    }
}

struct ScriptedProvisioner {
    results: Mutex<VecDeque<Result<Registration, ProvisionError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvisioner {
    fn new(results: Vec<Result<Registration, ProvisionError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn assigning(host: &str) -> Arc<Self> {
        Self::new(vec![Ok(Registration {
            assigned_host: host.to_string(),
        })])
    }
}

#[async_trait]
impl Provisioner for ScriptedProvisioner {
    async fn provision(
        &self,
        _station_id: &str,
        _device_key: &str,
    ) -> Result<Registration, ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProvisionError::Rejected("unassigned".into())))
    }
}

fn device_with(
    credential: &str,
    provisioner: Arc<ScriptedProvisioner>,
    transport: Arc<ScriptedTransport>,
) -> (StationDevice, mpsc::UnboundedReceiver<DeviceEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut station = Station::new("Station-1", "Weather Station 1");
    station.credential = credential.to_string();
    let device = StationDevice::new(station, "", provisioner, transport, tx);
    (device, rx)
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_linearly_increasing_delay() {
    let transport = ScriptedTransport::new(vec![
        OpenScript::Transient,
        OpenScript::Transient,
        OpenScript::Transient,
    ]);
    let (device, _rx) = device_with(
        "host=h;device=Station-1;key=k",
        ScriptedProvisioner::assigning("unused"),
        transport.clone(),
    );
    let mut device = device.with_retry(RetryPolicy {
        max_attempts: 3,
        delay_unit: Duration::from_secs(2),
    });

    let start = tokio::time::Instant::now();
    assert!(!device.connect().await);

    // 2s after attempt 1, 4s after attempt 2, no sleep after the last
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert_eq!(transport.opens(), 3);
}

#[tokio::test]
async fn default_retry_bound_is_two_attempts() {
    let transport = ScriptedTransport::new(vec![OpenScript::Transient; 4]);
    let (mut device, _rx) = device_with(
        "host=h;device=Station-1;key=k",
        ScriptedProvisioner::assigning("unused"),
        transport.clone(),
    );

    assert!(!device.connect().await);
    assert_eq!(transport.opens(), 2);
}

#[tokio::test]
async fn authorization_error_aborts_retries_and_signals_once() {
    let transport = ScriptedTransport::new(vec![OpenScript::Auth, OpenScript::Healthy]);
    let (mut device, mut rx) = device_with(
        "host=h;device=Station-1;key=stale",
        ScriptedProvisioner::assigning("unused"),
        transport.clone(),
    );

    assert!(!device.connect().await);

    // no second attempt, credential wiped, exactly one signal
    assert_eq!(transport.opens(), 1);
    assert!(device.station().credential.is_empty());
    assert_eq!(
        rx.try_recv().unwrap(),
        DeviceEvent::ReprovisionNeeded {
            station_id: "Station-1".to_string()
        }
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn lost_session_cascades_to_reprovision_and_surfaces_the_new_credential() {
    // initial connect succeeds; both cascade reconnect attempts with the
    // old credential fail; the post-provision connect succeeds
    let transport = ScriptedTransport::new(vec![
        OpenScript::Healthy,
        OpenScript::Transient,
        OpenScript::Transient,
        OpenScript::Healthy,
    ]);
    let provisioner = ScriptedProvisioner::assigning("hub-2.example.net");
    let (mut device, mut rx) = device_with(
        "host=hub-1.example.net;device=Station-1;key=k",
        provisioner.clone(),
        transport.clone(),
    );

    assert!(device.connect().await);
    transport
        .feed(0)
        .lock()
        .unwrap()
        .push_back(SessionStatus::Disconnected);

    device.poll_status().await;

    assert!(device.is_connected());
    assert_eq!(provisioner.calls.load(Ordering::SeqCst), 1);
    assert!(device
        .station()
        .credential
        .starts_with("host=hub-2.example.net;"));
    assert_eq!(
        rx.try_recv().unwrap(),
        DeviceEvent::CredentialChanged {
            station_id: "Station-1".to_string(),
            credential: device.station().credential.clone(),
        }
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn failed_reprovisioning_leaves_the_device_disconnected() {
    let transport = ScriptedTransport::new(vec![
        OpenScript::Healthy,
        OpenScript::Transient,
        OpenScript::Transient,
    ]);
    let provisioner = ScriptedProvisioner::new(vec![Err(ProvisionError::Rejected(
        "failed".into(),
    ))]);
    let (mut device, mut rx) = device_with(
        "host=hub-1.example.net;device=Station-1;key=k",
        provisioner,
        transport.clone(),
    );

    assert!(device.connect().await);
    transport
        .feed(0)
        .lock()
        .unwrap()
        .push_back(SessionStatus::Disconnected);

    device.poll_status().await;

    assert!(!device.is_connected());
    assert!(device.station().credential.is_empty());
    assert!(rx.try_recv().is_err());
}
