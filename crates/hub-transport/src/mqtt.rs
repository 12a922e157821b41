//! MQTT transport backed by rumqttc

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provisioning::Credential;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{OutboundMessage, Session, SessionStatus, Transport, TransportError};

/// Transport that opens one MQTT connection per device.
///
/// Client ID is the device ID; the username carries the assigned host so
/// the endpoint can route the authentication to the right hub.
pub struct MqttTransport {
    port: u16,
    open_timeout: Duration,
}

impl MqttTransport {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            open_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new(8883)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn open(&self, credential: &str) -> Result<Box<dyn Session>, TransportError> {
        let cred: Credential = credential
            .parse()
            .map_err(|e: provisioning::CredentialParseError| {
                TransportError::BadCredential(e.to_string())
            })?;

        let mut options = MqttOptions::new(&cred.device_id, &cred.host, self.port);
        options.set_credentials(format!("{}/{}", cred.host, cred.device_id), &cred.key);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        // hold the session back until the broker acknowledges the connect
        let connack = tokio::time::timeout(self.open_timeout, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(ack.code),
                    Ok(_) => {}
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match connack {
            Err(_) => {
                return Err(TransportError::Transient(format!(
                    "no CONNACK within {:?}",
                    self.open_timeout
                )))
            }
            Ok(Err(ConnectionError::ConnectionRefused(code))) => return Err(classify(code)),
            Ok(Err(e)) => return Err(TransportError::Transient(e.to_string())),
            Ok(Ok(code)) if code != ConnectReturnCode::Success => return Err(classify(code)),
            Ok(Ok(_)) => {}
        }

        debug!(device_id = %cred.device_id, host = %cred.host, "MQTT session established");

        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let device_id = cred.device_id.clone();
        let pump = tokio::spawn(pump_events(eventloop, device_id.clone(), status_tx));

        Ok(Box::new(MqttSession {
            client,
            device_id,
            status_rx,
            pump,
        }))
    }
}

/// Map a CONNACK refusal onto the transport error taxonomy
fn classify(code: ConnectReturnCode) -> TransportError {
    match code {
        ConnectReturnCode::NotAuthorized | ConnectReturnCode::BadUserNamePassword => {
            TransportError::Unauthorized(format!("{code:?}"))
        }
        other => TransportError::Transient(format!("connection refused: {other:?}")),
    }
}

/// Device-to-cloud topic with the out-of-band metadata property bag
fn event_topic(device_id: &str, content_type: &str, captured_at: DateTime<Utc>) -> String {
    format!(
        "devices/{}/messages/events/ct={}&ctime={}",
        device_id,
        content_type.replace('/', "%2F"),
        captured_at.timestamp_millis()
    )
}

/// Drive the event loop and forward connectivity changes.
///
/// Stops on the first connection error: the owning device decides whether
/// to reconnect, so the event loop must not race it with its own retries.
async fn pump_events(
    mut eventloop: EventLoop,
    device_id: String,
    status_tx: mpsc::UnboundedSender<SessionStatus>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                let _ = status_tx.send(SessionStatus::Connected);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "MQTT session lost");
                let _ = status_tx.send(SessionStatus::Disconnected);
                break;
            }
        }
    }
}

struct MqttSession {
    client: AsyncClient,
    device_id: String,
    status_rx: mpsc::UnboundedReceiver<SessionStatus>,
    pump: JoinHandle<()>,
}

#[async_trait]
impl Session for MqttSession {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        let topic = event_topic(&self.device_id, &message.content_type, message.captured_at);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, message.payload)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn try_status(&mut self) -> Option<SessionStatus> {
        self.status_rx.try_recv().ok()
    }

    async fn close(&mut self) {
        // the disconnect is best-effort; the pump may already be gone
        let _ = self.client.disconnect().await;
        self.pump.abort();
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn topic_carries_metadata_out_of_band() {
        let captured = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let topic = event_topic("Station-4", "application/json", captured);
        assert_eq!(
            topic,
            format!(
                "devices/Station-4/messages/events/ct=application%2Fjson&ctime={}",
                captured.timestamp_millis()
            )
        );
    }

    #[test]
    fn auth_refusals_map_to_unauthorized() {
        assert!(matches!(
            classify(ConnectReturnCode::NotAuthorized),
            TransportError::Unauthorized(_)
        ));
        assert!(matches!(
            classify(ConnectReturnCode::BadUserNamePassword),
            TransportError::Unauthorized(_)
        ));
        assert!(matches!(
            classify(ConnectReturnCode::ServiceUnavailable),
            TransportError::Transient(_)
        ));
    }
}
