//! Transport Sessions
//!
//! A transport opens a persistent session to the ingestion endpoint from
//! a connection credential, accepts discrete message sends, and surfaces
//! asynchronous connectivity-status changes through a polled channel.

mod mqtt;

pub use mqtt::MqttTransport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Connectivity status reported by a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Session is healthy
    Connected,
    /// Session dropped unexpectedly; the owner decides on recovery
    Disconnected,
    /// Endpoint disabled the device; no recovery should be attempted
    Disabled,
}

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Credential revoked or device moved; re-provisioning is required
    #[error("endpoint rejected the credential: {0}")]
    Unauthorized(String),

    /// Anything retryable: network, timeout, endpoint churn
    #[error("transient connection failure: {0}")]
    Transient(String),

    /// A send on an established session failed
    #[error("message send failed: {0}")]
    Send(String),

    /// The cached credential string could not be parsed
    #[error("malformed credential: {0}")]
    BadCredential(String),
}

/// One telemetry message bound for the endpoint.
///
/// `captured_at` becomes the message creation time, not the send time,
/// so downstream consumers see when the reading was taken.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    pub content_type: String,
    pub captured_at: DateTime<Utc>,
}

/// A live session to the ingestion endpoint.
#[async_trait]
pub trait Session: Send {
    /// Send one message over the session
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Drain the next queued status change, if any (non-blocking)
    fn try_status(&mut self) -> Option<SessionStatus>;

    /// Tear the session down; safe to call on a dead session
    async fn close(&mut self);
}

/// Opens sessions from credentials.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session and wait until it reports healthy.
    ///
    /// Returns `TransportError::Unauthorized` when the endpoint rejects
    /// the credential, so the caller can trigger re-provisioning instead
    /// of retrying.
    async fn open(&self, credential: &str) -> Result<Box<dyn Session>, TransportError>;
}
