//! Station Device Connections
//!
//! One `StationDevice` per station owns that station's credential, its
//! live transport session and its connectivity state, and exposes the
//! provision / connect / send operations the fleet orchestrator drives.
//! Recovery from unexpected disconnects runs the reconnection cascade:
//! reconnect with the same credential, re-provision if that fails, and
//! reconnect with the fresh credential.
//!
//! Devices never raise errors across the orchestration boundary; every
//! operation reports through an outcome value, and notifications the
//! orchestrator must act on (credential changed, re-provisioning needed)
//! go over an event channel it drains once per polling cycle.

mod device;
mod outcome;
mod state;

pub use device::{RetryPolicy, StationDevice};
pub use outcome::{DeviceEvent, ProvisioningOutcome, SendOutcome};
pub use state::{LinkEvent, LinkState};
