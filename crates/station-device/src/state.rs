//! Connectivity state machine

/// Connectivity state of a device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No credential; provisioning is required before anything else
    #[default]
    Unprovisioned,
    /// Provisioning exchange in flight
    Provisioning,
    /// Credential held but no live session
    Disconnected,
    /// Session open in flight
    Connecting,
    /// Live session held and healthy
    Connected,
}

/// Triggers that move a link between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ProvisionStarted,
    ProvisionSucceeded,
    ProvisionFailed,
    ConnectStarted,
    /// Session reported healthy
    SessionUp,
    ConnectFailed,
    /// Session dropped unexpectedly
    SessionLost,
    /// Endpoint disabled the device; no recovery
    SessionDisabled,
    /// Credential revoked or device moved; re-provisioning required
    CredentialRejected,
}

impl LinkState {
    /// Apply a trigger. Stale triggers that make no sense in the current
    /// state leave it unchanged.
    pub fn apply(self, event: LinkEvent) -> LinkState {
        use LinkEvent::*;
        use LinkState::*;
        match (self, event) {
            (_, ProvisionStarted) => Provisioning,
            (Provisioning, ProvisionSucceeded) => Disconnected,
            (Provisioning, ProvisionFailed) => Unprovisioned,
            (_, ConnectStarted) => Connecting,
            (_, SessionUp) => Connected,
            (Connecting, ConnectFailed) => Disconnected,
            (_, CredentialRejected) => Unprovisioned,
            (_, SessionDisabled) => Disconnected,
            (Connected | Connecting, SessionLost) => Disconnected,
            (state, _) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LinkEvent::*;
    use super::LinkState::*;

    #[test]
    fn provisioning_path() {
        assert_eq!(Unprovisioned.apply(ProvisionStarted), Provisioning);
        assert_eq!(Provisioning.apply(ProvisionSucceeded), Disconnected);
        assert_eq!(Provisioning.apply(ProvisionFailed), Unprovisioned);
    }

    #[test]
    fn connect_path() {
        assert_eq!(Disconnected.apply(ConnectStarted), Connecting);
        assert_eq!(Connecting.apply(SessionUp), Connected);
        assert_eq!(Connecting.apply(ConnectFailed), Disconnected);
    }

    #[test]
    fn credential_rejection_requires_reprovisioning() {
        assert_eq!(Connecting.apply(CredentialRejected), Unprovisioned);
        assert_eq!(Connected.apply(CredentialRejected), Unprovisioned);
    }

    #[test]
    fn lost_and_disabled_sessions_disconnect() {
        assert_eq!(Connected.apply(SessionLost), Disconnected);
        assert_eq!(Connected.apply(SessionDisabled), Disconnected);
    }

    #[test]
    fn stale_triggers_are_ignored() {
        // a session-lost report for a link that is already down
        assert_eq!(Disconnected.apply(SessionLost), Disconnected);
        assert_eq!(Unprovisioned.apply(ConnectFailed), Unprovisioned);
        assert_eq!(Connected.apply(ProvisionSucceeded), Connected);
    }
}
