//! Per-peer GATT session state machine.
//!
//! One session exists per connected peer and drives a single token
//! transfer: discover the contact service, discover its characteristic,
//! issue exactly one read or write, then drop the link. The session tracks
//! progress and returns [`SessionAction`]s for the scheduler to apply; it
//! performs no I/O itself, which keeps every transition testable without a
//! radio.
//!
//! Duplicate and late callbacks are absorbed: a completion for an unknown
//! characteristic, a re-delivered discovery result, or any event in the
//! wrong state is a no-op.

use std::collections::HashSet;

use tcn_core::constants::TCN_LENGTH;
use tcn_core::types::TemporaryContactNumber;

use crate::peer::TransferRole;
use crate::transport::{CharacteristicHandle, PeerId, ServiceHandle};

/// Session progression. `Cancelled` is terminal and reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ServicesDiscovering,
    CharacteristicsDiscovering,
    Transferring,
    Done,
    Cancelled,
}

/// Instruction emitted by the session for the scheduler to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Request characteristic discovery on a service.
    DiscoverCharacteristics { service: ServiceHandle },
    /// Issue a read on the contact characteristic.
    Read { characteristic: CharacteristicHandle },
    /// Generate a token and write it to the contact characteristic.
    Write { characteristic: CharacteristicHandle },
    /// A token arrived from a read; report it upward.
    TokenObserved { token: TemporaryContactNumber },
    /// The queued transfer finished; clear the role and drop the link.
    TransferComplete,
    /// Unusable peer or failed GATT step; flush the connection.
    Cancel,
}

/// State machine for one connected peer.
pub struct GattSession {
    peer: PeerId,
    state: SessionState,
    /// Services discovered on the peer, kept for invalidation matching.
    services: Vec<ServiceHandle>,
    /// Services still awaiting characteristic discovery results.
    pending_services: HashSet<ServiceHandle>,
    /// Discovered contact-service characteristics.
    characteristics: Vec<CharacteristicHandle>,
    reads_outstanding: HashSet<CharacteristicHandle>,
    writes_outstanding: HashSet<CharacteristicHandle>,
}

impl GattSession {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            state: SessionState::ServicesDiscovering,
            services: Vec::new(),
            pending_services: HashSet::new(),
            characteristics: Vec::new(),
            reads_outstanding: HashSet::new(),
            writes_outstanding: HashSet::new(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether an invalidation of `service` affects this session.
    pub fn has_service(&self, service: ServiceHandle) -> bool {
        self.services.contains(&service)
    }

    fn cancel(&mut self) -> Vec<SessionAction> {
        self.state = SessionState::Cancelled;
        vec![SessionAction::Cancel]
    }

    /// Service discovery finished (or failed).
    pub fn on_services_discovered(
        &mut self,
        services: &[ServiceHandle],
        error: Option<&str>,
    ) -> Vec<SessionAction> {
        if self.state != SessionState::ServicesDiscovering {
            return Vec::new();
        }
        if let Some(reason) = error {
            tracing::warn!(peer = self.peer.0, reason, "service discovery failed");
            return self.cancel();
        }
        if services.is_empty() {
            // The peer offers no usable service.
            tracing::debug!(peer = self.peer.0, "no services discovered");
            return self.cancel();
        }
        self.state = SessionState::CharacteristicsDiscovering;
        self.services = services.to_vec();
        self.pending_services = services.iter().copied().collect();
        services
            .iter()
            .map(|&service| SessionAction::DiscoverCharacteristics { service })
            .collect()
    }

    /// Characteristic discovery finished for one service.
    ///
    /// The transfer starts only once every service has reported, whether it
    /// yielded a characteristic or none.
    pub fn on_characteristics_discovered(
        &mut self,
        service: ServiceHandle,
        characteristics: &[CharacteristicHandle],
        error: Option<&str>,
        role: TransferRole,
    ) -> Vec<SessionAction> {
        if self.state != SessionState::CharacteristicsDiscovering {
            return Vec::new();
        }
        if let Some(reason) = error {
            tracing::warn!(peer = self.peer.0, reason, "characteristic discovery failed");
            return self.cancel();
        }
        if !self.pending_services.remove(&service) {
            return Vec::new();
        }
        self.characteristics.extend_from_slice(characteristics);
        if !self.pending_services.is_empty() {
            return Vec::new();
        }
        if self.characteristics.is_empty() {
            tracing::debug!(peer = self.peer.0, "no contact characteristic found");
            return self.cancel();
        }
        self.state = SessionState::Transferring;
        self.start_transfers(role)
    }

    fn start_transfers(&mut self, role: TransferRole) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        match role {
            TransferRole::ReadToken => {
                for &characteristic in &self.characteristics {
                    if self.reads_outstanding.insert(characteristic) {
                        actions.push(SessionAction::Read { characteristic });
                    }
                }
            }
            TransferRole::WriteToken => {
                for &characteristic in &self.characteristics {
                    if self.writes_outstanding.insert(characteristic) {
                        actions.push(SessionAction::Write { characteristic });
                    }
                }
            }
            TransferRole::None => {
                // Nothing queued for this peer; the link is of no use.
                return self.cancel();
            }
        }
        actions
    }

    /// A read completed.
    pub fn on_value_read(
        &mut self,
        characteristic: CharacteristicHandle,
        value: &[u8],
        error: Option<&str>,
    ) -> Vec<SessionAction> {
        if self.state != SessionState::Transferring {
            return Vec::new();
        }
        if !self.reads_outstanding.remove(&characteristic) {
            return Vec::new();
        }
        if let Some(reason) = error {
            tracing::warn!(peer = self.peer.0, reason, "read failed");
            return self.cancel();
        }
        if value.len() < TCN_LENGTH {
            tracing::warn!(peer = self.peer.0, len = value.len(), "short read value");
            return self.cancel();
        }
        let mut bytes = [0u8; TCN_LENGTH];
        bytes.copy_from_slice(&value[..TCN_LENGTH]);
        let mut actions = vec![SessionAction::TokenObserved {
            token: TemporaryContactNumber::new(bytes),
        }];
        if self.reads_outstanding.is_empty() {
            self.state = SessionState::Done;
            actions.push(SessionAction::TransferComplete);
        }
        actions
    }

    /// A write completed.
    pub fn on_value_written(
        &mut self,
        characteristic: CharacteristicHandle,
        error: Option<&str>,
    ) -> Vec<SessionAction> {
        if self.state != SessionState::Transferring {
            return Vec::new();
        }
        if !self.writes_outstanding.remove(&characteristic) {
            return Vec::new();
        }
        if let Some(reason) = error {
            tracing::warn!(peer = self.peer.0, reason, "write failed");
            return self.cancel();
        }
        if self.writes_outstanding.is_empty() {
            self.state = SessionState::Done;
            return vec![SessionAction::TransferComplete];
        }
        Vec::new()
    }
}
