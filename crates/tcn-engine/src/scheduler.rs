//! Connection scheduling and peer admission control.
//!
//! The scheduler owns every piece of per-peer state: the peer records, the
//! FIFO admission queue, the dedup cache, and the GATT sessions. It
//! guarantees that no more than the configured number of links is
//! connecting or connected at once, that each queued peer gets exactly one
//! transfer attempt, and that every failure path frees its admission slot.
//!
//! All methods must be called from one execution context; the engine's
//! event loop provides that serialization.

use std::collections::{HashMap, HashSet, VecDeque};

use tcn_core::constants::{CHARACTERISTIC_UUID, SERVICE_UUID};
use tcn_core::distance::{estimated_distance_meters, measured_rssi_at_one_meter};
use tcn_core::types::TemporaryContactNumber;

use crate::config::EngineConfig;
use crate::dedup::ShortIdCache;
use crate::engine::EngineHooks;
use crate::error::EngineError;
use crate::peer::{classify_discovery, DiscoveryOutcome, LinkState, Peer, TransferRole};
use crate::responder::{classify_write_request, WriteRequestOutcome};
use crate::session::{GattSession, SessionAction};
use crate::transport::{
    CharacteristicHandle, CharacteristicUuid, PeerId, Permissions, RequestId, ResponseStatus,
    ServiceHandle, ServiceUuid, Transport, TransportEvent,
};

/// Request to arm a connect-timeout timer for a newly admitted peer.
///
/// The engine loop turns each request into a sleep task that posts the
/// timeout back into the serialized context; the generation makes stale
/// firings harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTimeout {
    pub peer: PeerId,
    pub generation: u64,
}

/// Admission-controlled scheduler over an abstract radio transport.
pub struct ConnectionScheduler {
    transport: Box<dyn Transport>,
    hooks: EngineHooks,
    max_concurrent: usize,
    environmental_factor: f64,
    peers: HashMap<PeerId, Peer>,
    /// FIFO admission queue, in discovery order.
    queue: VecDeque<PeerId>,
    connecting: HashSet<PeerId>,
    connected: HashSet<PeerId>,
    sessions: HashMap<PeerId, GattSession>,
    served_short_ids: ShortIdCache,
    /// Live connect-timeout generation per connecting peer.
    timeout_generations: HashMap<PeerId, u64>,
    next_generation: u64,
}

impl ConnectionScheduler {
    pub fn new(config: &EngineConfig, transport: Box<dyn Transport>, hooks: EngineHooks) -> Self {
        Self {
            transport,
            hooks,
            max_concurrent: config.max_concurrent_connections,
            environmental_factor: config.environmental_factor,
            peers: HashMap::new(),
            queue: VecDeque::new(),
            connecting: HashSet::new(),
            connected: HashSet::new(),
            sessions: HashMap::new(),
            served_short_ids: ShortIdCache::new(config.dedup_capacity),
            timeout_generations: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Register the local service, start advertising, and start scanning.
    pub fn start(&mut self) {
        self.transport.add_local_service(
            ServiceUuid(SERVICE_UUID),
            CharacteristicUuid(CHARACTERISTIC_UUID),
            Permissions {
                readable: true,
                writable: true,
            },
        );
        self.transport.advertise(ServiceUuid(SERVICE_UUID));
        self.transport.scan(Some(ServiceUuid(SERVICE_UUID)));
        tracing::info!("scheduler started");
    }

    /// Flush every peer, stop scanning and advertising, and clear the
    /// dedup cache.
    pub fn shutdown(&mut self) {
        let peers: Vec<PeerId> = self.peers.keys().copied().collect();
        for peer in peers {
            self.flush_peer(peer);
        }
        self.queue.clear();
        self.transport.stop_scan();
        self.transport.stop_advertising();
        self.served_short_ids.clear();
        tracing::info!("scheduler shut down");
    }

    /// Number of links currently connecting or connected.
    #[must_use]
    pub fn active_link_count(&self) -> usize {
        self.connecting.len() + self.connected.len()
    }

    /// Number of tracked peer records.
    #[must_use]
    pub fn tracked_peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Dispatch a transport event. Returns timers for the engine to arm.
    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<ConnectTimeout> {
        match event {
            TransportEvent::Discovered {
                peer,
                rssi,
                tx_power_level,
                service_data,
                connectable,
            } => self.handle_discovered(peer, rssi, tx_power_level, service_data, connectable),
            TransportEvent::Connected { peer } => self.handle_connected(peer),
            TransportEvent::ConnectFailed { peer, reason } => {
                tracing::warn!(peer = peer.0, "connect failed: {reason}");
                self.handle_link_down(peer)
            }
            TransportEvent::Disconnected { peer, reason } => {
                match reason {
                    Some(reason) => tracing::debug!(peer = peer.0, "disconnected: {reason}"),
                    None => tracing::debug!(peer = peer.0, "disconnected"),
                }
                self.handle_link_down(peer)
            }
            TransportEvent::ServicesDiscovered {
                peer,
                services,
                error,
            } => self.handle_services_discovered(peer, services, error),
            TransportEvent::CharacteristicsDiscovered {
                peer,
                service,
                characteristics,
                error,
            } => self.handle_characteristics_discovered(peer, service, characteristics, error),
            TransportEvent::ValueRead {
                peer,
                characteristic,
                value,
                error,
            } => self.handle_value_read(peer, characteristic, value, error),
            TransportEvent::ValueWritten {
                peer,
                characteristic,
                error,
            } => self.handle_value_written(peer, characteristic, error),
            TransportEvent::ServicesInvalidated { peer, services } => {
                self.handle_services_invalidated(peer, services)
            }
            TransportEvent::ReadRequestReceived { request, peer, .. } => {
                self.handle_read_request(request, peer);
                Vec::new()
            }
            TransportEvent::WriteRequestReceived {
                request,
                peer,
                characteristic,
                value,
            } => {
                self.handle_write_request(request, peer, characteristic, value);
                Vec::new()
            }
            TransportEvent::RadioFailed { reason } => {
                tracing::error!("radio transport failed: {reason}");
                (self.hooks.critical_error)(EngineError::RadioUnavailable(reason));
                Vec::new()
            }
        }
    }

    fn handle_discovered(
        &mut self,
        peer: PeerId,
        rssi: f64,
        tx_power_level: Option<i32>,
        service_data: Option<Vec<u8>>,
        connectable: bool,
    ) -> Vec<ConnectTimeout> {
        // Only bridging peers can place data in the service-data field.
        let hint_is_android = service_data.is_some();
        let measured = measured_rssi_at_one_meter(tx_power_level, hint_is_android);
        let estimate = estimated_distance_meters(rssi, measured, self.environmental_factor);
        let distance = (estimate >= 0.0).then_some(estimate);

        let entry = self.peers.entry(peer).or_insert_with(|| Peer::new(peer));
        entry.estimated_distance_meters = distance;
        let already_captured = entry.last_observed_token.is_some();

        let outcome = classify_discovery(
            service_data.as_deref(),
            connectable,
            already_captured,
            &self.served_short_ids,
        );
        match outcome {
            DiscoveryOutcome::ReportCached => {
                if let Some(token) = self.peers.get(&peer).and_then(|p| p.last_observed_token) {
                    self.report_token(token, distance);
                }
                Vec::new()
            }
            DiscoveryOutcome::ReportOnly { token } => {
                self.record_token(peer, token);
                self.report_token(token, distance);
                Vec::new()
            }
            DiscoveryOutcome::ReportAndQueueWrite { token, short_id } => {
                self.record_token(peer, token);
                self.report_token(token, distance);
                self.served_short_ids.insert(short_id);
                self.queue_transfer(peer, TransferRole::WriteToken);
                self.admit_connections()
            }
            DiscoveryOutcome::QueueRead => {
                self.queue_transfer(peer, TransferRole::ReadToken);
                self.admit_connections()
            }
            DiscoveryOutcome::Malformed { len } => {
                tracing::debug!(peer = peer.0, len, "ignoring malformed advertisement");
                Vec::new()
            }
            DiscoveryOutcome::Skip => Vec::new(),
        }
    }

    /// Queue a peer for a transfer, unless one is already queued or running.
    fn queue_transfer(&mut self, peer: PeerId, role: TransferRole) {
        let Some(entry) = self.peers.get_mut(&peer) else {
            return;
        };
        if entry.role != TransferRole::None {
            return;
        }
        entry.role = role;
        self.queue.push_back(peer);
        tracing::trace!(peer = peer.0, ?role, "queued transfer");
    }

    /// Admit queued peers while the concurrency budget allows, in FIFO
    /// discovery order. A peer mid-transfer is never pre-empted.
    fn admit_connections(&mut self) -> Vec<ConnectTimeout> {
        let mut timers = Vec::new();
        while self.active_link_count() < self.max_concurrent {
            let Some(peer) = self.next_queued() else {
                break;
            };
            self.transport.connect(peer);
            self.connecting.insert(peer);
            if let Some(entry) = self.peers.get_mut(&peer) {
                entry.link_state = LinkState::Connecting;
            }
            self.next_generation += 1;
            self.timeout_generations.insert(peer, self.next_generation);
            tracing::debug!(peer = peer.0, "connecting");
            timers.push(ConnectTimeout {
                peer,
                generation: self.next_generation,
            });
        }
        timers
    }

    /// Pop the next queued peer that is still eligible for connection.
    fn next_queued(&mut self) -> Option<PeerId> {
        while let Some(peer) = self.queue.pop_front() {
            let Some(entry) = self.peers.get(&peer) else {
                continue;
            };
            if entry.role == TransferRole::None {
                continue;
            }
            if self.connecting.contains(&peer) || self.connected.contains(&peer) {
                continue;
            }
            return Some(peer);
        }
        None
    }

    /// A connect-timeout timer fired. Stale generations are no-ops; a live
    /// one means the peer never reached `Connected` and is treated as a
    /// connect failure.
    pub fn handle_connect_timeout(&mut self, peer: PeerId, generation: u64) -> Vec<ConnectTimeout> {
        if self.timeout_generations.get(&peer) != Some(&generation) {
            return Vec::new();
        }
        tracing::debug!(peer = peer.0, "connect timed out");
        self.flush(peer)
    }

    fn handle_connected(&mut self, peer: PeerId) -> Vec<ConnectTimeout> {
        self.timeout_generations.remove(&peer);
        let was_connecting = self.connecting.remove(&peer);
        if self.connected.contains(&peer) {
            tracing::debug!(peer = peer.0, "ignoring duplicate connect");
            return Vec::new();
        }
        if !was_connecting || !self.peers.contains_key(&peer) {
            // A link we never asked for, or one flushed while connecting.
            self.transport.cancel_connection(peer);
            return self.admit_connections();
        }
        self.connected.insert(peer);
        if let Some(entry) = self.peers.get_mut(&peer) {
            entry.link_state = LinkState::DiscoveringServices;
        }
        if !self.sessions.contains_key(&peer) {
            self.sessions.insert(peer, GattSession::new(peer));
            self.transport
                .discover_services(peer, ServiceUuid(SERVICE_UUID));
            tracing::debug!(peer = peer.0, "discovering services");
        }
        Vec::new()
    }

    /// A link went down (connect failure or disconnect). Clears transfer
    /// bookkeeping and frees the admission slot; the captured token
    /// survives so rediscovery re-reports it.
    fn handle_link_down(&mut self, peer: PeerId) -> Vec<ConnectTimeout> {
        self.timeout_generations.remove(&peer);
        self.sessions.remove(&peer);
        self.connecting.remove(&peer);
        self.connected.remove(&peer);
        self.queue.retain(|&p| p != peer);
        if let Some(entry) = self.peers.get_mut(&peer) {
            entry.role = TransferRole::None;
            entry.link_state = LinkState::Idle;
        }
        self.admit_connections()
    }

    /// Remove a peer from every tracking set, destroy its record, and drop
    /// its connection if one is in flight.
    pub fn flush(&mut self, peer: PeerId) -> Vec<ConnectTimeout> {
        self.flush_peer(peer);
        self.admit_connections()
    }

    fn flush_peer(&mut self, peer: PeerId) {
        self.timeout_generations.remove(&peer);
        self.sessions.remove(&peer);
        let was_linked = self.connecting.remove(&peer) | self.connected.remove(&peer);
        self.peers.remove(&peer);
        self.queue.retain(|&p| p != peer);
        if was_linked {
            self.transport.cancel_connection(peer);
            tracing::debug!(peer = peer.0, "cancelled connection");
        }
    }

    fn handle_services_discovered(
        &mut self,
        peer: PeerId,
        services: Vec<ServiceHandle>,
        error: Option<String>,
    ) -> Vec<ConnectTimeout> {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Vec::new();
        };
        let actions = session.on_services_discovered(&services, error.as_deref());
        self.apply_session_actions(peer, actions)
    }

    fn handle_characteristics_discovered(
        &mut self,
        peer: PeerId,
        service: ServiceHandle,
        characteristics: Vec<CharacteristicHandle>,
        error: Option<String>,
    ) -> Vec<ConnectTimeout> {
        let role = self
            .peers
            .get(&peer)
            .map(|p| p.role)
            .unwrap_or(TransferRole::None);
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Vec::new();
        };
        let actions =
            session.on_characteristics_discovered(service, &characteristics, error.as_deref(), role);
        self.apply_session_actions(peer, actions)
    }

    fn handle_value_read(
        &mut self,
        peer: PeerId,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
        error: Option<String>,
    ) -> Vec<ConnectTimeout> {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Vec::new();
        };
        let actions = session.on_value_read(characteristic, &value, error.as_deref());
        self.apply_session_actions(peer, actions)
    }

    fn handle_value_written(
        &mut self,
        peer: PeerId,
        characteristic: CharacteristicHandle,
        error: Option<String>,
    ) -> Vec<ConnectTimeout> {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Vec::new();
        };
        let actions = session.on_value_written(characteristic, error.as_deref());
        self.apply_session_actions(peer, actions)
    }

    /// Invalidation of the contact service while connected voids whatever
    /// the session learned; flush so rediscovery starts the peer over.
    fn handle_services_invalidated(
        &mut self,
        peer: PeerId,
        services: Vec<ServiceHandle>,
    ) -> Vec<ConnectTimeout> {
        let Some(session) = self.sessions.get(&peer) else {
            return Vec::new();
        };
        if services.iter().any(|&s| session.has_service(s)) {
            tracing::debug!(peer = peer.0, "contact service invalidated");
            return self.flush(peer);
        }
        Vec::new()
    }

    fn apply_session_actions(
        &mut self,
        peer: PeerId,
        actions: Vec<SessionAction>,
    ) -> Vec<ConnectTimeout> {
        let mut timers = Vec::new();
        for action in actions {
            match action {
                SessionAction::DiscoverCharacteristics { service } => {
                    self.transport.discover_characteristics(
                        peer,
                        service,
                        CharacteristicUuid(CHARACTERISTIC_UUID),
                    );
                }
                SessionAction::Read { characteristic } => {
                    if let Some(entry) = self.peers.get_mut(&peer) {
                        entry.link_state = LinkState::Transferring;
                    }
                    self.transport.read_characteristic(peer, characteristic);
                    tracing::debug!(peer = peer.0, "reading token");
                }
                SessionAction::Write { characteristic } => {
                    if let Some(entry) = self.peers.get_mut(&peer) {
                        entry.link_state = LinkState::Transferring;
                    }
                    let token = (self.hooks.token_generator)();
                    self.transport
                        .write_characteristic(peer, characteristic, token.as_ref().to_vec());
                    tracing::debug!(peer = peer.0, "writing token");
                }
                SessionAction::TokenObserved { token } => {
                    self.record_token(peer, token);
                    let distance = self.peers.get(&peer).and_then(|p| p.estimated_distance_meters);
                    self.report_token(token, distance);
                }
                SessionAction::TransferComplete => {
                    if let Some(entry) = self.peers.get_mut(&peer) {
                        entry.role = TransferRole::None;
                        entry.link_state = LinkState::Idle;
                    }
                    self.sessions.remove(&peer);
                    let was_linked =
                        self.connecting.remove(&peer) | self.connected.remove(&peer);
                    if was_linked {
                        self.transport.cancel_connection(peer);
                    }
                    tracing::debug!(peer = peer.0, "transfer complete");
                    timers.extend(self.admit_connections());
                }
                SessionAction::Cancel => {
                    timers.extend(self.flush(peer));
                }
            }
        }
        timers
    }

    /// Answer a local GATT read request with a freshly generated token.
    fn handle_read_request(&mut self, request: RequestId, peer: PeerId) {
        let token = (self.hooks.token_generator)();
        self.transport
            .respond_to_read(request, Some(token.as_ref().to_vec()), ResponseStatus::Success);
        tracing::debug!(peer = peer.0, "answered read request");
    }

    /// Accept a token written to the local characteristic by a remote
    /// central.
    fn handle_write_request(
        &mut self,
        request: RequestId,
        peer: PeerId,
        characteristic: CharacteristicUuid,
        value: Vec<u8>,
    ) {
        let matches = characteristic == CharacteristicUuid(CHARACTERISTIC_UUID);
        match classify_write_request(matches, &value) {
            WriteRequestOutcome::Accept(token) => {
                self.record_token(peer, token);
                let distance = self.peers.get(&peer).and_then(|p| p.estimated_distance_meters);
                self.report_token(token, distance);
                self.transport
                    .respond_to_write(request, ResponseStatus::Success);
            }
            WriteRequestOutcome::WrongCharacteristic => {
                tracing::debug!(peer = peer.0, "write request for unknown characteristic");
                self.transport
                    .respond_to_write(request, ResponseStatus::NotSupported);
            }
            WriteRequestOutcome::ShortValue(len) => {
                tracing::debug!(peer = peer.0, len, "rejecting short write request");
                self.transport
                    .respond_to_write(request, ResponseStatus::InvalidPayload);
            }
        }
    }

    fn record_token(&mut self, peer: PeerId, token: TemporaryContactNumber) {
        let entry = self.peers.entry(peer).or_insert_with(|| Peer::new(peer));
        entry.last_observed_token = Some(token);
    }

    fn report_token(&mut self, token: TemporaryContactNumber, distance: Option<f64>) {
        tracing::info!(token = %token, ?distance, "token observed");
        (self.hooks.token_observed)(token, distance);
    }
}
