//! Abstract radio transport capability.
//!
//! The engine drives a platform radio stack through the [`Transport`] trait
//! and receives completions back as [`TransportEvent`]s. Commands are
//! non-blocking requests; every asynchronous outcome arrives as a later
//! event on the engine's serialized context. A platform integration
//! implements [`Transport`] and feeds events into the sender returned by
//! [`crate::TcnEngine::events`].

/// Opaque stable identifier assigned by the transport for a physical radio
/// peer. Map key throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

/// Handle for a GATT service discovered on a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(pub u64);

/// Handle for a GATT characteristic discovered on a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle(pub u64);

/// Identifier of a GATT read or write request from a remote central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// A 16-bit-form BLE service UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceUuid(pub u16);

/// A 128-bit-form BLE characteristic UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicUuid(pub u128);

/// Access permissions for a characteristic added to the local GATT database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub readable: bool,
    pub writable: bool,
}

/// Result status for responding to a GATT request from a remote central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    InvalidPayload,
    NotSupported,
}

/// Radio capability consumed by the engine.
///
/// Implementations must not block: each method enqueues work on the radio
/// stack and returns. Failures surface as events.
pub trait Transport: Send {
    fn scan(&mut self, service: Option<ServiceUuid>);
    fn stop_scan(&mut self);
    fn connect(&mut self, peer: PeerId);
    fn cancel_connection(&mut self, peer: PeerId);
    fn discover_services(&mut self, peer: PeerId, service: ServiceUuid);
    fn discover_characteristics(
        &mut self,
        peer: PeerId,
        service: ServiceHandle,
        characteristic: CharacteristicUuid,
    );
    fn read_characteristic(&mut self, peer: PeerId, characteristic: CharacteristicHandle);
    fn write_characteristic(
        &mut self,
        peer: PeerId,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
    );
    fn advertise(&mut self, service: ServiceUuid);
    fn stop_advertising(&mut self);
    fn add_local_service(
        &mut self,
        service: ServiceUuid,
        characteristic: CharacteristicUuid,
        permissions: Permissions,
    );
    fn respond_to_read(&mut self, request: RequestId, value: Option<Vec<u8>>, status: ResponseStatus);
    fn respond_to_write(&mut self, request: RequestId, status: ResponseStatus);
}

/// Events delivered by the transport into the engine's serialized context.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Discovered {
        peer: PeerId,
        rssi: f64,
        tx_power_level: Option<i32>,
        service_data: Option<Vec<u8>>,
        connectable: bool,
    },
    Connected {
        peer: PeerId,
    },
    ConnectFailed {
        peer: PeerId,
        reason: String,
    },
    Disconnected {
        peer: PeerId,
        reason: Option<String>,
    },
    ServicesDiscovered {
        peer: PeerId,
        services: Vec<ServiceHandle>,
        error: Option<String>,
    },
    CharacteristicsDiscovered {
        peer: PeerId,
        service: ServiceHandle,
        characteristics: Vec<CharacteristicHandle>,
        error: Option<String>,
    },
    ValueRead {
        peer: PeerId,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
        error: Option<String>,
    },
    ValueWritten {
        peer: PeerId,
        characteristic: CharacteristicHandle,
        error: Option<String>,
    },
    ServicesInvalidated {
        peer: PeerId,
        services: Vec<ServiceHandle>,
    },
    ReadRequestReceived {
        request: RequestId,
        peer: PeerId,
        characteristic: CharacteristicUuid,
    },
    WriteRequestReceived {
        request: RequestId,
        peer: PeerId,
        characteristic: CharacteristicUuid,
        value: Vec<u8>,
    },
    /// The radio stack could not be initialized or died irrecoverably.
    RadioFailed {
        reason: String,
    },
}
