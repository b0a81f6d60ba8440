//! Transport abstraction over the BLE host stack.
//!
//! The emulator core never talks to a Bluetooth stack directly: it registers
//! service definitions, pushes characteristic values, and reacts to
//! [`TransportEvent`]s delivered by whatever host binding is in use. The
//! binding is expected to serialize its callbacks onto the coordinator's
//! event loop.

use uuid::Uuid;

/// Power state of the underlying adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Adapter powered and usable.
    Ready,
    /// Adapter powered off.
    #[default]
    Off,
    /// No adapter, or access denied.
    Unavailable,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Ready => write!(f, "ready"),
            TransportState::Off => write!(f, "off"),
            TransportState::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// ATT properties a characteristic exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
}

/// One characteristic inside a service definition.
#[derive(Debug, Clone)]
pub struct CharacteristicDef {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    /// Human-readable label served from the 0x2901 descriptor.
    pub user_description: &'static str,
}

/// A primary service with its characteristics.
#[derive(Debug, Clone)]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDef>,
}

/// Advertising payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    pub local_name: String,
    pub service_uuids: Vec<Uuid>,
}

/// Events the transport delivers to the coordinator.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Adapter power state changed.
    StateChanged(TransportState),
    /// A service registration completed.
    ServiceAdded { uuid: Uuid, ok: bool },
    /// The advertising request completed.
    AdvertisingStarted { ok: bool },
    /// A consumer subscribed to notifications on a characteristic.
    Subscribed(Uuid),
    /// A consumer unsubscribed from a characteristic.
    Unsubscribed(Uuid),
    /// A consumer issued a read; answer via [`Transport::respond_to_read`].
    Read(Uuid),
    /// A consumer wrote a characteristic value.
    Write { characteristic: Uuid, data: Vec<u8> },
    /// The transport can accept queued value updates again.
    ReadyToUpdate,
}

/// Calls the coordinator makes into the host stack.
pub trait Transport {
    /// Register a service; completion arrives as [`TransportEvent::ServiceAdded`].
    fn add_service(&mut self, service: ServiceDef);

    /// Begin advertising; completion arrives as
    /// [`TransportEvent::AdvertisingStarted`].
    fn start_advertising(&mut self, data: AdvertisingData);

    /// Stop advertising. Safe to call when not advertising.
    fn stop_advertising(&mut self);

    /// Push a characteristic value to subscribers (notification, or an
    /// indication on characteristics declared with the indicate property).
    /// Returns `false` when the transport queue is full; the caller retries
    /// after [`TransportEvent::ReadyToUpdate`].
    fn update_value(&mut self, characteristic: Uuid, data: &[u8]) -> bool;

    /// Answer an outstanding read request. `None` rejects the read.
    fn respond_to_read(&mut self, characteristic: Uuid, value: Option<Vec<u8>>);

    /// Acknowledge a write request at the ATT level. Protocol-level errors
    /// still ride in the control-point indication; `ok: false` is only for
    /// writes to characteristics that do not accept them.
    fn respond_to_write(&mut self, characteristic: Uuid, ok: bool);
}
