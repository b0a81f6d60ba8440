//! BLE-facing subsystems: GATT codecs, the FTMS control point, the
//! notification scheduler, the transport abstraction and the peripheral
//! coordinator that glues them together.

pub mod codec;
pub mod control_point;
pub mod peripheral;
pub mod scheduler;
pub mod transport;
pub mod uuids;

pub use control_point::{CommandResult, ControlPoint, ControlState, OpCode, ResultCode};
pub use peripheral::{PeripheralCoordinator, RollingCounters};
pub use scheduler::{NotificationScheduler, SchedulerDelegate, TimerKind};
pub use transport::{
    AdvertisingData, CharacteristicDef, CharacteristicProperties, ServiceDef, Transport,
    TransportEvent, TransportState,
};
