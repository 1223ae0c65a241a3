// ── Domain model ──
//
// Canonical types the views cache and the registry dispatches. Built from
// `fleetdash_api` wire types by the `From` impls in `crate::convert`, and
// from push payloads by `PushEvent::decode`.

pub mod alert;
pub mod device;
pub mod event;
pub mod gateway;
pub mod ids;
pub mod sensor;
pub mod stats;

pub use alert::{Alert, AlertFilter, AlertSeverity, AlertStatus};
pub use device::{Device, DeviceKind, DeviceKindFilter, DeviceStatus};
pub use event::{
    AlertNotice, DeviceReport, EventName, Greeting, Heartbeat, PushEvent, RoomAck, StatusChange,
};
pub use gateway::Gateway;
pub use ids::{EntityId, MacAddress};
pub use sensor::{ChartPoint, SensorQuery, SensorReading};
pub use stats::DashboardStats;
