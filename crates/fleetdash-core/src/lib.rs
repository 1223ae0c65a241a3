//! Real-time state sync between a fleet dashboard backend and its views.
//!
//! This crate sits between `fleetdash-api` (REST + Socket.IO transport) and
//! UI consumers such as the `fleetdash` CLI:
//!
//! - **[`PushConnection`]**: owns the single push link. `connect()` spawns
//!   it, `disconnect()` tears it down; progress is observable through
//!   [`ConnectionState`]. Joined rooms are remembered and rejoined after a
//!   reconnect.
//!
//! - **[`EventRegistry`]**: per-event ordered subscriber lists. Dispatch
//!   snapshots the list, calls every subscriber in order, and isolates
//!   panics. Subscribing returns a [`Subscription`] guard.
//!
//! - **[`PushDispatcher`]**: decodes inbound frames into typed
//!   [`PushEvent`]s and dispatches them, dropping unknown names and
//!   malformed payloads.
//!
//! - **Reconcilers** ([`reconcile`]) and **views** ([`views`]): each view
//!   keeps a local cache current with one of three strategies: refetch the
//!   authoritative value, patch a keyed entity in place, or append to a
//!   bounded rolling window.
//!
//! - **[`SyncService`]**: wires the above to one backend from a
//!   [`SyncConfig`] and mounts views.

pub mod api;
pub mod config;
pub mod connection;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod service;
pub mod store;
pub mod stream;
pub mod views;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::FleetApi;
pub use config::{PushSettings, SyncConfig, TlsVerification, ViewSettings};
pub use connection::{ConnectionState, PushConnection};
pub use dispatcher::PushDispatcher;
pub use error::CoreError;
pub use reconcile::{Mount, Notice, Reconciler};
pub use registry::{EventRegistry, Subscription, SubscriptionId};
pub use service::SyncService;
pub use store::{KeyedCollection, RollingBuffer, RollingCache};
pub use stream::CacheStream;
pub use views::{AlertsView, DashboardView, DevicesView, GatewaysView, SensorDataView};

// Push transport types that appear in this crate's API.
pub use fleetdash_api::{PushFrame, TransportPolicy};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Alert, AlertFilter, AlertNotice, AlertSeverity, AlertStatus, ChartPoint, DashboardStats,
    Device, DeviceKind, DeviceKindFilter, DeviceReport, DeviceStatus, EntityId, EventName,
    Gateway, Greeting, Heartbeat, MacAddress, PushEvent, RoomAck, SensorQuery, SensorReading,
    StatusChange,
};
