// fleetdash-api: Async Rust client for the fleet dashboard (REST + Socket.IO push)

pub mod auth;
pub mod error;
pub mod push;
pub mod rest;
pub mod transport;

pub use auth::{Anonymous, CredentialProvider, StaticToken};
pub use error::Error;
pub use push::{LinkStatus, PushFrame, PushHandle, PushOptions, ReconnectConfig, TransportPolicy};
pub use rest::RestClient;
pub use rest::models::{
    AlertEntry, AlertQuery, DashboardStatsEntry, DeviceEntry, DeviceQuery, GatewayEntry,
    GatewayQuery, RecordId, SensorDataEntry, SensorHistoryQuery, SiteEntry,
};
pub use transport::{TlsMode, TransportConfig};
