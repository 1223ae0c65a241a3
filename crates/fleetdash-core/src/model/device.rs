// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::MacAddress;

/// Connectivity reported for a device or gateway.
///
/// Unrecognized server strings map to [`Unknown`](Self::Unknown) via
/// [`parse_lenient`](Self::parse_lenient).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
    Maintenance,
    #[default]
    Unknown,
}

impl DeviceStatus {
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }

    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Role of a device in the mesh.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceKind {
    Gateway,
    Node,
    #[default]
    Other,
}

/// Type filter used when loading the device list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceKindFilter {
    #[default]
    All,
    Gateway,
    Node,
}

impl DeviceKindFilter {
    /// Value for the `type` query parameter; `None` means no filter.
    pub fn as_query(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Gateway => Some("gateway"),
            Self::Node => Some("node"),
        }
    }
}

/// A registered device (gateway or sensor node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Database row id.
    pub id: i64,
    /// Stable hardware identifier (e.g. `GW-001`, `N1`). Identity key for
    /// the cached device list.
    pub device_id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub mac_address: Option<MacAddress>,
    pub gateway_id: Option<i64>,
    pub status: DeviceStatus,
    pub firmware_version: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
