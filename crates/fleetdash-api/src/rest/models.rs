// REST API wire types
//
// Models for the dashboard backend's JSON API. List endpoints wrap their
// payload in a named array (`{"devices": [...], "total": N}`). Fields use
// `#[serde(default)]` liberally because the backend omits nulls unevenly
// across endpoints. Timestamps stay as the raw ISO-8601 strings the server
// sends; `fleetdash-core` parses them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Primary key as the backend sends it: integer rows for the device/alert
/// tables, UUID strings for the IoT tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// Error body shape: `{"message": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// A device row from `GET /devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: i64,
    /// Stable string identity (`GW-01`, `GW-01-N03`). Push events key on this.
    pub device_id: String,
    pub name: String,
    /// `"node"` or `"gateway"`.
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub gateway_id: Option<i64>,
    /// `"online"`, `"offline"`, or `"error"`.
    pub status: String,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceList {
    pub devices: Vec<DeviceEntry>,
}

/// Query filters for `GET /devices`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ── Gateways ─────────────────────────────────────────────────────────

/// An IoT gateway from `GET /iot/gateways`.
///
/// The older `/gateways` endpoint returns device rows where the string
/// identity is `device_id`; the alias lets both shapes deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEntry {
    pub id: RecordId,
    #[serde(alias = "device_id")]
    pub gateway_id: String,
    pub name: String,
    #[serde(default)]
    pub site_id: Option<RecordId>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// `"online"`, `"offline"`, or `"maintenance"`.
    pub status: String,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub max_nodes: Option<u32>,
    #[serde(default)]
    pub node_count: Option<u32>,
    #[serde(default)]
    pub online_nodes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayList {
    pub gateways: Vec<GatewayEntry>,
}

/// Query filters for `GET /iot/gateways`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewayQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEntry {
    pub id: i64,
    #[serde(default)]
    pub device_id: Option<i64>,
    pub alert_type: String,
    /// `"critical"`, `"high"`, `"medium"`, or `"low"`.
    pub severity: String,
    pub message: String,
    /// `"active"`, `"acknowledged"`, or `"resolved"`.
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertList {
    pub alerts: Vec<AlertEntry>,
}

/// Query filters for `GET /alerts`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

// ── Statistics ───────────────────────────────────────────────────────

/// `GET /stats/dashboard`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStatsEntry {
    pub devices: DeviceCounts,
    pub alerts: AlertCounts,
    #[serde(default)]
    pub activity: ActivityCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub total: u64,
    pub online: u64,
    pub offline: u64,
    #[serde(default)]
    pub gateways: u64,
    #[serde(default)]
    pub nodes: u64,
    #[serde(default)]
    pub online_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub active: u64,
    #[serde(default)]
    pub critical: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityCounts {
    #[serde(default)]
    pub recent_heartbeats: u64,
}

// ── Sensor data ──────────────────────────────────────────────────────

/// One ADC reading, from the history endpoints or a `sensor_data` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDataEntry {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub node_id: RecordId,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub gateway_id: Option<RecordId>,
    #[serde(default)]
    pub gateway_name: Option<String>,
    #[serde(default)]
    pub site_id: Option<RecordId>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub adc_type: Option<String>,
    pub channel: u32,
    pub raw_value: f64,
    #[serde(default)]
    pub converted_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    pub timestamp: String,
}

/// `GET /sensor-data/history` and `/sensor-data/latest`.
///
/// The backend names the array `data`; older builds used `sensor_data`.
#[derive(Debug, Deserialize)]
pub(crate) struct SensorDataList {
    #[serde(alias = "sensor_data")]
    pub data: Vec<SensorDataEntry>,
}

/// Query filters for `GET /sensor-data/history`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SensorHistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
}

// ── Sites ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gateway_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SiteList {
    pub sites: Vec<SiteEntry>,
}
