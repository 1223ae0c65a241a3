// ── Push event catalog ──
//
// Every event the dashboard server pushes, as a closed enum. The wire name
// lives on `EventName` (strum keeps the string form in one place); the
// payload shape lives on the matching `PushEvent` variant. Frames with a
// name outside the catalog never become a `PushEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use fleetdash_api::SensorDataEntry;

use super::alert::AlertSeverity;
use super::device::DeviceStatus;
use super::sensor::SensorReading;
use crate::convert::parse_timestamp;
use crate::error::CoreError;

/// Wire names of the server-to-client events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum EventName {
    #[strum(serialize = "device:status_change")]
    DeviceStatusChange,
    #[strum(serialize = "device:heartbeat")]
    DeviceHeartbeat,
    #[strum(serialize = "gateway_status")]
    GatewayStatus,
    #[strum(serialize = "alert:new")]
    AlertNew,
    #[strum(serialize = "sensor_data")]
    SensorData,
    #[strum(serialize = "device:sensor_data")]
    DeviceSensorData,
    #[strum(serialize = "device:config_applied")]
    ConfigApplied,
    #[strum(serialize = "connection_response")]
    ConnectionResponse,
    #[strum(serialize = "joined")]
    RoomJoined,
    #[strum(serialize = "left")]
    RoomLeft,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── Payloads ────────────────────────────────────────────────────────

/// `(key, status[, timestamp])` carried by the patch-style events. `key`
/// is the `device_id` or `gateway_id` depending on the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub key: String,
    pub status: DeviceStatus,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heartbeat {
    pub device_id: String,
    pub status: Option<DeviceStatus>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// `alert:new` only signals that the alert table changed; every field is
/// optional and an unexpected shape still counts as a notice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertNotice {
    pub id: Option<i64>,
    pub device_id: Option<String>,
    pub alert_type: Option<String>,
    pub severity: Option<AlertSeverity>,
    pub message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Opaque readings forwarded by a device (`device:sensor_data`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    pub device_id: String,
    pub data: Value,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Greeting {
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAck {
    pub room: String,
}

// ── PushEvent ───────────────────────────────────────────────────────

/// A decoded server push.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum PushEvent {
    #[serde(rename = "device:status_change")]
    DeviceStatusChange(StatusChange),
    #[serde(rename = "device:heartbeat")]
    DeviceHeartbeat(Heartbeat),
    #[serde(rename = "gateway_status")]
    GatewayStatus(StatusChange),
    #[serde(rename = "alert:new")]
    AlertNew(AlertNotice),
    #[serde(rename = "sensor_data")]
    SensorData(Box<SensorReading>),
    #[serde(rename = "device:sensor_data")]
    DeviceSensorData(DeviceReport),
    #[serde(rename = "device:config_applied")]
    ConfigApplied(Value),
    #[serde(rename = "connection_response")]
    ConnectionResponse(Greeting),
    #[serde(rename = "joined")]
    RoomJoined(RoomAck),
    #[serde(rename = "left")]
    RoomLeft(RoomAck),
}

impl PushEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::DeviceStatusChange(_) => EventName::DeviceStatusChange,
            Self::DeviceHeartbeat(_) => EventName::DeviceHeartbeat,
            Self::GatewayStatus(_) => EventName::GatewayStatus,
            Self::AlertNew(_) => EventName::AlertNew,
            Self::SensorData(_) => EventName::SensorData,
            Self::DeviceSensorData(_) => EventName::DeviceSensorData,
            Self::ConfigApplied(_) => EventName::ConfigApplied,
            Self::ConnectionResponse(_) => EventName::ConnectionResponse,
            Self::RoomJoined(_) => EventName::RoomJoined,
            Self::RoomLeft(_) => EventName::RoomLeft,
        }
    }

    /// Decode the first argument of a Socket.IO event into the shape
    /// `name` promises.
    pub fn decode(name: EventName, payload: Value) -> Result<Self, CoreError> {
        let event = match name {
            EventName::DeviceStatusChange => {
                let wire: DeviceStatusWire = from_payload(name, payload)?;
                let change =
                    status_change(name, wire.device_id, &wire.status, wire.timestamp.as_deref())?;
                Self::DeviceStatusChange(change)
            }
            EventName::GatewayStatus => {
                let wire: GatewayStatusWire = from_payload(name, payload)?;
                let change =
                    status_change(name, wire.gateway_id, &wire.status, wire.timestamp.as_deref())?;
                Self::GatewayStatus(change)
            }
            EventName::DeviceHeartbeat => {
                let wire: HeartbeatWire = from_payload(name, payload)?;
                Self::DeviceHeartbeat(Heartbeat {
                    device_id: non_empty(name, wire.device_id)?,
                    status: wire.status.as_deref().map(DeviceStatus::parse_lenient),
                    timestamp: wire.timestamp.as_deref().and_then(parse_timestamp),
                })
            }
            EventName::AlertNew => {
                let wire: AlertWire = serde_json::from_value(payload).unwrap_or_default();
                Self::AlertNew(AlertNotice {
                    id: wire.id,
                    device_id: wire.device_id.map(WireKey::into_key),
                    alert_type: wire.alert_type,
                    severity: wire.severity.and_then(|s| s.parse().ok()),
                    message: wire.message,
                    timestamp: wire.timestamp.as_deref().and_then(parse_timestamp),
                })
            }
            EventName::SensorData => {
                let entry: SensorDataEntry = from_payload(name, payload)?;
                Self::SensorData(Box::new(SensorReading::from(entry)))
            }
            EventName::DeviceSensorData => {
                let wire: DeviceReportWire = from_payload(name, payload)?;
                Self::DeviceSensorData(DeviceReport {
                    device_id: non_empty(name, wire.device_id)?,
                    data: wire.data,
                    timestamp: wire.timestamp.as_deref().and_then(parse_timestamp),
                })
            }
            EventName::ConfigApplied => Self::ConfigApplied(payload),
            EventName::ConnectionResponse => {
                let wire: GreetingWire = serde_json::from_value(payload).unwrap_or_default();
                Self::ConnectionResponse(Greeting {
                    status: wire.status,
                    message: wire.message,
                })
            }
            EventName::RoomJoined => Self::RoomJoined(from_payload(name, payload)?),
            EventName::RoomLeft => Self::RoomLeft(from_payload(name, payload)?),
        };
        Ok(event)
    }
}

// ── Wire shapes ─────────────────────────────────────────────────────

/// Identity keys arrive as strings, but older firmware sends bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireKey {
    Text(String),
    Number(i64),
}

impl WireKey {
    fn into_key(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceStatusWire {
    device_id: WireKey,
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayStatusWire {
    gateway_id: WireKey,
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeartbeatWire {
    device_id: WireKey,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlertWire {
    id: Option<i64>,
    device_id: Option<WireKey>,
    alert_type: Option<String>,
    severity: Option<String>,
    message: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceReportWire {
    device_id: WireKey,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GreetingWire {
    status: Option<String>,
    message: Option<String>,
}

fn from_payload<T: serde::de::DeserializeOwned>(
    name: EventName,
    payload: Value,
) -> Result<T, CoreError> {
    serde_json::from_value(payload).map_err(|e| CoreError::Payload {
        message: format!("{name}: {e}"),
    })
}

fn non_empty(name: EventName, key: WireKey) -> Result<String, CoreError> {
    let key = key.into_key();
    if key.trim().is_empty() {
        return Err(CoreError::Payload {
            message: format!("{name}: empty identity key"),
        });
    }
    Ok(key)
}

fn status_change(
    name: EventName,
    key: WireKey,
    status: &str,
    timestamp: Option<&str>,
) -> Result<StatusChange, CoreError> {
    // A status outside the known set is skipped rather than patched in
    // as `Unknown`, which would overwrite the cached value with nothing.
    let parsed = status.trim().parse::<DeviceStatus>().map_err(|_| CoreError::Payload {
        message: format!("{name}: unrecognised status {status:?}"),
    })?;
    Ok(StatusChange {
        key: non_empty(name, key)?,
        status: parsed,
        timestamp: timestamp.and_then(parse_timestamp),
    })
}
