// ── API-to-domain type conversions ──
//
// Bridges raw `fleetdash_api` response types into canonical
// `fleetdash_core::model` domain types. Each `From` impl parses strings
// into strong types and drops values that do not parse instead of
// failing the whole record.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, Utc};

use fleetdash_api::{
    AlertEntry, DashboardStatsEntry, DeviceEntry, GatewayEntry, SensorDataEntry,
    SensorHistoryQuery,
};

use crate::model::{
    Alert, AlertSeverity, AlertStatus, DashboardStats, Device, DeviceStatus, EntityId, Gateway,
    MacAddress, SensorQuery, SensorReading,
};

/// Naive timestamps from the backend are UTC (`datetime.utcnow()`).
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Format the history endpoint parses with `fromisoformat`.
const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an ISO-8601 timestamp, with or without an offset.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_opt(raw: Option<&String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| parse_timestamp(s))
}

fn parse_ip(raw: Option<&String>) -> Option<IpAddr> {
    raw.and_then(|s| s.parse().ok())
}

// ── Devices ────────────────────────────────────────────────────────

impl From<DeviceEntry> for Device {
    fn from(d: DeviceEntry) -> Self {
        Self {
            id: d.id,
            device_id: d.device_id,
            name: d.name,
            kind: d.device_type.parse().unwrap_or_default(),
            mac_address: d.mac_address.map(MacAddress::new),
            gateway_id: d.gateway_id,
            status: DeviceStatus::parse_lenient(&d.status),
            firmware_version: d.firmware_version,
            last_seen: parse_opt(d.last_seen.as_ref()),
            created_at: parse_opt(d.created_at.as_ref()),
            updated_at: parse_opt(d.updated_at.as_ref()),
        }
    }
}

impl From<GatewayEntry> for Gateway {
    fn from(g: GatewayEntry) -> Self {
        Self {
            id: EntityId::from(g.id),
            gateway_id: g.gateway_id,
            name: g.name,
            site_id: g.site_id.map(EntityId::from),
            mac_address: g.mac_address.map(MacAddress::new),
            ip_address: parse_ip(g.ip_address.as_ref()),
            location: g.location,
            status: DeviceStatus::parse_lenient(&g.status),
            firmware_version: g.firmware_version,
            last_seen: parse_opt(g.last_seen.as_ref()),
            max_nodes: g.max_nodes,
            node_count: g.node_count,
            online_nodes: g.online_nodes,
        }
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

impl From<AlertEntry> for Alert {
    fn from(a: AlertEntry) -> Self {
        Self {
            id: a.id,
            device_id: a.device_id,
            alert_type: a.alert_type,
            severity: a.severity.parse::<AlertSeverity>().unwrap_or_default(),
            message: a.message,
            status: a.status.parse::<AlertStatus>().unwrap_or_default(),
            created_at: parse_opt(a.created_at.as_ref()),
            resolved_at: parse_opt(a.resolved_at.as_ref()),
        }
    }
}

// ── Dashboard ──────────────────────────────────────────────────────

impl From<DashboardStatsEntry> for DashboardStats {
    fn from(s: DashboardStatsEntry) -> Self {
        Self {
            total_devices: s.devices.total,
            online_devices: s.devices.online,
            offline_devices: s.devices.offline,
            gateways: s.devices.gateways,
            nodes: s.devices.nodes,
            online_percentage: s.devices.online_percentage,
            active_alerts: s.alerts.active,
            critical_alerts: s.alerts.critical,
            recent_heartbeats: s.activity.recent_heartbeats,
        }
    }
}

// ── Sensor data ────────────────────────────────────────────────────

impl From<SensorDataEntry> for SensorReading {
    fn from(s: SensorDataEntry) -> Self {
        Self {
            id: s.id.map(EntityId::from),
            node_id: EntityId::from(s.node_id),
            node_name: s.node_name,
            gateway_id: s.gateway_id.map(EntityId::from),
            gateway_name: s.gateway_name,
            site_id: s.site_id.map(EntityId::from),
            site_name: s.site_name,
            adc_type: s.adc_type,
            channel: s.channel,
            raw_value: s.raw_value,
            converted_value: s.converted_value,
            unit: s.unit,
            timestamp: parse_timestamp(&s.timestamp),
        }
    }
}

impl From<&SensorQuery> for SensorHistoryQuery {
    fn from(q: &SensorQuery) -> Self {
        Self {
            limit: q.limit,
            start_date: q.start.map(|t| t.format(QUERY_FORMAT).to_string()),
            end_date: q.end.map(|t| t.format(QUERY_FORMAT).to_string()),
            site_id: q.site_id.clone(),
            gateway_id: q.gateway_id.clone(),
            node_id: q.node_id.clone(),
            adc_type: q.adc_type.clone(),
            channel: q.channel,
        }
    }
}
