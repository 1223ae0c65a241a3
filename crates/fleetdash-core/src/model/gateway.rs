// ── IoT gateway domain type ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::DeviceStatus;
use super::ids::{EntityId, MacAddress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: EntityId,
    /// Hardware identifier, the key `gateway_status` events carry.
    pub gateway_id: String,
    pub name: String,
    pub site_id: Option<EntityId>,
    pub mac_address: Option<MacAddress>,
    pub ip_address: Option<IpAddr>,
    pub location: Option<String>,
    pub status: DeviceStatus,
    pub firmware_version: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    /// Capacity and occupancy, when the backend reports them.
    pub max_nodes: Option<u32>,
    pub node_count: Option<u32>,
    pub online_nodes: Option<u32>,
}
