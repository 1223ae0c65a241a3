// ── Dashboard aggregate counters ──

use serde::{Deserialize, Serialize};

/// Fleet-wide counters shown on the dashboard. The server computes them;
/// the client only ever replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_devices: u64,
    pub online_devices: u64,
    pub offline_devices: u64,
    pub gateways: u64,
    pub nodes: u64,
    pub online_percentage: f64,
    pub active_alerts: u64,
    pub critical_alerts: u64,
    /// Heartbeats received in the server's recent-activity window.
    pub recent_heartbeats: u64,
}
