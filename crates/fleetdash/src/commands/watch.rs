//! `watch` handler: mount one view, print it, and reprint on every change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tabled::Tabled;

use fleetdash_core::store::KeyedSnapshot;
use fleetdash_core::{
    Alert, AlertFilter, CacheStream, DashboardStats, Device, DeviceKindFilter, Gateway, Notice,
    RollingBuffer, SensorQuery, SensorReading, SyncService,
};

use crate::cli::{GlobalOpts, KindFilter, StatusFilter, WatchArgs, WatchTarget};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output::{self, Painter};

use super::{go_live, interrupted, merge_rooms};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl DeviceRow {
    fn new(d: &Device, painter: Painter) -> Self {
        Self {
            id: d.device_id.clone(),
            name: d.name.clone(),
            kind: d.kind.to_string(),
            status: painter.status(d.status),
            gateway: d.gateway_id.map(|g| g.to_string()).unwrap_or_default(),
            firmware: d.firmware_version.clone().unwrap_or_default(),
            last_seen: when(d.last_seen),
        }
    }
}

#[derive(Tabled)]
struct GatewayRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Nodes")]
    nodes: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl GatewayRow {
    fn new(g: &Gateway, painter: Painter) -> Self {
        let nodes = match (g.online_nodes, g.node_count) {
            (Some(online), Some(total)) => format!("{online}/{total}"),
            (None, Some(total)) => total.to_string(),
            _ => String::new(),
        };
        Self {
            id: g.gateway_id.clone(),
            name: g.name.clone(),
            status: painter.status(g.status),
            location: g.location.clone().unwrap_or_default(),
            nodes,
            ip: g.ip_address.map(|ip| ip.to_string()).unwrap_or_default(),
            last_seen: when(g.last_seen),
        }
    }
}

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl AlertRow {
    fn new(a: &Alert, painter: Painter) -> Self {
        Self {
            id: a.id,
            severity: painter.severity(a.severity),
            status: a.status.to_string(),
            alert_type: a.alert_type.clone(),
            device: a.device_id.map(|d| d.to_string()).unwrap_or_default(),
            message: a.message.clone(),
            created: when(a.created_at),
        }
    }
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Ch")]
    channel: u32,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Raw")]
    raw: String,
}

impl From<&SensorReading> for SensorRow {
    fn from(r: &SensorReading) -> Self {
        let unit = r.unit.as_deref().unwrap_or("");
        Self {
            time: when(r.timestamp),
            node: r
                .node_name
                .clone()
                .unwrap_or_else(|| r.node_id.to_string()),
            channel: r.channel,
            value: format!("{:.3} {unit}", r.value()).trim_end().to_owned(),
            raw: format!("{:.3}", r.raw_value),
        }
    }
}

fn when(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn stats_detail(stats: Option<&DashboardStats>) -> String {
    let Some(s) = stats else {
        return "(no data yet)".into();
    };
    [
        format!(
            "Devices:     {} total, {} online, {} offline",
            s.total_devices, s.online_devices, s.offline_devices
        ),
        format!("Gateways:    {}", s.gateways),
        format!("Nodes:       {}", s.nodes),
        format!("Online:      {:.1}%", s.online_percentage),
        format!(
            "Alerts:      {} active, {} critical",
            s.active_alerts, s.critical_alerts
        ),
        format!("Heartbeats:  {} recent", s.recent_heartbeats),
    ]
    .join("\n")
}

fn stats_line(stats: Option<&DashboardStats>) -> String {
    stats.map_or_else(String::new, |s| {
        format!(
            "total={} online={} offline={} alerts={} critical={}",
            s.total_devices, s.online_devices, s.offline_devices, s.active_alerts, s.critical_alerts
        )
    })
}

// ── Filters ─────────────────────────────────────────────────────────

fn kind_filter(kind: KindFilter) -> DeviceKindFilter {
    match kind {
        KindFilter::All => DeviceKindFilter::All,
        KindFilter::Gateway => DeviceKindFilter::Gateway,
        KindFilter::Node => DeviceKindFilter::Node,
    }
}

fn status_filter(status: StatusFilter) -> AlertFilter {
    match status {
        StatusFilter::Active => AlertFilter::Active,
        StatusFilter::Resolved => AlertFilter::Resolved,
        StatusFilter::All => AlertFilter::All,
    }
}

fn sensor_query(args: &WatchArgs) -> SensorQuery {
    SensorQuery {
        limit: args.limit,
        gateway_id: args.gateway.clone(),
        node_id: args.node.clone(),
        channel: args.channel,
        ..SensorQuery::default()
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    resolved: Resolved,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let rooms = merge_rooms(resolved.rooms, args.rooms.clone());
    let service = SyncService::new(resolved.sync)?;
    let live = Live {
        service: &service,
        rooms: &rooms,
        once: args.once,
        quiet: global.quiet,
        painter: Painter::new(global.color),
    };
    let format = global.output;
    let painter = live.painter;

    let result = match args.view {
        WatchTarget::Dashboard => {
            let view = service.dashboard();
            view.load().await?;
            live.follow(view.stream(), view.notices(), |stats: &Option<Arc<DashboardStats>>| {
                output::render_single(
                    format,
                    stats,
                    |s| stats_detail(s.as_deref()),
                    |s| stats_line(s.as_deref()),
                )
            })
            .await
        }
        WatchTarget::Devices => {
            let view = service.devices();
            view.set_filter(kind_filter(args.kind)).await?;
            live.follow(view.stream(), view.notices(), |snap: &KeyedSnapshot<Device>| {
                let devices: Vec<Arc<Device>> = snap.values().cloned().collect();
                output::render_list(
                    format,
                    &devices,
                    |d| DeviceRow::new(d, painter),
                    |d| format!("{}\t{}", d.device_id, d.status),
                )
            })
            .await
        }
        WatchTarget::Gateways => {
            let view = service.gateways();
            view.load().await?;
            live.follow(view.stream(), view.notices(), |snap: &KeyedSnapshot<Gateway>| {
                let gateways: Vec<Arc<Gateway>> = snap.values().cloned().collect();
                output::render_list(
                    format,
                    &gateways,
                    |g| GatewayRow::new(g, painter),
                    |g| format!("{}\t{}", g.gateway_id, g.status),
                )
            })
            .await
        }
        WatchTarget::Alerts => {
            let view = service.alerts();
            view.set_filter(status_filter(args.status)).await?;
            live.follow(view.stream(), view.notices(), |alerts: &Option<Arc<Vec<Alert>>>| {
                let alerts: &[Alert] = alerts.as_deref().map(Vec::as_slice).unwrap_or_default();
                output::render_list(
                    format,
                    alerts,
                    |a| AlertRow::new(a, painter),
                    |a| format!("{}\t{}\t{}", a.id, a.severity, a.message),
                )
            })
            .await
        }
        WatchTarget::Sensors => {
            let view = service.sensor_data();
            view.load(sensor_query(&args)).await?;
            live.follow(
                view.table_stream(),
                view.notices(),
                |table: &Arc<RollingBuffer<SensorReading>>| {
                    let rows: Vec<SensorReading> = table.iter_newest().cloned().collect();
                    output::render_list(format, &rows, |r| SensorRow::from(r), |r| {
                        format!("{}\t{}\t{}", when(r.timestamp), r.channel, r.value())
                    })
                },
            )
            .await
        }
    };

    service.shutdown().await;
    result
}

/// Shared print loop for every view.
struct Live<'a> {
    service: &'a SyncService,
    rooms: &'a [String],
    once: bool,
    quiet: bool,
    painter: Painter,
}

impl Live<'_> {
    /// Print the current state, then (unless `--once`) connect and reprint
    /// on every change until Ctrl-C.
    async fn follow<S>(
        &self,
        mut stream: CacheStream<S>,
        mut notices: CacheStream<Option<Notice>>,
        render: impl Fn(&S) -> Result<String, CliError>,
    ) -> Result<(), CliError>
    where
        S: Clone + Send + Sync + 'static,
    {
        output::print_output(&render(stream.current())?, self.quiet);
        if self.once {
            return Ok(());
        }

        go_live(self.service, self.rooms).await;
        let mut states = self.service.connection().state_changes();
        let stop = interrupted();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                () = &mut stop => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    output::print_status(
                        &format!("connection: {}", self.painter.connection(state)),
                        self.quiet,
                    );
                }
                snap = stream.changed() => {
                    let Some(snap) = snap else { break };
                    output::print_output(&render(&snap)?, self.quiet);
                }
                notice = notices.changed() => {
                    let Some(notice) = notice else { break };
                    if let Some(notice) = notice {
                        output::print_status(&format!("warning: {}", notice.message), self.quiet);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdash_core::{DeviceKind, DeviceStatus, EntityId};

    #[test]
    fn sensor_row_prefers_converted_value_and_node_name() {
        let reading = SensorReading {
            id: None,
            node_id: EntityId::from(3_i64),
            node_name: Some("N3".into()),
            gateway_id: None,
            gateway_name: None,
            site_id: None,
            site_name: None,
            adc_type: None,
            channel: 2,
            raw_value: 512.0,
            converted_value: Some(1.25),
            unit: Some("V".into()),
            timestamp: None,
        };
        let row = SensorRow::from(&reading);
        assert_eq!(row.node, "N3");
        assert_eq!(row.value, "1.250 V");
        assert_eq!(row.raw, "512.000");

        let bare = SensorReading {
            node_name: None,
            converted_value: None,
            unit: None,
            ..reading
        };
        let row = SensorRow::from(&bare);
        assert_eq!(row.node, "3");
        assert_eq!(row.value, "512.000");
    }

    #[test]
    fn device_row_uses_external_id() {
        let device = Device {
            id: 9,
            device_id: "GW-01-N01".into(),
            name: "North field".into(),
            kind: DeviceKind::Node,
            mac_address: None,
            gateway_id: Some(1),
            status: DeviceStatus::Offline,
            firmware_version: None,
            last_seen: None,
            created_at: None,
            updated_at: None,
        };
        let row = DeviceRow::new(&device, Painter::new(crate::cli::ColorMode::Never));
        assert_eq!(row.id, "GW-01-N01");
        assert_eq!(row.status, "offline");
        assert_eq!(row.gateway, "1");
    }

    #[test]
    fn empty_dashboard_renders_placeholder() {
        assert_eq!(stats_detail(None), "(no data yet)");
        assert!(stats_line(None).is_empty());
    }
}
