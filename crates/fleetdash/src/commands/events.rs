//! `events` handler: tail decoded push events.

use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;

use fleetdash_core::{EventName, PushEvent, Subscription, SyncService};

use crate::cli::{EventsArgs, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{go_live, interrupted, merge_rooms};

/// One printed event. Flattened so JSON lines read
/// `{"received_at":…,"event":"…","payload":{…}}`.
#[derive(Serialize)]
struct Received<'a> {
    received_at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a PushEvent,
}

/// Parse `--filter` values. No filters means every event.
fn parse_filters(raw: &[String]) -> Result<Vec<EventName>, CliError> {
    if raw.is_empty() {
        return Ok(EventName::iter().collect());
    }
    let mut names = Vec::with_capacity(raw.len());
    for value in raw {
        let name = EventName::from_str(value).map_err(|_| CliError::Validation {
            field: "filter".into(),
            reason: format!(
                "unknown event '{value}'. Known events: {}",
                EventName::iter()
                    .map(EventName::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn summary(event: &PushEvent) -> String {
    match event {
        PushEvent::DeviceStatusChange(c) | PushEvent::GatewayStatus(c) => {
            format!("{} -> {}", c.key, c.status)
        }
        PushEvent::DeviceHeartbeat(h) => match h.status {
            Some(status) => format!("{} {status}", h.device_id),
            None => h.device_id.clone(),
        },
        PushEvent::AlertNew(a) => format!(
            "[{}] {}",
            a.severity.map_or_else(|| "?".into(), |s| s.to_string()),
            a.message.as_deref().unwrap_or("")
        ),
        PushEvent::SensorData(r) => format!(
            "{} ch{} = {:.3}",
            r.node_name.clone().unwrap_or_else(|| r.node_id.to_string()),
            r.channel,
            r.value()
        ),
        PushEvent::DeviceSensorData(d) => format!("{} {}", d.device_id, d.data),
        PushEvent::ConfigApplied(v) => v.to_string(),
        PushEvent::ConnectionResponse(g) => g.message.clone().unwrap_or_default(),
        PushEvent::RoomJoined(r) | PushEvent::RoomLeft(r) => r.room.clone(),
    }
}

fn line(record: &Received<'_>) -> String {
    let local = record.received_at.with_timezone(&Local);
    format!(
        "{}  {:<22} {}",
        local.format("%H:%M:%S"),
        record.event.name().as_str(),
        summary(record.event)
    )
}

pub async fn handle(
    resolved: Resolved,
    args: EventsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let names = parse_filters(&args.filters)?;
    let rooms = merge_rooms(resolved.rooms, args.rooms);
    let service = SyncService::new(resolved.sync)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<PushEvent>();
    let _subscriptions: Vec<Subscription> = names
        .iter()
        .map(|&name| {
            let tx = tx.clone();
            service.registry().subscribe(name, move |event| {
                let _ = tx.send(event.clone());
            })
        })
        .collect();
    drop(tx);

    let result = tail(&service, &rooms, &mut rx, args.count, global).await;
    service.shutdown().await;
    result
}

async fn tail(
    service: &SyncService,
    rooms: &[String],
    rx: &mut mpsc::UnboundedReceiver<PushEvent>,
    count: Option<usize>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    go_live(service, rooms).await;
    output::print_status(&format!("tailing events from {}", service.config().url), global.quiet);

    let stop = interrupted();
    tokio::pin!(stop);
    let mut seen = 0usize;

    while count.is_none_or(|n| seen < n) {
        tokio::select! {
            () = &mut stop => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                let record = Received {
                    received_at: Utc::now(),
                    event: &event,
                };
                let out = output::render_single(global.output, &record, line, line)?;
                output::print_output(&out, global.quiet);
                seen += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fleetdash_core::{DeviceStatus, RoomAck, StatusChange};

    #[test]
    fn empty_filter_means_every_event() {
        let names = parse_filters(&[]).unwrap();
        assert!(names.contains(&EventName::DeviceHeartbeat));
        assert!(names.contains(&EventName::RoomLeft));
    }

    #[test]
    fn filters_use_wire_names() {
        let names =
            parse_filters(&["alert:new".into(), "sensor_data".into(), "alert:new".into()]).unwrap();
        assert_eq!(names, vec![EventName::AlertNew, EventName::SensorData]);

        let err = parse_filters(&["alert".into()]).unwrap_err();
        assert!(err.to_string().contains("filter"));
    }

    #[test]
    fn summaries_are_one_line() {
        let change = PushEvent::DeviceStatusChange(StatusChange {
            key: "GW-01-N01".into(),
            status: DeviceStatus::Offline,
            timestamp: None,
        });
        assert_eq!(summary(&change), "GW-01-N01 -> offline");

        let joined = PushEvent::RoomJoined(RoomAck {
            room: "site-1".into(),
        });
        assert_eq!(summary(&joined), "site-1");
    }

    #[test]
    fn json_record_carries_event_and_payload() {
        let event = PushEvent::RoomLeft(RoomAck {
            room: "site-1".into(),
        });
        let record = Received {
            received_at: Utc::now(),
            event: &event,
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "left");
        assert_eq!(json["payload"]["room"], "site-1");
        assert!(json["received_at"].is_string());
    }
}
