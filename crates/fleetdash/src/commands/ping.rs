//! `ping` handler: connect, ask for an update, and time the heartbeat.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use fleetdash_core::{EventName, Heartbeat, PushEvent, SyncService};

use crate::cli::{GlobalOpts, PingArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::wait_connected;

#[derive(Debug, Serialize)]
struct PingReport {
    url: String,
    connect_ms: u128,
    heartbeat_ms: u128,
    device_id: String,
    status: Option<String>,
}

fn detail(r: &PingReport) -> String {
    format!(
        "Heartbeat from {} ({}) via {}\n  connect:   {} ms\n  heartbeat: {} ms",
        r.device_id,
        r.status.as_deref().unwrap_or("-"),
        r.url,
        r.connect_ms,
        r.heartbeat_ms
    )
}

fn line(r: &PingReport) -> String {
    format!("{}\t{}", r.device_id, r.heartbeat_ms)
}

pub async fn handle(
    resolved: Resolved,
    args: PingArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let service = SyncService::new(resolved.sync)?;
    let result = ping(&service, Duration::from_secs(args.wait)).await;
    service.shutdown().await;

    let report = result?;
    let out = output::render_single(global.output, &report, detail, line)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn ping(service: &SyncService, wait: Duration) -> Result<PingReport, CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Heartbeat>();
    let _sub = service
        .registry()
        .subscribe(EventName::DeviceHeartbeat, move |event| {
            if let PushEvent::DeviceHeartbeat(beat) = event {
                let _ = tx.send(beat.clone());
            }
        });

    let started = Instant::now();
    service.connect().await;
    wait_connected(service, wait).await?;
    let connect_ms = started.elapsed().as_millis();
    debug!(connect_ms = %connect_ms, "push session open");

    let asked = Instant::now();
    service.connection().request_update().await;
    let remaining = wait.saturating_sub(started.elapsed());
    let beat = match tokio::time::timeout(remaining, rx.recv()).await {
        Ok(Some(beat)) => beat,
        Ok(None) | Err(_) => {
            return Err(CliError::Timeout {
                seconds: wait.as_secs(),
            });
        }
    };

    Ok(PingReport {
        url: service.config().url.to_string(),
        connect_ms,
        heartbeat_ms: asked.elapsed().as_millis(),
        device_id: beat.device_id,
        status: beat.status.map(|s| s.to_string()),
    })
}
