//! Command dispatch: bridges CLI args -> sync service -> output formatting.

pub mod config_cmd;
pub mod events;
pub mod ping;
pub mod watch;

use std::time::Duration;

use tracing::{debug, warn};

use fleetdash_core::{ConnectionState, SyncService};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    debug!(profile = %resolved.profile, url = %resolved.sync.url, "resolved backend");

    match cmd {
        Command::Watch(args) => watch::handle(resolved, args, global).await,
        Command::Events(args) => events::handle(resolved, args, global).await,
        Command::Ping(args) => ping::handle(resolved, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Start the push link and queue the rooms to join once it opens.
async fn go_live(service: &SyncService, rooms: &[String]) {
    service.connect().await;
    for room in rooms {
        service.connection().join_room(room.clone()).await;
    }
}

/// Profile rooms followed by command-line rooms, without duplicates.
fn merge_rooms(profile: Vec<String>, extra: Vec<String>) -> Vec<String> {
    let mut rooms = profile;
    for room in extra {
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }
    rooms
}

/// Wait until the push session is open.
async fn wait_connected(service: &SyncService, within: Duration) -> Result<(), CliError> {
    let mut changes = service.connection().state_changes();
    match tokio::time::timeout(
        within,
        changes.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) | Err(_) => Err(CliError::PushUnavailable {
            url: service.config().url.to_string(),
            seconds: within.as_secs(),
        }),
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler can't be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
