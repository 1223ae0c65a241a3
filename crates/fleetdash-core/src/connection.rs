// ── Push connection ──
//
// Owns the single push link to the backend. `connect` spawns the link and
// a supervisor task; the supervisor mirrors link status into
// `ConnectionState` and feeds frames to the dispatcher, one at a time.

use std::sync::{Arc, Weak};

use fleetdash_api::{LinkStatus, PushFrame, PushHandle, PushOptions};
use indexmap::IndexSet;
use serde_json::{Value, json};
use strum::Display;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatcher::PushDispatcher;
use crate::registry::EventRegistry;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── PushConnection ───────────────────────────────────────────────

/// The push side of a [`SyncService`](crate::SyncService).
///
/// Cheaply cloneable via `Arc<ConnectionInner>`. At most one link is live
/// at a time; connection failures never surface as errors and are only
/// visible through [`state`](Self::state) and
/// [`state_changes`](Self::state_changes).
#[derive(Clone)]
pub struct PushConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    base_url: Url,
    options: PushOptions,
    registry: EventRegistry,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    /// Child token for the current link, cancelled on disconnect and
    /// replaced on connect.
    cancel_child: Mutex<CancellationToken>,
    link: Mutex<Option<PushHandle>>,
    /// Rooms to (re)join whenever a session opens.
    rooms: Mutex<IndexSet<String>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl PushConnection {
    pub fn new(base_url: Url, options: PushOptions, registry: EventRegistry) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ConnectionInner {
                base_url,
                options,
                registry,
                state,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                link: Mutex::new(None),
                rooms: Mutex::new(IndexSet::new()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Start the push link. A no-op unless currently disconnected.
    ///
    /// Returns once the link task is spawned; the session opens (and the
    /// state reaches `Connected`) asynchronously.
    pub async fn connect(&self) {
        let mut link = self.inner.link.lock().await;
        let current = self.state();
        if current != ConnectionState::Disconnected {
            debug!(state = %current, "connect ignored");
            return;
        }
        // A link that closed on its own leaves a stale handle behind.
        if let Some(stale) = link.take() {
            stale.shutdown();
        }

        self.inner.state.send_replace(ConnectionState::Connecting);

        let cancel = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = cancel.clone();

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let handle = match PushHandle::spawn(
            &self.inner.base_url,
            self.inner.options.clone(),
            frames_tx,
            cancel.clone(),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "push link failed to start");
                self.inner.state.send_replace(ConnectionState::Disconnected);
                return;
            }
        };
        let status = handle.status();
        *link = Some(handle);
        drop(link);

        let dispatcher = PushDispatcher::new(self.inner.registry.clone());
        let task = tokio::spawn(supervise(
            Arc::downgrade(&self.inner),
            dispatcher,
            status,
            frames_rx,
            cancel,
        ));

        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(task);
        info!(url = %self.inner.base_url, "push link spawned");
    }

    /// Stop the push link and drop any frame not yet dispatched.
    /// Idempotent. Remembered rooms are kept for the next `connect`.
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent, which allows reconnect).
        self.inner.cancel_child.lock().await.cancel();

        if let Some(handle) = self.inner.link.lock().await.take() {
            handle.shutdown();
        }

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.set_state(ConnectionState::Disconnected);
        debug!("push link disconnected");
    }

    // ── Outbound intents ─────────────────────────────────────────

    /// Join `room`, now if connected, otherwise as soon as a session opens.
    pub async fn join_room(&self, room: impl Into<String>) {
        let room = room.into();
        if self.state() == ConnectionState::Disconnected {
            debug!(%room, "not connected, join dropped");
            return;
        }
        // The state is read under the rooms lock so a session opening
        // concurrently either sees the room or is already Connected here.
        let mut rooms = self.inner.rooms.lock().await;
        rooms.insert(room.clone());
        if self.state() == ConnectionState::Connected {
            self.emit("join", json!({ "room": room })).await;
        }
    }

    /// Leave `room` and stop rejoining it.
    pub async fn leave_room(&self, room: &str) {
        let mut rooms = self.inner.rooms.lock().await;
        let remembered = rooms.shift_remove(room);
        match self.state() {
            ConnectionState::Disconnected => {
                debug!(%room, remembered, "not connected, leave not sent");
            }
            ConnectionState::Connecting => {}
            ConnectionState::Connected => {
                self.emit("leave", json!({ "room": room })).await;
            }
        }
    }

    /// Ask the server for a fresh heartbeat.
    pub async fn request_update(&self) {
        if self.state() == ConnectionState::Disconnected {
            debug!("not connected, request_update dropped");
            return;
        }
        self.emit("request_update", json!({})).await;
    }

    /// Rooms currently remembered, in join order.
    pub async fn rooms(&self) -> Vec<String> {
        self.inner.rooms.lock().await.iter().cloned().collect()
    }

    async fn emit(&self, event: &str, data: Value) {
        self.inner.emit(event, data).await;
    }
}

impl ConnectionInner {
    async fn emit(&self, event: &str, data: Value) {
        let link = self.link.lock().await;
        let Some(handle) = link.as_ref() else {
            debug!(event, "no live link, emit dropped");
            return;
        };
        if let Err(e) = handle.emit(event, data) {
            warn!(event, error = %e, "emit failed");
        }
    }

    /// Holds the rooms lock across the emits so a concurrent leave lands
    /// after the rejoin, never before it.
    async fn rejoin_rooms(&self) {
        let rooms = self.rooms.lock().await;
        for room in rooms.iter() {
            debug!(%room, "rejoining room");
            self.emit("join", json!({ "room": room })).await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|s| {
            if *s == state {
                return false;
            }
            debug!(from = %s, to = %state, "connection state");
            *s = state;
            true
        });
    }
}

// ── Supervisor task ──────────────────────────────────────────────

/// Mirror link status into the connection state and dispatch frames while
/// a session is open.
async fn supervise(
    inner: Weak<ConnectionInner>,
    mut dispatcher: PushDispatcher,
    mut status: watch::Receiver<LinkStatus>,
    mut frames: mpsc::UnboundedReceiver<PushFrame>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = status.changed() => {
                let Some(inner) = inner.upgrade() else { break };
                if changed.is_err() {
                    inner.set_state(ConnectionState::Disconnected);
                    break;
                }
                let current = status.borrow_and_update().clone();
                match current {
                    LinkStatus::Open { transport } => {
                        info!(%transport, "push session open");
                        dispatcher.bind();
                        inner.set_state(ConnectionState::Connected);
                        inner.rejoin_rooms().await;
                    }
                    LinkStatus::Connecting | LinkStatus::Reconnecting { .. } => {
                        dispatcher.unbind();
                        inner.set_state(ConnectionState::Connecting);
                    }
                    LinkStatus::Closed => {
                        dispatcher.unbind();
                        inner.set_state(ConnectionState::Disconnected);
                        break;
                    }
                }
            }
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                dispatcher.handle_frame(frame);
            }
        }
    }
    debug!("push supervisor stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn connection(url: &str) -> PushConnection {
        PushConnection::new(
            Url::parse(url).unwrap(),
            PushOptions::default(),
            EventRegistry::new(),
        )
    }

    #[tokio::test]
    async fn starts_disconnected_and_disconnect_is_idempotent() {
        let conn = connection("http://127.0.0.1:9");
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        conn.disconnect().await;
        conn.disconnect().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unsupported_scheme_falls_back_to_disconnected() {
        let conn = connection("ftp://fleet.local");
        conn.connect().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn intents_while_disconnected_are_dropped() {
        let conn = connection("http://127.0.0.1:9");
        conn.join_room("site-1").await;
        conn.request_update().await;
        assert!(conn.rooms().await.is_empty());
    }

    #[tokio::test]
    async fn connect_while_connecting_is_a_no_op() {
        let conn = connection("http://127.0.0.1:9");
        let mut changes = conn.state_changes();
        conn.connect().await;
        assert_eq!(*changes.borrow_and_update(), ConnectionState::Connecting);

        conn.join_room("site-1").await;
        conn.connect().await;
        assert_eq!(conn.inner.task_handles.lock().await.len(), 1);
        assert_eq!(conn.rooms().await, vec!["site-1"]);

        conn.disconnect().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.rooms().await, vec!["site-1"]);
    }

    #[tokio::test]
    async fn leave_while_connecting_is_not_rejoined() {
        let conn = connection("http://127.0.0.1:9");
        conn.connect().await;
        conn.join_room("site-1").await;
        conn.join_room("site-2").await;
        conn.leave_room("site-1").await;
        assert_eq!(conn.rooms().await, vec!["site-2"]);

        // The rejoin sweep only ever sees what is still remembered.
        conn.inner.rejoin_rooms().await;
        assert_eq!(conn.rooms().await, vec!["site-2"]);
        conn.disconnect().await;
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
    }
}
