// ── Patch strategy ──

use std::sync::Arc;

use tracing::{debug, trace};

use super::Reconciler;
use crate::model::{Device, EventName, Gateway, PushEvent, StatusChange};
use crate::store::{Keyed, KeyedCollection};

/// Entities that accept a pushed status change.
///
/// Only the fields the payload names are written: the status, and
/// `last_seen` when the event carries a timestamp.
pub trait StatusPatch: Keyed + Clone + Send + Sync + 'static {
    fn apply_status(&mut self, change: &StatusChange);
}

impl StatusPatch for Device {
    fn apply_status(&mut self, change: &StatusChange) {
        self.status = change.status;
        if let Some(ts) = change.timestamp {
            self.last_seen = Some(ts);
        }
    }
}

impl StatusPatch for Gateway {
    fn apply_status(&mut self, change: &StatusChange) {
        self.status = change.status;
        if let Some(ts) = change.timestamp {
            self.last_seen = Some(ts);
        }
    }
}

/// Apply `change` to the matching entity. Unknown keys are ignored.
pub fn apply_status_change<T: StatusPatch>(
    collection: &KeyedCollection<T>,
    change: &StatusChange,
) -> bool {
    if change.key.trim().is_empty() {
        debug!("ignoring status change with an empty key");
        return false;
    }
    let patched = collection.patch(&change.key, |entity| entity.apply_status(change));
    if patched {
        trace!(key = %change.key, status = %change.status, "patched cached entity");
    } else {
        debug!(key = %change.key, "status change for uncached key ignored");
    }
    patched
}

/// Patches `collection` from one status-change event.
pub struct PatchOn<T: StatusPatch> {
    collection: Arc<KeyedCollection<T>>,
    event: EventName,
}

impl<T: StatusPatch> PatchOn<T> {
    pub fn new(collection: Arc<KeyedCollection<T>>, event: EventName) -> Self {
        Self { collection, event }
    }
}

impl<T: StatusPatch> Reconciler for PatchOn<T> {
    fn events(&self) -> Vec<EventName> {
        vec![self.event]
    }

    fn apply(&self, event: &PushEvent) {
        match event {
            PushEvent::DeviceStatusChange(change) | PushEvent::GatewayStatus(change) => {
                apply_status_change(&self.collection, change);
            }
            other => trace!(event = %other.name(), "not a status change"),
        }
    }
}
