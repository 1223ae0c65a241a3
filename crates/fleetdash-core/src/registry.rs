// ── Event registry ──
//
// Per-event ordered subscriber lists with synchronous fan-out. Dispatch
// copies the list for one event name before calling anything, so a
// callback may subscribe or unsubscribe (itself included) without
// disturbing the dispatch in progress; the change applies from the next
// dispatch on.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, error, trace};

use crate::model::{EventName, PushEvent};

type Callback = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Identifies one registration. Unique for the lifetime of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Entry {
    id: SubscriptionId,
    callback: Callback,
}

struct RegistryInner {
    subscribers: DashMap<EventName, Vec<Entry>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, name: EventName, id: SubscriptionId) -> bool {
        let Some(mut list) = self.subscribers.get_mut(&name) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| entry.id != id);
        before != list.len()
    }
}

/// Fan-out table from event name to subscriber callbacks.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `callback` for `name`. Callbacks for one name run in the
    /// order they were registered.
    ///
    /// The registration lasts as long as the returned [`Subscription`].
    pub fn subscribe<F>(&self, name: EventName, callback: F) -> Subscription
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.entry(name).or_default().push(Entry {
            id,
            callback: Arc::new(callback),
        });
        debug!(event = %name, subscription = %id, "subscribed");

        Subscription {
            registry: Arc::downgrade(&self.inner),
            name,
            id,
        }
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, name: EventName, id: SubscriptionId) -> bool {
        let removed = self.inner.remove(name, id);
        if removed {
            debug!(event = %name, subscription = %id, "unsubscribed");
        }
        removed
    }

    /// Invoke every callback registered for the event's name, in
    /// registration order, on the calling task. A panicking callback is
    /// logged and skipped; the rest still run.
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &PushEvent) -> usize {
        let name = event.name();
        let snapshot: Vec<(SubscriptionId, Callback)> = match self.inner.subscribers.get(&name) {
            Some(list) => list
                .iter()
                .map(|entry| (entry.id, Arc::clone(&entry.callback)))
                .collect(),
            None => return 0,
        };

        trace!(event = %name, subscribers = snapshot.len(), "dispatching");
        for (id, callback) in &snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                error!(
                    event = %name,
                    subscription = %id,
                    panic = panic_message(panic.as_ref()),
                    "subscriber panicked"
                );
            }
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.inner.subscribers.get(&name).map_or(0, |list| list.len())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

// ── Subscription guard ───────────────────────────────────────────────

/// A live registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    name: EventName,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn name(&self) -> EventName {
        self.name
    }

    /// Unsubscribe now. Same as dropping, but reads better at call sites.
    pub fn cancel(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            if inner.remove(self.name, self.id) {
                debug!(event = %self.name, subscription = %self.id, "subscription released");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceStatus, StatusChange};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn status_change(key: &str, status: DeviceStatus) -> PushEvent {
        PushEvent::DeviceStatusChange(StatusChange {
            key: key.into(),
            status,
            timestamp: None,
        })
    }

    #[test]
    fn fan_out_reaches_every_subscriber_in_order() {
        let registry = EventRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|i| {
                let calls = Arc::clone(&calls);
                registry.subscribe(EventName::DeviceStatusChange, move |_| {
                    calls.lock().unwrap().push(i);
                })
            })
            .collect();

        let invoked = registry.dispatch(&status_change("N1", DeviceStatus::Offline));
        assert_eq!(invoked, 3);
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn both_subscribers_see_the_exact_payload_once() {
        let registry = EventRegistry::new();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let seen = Arc::clone(&seen_a);
            registry.subscribe(EventName::DeviceStatusChange, move |e| {
                seen.lock().unwrap().push(e.clone());
            })
        };
        let b = {
            let seen = Arc::clone(&seen_b);
            registry.subscribe(EventName::DeviceStatusChange, move |e| {
                seen.lock().unwrap().push(e.clone());
            })
        };

        let event = status_change("N1", DeviceStatus::Offline);
        registry.dispatch(&event);

        assert_eq!(*seen_a.lock().unwrap(), vec![event.clone()]);
        assert_eq!(*seen_b.lock().unwrap(), vec![event]);
        drop((a, b));
    }

    #[test]
    fn other_event_names_are_not_invoked() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = registry.subscribe(EventName::GatewayStatus, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.dispatch(&status_change("N1", DeviceStatus::Online)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribed_callback_is_never_invoked_again() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let kept_hits = Arc::new(AtomicUsize::new(0));

        let dropped = {
            let hits = Arc::clone(&hits);
            registry.subscribe(EventName::DeviceStatusChange, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _kept = {
            let hits = Arc::clone(&kept_hits);
            registry.subscribe(EventName::DeviceStatusChange, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(registry.unsubscribe(EventName::DeviceStatusChange, dropped.id()));
        assert!(!registry.unsubscribe(EventName::DeviceStatusChange, dropped.id()));
        drop(dropped);

        registry.dispatch(&status_change("N1", DeviceStatus::Offline));
        registry.dispatch(&status_change("N1", DeviceStatus::Online));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(kept_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let registry = EventRegistry::new();
        let sub = registry.subscribe(EventName::AlertNew, |_| {});
        assert_eq!(registry.subscriber_count(EventName::AlertNew), 1);
        sub.cancel();
        assert_eq!(registry.subscriber_count(EventName::AlertNew), 0);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_the_rest() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = registry.subscribe(EventName::DeviceStatusChange, |_| {
            panic!("view torn down mid-update");
        });
        let _good = {
            let hits = Arc::clone(&hits);
            registry.subscribe(EventName::DeviceStatusChange, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(registry.dispatch(&status_change("N1", DeviceStatus::Offline)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribing_from_a_callback_applies_to_the_next_dispatch() {
        let registry = EventRegistry::new();
        let late_hits = Arc::new(AtomicUsize::new(0));
        let parked: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let _spawner = {
            let registry = registry.clone();
            let parked = Arc::clone(&parked);
            let late_hits = Arc::clone(&late_hits);
            registry.clone().subscribe(EventName::DeviceStatusChange, move |_| {
                let late_hits = Arc::clone(&late_hits);
                let sub = registry.subscribe(EventName::DeviceStatusChange, move |_| {
                    late_hits.fetch_add(1, Ordering::SeqCst);
                });
                parked.lock().unwrap().push(sub);
            })
        };

        assert_eq!(registry.dispatch(&status_change("N1", DeviceStatus::Offline)), 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        assert_eq!(registry.dispatch(&status_change("N1", DeviceStatus::Online)), 2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_outliving_registry_is_harmless() {
        let registry = EventRegistry::new();
        let sub = registry.subscribe(EventName::SensorData, |_| {});
        drop(registry);
        drop(sub);
    }
}
