// ── Push dispatcher ──
//
// Translates transport frames into typed events and hands them to the
// registry. One frame is fully dispatched before the next is looked at;
// the connection supervisor is the only caller.

use std::collections::HashSet;
use std::str::FromStr;

use fleetdash_api::PushFrame;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::model::{EventName, PushEvent};
use crate::registry::EventRegistry;

/// Binds inbound frames to an [`EventRegistry`].
///
/// Frames are only dispatched while bound, which the connection does when
/// the link reports an open session.
pub struct PushDispatcher {
    registry: EventRegistry,
    bound: HashSet<EventName>,
}

impl PushDispatcher {
    pub fn new(registry: EventRegistry) -> Self {
        Self {
            registry,
            bound: HashSet::new(),
        }
    }

    /// Bind the full event catalog.
    pub fn bind(&mut self) {
        if self.bound.is_empty() {
            self.bound.extend(EventName::iter());
            debug!(events = self.bound.len(), "push dispatcher bound");
        }
    }

    pub fn unbind(&mut self) {
        if !self.bound.is_empty() {
            self.bound.clear();
            debug!("push dispatcher unbound");
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.bound.is_empty()
    }

    /// Decode one frame and dispatch it. Returns the number of subscribers
    /// invoked, or `None` when the frame was dropped.
    pub fn handle_frame(&self, frame: PushFrame) -> Option<usize> {
        let Ok(name) = EventName::from_str(&frame.event) else {
            debug!(event = %frame.event, "dropping event outside the catalog");
            return None;
        };
        if !self.bound.contains(&name) {
            debug!(event = %name, "dropping event while unbound");
            return None;
        }

        let event = match PushEvent::decode(name, frame.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(event = %name, error = %e, "skipping malformed push payload");
                return None;
            }
        };

        if let PushEvent::ConnectionResponse(greeting) = &event {
            info!(
                status = greeting.status.as_deref().unwrap_or_default(),
                message = greeting.message.as_deref().unwrap_or_default(),
                "server greeting"
            );
        }

        Some(self.registry.dispatch(&event))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(event: &str, payload: serde_json::Value) -> PushFrame {
        PushFrame {
            event: event.into(),
            payload,
        }
    }

    fn counting(registry: &EventRegistry, name: EventName) -> (crate::Subscription, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = registry.subscribe(name, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (sub, hits)
    }

    #[test]
    fn frames_are_dropped_until_bound() {
        let registry = EventRegistry::new();
        let (_sub, hits) = counting(&registry, EventName::DeviceStatusChange);
        let mut dispatcher = PushDispatcher::new(registry);

        let change = json!({"device_id": "N1", "status": "offline"});
        assert_eq!(dispatcher.handle_frame(frame("device:status_change", change.clone())), None);

        dispatcher.bind();
        assert_eq!(dispatcher.handle_frame(frame("device:status_change", change.clone())), Some(1));

        dispatcher.unbind();
        assert_eq!(dispatcher.handle_frame(frame("device:status_change", change)), None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_and_malformed_frames_are_skipped() {
        let registry = EventRegistry::new();
        let (_sub, hits) = counting(&registry, EventName::GatewayStatus);
        let mut dispatcher = PushDispatcher::new(registry);
        dispatcher.bind();

        assert_eq!(dispatcher.handle_frame(frame("firmware:progress", json!({}))), None);
        assert_eq!(dispatcher.handle_frame(frame("gateway_status", json!({"status": "online"}))), None);
        assert_eq!(
            dispatcher.handle_frame(frame("gateway_status", json!({"gateway_id": "GW-01", "status": "rebooting"}))),
            None
        );
        assert_eq!(
            dispatcher.handle_frame(frame("gateway_status", json!({"gateway_id": "GW-01", "status": "online"}))),
            Some(1)
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn identical_frames_are_not_deduplicated() {
        let registry = EventRegistry::new();
        let (_sub, hits) = counting(&registry, EventName::AlertNew);
        let mut dispatcher = PushDispatcher::new(registry);
        dispatcher.bind();

        for _ in 0..3 {
            dispatcher.handle_frame(frame("alert:new", json!({"id": 1})));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
