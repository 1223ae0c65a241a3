// ── Cache reconciliation ──
//
// A reconciler owns one view's cache and decides how a pushed event
// changes it. Three strategies are in use:
//
// - refetch: the event only says "something changed"; reload the
//   authoritative value in the background (`RefetchCache`)
// - patch: the event carries `(key, status[, timestamp])`; update that
//   entity in place, never insert (`StatusPatch` over `KeyedCollection`)
// - rolling append: the event carries a sample; append it to a bounded
//   window (`RollingCache`)

pub mod patch;
pub mod refetch;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::model::{EventName, PushEvent};
use crate::registry::{EventRegistry, Subscription};

pub use patch::{PatchOn, StatusPatch, apply_status_change};
pub use refetch::{FetchFn, RefetchCache, RefetchOn};

/// Applies pushed events to a view's cache.
///
/// `apply` runs on the dispatch path: it must return quickly and hand any
/// network work to a spawned task.
pub trait Reconciler: Send + Sync + 'static {
    /// Event names to subscribe to.
    fn events(&self) -> Vec<EventName>;

    fn apply(&self, event: &PushEvent);
}

/// Every subscription a mounted reconciler holds. Dropping the mount
/// releases them all.
#[must_use = "dropping a Mount unsubscribes the view"]
#[derive(Debug)]
pub struct Mount {
    subscriptions: Vec<Subscription>,
}

impl Mount {
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Subscribe `reconciler` to each of its events.
pub fn mount<R: Reconciler>(registry: &EventRegistry, reconciler: &Arc<R>) -> Mount {
    let subscriptions = reconciler
        .events()
        .into_iter()
        .map(|name| {
            let reconciler = Arc::clone(reconciler);
            registry.subscribe(name, move |event| reconciler.apply(event))
        })
        .collect();
    Mount { subscriptions }
}

// ── Notices ──────────────────────────────────────────────────────────

/// A transient, user-visible problem (e.g. a failed refetch). The cached
/// value stays as it was; the next successful load clears the notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Utc::now(),
        }
    }
}

pub(crate) type NoticeSender = watch::Sender<Option<Notice>>;
