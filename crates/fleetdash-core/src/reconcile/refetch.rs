// ── Refetch strategy ──
//
// The cached value is whatever the last completed fetch returned. Events
// only trigger a fetch; they never carry data into the cache. Fetches are
// spawned, so the dispatch path never waits on the network, and they are
// not cancelled or ordered: when two overlap, the one that finishes last
// wins even if it started first.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Notice, NoticeSender, Reconciler};
use crate::error::CoreError;
use crate::model::{EventName, PushEvent};

/// Produces a fresh authoritative value.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

/// A value that is reloaded wholesale whenever it is triggered.
///
/// Cheap to clone; clones share the same value.
pub struct RefetchCache<T: Send + Sync + 'static> {
    inner: Arc<RefetchInner<T>>,
}

impl<T: Send + Sync + 'static> Clone for RefetchCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RefetchInner<T> {
    label: &'static str,
    fetch: FetchFn<T>,
    value: watch::Sender<Option<Arc<T>>>,
    notice: NoticeSender,
    in_flight: AtomicUsize,
    completed: AtomicU64,
}

impl<T: Send + Sync + 'static> RefetchInner<T> {
    async fn run(&self) -> Result<(), CoreError> {
        let result = (self.fetch)().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(value) => {
                self.value.send_replace(Some(Arc::new(value)));
                self.notice.send_if_modified(|n| n.take().is_some());
                debug!(cache = self.label, "refetch applied");
                Ok(())
            }
            Err(e) => {
                warn!(cache = self.label, error = %e, "refetch failed, keeping cached value");
                self.notice
                    .send_replace(Some(Notice::new(format!("Failed to refresh {}: {e}", self.label))));
                Err(e)
            }
        }
    }
}

impl<T: Send + Sync + 'static> RefetchCache<T> {
    /// `label` names the cache in logs and notices.
    pub fn new(label: &'static str, fetch: FetchFn<T>) -> Self {
        let (value, _) = watch::channel(None);
        let (notice, _) = watch::channel(None);
        Self {
            inner: Arc::new(RefetchInner {
                label,
                fetch,
                value,
                notice,
                in_flight: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
            }),
        }
    }

    /// Fetch now and wait for the result (initial load, explicit reload).
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner.run().await
    }

    /// Start a fetch in the background and return immediately.
    pub fn trigger(&self) {
        let Ok(handle) = Handle::try_current() else {
            warn!(cache = self.inner.label, "no tokio runtime, refetch skipped");
            return;
        };
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            let _ = inner.run().await;
        });
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.inner.value.subscribe()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.inner.notice.borrow().clone()
    }

    pub fn notices(&self) -> watch::Receiver<Option<Notice>> {
        self.inner.notice.subscribe()
    }

    /// Fetches started but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Fetches finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::SeqCst)
    }
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Triggers a refetch of `cache` whenever one of `events` arrives. The
/// payload is not inspected.
pub struct RefetchOn<T: Send + Sync + 'static> {
    cache: RefetchCache<T>,
    events: Vec<EventName>,
}

impl<T: Send + Sync + 'static> RefetchOn<T> {
    pub fn new(cache: RefetchCache<T>, events: impl Into<Vec<EventName>>) -> Self {
        Self {
            cache,
            events: events.into(),
        }
    }
}

impl<T: Send + Sync + 'static> Reconciler for RefetchOn<T> {
    fn events(&self) -> Vec<EventName> {
        self.events.clone()
    }

    fn apply(&self, event: &PushEvent) {
        debug!(cache = self.cache.inner.label, event = %event.name(), "refetch triggered");
        self.cache.trigger();
    }
}
