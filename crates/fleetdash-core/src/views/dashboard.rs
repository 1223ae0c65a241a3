// ── Dashboard stats view ──
//
// Fleet counters, refetched whenever a device changes status or an alert
// is raised, and optionally re-polled on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::api::FleetApi;
use crate::error::CoreError;
use crate::model::{DashboardStats, EventName};
use crate::reconcile::{FetchFn, Mount, Notice, RefetchCache, RefetchOn, mount};
use crate::registry::EventRegistry;
use crate::stream::CacheStream;

const TRIGGERS: [EventName; 2] = [EventName::DeviceStatusChange, EventName::AlertNew];

pub struct DashboardView {
    stats: RefetchCache<DashboardStats>,
    poller: Option<DropGuard>,
    _mount: Mount,
}

impl DashboardView {
    pub fn mount<A: FleetApi>(registry: &EventRegistry, api: Arc<A>) -> Self {
        let fetch: FetchFn<DashboardStats> = Arc::new(move || {
            let api = Arc::clone(&api);
            async move { api.dashboard_stats().await }.boxed()
        });
        let stats = RefetchCache::new("dashboard stats", fetch);
        let mount = mount(registry, &Arc::new(RefetchOn::new(stats.clone(), TRIGGERS)));

        Self {
            stats,
            poller: None,
            _mount: mount,
        }
    }

    /// Re-poll every `period` until the view is dropped or `parent` is
    /// cancelled. A zero period stops polling. Calling again replaces the
    /// previous poller.
    pub fn start_polling(&mut self, period: Duration, parent: &CancellationToken) {
        self.poller = None;
        if period.is_zero() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("no tokio runtime, dashboard polling disabled");
            return;
        };
        let cancel = parent.child_token();
        handle.spawn(poll_task(self.stats.clone(), period, cancel.clone()));
        self.poller = Some(cancel.drop_guard());
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Fetch now and wait for the result.
    pub async fn load(&self) -> Result<(), CoreError> {
        self.stats.refresh().await
    }

    pub fn stats(&self) -> Option<Arc<DashboardStats>> {
        self.stats.get()
    }

    pub fn stream(&self) -> CacheStream<Option<Arc<DashboardStats>>> {
        CacheStream::new(self.stats.subscribe())
    }

    pub fn notice(&self) -> Option<Notice> {
        self.stats.notice()
    }

    pub fn notices(&self) -> CacheStream<Option<Notice>> {
        CacheStream::new(self.stats.notices())
    }

    pub fn cache(&self) -> &RefetchCache<DashboardStats> {
        &self.stats
    }
}

async fn poll_task(stats: RefetchCache<DashboardStats>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    // A refresh slower than the period must not be followed by a burst.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Failures are already published as a notice.
                let _ = stats.refresh().await;
            }
        }
    }
    debug!("dashboard poller stopped");
}
