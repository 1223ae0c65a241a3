// ── Alerts view ──
//
// The alert list under the current status filter. A new alert refetches
// the list; acknowledging or resolving one goes through the API and then
// refetches.

use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::FleetApi;
use crate::error::CoreError;
use crate::model::{Alert, AlertFilter, EventName};
use crate::reconcile::{FetchFn, Mount, Notice, RefetchCache, RefetchOn, mount};
use crate::registry::EventRegistry;
use crate::stream::CacheStream;

pub struct AlertsView<A: FleetApi> {
    api: Arc<A>,
    filter: Arc<watch::Sender<AlertFilter>>,
    alerts: RefetchCache<Vec<Alert>>,
    _mount: Mount,
}

impl<A: FleetApi> AlertsView<A> {
    /// Mount with the default filter (active alerts).
    pub fn mount(registry: &EventRegistry, api: Arc<A>) -> Self {
        let (filter, _) = watch::channel(AlertFilter::default());
        let filter = Arc::new(filter);

        let fetch: FetchFn<Vec<Alert>> = {
            let api = Arc::clone(&api);
            let filter = Arc::clone(&filter);
            Arc::new(move || {
                let api = Arc::clone(&api);
                let current = *filter.borrow();
                async move { api.alerts(current).await }.boxed()
            })
        };
        let alerts = RefetchCache::new("alerts", fetch);
        let mount = mount(
            registry,
            &Arc::new(RefetchOn::new(alerts.clone(), [EventName::AlertNew])),
        );

        Self {
            api,
            filter,
            alerts,
            _mount: mount,
        }
    }

    pub async fn load(&self) -> Result<(), CoreError> {
        self.alerts.refresh().await
    }

    pub fn filter(&self) -> AlertFilter {
        *self.filter.borrow()
    }

    /// Switch the status filter and reload.
    pub async fn set_filter(&self, filter: AlertFilter) -> Result<(), CoreError> {
        self.filter.send_replace(filter);
        debug!(%filter, "alert filter changed");
        self.alerts.refresh().await
    }

    pub async fn acknowledge(&self, id: i64) -> Result<Alert, CoreError> {
        let alert = self.api.acknowledge_alert(id).await?;
        info!(alert_id = id, "alert acknowledged");
        // A failed reload is reported through the notice channel.
        let _ = self.alerts.refresh().await;
        Ok(alert)
    }

    pub async fn resolve(&self, id: i64) -> Result<Alert, CoreError> {
        let alert = self.api.resolve_alert(id).await?;
        info!(alert_id = id, "alert resolved");
        let _ = self.alerts.refresh().await;
        Ok(alert)
    }

    pub fn alerts(&self) -> Option<Arc<Vec<Alert>>> {
        self.alerts.get()
    }

    pub fn stream(&self) -> CacheStream<Option<Arc<Vec<Alert>>>> {
        CacheStream::new(self.alerts.subscribe())
    }

    pub fn notice(&self) -> Option<Notice> {
        self.alerts.notice()
    }

    pub fn notices(&self) -> CacheStream<Option<Notice>> {
        CacheStream::new(self.alerts.notices())
    }

    pub fn cache(&self) -> &RefetchCache<Vec<Alert>> {
        &self.alerts
    }
}
