// ── Dashboard views ──
//
// One type per screen. A view owns its cache, mounts its reconciler on
// the registry, and hands out `CacheStream`s for rendering. Dropping the
// view drops its `Mount`, which unsubscribes it.

pub mod alerts;
pub mod dashboard;
pub mod devices;
pub mod gateways;
pub mod sensor_data;

pub use alerts::AlertsView;
pub use dashboard::DashboardView;
pub use devices::DevicesView;
pub use gateways::GatewaysView;
pub use sensor_data::SensorDataView;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::reconcile::{Notice, NoticeSender};
use crate::store::{Keyed, KeyedCollection};

/// Install a list load into `collection`, recording the outcome in
/// `notice`. A failed load leaves the collection as it was.
pub(crate) fn finish_load<T: Keyed + Clone + Send + Sync + 'static>(
    label: &str,
    collection: &KeyedCollection<T>,
    notice: &NoticeSender,
    result: Result<Vec<T>, CoreError>,
) -> Result<usize, CoreError> {
    match result {
        Ok(items) => {
            let count = collection.replace_all(items);
            notice.send_if_modified(|n| n.take().is_some());
            debug!(view = label, count, "list loaded");
            Ok(count)
        }
        Err(e) => {
            warn!(view = label, error = %e, "list load failed, keeping cached entries");
            notice.send_replace(Some(Notice::new(format!("Failed to load {label}: {e}"))));
            Err(e)
        }
    }
}

// ── Test double ──────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::api::FleetApi;
    use crate::error::CoreError;
    use crate::model::{
        Alert, AlertFilter, AlertSeverity, AlertStatus, DashboardStats, Device, DeviceKind,
        DeviceKindFilter, DeviceStatus, Gateway, SensorQuery, SensorReading,
    };

    /// In-memory backend. Every read returns the current contents; `fail`
    /// turns every call into a 503.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub(crate) stats: Mutex<DashboardStats>,
        pub(crate) devices: Mutex<Vec<Device>>,
        pub(crate) gateways: Mutex<Vec<Gateway>>,
        pub(crate) alerts: Mutex<Vec<Alert>>,
        pub(crate) history: Mutex<Vec<SensorReading>>,
        pub(crate) fail: AtomicBool,
        pub(crate) stats_calls: AtomicUsize,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn record(&self, call: String) -> Result<(), CoreError> {
            self.calls.lock().unwrap().push(call);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::Api {
                    message: "service unavailable".into(),
                    status: Some(503),
                });
            }
            Ok(())
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FleetApi for FakeApi {
        async fn dashboard_stats(&self) -> Result<DashboardStats, CoreError> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            self.record("stats".into())?;
            Ok(self.stats.lock().unwrap().clone())
        }

        async fn devices(&self, filter: DeviceKindFilter) -> Result<Vec<Device>, CoreError> {
            self.record(format!("devices:{}", filter.as_query().unwrap_or("all")))?;
            let all = self.devices.lock().unwrap().clone();
            Ok(all
                .into_iter()
                .filter(|d| match filter {
                    DeviceKindFilter::All => true,
                    DeviceKindFilter::Gateway => d.kind == DeviceKind::Gateway,
                    DeviceKindFilter::Node => d.kind == DeviceKind::Node,
                })
                .collect())
        }

        async fn gateways(&self) -> Result<Vec<Gateway>, CoreError> {
            self.record("gateways".into())?;
            Ok(self.gateways.lock().unwrap().clone())
        }

        async fn alerts(&self, filter: AlertFilter) -> Result<Vec<Alert>, CoreError> {
            self.record(format!("alerts:{}", filter.as_query().unwrap_or("all")))?;
            let all = self.alerts.lock().unwrap().clone();
            Ok(all
                .into_iter()
                .filter(|a| match filter {
                    AlertFilter::All => true,
                    AlertFilter::Active => a.status == AlertStatus::Active,
                    AlertFilter::Resolved => a.status == AlertStatus::Resolved,
                })
                .collect())
        }

        async fn acknowledge_alert(&self, id: i64) -> Result<Alert, CoreError> {
            self.record(format!("ack:{id}"))?;
            self.set_alert_status(id, AlertStatus::Acknowledged)
        }

        async fn resolve_alert(&self, id: i64) -> Result<Alert, CoreError> {
            self.record(format!("resolve:{id}"))?;
            self.set_alert_status(id, AlertStatus::Resolved)
        }

        async fn sensor_history(&self, query: &SensorQuery) -> Result<Vec<SensorReading>, CoreError> {
            self.record(format!("history:{}", query.limit.unwrap_or(0)))?;
            let limit = query.limit.map_or(usize::MAX, |l| l as usize);
            Ok(self.history.lock().unwrap().iter().take(limit).cloned().collect())
        }
    }

    impl FakeApi {
        fn set_alert_status(&self, id: i64, status: AlertStatus) -> Result<Alert, CoreError> {
            let mut alerts = self.alerts.lock().unwrap();
            let alert = alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| CoreError::NotFound {
                    entity_type: "alert".into(),
                    identifier: id.to_string(),
                })?;
            alert.status = status;
            Ok(alert.clone())
        }
    }

    pub(crate) fn device(id: i64, device_id: &str, kind: DeviceKind, status: DeviceStatus) -> Device {
        Device {
            id,
            device_id: device_id.into(),
            name: format!("{device_id} name"),
            kind,
            mac_address: None,
            gateway_id: None,
            status,
            firmware_version: None,
            last_seen: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub(crate) fn alert(id: i64, severity: AlertSeverity, status: AlertStatus) -> Alert {
        Alert {
            id,
            device_id: Some(1),
            alert_type: "threshold".into(),
            severity,
            message: format!("alert {id}"),
            status,
            created_at: None,
            resolved_at: None,
        }
    }
}
