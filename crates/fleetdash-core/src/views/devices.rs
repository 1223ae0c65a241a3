// ── Devices view ──

use std::sync::Arc;

use tokio::sync::watch;

use super::finish_load;
use crate::api::FleetApi;
use crate::error::CoreError;
use crate::model::{Device, DeviceKindFilter, EventName};
use crate::reconcile::{Mount, Notice, NoticeSender, PatchOn, mount};
use crate::registry::EventRegistry;
use crate::store::{KeyedCollection, KeyedSnapshot};
use crate::stream::CacheStream;

/// Device list keyed by `device_id`. Loaded over REST, then kept current
/// by patching status from `device:status_change` events.
pub struct DevicesView<A: FleetApi> {
    api: Arc<A>,
    filter: watch::Sender<DeviceKindFilter>,
    devices: Arc<KeyedCollection<Device>>,
    notice: NoticeSender,
    _mount: Mount,
}

impl<A: FleetApi> DevicesView<A> {
    pub fn mount(registry: &EventRegistry, api: Arc<A>) -> Self {
        let devices = Arc::new(KeyedCollection::new());
        let mount = mount(
            registry,
            &Arc::new(PatchOn::new(
                Arc::clone(&devices),
                EventName::DeviceStatusChange,
            )),
        );
        let (filter, _) = watch::channel(DeviceKindFilter::default());
        let (notice, _) = watch::channel(None);

        Self {
            api,
            filter,
            devices,
            notice,
            _mount: mount,
        }
    }

    /// Replace the list from the backend. Returns the number of devices.
    pub async fn load(&self) -> Result<usize, CoreError> {
        let filter = *self.filter.borrow();
        let result = self.api.devices(filter).await;
        finish_load("devices", &self.devices, &self.notice, result)
    }

    pub fn filter(&self) -> DeviceKindFilter {
        *self.filter.borrow()
    }

    /// Switch the type filter and reload.
    pub async fn set_filter(&self, filter: DeviceKindFilter) -> Result<usize, CoreError> {
        self.filter.send_replace(filter);
        self.load().await
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices.get(device_id)
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.values()
    }

    pub fn stream(&self) -> CacheStream<KeyedSnapshot<Device>> {
        CacheStream::new(self.devices.subscribe())
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }

    pub fn notices(&self) -> CacheStream<Option<Notice>> {
        CacheStream::new(self.notice.subscribe())
    }

    pub fn collection(&self) -> &KeyedCollection<Device> {
        &self.devices
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceKind, DeviceStatus, PushEvent, StatusChange};
    use crate::views::fake::{FakeApi, device};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn fleet() -> Arc<FakeApi> {
        let api = FakeApi::default();
        *api.devices.lock().unwrap() = vec![
            device(1, "G1", DeviceKind::Gateway, DeviceStatus::Online),
            device(2, "N1", DeviceKind::Node, DeviceStatus::Online),
            device(3, "N2", DeviceKind::Node, DeviceStatus::Offline),
        ];
        Arc::new(api)
    }

    fn status_change(key: &str, status: DeviceStatus) -> PushEvent {
        PushEvent::DeviceStatusChange(StatusChange {
            key: key.into(),
            status,
            timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()),
        })
    }

    #[tokio::test]
    async fn status_change_patches_loaded_device() {
        let registry = EventRegistry::new();
        let view = DevicesView::mount(&registry, fleet());
        assert_eq!(view.load().await.unwrap(), 3);
        let mut stream = view.stream();

        registry.dispatch(&status_change("N1", DeviceStatus::Offline));

        let snap = stream.changed().await.unwrap();
        let n1 = snap.get("N1").unwrap();
        assert_eq!(n1.status, DeviceStatus::Offline);
        assert_eq!(n1.name, "N1 name");
        assert!(n1.last_seen.is_some());
        assert_eq!(view.get("G1").unwrap().status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn status_change_for_unknown_device_inserts_nothing() {
        let registry = EventRegistry::new();
        let view = DevicesView::mount(&registry, fleet());
        view.load().await.unwrap();
        let version = view.collection().version();

        registry.dispatch(&status_change("N9", DeviceStatus::Online));

        assert_eq!(view.devices().len(), 3);
        assert!(view.get("N9").is_none());
        assert_eq!(view.collection().version(), version);
    }

    #[tokio::test]
    async fn type_filter_narrows_the_load() {
        let api = fleet();
        let view = DevicesView::mount(&EventRegistry::new(), Arc::clone(&api));

        assert_eq!(view.set_filter(DeviceKindFilter::Node).await.unwrap(), 2);
        assert_eq!(view.collection().keys(), vec!["N1", "N2"]);
        assert_eq!(api.calls(), vec!["devices:node"]);
    }

    #[tokio::test]
    async fn failed_load_keeps_list_and_sets_notice() {
        let api = fleet();
        let view = DevicesView::mount(&EventRegistry::new(), Arc::clone(&api));
        view.load().await.unwrap();

        api.fail.store(true, Ordering::SeqCst);
        assert!(view.load().await.is_err());
        assert_eq!(view.devices().len(), 3);
        assert!(view.notice().unwrap().message.contains("devices"));

        api.fail.store(false, Ordering::SeqCst);
        view.load().await.unwrap();
        assert!(view.notice().is_none());
    }
}
