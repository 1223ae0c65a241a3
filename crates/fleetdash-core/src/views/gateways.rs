// ── Gateways view ──

use std::sync::Arc;

use tokio::sync::watch;

use super::finish_load;
use crate::api::FleetApi;
use crate::error::CoreError;
use crate::model::{EventName, Gateway};
use crate::reconcile::{Mount, Notice, NoticeSender, PatchOn, mount};
use crate::registry::EventRegistry;
use crate::store::{KeyedCollection, KeyedSnapshot};
use crate::stream::CacheStream;

/// IoT gateways keyed by `gateway_id`, patched from `gateway_status`.
pub struct GatewaysView<A: FleetApi> {
    api: Arc<A>,
    gateways: Arc<KeyedCollection<Gateway>>,
    notice: NoticeSender,
    _mount: Mount,
}

impl<A: FleetApi> GatewaysView<A> {
    pub fn mount(registry: &EventRegistry, api: Arc<A>) -> Self {
        let gateways = Arc::new(KeyedCollection::new());
        let mount = mount(
            registry,
            &Arc::new(PatchOn::new(Arc::clone(&gateways), EventName::GatewayStatus)),
        );
        let (notice, _) = watch::channel(None);

        Self {
            api,
            gateways,
            notice,
            _mount: mount,
        }
    }

    pub async fn load(&self) -> Result<usize, CoreError> {
        let result = self.api.gateways().await;
        finish_load("gateways", &self.gateways, &self.notice, result)
    }

    pub fn get(&self, gateway_id: &str) -> Option<Arc<Gateway>> {
        self.gateways.get(gateway_id)
    }

    pub fn gateways(&self) -> Vec<Arc<Gateway>> {
        self.gateways.values()
    }

    pub fn stream(&self) -> CacheStream<KeyedSnapshot<Gateway>> {
        CacheStream::new(self.gateways.subscribe())
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }

    pub fn notices(&self) -> CacheStream<Option<Notice>> {
        CacheStream::new(self.notice.subscribe())
    }

    pub fn collection(&self) -> &KeyedCollection<Gateway> {
        &self.gateways
    }
}
