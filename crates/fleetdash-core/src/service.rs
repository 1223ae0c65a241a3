// ── Sync service ──
//
// Wires one backend's REST client, event registry and push connection
// together, and mounts views on them.

use std::sync::Arc;

use fleetdash_api::{Anonymous, CredentialProvider, RestClient, StaticToken};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SyncConfig;
use crate::connection::{ConnectionState, PushConnection};
use crate::error::CoreError;
use crate::registry::EventRegistry;
use crate::views::{AlertsView, DashboardView, DevicesView, GatewaysView, SensorDataView};

/// Entry point for consumers: one instance per backend.
///
/// Views mounted from the service share its registry, so every view sees
/// every pushed event once the connection is up.
pub struct SyncService {
    config: SyncConfig,
    api: Arc<RestClient>,
    registry: EventRegistry,
    connection: PushConnection,
    cancel: CancellationToken,
}

impl SyncService {
    /// Build a service whose REST calls use the configured token, if any.
    pub fn new(config: SyncConfig) -> Result<Self, CoreError> {
        let credentials: Arc<dyn CredentialProvider> = match &config.token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(Anonymous),
        };
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(
        config: SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, CoreError> {
        let api = RestClient::new(config.url.clone(), &config.transport(), credentials)?;
        let registry = EventRegistry::new();
        let connection =
            PushConnection::new(config.url.clone(), config.push_options(), registry.clone());
        debug!(url = %config.url, "sync service created");

        Ok(Self {
            config,
            api: Arc::new(api),
            registry,
            connection,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<RestClient> {
        &self.api
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn connection(&self) -> &PushConnection {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub async fn connect(&self) {
        self.connection.connect().await;
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Disconnect and stop every background task the service started.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.connection.disconnect().await;
    }

    // ── Views ────────────────────────────────────────────────────

    /// Dashboard stats, re-polled at the configured interval.
    pub fn dashboard(&self) -> DashboardView {
        let mut view = DashboardView::mount(&self.registry, Arc::clone(&self.api));
        view.start_polling(self.config.views.dashboard_poll_interval, &self.cancel);
        view
    }

    pub fn alerts(&self) -> AlertsView<RestClient> {
        AlertsView::mount(&self.registry, Arc::clone(&self.api))
    }

    pub fn devices(&self) -> DevicesView<RestClient> {
        DevicesView::mount(&self.registry, Arc::clone(&self.api))
    }

    pub fn gateways(&self) -> GatewaysView<RestClient> {
        GatewaysView::mount(&self.registry, Arc::clone(&self.api))
    }

    pub fn sensor_data(&self) -> SensorDataView<RestClient> {
        SensorDataView::mount(&self.registry, Arc::clone(&self.api), &self.config.views)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::EventName;
    use url::Url;

    #[tokio::test]
    async fn views_share_the_service_registry() {
        let service = SyncService::new(SyncConfig::new(Url::parse("http://127.0.0.1:9").unwrap())).unwrap();

        let devices = service.devices();
        let dashboard = service.dashboard();
        assert!(dashboard.is_polling());
        assert_eq!(service.registry().subscriber_count(EventName::DeviceStatusChange), 2);

        drop(devices);
        drop(dashboard);
        assert_eq!(service.registry().subscriber_count(EventName::DeviceStatusChange), 0);
        service.shutdown().await;
        assert_eq!(service.state(), ConnectionState::Disconnected);
    }
}
