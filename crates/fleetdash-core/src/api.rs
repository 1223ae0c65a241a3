// ── REST collaborator seam ──
//
// The views only need a handful of reads plus the alert mutations. They
// take any `FleetApi`; production wires in `fleetdash_api::RestClient`,
// tests wire in an in-memory fake.

use std::future::Future;

use fleetdash_api::{AlertQuery, DeviceQuery, GatewayQuery, RestClient, SensorHistoryQuery};

use crate::error::CoreError;
use crate::model::{
    Alert, AlertFilter, DashboardStats, Device, DeviceKindFilter, Gateway, SensorQuery,
    SensorReading,
};

/// Backend reads and writes the views depend on.
pub trait FleetApi: Send + Sync + 'static {
    fn dashboard_stats(&self) -> impl Future<Output = Result<DashboardStats, CoreError>> + Send;

    fn devices(
        &self,
        filter: DeviceKindFilter,
    ) -> impl Future<Output = Result<Vec<Device>, CoreError>> + Send;

    fn gateways(&self) -> impl Future<Output = Result<Vec<Gateway>, CoreError>> + Send;

    fn alerts(
        &self,
        filter: AlertFilter,
    ) -> impl Future<Output = Result<Vec<Alert>, CoreError>> + Send;

    fn acknowledge_alert(&self, id: i64)
    -> impl Future<Output = Result<Alert, CoreError>> + Send;

    fn resolve_alert(&self, id: i64) -> impl Future<Output = Result<Alert, CoreError>> + Send;

    fn sensor_history(
        &self,
        query: &SensorQuery,
    ) -> impl Future<Output = Result<Vec<SensorReading>, CoreError>> + Send;
}

impl FleetApi for RestClient {
    async fn dashboard_stats(&self) -> Result<DashboardStats, CoreError> {
        Ok(RestClient::dashboard_stats(self).await?.into())
    }

    async fn devices(&self, filter: DeviceKindFilter) -> Result<Vec<Device>, CoreError> {
        let query = DeviceQuery {
            device_type: filter.as_query().map(str::to_owned),
            status: None,
        };
        let entries = self.list_devices(&query).await?;
        Ok(entries.into_iter().map(Device::from).collect())
    }

    async fn gateways(&self) -> Result<Vec<Gateway>, CoreError> {
        let entries = self.list_gateways(&GatewayQuery::default()).await?;
        Ok(entries.into_iter().map(Gateway::from).collect())
    }

    async fn alerts(&self, filter: AlertFilter) -> Result<Vec<Alert>, CoreError> {
        let query = AlertQuery {
            status: filter.as_query().map(str::to_owned),
            severity: None,
        };
        let entries = self.list_alerts(&query).await?;
        Ok(entries.into_iter().map(Alert::from).collect())
    }

    async fn acknowledge_alert(&self, id: i64) -> Result<Alert, CoreError> {
        Ok(RestClient::acknowledge_alert(self, id).await?.into())
    }

    async fn resolve_alert(&self, id: i64) -> Result<Alert, CoreError> {
        Ok(RestClient::resolve_alert(self, id).await?.into())
    }

    async fn sensor_history(&self, query: &SensorQuery) -> Result<Vec<SensorReading>, CoreError> {
        let entries = RestClient::sensor_history(self, &SensorHistoryQuery::from(query)).await?;
        Ok(entries.into_iter().map(SensorReading::from).collect())
    }
}
