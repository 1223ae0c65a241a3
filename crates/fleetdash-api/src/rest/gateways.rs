// IoT gateway endpoints

use tracing::debug;

use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::{GatewayEntry, GatewayList, GatewayQuery};

impl RestClient {
    /// List gateways, optionally filtered by site or status.
    ///
    /// `GET /api/v1/iot/gateways?site_id=&status=`
    pub async fn list_gateways(&self, query: &GatewayQuery) -> Result<Vec<GatewayEntry>, Error> {
        let url = self.api_url("iot/gateways")?;
        debug!(?query, "listing gateways");
        let list: GatewayList = self.get_query(url, query).await?;
        Ok(list.gateways)
    }

    /// `GET /api/v1/iot/gateways/{id}`
    pub async fn get_gateway(&self, id: &str) -> Result<GatewayEntry, Error> {
        let url = self.api_url(&format!("iot/gateways/{id}"))?;
        self.get(url).await
    }
}
