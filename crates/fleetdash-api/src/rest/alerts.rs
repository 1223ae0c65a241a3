// Alert endpoints
//
// Listing and detail, plus the two state transitions an operator can
// trigger: acknowledge (active → acknowledged) and resolve (→ resolved,
// stamps `resolved_at`). Both return the updated alert.

use tracing::debug;

use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::{AlertEntry, AlertList, AlertQuery};

impl RestClient {
    /// List alerts, newest first.
    ///
    /// `GET /api/v1/alerts?status=&severity=`
    pub async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<AlertEntry>, Error> {
        let url = self.api_url("alerts")?;
        debug!(?query, "listing alerts");
        let list: AlertList = self.get_query(url, query).await?;
        Ok(list.alerts)
    }

    /// `GET /api/v1/alerts/{id}`
    pub async fn get_alert(&self, id: i64) -> Result<AlertEntry, Error> {
        let url = self.api_url(&format!("alerts/{id}"))?;
        self.get(url).await
    }

    /// Acknowledge an alert.
    ///
    /// `POST /api/v1/alerts/{id}/acknowledge`
    pub async fn acknowledge_alert(&self, id: i64) -> Result<AlertEntry, Error> {
        let url = self.api_url(&format!("alerts/{id}/acknowledge"))?;
        debug!(id, "acknowledging alert");
        self.post(url).await
    }

    /// Resolve an alert.
    ///
    /// `POST /api/v1/alerts/{id}/resolve`
    pub async fn resolve_alert(&self, id: i64) -> Result<AlertEntry, Error> {
        let url = self.api_url(&format!("alerts/{id}/resolve"))?;
        debug!(id, "resolving alert");
        self.post(url).await
    }
}
