use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::DashboardStatsEntry;

impl RestClient {
    /// Fleet-wide counters for the dashboard header.
    ///
    /// `GET /api/v1/stats/dashboard`
    pub async fn dashboard_stats(&self) -> Result<DashboardStatsEntry, Error> {
        let url = self.api_url("stats/dashboard")?;
        self.get(url).await
    }
}
