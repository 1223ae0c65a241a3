// Sensor data endpoints
//
// Both endpoints return readings newest first. The server defaults the
// history limit to 1000 and the latest limit to 100 when none is given.

use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::{SensorDataEntry, SensorDataList, SensorHistoryQuery};

#[derive(Serialize)]
struct LimitQuery {
    limit: u32,
}

impl RestClient {
    /// Filtered reading history.
    ///
    /// `GET /api/v1/sensor-data/history`
    pub async fn sensor_history(
        &self,
        query: &SensorHistoryQuery,
    ) -> Result<Vec<SensorDataEntry>, Error> {
        let url = self.api_url("sensor-data/history")?;
        debug!(?query, "fetching sensor history");
        let list: SensorDataList = self.get_query(url, query).await?;
        Ok(list.data)
    }

    /// The most recent `limit` readings across all nodes.
    ///
    /// `GET /api/v1/sensor-data/latest?limit=`
    pub async fn latest_sensor_data(&self, limit: u32) -> Result<Vec<SensorDataEntry>, Error> {
        let url = self.api_url("sensor-data/latest")?;
        let list: SensorDataList = self.get_query(url, &LimitQuery { limit }).await?;
        Ok(list.data)
    }
}
