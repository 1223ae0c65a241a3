// Device endpoints
//
// Read-only access to the device table: the list (filterable by type and
// status) and single-device detail.

use tracing::debug;

use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::{DeviceEntry, DeviceList, DeviceQuery};

impl RestClient {
    /// List devices, optionally filtered.
    ///
    /// `GET /api/v1/devices?type=&status=`
    pub async fn list_devices(&self, query: &DeviceQuery) -> Result<Vec<DeviceEntry>, Error> {
        let url = self.api_url("devices")?;
        debug!(?query, "listing devices");
        let list: DeviceList = self.get_query(url, query).await?;
        Ok(list.devices)
    }

    /// Get a single device by its numeric row id.
    ///
    /// `GET /api/v1/devices/{id}`
    pub async fn get_device(&self, id: i64) -> Result<DeviceEntry, Error> {
        let url = self.api_url(&format!("devices/{id}"))?;
        self.get(url).await
    }
}
