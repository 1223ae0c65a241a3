use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::{SiteEntry, SiteList};

impl RestClient {
    /// `GET /api/v1/sites`
    pub async fn list_sites(&self) -> Result<Vec<SiteEntry>, Error> {
        let url = self.api_url("sites")?;
        let list: SiteList = self.get(url).await?;
        Ok(list.sites)
    }
}
