use crate::error::FetchError;
use crate::structs::*;

use std::future::Future;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;

/// Read access to the transit authority's open-data API.
pub trait TransitApi {
    /// Every stop operated by the agency.
    fn stop_list(&self) -> impl Future<Output = Result<Vec<Stop>, FetchError>> + Send;

    /// Live ETAs for all routes calling at `stop_id`.
    fn stop_eta(
        &self,
        stop_id: &str,
    ) -> impl Future<Output = Result<Vec<EtaEntry>, FetchError>> + Send;
}

//////////////////////////////////////////////////////////
// KMB API calls
//////////////////////////////////////////////////////////
#[derive(Clone)]
pub struct KmbClient {
    client: reqwest::Client,
    base: String,
}

impl KmbClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, FetchError> {
        log::debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, "reqwest/0.11.13")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = resp.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body)?;
        Ok(parsed.data)
    }
}

impl TransitApi for KmbClient {
    async fn stop_list(&self) -> Result<Vec<Stop>, FetchError> {
        self.get_data(format!("{}/stop", self.base)).await
    }

    async fn stop_eta(&self, stop_id: &str) -> Result<Vec<EtaEntry>, FetchError> {
        let url = format!("{}/stop-eta/{}", self.base, stop_id);
        self.get_data(url).await.map_err(|e| {
            log::error!("Error fetching ETA for {}: {}", stop_id, e);
            e
        })
    }
}
