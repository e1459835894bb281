//! Fleet directory client
//!
//! The ledger consumes the fleet reference service as an existence
//! oracle only. `GET {base}/voyages/{id}` answering 200 means the voyage
//! exists; 404 means it does not; anything else is a directory failure.

use compliance_ledger::{Error, FleetDirectory, Result, StaticFleetDirectory, VoyageId};
use reqwest::StatusCode;
use std::time::Duration;

/// HTTP-backed fleet directory
pub struct HttpFleetDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFleetDirectory {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build fleet client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn voyage_exists(&self, voyage_id: VoyageId) -> Result<bool> {
        let url = format!("{}/voyages/{}", self.base_url, voyage_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Directory(format!("fleet service unreachable: {}", e)))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::Directory(format!(
                "fleet service returned {}",
                status
            ))),
        }
    }
}

/// Directory implementation selected at startup
pub enum FleetClient {
    /// Production: query the fleet reference service
    Http(HttpFleetDirectory),
    /// Tests and demos: in-memory voyage set
    Static(StaticFleetDirectory),
}

impl FleetDirectory for FleetClient {
    async fn voyage_exists(&self, voyage_id: VoyageId) -> Result<bool> {
        match self {
            FleetClient::Http(client) => client.voyage_exists(voyage_id).await,
            FleetClient::Static(directory) => directory.voyage_exists(voyage_id).await,
        }
    }
}
