//! HTTP client for the remote analysis service.
//!
//! `GET <endpoint>?html=<content>&id=<identity>` answering
//! `{"response": "<verdict>"}`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::Analyzer;
use crate::error::{Error, Result};
use crate::model::ItemIdentity;

pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    response: String,
}

impl HttpAnalyzer {
    /// Every request is bounded by `timeout`; hitting it counts as unreachable.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, content: &str, identity: &ItemIdentity) -> Result<String> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .query(&[("html", content), ("id", identity.as_str())])
            .send()
            .await
            .map_err(|e| Error::RemoteUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RemoteUnreachable(format!(
                "service answered with status {}",
                status.as_u16()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::RemoteUnreachable(e.to_string()))?;
        let parsed: AnalysisResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Analysis(format!("bad response body: {e}")))?;

        debug!(identity = %identity, verdict = %parsed.response, "remote verdict received");
        Ok(parsed.response)
    }
}
