use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::FeedConfig;
use crate::error::{Result, SlurpError};
use crate::feed::allocation::{AllocationRecord, WireAllocation};

/// Allocations from one pull of the feed, plus the records that could not
/// be converted.
#[derive(Debug, Default)]
pub struct FeedBatch {
    pub allocations: Vec<AllocationRecord>,
    /// One [`SlurpError::MalformedAllocation`] per skipped record
    pub rejected: Vec<SlurpError>,
}

/// Anything that can produce the desired allocation list for a run.
#[async_trait]
pub trait AllocationSource: Send + Sync {
    async fn fetch(&self) -> Result<FeedBatch>;
}

/// Decode a feed body. The body must be a JSON array; elements that do not
/// describe a usable allocation are rejected individually.
pub fn decode_feed(body: &str) -> Result<FeedBatch> {
    let elements: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| SlurpError::FeedMalformed(e.to_string()))?;

    let mut batch = FeedBatch::default();
    for (index, element) in elements.into_iter().enumerate() {
        let converted = serde_json::from_value::<WireAllocation>(element)
            .map_err(|e| SlurpError::MalformedAllocation {
                allocation: format!("#{}", index),
                reason: e.to_string(),
            })
            .and_then(AllocationRecord::try_from);
        match converted {
            Ok(allocation) => batch.allocations.push(allocation),
            Err(e) => batch.rejected.push(e),
        }
    }
    Ok(batch)
}

/// HTTP client for the allocation registry.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SlurpError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| SlurpError::Config("allocation feed URL must be set".into()))?;
        Self::new(url, Duration::from_secs(config.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AllocationSource for FeedClient {
    /// One synchronous pull of the whole allocation list. No retries.
    async fn fetch(&self) -> Result<FeedBatch> {
        tracing::debug!(url = %self.url, "Fetching allocations");

        let response = self
            .client
            .get(&self.url)
            .query(&[("format", "json")])
            .send()
            .await
            .map_err(|e| SlurpError::FeedUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlurpError::FeedUnavailable(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SlurpError::FeedUnavailable(e.to_string()))?;
        let batch = decode_feed(&body)?;

        tracing::info!(
            allocations = batch.allocations.len(),
            rejected = batch.rejected.len(),
            "Fetched allocation feed"
        );
        Ok(batch)
    }
}
