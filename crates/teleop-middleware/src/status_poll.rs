//! One-shot HTTP status fetch.
//!
//! Right after the link comes up the client asks `GET /api/status` for a
//! full status sample instead of waiting for the next pushed
//! `status_update`. The response has the same shape as the pushed payload
//! and goes through the same validation.

use std::time::Duration;

use serde_json::Value;
use teleop_types::{StatusSample, TeleopError};
use tracing::debug;

use crate::codec::parse_status;

/// HTTP client for the status endpoint.
#[derive(Clone)]
pub struct StatusPoller {
    client: reqwest::Client,
    url: String,
}

impl StatusPoller {
    /// Build a poller for `url` with a per-request `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TeleopError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TeleopError::Http(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and validate one status sample.
    pub async fn fetch(&self) -> Result<StatusSample, TeleopError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| TeleopError::Http(format!("{} unreachable: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(TeleopError::Http(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TeleopError::Http(format!("invalid status body: {e}")))?;
        debug!(url = %self.url, "status poll answered");
        parse_status(&body)
    }
}
