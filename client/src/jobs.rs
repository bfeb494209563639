//! Job registry client
//!
//! Feeds reference their job set by hash; the serialized job descriptors
//! live in an external registry. This client fetches them as opaque base64
//! blobs and passes them through to gateways unmodified. The job
//! description language is not interpreted here.

use serde::Deserialize;

use crate::error::Result;

/// Default registry endpoint
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.quorum.network";

#[derive(Debug, Clone, Deserialize)]
struct JobSetResponse {
    jobs: Vec<String>,
}

/// Read-only client for the external job registry
#[derive(Debug, Clone)]
pub struct JobRegistryClient {
    pub url: String,
    http: reqwest::Client,
}

impl Default for JobRegistryClient {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_URL)
    }
}

impl JobRegistryClient {
    pub fn new(url: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the base64 job descriptors stored under `feed_hash`
    pub async fn fetch_jobs(&self, feed_hash: &[u8; 32]) -> Result<Vec<String>> {
        let endpoint = format!("{}/api/v1/jobs/{}", self.url, hex::encode(feed_hash));
        let resp = self
            .http
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json::<JobSetResponse>()
            .await?;
        Ok(resp.jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = JobRegistryClient::new("https://registry.example.com///");
        assert_eq!(client.url, "https://registry.example.com");
    }
}
