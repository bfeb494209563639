//! Gateway REST client
//!
//! A gateway is the network endpoint of one oracle operator. It evaluates
//! opaque, pre-serialized job descriptors and returns signed attestations.
//! This layer performs single requests with a per-request timeout; retry
//! policy lives in the collector.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::Result;

/// REST prefix shared by all gateway endpoints
pub const API_BASE: &str = "/gateway/api/v1";

/// Per-request timeout for signature fetches
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for the liveness probe
pub const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// One gateway endpoint, optionally bound to the oracle it serves
#[derive(Debug, Clone)]
pub struct Gateway {
    pub url: String,
    pub oracle: Option<Pubkey>,
    http: reqwest::Client,
}

/// Policy and job set for one feed in a signature request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRequest {
    /// Opaque base64 job descriptors, passed through unmodified
    pub encoded_jobs: Vec<String>,
    /// Maximum allowed spread between responses, whole units
    pub max_variance: Option<u32>,
    /// Minimum distinct successful responses
    pub min_responses: Option<u32>,
}

/// Body of `fetch_signatures`
#[derive(Debug, Clone, Serialize)]
pub struct FetchSignaturesParams {
    /// Freshness anchor: base58 of the most recent slot hash
    pub recent_hash: String,
    pub encoded_jobs: Vec<String>,
    pub num_signatures: u32,
    pub max_variance: Option<u32>,
    pub min_responses: Option<u32>,
    pub use_timestamp: bool,
}

/// One oracle's evaluation of one feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvalResponse {
    /// Hex-encoded oracle identity
    pub oracle_pubkey: String,
    /// Hex-encoded queue the oracle claims membership in
    pub queue_pubkey: String,
    /// Hex-encoded hash of the evaluated feed's job set
    pub feed_hash: String,
    /// The anchor this evaluation was signed over, base58
    pub recent_hash: String,
    /// 1e18-scaled integer value as a string; empty on failure
    pub success_value: String,
    /// Structured failure string; empty on success
    pub failure_error: String,
    /// Base64 checksum the signature covers
    pub msg: String,
    /// Base64 64-byte signature
    pub signature: String,
    pub recovery_id: u8,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSignaturesResponse {
    pub responses: Vec<FeedEvalResponse>,
}

/// Body of `fetch_signatures_consensus` and `fetch_signatures_batch`
#[derive(Debug, Clone, Serialize)]
pub struct FetchSignaturesConsensusParams {
    pub recent_hash: String,
    pub num_signatures: u32,
    pub feed_requests: Vec<FeedRequest>,
    pub use_timestamp: bool,
}

/// Gateway-computed median for one feed of a consensus round
#[derive(Debug, Clone, Deserialize)]
pub struct MedianResponse {
    /// 1e18-scaled integer value as a string
    pub value: String,
    /// Hex-encoded feed hash
    pub feed_hash: String,
}

/// One oracle's signed contribution to a consensus round: per-feed
/// evaluations plus a single signature over the round checksum
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusOracleResponse {
    pub feed_responses: Vec<FeedEvalResponse>,
    /// Hex-encoded 20-byte identity hash of the oracle's signing key
    pub eth_address: String,
    /// Base64 checksum covered by the signature; identical across oracles
    pub checksum: String,
    /// Base64 64-byte signature
    pub signature: String,
    pub recovery_id: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSignaturesConsensusResponse {
    pub median_responses: Vec<MedianResponse>,
    pub oracle_responses: Vec<ConsensusOracleResponse>,
}

/// One oracle's contribution to a batch round: per-feed evaluations signed
/// individually (no shared checksum)
#[derive(Debug, Clone, Deserialize)]
pub struct BatchOracleResponse {
    pub feed_responses: Vec<FeedEvalResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSignaturesBatchResponse {
    pub oracle_responses: Vec<BatchOracleResponse>,
}

impl Gateway {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: trim_trailing_slash(url.into()),
            oracle: None,
            http: reqwest::Client::new(),
        }
    }

    /// A gateway bound to the oracle account it was discovered from
    pub fn for_oracle(url: impl Into<String>, oracle: Pubkey) -> Self {
        Self {
            oracle: Some(oracle),
            ..Self::new(url)
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}{}/{}", self.url, API_BASE, name)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, name: &str, body: &B) -> Result<R> {
        let resp = self
            .http
            .post(self.endpoint(name))
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<R>()
            .await?;
        Ok(resp)
    }

    /// Single low-cost liveness round trip. `false` on any failure; never
    /// an error, so a dead endpoint cannot poison callers.
    pub async fn ping(&self) -> bool {
        let result = self
            .http
            .get(self.endpoint("test"))
            .timeout(PROBE_REQUEST_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                log::debug!("gateway {} probe failed: {}", self.url, err);
                false
            }
        }
    }

    /// Request attestations for a single feed's job set.
    ///
    /// REST endpoint: `/gateway/api/v1/fetch_signatures`
    pub async fn fetch_signatures(
        &self,
        params: &FetchSignaturesParams,
    ) -> Result<FetchSignaturesResponse> {
        self.post("fetch_signatures", params).await
    }

    /// Request a consensus round over several feeds: every participating
    /// oracle signs one shared checksum covering all median values.
    ///
    /// REST endpoint: `/gateway/api/v1/fetch_signatures_consensus`
    pub async fn fetch_signatures_consensus(
        &self,
        params: &FetchSignaturesConsensusParams,
    ) -> Result<FetchSignaturesConsensusResponse> {
        self.post("fetch_signatures_consensus", params).await
    }

    /// Request per-feed attestations for several feeds in one call, signed
    /// individually rather than over a shared checksum.
    ///
    /// REST endpoint: `/gateway/api/v1/fetch_signatures_batch`
    pub async fn fetch_signatures_batch(
        &self,
        params: &FetchSignaturesConsensusParams,
    ) -> Result<FetchSignaturesBatchResponse> {
        self.post("fetch_signatures_batch", params).await
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
