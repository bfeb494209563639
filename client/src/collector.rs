//! Consensus collector
//!
//! Orchestrates attestation requests across a queue's gateways: the
//! single-feed path issues one request with bounded retry, the multi-feed
//! path batches several feeds into one consensus round anchored to the most
//! recent slot hash and computes the per-feed median locally.
//!
//! Values travel as 1e18-scaled integer mantissas. All comparisons and the
//! median selection happen on the exact integers; conversion to a decimal
//! (divide by 10^18) only happens at the API edge, so no rounding artifact
//! can reorder two responses.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

use quorum_accounts::{FeedAccountData, SlotHash};

use crate::context::ClientContext;
use crate::directory::QueueDirectory;
use crate::error::{ClientError, Result};
use crate::gateway::{
    FeedEvalResponse, FeedRequest, FetchSignaturesConsensusParams,
    FetchSignaturesConsensusResponse, FetchSignaturesParams,
};
use crate::jobs::JobRegistryClient;

/// Bounded retry for single-feed signature fetches
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Scale of wire values: integers carrying 18 fractional decimal digits
pub const VALUE_DECIMAL_SCALE: u32 = 18;

/// Submitted in place of a value for a feed whose round failed; the
/// on-chain program ignores sentinel slots.
pub const FAILED_VALUE_SENTINEL: i128 = i128::MAX;

/// Default signature target for a feed: its preferred sample size plus a
/// one-third margin for stragglers.
pub fn signature_target(min_sample_size: u32) -> u32 {
    (min_sample_size + min_sample_size.div_ceil(3)).max(1)
}

/// Convert a 1e18-scaled mantissa to its natural-unit decimal. `None` when
/// the mantissa exceeds decimal range (sentinels never convert).
pub fn scaled_decimal(raw: i128) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(raw, VALUE_DECIMAL_SCALE).ok()
}

/// Median of the reported values: sorted ascending, element at index
/// `floor(n / 2)`.
///
/// For even counts this selects the upper of the two middle values. The
/// external verifier selects the same element, so this must not be
/// "fixed" to an arithmetic mean.
pub fn consensus_value(values: &[i128]) -> Option<i128> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

/// Checksum every consensus signature must cover: binds the queue identity,
/// each feed's policy, the signed slothash and the median values.
pub fn round_checksum(
    queue: &Pubkey,
    feeds: &[FeedAccountData],
    signed_slothash: &[u8; 32],
    values: &[i128],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(queue.as_ref());
    for feed in feeds {
        hasher.update(feed.feed_hash);
        hasher.update(feed.max_variance.to_le_bytes());
        hasher.update(feed.min_responses.to_le_bytes());
    }
    hasher.update(signed_slothash);
    for value in values {
        hasher.update(value.to_le_bytes());
    }
    hasher.finalize().into()
}

/// One oracle's result for a single-feed request
#[derive(Debug, Clone)]
pub struct OracleResponse {
    pub oracle: Pubkey,
    /// Natural-unit value; populated iff the oracle succeeded
    pub value: Option<Decimal>,
    /// The raw 1e18-scaled mantissa behind `value`
    pub raw_value: Option<i128>,
    /// Structured failure string; empty on success
    pub error: String,
    pub signature: [u8; 64],
    pub recovery_id: u8,
}

impl OracleResponse {
    pub fn from_eval(eval: &FeedEvalResponse) -> Result<Self> {
        let oracle = parse_hex_pubkey(&eval.oracle_pubkey)?;
        let raw_value = if eval.failure_error.is_empty() {
            eval.success_value.parse::<i128>().ok()
        } else {
            None
        };
        // failed responses may carry no signature; only successes must
        let signature = if raw_value.is_some() {
            parse_base64_signature(&eval.signature)?
        } else {
            parse_base64_signature(&eval.signature).unwrap_or([0u8; 64])
        };
        Ok(Self {
            oracle,
            value: raw_value.and_then(scaled_decimal),
            raw_value,
            error: eval.failure_error.clone(),
            signature,
            recovery_id: eval.recovery_id,
        })
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty() && self.raw_value.is_some()
    }

    /// First line of the failure string, if any
    pub fn short_error(&self) -> Option<&str> {
        match self.error.as_str() {
            "" | "[]" => None,
            err => err.lines().next(),
        }
    }
}

/// Outcome of a single-feed signature fetch
#[derive(Debug, Clone)]
pub struct SignatureCollection {
    pub responses: Vec<OracleResponse>,
    /// Failure strings of the oracles that errored
    pub failures: Vec<String>,
    pub num_successes: usize,
    /// Attempts the winning request took (1 = first try)
    pub attempts: u32,
    /// Slot of the freshness anchor the request was keyed to
    pub slot: u64,
}

/// One oracle's signature over a consensus round
#[derive(Debug, Clone)]
pub struct ConsensusSignature {
    pub oracle: Pubkey,
    pub eth_address: [u8; 20],
    pub signature: [u8; 64],
    pub recovery_id: u8,
    /// The signed round checksum; identical for every participant
    pub checksum: Vec<u8>,
}

/// Consensus outcome for one feed of a round
#[derive(Debug, Clone)]
pub struct FeedConsensus {
    pub feed: Pubkey,
    pub feed_hash: [u8; 32],
    /// Natural-unit median; `None` when the feed's round failed
    pub value: Option<Decimal>,
    pub raw_value: Option<i128>,
    /// Surviving numeric responses behind the median
    pub num_responses: usize,
    /// Per-oracle failure strings for this feed
    pub failures: Vec<String>,
}

/// A completed consensus round over a batch of feeds.
///
/// `feeds` and `median_values` are parallel with the request's feed list;
/// a failed feed keeps its slot with `value: None` and the sentinel value,
/// so sibling feeds are never displaced by a failure.
#[derive(Debug, Clone)]
pub struct ConsensusRound {
    pub queue: Pubkey,
    /// Slot of the signed freshness anchor
    pub slot: u64,
    pub signed_slothash: [u8; 32],
    pub feeds: Vec<FeedConsensus>,
    pub median_values: Vec<i128>,
    pub oracles: Vec<ConsensusSignature>,
    pub num_successes: usize,
}

impl ConsensusRound {
    /// All per-feed failure strings, flattened for diagnostics
    pub fn all_failures(&self) -> Vec<String> {
        self.feeds
            .iter()
            .flat_map(|feed| feed.failures.iter().cloned())
            .collect()
    }
}

/// Collects signed attestations from a queue's gateways
pub struct ConsensusCollector<'a> {
    rpc: &'a RpcClient,
    context: Arc<ClientContext>,
    directory: QueueDirectory,
    jobs: JobRegistryClient,
    retry_attempts: u32,
}

impl<'a> ConsensusCollector<'a> {
    pub fn new(rpc: &'a RpcClient, context: Arc<ClientContext>) -> Self {
        Self {
            rpc,
            context,
            directory: QueueDirectory::new(),
            jobs: JobRegistryClient::default(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    pub fn with_directory(mut self, directory: QueueDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_job_registry(mut self, jobs: JobRegistryClient) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    /// The freshness anchor: most recent entry of the slot-hashes sysvar
    pub async fn latest_slot_hash(&self) -> Result<SlotHash> {
        let sysvar = solana_sdk::sysvar::slot_hashes::ID;
        let account = self
            .rpc
            .get_account_with_commitment(&sysvar, CommitmentConfig::confirmed())
            .await?
            .value
            .ok_or(ClientError::AccountNotFound(sysvar))?;
        Ok(quorum_accounts::latest_slot_hash(&account.data)?)
    }

    /// Load a feed account, memoized in the context
    pub async fn load_feed(&self, feed: &Pubkey) -> Result<FeedAccountData> {
        let cell = self.context.feed_cell(feed);
        let data = cell
            .get_or_try_init(|| async {
                let raw = self
                    .rpc
                    .get_account_data(feed)
                    .await
                    .map_err(|_| ClientError::AccountNotFound(*feed))?;
                Ok::<_, ClientError>(FeedAccountData::decode(&raw)?)
            })
            .await?;
        Ok(*data)
    }

    /// Load a feed's job set from the registry, memoized by feed hash
    pub async fn feed_jobs(&self, feed_hash: &[u8; 32]) -> Result<Vec<String>> {
        let cell = self.context.job_cell(feed_hash);
        let jobs = cell
            .get_or_try_init(|| self.jobs.fetch_jobs(feed_hash))
            .await?;
        Ok(jobs.clone())
    }

    /// Single-feed path: request `num_signatures` attestations for one job
    /// set from one gateway, retrying transport failures up to the bounded
    /// attempt count. Exhausting the budget surfaces the last error.
    pub async fn fetch_signatures(
        &self,
        queue: &Pubkey,
        request: &FeedRequest,
        num_signatures: u32,
        gateway_override: Option<&str>,
    ) -> Result<SignatureCollection> {
        let gateway = self
            .directory
            .select_gateway(self.rpc, &self.context.health, queue, gateway_override)
            .await?;
        let anchor = self.latest_slot_hash().await?;
        let params = FetchSignaturesParams {
            recent_hash: anchor.to_base58_hash(),
            encoded_jobs: request.encoded_jobs.clone(),
            num_signatures,
            max_variance: request.max_variance,
            min_responses: request.min_responses,
            use_timestamp: false,
        };

        let mut last_error = String::new();
        for attempt in 1..=self.retry_attempts {
            match gateway.fetch_signatures(&params).await {
                Ok(response) => {
                    return collect_signatures(&response.responses, anchor.slot, attempt);
                }
                Err(err) => {
                    log::warn!(
                        "signature fetch attempt {}/{} against {} failed: {}",
                        attempt,
                        self.retry_attempts,
                        gateway.url,
                        err
                    );
                    last_error = err.to_string();
                }
            }
        }
        Err(ClientError::RetriesExhausted {
            attempts: self.retry_attempts,
            last_error,
        })
    }

    /// Multi-feed consensus path: one request covering every feed, all of
    /// which must live on `queue`. Per-feed evaluations are re-associated
    /// by feed hash and reduced to medians locally.
    pub async fn fetch_consensus(
        &self,
        feeds: &[Pubkey],
        num_signatures: Option<u32>,
        gateway_override: Option<&str>,
    ) -> Result<ConsensusRound> {
        if feeds.is_empty() {
            return Err(ClientError::EmptyFeedList);
        }

        let mut feed_datas = Vec::with_capacity(feeds.len());
        for feed in feeds {
            feed_datas.push(self.load_feed(feed).await?);
        }

        let queue = feed_datas[0].queue;
        for (feed, data) in feeds.iter().zip(&feed_datas) {
            if data.queue != queue {
                return Err(ClientError::QueueMismatch {
                    feed: *feed,
                    actual: data.queue,
                    expected: queue,
                });
            }
        }

        // the request-wide signature target is the strictest feed's target
        let mut target = num_signatures.unwrap_or(1);
        let mut feed_requests = Vec::with_capacity(feeds.len());
        for data in &feed_datas {
            target = target.max(signature_target(data.min_sample_size));
            feed_requests.push(FeedRequest {
                encoded_jobs: self.feed_jobs(&data.feed_hash).await?,
                max_variance: Some(data.max_variance_units()),
                min_responses: Some(data.min_responses),
            });
        }

        let anchor = self.latest_slot_hash().await?;
        let gateway = self
            .directory
            .select_gateway(self.rpc, &self.context.health, &queue, gateway_override)
            .await?;
        let response = gateway
            .fetch_signatures_consensus(&FetchSignaturesConsensusParams {
                recent_hash: anchor.to_base58_hash(),
                num_signatures: target,
                feed_requests,
                use_timestamp: false,
            })
            .await?;

        let round = merge_consensus(queue, anchor, feeds, &feed_datas, &response)?;
        if let Some(first) = round.oracles.first() {
            let expected =
                round_checksum(&queue, &feed_datas, &round.signed_slothash, &round.median_values);
            if first.checksum != expected {
                log::debug!("gateway checksum differs from locally computed round checksum");
            }
        }
        log::info!(
            "consensus round at slot {}: {}/{} feeds succeeded, {} oracles",
            round.slot,
            round.num_successes,
            round.feeds.len(),
            round.oracles.len()
        );
        Ok(round)
    }
}

/// Parse raw single-feed evaluations into a collection, splitting failures
/// out of the value pool while keeping them for diagnostics.
pub fn collect_signatures(
    evals: &[FeedEvalResponse],
    slot: u64,
    attempts: u32,
) -> Result<SignatureCollection> {
    let mut responses = Vec::with_capacity(evals.len());
    let mut failures = Vec::new();
    let mut num_successes = 0;
    for eval in evals {
        let response = OracleResponse::from_eval(eval)?;
        if response.is_success() {
            num_successes += 1;
        } else if let Some(err) = response.short_error() {
            failures.push(format!("oracle {}: {}", response.oracle, err));
        }
        responses.push(response);
    }
    Ok(SignatureCollection {
        responses,
        failures,
        num_successes,
        attempts,
        slot,
    })
}

/// Reduce a consensus response to per-feed medians.
///
/// Results are associative with `feeds` order: evaluations are matched to
/// request slots via the feed hash embedded in each response, never via
/// arrival order. A feed with no usable values, or fewer than its
/// `min_responses`, is a per-feed failure and does not abort its siblings.
pub fn merge_consensus(
    queue: Pubkey,
    anchor: SlotHash,
    feeds: &[Pubkey],
    feed_datas: &[FeedAccountData],
    response: &FetchSignaturesConsensusResponse,
) -> Result<ConsensusRound> {
    let index_by_hash: HashMap<[u8; 32], usize> = feed_datas
        .iter()
        .enumerate()
        .map(|(index, data)| (data.feed_hash, index))
        .collect();

    let mut oracles = Vec::with_capacity(response.oracle_responses.len());
    let mut per_feed_values: Vec<Vec<i128>> = vec![Vec::new(); feeds.len()];
    let mut per_feed_failures: Vec<Vec<String>> = vec![Vec::new(); feeds.len()];

    for oracle_resp in &response.oracle_responses {
        let first_eval = oracle_resp.feed_responses.first().ok_or_else(|| {
            ClientError::MalformedResponse("oracle response carries no feed evaluations".into())
        })?;
        let oracle = parse_hex_pubkey(&first_eval.oracle_pubkey)?;
        oracles.push(ConsensusSignature {
            oracle,
            eth_address: parse_hex_eth_address(&oracle_resp.eth_address)?,
            signature: parse_base64_signature(&oracle_resp.signature)?,
            recovery_id: oracle_resp.recovery_id,
            checksum: BASE64.decode(&oracle_resp.checksum).map_err(|_| {
                ClientError::MalformedResponse("checksum is not valid base64".into())
            })?,
        });

        for eval in &oracle_resp.feed_responses {
            let hash = parse_hex_32(&eval.feed_hash)?;
            let Some(&index) = index_by_hash.get(&hash) else {
                log::warn!("evaluation for unrequested feed hash {}", eval.feed_hash);
                continue;
            };
            if !eval.failure_error.is_empty() {
                per_feed_failures[index]
                    .push(format!("oracle {}: {}", oracle, eval.failure_error));
            } else if let Ok(value) = eval.success_value.parse::<i128>() {
                per_feed_values[index].push(value);
            } else {
                per_feed_failures[index].push(format!(
                    "oracle {}: unparseable value {:?}",
                    oracle, eval.success_value
                ));
            }
        }
    }

    let mut feed_results = Vec::with_capacity(feeds.len());
    let mut median_values = Vec::with_capacity(feeds.len());
    let mut num_successes = 0;

    for (index, (feed, data)) in feeds.iter().zip(feed_datas).enumerate() {
        let values = &per_feed_values[index];
        let mut failures = std::mem::take(&mut per_feed_failures[index]);
        let quorum_met = values.len() >= data.min_responses.max(1) as usize;
        let consensus = if quorum_met { consensus_value(values) } else { None };

        match consensus {
            Some(raw) => {
                num_successes += 1;
                median_values.push(raw);
                feed_results.push(FeedConsensus {
                    feed: *feed,
                    feed_hash: data.feed_hash,
                    value: scaled_decimal(raw),
                    raw_value: Some(raw),
                    num_responses: values.len(),
                    failures,
                });
            }
            None => {
                if !values.is_empty() {
                    failures.push(format!(
                        "quorum not met: {} of {} required responses",
                        values.len(),
                        data.min_responses
                    ));
                } else if failures.is_empty() {
                    failures.push("no usable responses".to_string());
                }
                median_values.push(FAILED_VALUE_SENTINEL);
                feed_results.push(FeedConsensus {
                    feed: *feed,
                    feed_hash: data.feed_hash,
                    value: None,
                    raw_value: None,
                    num_responses: values.len(),
                    failures,
                });
            }
        }
    }

    Ok(ConsensusRound {
        queue,
        slot: anchor.slot,
        signed_slothash: anchor.hash,
        feeds: feed_results,
        median_values,
        oracles,
        num_successes,
    })
}

fn parse_hex_32(hex_str: &str) -> Result<[u8; 32]> {
    hex::decode(hex_str)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            ClientError::MalformedResponse(format!("expected 32 hex bytes, got {hex_str:?}"))
        })
}

fn parse_hex_pubkey(hex_str: &str) -> Result<Pubkey> {
    Ok(Pubkey::new_from_array(parse_hex_32(hex_str)?))
}

fn parse_hex_eth_address(hex_str: &str) -> Result<[u8; 20]> {
    hex::decode(hex_str)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            ClientError::MalformedResponse(format!("expected 20 hex bytes, got {hex_str:?}"))
        })
}

fn parse_base64_signature(encoded: &str) -> Result<[u8; 64]> {
    BASE64
        .decode(encoded)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            ClientError::MalformedResponse("signature is not 64 base64 bytes".into())
        })
}
