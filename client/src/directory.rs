//! Queue directory
//!
//! Resolves a queue's member oracles into usable gateway endpoints: loads
//! the membership list, batch-loads the oracle accounts, extracts and
//! filters gateway URIs, health-checks the survivors and returns them in
//! randomized order so repeated calls spread load across operators.

use rand::seq::SliceRandom;
use rand::Rng;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

use quorum_accounts::{OracleAccountData, QueueAccountData};

use crate::error::{ClientError, Result};
use crate::gateway::Gateway;
use crate::health::HealthCache;

/// Minimum remaining enclave validity for an oracle to count as fresh
pub const MIN_ENCLAVE_VALIDITY_SECS: i64 = 3600;

/// Known-bad provider substrings filtered out of gateway URIs by default
pub const DEFAULT_DENYLIST: &[&str] = &["infstones"];

/// Directory over one queue's gateway endpoints
#[derive(Debug, Clone)]
pub struct QueueDirectory {
    denylist: Vec<String>,
}

impl Default for QueueDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueDirectory {
    pub fn new() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// A directory with an injected denylist (substring match on URIs)
    pub fn with_denylist(denylist: Vec<String>) -> Self {
        Self { denylist }
    }

    fn uri_allowed(&self, uri: &str) -> bool {
        !self.denylist.iter().any(|bad| uri.contains(bad))
    }

    /// Load the queue's member oracles and their decoded account data.
    /// Members whose accounts are missing or undecodable are skipped.
    async fn load_members(
        &self,
        rpc: &RpcClient,
        queue: &Pubkey,
    ) -> Result<Vec<(Pubkey, OracleAccountData)>> {
        let queue_data = rpc
            .get_account_data(queue)
            .await
            .map_err(|_| ClientError::AccountNotFound(*queue))?;
        let queue_data = QueueAccountData::decode(&queue_data)?;
        let members = queue_data.members();
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let accounts = rpc.get_multiple_accounts(members).await?;
        let mut loaded = Vec::with_capacity(members.len());
        for (key, account) in members.iter().zip(accounts) {
            let Some(account) = account else {
                log::debug!("oracle {} has no account, skipping", key);
                continue;
            };
            match OracleAccountData::decode(&account.data) {
                Ok(data) => loaded.push((*key, data)),
                Err(err) => log::warn!("oracle {} failed to decode: {}", key, err),
            }
        }
        Ok(loaded)
    }

    /// Candidate (oracle, uri) pairs after URI trimming, denylist filtering
    /// and deduplication, before any health probe. Duplicate members and
    /// operators fronting several oracles behind one URI collapse to the
    /// first occurrence.
    fn candidates(&self, members: &[(Pubkey, OracleAccountData)]) -> Vec<(Pubkey, String)> {
        let mut seen = std::collections::HashSet::new();
        members
            .iter()
            .filter_map(|(key, data)| data.gateway_uri().map(|uri| (*key, uri)))
            .filter(|(_, uri)| self.uri_allowed(uri))
            .filter(|(_, uri)| seen.insert(uri.clone()))
            .collect()
    }

    /// All healthy gateways on the queue, in randomized order.
    ///
    /// An empty result means no quorum is currently possible; callers decide
    /// whether that is fatal.
    pub async fn list_gateways(
        &self,
        rpc: &RpcClient,
        health: &HealthCache,
        queue: &Pubkey,
    ) -> Result<Vec<Gateway>> {
        let members = self.load_members(rpc, queue).await?;
        let candidates = self.candidates(&members);

        let probes = candidates.into_iter().map(|(oracle, uri)| async move {
            let gateway = Gateway::for_oracle(uri, oracle);
            let healthy = health.is_healthy(&gateway).await;
            (gateway, healthy)
        });
        let mut gateways: Vec<Gateway> = futures::future::join_all(probes)
            .await
            .into_iter()
            .filter(|(_, healthy)| *healthy)
            .map(|(gateway, _)| gateway)
            .collect();

        gateways.shuffle(&mut rand::thread_rng());
        log::debug!("queue {} has {} healthy gateways", queue, gateways.len());
        Ok(gateways)
    }

    /// One gateway to talk to: the explicit override if given, otherwise a
    /// random pick from the queue's healthy set.
    pub async fn select_gateway(
        &self,
        rpc: &RpcClient,
        health: &HealthCache,
        queue: &Pubkey,
        override_url: Option<&str>,
    ) -> Result<Gateway> {
        if let Some(url) = override_url {
            return Ok(Gateway::new(url));
        }
        let gateways = self.list_gateways(rpc, health, queue).await?;
        if gateways.is_empty() {
            return Err(ClientError::NoGatewayAvailable { queue: *queue });
        }
        let pick = rand::thread_rng().gen_range(0..gateways.len());
        Ok(gateways[pick].clone())
    }

    /// A random member oracle that is gateway-healthy, enclave-verified and
    /// valid for at least another hour.
    pub async fn fetch_fresh_oracle(
        &self,
        rpc: &RpcClient,
        health: &HealthCache,
        queue: &Pubkey,
        now: i64,
    ) -> Result<Pubkey> {
        let members = self.load_members(rpc, queue).await?;
        let candidates = self.candidates(&members);

        let probes = candidates.into_iter().map(|(oracle, uri)| async move {
            let gateway = Gateway::for_oracle(uri, oracle);
            (oracle, health.is_healthy(&gateway).await)
        });
        let healthy: Vec<Pubkey> = futures::future::join_all(probes)
            .await
            .into_iter()
            .filter(|(_, ok)| *ok)
            .map(|(oracle, _)| oracle)
            .collect();

        let fresh: Vec<Pubkey> = members
            .iter()
            .filter(|(key, data)| {
                healthy.contains(key) && data.is_fresh(now, MIN_ENCLAVE_VALIDITY_SECS)
            })
            .map(|(key, _)| *key)
            .collect();

        fresh
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(ClientError::NoFreshOracle { queue: *queue })
    }
}
