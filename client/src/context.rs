//! Per-call-graph client context
//!
//! All cross-call caches live here and are passed explicitly: the lookup
//! table memo, the feed-account and job-set memos, and the gateway health
//! cache. Each map is written at most once per key per resolution window
//! (cache-aside), and the `OnceCell` wrappers give concurrent callers
//! first-writer-wins initialization without duplicated fetches.

use std::sync::Arc;

use dashmap::DashMap;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::OnceCell;

use quorum_accounts::FeedAccountData;

use crate::health::HealthCache;

/// Shared caches for one client instance
pub struct ClientContext {
    /// Resolved lookup tables, keyed by owning account
    pub lut_cache: DashMap<Pubkey, AddressLookupTableAccount>,
    /// Decoded feed accounts
    pub feed_cache: DashMap<Pubkey, Arc<OnceCell<FeedAccountData>>>,
    /// Base64 job sets, keyed by feed hash
    pub job_cache: DashMap<[u8; 32], Arc<OnceCell<Vec<String>>>>,
    /// Gateway liveness outcomes
    pub health: HealthCache,
}

impl ClientContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lut_cache: DashMap::new(),
            feed_cache: DashMap::new(),
            job_cache: DashMap::new(),
            health: HealthCache::new(),
        })
    }

    /// The memo cell for `feed`, creating an empty one on first use.
    /// Cloned out so no map guard is held across a suspension point.
    pub fn feed_cell(&self, feed: &Pubkey) -> Arc<OnceCell<FeedAccountData>> {
        self.feed_cache
            .entry(*feed)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// The memo cell for a feed hash's job set
    pub fn job_cell(&self, feed_hash: &[u8; 32]) -> Arc<OnceCell<Vec<String>>> {
        self.job_cache
            .entry(*feed_hash)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}
