//! Feed account layout
//!
//! A feed is a consensus target: a job-set hash plus the policy the queue's
//! oracles must satisfy when attesting to it.

use solana_sdk::pubkey::Pubkey;

use crate::error::AccountError;
use crate::lut::LutOwner;
use crate::reader::AccountReader;

/// Size of a FeedAccountData account, discriminator included
pub const FEED_ACCOUNT_SIZE: usize = 160;

/// Scale of the stored `max_variance` field (parts per 1e9)
pub const VARIANCE_SCALE: u64 = 1_000_000_000;

/// Feed account state
///
/// Layout (all integers little-endian):
/// - `0..8`     discriminator
/// - `8..40`    queue
/// - `40..72`   feed_hash
/// - `72..104`  name, null padded
/// - `104..112` max_variance, scaled by 1e9
/// - `112..116` min_responses
/// - `116..120` min_sample_size
/// - `120..128` lut_slot
/// - `128..160` reserved
#[derive(Debug, Clone, Copy)]
pub struct FeedAccountData {
    /// Queue whose oracles serve this feed
    pub queue: Pubkey,
    /// Hash identifying the feed's job set in the job registry
    pub feed_hash: [u8; 32],
    pub name: [u8; 32],
    /// Maximum allowed spread between responses, scaled by 1e9
    pub max_variance: u64,
    /// Minimum distinct successful responses for a valid round
    pub min_responses: u32,
    /// Preferred sample size used to derive the signature target
    pub min_sample_size: u32,
    pub lut_slot: u64,
}

impl FeedAccountData {
    pub const DISCRIMINATOR: [u8; 8] = [143, 234, 80, 154, 170, 188, 70, 254];

    /// Decode a feed account from raw account data
    pub fn decode(data: &[u8]) -> Result<Self, AccountError> {
        let mut r = AccountReader::new(data);
        r.read_discriminator(&Self::DISCRIMINATOR, "FeedAccountData")?;
        let queue = r.read_pubkey()?;
        let feed_hash = r.read_bytes::<32>()?;
        let name = r.read_bytes::<32>()?;
        let max_variance = r.read_u64()?;
        let min_responses = r.read_u32()?;
        let min_sample_size = r.read_u32()?;
        let lut_slot = r.read_u64()?;
        Ok(Self {
            queue,
            feed_hash,
            name,
            max_variance,
            min_responses,
            min_sample_size,
            lut_slot,
        })
    }

    /// Variance in whole units (the wire format the gateways accept)
    pub fn max_variance_units(&self) -> u32 {
        (self.max_variance / VARIANCE_SCALE) as u32
    }
}

impl LutOwner for FeedAccountData {
    fn decode(data: &[u8]) -> Result<Self, AccountError> {
        FeedAccountData::decode(data)
    }

    fn lut_slot(&self) -> u64 {
        self.lut_slot
    }
}

#[cfg(test)]
pub(crate) fn encode_feed(feed: &FeedAccountData) -> Vec<u8> {
    let mut data = Vec::with_capacity(FEED_ACCOUNT_SIZE);
    data.extend_from_slice(&FeedAccountData::DISCRIMINATOR);
    data.extend_from_slice(feed.queue.as_ref());
    data.extend_from_slice(&feed.feed_hash);
    data.extend_from_slice(&feed.name);
    data.extend_from_slice(&feed.max_variance.to_le_bytes());
    data.extend_from_slice(&feed.min_responses.to_le_bytes());
    data.extend_from_slice(&feed.min_sample_size.to_le_bytes());
    data.extend_from_slice(&feed.lut_slot.to_le_bytes());
    data.resize(FEED_ACCOUNT_SIZE, 0);
    data
}
