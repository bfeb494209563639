//! Queue account layout
//!
//! A queue is a bounded, ordered set of member oracles sharing one
//! configuration. The member list is a fixed-capacity array with a logical
//! length; trailing slots are ignored.

use solana_sdk::pubkey::Pubkey;

use crate::error::AccountError;
use crate::lut::LutOwner;
use crate::reader::AccountReader;

/// Maximum number of member oracles per queue
pub const MAX_ORACLES: usize = 128;

/// Size of a QueueAccountData account, discriminator included
pub const QUEUE_ACCOUNT_SIZE: usize = 4232;

/// Queue account state
///
/// Layout (all integers little-endian):
/// - `0..8`     discriminator
/// - `8..40`    authority
/// - `40..4136` oracle_keys, `MAX_ORACLES` x 32 bytes
/// - `4136..4140` oracle_keys_len
/// - `4140..4144` node_timeout_secs
/// - `4144..4148` min_attestations
/// - `4148..4152` padding
/// - `4152..4160` max_quote_verification_age
/// - `4160..4168` lut_slot
/// - `4168..4232` reserved
#[derive(Debug, Clone)]
pub struct QueueAccountData {
    /// Authority that may mutate queue membership and parameters
    pub authority: Pubkey,
    /// Member oracle identities; only the first `oracle_keys_len` are live
    pub oracle_keys: Vec<Pubkey>,
    pub oracle_keys_len: u32,
    /// Per-request node response timeout, seconds
    pub node_timeout_secs: u32,
    /// Minimum attestations required for a submission to land
    pub min_attestations: u32,
    /// Enclave attestation validity window, seconds
    pub max_quote_verification_age: i64,
    /// Slot the queue's lookup table was created at
    pub lut_slot: u64,
}

impl QueueAccountData {
    pub const DISCRIMINATOR: [u8; 8] = [217, 194, 55, 127, 184, 83, 138, 1];

    /// Decode a queue account from raw account data
    pub fn decode(data: &[u8]) -> Result<Self, AccountError> {
        let mut r = AccountReader::new(data);
        r.read_discriminator(&Self::DISCRIMINATOR, "QueueAccountData")?;
        let authority = r.read_pubkey()?;
        let mut oracle_keys = Vec::with_capacity(MAX_ORACLES);
        for _ in 0..MAX_ORACLES {
            oracle_keys.push(r.read_pubkey()?);
        }
        let oracle_keys_len = r.read_u32()?;
        if oracle_keys_len as usize > MAX_ORACLES {
            return Err(AccountError::InvalidField {
                field: "oracle_keys_len",
            });
        }
        let node_timeout_secs = r.read_u32()?;
        let min_attestations = r.read_u32()?;
        r.skip(4)?;
        let max_quote_verification_age = r.read_i64()?;
        let lut_slot = r.read_u64()?;
        Ok(Self {
            authority,
            oracle_keys,
            oracle_keys_len,
            node_timeout_secs,
            min_attestations,
            max_quote_verification_age,
            lut_slot,
        })
    }

    /// The live member oracles (trailing capacity slots excluded)
    pub fn members(&self) -> &[Pubkey] {
        &self.oracle_keys[..self.oracle_keys_len as usize]
    }
}

impl LutOwner for QueueAccountData {
    fn decode(data: &[u8]) -> Result<Self, AccountError> {
        QueueAccountData::decode(data)
    }

    fn lut_slot(&self) -> u64 {
        self.lut_slot
    }
}

#[cfg(test)]
pub(crate) fn encode_queue(queue: &QueueAccountData) -> Vec<u8> {
    let mut data = Vec::with_capacity(QUEUE_ACCOUNT_SIZE);
    data.extend_from_slice(&QueueAccountData::DISCRIMINATOR);
    data.extend_from_slice(queue.authority.as_ref());
    for i in 0..MAX_ORACLES {
        let key = queue.oracle_keys.get(i).copied().unwrap_or_default();
        data.extend_from_slice(key.as_ref());
    }
    data.extend_from_slice(&queue.oracle_keys_len.to_le_bytes());
    data.extend_from_slice(&queue.node_timeout_secs.to_le_bytes());
    data.extend_from_slice(&queue.min_attestations.to_le_bytes());
    data.extend_from_slice(&[0u8; 4]);
    data.extend_from_slice(&queue.max_quote_verification_age.to_le_bytes());
    data.extend_from_slice(&queue.lut_slot.to_le_bytes());
    data.resize(QUEUE_ACCOUNT_SIZE, 0);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_queue(members: usize) -> QueueAccountData {
        QueueAccountData {
            authority: Pubkey::new_unique(),
            oracle_keys: (0..members).map(|_| Pubkey::new_unique()).collect(),
            oracle_keys_len: members as u32,
            node_timeout_secs: 300,
            min_attestations: 3,
            max_quote_verification_age: 3600 * 24 * 7,
            lut_slot: 1234,
        }
    }

    #[test]
    fn test_roundtrip() {
        let queue = sample_queue(5);
        let data = encode_queue(&queue);
        assert_eq!(data.len(), QUEUE_ACCOUNT_SIZE);

        let decoded = QueueAccountData::decode(&data).unwrap();
        assert_eq!(decoded.authority, queue.authority);
        assert_eq!(decoded.members(), &queue.oracle_keys[..]);
        assert_eq!(decoded.node_timeout_secs, 300);
        assert_eq!(decoded.min_attestations, 3);
        assert_eq!(decoded.lut_slot, 1234);
    }

    #[test]
    fn test_trailing_slots_ignored() {
        let mut queue = sample_queue(2);
        // capacity slots beyond the logical length stay out of members()
        queue.oracle_keys.push(Pubkey::new_unique());
        let decoded = QueueAccountData::decode(&encode_queue(&queue)).unwrap();
        assert_eq!(decoded.members().len(), 2);
    }

    #[test]
    fn test_len_above_capacity_rejected() {
        let queue = sample_queue(1);
        let mut data = encode_queue(&queue);
        let off = 8 + 32 + MAX_ORACLES * 32;
        data[off..off + 4].copy_from_slice(&(MAX_ORACLES as u32 + 1).to_le_bytes());
        assert!(matches!(
            QueueAccountData::decode(&data),
            Err(AccountError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_wrong_discriminator_rejected() {
        let mut data = encode_queue(&sample_queue(1));
        data[0] ^= 0xff;
        assert!(matches!(
            QueueAccountData::decode(&data),
            Err(AccountError::BadDiscriminator { .. })
        ));
    }
}
