//! Slot-hashes sysvar parsing
//!
//! The sysvar stores recent (slot, hash) pairs most-recent-first behind a
//! u64 entry count. The newest entry anchors attestation requests so that
//! gateways sign over fresh chain state.

use crate::error::AccountError;
use crate::reader::AccountReader;

/// Serialized size of one (slot, hash) entry
pub const SLOT_HASH_ENTRY_SIZE: usize = 40;

/// One entry of the slot-hashes sysvar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHash {
    pub slot: u64,
    pub hash: [u8; 32],
}

impl SlotHash {
    /// Returns the base58-encoded hash as a `String`.
    pub fn to_base58_hash(&self) -> String {
        bs58::encode(self.hash).into_string()
    }
}

/// Parse up to `max_entries` entries from raw sysvar account data,
/// most-recent-first.
pub fn parse_slot_hashes(data: &[u8], max_entries: usize) -> Result<Vec<SlotHash>, AccountError> {
    let mut r = AccountReader::new(data);
    let count = r.read_u64()? as usize;
    let take = count.min(max_entries);
    let mut entries = Vec::with_capacity(take);
    for _ in 0..take {
        let slot = r.read_u64()?;
        let hash = r.read_bytes::<32>()?;
        entries.push(SlotHash { slot, hash });
    }
    Ok(entries)
}

/// The most recent slot hash, the freshness anchor for attestation requests
pub fn latest_slot_hash(data: &[u8]) -> Result<SlotHash, AccountError> {
    parse_slot_hashes(data, 1)?
        .into_iter()
        .next()
        .ok_or(AccountError::InvalidField { field: "slot_hashes" })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sysvar_data(entries: &[(u64, u8)]) -> Vec<u8> {
        let mut data = (entries.len() as u64).to_le_bytes().to_vec();
        for &(slot, fill) in entries {
            data.extend_from_slice(&slot.to_le_bytes());
            data.extend_from_slice(&[fill; 32]);
        }
        data
    }

    #[test]
    fn test_latest_is_first_entry() {
        let data = sysvar_data(&[(100, 0xaa), (99, 0xbb), (98, 0xcc)]);
        let latest = latest_slot_hash(&data).unwrap();
        assert_eq!(latest.slot, 100);
        assert_eq!(latest.hash, [0xaa; 32]);
    }

    #[test]
    fn test_parse_respects_max_entries() {
        let data = sysvar_data(&[(100, 1), (99, 2), (98, 3)]);
        let entries = parse_slot_hashes(&data, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].slot, 99);
    }

    #[test]
    fn test_empty_sysvar_is_an_error() {
        let data = sysvar_data(&[]);
        assert!(latest_slot_hash(&data).is_err());
    }

    #[test]
    fn test_base58_hash() {
        let sh = SlotHash { slot: 1, hash: [0u8; 32] };
        assert_eq!(sh.to_base58_hash(), "1".repeat(32));
    }
}
