//! Oracle account layout
//!
//! One account per gateway operator. The client only reads the gateway URI,
//! the enclave attestation state and the lookup table slot.

use solana_sdk::pubkey::Pubkey;

use crate::addresses::QUORUM_PROGRAM_ID;
use crate::error::AccountError;
use crate::lut::LutOwner;
use crate::reader::AccountReader;

/// Fixed width of the gateway URI field, null padded
pub const GATEWAY_URI_SIZE: usize = 64;

/// Size of an OracleAccountData account, discriminator included
pub const ORACLE_ACCOUNT_SIZE: usize = 200;

/// Enclave attestation state of an oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VerificationStatus {
    Unverified = 0,
    Pending = 1,
    Revoked = 2,
    Verified = 4,
}

impl VerificationStatus {
    /// Map the stored byte; unknown values read as `Unverified` so stale or
    /// future account versions fail closed.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Pending,
            2 => Self::Revoked,
            4 => Self::Verified,
            _ => Self::Unverified,
        }
    }
}

/// Oracle account state
///
/// Layout (all integers little-endian):
/// - `0..8`     discriminator
/// - `8..40`    authority
/// - `40..72`   queue
/// - `72..136`  gateway_uri, null padded
/// - `136..137` verification_status
/// - `137..144` padding
/// - `144..152` valid_until
/// - `152..160` last_heartbeat
/// - `160..168` lut_slot
/// - `168..200` reserved
#[derive(Debug, Clone)]
pub struct OracleAccountData {
    pub authority: Pubkey,
    /// Queue this oracle claims membership in
    pub queue: Pubkey,
    /// Raw gateway URI field; may be empty or stale
    pub gateway_uri: [u8; GATEWAY_URI_SIZE],
    pub verification_status: VerificationStatus,
    /// Enclave attestation expiry, unix seconds
    pub valid_until: i64,
    /// Last heartbeat, unix seconds
    pub last_heartbeat: i64,
    pub lut_slot: u64,
}

impl OracleAccountData {
    pub const DISCRIMINATOR: [u8; 8] = [128, 30, 16, 241, 170, 73, 55, 54];

    /// Decode an oracle account from raw account data
    pub fn decode(data: &[u8]) -> Result<Self, AccountError> {
        let mut r = AccountReader::new(data);
        r.read_discriminator(&Self::DISCRIMINATOR, "OracleAccountData")?;
        let authority = r.read_pubkey()?;
        let queue = r.read_pubkey()?;
        let gateway_uri = r.read_bytes::<GATEWAY_URI_SIZE>()?;
        let verification_status = VerificationStatus::from_u8(r.read_u8()?);
        r.skip(7)?;
        let valid_until = r.read_i64()?;
        let last_heartbeat = r.read_i64()?;
        let lut_slot = r.read_u64()?;
        Ok(Self {
            authority,
            queue,
            gateway_uri,
            verification_status,
            valid_until,
            last_heartbeat,
            lut_slot,
        })
    }

    /// The gateway URI with trailing null padding removed; `None` when the
    /// field is empty or not valid UTF-8.
    pub fn gateway_uri(&self) -> Option<String> {
        let end = self
            .gateway_uri
            .iter()
            .rposition(|&b| b != 0)
            .map(|i| i + 1)?;
        let uri = std::str::from_utf8(&self.gateway_uri[..end]).ok()?;
        if uri.is_empty() {
            None
        } else {
            Some(uri.to_string())
        }
    }

    /// Whether this oracle's enclave attestation is verified and stays valid
    /// for at least `min_validity_secs` past `now`.
    pub fn is_fresh(&self, now: i64, min_validity_secs: i64) -> bool {
        self.verification_status == VerificationStatus::Verified
            && self.valid_until > now + min_validity_secs
    }

    /// Derive the per-oracle statistics PDA
    pub fn stats_key(oracle: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"OracleStats", oracle.as_ref()], &QUORUM_PROGRAM_ID).0
    }
}

impl LutOwner for OracleAccountData {
    fn decode(data: &[u8]) -> Result<Self, AccountError> {
        OracleAccountData::decode(data)
    }

    fn lut_slot(&self) -> u64 {
        self.lut_slot
    }
}

#[cfg(test)]
pub(crate) fn encode_oracle(oracle: &OracleAccountData) -> Vec<u8> {
    let mut data = Vec::with_capacity(ORACLE_ACCOUNT_SIZE);
    data.extend_from_slice(&OracleAccountData::DISCRIMINATOR);
    data.extend_from_slice(oracle.authority.as_ref());
    data.extend_from_slice(oracle.queue.as_ref());
    data.extend_from_slice(&oracle.gateway_uri);
    data.push(oracle.verification_status as u8);
    data.extend_from_slice(&[0u8; 7]);
    data.extend_from_slice(&oracle.valid_until.to_le_bytes());
    data.extend_from_slice(&oracle.last_heartbeat.to_le_bytes());
    data.extend_from_slice(&oracle.lut_slot.to_le_bytes());
    data.resize(ORACLE_ACCOUNT_SIZE, 0);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri_bytes(uri: &str) -> [u8; GATEWAY_URI_SIZE] {
        let mut buf = [0u8; GATEWAY_URI_SIZE];
        buf[..uri.len()].copy_from_slice(uri.as_bytes());
        buf
    }

    fn sample_oracle(uri: &str) -> OracleAccountData {
        OracleAccountData {
            authority: Pubkey::new_unique(),
            queue: Pubkey::new_unique(),
            gateway_uri: uri_bytes(uri),
            verification_status: VerificationStatus::Verified,
            valid_until: 2_000_000_000,
            last_heartbeat: 1_999_990_000,
            lut_slot: 99,
        }
    }

    #[test]
    fn test_roundtrip() {
        let oracle = sample_oracle("https://gw.example.com");
        let decoded = OracleAccountData::decode(&encode_oracle(&oracle)).unwrap();
        assert_eq!(decoded.queue, oracle.queue);
        assert_eq!(decoded.verification_status, VerificationStatus::Verified);
        assert_eq!(decoded.valid_until, 2_000_000_000);
        assert_eq!(decoded.lut_slot, 99);
    }

    #[test]
    fn test_gateway_uri_trims_null_padding() {
        let oracle = sample_oracle("https://gw.example.com");
        assert_eq!(
            oracle.gateway_uri().as_deref(),
            Some("https://gw.example.com")
        );
    }

    #[test]
    fn test_empty_uri_is_none() {
        let oracle = sample_oracle("");
        assert_eq!(oracle.gateway_uri(), None);
    }

    #[test]
    fn test_freshness_window() {
        let mut oracle = sample_oracle("https://gw.example.com");
        let now = oracle.valid_until - 7200;
        assert!(oracle.is_fresh(now, 3600));
        // expires within the horizon
        assert!(!oracle.is_fresh(oracle.valid_until - 1800, 3600));
        // verified is required, not just unexpired
        oracle.verification_status = VerificationStatus::Pending;
        assert!(!oracle.is_fresh(now, 3600));
    }

    #[test]
    fn test_unknown_status_reads_unverified() {
        assert_eq!(
            VerificationStatus::from_u8(9),
            VerificationStatus::Unverified
        );
    }
}
