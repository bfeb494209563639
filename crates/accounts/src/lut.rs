//! Address lookup table derivations
//!
//! Queue, oracle and feed accounts each own one address lookup table,
//! created at the slot recorded in their `lut_slot` field by a per-account
//! signer PDA. Deriving the table address therefore needs only the owning
//! account's key and that slot.

use solana_sdk::address_lookup_table::instruction::derive_lookup_table_address;
use solana_sdk::pubkey::Pubkey;

use crate::addresses::QUORUM_PROGRAM_ID;
use crate::error::AccountError;

/// An account kind that owns an address lookup table
pub trait LutOwner: Sized {
    fn decode(data: &[u8]) -> Result<Self, AccountError>;

    /// Slot the owner's lookup table was created at
    fn lut_slot(&self) -> u64;
}

/// Derive the lookup-table authority PDA for an owning account
pub fn lut_signer_key(owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"LutSigner", owner.as_ref()], &QUORUM_PROGRAM_ID).0
}

/// Derive the lookup table address for an owning account
pub fn lookup_table_key(owner: &Pubkey, lut_slot: u64) -> Pubkey {
    let signer = lut_signer_key(owner);
    derive_lookup_table_address(&signer, lut_slot).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_key_depends_on_owner_and_slot() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_ne!(lookup_table_key(&a, 5), lookup_table_key(&b, 5));
        assert_ne!(lookup_table_key(&a, 5), lookup_table_key(&a, 6));
        assert_eq!(lookup_table_key(&a, 5), lookup_table_key(&a, 5));
    }
}
