//! Well-known addresses and PDA derivations

use solana_sdk::pubkey::Pubkey;

/// The Quorum oracle program
pub const QUORUM_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("QrmNetwork111111111111111111111111111111111");

/// Address of the SPL Token program
pub const SPL_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Address of the SPL Associated Token Account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Mint of wrapped native SOL
pub const NATIVE_MINT: Pubkey =
    Pubkey::from_str_const("So11111111111111111111111111111111111111112");

/// Derive the associated token address for a wallet and mint
pub fn get_associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            wallet.as_ref(),
            SPL_TOKEN_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Derive the program state PDA
pub fn program_state_key() -> Pubkey {
    Pubkey::find_program_address(&[b"STATE"], &QUORUM_PROGRAM_ID).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_key_is_deterministic() {
        assert_eq!(program_state_key(), program_state_key());
    }

    #[test]
    fn test_ata_differs_per_wallet() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_ne!(
            get_associated_token_address(&a, &NATIVE_MINT),
            get_associated_token_address(&b, &NATIVE_MINT)
        );
    }
}
