//! secp256k1 verification instruction codec
//!
//! Encodes a set of independently produced signatures over one shared
//! message into the byte layout the native secp256k1 verification program
//! expects. This is a pure, deterministic layout function with no I/O; all
//! offsets are relative to the start of the instruction data and must point
//! at the exact byte where each field begins.
//!
//! Layout:
//! - 1 byte signature count
//! - per signature, an 11-byte offsets record:
//!   signature offset (u16 LE) · signature ix index (u8) ·
//!   address offset (u16 LE) · address ix index (u8) ·
//!   message offset (u16 LE) · message length (u16 LE) · message ix index (u8)
//! - per signature, an 85-byte data block:
//!   64-byte signature · 1-byte recovery id · 20-byte identity hash
//! - the shared message, exactly once

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use solana_sdk::instruction::Instruction;
use solana_sdk::secp256k1_program;

use crate::error::{ClientError, Result};

/// Serialized size of a secp256k1 signature
pub const SIGNATURE_SERIALIZED_SIZE: usize = 64;
/// Serialized size of a hashed public key
pub const HASHED_PUBKEY_SERIALIZED_SIZE: usize = 20;
/// Serialized size of one offsets record
pub const SIGNATURE_OFFSETS_SERIALIZED_SIZE: usize = 11;
/// Serialized size of one signature data block
pub const SIGNATURE_BLOCK_SIZE: usize =
    SIGNATURE_SERIALIZED_SIZE + 1 + HASHED_PUBKEY_SERIALIZED_SIZE;

/// One oracle's signature over the shared round message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secp256k1Signature {
    /// 20-byte hash identifying the signing key
    pub eth_address: [u8; HASHED_PUBKEY_SERIALIZED_SIZE],
    pub signature: [u8; SIGNATURE_SERIALIZED_SIZE],
    pub recovery_id: u8,
    /// The signed message; must be byte-identical across the whole set
    pub message: Vec<u8>,
}

/// Build the verification instruction for `signatures`, all of which must
/// cover one byte-identical message.
///
/// The shared-message precondition is checked, not assumed: a mismatched
/// entry fails with an error naming the offending index and both messages,
/// because encoding it would produce an instruction that attests to a
/// different payload than intended.
pub fn build_secp256k1_instruction(
    signatures: &[Secp256k1Signature],
    instruction_index: u8,
) -> Result<Instruction> {
    let first = signatures.first().ok_or(ClientError::EmptySignatureSet)?;
    for (index, sig) in signatures.iter().enumerate().skip(1) {
        if sig.message != first.message {
            return Err(ClientError::SignatureMessageMismatch {
                index,
                expected: BASE64.encode(&first.message),
                actual: BASE64.encode(&sig.message),
            });
        }
    }

    let count = signatures.len();
    let offsets_area_size = 1 + count * SIGNATURE_OFFSETS_SERIALIZED_SIZE;
    let message_offset = offsets_area_size + count * SIGNATURE_BLOCK_SIZE;
    let total_size = message_offset + first.message.len();
    if count > u8::MAX as usize || total_size > u16::MAX as usize {
        return Err(ClientError::EncodingOverflow);
    }

    let mut data = Vec::with_capacity(total_size);
    data.push(count as u8);

    for index in 0..count {
        let signature_offset = offsets_area_size + index * SIGNATURE_BLOCK_SIZE;
        let address_offset = signature_offset + SIGNATURE_SERIALIZED_SIZE + 1;
        data.extend_from_slice(&(signature_offset as u16).to_le_bytes());
        data.push(instruction_index);
        data.extend_from_slice(&(address_offset as u16).to_le_bytes());
        data.push(instruction_index);
        data.extend_from_slice(&(message_offset as u16).to_le_bytes());
        data.extend_from_slice(&(first.message.len() as u16).to_le_bytes());
        data.push(instruction_index);
    }

    for sig in signatures {
        data.extend_from_slice(&sig.signature);
        data.push(sig.recovery_id);
        data.extend_from_slice(&sig.eth_address);
    }

    data.extend_from_slice(&first.message);
    debug_assert_eq!(data.len(), total_size);

    Ok(Instruction {
        program_id: secp256k1_program::ID,
        accounts: vec![],
        data,
    })
}
