//! Account data deserialization helpers
//!
//! Provides utilities for safely parsing account data from byte slices.
//! All reads are bounds checked and little-endian; decoding never panics
//! on short or malformed input.

use solana_sdk::pubkey::Pubkey;

use crate::error::AccountError;

/// Account data reader with tracked offset
///
/// Reads fields sequentially from raw account bytes while automatically
/// tracking the current offset.
pub struct AccountReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], AccountError> {
        let end = self.offset.checked_add(len).ok_or(AccountError::ShortData {
            need: usize::MAX,
            have: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(AccountError::ShortData {
                need: end,
                have: self.data.len(),
            });
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Skip `len` bytes (padding or reserved fields)
    pub fn skip(&mut self, len: usize) -> Result<(), AccountError> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, AccountError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, AccountError> {
        let bytes = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64, AccountError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_i64(&mut self) -> Result<i64, AccountError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_i128(&mut self) -> Result<i128, AccountError> {
        let bytes = self.take(16)?;
        let mut buf = [0u8; 16];
        buf.copy_from_slice(bytes);
        Ok(i128::from_le_bytes(buf))
    }

    /// Read a fixed-size byte array
    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], AccountError> {
        let bytes = self.take(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    pub fn read_pubkey(&mut self) -> Result<Pubkey, AccountError> {
        Ok(Pubkey::new_from_array(self.read_bytes::<32>()?))
    }

    /// Read and verify an 8-byte account discriminator
    pub fn read_discriminator(
        &mut self,
        expected: &[u8; 8],
        kind: &'static str,
    ) -> Result<(), AccountError> {
        let got = self.read_bytes::<8>()?;
        if &got != expected {
            return Err(AccountError::BadDiscriminator { kind });
        }
        Ok(())
    }
}
