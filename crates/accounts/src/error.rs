//! Account decoding errors

use thiserror::Error;

/// Errors produced while decoding on-ledger account data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Account data ended before the requested field
    #[error("account data too short: need {need} bytes, have {have}")]
    ShortData { need: usize, have: usize },

    /// The 8-byte discriminator did not match the expected account kind
    #[error("unexpected discriminator for {kind}")]
    BadDiscriminator { kind: &'static str },

    /// A field held a value outside its documented domain
    #[error("invalid value for field {field}")]
    InvalidField { field: &'static str },
}
