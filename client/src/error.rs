//! Client error taxonomy
//!
//! Transport and per-feed failures are recoverable and are collected into
//! structured failure lists alongside partial successes; only cross-cutting
//! invariant violations (message mismatch, empty signature set) abort an
//! entire call.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Gateway HTTP request failed (connection, timeout, bad status)
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Ledger RPC request failed
    #[error("rpc request failed: {0}")]
    Rpc(#[from] Box<solana_client::client_error::ClientError>),

    /// On-ledger account bytes did not decode
    #[error("account decode failed: {0}")]
    AccountDecode(#[from] quorum_accounts::AccountError),

    #[error("account {0} not found")]
    AccountNotFound(Pubkey),

    /// The queue has no healthy, usable gateway
    #[error("no gateway available on queue {queue}")]
    NoGatewayAvailable { queue: Pubkey },

    /// No member oracle is enclave-verified with enough validity left
    #[error("no fresh oracle available on queue {queue}")]
    NoFreshOracle { queue: Pubkey },

    #[error("feed list is empty")]
    EmptyFeedList,

    /// All feeds of one consensus batch must live on a single queue
    #[error("feed {feed} is on queue {actual}, expected {expected}")]
    QueueMismatch {
        feed: Pubkey,
        actual: Pubkey,
        expected: Pubkey,
    },

    /// A gateway response field failed to parse
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),

    /// Bounded retry exhausted; carries the attempt count and last error
    #[error("gateway request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Nothing to encode
    #[error("signature set is empty")]
    EmptySignatureSet,

    /// Signed messages must be byte-identical across the whole set; a
    /// mismatch means the verification instruction would attest to a
    /// different payload than intended.
    #[error(
        "signature #{index} covers a different message: expected {expected}, got {actual}"
    )]
    SignatureMessageMismatch {
        index: usize,
        /// base64 of the expected (first) message
        expected: String,
        /// base64 of the mismatching message
        actual: String,
    },

    /// The signature set exceeds what the instruction layout can address
    #[error("signature set does not fit the verification instruction layout")]
    EncodingOverflow,

    /// Every oracle failed; carries the per-oracle failure strings
    #[error("no successful oracle responses: {}", failures.join("; "))]
    NoSuccessfulResponses { failures: Vec<String> },
}

impl From<solana_client::client_error::ClientError> for ClientError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        ClientError::Rpc(Box::new(err))
    }
}
