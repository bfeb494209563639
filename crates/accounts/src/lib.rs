//! Account layouts and byte codecs for the Quorum oracle network
//!
//! The on-ledger program stores queues, oracles and feeds as fixed-width
//! accounts. This crate decodes them with explicit, documented byte offsets
//! (no runtime reflection) and provides the address derivations the client
//! needs: associated token accounts, per-oracle stats PDAs and address
//! lookup table keys.

pub mod addresses;
pub mod error;
pub mod feed;
pub mod lut;
pub mod oracle;
pub mod queue;
pub mod reader;
pub mod slot_hashes;

pub use addresses::*;
pub use error::*;
pub use feed::*;
pub use lut::*;
pub use oracle::*;
pub use queue::*;
pub use reader::*;
pub use slot_hashes::*;
