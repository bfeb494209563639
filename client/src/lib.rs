//! Quorum consensus-collection client
//!
//! Client-side subsystem of the Quorum decentralized price-oracle network.
//! It discovers gateway endpoints from an on-ledger oracle queue, solicits
//! signed attestations in parallel, computes the median consensus value per
//! feed, and assembles the secp256k1 verification + submission instruction
//! pair (with address-lookup-table compression) that the on-chain program
//! verifies byte-for-byte.
//!
//! Signing and broadcast are out of scope; callers receive ready-to-submit
//! instructions and account lists.

pub mod assembler;
pub mod collector;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod health;
pub mod jobs;
pub mod lut;
pub mod secp;

pub use assembler::*;
pub use collector::*;
pub use config::*;
pub use context::*;
pub use directory::*;
pub use error::*;
pub use gateway::*;
pub use health::*;
pub use jobs::*;
pub use lut::*;
pub use secp::*;
