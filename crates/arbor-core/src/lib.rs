//! # arbor-core
//! In-memory block tree with per-branch UTXO pools, transaction validation,
//! and a staging pool for transactions awaiting inclusion.

pub mod chain;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod producer;
pub mod shared;
pub mod traits;
pub mod tx_pool;
pub mod types;
pub mod utxo;
pub mod validation;
