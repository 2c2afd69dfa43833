//! Trait seams between the block tree and its collaborators.
//!
//! - [`InputVerifier`]: authorization check for a spent output. The
//!   validator and the block tree never inspect signatures themselves.

use crate::crypto;
use crate::error::CryptoError;
use crate::types::{Hash256, Transaction};

/// Checks that a transaction input is authorized to spend an output.
///
/// `owner` is the credential stored on the output being spent.
pub trait InputVerifier: Send + Sync {
    fn verify_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        owner: &Hash256,
    ) -> Result<(), CryptoError>;
}

/// Ed25519 verification against BLAKE3 pubkey-hash owners.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl InputVerifier for Ed25519Verifier {
    fn verify_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        owner: &Hash256,
    ) -> Result<(), CryptoError> {
        crypto::verify_transaction_input(tx, input_index, owner)
    }
}

/// Treats every input as authorized. Test and simulation use only.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

#[cfg(any(test, feature = "testing"))]
impl InputVerifier for AcceptAllVerifier {
    fn verify_input(&self, _: &Transaction, _: usize, _: &Hash256) -> Result<(), CryptoError> {
        Ok(())
    }
}
