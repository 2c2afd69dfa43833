//! Ed25519 signing and verification of transaction inputs.
//!
//! An output's owner credential is the BLAKE3 hash of the owner's Ed25519
//! public key. Spending it requires an input carrying that public key and a
//! signature over the input's **sighash**, which commits to:
//! - Transaction version and lock_time
//! - All input outpoints (txid + index)
//! - All outputs (value + pubkey_hash)
//! - The index of the input being signed
//!
//! Signatures and public keys are excluded from the sighash so inputs can be
//! signed independently in any order.

use ed25519_dalek::{Signer, Verifier};
use std::fmt;

use crate::error::CryptoError;
use crate::types::{Hash256, Transaction};

/// Ed25519 keypair for signing transactions.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Owner credential for outputs payable to this keypair.
    pub fn pubkey_hash(&self) -> Hash256 {
        self.public_key().pubkey_hash()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    pub fn pubkey_hash(&self) -> Hash256 {
        pubkey_hash(&self.to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

/// Compute the BLAKE3 owner credential from raw public key bytes.
pub fn pubkey_hash(pubkey_bytes: &[u8; 32]) -> Hash256 {
    Hash256(blake3::hash(pubkey_bytes).into())
}

/// Compute the signing hash (sighash) for a transaction input.
pub fn signing_hash(tx: &Transaction, input_index: usize) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());

    data.extend_from_slice(&(tx.inputs.len() as u64).to_le_bytes());
    for input in &tx.inputs {
        data.extend_from_slice(input.previous_output.txid.as_bytes());
        data.extend_from_slice(&input.previous_output.index.to_le_bytes());
    }

    data.extend_from_slice(&(tx.outputs.len() as u64).to_le_bytes());
    for output in &tx.outputs {
        data.extend_from_slice(&output.value.to_le_bytes());
        data.extend_from_slice(output.pubkey_hash.as_bytes());
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&(input_index as u64).to_le_bytes());

    Ok(Hash256(blake3::hash(&data).into()))
}

/// Sign a transaction input in place, writing signature and public key.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let sighash = signing_hash(tx, input_index)?;
    let signature = keypair.sign(sighash.as_bytes());

    let input = &mut tx.inputs[input_index];
    input.signature = signature.to_vec();
    input.public_key = keypair.public_key().to_bytes().to_vec();
    Ok(())
}

/// Sign every input of a transaction with the same keypair.
pub fn sign_all_inputs(tx: &mut Transaction, keypair: &KeyPair) -> Result<(), CryptoError> {
    for index in 0..tx.inputs.len() {
        sign_transaction_input(tx, index, keypair)?;
    }
    Ok(())
}

/// Verify a transaction input against the owner credential of the output it spends.
///
/// The input's public key must hash to `expected_pubkey_hash` and its
/// signature must verify over the input's sighash.
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    expected_pubkey_hash: &Hash256,
) -> Result<(), CryptoError> {
    let input = tx.inputs.get(input_index).ok_or(CryptoError::InputIndexOutOfBounds {
        index: input_index,
        len: tx.inputs.len(),
    })?;

    let pk_bytes: [u8; 32] = input
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let pk = PublicKey::from_bytes(&pk_bytes)?;

    if pk.pubkey_hash() != *expected_pubkey_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sig_bytes: [u8; 64] = input
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let sighash = signing_hash(tx, input_index)?;
    pk.verify(sighash.as_bytes(), &sig_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::types::{OutPoint, TxOutput};

    fn sample_tx(owner: Hash256) -> Transaction {
        Transaction::new(
            vec![
                OutPoint::new(Hash256([0x11; 32]), 0),
                OutPoint::new(Hash256([0x22; 32]), 1),
            ],
            vec![TxOutput { value: 10 * COIN, pubkey_hash: owner }],
        )
    }

    #[test]
    fn keypair_from_secret_deterministic() {
        let kp1 = KeyPair::from_secret_bytes([42u8; 32]);
        let kp2 = KeyPair::from_secret_bytes([42u8; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.pubkey_hash(), kp2.pubkey_hash());
    }

    #[test]
    fn keypair_debug_hides_secret() {
        let kp = KeyPair::from_secret_bytes([7u8; 32]);
        let debug = format!("{kp:?}");
        assert!(debug.contains("public_key"));
        assert!(!debug.contains(&hex::encode([7u8; 32])));
    }

    #[test]
    fn signing_hash_out_of_bounds() {
        let tx = sample_tx(Hash256::ZERO);
        assert_eq!(
            signing_hash(&tx, 2),
            Err(CryptoError::InputIndexOutOfBounds { index: 2, len: 2 })
        );
    }

    #[test]
    fn signing_hash_commits_to_input_index() {
        let tx = sample_tx(Hash256::ZERO);
        assert_ne!(signing_hash(&tx, 0).unwrap(), signing_hash(&tx, 1).unwrap());
    }

    #[test]
    fn sign_then_verify_each_input() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let mut tx = sample_tx(Hash256([0xAA; 32]));
        sign_all_inputs(&mut tx, &kp).unwrap();
        assert!(verify_transaction_input(&tx, 0, &kp.pubkey_hash()).is_ok());
        assert!(verify_transaction_input(&tx, 1, &kp.pubkey_hash()).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_owner() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let other = KeyPair::from_secret_bytes([2u8; 32]);
        let mut tx = sample_tx(Hash256::ZERO);
        sign_all_inputs(&mut tx, &kp).unwrap();
        assert_eq!(
            verify_transaction_input(&tx, 0, &other.pubkey_hash()),
            Err(CryptoError::PubkeyHashMismatch)
        );
    }

    #[test]
    fn verify_rejects_tampered_output() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let mut tx = sample_tx(Hash256::ZERO);
        sign_all_inputs(&mut tx, &kp).unwrap();
        tx.outputs[0].value += 1;
        assert_eq!(
            verify_transaction_input(&tx, 0, &kp.pubkey_hash()),
            Err(CryptoError::VerificationFailed)
        );
    }

    #[test]
    fn verify_rejects_unsigned_input() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let tx = sample_tx(Hash256::ZERO);
        assert_eq!(
            verify_transaction_input(&tx, 0, &kp.pubkey_hash()),
            Err(CryptoError::InvalidPublicKey)
        );
    }
}
