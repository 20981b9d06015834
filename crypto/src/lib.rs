// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crypto facade for the ChainBFT core.
//!
//! Keys are derived deterministically from replica numbers at startup so
//! that every replica shares a common public-key table. The facade is a
//! plain value handed to constructors rather than process-global state,
//! which keeps tests hermetic. A threshold or BLS scheme can replace the
//! per-signer verification without changing the protocol, as long as
//! [`KeyStore::verify_quorum`] stays a total predicate over the
//! `(agg_sig, signers)` pair.

use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature as EcdsaSignature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

mod hash;

pub use hash::{hash, make_id, Identifier, IDENTIFIER_LENGTH};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature scheme {0} is not implemented")]
    UnsupportedScheme(SignatureScheme),
    #[error("unknown signature scheme {0:?}")]
    UnknownScheme(String),
    #[error("no key material for node {0}")]
    UnknownNode(u64),
    #[error("key derivation failed for node {0}")]
    KeyDerivation(u64),
}

/// Supported signing algorithms. `EcdsaSecp256k1` and `BlsBls12381` are
/// reserved identifiers; selecting them fails cleanly at key generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    #[serde(rename = "ECDSA_P256")]
    EcdsaP256,
    #[serde(rename = "ECDSA_SECp256k1")]
    EcdsaSecp256k1,
    #[serde(rename = "BLS_BLS12381")]
    BlsBls12381,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureScheme::EcdsaP256 => "ECDSA_P256",
            SignatureScheme::EcdsaSecp256k1 => "ECDSA_SECp256k1",
            SignatureScheme::BlsBls12381 => "BLS_BLS12381",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SignatureScheme {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ECDSA_P256" => Ok(SignatureScheme::EcdsaP256),
            "ECDSA_SECp256k1" => Ok(SignatureScheme::EcdsaSecp256k1),
            "BLS_BLS12381" => Ok(SignatureScheme::BlsBls12381),
            other => Err(CryptoError::UnknownScheme(other.to_string())),
        }
    }
}

/// A detached signature in the fleet's fixed-width encoding.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

/// An ordered list of per-signer signatures, paired positionally with a
/// signer list.
pub type AggSig = Vec<Signature>;

/// Key-addressed signer and verifier for a fixed fleet of `n` replicas,
/// numbered `1..=n`.
pub struct KeyStore {
    scheme: SignatureScheme,
    signing_keys: Vec<SigningKey>,
    verifying_keys: Vec<VerifyingKey>,
}

impl KeyStore {
    /// Derives the fleet-wide key table. Every replica runs this with the
    /// same `(scheme, n)` and obtains identical keys.
    pub fn generate(scheme: SignatureScheme, n: usize) -> Result<Self, CryptoError> {
        match scheme {
            SignatureScheme::EcdsaP256 => {}
            other => return Err(CryptoError::UnsupportedScheme(other)),
        }
        let mut signing_keys = Vec::with_capacity(n);
        let mut verifying_keys = Vec::with_capacity(n);
        for node in 1..=n as u64 {
            let key = Self::derive_key(node)?;
            verifying_keys.push(*key.verifying_key());
            signing_keys.push(key);
        }
        Ok(KeyStore {
            scheme,
            signing_keys,
            verifying_keys,
        })
    }

    fn derive_key(node: u64) -> Result<SigningKey, CryptoError> {
        let mut hasher = Sha256::new();
        hasher.update(b"chainbft::node_key");
        hasher.update(node.to_le_bytes());
        let seed = hasher.finalize();
        // A 256-bit digest falls outside the P-256 scalar field with
        // negligible probability; surface the error rather than retry.
        SigningKey::from_slice(seed.as_slice()).map_err(|_| CryptoError::KeyDerivation(node))
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn fleet_size(&self) -> usize {
        self.signing_keys.len()
    }

    /// Signs `data` with the private key of `node`.
    pub fn sign(&self, data: &[u8], node: u64) -> Result<Signature, CryptoError> {
        let key = self
            .signing_keys
            .get(node.wrapping_sub(1) as usize)
            .ok_or(CryptoError::UnknownNode(node))?;
        let sig: EcdsaSignature = key.sign(data);
        Ok(Signature(sig.to_vec()))
    }

    /// Verifies `sig` over `data` under the public key of `node`. Malformed
    /// signatures and unknown nodes verify as false.
    pub fn verify(&self, sig: &Signature, data: &[u8], node: u64) -> bool {
        let Some(key) = self.verifying_keys.get(node.wrapping_sub(1) as usize) else {
            return false;
        };
        let Ok(sig) = EcdsaSignature::from_slice(&sig.0) else {
            return false;
        };
        key.verify(data, &sig).is_ok()
    }

    /// Verifies an aggregate: succeeds iff the lists pair up exactly and
    /// every signature verifies under the paired signer's key over `data`.
    pub fn verify_quorum(&self, agg_sig: &[Signature], data: &[u8], signers: &[u64]) -> bool {
        if agg_sig.len() != signers.len() {
            return false;
        }
        signers
            .iter()
            .zip(agg_sig)
            .all(|(&signer, sig)| self.verify(sig, data, signer))
    }
}
