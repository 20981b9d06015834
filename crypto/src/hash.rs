// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Content-addressed identifiers.
//!
//! An [`Identifier`] is the fixed-width hash naming a block (or any other
//! canonically serializable value). The canonical form is the fleet-wide
//! bincode encoding; the digest is SHA-256.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Width of an [`Identifier`] in bytes.
pub const IDENTIFIER_LENGTH: usize = 32;

/// A fixed-width content hash.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Identifier([u8; IDENTIFIER_LENGTH]);

impl Identifier {
    /// The all-zero identifier, reserved for the genesis block.
    pub const fn zero() -> Self {
        Identifier([0; IDENTIFIER_LENGTH])
    }

    pub fn new(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
        Identifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; IDENTIFIER_LENGTH]
    }

    /// Short hex prefix used in log lines.
    pub fn short_str(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.short_str())
    }
}

/// Hash raw bytes into an identifier.
pub fn hash(bytes: &[u8]) -> Identifier {
    let digest = Sha256::digest(bytes);
    Identifier(digest.into())
}

/// Hash the canonical serialization of a value.
///
/// Serialization of the in-memory protocol types cannot fail, so the result
/// is total over well-formed values.
pub fn make_id<T: Serialize>(value: &T) -> Identifier {
    let bytes = bincode::serialize(value).expect("canonical serialization cannot fail");
    hash(&bytes)
}
