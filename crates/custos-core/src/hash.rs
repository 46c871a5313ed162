//! Keccak-256 hashing for request digests, signer identities and call selectors
//!
//! Hashing is pure and synchronous, so it lives outside the effect system. The
//! algorithm is declared once in [`ALGORITHM`]; every caller goes through [`hash`]
//! or [`hasher`] so the choice cannot drift between the request hash, signer
//! recovery and selector derivation.
//!
//! ```ignore
//! use custos_core::hash::{hash, selector};
//!
//! let digest = hash(b"hello world");
//! let approve = selector("approve(address,uint256)");
//! assert_eq!(approve, [0x09, 0x5e, 0xa7, 0xb3]);
//! ```

use sha3::{Digest, Keccak256};
use std::fmt;

/// Synchronous trait for 32-byte cryptographic hashing
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    /// Hash arbitrary bytes to a 32-byte digest
    fn hash(&self, data: &[u8]) -> [u8; 32];

    /// Create an incremental hasher for multi-part data
    fn hasher(&self) -> Box<dyn Hasher>;
}

/// Trait for incremental hashing of multi-part data
pub trait Hasher: Send {
    /// Update the hasher with more data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hasher and return the 32-byte digest
    fn finalize(self: Box<Self>) -> [u8; 32];
}

/// Keccak-256 (the pre-standard SHA-3 variant used by EVM ledgers)
#[derive(Debug, Clone, Copy)]
pub struct Keccak256Algorithm;

impl HashAlgorithm for Keccak256Algorithm {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        let mut output = [0u8; 32];
        output.copy_from_slice(&hasher.finalize());
        output
    }

    fn hasher(&self) -> Box<dyn Hasher> {
        Box::new(Keccak256Hasher(Keccak256::new()))
    }
}

struct Keccak256Hasher(Keccak256);

impl Hasher for Keccak256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> [u8; 32] {
        let mut output = [0u8; 32];
        output.copy_from_slice(&self.0.finalize());
        output
    }
}

/// The hash algorithm used throughout the system.
pub const ALGORITHM: Keccak256Algorithm = Keccak256Algorithm;

/// Hash bytes with the global algorithm.
#[inline]
pub fn hash(data: &[u8]) -> [u8; 32] {
    ALGORITHM.hash(data)
}

/// Incremental hasher using the global algorithm.
#[inline]
pub fn hasher() -> Box<dyn Hasher> {
    ALGORITHM.hasher()
}

/// 4-byte call selector for a canonical function signature such as
/// `"transfer(address,uint256)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = hash(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}
