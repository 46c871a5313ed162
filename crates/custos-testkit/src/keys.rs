//! Deterministic signing identities

use custos_core::hash::hash;
use custos_core::{Address, RecoverableSignature, SigningIdentity};

/// Signing identity derived from a seed label, stable across runs
#[derive(Clone)]
pub struct TestSigner {
    label: String,
    identity: SigningIdentity,
}

impl TestSigner {
    /// Derive a signer from `label`.
    pub fn from_label(label: &str) -> Self {
        // Keccak of a label is a valid secp256k1 scalar for every label we use;
        // re-hash on the negligible chance it is not.
        let mut secret = hash(label.as_bytes());
        let identity = loop {
            match SigningIdentity::from_secret(&secret) {
                Ok(identity) => break identity,
                Err(_) => secret = hash(&secret),
            }
        };
        Self {
            label: label.to_string(),
            identity,
        }
    }

    /// Label the signer was derived from.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Ledger identity.
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Sign a request digest.
    pub fn sign(&self, digest: &[u8; 32]) -> RecoverableSignature {
        self.identity
            .sign(digest)
            .expect("deterministic test key signs")
    }
}

impl std::fmt::Debug for TestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestSigner({}, {})", self.label, self.address())
    }
}
