//! Recoverable secp256k1 signatures and signer identity recovery
//!
//! Signers are never declared by the submitter: a relayed request carries bare
//! 65-byte `r || s || v` signatures and the identity of every signer is recovered
//! from the signature over the prefixed request digest.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::errors::{CustosError, Result};
use crate::hash::{hash, hasher};
use crate::identifiers::Address;

/// 65-byte recoverable ECDSA signature (`r || s || v`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoverableSignature(pub [u8; 65]);

impl RecoverableSignature {
    /// Build from raw bytes, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 65] = bytes
            .try_into()
            .map_err(|_| CustosError::invalid_signature("signature must be 65 bytes"))?;
        Ok(Self(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature(0x{})", hex::encode(self.0))
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(digits).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Digest actually signed: `keccak("\x19Ethereum Signed Message:\n32" || digest)`.
pub fn signed_message_digest(digest: &[u8; 32]) -> [u8; 32] {
    let mut h = hasher();
    h.update(b"\x19Ethereum Signed Message:\n32");
    h.update(digest);
    h.finalize()
}

/// Identity of a public key: low 20 bytes of the Keccak hash of the uncompressed point.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Result<Address> {
    let encoded = key.to_encoded_point(false);
    let pubkey = encoded.as_bytes();
    if pubkey.len() != 65 || pubkey[0] != 0x04 {
        return Err(CustosError::invalid_signature(
            "unexpected recovered public key format",
        ));
    }
    Ok(Address::from_word_tail(&hash(&pubkey[1..])))
}

fn normalize_recovery_id(raw: u8) -> Result<RecoveryId> {
    let id = match raw {
        27 | 28 => raw - 27,
        0 | 1 => raw,
        _ => {
            return Err(CustosError::invalid_signature(
                "signature recovery id must be 0/1 or 27/28",
            ))
        }
    };
    RecoveryId::from_byte(id)
        .ok_or_else(|| CustosError::invalid_signature("signature recovery id is invalid"))
}

/// Recover the signer of `digest` (before message prefixing).
pub fn recover_signer(digest: &[u8; 32], signature: &RecoverableSignature) -> Result<Address> {
    let bytes = signature.as_bytes();
    let sig = Signature::try_from(&bytes[..64])
        .map_err(|e| CustosError::invalid_signature(format!("invalid ECDSA signature bytes: {e}")))?;
    let recovery_id = normalize_recovery_id(bytes[64])?;
    let prehash = signed_message_digest(digest);
    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id).map_err(|e| {
        CustosError::invalid_signature(format!("failed recovering signer from signature: {e}"))
    })?;
    address_from_verifying_key(&key)
}

/// A secp256k1 signing identity used by tooling and tests to produce relay signatures.
#[derive(Clone)]
pub struct SigningIdentity {
    key: SigningKey,
    address: Address,
}

impl SigningIdentity {
    /// Load from a 32-byte secret scalar.
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| CustosError::invalid(format!("invalid secp256k1 secret: {e}")))?;
        let address = address_from_verifying_key(key.verifying_key())?;
        Ok(Self { key, address })
    }

    /// Identity derived from the public key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `digest` (prefixed as in [`signed_message_digest`]).
    pub fn sign(&self, digest: &[u8; 32]) -> Result<RecoverableSignature> {
        let prehash = signed_message_digest(digest);
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| CustosError::internal(format!("signing failed: {e}")))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        Ok(RecoverableSignature(out))
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("key", &"[REDACTED]")
            .field("address", &self.address)
            .finish()
    }
}
