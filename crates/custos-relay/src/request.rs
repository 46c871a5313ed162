//! Relay requests and their canonical hash

use custos_core::hash::hasher;
use custos_core::{Address, CustosError, FeatureId, Nonce, RecoverableSignature, Result};
use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Gas limit used when a request does not set one.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// An off-chain signed instruction submitted on behalf of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    /// Chain the request is valid on
    pub chain_id: u64,
    /// Acting wallet
    pub wallet: Address,
    /// Feature the operation is addressed to
    pub feature: FeatureId,
    /// Requested operation
    pub operation: Operation,
    /// Replay protection
    pub nonce: Nonce,
    /// Maximum gas the request may consume
    pub gas_limit: u64,
    /// Refund rate; zero disables the refund
    #[serde(default)]
    pub gas_price: u128,
    /// Refund token; `None` refunds in the native token
    #[serde(default)]
    pub refund_token: Option<Address>,
    /// Refund recipient; `None` refunds the submitter
    #[serde(default)]
    pub refund_recipient: Option<Address>,
    /// Signatures over [`RelayRequest::hash`]
    #[serde(default)]
    pub signatures: Vec<RecoverableSignature>,
}

impl RelayRequest {
    /// Unsigned request with the default gas limit and no refund.
    pub fn new(chain_id: u64, wallet: Address, feature: FeatureId, operation: Operation, nonce: Nonce) -> Self {
        Self {
            chain_id,
            wallet,
            feature,
            operation,
            nonce,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: 0,
            refund_token: None,
            refund_recipient: None,
            signatures: Vec::new(),
        }
    }

    /// Set the gas limit and refund rate.
    pub fn with_gas(mut self, gas_limit: u64, gas_price: u128) -> Self {
        self.gas_limit = gas_limit;
        self.gas_price = gas_price;
        self
    }

    /// Set the refund token and recipient.
    pub fn with_refund(mut self, token: Option<Address>, recipient: Option<Address>) -> Self {
        self.refund_token = token;
        self.refund_recipient = recipient;
        self
    }

    /// Canonical hash binding every field except the signatures to the relay
    /// executor identity.
    pub fn hash(&self, relayer: Address) -> Result<[u8; 32]> {
        let operation = bincode::serialize(&self.operation)
            .map_err(|e| CustosError::serialization(format!("operation encoding failed: {e}")))?;
        let mut h = hasher();
        h.update(&[0x19, 0x00]);
        h.update(relayer.as_bytes());
        h.update(&self.chain_id.to_be_bytes());
        h.update(self.wallet.as_bytes());
        h.update(self.feature.0.as_bytes());
        h.update(&(operation.len() as u64).to_be_bytes());
        h.update(&operation);
        h.update(&self.nonce.to_be_bytes());
        h.update(&self.gas_limit.to_be_bytes());
        h.update(&self.gas_price.to_be_bytes());
        for slot in [self.refund_token, self.refund_recipient] {
            match slot {
                Some(address) => {
                    h.update(&[1]);
                    h.update(address.as_bytes());
                }
                None => h.update(&[0]),
            }
        }
        Ok(h.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RelayRequest {
        RelayRequest::new(
            1,
            Address::repeat_byte(0xaa),
            FeatureId(Address::repeat_byte(0xf1)),
            Operation::Lock,
            Nonce::new(1, 1),
        )
    }

    #[test]
    fn test_hash_binds_every_field() {
        let relayer = Address::repeat_byte(0x7e);
        let base = request().hash(relayer).unwrap();
        assert_eq!(base, request().hash(relayer).unwrap());

        let variants = [
            RelayRequest {
                chain_id: 2,
                ..request()
            },
            RelayRequest {
                nonce: Nonce::new(1, 2),
                ..request()
            },
            RelayRequest {
                operation: Operation::Unlock,
                ..request()
            },
            request().with_gas(DEFAULT_GAS_LIMIT, 1),
            request().with_refund(None, Some(Address::ZERO)),
        ];
        for variant in variants {
            assert_ne!(variant.hash(relayer).unwrap(), base);
        }
        assert_ne!(request().hash(Address::repeat_byte(1)).unwrap(), base);
    }

    #[test]
    fn test_signatures_are_not_hashed() {
        let relayer = Address::repeat_byte(0x7e);
        let mut signed = request();
        signed.signatures.push(RecoverableSignature([7u8; 65]));
        assert_eq!(signed.hash(relayer).unwrap(), request().hash(relayer).unwrap());
    }

    #[test]
    fn test_json_defaults() {
        let json = format!(
            r#"{{"chain_id":1,"wallet":"{}","feature":"{}","operation":"lock","nonce":{{"block":1,"counter":1}},"gas_limit":1000000}}"#,
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xf1)
        );
        let parsed: RelayRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request());
    }
}
