//! Token registry seam
//!
//! Token bookkeeping is an external service; filters only ask whether a token
//! may be traded.

use custos_core::Address;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Sentinel the aggregator uses for the native token.
pub const NATIVE_TOKEN: Address = Address::repeat_byte(0xee);

/// Answers "is this token tradable"
pub trait TokenRegistry: Send + Sync {
    /// Whether `token` may be traded by wallets.
    fn is_tradable(&self, token: &Address) -> bool;
}

impl<T: TokenRegistry + ?Sized> TokenRegistry for Arc<T> {
    fn is_tradable(&self, token: &Address) -> bool {
        (**self).is_tradable(token)
    }
}

impl<T: TokenRegistry + ?Sized> TokenRegistry for &T {
    fn is_tradable(&self, token: &Address) -> bool {
        (**self).is_tradable(token)
    }
}

/// Fixed allow-list of tradable tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradableTokens {
    tokens: BTreeSet<Address>,
}

impl TradableTokens {
    /// Create from a list of tokens.
    pub fn new(tokens: impl IntoIterator<Item = Address>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Mark a token tradable.
    pub fn insert(&mut self, token: Address) {
        self.tokens.insert(token);
    }
}

impl TokenRegistry for TradableTokens {
    fn is_tradable(&self, token: &Address) -> bool {
        self.tokens.contains(token)
    }
}
