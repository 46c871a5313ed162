//! Ledger time
//!
//! Every timelocked transition is evaluated lazily against the ledger time of the
//! transaction that observes it. There is no scheduler: "pending" becomes
//! "effective" only as a function of `timestamp` compared to a stored deadline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block height and timestamp (seconds) of the executing ledger transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerTime {
    /// Current block height
    pub block: u64,
    /// Current block timestamp in seconds
    pub timestamp: u64,
}

impl LedgerTime {
    /// Create a ledger time.
    pub const fn new(block: u64, timestamp: u64) -> Self {
        Self { block, timestamp }
    }

    /// `timestamp + delay`, saturating.
    pub fn after(&self, delay: u64) -> u64 {
        self.timestamp.saturating_add(delay)
    }

    /// Whether `deadline` has been reached.
    pub fn reached(&self, deadline: u64) -> bool {
        self.timestamp >= deadline
    }
}

impl fmt::Display for LedgerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} @ {}s", self.block, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlines() {
        let now = LedgerTime::new(10, 100);
        assert_eq!(now.after(5), 105);
        assert_eq!(LedgerTime::new(0, u64::MAX).after(1), u64::MAX);
        assert!(now.reached(100));
        assert!(!now.reached(101));
    }
}
