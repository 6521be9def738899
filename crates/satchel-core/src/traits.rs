//! Collaborator interfaces for the Satchel wallet.
//!
//! These traits describe everything the wallet core needs from the outside:
//! - [`AddressCodec`] — address ⇄ locking script conversion and validation
//! - [`FeeEstimator`] — fee for an estimated transaction size
//! - [`AddressQuery`] — "has this address ever been used" lookups for discovery
//! - [`UnspentSource`] — unspent outputs for a set of addresses

use async_trait::async_trait;
use bitcoin::{Network, Script, ScriptBuf};

use crate::error::{AddressError, ProviderError};
use crate::types::Unspent;

/// Converts between encoded addresses and locking scripts for one network.
pub trait AddressCodec: Send + Sync {
    /// The network addresses are checked against.
    fn network(&self) -> Network;

    /// Resolve an address to the script that locks funds to it.
    fn address_to_script(&self, address: &str) -> Result<ScriptBuf, AddressError>;

    /// Recover the address a standard locking script pays to.
    fn script_to_address(&self, script: &Script) -> Result<String, AddressError>;

    /// Check that an address decodes for this network.
    ///
    /// Default implementation delegates to [`address_to_script`](Self::address_to_script).
    fn validate_address(&self, address: &str) -> Result<(), AddressError> {
        self.address_to_script(address).map(|_| ())
    }
}

/// Fee estimation for a transaction of a given serialized size.
///
/// Implementations may apply a minimum relay floor; the only contract is
/// that the result is a whole number of satoshis.
pub trait FeeEstimator: Send + Sync {
    fn estimate_fee(&self, byte_length: usize) -> u64;
}

/// Used/unused lookups backing gap-limit discovery.
///
/// Each call is one suspend point; discovery awaits one batch before
/// deriving the next, so results must come back in request order.
#[async_trait]
pub trait AddressQuery: Send + Sync {
    /// For each address, whether it has ever received a transaction.
    ///
    /// The returned vector must have exactly `addresses.len()` entries.
    async fn used(&self, addresses: &[String]) -> Result<Vec<bool>, ProviderError>;
}

/// Source of unspent outputs for wallet addresses.
#[async_trait]
pub trait UnspentSource: Send + Sync {
    async fn unspents(&self, addresses: &[String]) -> Result<Vec<Unspent>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat(u64);

    impl FeeEstimator for Flat {
        fn estimate_fee(&self, _byte_length: usize) -> u64 {
            self.0
        }
    }

    struct EveryOther;

    #[async_trait]
    impl AddressQuery for EveryOther {
        async fn used(&self, addresses: &[String]) -> Result<Vec<bool>, ProviderError> {
            Ok(addresses.iter().enumerate().map(|(i, _)| i % 2 == 0).collect())
        }
    }

    #[test]
    fn fee_estimator_is_object_safe() {
        let est: &dyn FeeEstimator = &Flat(7);
        assert_eq!(est.estimate_fee(1000), 7);
    }

    #[tokio::test]
    async fn address_query_preserves_order() {
        let q: &dyn AddressQuery = &EveryOther;
        let res = q
            .used(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(res, vec![true, false, true]);
    }
}
