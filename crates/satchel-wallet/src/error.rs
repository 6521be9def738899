//! Wallet error types.

use satchel_core::error::{AddressError, ProviderError, ValidationError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// An unspent record or address failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Address could not be decoded or resolved to a script.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// A requested output is at or below the dust threshold.
    #[error("output of {value} is dust (threshold {threshold})")]
    DustOutput {
        /// Requested output value in satoshis.
        value: u64,
        /// Dust threshold in satoshis.
        threshold: u64,
    },

    /// Eligible unspents cannot cover the outputs plus fee.
    #[error("insufficient funds (incl. fee): have {have}, need {need}")]
    InsufficientFunds {
        /// Value accumulated before candidates ran out.
        have: u64,
        /// Last computed requirement (outputs plus fee).
        need: u64,
    },

    /// Signing key requested for an address neither chain owns.
    #[error("unknown address: {0}")]
    UnknownAddress(String),

    /// Fee exceeds the configured ceiling.
    #[error("fee {fee} exceeds maximum {max}")]
    FeeSanityExceeded {
        /// Computed fee in satoshis.
        fee: u64,
        /// Configured ceiling in satoshis.
        max: u64,
    },

    /// Built transaction does not account for every satoshi.
    #[error("inconsistent amounts: inputs {inputs}, outputs {outputs}, change {change}, fee {fee}")]
    InternalConsistency {
        inputs: u64,
        outputs: u64,
        change: u64,
        fee: u64,
    },

    /// The discovery query callback failed.
    #[error("discovery query failed: {0}")]
    DiscoveryQueryFailed(#[source] ProviderError),

    /// The chain-data provider failed outside of discovery.
    #[error("provider: {0}")]
    Provider(#[source] ProviderError),

    /// BIP32 key derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// Supplied private roots do not belong to this account.
    #[error("signing keys do not match the {0} chain")]
    KeyMismatch(String),

    /// `pop` on a chain with no addresses.
    #[error("chain has no addresses")]
    EmptyChain,

    /// An address appears in both chains.
    #[error("address {0} is present in both chains")]
    AddressCollision(String),

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Transaction assembly error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Signature creation failure.
    #[error("signing input {index}: {reason}")]
    Signing {
        /// Input position.
        index: usize,
        /// Underlying failure.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Persisted wallet state is inconsistent.
    #[error("corrupted state: {0}")]
    CorruptedState(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = WalletError::InsufficientFunds {
            have: 100,
            need: 200,
        };
        assert_eq!(e.to_string(), "insufficient funds (incl. fee): have 100, need 200");
    }

    #[test]
    fn display_dust_output() {
        let e = WalletError::DustOutput {
            value: 546,
            threshold: 546,
        };
        assert_eq!(e.to_string(), "output of 546 is dust (threshold 546)");
    }

    #[test]
    fn display_fee_sanity() {
        let e = WalletError::FeeSanityExceeded {
            fee: 20_000_000,
            max: 10_000_000,
        };
        assert_eq!(e.to_string(), "fee 20000000 exceeds maximum 10000000");
    }

    #[test]
    fn clone_and_eq() {
        let e1 = WalletError::UnknownAddress("1abc".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }

    #[test]
    fn from_validation_error() {
        let v = ValidationError::DuplicateUnspent("ab:1".into());
        let wallet: WalletError = v.clone().into();
        assert_eq!(wallet, WalletError::Validation(v));
    }

    #[test]
    fn from_address_error() {
        let a = AddressError::NonStandardScript;
        let wallet: WalletError = a.into();
        assert_eq!(wallet, WalletError::Address(AddressError::NonStandardScript));
    }

    #[test]
    fn discovery_error_wraps_provider() {
        let e = WalletError::DiscoveryQueryFailed(ProviderError::Cancelled);
        assert_eq!(e.to_string(), "discovery query failed: query cancelled");
    }
}
