//! Error types shared across Satchel crates.
use thiserror::Error;

/// Rejections raised while validating externally supplied unspent records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected 64 hex character txId, got {0:?}")] InvalidTxId(String),
    #[error("invalid address {address:?}: {reason}")] InvalidAddress { address: String, reason: String },
    #[error("value out of range: {0}")] ValueOutOfRange(u64),
    #[error("duplicate unspent {0}")] DuplicateUnspent(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address {0:?}")] Invalid(String),
    #[error("address {address} is not valid for {network}")] WrongNetwork { address: String, network: String },
    #[error("script has no standard address form")] NonStandardScript,
}

/// Failures reported by the external chain-data provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("query failed: {0}")] Query(String),
    #[error("query cancelled")] Cancelled,
    #[error("expected {expected} results, got {got}")] ResultLength { expected: usize, got: usize },
}
