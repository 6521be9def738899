//! The wallet's view of spendable outputs.
//!
//! The set is replaced wholesale by the chain-data provider. Every record in
//! a batch is validated before anything is stored, so a rejected batch
//! leaves the previous set in place.

use std::collections::HashSet;

use satchel_core::constants::{MAX_MONEY, TXID_HEX_LEN};
use satchel_core::error::ValidationError;
use satchel_core::traits::AddressCodec;
use satchel_core::types::Unspent;
use tracing::debug;

/// Validated unspent outputs, in provider order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnspentSet {
    unspents: Vec<Unspent>,
}

impl UnspentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a batch, validating it first.
    pub fn from_records(
        records: Vec<Unspent>,
        codec: &dyn AddressCodec,
    ) -> Result<Self, ValidationError> {
        validate_batch(&records, codec)?;
        Ok(Self { unspents: records })
    }

    /// Replace the whole set. On error the current set is unchanged.
    pub fn replace(
        &mut self,
        records: Vec<Unspent>,
        codec: &dyn AddressCodec,
    ) -> Result<(), ValidationError> {
        validate_batch(&records, codec)?;
        debug!(
            previous = self.unspents.len(),
            count = records.len(),
            "unspent set replaced"
        );
        self.unspents = records;
        Ok(())
    }

    /// Sum of all values.
    pub fn balance(&self) -> u64 {
        self.unspents
            .iter()
            .fold(0u64, |acc, u| acc.saturating_add(u.value))
    }

    /// Sum of values with at least `min_confirmations` confirmations.
    pub fn confirmed_balance(&self, min_confirmations: u32) -> u64 {
        self.eligible(min_confirmations)
            .fold(0u64, |acc, u| acc.saturating_add(u.value))
    }

    /// Records with at least `min_confirmations` confirmations, in stored order.
    pub fn eligible(&self, min_confirmations: u32) -> impl Iterator<Item = &Unspent> {
        self.unspents
            .iter()
            .filter(move |u| u.confirmations >= min_confirmations)
    }

    pub fn as_slice(&self) -> &[Unspent] {
        &self.unspents
    }

    pub fn len(&self) -> usize {
        self.unspents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unspents.is_empty()
    }
}

/// Check one record in isolation.
pub fn validate_unspent(unspent: &Unspent, codec: &dyn AddressCodec) -> Result<(), ValidationError> {
    if unspent.tx_id.len() != TXID_HEX_LEN
        || !unspent.tx_id.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(ValidationError::InvalidTxId(unspent.tx_id.clone()));
    }
    if unspent.value > MAX_MONEY {
        return Err(ValidationError::ValueOutOfRange(unspent.value));
    }
    codec
        .validate_address(&unspent.address)
        .map_err(|e| ValidationError::InvalidAddress {
            address: unspent.address.clone(),
            reason: e.to_string(),
        })
}

/// Check every record and reject duplicate `(txId, vout)` keys.
///
/// Hex case is ignored when comparing txids.
pub fn validate_batch(records: &[Unspent], codec: &dyn AddressCodec) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(records.len());
    for unspent in records {
        validate_unspent(unspent, codec)?;
        if !seen.insert((unspent.tx_id.to_ascii_lowercase(), unspent.vout)) {
            return Err(ValidationError::DuplicateUnspent(unspent.key()));
        }
    }
    Ok(())
}
