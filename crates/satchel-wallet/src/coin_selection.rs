//! Deterministic greedy coin selection.
//!
//! Candidates are spent largest first. Fees are ignored until the running
//! total covers the requested outputs; from then on each step compares the
//! cost of the transaction with and without a change output, preferring
//! the variant that keeps change.
//!
//! Transaction size is estimated from fixed pay-to-pubkey-hash
//! contributions ([`TX_EMPTY_SIZE`], [`TX_PUBKEYHASH_INPUT`],
//! [`TX_PUBKEYHASH_OUTPUT`]); the real signed size may differ by a few bytes.

use satchel_core::constants::{MAX_MONEY, TX_EMPTY_SIZE, TX_PUBKEYHASH_INPUT, TX_PUBKEYHASH_OUTPUT};
use satchel_core::traits::FeeEstimator;
use satchel_core::types::Unspent;
use tracing::debug;

use crate::error::WalletError;

/// How the fee is determined.
#[derive(Clone, Copy)]
pub enum FeePolicy<'a> {
    /// Fee is a function of estimated byte length.
    Rate(&'a dyn FeeEstimator),
    /// Fee is a flat amount regardless of size.
    Fixed(u64),
}

impl std::fmt::Debug for FeePolicy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeePolicy::Rate(_) => f.write_str("Rate(..)"),
            FeePolicy::Fixed(fee) => f.debug_tuple("Fixed").field(fee).finish(),
        }
    }
}

/// Result of coin selection.
///
/// `total_input() == target + change + fee` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Chosen unspents, in selection order (largest first).
    pub inputs: Vec<Unspent>,
    /// Sum of the requested output values.
    pub target: u64,
    /// Value returned to the wallet.
    pub change: u64,
    /// Value paid to the network.
    pub fee: u64,
}

impl CoinSelection {
    /// Sum of the chosen input values.
    pub fn total_input(&self) -> u64 {
        self.inputs
            .iter()
            .fold(0u64, |acc, u| acc.saturating_add(u.value))
    }

    /// Move change at or below `threshold` into the fee.
    ///
    /// Returns `true` when change was folded.
    pub fn fold_dust_change(&mut self, threshold: u64) -> bool {
        if self.change == 0 || self.change > threshold {
            return false;
        }
        debug!(change = self.change, threshold, "folding dust change into fee");
        self.fee += self.change;
        self.change = 0;
        true
    }
}

/// Greedy coin selector.
///
/// Selection is a pure function of the candidate list, the output values
/// and the fee policy. Candidates of equal value keep their input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinSelector {
    dust_threshold: u64,
    reject_dust: bool,
}

impl CoinSelector {
    /// Selector that rejects outputs at or below `dust_threshold`.
    pub fn new(dust_threshold: u64) -> Self {
        Self {
            dust_threshold,
            reject_dust: true,
        }
    }

    /// Enable or disable the dust check on requested outputs.
    pub fn with_dust_check(mut self, reject_dust: bool) -> Self {
        self.reject_dust = reject_dust;
        self
    }

    /// Sum and validate requested output values.
    pub fn target_value(&self, output_values: &[u64]) -> Result<u64, WalletError> {
        if output_values.is_empty() {
            return Err(WalletError::BuildError("no outputs requested".into()));
        }

        let mut target: u64 = 0;
        for &value in output_values {
            if self.reject_dust && value <= self.dust_threshold {
                return Err(WalletError::DustOutput {
                    value,
                    threshold: self.dust_threshold,
                });
            }
            if value == 0 || value > MAX_MONEY {
                return Err(WalletError::InvalidAmount(format!("output value {value}")));
            }
            target = target
                .checked_add(value)
                .filter(|t| *t <= MAX_MONEY)
                .ok_or_else(|| WalletError::InvalidAmount("total output value overflow".into()))?;
        }
        Ok(target)
    }

    /// Choose inputs from `candidates` to pay `output_values` plus fee.
    pub fn select(
        &self,
        candidates: &[Unspent],
        output_values: &[u64],
        fee: FeePolicy<'_>,
    ) -> Result<CoinSelection, WalletError> {
        let target = self.target_value(output_values)?;

        let mut sorted: Vec<&Unspent> = candidates.iter().collect();
        // stable: equal values keep candidate order
        sorted.sort_by(|a, b| b.value.cmp(&a.value));

        let mut byte_length = TX_EMPTY_SIZE + output_values.len() * TX_PUBKEYHASH_OUTPUT;
        let mut accum: u64 = 0;
        let mut total = target;
        let mut chosen: Vec<Unspent> = Vec::new();

        for unspent in sorted {
            chosen.push(unspent.clone());
            byte_length += TX_PUBKEYHASH_INPUT;
            accum = accum.saturating_add(unspent.value);

            // fees are ignored until the outputs themselves are covered
            if accum < target {
                continue;
            }

            let (fee_no_change, fee_with_change) = match fee {
                FeePolicy::Rate(estimator) => (
                    estimator.estimate_fee(byte_length),
                    estimator.estimate_fee(byte_length + TX_PUBKEYHASH_OUTPUT),
                ),
                FeePolicy::Fixed(fixed) => (fixed, fixed),
            };

            total = target.saturating_add(fee_no_change);
            let total_with_change = target.saturating_add(fee_with_change);

            if accum >= total_with_change {
                return Ok(Self::finish(chosen, target, accum - total_with_change, fee_with_change));
            }
            // without a change output the whole remainder goes to the fee
            if accum >= total {
                return Ok(Self::finish(chosen, target, 0, accum - target));
            }
        }

        debug!(have = accum, need = total, "coin selection exhausted candidates");
        Err(WalletError::InsufficientFunds {
            have: accum,
            need: total,
        })
    }

    fn finish(inputs: Vec<Unspent>, target: u64, change: u64, fee: u64) -> CoinSelection {
        debug!(inputs = inputs.len(), target, change, fee, "coins selected");
        CoinSelection {
            inputs,
            target,
            change,
            fee,
        }
    }
}
