//! Per-network relay policy: dust thresholds and fee rate.
//!
//! Two dust thresholds are kept apart on purpose. The strict
//! [`dust_threshold`](NetworkPolicy::dust_threshold) rejects requested
//! outputs; the optional soft threshold, when set, decides whether computed
//! change is worth an output of its own.

use bitcoin::Network;

use crate::constants::{DEFAULT_DUST_THRESHOLD, DEFAULT_FEE_PER_KB};
use crate::traits::FeeEstimator;

/// Dust and fee settings for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPolicy {
    /// Network the wallet operates on.
    pub network: Network,
    /// Outputs at or below this value are dust.
    pub dust_threshold: u64,
    /// Optional threshold used only when deciding whether to keep change.
    pub dust_soft_threshold: Option<u64>,
    /// Fee charged per started kilobyte of estimated transaction size.
    pub fee_per_kb: u64,
}

impl NetworkPolicy {
    /// Default policy for a network.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            dust_threshold: DEFAULT_DUST_THRESHOLD,
            dust_soft_threshold: None,
            fee_per_kb: DEFAULT_FEE_PER_KB,
        }
    }

    pub fn bitcoin() -> Self {
        Self::for_network(Network::Bitcoin)
    }

    pub fn testnet() -> Self {
        Self::for_network(Network::Testnet)
    }

    /// Replace the fee rate.
    pub fn with_fee_per_kb(mut self, fee_per_kb: u64) -> Self {
        self.fee_per_kb = fee_per_kb;
        self
    }

    /// Set a soft dust threshold for change folding.
    pub fn with_soft_dust_threshold(mut self, threshold: u64) -> Self {
        self.dust_soft_threshold = Some(threshold);
        self
    }

    /// Threshold applied to requested outputs.
    pub fn output_dust_threshold(&self) -> u64 {
        self.dust_threshold
    }

    /// Threshold applied to computed change: the soft threshold when set,
    /// otherwise the strict one.
    pub fn change_dust_threshold(&self) -> u64 {
        self.dust_soft_threshold.unwrap_or(self.dust_threshold)
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self::bitcoin()
    }
}

impl FeeEstimator for NetworkPolicy {
    fn estimate_fee(&self, byte_length: usize) -> u64 {
        let kilobytes = byte_length.div_ceil(1000) as u64;
        kilobytes.saturating_mul(self.fee_per_kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_rounds_up_to_started_kilobyte() {
        let p = NetworkPolicy::testnet();
        assert_eq!(p.estimate_fee(0), 0);
        assert_eq!(p.estimate_fee(1), 10_000);
        assert_eq!(p.estimate_fee(1000), 10_000);
        assert_eq!(p.estimate_fee(1001), 20_000);
    }

    #[test]
    fn change_threshold_falls_back_to_strict() {
        let p = NetworkPolicy::bitcoin();
        assert_eq!(p.change_dust_threshold(), 546);
        let soft = p.with_soft_dust_threshold(100_000);
        assert_eq!(soft.change_dust_threshold(), 100_000);
        assert_eq!(soft.output_dust_threshold(), 546);
    }

    #[test]
    fn fee_rate_override() {
        let p = NetworkPolicy::testnet().with_fee_per_kb(1_000);
        assert_eq!(p.estimate_fee(226), 1_000);
    }

    #[test]
    fn default_is_mainnet() {
        assert_eq!(NetworkPolicy::default().network, Network::Bitcoin);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fee_is_monotonic_in_size(a in 0usize..200_000, b in 0usize..200_000, rate in 0u64..1_000_000) {
                let p = NetworkPolicy::testnet().with_fee_per_kb(rate);
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(p.estimate_fee(lo) <= p.estimate_fee(hi));
                prop_assert_eq!(p.estimate_fee(hi) % rate.max(1), 0);
            }
        }
    }
}
