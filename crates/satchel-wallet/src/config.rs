//! Wallet configuration.
//!
//! Provides [`WalletConfig`] with per-network defaults for dust and fee
//! policy, confirmation filtering, the fee ceiling and discovery width.

use bitcoin::Network;
use satchel_core::constants::{ABSURD_FEE_MAX, DEFAULT_GAP_LIMIT, DEFAULT_MAX_FEE};
use satchel_core::network::NetworkPolicy;

use crate::error::WalletError;
use crate::ordering::TxOrdering;

/// Settings that shape selection, signing and discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Dust thresholds and fee rate.
    pub policy: NetworkPolicy,
    /// Unspents with fewer confirmations are not spent.
    pub min_confirmations: u32,
    /// Transactions paying a higher fee are refused.
    pub max_fee: u64,
    /// Consecutive unused addresses that end a discovery scan.
    pub gap_limit: usize,
    /// Input/output arrangement applied before signing.
    pub ordering: TxOrdering,
    /// Reject requested outputs at or below the dust threshold.
    pub reject_dust_outputs: bool,
}

impl WalletConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            policy: NetworkPolicy::for_network(network),
            ..Self::default()
        }
    }

    pub fn network(&self) -> Network {
        self.policy.network
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.gap_limit == 0 {
            return Err(WalletError::InvalidConfig("gap_limit must be positive".into()));
        }
        if self.max_fee > ABSURD_FEE_MAX {
            return Err(WalletError::InvalidConfig(format!(
                "max_fee {} exceeds {ABSURD_FEE_MAX}",
                self.max_fee
            )));
        }
        Ok(())
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            policy: NetworkPolicy::default(),
            min_confirmations: 1,
            max_fee: DEFAULT_MAX_FEE,
            gap_limit: DEFAULT_GAP_LIMIT,
            ordering: TxOrdering::default(),
            reject_dust_outputs: true,
        }
    }
}
