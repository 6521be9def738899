//! Gap-limit discovery of used addresses.
//!
//! Each chain is scanned in batches of `gap_limit` addresses. A batch with
//! at least one used address triggers the next batch; an all-unused batch
//! ends the scan. The chain is then trimmed so exactly one unused address
//! follows the last used one.
//!
//! Batches for one chain are strictly sequential: each batch is derived
//! only after the previous answer arrived. The two chains of an account
//! share no state and are scanned concurrently.

use satchel_core::error::ProviderError;
use satchel_core::traits::AddressQuery;
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::error::WalletError;
use crate::keys::KeyChain;

/// Lifecycle of one chain scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Scanning,
    Done,
    Failed,
}

/// Outcome of a completed chain scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Addresses queried, counted from index 0. Addresses issued before the
    /// scan are queried again and included.
    pub checked: u32,
    /// Index of the last used address plus one; 0 when none was used.
    pub used: u32,
    /// Chain frontier after trimming.
    pub frontier: u32,
}

/// A gap-limit scan over one chain.
///
/// Addresses appended by completed batches are kept when a later batch
/// fails; they are valid derivations and only widen the scanned range.
pub struct ChainScan<'a> {
    chain: &'a mut KeyChain,
    gap_limit: usize,
    state: DiscoveryState,
}

impl<'a> ChainScan<'a> {
    pub fn new(chain: &'a mut KeyChain, gap_limit: usize) -> Result<Self, WalletError> {
        if gap_limit == 0 {
            return Err(WalletError::InvalidConfig("gap limit must be positive".into()));
        }
        Ok(Self {
            chain,
            gap_limit,
            state: DiscoveryState::Scanning,
        })
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Run the scan to completion.
    pub async fn run(&mut self, query: &dyn AddressQuery) -> Result<DiscoveryReport, WalletError> {
        match self.scan(query).await {
            Ok(report) => {
                self.state = DiscoveryState::Done;
                Ok(report)
            }
            Err(e) => {
                self.state = DiscoveryState::Failed;
                warn!(error = %e, frontier = self.chain.frontier(), "discovery failed");
                Err(e)
            }
        }
    }

    async fn scan(&mut self, query: &dyn AddressQuery) -> Result<DiscoveryReport, WalletError> {
        let start_frontier = self.chain.frontier();
        let mut checked: u32 = 0;
        let mut used: u32 = 0;

        loop {
            let batch = self.next_batch(checked)?;
            let results = query
                .used(&batch)
                .await
                .map_err(WalletError::DiscoveryQueryFailed)?;
            if results.len() != batch.len() {
                return Err(WalletError::DiscoveryQueryFailed(ProviderError::ResultLength {
                    expected: batch.len(),
                    got: results.len(),
                }));
            }

            let last_used = results.iter().rposition(|u| *u);
            debug!(
                from = checked,
                size = batch.len(),
                any_used = last_used.is_some(),
                "discovery batch"
            );
            if let Some(pos) = last_used {
                used = checked + pos as u32 + 1;
            }
            checked += batch.len() as u32;
            if last_used.is_none() {
                break;
            }
        }

        // never drop addresses that were issued before the scan started
        let keep = (used + 1).max(start_frontier);
        while self.chain.frontier() > keep {
            self.chain.pop()?;
        }

        let report = DiscoveryReport {
            checked,
            used,
            frontier: self.chain.frontier(),
        };
        info!(
            network = %self.chain.network(),
            checked = report.checked,
            used = report.used,
            frontier = report.frontier,
            "discovery complete"
        );
        Ok(report)
    }

    /// Addresses at indices `from..from + gap_limit`, allocating as needed.
    fn next_batch(&mut self, from: u32) -> Result<Vec<String>, WalletError> {
        let end = from + self.gap_limit as u32;
        while self.chain.frontier() < end {
            self.chain.next()?;
        }
        Ok(self.chain.addresses()[from as usize..end as usize].to_vec())
    }
}

/// Scan a single chain.
pub async fn discover_chain(
    chain: &mut KeyChain,
    gap_limit: usize,
    query: &dyn AddressQuery,
) -> Result<DiscoveryReport, WalletError> {
    ChainScan::new(chain, gap_limit)?.run(query).await
}

/// Scan both chains of an account concurrently.
///
/// Returns `(external, internal)` reports. The first failure aborts the
/// whole operation; the other chain may or may not have finished.
pub async fn discover_account(
    account: &mut Account,
    gap_limit: usize,
    external_query: &dyn AddressQuery,
    internal_query: &dyn AddressQuery,
) -> Result<(DiscoveryReport, DiscoveryReport), WalletError> {
    let (external, internal) = account.chains_mut();
    tokio::try_join!(
        discover_chain(external, gap_limit, external_query),
        discover_chain(internal, gap_limit, internal_query),
    )
}
