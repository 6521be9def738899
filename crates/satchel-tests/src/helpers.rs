//! Shared test helpers for integration and property tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use satchel_core::Network;
use satchel_core::error::ProviderError;
use satchel_core::traits::{AddressQuery, UnspentSource};
use satchel_core::types::Unspent;
use satchel_wallet::{AccountKeys, KeyChain, Seed, Wallet, WalletConfig};

/// BIP32 test vector 1 master seed.
pub const TEST_SEED_HEX: &str = "000102030405060708090a0b0c0d0e0f";

/// A valid testnet P2PKH address owned by nobody in these tests.
pub const FOREIGN_TESTNET: &str = "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn";

/// Testnet wallet derived from [`TEST_SEED_HEX`].
pub fn testnet_wallet() -> (Wallet, AccountKeys) {
    Wallet::from_seed_hex(TEST_SEED_HEX, WalletConfig::for_network(Network::Testnet))
        .expect("test seed is valid")
}

/// Testnet wallet from a seed of 32 repeated bytes.
pub fn wallet_from_byte(byte: u8) -> (Wallet, AccountKeys) {
    let seed = Seed::from_bytes(&[byte; 32]).expect("32 bytes is a valid seed");
    Wallet::from_seed(&seed, WalletConfig::for_network(Network::Testnet))
        .expect("seed derivation succeeds")
}

/// Deterministic 64-hex-char txid.
pub fn fake_txid(n: u8) -> String {
    format!("{n:02x}").repeat(32)
}

/// Unspent record paying `address`.
pub fn unspent(n: u8, address: &str, value: u64, confirmations: u32) -> Unspent {
    Unspent {
        tx_id: fake_txid(n),
        vout: 0,
        address: address.to_string(),
        value,
        confirmations,
    }
}

/// Discovery backend that reports the addresses at chosen derivation
/// indices of a chain as used.
pub struct ScriptedQuery {
    used: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedQuery {
    /// `pattern[i]` says whether index `i` of `chain` is used; indices past
    /// the pattern are unused.
    pub fn for_chain(chain: &KeyChain, pattern: &[bool]) -> Self {
        let used = pattern
            .iter()
            .enumerate()
            .filter(|(_, u)| **u)
            .map(|(i, _)| chain.address_at(i as u32).expect("derivation succeeds"))
            .collect();
        Self {
            used,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of batches answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressQuery for ScriptedQuery {
    async fn used(&self, addresses: &[String]) -> Result<Vec<bool>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(addresses.iter().map(|a| self.used.contains(a)).collect())
    }
}

/// Discovery backend that always fails.
pub struct FailingQuery;

#[async_trait]
impl AddressQuery for FailingQuery {
    async fn used(&self, _addresses: &[String]) -> Result<Vec<bool>, ProviderError> {
        Err(ProviderError::Query("connection refused".into()))
    }
}

/// In-memory chain-data provider returning the unspents that pay any of
/// the requested addresses.
pub struct MemorySource {
    pub unspents: Vec<Unspent>,
}

#[async_trait]
impl UnspentSource for MemorySource {
    async fn unspents(&self, addresses: &[String]) -> Result<Vec<Unspent>, ProviderError> {
        let wanted: HashSet<&String> = addresses.iter().collect();
        Ok(self
            .unspents
            .iter()
            .filter(|u| wanted.contains(&u.address))
            .cloned()
            .collect())
    }
}
