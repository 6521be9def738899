//! Serializable wallet state.
//!
//! Only extended public keys are persisted. The address map is a
//! `BTreeMap` so the JSON form is stable: export, import and export again
//! yields identical bytes.

use std::collections::BTreeMap;
use std::str::FromStr;

use bitcoin::bip32::ExtendedPubKey;
use satchel_core::types::Unspent;
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::WalletError;
use crate::keys::{ChainRole, KeyChain};

/// One chain: root node, frontier, issued addresses and their indices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    /// Base58 extended public key of the chain node.
    pub node: String,
    /// Number of addresses issued.
    pub k: u32,
    pub addresses: Vec<String>,
    pub map: BTreeMap<String, u32>,
}

impl ChainState {
    pub fn from_chain(chain: &KeyChain) -> Self {
        Self {
            node: chain.root().to_string(),
            k: chain.frontier(),
            addresses: chain.addresses().to_vec(),
            map: chain
                .address_map()
                .iter()
                .map(|(a, i)| (a.clone(), *i))
                .collect(),
        }
    }

    /// Rebuild the chain, checking that the record is self-consistent.
    pub fn to_chain(&self) -> Result<KeyChain, WalletError> {
        let root = ExtendedPubKey::from_str(&self.node)
            .map_err(|e| WalletError::CorruptedState(format!("chain node: {e}")))?;

        if self.addresses.len() != self.k as usize {
            return Err(WalletError::CorruptedState(format!(
                "frontier {} but {} addresses",
                self.k,
                self.addresses.len()
            )));
        }
        if self.map.len() != self.addresses.len() {
            return Err(WalletError::CorruptedState(
                "address map does not match address list".into(),
            ));
        }
        for (i, address) in self.addresses.iter().enumerate() {
            if self.map.get(address) != Some(&(i as u32)) {
                return Err(WalletError::CorruptedState(format!(
                    "address {address} mapped to wrong index"
                )));
            }
        }

        KeyChain::restore(root, self.addresses.clone())
    }
}

/// Everything needed to restore a watch-only wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub external: ChainState,
    pub internal: ChainState,
    pub unspents: Vec<Unspent>,
}

impl WalletState {
    pub fn from_parts(account: &Account, unspents: &[Unspent]) -> Self {
        Self {
            external: ChainState::from_chain(account.chain(ChainRole::External)),
            internal: ChainState::from_chain(account.chain(ChainRole::Internal)),
            unspents: unspents.to_vec(),
        }
    }

    /// Rebuild the account. Unspents are validated by the caller.
    pub fn to_account(&self) -> Result<Account, WalletError> {
        Account::from_chains(self.external.to_chain()?, self.internal.to_chain()?)
    }

    pub fn to_json(&self) -> Result<String, WalletError> {
        serde_json::to_string_pretty(self).map_err(|e| WalletError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        serde_json::from_str(json).map_err(|e| WalletError::Serialization(e.to_string()))
    }
}
