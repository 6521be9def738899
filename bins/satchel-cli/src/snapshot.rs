//! Offline chain data read from a JSON file.
//!
//! A snapshot lists addresses known to have been used and the unspent
//! outputs currently paying to wallet addresses. It stands in for a block
//! explorer or node when the wallet runs without network access.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use satchel_core::error::ProviderError;
use satchel_core::traits::{AddressQuery, UnspentSource};
use satchel_core::types::Unspent;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub used: HashSet<String>,
    pub unspents: Vec<Unspent>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid snapshot: {}", path.display()))
    }

    /// An address is used if listed or if anything still pays to it.
    fn is_used(&self, address: &str) -> bool {
        self.used.contains(address) || self.unspents.iter().any(|u| u.address == address)
    }
}

#[async_trait]
impl AddressQuery for Snapshot {
    async fn used(&self, addresses: &[String]) -> Result<Vec<bool>, ProviderError> {
        Ok(addresses.iter().map(|a| self.is_used(a)).collect())
    }
}

#[async_trait]
impl UnspentSource for Snapshot {
    async fn unspents(&self, addresses: &[String]) -> Result<Vec<Unspent>, ProviderError> {
        let wanted: HashSet<&str> = addresses.iter().map(String::as_str).collect();
        Ok(self
            .unspents
            .iter()
            .filter(|u| wanted.contains(u.address.as_str()))
            .cloned()
            .collect())
    }
}
