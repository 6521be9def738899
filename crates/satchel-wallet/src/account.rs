//! The two-chain account: external (receive) and internal (change).

use bitcoin::bip32::ExtendedPubKey;
use bitcoin::{Network, PrivateKey};

use crate::error::WalletError;
use crate::keys::{AccountKeys, ChainRole, KeyChain};

/// Exactly two key chains sharing one network.
///
/// The chains' address sets are kept disjoint; a lookup that finds an
/// address in both is an error, never a silent merge.
#[derive(Debug, Clone)]
pub struct Account {
    external: KeyChain,
    internal: KeyChain,
}

impl Account {
    /// Create an account from public chain roots, each chain starting with
    /// its index-0 address allocated.
    pub fn new(external: ExtendedPubKey, internal: ExtendedPubKey) -> Result<Self, WalletError> {
        Self::from_chains(KeyChain::new(external)?, KeyChain::new(internal)?)
    }

    /// Compose an account from existing chains.
    pub fn from_chains(external: KeyChain, internal: KeyChain) -> Result<Self, WalletError> {
        if external.network() != internal.network() {
            return Err(WalletError::CorruptedState(format!(
                "chain networks differ: {} vs {}",
                external.network(),
                internal.network()
            )));
        }
        if external.root() == internal.root() {
            return Err(WalletError::CorruptedState(
                "external and internal chains share a root".into(),
            ));
        }
        if let Some(shared) = external.addresses().iter().find(|a| internal.contains(a)) {
            return Err(WalletError::AddressCollision(shared.clone()));
        }
        Ok(Self { external, internal })
    }

    pub fn chain(&self, role: ChainRole) -> &KeyChain {
        match role {
            ChainRole::External => &self.external,
            ChainRole::Internal => &self.internal,
        }
    }

    /// Both chains, mutably, for independent concurrent work.
    pub fn chains_mut(&mut self) -> (&mut KeyChain, &mut KeyChain) {
        (&mut self.external, &mut self.internal)
    }

    pub fn next_receive(&mut self) -> Result<String, WalletError> {
        self.external.next()
    }

    pub fn next_change(&mut self) -> Result<String, WalletError> {
        self.internal.next()
    }

    pub fn current_receive(&self) -> Result<String, WalletError> {
        self.external.current()
    }

    pub fn current_change(&self) -> Result<String, WalletError> {
        self.internal.current()
    }

    pub fn is_receive(&self, address: &str) -> bool {
        self.external.contains(address)
    }

    pub fn is_change(&self, address: &str) -> bool {
        self.internal.contains(address)
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.is_receive(address) || self.is_change(address)
    }

    /// Every issued address, external chain first.
    pub fn all_addresses(&self) -> Vec<String> {
        self.external
            .addresses()
            .iter()
            .chain(self.internal.addresses())
            .cloned()
            .collect()
    }

    /// Network embedded in the external root key.
    pub fn network(&self) -> Network {
        self.external.network()
    }

    /// Find which chain issued `address` and at what index.
    pub fn locate(&self, address: &str) -> Result<Option<(ChainRole, u32)>, WalletError> {
        match (self.external.index_of(address), self.internal.index_of(address)) {
            (Some(_), Some(_)) => Err(WalletError::AddressCollision(address.to_string())),
            (Some(i), None) => Ok(Some((ChainRole::External, i))),
            (None, Some(i)) => Ok(Some((ChainRole::Internal, i))),
            (None, None) => Ok(None),
        }
    }

    /// Derive the private key for each address, in order.
    ///
    /// `keys` must hold the private roots of this account's chains; keys for
    /// any other account are rejected with [`WalletError::KeyMismatch`].
    pub fn signing_keys(
        &self,
        addresses: &[String],
        keys: &AccountKeys,
    ) -> Result<Vec<PrivateKey>, WalletError> {
        for role in [ChainRole::External, ChainRole::Internal] {
            if keys.public_root(role) != *self.chain(role).root() {
                return Err(WalletError::KeyMismatch(role.to_string()));
            }
        }

        addresses
            .iter()
            .map(|address| {
                let (role, index) = self
                    .locate(address)?
                    .ok_or_else(|| WalletError::UnknownAddress(address.clone()))?;
                keys.derive_private(role, index)
            })
            .collect()
    }
}
