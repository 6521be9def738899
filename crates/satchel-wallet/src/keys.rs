//! Seed management and BIP32 key chains.
//!
//! An account lives at `m/0'` under the master node, with the external
//! (receive) chain at `m/0'/0` and the internal (change) chain at `m/0'/1`.
//! Addresses are pay-to-pubkey-hash encodings of the non-hardened children
//! of each chain node.
//!
//! A [`KeyChain`] only ever holds the chain's extended *public* key.
//! Private material is kept in [`AccountKeys`], which is not serializable
//! and is handed to signing operations explicitly.

use std::collections::HashMap;
use std::fmt;

use bitcoin::bip32::{ChildNumber, ExtendedPrivKey, ExtendedPubKey};
use bitcoin::secp256k1::{All, Secp256k1, VerifyOnly};
use bitcoin::{Network, PrivateKey, PublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use satchel_core::address::p2pkh_address;
use satchel_core::constants::{ACCOUNT_INDEX, EXTERNAL_CHAIN_INDEX, INTERNAL_CHAIN_INDEX};

use crate::error::WalletError;

/// Shortest seed BIP32 accepts, in bytes.
pub const MIN_SEED_LEN: usize = 16;

/// Longest seed BIP32 accepts, in bytes.
pub const MAX_SEED_LEN: usize = 64;

/// Master seed bytes.
///
/// Secret material is zeroized on drop to prevent leaking key material
/// in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: Vec<u8>,
}

impl Seed {
    /// Generate a random 32-byte seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes (16 to 64 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            return Err(WalletError::KeyDerivation(format!(
                "seed must be {MIN_SEED_LEN}..={MAX_SEED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Create a seed from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let mut raw = hex::decode(s.trim())
            .map_err(|e| WalletError::KeyDerivation(format!("invalid seed hex: {e}")))?;
        let seed = Self::from_bytes(&raw);
        raw.zeroize();
        seed
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
        }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Which of the account's two chains an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainRole {
    /// Receive addresses handed out to payers.
    External,
    /// Change addresses the wallet pays itself.
    Internal,
}

impl ChainRole {
    /// Child index of this chain under the account node.
    pub fn index(&self) -> u32 {
        match self {
            ChainRole::External => EXTERNAL_CHAIN_INDEX,
            ChainRole::Internal => INTERNAL_CHAIN_INDEX,
        }
    }
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainRole::External => write!(f, "external"),
            ChainRole::Internal => write!(f, "internal"),
        }
    }
}

/// A linear sequence of addresses derived from one chain node.
///
/// `addresses[i]` is the address at derivation index `i`; the frontier is
/// the number of addresses ever issued. `map` is the exact inverse of
/// `addresses`. The chain grows through [`next`](Self::next) and only
/// shrinks through [`pop`](Self::pop) during discovery.
#[derive(Clone)]
pub struct KeyChain {
    root: ExtendedPubKey,
    addresses: Vec<String>,
    map: HashMap<String, u32>,
    secp: Secp256k1<VerifyOnly>,
}

impl KeyChain {
    /// Create a chain with its first address (index 0) already allocated.
    pub fn new(root: ExtendedPubKey) -> Result<Self, WalletError> {
        let mut chain = Self::empty(root);
        chain.next()?;
        Ok(chain)
    }

    /// Create a chain with no allocated addresses.
    pub fn empty(root: ExtendedPubKey) -> Self {
        Self {
            root,
            addresses: Vec::new(),
            map: HashMap::new(),
            secp: Secp256k1::verification_only(),
        }
    }

    /// Rebuild a chain from previously issued addresses, in derivation order.
    pub fn restore(root: ExtendedPubKey, addresses: Vec<String>) -> Result<Self, WalletError> {
        let mut chain = Self::empty(root);
        for (i, address) in addresses.into_iter().enumerate() {
            let index = u32::try_from(i)
                .map_err(|_| WalletError::CorruptedState("chain too long".into()))?;
            if chain.map.insert(address.clone(), index).is_some() {
                return Err(WalletError::CorruptedState(format!(
                    "address {address} listed twice"
                )));
            }
            chain.addresses.push(address);
        }
        Ok(chain)
    }

    /// Derive the child public key at `index`. Pure; does not touch chain state.
    pub fn derive_at(&self, index: u32) -> Result<ExtendedPubKey, WalletError> {
        let child = ChildNumber::from_normal_idx(index)
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        self.root
            .derive_pub(&self.secp, &[child])
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))
    }

    /// Address at derivation index `index`, whether or not it has been issued.
    pub fn address_at(&self, index: u32) -> Result<String, WalletError> {
        let child = self.derive_at(index)?;
        Ok(p2pkh_address(&PublicKey::new(child.public_key), self.network()))
    }

    /// Allocate the address at the frontier and advance it.
    pub fn next(&mut self) -> Result<String, WalletError> {
        let index = self.frontier();
        let address = self.address_at(index)?;
        if self.map.contains_key(&address) {
            return Err(WalletError::AddressCollision(address));
        }
        self.map.insert(address.clone(), index);
        self.addresses.push(address.clone());
        Ok(address)
    }

    /// The most recently issued address, or the index-0 address for an
    /// empty chain.
    pub fn current(&self) -> Result<String, WalletError> {
        match self.addresses.last() {
            Some(address) => Ok(address.clone()),
            None => self.address_at(0),
        }
    }

    /// Remove the most recently issued address.
    pub fn pop(&mut self) -> Result<String, WalletError> {
        let address = self.addresses.pop().ok_or(WalletError::EmptyChain)?;
        self.map.remove(&address);
        Ok(address)
    }

    /// Whether `address` has been issued by this chain.
    pub fn contains(&self, address: &str) -> bool {
        self.map.contains_key(address)
    }

    /// Derivation index of an issued address.
    pub fn index_of(&self, address: &str) -> Option<u32> {
        self.map.get(address).copied()
    }

    /// Number of addresses ever issued.
    pub fn frontier(&self) -> u32 {
        self.addresses.len() as u32
    }

    /// Issued addresses in derivation order.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Address to derivation index lookup.
    pub fn address_map(&self) -> &HashMap<String, u32> {
        &self.map
    }

    /// The chain's extended public key.
    pub fn root(&self) -> &ExtendedPubKey {
        &self.root
    }

    /// Network embedded in the root key.
    pub fn network(&self) -> Network {
        self.root.network
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("network", &self.network())
            .field("frontier", &self.frontier())
            .finish()
    }
}

/// Private roots of an account's two chains.
///
/// Never part of serialized wallet state. Passed to signing operations by
/// the caller, which lets a watch-only wallet sign with keys supplied at
/// the last moment.
pub struct AccountKeys {
    external: ExtendedPrivKey,
    internal: ExtendedPrivKey,
    secp: Secp256k1<All>,
}

impl AccountKeys {
    /// Derive the account's chain roots `m/0'/0` and `m/0'/1` from a seed.
    pub fn from_seed(seed: &Seed, network: Network) -> Result<Self, WalletError> {
        let secp = Secp256k1::new();
        let master = ExtendedPrivKey::new_master(network, seed.as_bytes())
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        let account = derive_priv_child(&secp, &master, hardened(ACCOUNT_INDEX)?)?;
        let external = derive_priv_child(&secp, &account, normal(EXTERNAL_CHAIN_INDEX)?)?;
        let internal = derive_priv_child(&secp, &account, normal(INTERNAL_CHAIN_INDEX)?)?;
        Ok(Self {
            external,
            internal,
            secp,
        })
    }

    /// Use already-derived chain roots.
    pub fn from_roots(external: ExtendedPrivKey, internal: ExtendedPrivKey) -> Self {
        Self {
            external,
            internal,
            secp: Secp256k1::new(),
        }
    }

    /// Private root of one chain.
    pub fn root(&self, role: ChainRole) -> &ExtendedPrivKey {
        match role {
            ChainRole::External => &self.external,
            ChainRole::Internal => &self.internal,
        }
    }

    /// Public root of one chain.
    pub fn public_root(&self, role: ChainRole) -> ExtendedPubKey {
        ExtendedPubKey::from_priv(&self.secp, self.root(role))
    }

    /// Public roots `(external, internal)`.
    pub fn neuter(&self) -> (ExtendedPubKey, ExtendedPubKey) {
        (
            self.public_root(ChainRole::External),
            self.public_root(ChainRole::Internal),
        )
    }

    /// Private key at `index` on the given chain.
    pub fn derive_private(&self, role: ChainRole, index: u32) -> Result<PrivateKey, WalletError> {
        let child = derive_priv_child(&self.secp, self.root(role), normal(index)?)?;
        Ok(child.to_priv())
    }

    /// Network embedded in the roots.
    pub fn network(&self) -> Network {
        self.external.network
    }
}

impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeys")
            .field("network", &self.network())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

fn hardened(index: u32) -> Result<ChildNumber, WalletError> {
    ChildNumber::from_hardened_idx(index).map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

fn normal(index: u32) -> Result<ChildNumber, WalletError> {
    ChildNumber::from_normal_idx(index).map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

fn derive_priv_child(
    secp: &Secp256k1<All>,
    parent: &ExtendedPrivKey,
    child: ChildNumber,
) -> Result<ExtendedPrivKey, WalletError> {
    parent
        .derive_priv(secp, &[child])
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))
}
