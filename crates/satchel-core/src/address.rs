//! Address encoding for Bitcoin networks.
//!
//! Wallet-owned addresses are base58check pay-to-pubkey-hash addresses.
//! Payment destinations may be any standard address the `bitcoin` crate
//! understands for the wallet's network (P2PKH, P2SH, segwit).

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, PublicKey, Script, ScriptBuf};

use crate::error::AddressError;
use crate::traits::AddressCodec;

/// Parse an address and require it to belong to `network`.
pub fn parse_address(address: &str, network: Network) -> Result<Address, AddressError> {
    let unchecked: Address<NetworkUnchecked> = address
        .parse()
        .map_err(|_| AddressError::Invalid(address.to_string()))?;
    unchecked
        .require_network(network)
        .map_err(|_| AddressError::WrongNetwork {
            address: address.to_string(),
            network: network.to_string(),
        })
}

/// Encode the pay-to-pubkey-hash address of a public key.
pub fn p2pkh_address(public_key: &PublicKey, network: Network) -> String {
    Address::p2pkh(public_key, network).to_string()
}

/// [`AddressCodec`] backed by the `bitcoin` crate's address types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitcoinAddressCodec {
    network: Network,
}

impl BitcoinAddressCodec {
    pub fn new(network: Network) -> Self {
        Self { network }
    }
}

impl AddressCodec for BitcoinAddressCodec {
    fn network(&self) -> Network {
        self.network
    }

    fn address_to_script(&self, address: &str) -> Result<ScriptBuf, AddressError> {
        Ok(parse_address(address, self.network)?.script_pubkey())
    }

    fn script_to_address(&self, script: &Script) -> Result<String, AddressError> {
        Address::from_script(script, self.network)
            .map(|a| a.to_string())
            .map_err(|_| AddressError::NonStandardScript)
    }
}
