//! Wallet composition: account, unspent tracking, transaction creation.
//!
//! The [`Wallet`] ties together the two-chain account, the validated
//! unspent set, coin selection, transaction building and state
//! persistence. It holds only public key material; signing operations take
//! an [`AccountKeys`] from the caller.
//!
//! A wallet has a single owner. Operations that mutate chains or unspents
//! take `&mut self`, so discovery cannot overlap selection or signing.

use std::path::Path;

use bitcoin::bip32::ExtendedPubKey;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{Network, Transaction, TxOut, Txid};
use satchel_core::address::BitcoinAddressCodec;
use satchel_core::constants::ABSURD_FEE_MAX;
use satchel_core::traits::{AddressCodec, AddressQuery, FeeEstimator, UnspentSource};
use satchel_core::types::{Destination, OutputRequest, Unspent};
use tracing::{info, warn};

use crate::account::Account;
use crate::builder::TransactionBuilder;
use crate::coin_selection::{CoinSelection, CoinSelector, FeePolicy};
use crate::config::WalletConfig;
use crate::discovery::{DiscoveryReport, discover_account};
use crate::error::WalletError;
use crate::keys::{AccountKeys, ChainRole, KeyChain, Seed};
use crate::state::WalletState;
use crate::unspents::{UnspentSet, validate_batch};

/// Fee override for a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeOverride {
    /// Rate per started kilobyte instead of the configured one.
    PerKb(u64),
    /// Flat fee regardless of size.
    Fixed(u64),
}

/// Parameters for [`Wallet::create_transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub outputs: Vec<OutputRequest>,
    pub fee: Option<FeeOverride>,
    /// Pay change here instead of the current change address.
    pub change_address: Option<String>,
    pub lock_time: Option<u32>,
    /// Overrides [`WalletConfig::min_confirmations`].
    pub min_confirmations: Option<u32>,
}

impl TransactionRequest {
    pub fn new(outputs: Vec<OutputRequest>) -> Self {
        Self {
            outputs,
            fee: None,
            change_address: None,
            lock_time: None,
            min_confirmations: None,
        }
    }

    /// Single payment to an address.
    pub fn pay(address: impl Into<String>, value: u64) -> Self {
        Self::new(vec![OutputRequest::to_address(address, value)])
    }

    pub fn fixed_fee(mut self, fee: u64) -> Self {
        self.fee = Some(FeeOverride::Fixed(fee));
        self
    }

    pub fn fee_per_kb(mut self, fee_per_kb: u64) -> Self {
        self.fee = Some(FeeOverride::PerKb(fee_per_kb));
        self
    }

    pub fn change_address(mut self, address: impl Into<String>) -> Self {
        self.change_address = Some(address.into());
        self
    }

    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = Some(lock_time);
        self
    }

    pub fn min_confirmations(mut self, min_confirmations: u32) -> Self {
        self.min_confirmations = Some(min_confirmations);
        self
    }
}

/// A signed transaction and its accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub transaction: Transaction,
    /// Satoshis paid to the network, including any folded change.
    pub fee: u64,
    /// Satoshis returned to the wallet; 0 when no change output exists.
    pub change: u64,
    /// Where change was paid, when a change output exists.
    pub change_address: Option<String>,
    /// Spent unspents, in transaction input order.
    pub inputs: Vec<Unspent>,
}

impl CreatedTransaction {
    pub fn txid(&self) -> Txid {
        self.transaction.txid()
    }

    /// Consensus serialization, hex encoded.
    pub fn to_hex(&self) -> String {
        serialize_hex(&self.transaction)
    }
}

/// Watch-only HD wallet with signing on demand.
pub struct Wallet {
    account: Account,
    unspents: UnspentSet,
    config: WalletConfig,
    codec: Box<dyn AddressCodec>,
}

impl Wallet {
    /// Create a wallet over an existing account.
    pub fn new(account: Account, config: WalletConfig) -> Result<Self, WalletError> {
        config.validate()?;
        if is_mainnet(account.network()) != is_mainnet(config.network()) {
            return Err(WalletError::InvalidConfig(format!(
                "account is on {} but config is for {}",
                account.network(),
                config.network()
            )));
        }
        let codec = Box::new(BitcoinAddressCodec::new(config.network()));
        Ok(Self {
            account,
            unspents: UnspentSet::new(),
            config,
            codec,
        })
    }

    /// Watch-only wallet from the two public chain roots.
    pub fn from_public_roots(
        external: ExtendedPubKey,
        internal: ExtendedPubKey,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        Self::new(Account::new(external, internal)?, config)
    }

    /// Derive a wallet and its signing keys from a seed.
    pub fn from_seed(seed: &Seed, config: WalletConfig) -> Result<(Self, AccountKeys), WalletError> {
        let keys = AccountKeys::from_seed(seed, config.network())?;
        let (external, internal) = keys.neuter();
        let wallet = Self::from_public_roots(external, internal, config)?;
        Ok((wallet, keys))
    }

    pub fn from_seed_hex(hex: &str, config: WalletConfig) -> Result<(Self, AccountKeys), WalletError> {
        Self::from_seed(&Seed::from_hex(hex)?, config)
    }

    /// Replace the address codec used for outputs and unspent validation.
    pub fn with_codec(mut self, codec: Box<dyn AddressCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Network embedded in the account's root keys.
    pub fn network(&self) -> Network {
        self.account.network()
    }

    pub fn receive_address(&self) -> Result<String, WalletError> {
        self.account.current_receive()
    }

    pub fn change_address(&self) -> Result<String, WalletError> {
        self.account.current_change()
    }

    /// Issue a fresh receive address.
    pub fn next_address(&mut self) -> Result<String, WalletError> {
        self.account.next_receive()
    }

    /// Issue a fresh change address.
    pub fn next_change_address(&mut self) -> Result<String, WalletError> {
        self.account.next_change()
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.account.contains_address(address)
    }

    pub fn is_receive_address(&self, address: &str) -> bool {
        self.account.is_receive(address)
    }

    pub fn is_change_address(&self, address: &str) -> bool {
        self.account.is_change(address)
    }

    pub fn all_addresses(&self) -> Vec<String> {
        self.account.all_addresses()
    }

    // --- unspents ---

    /// Replace the unspent set. A rejected batch leaves the old set intact.
    pub fn set_unspent_outputs(&mut self, unspents: Vec<Unspent>) -> Result<(), WalletError> {
        self.unspents.replace(unspents, self.codec.as_ref())?;
        Ok(())
    }

    /// Fetch unspents for every wallet address and replace the set.
    pub async fn sync_unspents(&mut self, source: &dyn UnspentSource) -> Result<usize, WalletError> {
        let addresses = self.all_addresses();
        let unspents = source
            .unspents(&addresses)
            .await
            .map_err(WalletError::Provider)?;
        let count = unspents.len();
        self.set_unspent_outputs(unspents)?;
        Ok(count)
    }

    pub fn unspents(&self) -> &[Unspent] {
        self.unspents.as_slice()
    }

    /// Sum of all unspent values, confirmed or not.
    pub fn balance(&self) -> u64 {
        self.unspents.balance()
    }

    /// Sum of unspents meeting the configured confirmation minimum.
    pub fn confirmed_balance(&self) -> u64 {
        self.unspents.confirmed_balance(self.config.min_confirmations)
    }

    pub fn confirmed_balance_with(&self, min_confirmations: u32) -> u64 {
        self.unspents.confirmed_balance(min_confirmations)
    }

    // --- discovery ---

    /// Gap-limit discovery of both chains against one query backend.
    pub async fn discover(
        &mut self,
        query: &dyn AddressQuery,
    ) -> Result<(DiscoveryReport, DiscoveryReport), WalletError> {
        self.discover_with(query, query).await
    }

    /// Gap-limit discovery with a separate backend per chain.
    pub async fn discover_with(
        &mut self,
        external: &dyn AddressQuery,
        internal: &dyn AddressQuery,
    ) -> Result<(DiscoveryReport, DiscoveryReport), WalletError> {
        discover_account(&mut self.account, self.config.gap_limit, external, internal).await
    }

    // --- transactions ---

    /// Select coins, add change, order, sign and verify a payment.
    pub fn create_transaction(
        &self,
        request: &TransactionRequest,
        keys: &AccountKeys,
    ) -> Result<CreatedTransaction, WalletError> {
        let min_confirmations = request
            .min_confirmations
            .unwrap_or(self.config.min_confirmations);
        let candidates: Vec<Unspent> = self.unspents.eligible(min_confirmations).cloned().collect();

        let outputs = self.resolve_outputs(&request.outputs)?;
        let values: Vec<u64> = outputs.iter().map(|o| o.value).collect();

        let selector = CoinSelector::new(self.config.policy.output_dust_threshold())
            .with_dust_check(self.config.reject_dust_outputs);
        let mut selection = match request.fee {
            None => selector.select(&candidates, &values, FeePolicy::Rate(&self.config.policy))?,
            Some(FeeOverride::PerKb(rate)) => {
                let policy = self.config.policy.clone().with_fee_per_kb(rate);
                let estimator: &dyn FeeEstimator = &policy;
                selector.select(&candidates, &values, FeePolicy::Rate(estimator))?
            }
            Some(FeeOverride::Fixed(fee)) => {
                selector.select(&candidates, &values, FeePolicy::Fixed(fee))?
            }
        };

        check_selection(&selection)?;
        selection.fold_dust_change(self.config.policy.change_dust_threshold());

        if selection.fee > self.config.max_fee {
            warn!(fee = selection.fee, max = self.config.max_fee, "fee ceiling exceeded");
            return Err(WalletError::FeeSanityExceeded {
                fee: selection.fee,
                max: self.config.max_fee,
            });
        }

        let mut tx_outputs = outputs;
        let change_address = if selection.change > 0 {
            let address = match &request.change_address {
                Some(address) => address.clone(),
                None => self.account.current_change()?,
            };
            tx_outputs.push(TxOut {
                value: selection.change,
                script_pubkey: self.codec.address_to_script(&address)?,
            });
            Some(address)
        } else {
            None
        };

        let (transaction, inputs) =
            self.assemble(selection.inputs.clone(), tx_outputs, keys, request.lock_time)?;
        verify_amounts(&transaction, &inputs, selection.target, selection.change, selection.fee)?;

        info!(
            txid = %transaction.txid(),
            inputs = inputs.len(),
            fee = selection.fee,
            change = selection.change,
            "transaction created"
        );

        Ok(CreatedTransaction {
            transaction,
            fee: selection.fee,
            change: selection.change,
            change_address,
            inputs,
        })
    }

    /// Spend caller-chosen inputs to the given outputs.
    ///
    /// The fee is whatever the inputs leave over; it must not exceed
    /// `fee_max`, and `fee_max` itself must not exceed [`ABSURD_FEE_MAX`].
    pub fn build_transaction(
        &self,
        inputs: &[Unspent],
        outputs: &[OutputRequest],
        fee_max: u64,
        keys: &AccountKeys,
        lock_time: Option<u32>,
    ) -> Result<CreatedTransaction, WalletError> {
        if fee_max > ABSURD_FEE_MAX {
            return Err(WalletError::InvalidAmount(format!(
                "fee_max {fee_max} exceeds {ABSURD_FEE_MAX}"
            )));
        }
        if inputs.is_empty() {
            return Err(WalletError::BuildError("no inputs".into()));
        }
        validate_batch(inputs, self.codec.as_ref())?;

        let tx_outputs = self.resolve_outputs(outputs)?;
        let values: Vec<u64> = tx_outputs.iter().map(|o| o.value).collect();
        let selector = CoinSelector::new(self.config.policy.output_dust_threshold())
            .with_dust_check(self.config.reject_dust_outputs);
        let target = selector.target_value(&values)?;

        let total_in = sum_values(inputs.iter().map(|u| u.value))?;
        if total_in < target {
            return Err(WalletError::InsufficientFunds {
                have: total_in,
                need: target,
            });
        }
        let fee = total_in - target;
        if fee > fee_max {
            warn!(fee, max = fee_max, "fee ceiling exceeded");
            return Err(WalletError::FeeSanityExceeded { fee, max: fee_max });
        }

        let (transaction, inputs) = self.assemble(inputs.to_vec(), tx_outputs, keys, lock_time)?;
        verify_amounts(&transaction, &inputs, target, 0, fee)?;

        info!(txid = %transaction.txid(), inputs = inputs.len(), fee, "transaction built");

        Ok(CreatedTransaction {
            transaction,
            fee,
            change: 0,
            change_address: None,
            inputs,
        })
    }

    /// Change destinations take successive unissued internal addresses from
    /// a copy of the chain; the wallet's own frontier does not move.
    fn resolve_outputs(&self, requests: &[OutputRequest]) -> Result<Vec<TxOut>, WalletError> {
        let mut change_chain: Option<KeyChain> = None;
        requests
            .iter()
            .map(|r| {
                let script_pubkey = match &r.destination {
                    Destination::Address(address) => self.codec.address_to_script(address)?,
                    Destination::Script(script) => script.clone(),
                    Destination::Change => {
                        let chain = change_chain.get_or_insert_with(|| {
                            self.account.chain(ChainRole::Internal).clone()
                        });
                        self.codec.address_to_script(&chain.next()?)?
                    }
                };
                Ok(TxOut {
                    value: r.value,
                    script_pubkey,
                })
            })
            .collect()
    }

    /// Order, add and sign. Returns the transaction and its inputs in
    /// transaction order.
    fn assemble(
        &self,
        mut inputs: Vec<Unspent>,
        mut outputs: Vec<TxOut>,
        keys: &AccountKeys,
        lock_time: Option<u32>,
    ) -> Result<(Transaction, Vec<Unspent>), WalletError> {
        self.config.ordering.apply(&mut inputs, &mut outputs);

        let addresses: Vec<String> = inputs.iter().map(|u| u.address.clone()).collect();
        let signing_keys = self.account.signing_keys(&addresses, keys)?;

        let mut txb = TransactionBuilder::new();
        if let Some(lock_time) = lock_time {
            txb.set_lock_time(lock_time)?;
        }
        for input in &inputs {
            txb.add_input(&input.tx_id, input.vout)?;
        }
        for output in outputs {
            txb.add_output(output.script_pubkey, output.value);
        }
        for (index, (input, key)) in inputs.iter().zip(&signing_keys).enumerate() {
            let prev_script = self.codec.address_to_script(&input.address)?;
            txb.sign(index, key, &prev_script)?;
        }

        Ok((txb.build()?, inputs))
    }

    // --- persistence ---

    /// Snapshot of chains and unspents. Contains no private keys.
    pub fn to_state(&self) -> WalletState {
        WalletState::from_parts(&self.account, self.unspents.as_slice())
    }

    /// Restore a wallet, validating chains and unspents.
    pub fn from_state(state: &WalletState, config: WalletConfig) -> Result<Self, WalletError> {
        let mut wallet = Self::new(state.to_account()?, config)?;
        wallet.set_unspent_outputs(state.unspents.clone())?;
        Ok(wallet)
    }

    pub fn to_json(&self) -> Result<String, WalletError> {
        self.to_state().to_json()
    }

    pub fn from_json(json: &str, config: WalletConfig) -> Result<Self, WalletError> {
        Self::from_state(&WalletState::from_json(json)?, config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), WalletError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| WalletError::IoError(e.to_string()))
    }

    pub fn load_from_file(path: &Path, config: WalletConfig) -> Result<Self, WalletError> {
        let json = std::fs::read_to_string(path).map_err(|e| WalletError::IoError(e.to_string()))?;
        Self::from_json(&json, config)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network())
            .field("addresses", &self.all_addresses().len())
            .field("unspents", &self.unspents.len())
            .finish()
    }
}

fn is_mainnet(network: Network) -> bool {
    network == Network::Bitcoin
}

fn sum_values(mut values: impl Iterator<Item = u64>) -> Result<u64, WalletError> {
    values.try_fold(0u64, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| WalletError::InvalidAmount("value overflow".into()))
    })
}

fn check_selection(selection: &CoinSelection) -> Result<(), WalletError> {
    let inputs = selection.total_input();
    let accounted = selection
        .target
        .checked_add(selection.change)
        .and_then(|v| v.checked_add(selection.fee));
    if accounted != Some(inputs) {
        return Err(WalletError::InternalConsistency {
            inputs,
            outputs: selection.target,
            change: selection.change,
            fee: selection.fee,
        });
    }
    Ok(())
}

/// Recheck the signed transaction: inputs minus requested outputs must be
/// exactly change plus fee, and the change output must carry `change`.
fn verify_amounts(
    tx: &Transaction,
    inputs: &[Unspent],
    target: u64,
    change: u64,
    fee: u64,
) -> Result<(), WalletError> {
    let total_in = sum_values(inputs.iter().map(|u| u.value))?;
    let total_out = sum_values(tx.output.iter().map(|o| o.value))?;
    let consistent = total_in.checked_sub(target) == change.checked_add(fee)
        && total_out.checked_sub(target) == Some(change)
        && total_in.checked_sub(total_out) == Some(fee);
    if !consistent {
        return Err(WalletError::InternalConsistency {
            inputs: total_in,
            outputs: target,
            change,
            fee,
        });
    }
    Ok(())
}
