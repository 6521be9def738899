//! # satchel-wallet — BIP32 wallet with deterministic coin selection.
//!
//! Provides two-chain account derivation from a master seed, gap-limit
//! discovery of used addresses, validated unspent tracking, greedy coin
//! selection with exact fee/change accounting, transaction building and
//! signing, and JSON state persistence.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`keys`] — Seed, KeyChain, AccountKeys
//! - [`account`] — External/internal chain pair
//! - [`discovery`] — Gap-limit scanning
//! - [`unspents`] — Unspent set validation and balances
//! - [`coin_selection`] — Greedy largest-first selection
//! - [`ordering`] — BIP69 and seeded shuffle ordering
//! - [`builder`] — Transaction builder with signing
//! - [`config`] — Wallet configuration
//! - [`state`] — Serializable wallet state
//! - [`wallet`] — High-level wallet composition

pub mod account;
pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod discovery;
pub mod error;
pub mod keys;
pub mod ordering;
pub mod state;
pub mod unspents;
pub mod wallet;

// Re-exports for convenient access
pub use account::Account;
pub use builder::TransactionBuilder;
pub use coin_selection::{CoinSelection, CoinSelector, FeePolicy};
pub use config::WalletConfig;
pub use discovery::{DiscoveryReport, DiscoveryState, discover_account, discover_chain};
pub use error::WalletError;
pub use keys::{AccountKeys, ChainRole, KeyChain, Seed};
pub use ordering::TxOrdering;
pub use state::{ChainState, WalletState};
pub use unspents::UnspentSet;
pub use wallet::{CreatedTransaction, FeeOverride, TransactionRequest, Wallet};
