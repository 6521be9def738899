//! Wallet constants. All monetary values in satoshis (1 BTC = 10^8 sat).

pub const COIN: u64 = 100_000_000;

/// Largest value any single output or balance can legitimately hold.
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

/// Estimated bytes of a transaction with no inputs or outputs
/// (version, lock time and the two count prefixes).
pub const TX_EMPTY_SIZE: usize = 8;

/// Estimated bytes contributed by one signed pay-to-pubkey-hash input:
/// 36-byte outpoint, 4-byte sequence, script length prefix and a
/// ~107-byte signature script.
pub const TX_PUBKEYHASH_INPUT: usize = 40 + 2 + 106;

/// Estimated bytes contributed by one pay-to-pubkey-hash output:
/// 8-byte value, script length prefix and a 25-byte script.
pub const TX_PUBKEYHASH_OUTPUT: usize = 8 + 1 + 25;

/// Standard dust threshold for pay-to-pubkey-hash outputs.
pub const DEFAULT_DUST_THRESHOLD: u64 = 546;

/// Default relay fee, charged per started kilobyte.
pub const DEFAULT_FEE_PER_KB: u64 = 10_000;

/// Default ceiling on the fee `create_transaction` will sign (0.1 BTC).
pub const DEFAULT_MAX_FEE: u64 = COIN / 10;

/// A caller-supplied `fee_max` above this is treated as a bug (0.2 BTC).
pub const ABSURD_FEE_MAX: u64 = COIN / 5;

/// Default number of consecutive unused addresses scanned by discovery.
pub const DEFAULT_GAP_LIMIT: usize = 20;

/// Length of a hex-encoded transaction identifier.
pub const TXID_HEX_LEN: usize = 64;

/// First-level hardened account index under the master node.
pub const ACCOUNT_INDEX: u32 = 0;

/// Chain index of the external (receive) chain under the account node.
pub const EXTERNAL_CHAIN_INDEX: u32 = 0;

/// Chain index of the internal (change) chain under the account node.
pub const INTERNAL_CHAIN_INDEX: u32 = 1;
