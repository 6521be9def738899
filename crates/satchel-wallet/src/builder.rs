//! Transaction assembly and pay-to-pubkey-hash signing.
//!
//! Provides an additive builder over [`bitcoin::Transaction`]:
//! 1. Add inputs (txid + vout) and outputs (script + value)
//! 2. Optionally set a lock time
//! 3. Sign each input with its private key and the script it spends
//! 4. Build the final transaction once every input carries a signature

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{OutPoint, PrivateKey, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::error::WalletError;

/// Transaction version emitted by the builder.
pub const TX_VERSION: i32 = 1;

/// Estimated signature script of a P2PKH spend: DER signature with sighash
/// byte, compressed public key and their push opcodes.
pub const ESTIMATED_SCRIPT_SIG_LEN: usize = 107;

/// Builder for unsigned and signed transactions.
///
/// # Example
/// ```ignore
/// let mut txb = TransactionBuilder::new();
/// txb.add_input(&unspent.tx_id, unspent.vout)?;
/// txb.add_output(script, 50_000);
/// txb.sign(0, &key, &prev_script)?;
/// let tx = txb.build()?;
/// ```
pub struct TransactionBuilder {
    tx: Transaction,
    signed: Vec<bool>,
    secp: Secp256k1<All>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            tx: Transaction {
                version: TX_VERSION,
                lock_time: LockTime::ZERO,
                input: Vec::new(),
                output: Vec::new(),
            },
            signed: Vec::new(),
            secp: Secp256k1::new(),
        }
    }

    /// Append an input spending `tx_id:vout`. Returns its index.
    pub fn add_input(&mut self, tx_id: &str, vout: u32) -> Result<usize, WalletError> {
        let txid = Txid::from_str(tx_id)
            .map_err(|e| WalletError::BuildError(format!("txid {tx_id}: {e}")))?;
        let outpoint = OutPoint::new(txid, vout);
        if self.tx.input.iter().any(|i| i.previous_output == outpoint) {
            return Err(WalletError::BuildError(format!("input {outpoint} added twice")));
        }
        self.tx.input.push(TxIn {
            previous_output: outpoint,
            script_sig: ScriptBuf::new(),
            sequence: self.sequence(),
            witness: Witness::new(),
        });
        self.signed.push(false);
        Ok(self.tx.input.len() - 1)
    }

    /// Append an output. Returns its index.
    pub fn add_output(&mut self, script_pubkey: ScriptBuf, value: u64) -> usize {
        self.tx.output.push(TxOut {
            value,
            script_pubkey,
        });
        self.tx.output.len() - 1
    }

    /// Set the absolute lock time (block height or unix time, consensus encoded).
    ///
    /// Must be called before any input is signed.
    pub fn set_lock_time(&mut self, lock_time: u32) -> Result<&mut Self, WalletError> {
        if self.signed.iter().any(|s| *s) {
            return Err(WalletError::BuildError(
                "lock time changed after signing".into(),
            ));
        }
        self.tx.lock_time = LockTime::from_consensus(lock_time);
        let sequence = self.sequence();
        for input in &mut self.tx.input {
            input.sequence = sequence;
        }
        Ok(self)
    }

    /// Estimated serialized size once every input is signed.
    pub fn estimated_size(&self) -> usize {
        let unsigned = self.signed.iter().filter(|s| !**s).count();
        serialize(&self.tx).len() + unsigned * ESTIMATED_SCRIPT_SIG_LEN
    }

    /// The transaction as it stands, signed or not.
    pub fn build_incomplete(&self) -> Transaction {
        self.tx.clone()
    }

    /// Sign input `index` with `key`, which must own `prev_script`.
    pub fn sign(
        &mut self,
        index: usize,
        key: &PrivateKey,
        prev_script: &Script,
    ) -> Result<(), WalletError> {
        if index >= self.tx.input.len() {
            return Err(WalletError::Signing {
                index,
                reason: "no such input".into(),
            });
        }

        let public_key = key.public_key(&self.secp);
        if ScriptBuf::new_p2pkh(&public_key.pubkey_hash()).as_script() != prev_script {
            return Err(WalletError::Signing {
                index,
                reason: "key does not own the spent script".into(),
            });
        }

        let sighash = SighashCache::new(&self.tx)
            .legacy_signature_hash(index, prev_script, EcdsaSighashType::All.to_u32())
            .map_err(|e| WalletError::Signing {
                index,
                reason: e.to_string(),
            })?;
        let message = Message::from_slice(&sighash.to_byte_array()).map_err(|e| {
            WalletError::Signing {
                index,
                reason: e.to_string(),
            }
        })?;
        let signature = self.secp.sign_ecdsa(&message, &key.inner);

        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);
        let push = PushBytesBuf::try_from(sig_bytes).map_err(|e| WalletError::Signing {
            index,
            reason: e.to_string(),
        })?;

        self.tx.input[index].script_sig = Builder::new()
            .push_slice(push)
            .push_key(&public_key)
            .into_script();
        self.signed[index] = true;
        Ok(())
    }

    /// Finish the transaction. Fails while any input is unsigned.
    pub fn build(self) -> Result<Transaction, WalletError> {
        if self.tx.input.is_empty() || self.tx.output.is_empty() {
            return Err(WalletError::BuildError(
                "transaction needs inputs and outputs".into(),
            ));
        }
        if let Some(index) = self.signed.iter().position(|s| !*s) {
            return Err(WalletError::Signing {
                index,
                reason: "input is unsigned".into(),
            });
        }
        Ok(self.tx)
    }

    // A non-final sequence is required for the lock time to take effect.
    fn sequence(&self) -> Sequence {
        if self.tx.lock_time == LockTime::ZERO {
            Sequence::MAX
        } else {
            Sequence::ENABLE_LOCKTIME_NO_RBF
        }
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
