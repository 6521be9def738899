//! End-to-end wallet lifecycle tests.
//!
//! Each test starts from a fixed seed, drives discovery against a scripted
//! backend, ingests unspents and builds signed transactions, checking the
//! results with an independent signature verification.

use bitcoin::hashes::Hash;
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{Message, Secp256k1, ecdsa::Signature};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{PublicKey, Transaction};

use satchel_core::Network;
use satchel_core::address::{BitcoinAddressCodec, p2pkh_address};
use satchel_core::error::{ProviderError, ValidationError};
use satchel_core::traits::AddressCodec;
use satchel_core::types::Unspent;
use satchel_tests::helpers::*;
use satchel_wallet::{
    ChainRole, FeeOverride, TransactionRequest, TxOrdering, Wallet, WalletConfig, WalletError,
};

fn config_with_gap(gap_limit: usize) -> WalletConfig {
    WalletConfig {
        gap_limit,
        ..WalletConfig::for_network(Network::Testnet)
    }
}

/// Verify every input signature against the script its unspent pays to.
fn verify_signatures(tx: &Transaction, inputs: &[Unspent]) {
    let secp = Secp256k1::verification_only();
    let codec = BitcoinAddressCodec::new(Network::Testnet);
    for (index, input) in inputs.iter().enumerate() {
        let pushes: Vec<Vec<u8>> = tx.input[index]
            .script_sig
            .instructions()
            .map(|i| match i.unwrap() {
                Instruction::PushBytes(p) => p.as_bytes().to_vec(),
                Instruction::Op(op) => panic!("unexpected opcode {op:?}"),
            })
            .collect();
        assert_eq!(pushes.len(), 2, "input {index}");

        let public_key = PublicKey::from_slice(&pushes[1]).unwrap();
        assert_eq!(p2pkh_address(&public_key, Network::Testnet), input.address);

        let prev_script = codec.address_to_script(&input.address).unwrap();
        let sighash = SighashCache::new(tx)
            .legacy_signature_hash(index, &prev_script, EcdsaSighashType::All.to_u32())
            .unwrap();
        let msg = Message::from_slice(&sighash.to_byte_array()).unwrap();
        let (der, hash_type) = pushes[0].split_at(pushes[0].len() - 1);
        assert_eq!(hash_type, &[0x01]);
        let sig = Signature::from_der(der).unwrap();
        secp.verify_ecdsa(&msg, &sig, &public_key.inner).unwrap();
    }
}

#[tokio::test]
async fn discovery_trims_each_chain_to_one_unused() {
    let (mut wallet, _keys) =
        Wallet::from_seed_hex(TEST_SEED_HEX, config_with_gap(2)).unwrap();
    let external = ScriptedQuery::for_chain(
        wallet.account().chain(ChainRole::External),
        &[true, true, true, false, false, false],
    );
    let internal = ScriptedQuery::for_chain(
        wallet.account().chain(ChainRole::Internal),
        &[true, true, false, false],
    );

    let (ext, int) = wallet.discover_with(&external, &internal).await.unwrap();

    assert_eq!(ext.frontier, 4);
    assert_eq!(int.frontier, 3);
    assert_eq!(wallet.account().chain(ChainRole::External).frontier(), 4);
    assert_eq!(wallet.account().chain(ChainRole::Internal).frontier(), 3);
    assert_eq!(external.calls(), 3);
    assert_eq!(internal.calls(), 2);
    assert_eq!(wallet.all_addresses().len(), 7);
}

#[tokio::test]
async fn discovery_failure_is_reported() {
    let (mut wallet, _keys) = testnet_wallet();
    let err = wallet.discover(&FailingQuery).await.unwrap_err();
    assert!(matches!(
        err,
        WalletError::DiscoveryQueryFailed(ProviderError::Query(_))
    ));
    // the first batch was derived before the query failed
    assert!(wallet.account().chain(ChainRole::External).frontier() >= 1);
}

#[tokio::test]
async fn sync_then_spend_produces_valid_signatures() {
    let (mut wallet, keys) = wallet_from_byte(0x31);
    let r1 = wallet.next_address().unwrap();
    let r2 = wallet.next_address().unwrap();
    let c0 = wallet.change_address().unwrap();

    let source = MemorySource {
        unspents: vec![
            unspent(1, &r1, 300_000, 2),
            unspent(2, &r2, 250_000, 1),
            unspent(3, &c0, 120_000, 9),
            unspent(4, FOREIGN_TESTNET, 999_999, 9),
        ],
    };
    let synced = wallet.sync_unspents(&source).await.unwrap();
    assert_eq!(synced, 3);
    assert_eq!(wallet.balance(), 670_000);

    let request = TransactionRequest::pay(FOREIGN_TESTNET, 600_000);
    let created = wallet.create_transaction(&request, &keys).unwrap();
    assert_eq!(created.inputs.len(), 3);
    verify_signatures(&created.transaction, &created.inputs);

    let total_in: u64 = created.inputs.iter().map(|u| u.value).sum();
    let total_out: u64 = created.transaction.output.iter().map(|o| o.value).sum();
    assert_eq!(total_in, 600_000 + created.change + created.fee);
    assert_eq!(total_in - total_out, created.fee);
    assert_eq!(created.txid(), created.transaction.txid());
    assert!(created.to_hex().starts_with("01000000"));
}

#[test]
fn three_unspent_scenario() {
    let (mut wallet, keys) = testnet_wallet();
    let a0 = wallet.receive_address().unwrap();
    let a1 = wallet.next_address().unwrap();
    let a2 = wallet.next_address().unwrap();
    wallet
        .set_unspent_outputs(vec![
            unspent(1, &a0, 400_000, 1),
            unspent(2, &a1, 500_000, 1),
            unspent(3, &a2, 510_000, 1),
        ])
        .unwrap();

    let rate = wallet
        .create_transaction(&TransactionRequest::pay(FOREIGN_TESTNET, 500_000), &keys)
        .unwrap();
    assert_eq!(rate.inputs.len(), 1);
    assert_eq!(rate.inputs[0].value, 510_000);
    assert_eq!(rate.fee + rate.change, 10_000);

    let fixed = wallet
        .create_transaction(
            &TransactionRequest::pay(FOREIGN_TESTNET, 500_000).fixed_fee(30_000),
            &keys,
        )
        .unwrap();
    assert_eq!(fixed.fee, 30_000);
    let spent: u64 = fixed.inputs.iter().map(|u| u.value).sum();
    assert_eq!(fixed.change, spent - 500_000 - 30_000);

    let folded = wallet
        .create_transaction(
            &TransactionRequest::pay(FOREIGN_TESTNET, 510_000 - 546).fixed_fee(0),
            &keys,
        )
        .unwrap();
    assert_eq!(folded.change, 0);
    assert_eq!(folded.fee, 546);

    let kept = wallet
        .create_transaction(
            &TransactionRequest::pay(FOREIGN_TESTNET, 510_000 - 547).fixed_fee(0),
            &keys,
        )
        .unwrap();
    assert_eq!(kept.change, 547);

    assert!(matches!(
        wallet.create_transaction(&TransactionRequest::pay(FOREIGN_TESTNET, 546), &keys),
        Err(WalletError::DustOutput { value: 546, threshold: 546 })
    ));

    assert_eq!(
        wallet
            .create_transaction(&TransactionRequest::pay(FOREIGN_TESTNET, 1_405_000), &keys)
            .unwrap_err(),
        WalletError::InsufficientFunds {
            have: 1_410_000,
            need: 1_415_000
        }
    );
}

#[test]
fn duplicate_unspents_keep_previous_set() {
    let (mut wallet, _keys) = testnet_wallet();
    let a0 = wallet.receive_address().unwrap();
    wallet
        .set_unspent_outputs(vec![unspent(1, &a0, 10_000, 1)])
        .unwrap();

    let err = wallet
        .set_unspent_outputs(vec![unspent(2, &a0, 1, 1), unspent(2, &a0, 2, 1)])
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::Validation(ValidationError::DuplicateUnspent(format!(
            "{}:0",
            fake_txid(2)
        )))
    );
    assert_eq!(wallet.unspents(), &[unspent(1, &a0, 10_000, 1)]);
}

#[tokio::test]
async fn state_round_trip_after_discovery() {
    let (mut wallet, keys) = Wallet::from_seed_hex(TEST_SEED_HEX, config_with_gap(3)).unwrap();
    let external = ScriptedQuery::for_chain(
        wallet.account().chain(ChainRole::External),
        &[true, false, true],
    );
    let internal = ScriptedQuery::for_chain(wallet.account().chain(ChainRole::Internal), &[true]);
    wallet.discover_with(&external, &internal).await.unwrap();
    let a0 = wallet.receive_address().unwrap();
    wallet
        .set_unspent_outputs(vec![unspent(5, &a0, 75_000, 4)])
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.json");
    wallet.save_to_file(&path).unwrap();
    let restored = Wallet::load_from_file(&path, config_with_gap(3)).unwrap();

    assert_eq!(restored.to_state(), wallet.to_state());
    assert_eq!(restored.to_json().unwrap(), wallet.to_json().unwrap());
    for role in [ChainRole::External, ChainRole::Internal] {
        let a = wallet.account().chain(role);
        let b = restored.account().chain(role);
        assert_eq!(a.frontier(), b.frontier());
        assert_eq!(a.addresses(), b.addresses());
        assert_eq!(a.address_map(), b.address_map());
    }

    // the restored watch-only wallet still signs with the original keys
    let created = restored
        .create_transaction(&TransactionRequest::pay(FOREIGN_TESTNET, 50_000), &keys)
        .unwrap();
    verify_signatures(&created.transaction, &created.inputs);
}

#[test]
fn state_json_has_expected_shape() {
    let (wallet, _keys) = testnet_wallet();
    let value: serde_json::Value = serde_json::from_str(&wallet.to_json().unwrap()).unwrap();
    for chain in ["external", "internal"] {
        assert!(value[chain]["node"].as_str().unwrap().starts_with("tpub"));
        assert_eq!(value[chain]["k"], 1);
        assert_eq!(value[chain]["addresses"].as_array().unwrap().len(), 1);
        assert_eq!(value[chain]["map"].as_object().unwrap().len(), 1);
    }
    assert!(value["unspents"].as_array().unwrap().is_empty());
}

#[test]
fn contains_address_covers_both_chains_only() {
    let (mut wallet, _keys) = testnet_wallet();
    for _ in 0..3 {
        wallet.next_address().unwrap();
        wallet.next_change_address().unwrap();
    }
    for address in wallet.all_addresses() {
        assert!(wallet.contains_address(&address));
    }
    let external = wallet.account().chain(ChainRole::External);
    let never_issued = external.address_at(external.frontier() + 5).unwrap();
    assert!(!wallet.contains_address(&never_issued));
    assert!(!wallet.contains_address(FOREIGN_TESTNET));
}

#[test]
fn fee_override_and_shuffle_ordering() {
    let (wallet, keys) = testnet_wallet();
    let a0 = wallet.receive_address().unwrap();
    let config = WalletConfig {
        ordering: TxOrdering::Shuffle { seed: 9 },
        ..WalletConfig::for_network(Network::Testnet)
    };
    let mut wallet = Wallet::from_state(&wallet.to_state(), config).unwrap();
    wallet
        .set_unspent_outputs(vec![unspent(1, &a0, 200_000, 1), unspent(2, &a0, 200_000, 1)])
        .unwrap();

    let mut request = TransactionRequest::pay(FOREIGN_TESTNET, 300_000);
    request.fee = Some(FeeOverride::PerKb(1_000));
    let first = wallet.create_transaction(&request, &keys).unwrap();
    let second = wallet.create_transaction(&request, &keys).unwrap();
    assert_eq!(first.fee, 1_000);
    assert_eq!(first.change, 99_000);
    assert_eq!(first.transaction, second.transaction);
}
