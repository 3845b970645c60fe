use bitcoin::hashes::Hash;
use bitcoin::key::Secp256k1;
use bitcoin::opcodes::all::*;
use bitcoin::secp256k1::schnorr;
use bitcoin::Address;
use bitcoin::Amount;
use bitcoin::FeeRate;
use bitcoin::Network;
use bitcoin::OutPoint;
use bitcoin::ScriptBuf;
use bitcoin::Sequence;
use bitcoin::Txid;
use bitcoin::Witness;
use bitcoin::XOnlyPublicKey;
use staking_core::coin_select::select_staking_utxos;
use staking_core::fee::estimate_withdrawal_fee;
use staking_core::slashing::build_early_unbonded_slashing_transaction;
use staking_core::slashing::build_timelock_unbonded_slashing_transaction;
use staking_core::staking::build_staking_transaction;
use staking_core::unbonding::build_unbonding_transaction;
use staking_core::withdrawal::build_early_unbonded_withdrawal_transaction;
use staking_core::withdrawal::build_timelock_unbonded_withdrawal_transaction;
use staking_core::witness::compose_covenant_witness;
use staking_core::StakingOutput;
use staking_core::StakingScripts;
use staking_core::UnbondingOutput;
use staking_core::UnbondingScripts;
use staking_core::Utxo;
use std::collections::BTreeMap;
use std::str::FromStr;

const STAKING_TIMELOCK: i64 = 65_000;
const UNBONDING_TIMELOCK: i64 = 1_008;

fn nums_key() -> XOnlyPublicKey {
    XOnlyPublicKey::from_str(staking_core::UNSPENDABLE_KEY).unwrap()
}

fn staker_key() -> XOnlyPublicKey {
    XOnlyPublicKey::from_str("18845781f631c48f1c9709e23092067d06837f30aa0cd0544ac887fe91ddd166")
        .unwrap()
}

fn covenant_keys() -> Vec<XOnlyPublicKey> {
    [
        "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
        "dff1d77f2a671c5f36183726db2341be58feae1da2deced843240f7b502ba659",
        "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    ]
    .iter()
    .map(|pk| XOnlyPublicKey::from_str(pk).unwrap())
    .collect()
}

/// `<staker_pk> OP_CHECKSIGVERIFY <timelock> OP_CSV`
fn timelock_script(timelock: i64) -> ScriptBuf {
    ScriptBuf::builder()
        .push_x_only_key(&staker_key())
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(timelock)
        .push_opcode(OP_CSV)
        .into_script()
}

/// Staker signature plus a covenant quorum check over the keys in
/// descending byte order, the order the witness composer assumes.
fn covenant_script(quorum: i64) -> ScriptBuf {
    let mut pks = covenant_keys();
    pks.sort_by(|a, b| b.serialize().cmp(&a.serialize()));

    let mut builder = ScriptBuf::builder()
        .push_x_only_key(&staker_key())
        .push_opcode(OP_CHECKSIGVERIFY);

    for (i, pk) in pks.iter().enumerate() {
        builder = builder.push_x_only_key(pk);
        builder = builder.push_opcode(if i == 0 { OP_CHECKSIG } else { OP_CHECKSIGADD });
    }

    builder
        .push_int(quorum)
        .push_opcode(OP_NUMEQUAL)
        .into_script()
}

fn staking_scripts() -> StakingScripts {
    StakingScripts {
        timelock: timelock_script(STAKING_TIMELOCK),
        unbonding: covenant_script(2),
        slashing: covenant_script(3),
        frost_slashing: None,
        data_embed: Some(
            ScriptBuf::builder()
                .push_opcode(OP_RETURN)
                .push_slice(*b"delegation v0")
                .into_script(),
        ),
    }
}

fn unbonding_scripts() -> UnbondingScripts {
    UnbondingScripts {
        slashing: covenant_script(3),
        unbonding_timelock: timelock_script(UNBONDING_TIMELOCK),
    }
}

fn utxo(vout: u32, amount: Amount) -> Utxo {
    Utxo {
        outpoint: OutPoint {
            txid: Txid::all_zeros(),
            vout,
        },
        amount,
        script_pubkey: ScriptBuf::from_bytes(vec![0x51; 34]),
    }
}

fn address(network: Network) -> Address<bitcoin::address::NetworkUnchecked> {
    let secp = Secp256k1::verification_only();
    Address::p2tr(&secp, staker_key(), None, network)
        .to_string()
        .parse()
        .unwrap()
}

#[test]
fn full_delegation_lifecycle() {
    let secp = Secp256k1::verification_only();
    let network = Network::Signet;

    let staking_output = StakingOutput::new(&secp, nums_key(), staking_scripts(), network);
    let unbonding_output = UnbondingOutput::new(&secp, nums_key(), unbonding_scripts(), network);

    // Stake 100_000 sats out of two wallet UTXOs.
    let utxos = vec![
        utxo(0, Amount::from_sat(80_000)),
        utxo(1, Amount::from_sat(40_000)),
    ];
    let amount = Amount::from_sat(100_000);

    let staking = build_staking_transaction(
        &staking_output,
        amount,
        address(network),
        &utxos,
        FeeRate::from_sat_per_vb_unchecked(2),
        select_staking_utxos,
        Some(staker_key()),
        Some(200_000),
    )
    .unwrap();

    let staking_tx = &staking.psbt.unsigned_tx;

    // Staking output, data-embed commitment and change.
    assert_eq!(staking_tx.output.len(), 3);
    assert_eq!(staking_tx.output[0].value, amount);
    assert_eq!(staking_tx.output[0].script_pubkey, staking_output.script_pubkey());
    assert!(staking_tx.output[1].script_pubkey.is_op_return());

    let total_in: Amount = staking_tx
        .input
        .iter()
        .map(|input| {
            utxos
                .iter()
                .find(|utxo| utxo.outpoint == input.previous_output)
                .unwrap()
                .amount
        })
        .sum();
    let total_out: Amount = staking_tx.output.iter().map(|o| o.value).sum();
    assert_eq!(total_out + staking.fee, total_in);

    // Unbond on demand.
    let unbonding_fee = Amount::from_sat(2_000);
    let unbonding_psbt = build_unbonding_transaction(
        &staking_output,
        &unbonding_output,
        staking_tx,
        0,
        unbonding_fee,
    )
    .unwrap();

    let unbonding_tx = &unbonding_psbt.unsigned_tx;
    assert_eq!(unbonding_tx.output[0].value, amount - unbonding_fee);
    assert_eq!(
        unbonding_tx.output[0].script_pubkey,
        unbonding_output.script_pubkey()
    );

    // Withdraw the unbonded stake once the unbonding timelock expires.
    let withdrawal = build_early_unbonded_withdrawal_transaction(
        &unbonding_output,
        unbonding_tx,
        0,
        address(network),
        FeeRate::from_sat_per_vb_unchecked(2),
    )
    .unwrap();

    let withdrawal_tx = &withdrawal.psbt.unsigned_tx;
    assert_eq!(
        withdrawal_tx.input[0].sequence,
        Sequence::from_height(UNBONDING_TIMELOCK as u16)
    );
    assert_eq!(
        withdrawal_tx.output[0].value + withdrawal.fee,
        unbonding_tx.output[0].value
    );
}

#[test]
fn both_slashing_paths_split_the_stake_identically() {
    let secp = Secp256k1::verification_only();
    let network = Network::Signet;

    let staking_output = StakingOutput::new(&secp, nums_key(), staking_scripts(), network);
    let unbonding_output = UnbondingOutput::new(&secp, nums_key(), unbonding_scripts(), network);

    let funding = bitcoin::Transaction {
        version: bitcoin::transaction::Version::TWO,
        lock_time: bitcoin::absolute::LockTime::ZERO,
        input: vec![bitcoin::TxIn::default()],
        output: vec![
            bitcoin::TxOut {
                value: Amount::from_sat(100_000),
                script_pubkey: staking_output.script_pubkey(),
            },
            bitcoin::TxOut {
                value: Amount::from_sat(100_000),
                script_pubkey: unbonding_output.script_pubkey(),
            },
        ],
    };

    let timelock_unbonded = build_timelock_unbonded_slashing_transaction(
        &secp,
        &staking_output,
        &timelock_script(UNBONDING_TIMELOCK),
        &funding,
        0,
        address(network),
        0.10,
        Amount::from_sat(1_000),
    )
    .unwrap();

    let early_unbonded = build_early_unbonded_slashing_transaction(
        &secp,
        &unbonding_output,
        &timelock_script(UNBONDING_TIMELOCK),
        &funding,
        1,
        address(network),
        0.10,
        Amount::from_sat(1_000),
    )
    .unwrap();

    for psbt in [&timelock_unbonded, &early_unbonded] {
        let tx = &psbt.unsigned_tx;
        assert_eq!(tx.output[0].value, Amount::from_sat(10_000));
        assert_eq!(tx.output[1].value, Amount::from_sat(89_000));
        assert_eq!(tx.input[0].sequence, Sequence::MAX);
        assert_eq!(tx.lock_time, bitcoin::absolute::LockTime::ZERO);
    }

    // Both re-commit the user funds to the same timelock output.
    assert_eq!(
        timelock_unbonded.unsigned_tx.output[1].script_pubkey,
        early_unbonded.unsigned_tx.output[1].script_pubkey
    );
}

#[test]
fn withdrawal_fee_matches_the_constant_size_model() {
    let secp = Secp256k1::verification_only();
    let network = Network::Signet;
    let staking_output = StakingOutput::new(&secp, nums_key(), staking_scripts(), network);

    let funding = bitcoin::Transaction {
        version: bitcoin::transaction::Version::TWO,
        lock_time: bitcoin::absolute::LockTime::ZERO,
        input: vec![bitcoin::TxIn::default()],
        output: vec![bitcoin::TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey: staking_output.script_pubkey(),
        }],
    };

    let fee_rate = FeeRate::from_sat_per_vb_unchecked(3);
    let withdrawal = build_timelock_unbonded_withdrawal_transaction(
        &staking_output,
        &funding,
        0,
        address(network),
        fee_rate,
    )
    .unwrap();

    let (script, control_block) = staking_output.timelock_spend_info();
    assert_eq!(
        withdrawal.fee,
        estimate_withdrawal_fee(fee_rate, &script, &control_block).unwrap()
    );
    assert_eq!(
        withdrawal.psbt.unsigned_tx.input[0].sequence,
        Sequence::from_height(STAKING_TIMELOCK as u16)
    );
}

#[test]
fn covenant_witness_completes_an_unbonding_spend() {
    let secp = Secp256k1::verification_only();
    let network = Network::Signet;
    let staking_output = StakingOutput::new(&secp, nums_key(), staking_scripts(), network);

    let (unbonding_script, control_block) = staking_output.unbonding_spend_info();

    // Witness so far: staker signature, revealed script, control block.
    let staker_sig = vec![0xAB; 64];
    let original = Witness::from_slice(&[
        staker_sig.clone(),
        unbonding_script.to_bytes(),
        control_block.serialize(),
    ]);

    let pks = covenant_keys();

    // Two of three covenant members respond.
    let sigs: BTreeMap<XOnlyPublicKey, schnorr::Signature> = pks
        .iter()
        .take(2)
        .map(|pk| (*pk, schnorr::Signature::from_slice(&[0x0F; 64]).unwrap()))
        .collect();

    let witness = compose_covenant_witness(&original, &pks, &sigs);

    assert_eq!(witness.len(), pks.len() + 3);

    // Signature block first, in descending key order, with one gap.
    let mut ordered = pks.clone();
    ordered.sort_by(|a, b| b.serialize().cmp(&a.serialize()));
    for (i, pk) in ordered.iter().enumerate() {
        match sigs.get(pk) {
            Some(sig) => assert_eq!(witness.nth(i).unwrap(), sig.serialize().as_slice()),
            None => assert!(witness.nth(i).unwrap().is_empty()),
        }
    }

    // Original items last.
    assert_eq!(witness.nth(pks.len()).unwrap(), staker_sig.as_slice());
    assert_eq!(
        witness.nth(pks.len() + 1).unwrap(),
        unbonding_script.as_bytes()
    );
    assert_eq!(
        witness.nth(pks.len() + 2).unwrap(),
        control_block.serialize().as_slice()
    );
}

#[test]
fn assemblers_are_deterministic() {
    let secp = Secp256k1::verification_only();
    let network = Network::Signet;

    let build = || {
        let staking_output = StakingOutput::new(&secp, nums_key(), staking_scripts(), network);

        build_staking_transaction(
            &staking_output,
            Amount::from_sat(100_000),
            address(network),
            &[utxo(0, Amount::from_sat(150_000))],
            FeeRate::from_sat_per_vb_unchecked(2),
            select_staking_utxos,
            None,
            None,
        )
        .unwrap()
    };

    let a = build();
    let b = build();

    assert_eq!(a.fee, b.fee);
    assert_eq!(a.psbt.serialize(), b.psbt.serialize());
}
