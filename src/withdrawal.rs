use crate::fee::estimate_withdrawal_fee;
use crate::script::decode_timelock;
use crate::Error;
use crate::ErrorContext;
use crate::StakingOutput;
use crate::TransactionResult;
use crate::UnbondingOutput;
use crate::DUST_LIMIT;
use crate::TX_VERSION;
use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::taproot::ControlBlock;
use bitcoin::taproot::LeafVersion;
use bitcoin::Address;
use bitcoin::FeeRate;
use bitcoin::Network;
use bitcoin::OutPoint;
use bitcoin::Psbt;
use bitcoin::ScriptBuf;
use bitcoin::Sequence;
use bitcoin::Transaction;
use bitcoin::TxIn;
use bitcoin::TxOut;
use bitcoin::XOnlyPublicKey;
use std::collections::BTreeMap;

/// Withdraw a staking output whose staking period has expired.
///
/// Spends the timelock leaf of the staking tree. The input's sequence number
/// is set to the timelock decoded from the leaf script, which both proves
/// and enforces the relative-timelock condition at consensus level.
pub fn build_timelock_unbonded_withdrawal_transaction(
    staking_output: &StakingOutput,
    funding_tx: &Transaction,
    output_index: u32,
    withdrawal_address: Address<NetworkUnchecked>,
    fee_rate: FeeRate,
) -> Result<TransactionResult, Error> {
    let (timelock_script, control_block) = staking_output.timelock_spend_info();

    build_withdrawal_transaction(
        timelock_script,
        control_block,
        staking_output.internal_key(),
        staking_output.network(),
        funding_tx,
        output_index,
        withdrawal_address,
        fee_rate,
    )
    .context("failed to build timelock-unbonded withdrawal transaction")
}

/// Withdraw an unbonding output whose unbonding period has expired.
///
/// Spends the timelock leaf of the unbonding tree; otherwise identical to
/// [`build_timelock_unbonded_withdrawal_transaction`].
pub fn build_early_unbonded_withdrawal_transaction(
    unbonding_output: &UnbondingOutput,
    funding_tx: &Transaction,
    output_index: u32,
    withdrawal_address: Address<NetworkUnchecked>,
    fee_rate: FeeRate,
) -> Result<TransactionResult, Error> {
    let (timelock_script, control_block) = unbonding_output.timelock_spend_info();

    build_withdrawal_transaction(
        timelock_script,
        control_block,
        unbonding_output.internal_key(),
        unbonding_output.network(),
        funding_tx,
        output_index,
        withdrawal_address,
        fee_rate,
    )
    .context("failed to build early-unbonded withdrawal transaction")
}

#[allow(clippy::too_many_arguments)]
fn build_withdrawal_transaction(
    timelock_script: ScriptBuf,
    control_block: ControlBlock,
    internal_key: XOnlyPublicKey,
    network: Network,
    funding_tx: &Transaction,
    output_index: u32,
    withdrawal_address: Address<NetworkUnchecked>,
    fee_rate: FeeRate,
) -> Result<TransactionResult, Error> {
    if fee_rate == FeeRate::ZERO {
        return Err(Error::invalid_fee_rate("fee rate must be positive"));
    }

    let withdrawal_address = withdrawal_address
        .require_network(network)
        .map_err(|e| Error::invalid_address(format!("bad withdrawal address: {e}")))?;

    let prevout = funding_tx
        .output
        .get(output_index as usize)
        .ok_or_else(|| {
            Error::index_out_of_range(format!(
                "output index {output_index} exceeds the {} outputs of the funding transaction",
                funding_tx.output.len()
            ))
        })?
        .clone();

    let timelock = decode_timelock(&timelock_script)?;

    let fee = estimate_withdrawal_fee(fee_rate, &timelock_script, &control_block)?;

    let value = prevout.value.checked_sub(fee).ok_or_else(|| {
        Error::insufficient_funds(format!(
            "fee ({fee}) exceeds the withdrawn value ({})",
            prevout.value
        ))
    })?;

    if value <= DUST_LIMIT {
        return Err(Error::dust_output(format!(
            "withdrawal output of {value} does not exceed the dust limit"
        )));
    }

    tracing::debug!(timelock, %value, %fee, "Assembled withdrawal transaction");

    let unsigned_tx = Transaction {
        version: TX_VERSION,
        // Only the relative timelock gates spendability.
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: funding_tx.compute_txid(),
                vout: output_index,
            },
            script_sig: Default::default(),
            sequence: Sequence::from_height(timelock),
            witness: Default::default(),
        }],
        output: vec![TxOut {
            value,
            script_pubkey: withdrawal_address.script_pubkey(),
        }],
    };

    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)
        .map_err(|e| Error::invalid_amount(format!("cannot lift withdrawal transaction: {e}")))?;

    let leaf_version = control_block.leaf_version;
    psbt.inputs[0].witness_utxo = Some(prevout);
    psbt.inputs[0].tap_internal_key = Some(internal_key);
    psbt.inputs[0].tap_scripts =
        BTreeMap::from_iter([(control_block, (timelock_script, leaf_version))]);

    debug_assert_eq!(leaf_version, LeafVersion::TapScript);

    Ok(TransactionResult { psbt, fee })
}
