use crate::Error;
use crate::ErrorContext;
use crate::StakingOutput;
use crate::UnbondingOutput;
use crate::DUST_LIMIT;
use crate::SEQUENCE_NO_RBF_NO_LOCKTIME;
use crate::TX_VERSION;
use bitcoin::absolute::LockTime;
use bitcoin::Amount;
use bitcoin::OutPoint;
use bitcoin::Psbt;
use bitcoin::Transaction;
use bitcoin::TxIn;
use bitcoin::TxOut;
use std::collections::BTreeMap;

/// Build the unsigned unbonding transaction, moving the stake from the
/// staking output to the unbonding output on demand.
///
/// Spends the unbonding leaf of the staking tree; the covenant quorum must
/// co-sign the spend, so `transaction_fee` is fixed up front rather than
/// estimated from a fee rate.
pub fn build_unbonding_transaction(
    staking_output: &StakingOutput,
    unbonding_output: &UnbondingOutput,
    funding_tx: &Transaction,
    output_index: u32,
    transaction_fee: Amount,
) -> Result<Psbt, Error> {
    build(
        staking_output,
        unbonding_output,
        funding_tx,
        output_index,
        transaction_fee,
    )
    .context("failed to build unbonding transaction")
}

fn build(
    staking_output: &StakingOutput,
    unbonding_output: &UnbondingOutput,
    funding_tx: &Transaction,
    output_index: u32,
    transaction_fee: Amount,
) -> Result<Psbt, Error> {
    if transaction_fee == Amount::ZERO {
        return Err(Error::invalid_fee_value("transaction fee must be positive"));
    }

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

    let value = prevout.value.checked_sub(transaction_fee).ok_or_else(|| {
        Error::insufficient_funds(format!(
            "fee ({transaction_fee}) exceeds the staked value ({})",
            prevout.value
        ))
    })?;

    if value <= DUST_LIMIT {
        return Err(Error::dust_output(format!(
            "unbonding output of {value} does not exceed the dust limit"
        )));
    }

    tracing::debug!(%value, fee = %transaction_fee, "Assembled unbonding transaction");

    let (unbonding_script, control_block) = staking_output.unbonding_spend_info();

    let unsigned_tx = Transaction {
        version: TX_VERSION,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: funding_tx.compute_txid(),
                vout: output_index,
            },
            script_sig: Default::default(),
            // Unbonding is never fee-bumped or time-delayed.
            sequence: SEQUENCE_NO_RBF_NO_LOCKTIME,
            witness: Default::default(),
        }],
        output: vec![TxOut {
            value,
            script_pubkey: unbonding_output.script_pubkey(),
        }],
    };

    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)
        .map_err(|e| Error::invalid_amount(format!("cannot lift unbonding transaction: {e}")))?;

    let leaf_version = control_block.leaf_version;
    psbt.inputs[0].witness_utxo = Some(prevout);
    psbt.inputs[0].tap_internal_key = Some(staking_output.internal_key());
    psbt.inputs[0].tap_scripts =
        BTreeMap::from_iter([(control_block, (unbonding_script, leaf_version))]);

    Ok(psbt)
}
