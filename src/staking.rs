use crate::coin_select::Selection;
use crate::Error;
use crate::ErrorContext;
use crate::StakingOutput;
use crate::TransactionResult;
use crate::Utxo;
use crate::DUST_LIMIT;
use crate::SEQUENCE_RBF_ENABLED;
use crate::TX_VERSION;
use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use bitcoin::Amount;
use bitcoin::FeeRate;
use bitcoin::Psbt;
use bitcoin::Transaction;
use bitcoin::TxIn;
use bitcoin::TxOut;
use bitcoin::XOnlyPublicKey;

/// Build the unsigned staking transaction committing `amount` to the
/// staking output.
///
/// Input selection and fee computation are delegated to `select_utxos_fn`
/// (see [`crate::coin_select::select_staking_utxos`] for the in-crate
/// default). Every selected UTXO becomes a key-spend input with the
/// replace-by-fee sequence, so the transaction can still be fee-bumped or
/// locktime-adjusted before signing.
///
/// Change strictly above the dust limit goes back to `change_address`;
/// anything smaller is folded into the reported fee.
#[allow(clippy::too_many_arguments)]
pub fn build_staking_transaction<F>(
    staking_output: &StakingOutput,
    amount: Amount,
    change_address: Address<NetworkUnchecked>,
    utxos: &[Utxo],
    fee_rate: FeeRate,
    select_utxos_fn: F,
    taproot_internal_key: Option<XOnlyPublicKey>,
    lock_height: Option<u32>,
) -> Result<TransactionResult, Error>
where
    F: FnOnce(&[Utxo], Amount, FeeRate, &[TxOut]) -> Result<Selection, Error>,
{
    if amount == Amount::ZERO {
        return Err(Error::invalid_amount("staking amount must be positive"));
    }
    if amount <= DUST_LIMIT {
        return Err(Error::dust_output(format!(
            "staking amount {amount} does not exceed the dust limit"
        )));
    }
    if fee_rate == FeeRate::ZERO {
        return Err(Error::invalid_fee_rate("fee rate must be positive"));
    }

    let change_address = change_address
        .require_network(staking_output.network())
        .map_err(|e| Error::invalid_address(format!("bad change address: {e}")))?;

    let lock_time = match lock_height {
        Some(height) => LockTime::from_height(height).map_err(|_| {
            Error::invalid_lock_height(format!(
                "lock height {height} is not strictly below {}",
                crate::LOCK_HEIGHT_CUTOFF
            ))
        })?,
        None => LockTime::ZERO,
    };

    let mut outputs = staking_output.to_tx_outs(amount);

    let Selection {
        utxos: selected,
        fee,
    } = select_utxos_fn(utxos, amount, fee_rate, &outputs)
        .context("failed to select staking inputs")?;

    let total_input: Amount = selected.iter().map(|utxo| utxo.amount).sum();

    let change = total_input.checked_sub(amount + fee).ok_or_else(|| {
        Error::insufficient_funds(format!(
            "selected inputs ({total_input}) cannot cover amount ({amount}) plus fee ({fee})"
        ))
    })?;

    // Change at or below the dust limit is absorbed into the fee instead of
    // producing an unspendable output.
    let fee = if change > DUST_LIMIT {
        outputs.push(TxOut {
            value: change,
            script_pubkey: change_address.script_pubkey(),
        });
        fee
    } else {
        fee + change
    };

    tracing::debug!(
        %amount,
        %fee,
        num_inputs = selected.len(),
        has_change = change > DUST_LIMIT,
        "Assembled staking transaction"
    );

    let unsigned_tx = Transaction {
        version: TX_VERSION,
        lock_time,
        input: selected
            .iter()
            .map(|utxo| TxIn {
                previous_output: utxo.outpoint,
                script_sig: Default::default(),
                sequence: SEQUENCE_RBF_ENABLED,
                witness: Default::default(),
            })
            .collect(),
        output: outputs,
    };

    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)
        .map_err(|e| Error::invalid_amount(format!("cannot lift staking transaction: {e}")))?;

    for (psbt_input, utxo) in psbt.inputs.iter_mut().zip(selected.iter()) {
        psbt_input.witness_utxo = Some(TxOut {
            value: utxo.amount,
            script_pubkey: utxo.script_pubkey.clone(),
        });
        psbt_input.tap_internal_key = taproot_internal_key;
    }

    Ok(TransactionResult { psbt, fee })
}
