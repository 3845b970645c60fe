use crate::unbonding_output::timelock_recommit_script_pubkey;
use crate::Error;
use crate::ErrorContext;
use crate::StakingOutput;
use crate::UnbondingOutput;
use crate::DUST_LIMIT;
use crate::SEQUENCE_NO_RBF_NO_LOCKTIME;
use crate::TX_VERSION;
use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::key::Secp256k1;
use bitcoin::key::Verification;
use bitcoin::taproot::ControlBlock;
use bitcoin::Address;
use bitcoin::Amount;
use bitcoin::Network;
use bitcoin::OutPoint;
use bitcoin::Psbt;
use bitcoin::ScriptBuf;
use bitcoin::Transaction;
use bitcoin::TxIn;
use bitcoin::TxOut;
use bitcoin::XOnlyPublicKey;
use std::collections::BTreeMap;

/// Slash a delegation that is still in the staking stage.
///
/// Spends the slashing leaf of the staking tree. The slashed portion goes to
/// `slashing_address`; the remainder, minus `minimum_fee`, is re-committed
/// to a single-leaf Taproot output under `unbonding_timelock_script`, so the
/// user funds re-enter the timelock regime.
#[allow(clippy::too_many_arguments)]
pub fn build_timelock_unbonded_slashing_transaction<C>(
    secp: &Secp256k1<C>,
    staking_output: &StakingOutput,
    unbonding_timelock_script: &ScriptBuf,
    funding_tx: &Transaction,
    output_index: u32,
    slashing_address: Address<NetworkUnchecked>,
    slashing_rate: f64,
    minimum_fee: Amount,
) -> Result<Psbt, Error>
where
    C: Verification,
{
    let (slashing_script, control_block) = staking_output.slashing_spend_info();

    build_slashing_transaction(
        secp,
        slashing_script,
        control_block,
        staking_output.internal_key(),
        staking_output.network(),
        unbonding_timelock_script,
        funding_tx,
        output_index,
        slashing_address,
        slashing_rate,
        minimum_fee,
    )
    .context("failed to build timelock-unbonded slashing transaction")
}

/// Slash a delegation that has moved to the unbonding stage.
///
/// Spends the slashing leaf of the unbonding tree; otherwise identical to
/// [`build_timelock_unbonded_slashing_transaction`].
#[allow(clippy::too_many_arguments)]
pub fn build_early_unbonded_slashing_transaction<C>(
    secp: &Secp256k1<C>,
    unbonding_output: &UnbondingOutput,
    unbonding_timelock_script: &ScriptBuf,
    funding_tx: &Transaction,
    output_index: u32,
    slashing_address: Address<NetworkUnchecked>,
    slashing_rate: f64,
    minimum_fee: Amount,
) -> Result<Psbt, Error>
where
    C: Verification,
{
    let (slashing_script, control_block) = unbonding_output.slashing_spend_info();

    build_slashing_transaction(
        secp,
        slashing_script,
        control_block,
        unbonding_output.internal_key(),
        unbonding_output.network(),
        unbonding_timelock_script,
        funding_tx,
        output_index,
        slashing_address,
        slashing_rate,
        minimum_fee,
    )
    .context("failed to build early-unbonded slashing transaction")
}

#[allow(clippy::too_many_arguments)]
fn build_slashing_transaction<C>(
    secp: &Secp256k1<C>,
    slashing_script: ScriptBuf,
    control_block: ControlBlock,
    internal_key: XOnlyPublicKey,
    network: Network,
    unbonding_timelock_script: &ScriptBuf,
    funding_tx: &Transaction,
    output_index: u32,
    slashing_address: Address<NetworkUnchecked>,
    slashing_rate: f64,
    minimum_fee: Amount,
) -> Result<Psbt, Error>
where
    C: Verification,
{
    if !slashing_rate.is_finite() || slashing_rate <= 0.0 || slashing_rate >= 1.0 {
        return Err(Error::invalid_rate(format!(
            "slashing rate {slashing_rate} is outside (0, 1)"
        )));
    }

    // Round to two decimal places, half away from zero.
    let slashing_rate = (slashing_rate * 100.0).round() / 100.0;
    if slashing_rate <= 0.0 || slashing_rate >= 1.0 {
        return Err(Error::invalid_rate(format!(
            "slashing rate rounds to {slashing_rate}, outside (0, 1)"
        )));
    }

    if minimum_fee == Amount::ZERO {
        return Err(Error::invalid_fee_value("minimum fee must be positive"));
    }

    let slashing_address = slashing_address
        .require_network(network)
        .map_err(|e| Error::invalid_address(format!("bad slashing address: {e}")))?;

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

    let staking_amount = prevout.value;

    let slashing_amount =
        Amount::from_sat((staking_amount.to_sat() as f64 * slashing_rate).floor() as u64);
    if slashing_amount <= DUST_LIMIT {
        return Err(Error::dust_output(format!(
            "slashing output of {slashing_amount} does not exceed the dust limit"
        )));
    }

    let user_funds = staking_amount
        .checked_sub(slashing_amount)
        .and_then(|rest| rest.checked_sub(minimum_fee))
        .filter(|user_funds| *user_funds > DUST_LIMIT)
        .ok_or_else(|| {
            Error::dust_output(format!(
                "user funds left after slashing {staking_amount} at rate {slashing_rate} \
                 with fee {minimum_fee} do not exceed the dust limit"
            ))
        })?;

    tracing::debug!(
        %staking_amount,
        %slashing_amount,
        %user_funds,
        slashing_rate,
        "Assembled slashing transaction"
    );

    let unsigned_tx = Transaction {
        version: TX_VERSION,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: funding_tx.compute_txid(),
                vout: output_index,
            },
            script_sig: Default::default(),
            // Slashing is never fee-bumped or time-delayed.
            sequence: SEQUENCE_NO_RBF_NO_LOCKTIME,
            witness: Default::default(),
        }],
        output: vec![
            TxOut {
                value: slashing_amount,
                script_pubkey: slashing_address.script_pubkey(),
            },
            TxOut {
                value: user_funds,
                script_pubkey: timelock_recommit_script_pubkey(
                    secp,
                    internal_key,
                    unbonding_timelock_script,
                ),
            },
        ],
    };

    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)
        .map_err(|e| Error::invalid_amount(format!("cannot lift slashing transaction: {e}")))?;

    let leaf_version = control_block.leaf_version;
    psbt.inputs[0].witness_utxo = Some(prevout);
    psbt.inputs[0].tap_internal_key = Some(internal_key);
    psbt.inputs[0].tap_scripts =
        BTreeMap::from_iter([(control_block, (slashing_script, leaf_version))]);

    Ok(psbt)
}
