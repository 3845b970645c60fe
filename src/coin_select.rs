use crate::fee::estimate_staking_fee;
use crate::Error;
use crate::Utxo;
use bitcoin::Amount;
use bitcoin::FeeRate;
use bitcoin::TxOut;

/// The outcome of staking input selection: the chosen UTXOs and the absolute
/// fee they pay at the requested fee rate.
#[derive(Clone, Debug)]
pub struct Selection {
    pub utxos: Vec<Utxo>,
    pub fee: Amount,
}

/// Select UTXOs to fund a staking transaction paying `outputs` plus a
/// possible change output.
///
/// Greedy selection over candidates sorted by descending value: UTXOs are
/// added until they cover the staking amount plus the fee for the current
/// transaction shape. The fee is recomputed as inputs are added, so the
/// returned fee always matches the returned input set.
pub fn select_staking_utxos(
    utxos: &[Utxo],
    amount: Amount,
    fee_rate: FeeRate,
    outputs: &[TxOut],
) -> Result<Selection, Error> {
    let mut candidates = utxos.to_vec();
    candidates.sort_by(|a, b| b.amount.cmp(&a.amount));

    let mut selected = Vec::new();
    let mut selected_amount = Amount::ZERO;

    for utxo in candidates {
        if utxo.amount == Amount::ZERO {
            continue;
        }

        selected_amount += utxo.amount;
        selected.push(utxo);

        let fee = estimate_staking_fee(fee_rate, selected.len(), outputs, true)?;

        if selected_amount >= amount + fee {
            return Ok(Selection {
                utxos: selected,
                fee,
            });
        }
    }

    Err(Error::insufficient_funds(format!(
        "cannot cover staking amount {amount} plus fees with {selected_amount} of candidate UTXOs"
    )))
}
