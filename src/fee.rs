use crate::Error;
use bitcoin::constants::WITNESS_SCALE_FACTOR;
use bitcoin::taproot::ControlBlock;
use bitcoin::Amount;
use bitcoin::FeeRate;
use bitcoin::ScriptBuf;
use bitcoin::TxOut;
use bitcoin::VarInt;

/// InputSize 41 bytes
///     - PreviousOutPoint:
///             - Hash: 32 bytes
///             - Index: 4 bytes
///     - OP_DATA: 1 byte (ScriptSigLength)
///     - ScriptSig: 0 bytes
///     - Sequence: 4 bytes
const INPUT_SIZE: usize = 32 + 4 + 1 + 4;

/// TaprootBaseControlBlockWitnessSize 33 bytes
///      - leafVersionAndParity: 1 byte
///      - schnorrPubKey: 32 byte
const TAPROOT_BASE_CONTROL_BLOCK_WITNESS_SIZE: usize = 33;

/// BaseTxSize 8 bytes
///      - Version: 4 bytes
///      - LockTime: 4 bytes
const BASE_TX_SIZE: usize = 8;

///  WitnessHeaderSize 2 bytes
///             - Flag: 1 byte
///             - Marker: 1 byte
const WITNESS_HEADER_SIZE: usize = 2;

/// BASE_OUTPUT_SIZE 9 bytes
///     - value: 8 bytes
///     - var_int: 1 byte (pkscript_length)
const BASE_OUTPUT_SIZE: usize = 8 + 1;

/// P2TROutputSize 43 bytes
///      - value: 8 bytes
///      - var_int: 1 byte (pkscript_length)
///      - pkscript (p2tr): 34 bytes
const P2TR_OUTPUT_SIZE: usize = BASE_OUTPUT_SIZE + 34;

/// A 64-byte schnorr signature (default sighash type).
const SCHNORR_SIGNATURE_SIZE: usize = 64;

/// Key-spend witness: element count, signature length and the signature.
const KEY_SPEND_WITNESS_SIZE: usize = 1 + 1 + SCHNORR_SIGNATURE_SIZE;

#[derive(Default)]
struct TxWeightEstimator {
    has_witness: bool,
    input_count: u32,
    output_count: u32,
    input_size: usize,
    input_witness_size: usize,
    output_size: usize,
}

impl TxWeightEstimator {
    /// Add an input spending a Taproot output via the script path.
    ///
    /// `leaf_witness_size` is the total size of the witness elements
    /// consumed by the revealed script, excluding the element-count byte.
    fn add_tapscript_input(
        &mut self,
        leaf_witness_size: usize,
        revealed_script: &ScriptBuf,
        control_block: &ControlBlock,
    ) -> &mut Self {
        // We add 1 byte for the total number of witness elements.
        let control_block_witness_size = 1
            + TAPROOT_BASE_CONTROL_BLOCK_WITNESS_SIZE
            // 1 byte for the length of the element plus the element itself.
            + 1
            + revealed_script.len()
            + 1
            + control_block.size();

        self.input_size += INPUT_SIZE;
        self.input_witness_size += leaf_witness_size + control_block_witness_size;
        self.input_count += 1;
        self.has_witness = true;

        self
    }

    /// Add an input spending a Taproot output via the key path.
    fn add_key_spend_input(&mut self) -> &mut Self {
        self.input_size += INPUT_SIZE;
        self.input_witness_size += KEY_SPEND_WITNESS_SIZE;
        self.input_count += 1;
        self.has_witness = true;

        self
    }

    /// Add an output with the given script pubkey.
    fn add_output(&mut self, script_pubkey: &ScriptBuf) -> &mut Self {
        self.output_size +=
            8 + VarInt(script_pubkey.len() as u64).size() + script_pubkey.len();
        self.output_count += 1;
        self
    }

    /// Add a native SegWit v1 P2TR output.
    fn add_p2tr_output(&mut self) -> &mut Self {
        self.output_size += P2TR_OUTPUT_SIZE;
        self.output_count += 1;
        self
    }

    fn weight(&self) -> usize {
        let input_count_size = VarInt(self.input_count as u64).size();
        let output_count_size = VarInt(self.output_count as u64).size();

        let tx_size_stripped = BASE_TX_SIZE
            + input_count_size
            + self.input_size
            + output_count_size
            + self.output_size;

        let mut weight = tx_size_stripped * WITNESS_SCALE_FACTOR;

        if self.has_witness {
            weight += WITNESS_HEADER_SIZE + self.input_witness_size;
        }

        weight
    }

    /// The estimated virtual size of the transaction, in vbytes.
    fn vsize(&self) -> usize {
        // A tx's vsize is 1/4 of the weight, rounded up.
        (self.weight() + 3) / 4
    }

    fn fee(&self, fee_rate: FeeRate) -> Result<Amount, Error> {
        fee_rate
            .fee_vb(self.vsize() as u64)
            .ok_or_else(|| Error::invalid_fee_rate("fee computation overflowed"))
    }
}

/// Compute the fee for a withdrawal transaction.
///
/// The withdrawal shape is constant: one script-path input revealing the
/// timelock leaf with a single schnorr signature, and one P2TR output.
pub fn estimate_withdrawal_fee(
    fee_rate: FeeRate,
    revealed_script: &ScriptBuf,
    control_block: &ControlBlock,
) -> Result<Amount, Error> {
    if fee_rate == FeeRate::ZERO {
        return Err(Error::invalid_fee_rate("fee rate must be positive"));
    }

    let mut estimator = TxWeightEstimator::default();

    estimator
        .add_tapscript_input(
            // 1 byte for the length of the element plus the signature.
            1 + SCHNORR_SIGNATURE_SIZE,
            revealed_script,
            control_block,
        )
        .add_p2tr_output();

    estimator.fee(fee_rate)
}

/// Compute the fee for a staking transaction funded by `num_inputs`
/// key-spend Taproot inputs paying the given outputs.
///
/// `include_change` accounts for one additional P2TR change output.
pub fn estimate_staking_fee(
    fee_rate: FeeRate,
    num_inputs: usize,
    outputs: &[TxOut],
    include_change: bool,
) -> Result<Amount, Error> {
    if fee_rate == FeeRate::ZERO {
        return Err(Error::invalid_fee_rate("fee rate must be positive"));
    }

    let mut estimator = TxWeightEstimator::default();

    for _ in 0..num_inputs {
        estimator.add_key_spend_input();
    }

    for output in outputs {
        estimator.add_output(&output.script_pubkey);
    }

    if include_change {
        estimator.add_p2tr_output();
    }

    estimator.fee(fee_rate)
}
