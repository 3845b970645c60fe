use crate::Error;
use bitcoin::opcodes::Class;
use bitcoin::opcodes::ClassifyContext;
use bitcoin::script::Instruction;
use bitcoin::taproot::TaprootSpendInfo;
use bitcoin::Script;
use bitcoin::ScriptBuf;

/// Position of the relative-timelock operand within a compiled timelock
/// script: `<staker_pk> OP_CHECKSIGVERIFY <timelock> OP_CSV`.
const TIMELOCK_OPERAND_POSITION: usize = 2;

/// A single script element, classified once so the decoder never has to ask
/// "is this a number or a buffer" again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptElement {
    /// A small-integer opcode (OP_PUSHNUM_1 through OP_PUSHNUM_16).
    SmallInt(u32),
    /// A pushed byte string.
    PushedBytes(Vec<u8>),
}

fn classify_element(instruction: Instruction) -> Result<ScriptElement, Error> {
    match instruction {
        Instruction::PushBytes(bytes) => Ok(ScriptElement::PushedBytes(bytes.as_bytes().to_vec())),
        Instruction::Op(op) => match op.classify(ClassifyContext::TapScript) {
            // OP_PUSHNUM_16 occupies the zero slot of the modular opcode
            // encoding, so the classifier already maps it back to 16.
            Class::PushNum(n) if (1..=16).contains(&n) => Ok(ScriptElement::SmallInt(n as u32)),
            _ => Err(Error::invalid_script(format!(
                "opcode {op} is not a timelock operand"
            ))),
        },
    }
}

/// Decode a minimally-encoded, little-endian signed script number.
fn decode_script_num(bytes: &[u8]) -> Result<i64, Error> {
    if bytes.is_empty() {
        return Ok(0);
    }

    if bytes.len() > 4 {
        return Err(Error::invalid_script(format!(
            "script number of {} bytes exceeds 4-byte limit",
            bytes.len()
        )));
    }

    let last = bytes[bytes.len() - 1];
    if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return Err(Error::invalid_script("script number is not minimally encoded"));
    }

    let mut value = 0i64;
    for (i, byte) in bytes.iter().enumerate() {
        value |= (*byte as i64) << (8 * i);
    }

    // The top bit of the last byte is the sign bit, not part of the value.
    if last & 0x80 != 0 {
        value &= !(0x80i64 << (8 * (bytes.len() - 1)));
        value = -value;
    }

    Ok(value)
}

/// Recover the relative timelock embedded in a compiled timelock script.
///
/// The operand of the OP_CSV check is always the third script element. The
/// decoded value must fit a height-based sequence number, so it is bounded
/// by `1..=0xFFFF`.
pub fn decode_timelock(script: &Script) -> Result<u16, Error> {
    let instruction = script
        .instructions()
        .nth(TIMELOCK_OPERAND_POSITION)
        .ok_or_else(|| {
            Error::invalid_script("timelock script has no operand at position 2")
        })?
        .map_err(|e| Error::invalid_script(format!("cannot decompile timelock script: {e}")))?;

    let timelock = match classify_element(instruction)? {
        ScriptElement::SmallInt(n) => n as i64,
        ScriptElement::PushedBytes(bytes) => decode_script_num(&bytes)?,
    };

    if !(1..=0xFFFF).contains(&timelock) {
        return Err(Error::invalid_script(format!(
            "timelock {timelock} does not fit a height-based sequence"
        )));
    }

    Ok(timelock as u16)
}

/// The script pubkey for the Taproot output corresponding to the given
/// [`TaprootSpendInfo`].
pub(crate) fn tr_script_pubkey(spend_info: &TaprootSpendInfo) -> ScriptBuf {
    let output_key = spend_info.output_key();
    ScriptBuf::builder()
        .push_opcode(bitcoin::opcodes::all::OP_PUSHNUM_1)
        .push_slice(output_key.serialize())
        .into_script()
}
