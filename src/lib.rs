use bitcoin::Amount;
use bitcoin::OutPoint;
use bitcoin::Psbt;
use bitcoin::ScriptBuf;
use bitcoin::Sequence;
use bitcoin::transaction;

pub mod coin_select;
pub mod fee;
pub mod script;
pub mod slashing;
pub mod staking;
pub mod unbonding;
pub mod withdrawal;
pub mod witness;

mod error;
mod staking_output;
mod unbonding_output;

pub use error::Error;
pub use error::ErrorContext;
pub use error::ErrorKind;
pub use staking_output::StakingOutput;
pub use staking_output::StakingScripts;
pub use unbonding_output::UnbondingOutput;
pub use unbonding_output::UnbondingScripts;

/// A Nothing-Up-My-Sleeve x-only public key with no known discrete log.
///
/// Used as the internal key of every Taproot output built by this crate,
/// forcing all spends through a script path.
pub const UNSPENDABLE_KEY: &str =
    "50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

/// Every transaction built by this crate uses version 2, which is required
/// for OP_CHECKSEQUENCEVERIFY to be enforceable.
pub const TX_VERSION: transaction::Version = transaction::Version::TWO;

/// Sequence number for staking funding inputs: opts in to replace-by-fee and
/// leaves the absolute locktime field meaningful.
pub const SEQUENCE_RBF_ENABLED: Sequence = Sequence::ENABLE_RBF_NO_LOCKTIME;

/// Sequence number for slashing and unbonding inputs: replace-by-fee and
/// absolute locktime both disabled.
pub const SEQUENCE_NO_RBF_NO_LOCKTIME: Sequence = Sequence::MAX;

/// Absolute locktime values below this cutoff are block heights; values at
/// or above it are unix timestamps. Staking lock heights must stay strictly
/// below it.
pub const LOCK_HEIGHT_CUTOFF: u32 = 500_000_000;

/// No emitted output may carry a value at or below this limit.
pub const DUST_LIMIT: Amount = Amount::from_sat(546);

/// A confirmed output that can fund a staking transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub amount: Amount,
    pub script_pubkey: ScriptBuf,
}

/// An unsigned transaction together with the fee it pays.
///
/// Builders that deduct a caller-supplied fee in full return a bare
/// [`Psbt`] instead.
#[derive(Clone, Debug)]
pub struct TransactionResult {
    pub psbt: Psbt,
    pub fee: Amount,
}
