use crate::script::tr_script_pubkey;
use bitcoin::key::Secp256k1;
use bitcoin::key::Verification;
use bitcoin::taproot;
use bitcoin::taproot::LeafVersion;
use bitcoin::taproot::TaprootBuilder;
use bitcoin::taproot::TaprootSpendInfo;
use bitcoin::Address;
use bitcoin::Network;
use bitcoin::ScriptBuf;
use bitcoin::XOnlyPublicKey;

/// The compiled script leaves committed into an unbonding output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnbondingScripts {
    /// Covenant quorum and finality provider can slash during unbonding.
    pub slashing: ScriptBuf,
    /// Staker can withdraw after the unbonding period expires.
    pub unbonding_timelock: ScriptBuf,
}

/// All the information needed to build and later spend an unbonding output.
#[derive(Clone, Debug, PartialEq)]
pub struct UnbondingOutput {
    internal_key: XOnlyPublicKey,
    scripts: UnbondingScripts,
    spend_info: TaprootSpendInfo,
    address: Address,
    network: Network,
}

impl UnbondingOutput {
    /// Commit the two unbonding leaves `[slashing, unbonding_timelock]` into
    /// a Taproot output under the given unspendable internal key.
    pub fn new<C>(
        secp: &Secp256k1<C>,
        internal_key: XOnlyPublicKey,
        scripts: UnbondingScripts,
        network: Network,
    ) -> Self
    where
        C: Verification,
    {
        let spend_info = TaprootBuilder::new()
            .add_leaf(1, scripts.slashing.clone())
            .expect("valid slashing leaf")
            .add_leaf(1, scripts.unbonding_timelock.clone())
            .expect("valid unbonding timelock leaf")
            .finalize(secp, internal_key)
            .expect("complete unbonding tree");

        let script_pubkey = tr_script_pubkey(&spend_info);
        let address = Address::from_script(&script_pubkey, network).expect("valid script");

        Self {
            internal_key,
            scripts,
            spend_info,
            address,
            network,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    pub fn spend_info(&self) -> &TaprootSpendInfo {
        &self.spend_info
    }

    pub fn internal_key(&self) -> XOnlyPublicKey {
        self.internal_key
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The spend info for the slashing branch of the unbonding output.
    pub fn slashing_spend_info(&self) -> (ScriptBuf, taproot::ControlBlock) {
        self.leaf_spend_info(self.scripts.slashing.clone())
    }

    /// The spend info for the timelock branch of the unbonding output.
    pub fn timelock_spend_info(&self) -> (ScriptBuf, taproot::ControlBlock) {
        self.leaf_spend_info(self.scripts.unbonding_timelock.clone())
    }

    fn leaf_spend_info(&self, script: ScriptBuf) -> (ScriptBuf, taproot::ControlBlock) {
        let control_block = self
            .spend_info
            .control_block(&(script.clone(), LeafVersion::TapScript))
            .expect("leaf of the unbonding tree");

        (script, control_block)
    }
}

/// The script pubkey of a single-leaf Taproot output committing only to the
/// unbonding timelock script.
///
/// Slashed user funds are re-committed here, so the remainder re-enters the
/// timelock regime instead of becoming freely spendable.
pub(crate) fn timelock_recommit_script_pubkey<C>(
    secp: &Secp256k1<C>,
    internal_key: XOnlyPublicKey,
    unbonding_timelock: &ScriptBuf,
) -> ScriptBuf
where
    C: Verification,
{
    let spend_info = TaprootBuilder::new()
        .add_leaf(0, unbonding_timelock.clone())
        .expect("valid single leaf")
        .finalize(secp, internal_key)
        .expect("complete single-leaf tree");

    tr_script_pubkey(&spend_info)
}
