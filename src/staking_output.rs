use crate::script::tr_script_pubkey;
use bitcoin::key::Secp256k1;
use bitcoin::key::Verification;
use bitcoin::taproot;
use bitcoin::taproot::LeafVersion;
use bitcoin::taproot::TaprootBuilder;
use bitcoin::taproot::TaprootSpendInfo;
use bitcoin::Address;
use bitcoin::Amount;
use bitcoin::Network;
use bitcoin::ScriptBuf;
use bitcoin::TxOut;
use bitcoin::XOnlyPublicKey;

/// The compiled script leaves committed into a staking output.
///
/// All leaves are produced by an external script compiler; this crate treats
/// them as opaque byte strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingScripts {
    /// Staker can spend after the staking period expires.
    pub timelock: ScriptBuf,
    /// Staker and covenant quorum can move the stake to the unbonding
    /// output.
    pub unbonding: ScriptBuf,
    /// Covenant quorum and finality provider can slash a misbehaving
    /// delegation.
    pub slashing: ScriptBuf,
    /// Optional FROST-aggregated slashing path.
    pub frost_slashing: Option<ScriptBuf>,
    /// Optional OP_RETURN commitment emitted as a separate zero-value
    /// output, not a tree leaf.
    pub data_embed: Option<ScriptBuf>,
}

/// All the information needed to build and later spend a staking output.
#[derive(Clone, Debug, PartialEq)]
pub struct StakingOutput {
    internal_key: XOnlyPublicKey,
    scripts: StakingScripts,
    spend_info: TaprootSpendInfo,
    address: Address,
    network: Network,
}

impl StakingOutput {
    /// Commit the staking script leaves into a Taproot output under the
    /// given unspendable internal key.
    ///
    /// Without a FROST leaf the tree is `[slashing, [unbonding, timelock]]`;
    /// with one, all four leaves sit at depth two with the two slashing
    /// paths as siblings.
    pub fn new<C>(
        secp: &Secp256k1<C>,
        internal_key: XOnlyPublicKey,
        scripts: StakingScripts,
        network: Network,
    ) -> Self
    where
        C: Verification,
    {
        let builder = match &scripts.frost_slashing {
            None => TaprootBuilder::new()
                .add_leaf(1, scripts.slashing.clone())
                .expect("valid slashing leaf")
                .add_leaf(2, scripts.unbonding.clone())
                .expect("valid unbonding leaf")
                .add_leaf(2, scripts.timelock.clone())
                .expect("valid timelock leaf"),
            Some(frost_slashing) => TaprootBuilder::new()
                .add_leaf(2, scripts.slashing.clone())
                .expect("valid slashing leaf")
                .add_leaf(2, frost_slashing.clone())
                .expect("valid frost slashing leaf")
                .add_leaf(2, scripts.unbonding.clone())
                .expect("valid unbonding leaf")
                .add_leaf(2, scripts.timelock.clone())
                .expect("valid timelock leaf"),
        };

        let spend_info = builder
            .finalize(secp, internal_key)
            .expect("complete staking tree");

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

    /// The spend info for the timelock branch of the staking output.
    pub fn timelock_spend_info(&self) -> (ScriptBuf, taproot::ControlBlock) {
        self.leaf_spend_info(self.scripts.timelock.clone())
    }

    /// The spend info for the unbonding branch of the staking output.
    pub fn unbonding_spend_info(&self) -> (ScriptBuf, taproot::ControlBlock) {
        self.leaf_spend_info(self.scripts.unbonding.clone())
    }

    /// The spend info for the slashing branch of the staking output.
    pub fn slashing_spend_info(&self) -> (ScriptBuf, taproot::ControlBlock) {
        self.leaf_spend_info(self.scripts.slashing.clone())
    }

    /// The committed staking output, plus a zero-value data-embed output
    /// when a commitment script was supplied.
    pub fn to_tx_outs(&self, amount: Amount) -> Vec<TxOut> {
        let mut outputs = vec![TxOut {
            value: amount,
            script_pubkey: self.script_pubkey(),
        }];

        if let Some(data_embed) = &self.scripts.data_embed {
            outputs.push(TxOut {
                value: Amount::ZERO,
                script_pubkey: data_embed.clone(),
            });
        }

        outputs
    }

    fn leaf_spend_info(&self, script: ScriptBuf) -> (ScriptBuf, taproot::ControlBlock) {
        let control_block = self
            .spend_info
            .control_block(&(script.clone(), LeafVersion::TapScript))
            .expect("leaf of the staking tree");

        (script, control_block)
    }
}
