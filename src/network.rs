use elements::AssetId;
use serde::Deserialize;

/// Chain flavours the builder can target.
///
/// Plaintext chains carry explicit values and never enter the blinding
/// pipeline; confidential chains get a fee output, value commitments and
/// range/surjection proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Plain,
    Confidential,
}

/// Network parameters the transaction core needs.
///
/// Address string encoding, peers and persistence live outside this crate;
/// only the policy asset and the chain flavour matter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    chain: Chain,
    policy_asset: AssetId,
}

impl Network {
    pub fn new(chain: Chain, policy_asset: AssetId) -> Self {
        Network {
            chain,
            policy_asset,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// The asset fees are paid in (L-BTC on Liquid).
    pub fn policy_asset(&self) -> AssetId {
        self.policy_asset
    }

    /// True when outputs are blinded and the fee is an explicit output.
    pub fn is_confidential(&self) -> bool {
        self.chain == Chain::Confidential
    }
}
