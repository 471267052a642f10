use serde::{Deserialize, Serialize};

/// The spendable script templates the builder understands.
///
/// `P2sh`, `P2wsh` and `Csv` are the 2-of-2 service-cosigned multisig
/// variants; the rest are single-signature. `P2wsh` and `Csv` are
/// P2SH-wrapped segwit scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    P2pkh,
    P2wpkh,
    P2shP2wpkh,
    P2sh,
    P2wsh,
    Csv,
}

impl AddressType {
    /// True when spends of this type put signatures in the witness.
    pub fn is_segwit(self) -> bool {
        matches!(
            self,
            AddressType::P2wpkh | AddressType::P2shP2wpkh | AddressType::P2wsh | AddressType::Csv
        )
    }

    /// True for the 2-of-2 multisig types (service plus user signature).
    pub fn is_multisig(self) -> bool {
        matches!(self, AddressType::P2sh | AddressType::P2wsh | AddressType::Csv)
    }
}
