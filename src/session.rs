//! Capabilities consumed from the surrounding wallet/session logic.
//!
//! The transaction core never derives keys, encodes addresses or talks to
//! the network itself; everything it needs from those layers comes through
//! these two traits. Implementations may block (hardware signers do).

use elements::secp256k1_zkp::{PublicKey, SecretKey};
use elements::{AssetId, Script, Transaction, Txid};

use crate::error::Result;
use crate::model::Utxo;

/// A wallet address the builder can send change to.
#[derive(Debug, Clone)]
pub struct ChangeAddress {
    pub script_pubkey: Script,
    /// Present on confidential chains; outputs paying this address get
    /// blinded to this key.
    pub blinding_pubkey: Option<PublicKey>,
    pub subaccount: u32,
    pub pointer: u32,
    pub is_internal: bool,
}

/// Derivation lookups and chain-state queries owned by the session layer.
pub trait Session {
    /// The prevout script used when signing `utxo`: the scriptpubkey for
    /// p2pkh, the BIP143 script code for the wpkh types, the redeem
    /// script for the multisig types.
    fn output_script_from_utxo(&self, utxo: &Utxo) -> Result<Script>;

    /// Public keys able to sign for `utxo`, in signing order.
    fn pubkeys_from_utxo(&self, utxo: &Utxo) -> Result<Vec<PublicKey>>;

    /// Full BIP32 path for the given subaccount slot.
    fn subaccount_full_path(&self, subaccount: u32, pointer: u32, is_internal: bool) -> Vec<u32>;

    /// A fresh internal address to receive change for `subaccount`.
    fn change_address(&self, subaccount: u32) -> Result<ChangeAddress>;

    /// Fee rate used when the caller does not supply one, in sat/kvB.
    fn default_fee_rate(&self) -> u64;

    /// Minimum relay fee rate in sat/kvB.
    fn min_fee_rate(&self) -> u64;

    /// Smallest economically spendable value for `asset`.
    fn dust_threshold(&self, asset: &AssetId) -> u64;

    /// Current chain tip height, for anti-fee-sniping locktimes.
    fn block_height(&self) -> u32;

    /// Fetch a wallet transaction by id (needed to reconstruct bumps).
    fn raw_transaction(&self, txid: &Txid) -> Result<Transaction>;

    /// Whether new inputs should opt in to replace-by-fee.
    fn rbf_enabled(&self) -> bool {
        true
    }
}

/// The signing capability, possibly backed by a hardware device.
pub trait Signer {
    /// ECDSA-sign a 32 byte hash with the key at `path`.
    fn sign_hash(
        &self,
        path: &[u32],
        hash: &[u8; 32],
    ) -> Result<elements::secp256k1_zkp::ecdsa::Signature>;

    /// True when the signer grinds low-R signatures (one byte smaller).
    fn supports_low_r(&self) -> bool {
        true
    }

    /// The 64 byte master blinding key used to derive deterministic
    /// blinding factors.
    fn master_blinding_key(&self) -> Result<[u8; 64]>;

    /// SLIP77-style private blinding key for a scriptpubkey.
    fn blinding_key_for_script(&self, script_pubkey: &Script) -> Result<SecretKey>;
}
