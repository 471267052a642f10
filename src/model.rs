//! Request, draft and result types for one build invocation.
//!
//! The caller owns the wallet UTXOs and addressees; the builder owns the
//! draft transaction for the duration of one build and hands back a
//! [`BuildResult`] that stays usable for iterative correction even when it
//! carries an error.

use std::collections::BTreeMap;

use elements::confidential::{AssetBlindingFactor, Value, ValueBlindingFactor};
use elements::secp256k1_zkp::{Generator, PedersenCommitment, PublicKey, RangeProof, SecretKey};
use elements::{AssetId, Script, Transaction, Txid};
use serde::{Deserialize, Serialize};

use crate::address_type::AddressType;
use crate::session::ChangeAddress;

/// Sequence opting in to BIP125 replacement.
pub const SEQUENCE_RBF: u32 = 0xFFFF_FFFD;
/// Sequence with replacement disabled but locktime still enforced.
pub const SEQUENCE_NO_RBF: u32 = 0xFFFF_FFFE;

/// Recoverable, user-correctable build errors.
///
/// Recorded on the build result rather than aborting; only the first one
/// encountered is kept, except `NoRecipients` which always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum TxError {
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("no recipients")]
    NoRecipients,
    #[error("fee rate is below the minimum accepted rate")]
    FeeRateBelowMinimum,
    #[error("send all requires a single output")]
    SendAllRequiresSingleOutput,
    #[error("no utxos found")]
    NoUtxosFound,
    #[error("no amount specified")]
    NoAmountSpecified,
    #[error("missing recipient for asset {0}")]
    MissingRecipientForAsset(String),
    #[error("invalid replacement fee rate")]
    InvalidReplacementFeeRate,
    #[error("invalid address")]
    InvalidAddress,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("sweep is not supported on confidential chains")]
    SweepNotSupported,
}

/// How inputs are chosen for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtxoStrategy {
    /// Append wallet UTXOs in presented order until funds suffice.
    #[default]
    Default,
    /// Spend exactly the UTXOs the caller supplied.
    Manual,
}

/// A wallet-owned unspent output, plus the annotations the builder and
/// signing engine add along the way.
#[derive(Debug, Clone)]
pub struct Utxo {
    pub txhash: Txid,
    pub pt_idx: u32,
    pub satoshi: u64,
    pub asset_id: AssetId,
    pub address_type: AddressType,
    pub subaccount: u32,
    pub pointer: u32,
    pub is_internal: bool,
    /// CSV block count for csv-type outputs, zero otherwise.
    pub subtype: u32,
    /// Explicit sequence override (e.g. CSV-expired spends).
    pub sequence: Option<u32>,
    /// Script used for signing; derived when missing.
    pub prevout_script: Option<Script>,
    pub public_key: Option<PublicKey>,
    /// Present on sweep inputs: sign directly with this key.
    pub private_key: Option<SecretKey>,
    /// Full derivation path; populated for external signers.
    pub user_path: Option<Vec<u32>>,
    /// Sighash recovered from a prior signature, honored when re-signing.
    pub user_sighash: Option<u32>,
    /// Confidential value commitment of the prevout, when blinded.
    pub value_commitment: Option<Value>,
    pub asset_blinder: Option<AssetBlindingFactor>,
    pub amount_blinder: Option<ValueBlindingFactor>,
    /// Carry-over scriptsig/witness of a replaced transaction's input.
    pub script_sig: Option<Script>,
    pub witness: Option<Vec<Vec<u8>>>,
    pub skip_signing: bool,
}

impl Utxo {
    pub fn new(
        txhash: Txid,
        pt_idx: u32,
        satoshi: u64,
        asset_id: AssetId,
        address_type: AddressType,
        subaccount: u32,
        pointer: u32,
        is_internal: bool,
    ) -> Self {
        Utxo {
            txhash,
            pt_idx,
            satoshi,
            asset_id,
            address_type,
            subaccount,
            pointer,
            is_internal,
            subtype: 0,
            sequence: None,
            prevout_script: None,
            public_key: None,
            private_key: None,
            user_path: None,
            user_sighash: None,
            value_commitment: None,
            asset_blinder: None,
            amount_blinder: None,
            script_sig: None,
            witness: None,
            skip_signing: false,
        }
    }

    /// Identity is the outpoint being spent.
    pub fn outpoint(&self) -> (Txid, u32) {
        (self.txhash, self.pt_idx)
    }

    pub fn is_sweep(&self) -> bool {
        self.private_key.is_some()
    }
}

/// Commitments for an addressee output blinded by another party.
#[derive(Debug, Clone)]
pub struct OutputCommitments {
    pub asset_commitment: Generator,
    pub value_commitment: PedersenCommitment,
    pub eph_public_key: Option<PublicKey>,
    pub asset_blinder: AssetBlindingFactor,
    pub amount_blinder: Option<ValueBlindingFactor>,
    pub range_proof: Option<Box<RangeProof>>,
    pub blinding_nonce: Option<[u8; 32]>,
}

/// A requested payment. The builder may reorder addressees but never
/// invents one; change is tracked separately.
#[derive(Debug, Clone)]
pub struct Addressee {
    pub script_pubkey: Script,
    pub satoshi: u64,
    /// Defaults to the policy asset when absent.
    pub asset_id: Option<AssetId>,
    /// Blind the output to this key (confidential chains).
    pub blinding_pubkey: Option<PublicKey>,
    /// Insert the output at this index instead of appending.
    pub index: Option<usize>,
    /// Set when the output was blinded by another party; its contribution
    /// to the final balance arrives through a scalar offset.
    pub commitments: Option<OutputCommitments>,
}

impl Addressee {
    pub fn new(script_pubkey: Script, satoshi: u64, asset_id: Option<AssetId>) -> Self {
        Addressee {
            script_pubkey,
            satoshi,
            asset_id,
            blinding_pubkey: None,
            index: None,
            commitments: None,
        }
    }

    pub fn is_blinded(&self) -> bool {
        self.commitments.is_some()
    }
}

/// One prior-transaction input or output, in wallet-history form.
#[derive(Debug, Clone)]
pub struct PreviousIo {
    pub address_type: Option<AddressType>,
    pub subaccount: u32,
    pub pointer: u32,
    pub is_internal: bool,
    /// True when the wallet owns this input/output.
    pub is_relevant: bool,
    pub satoshi: u64,
    pub script_pubkey: Script,
    /// For inputs: the index within the prior transaction, not the
    /// index within the previous-previous transaction.
    pub pt_idx: u32,
}

/// A wallet-history record of the transaction being bumped.
#[derive(Debug, Clone)]
pub struct PreviousTransaction {
    pub txid: Txid,
    pub fee: u64,
    pub fee_rate: u64,
    pub can_rbf: bool,
    pub can_cpfp: bool,
    pub inputs: Vec<PreviousIo>,
    pub outputs: Vec<PreviousIo>,
}

/// Everything a single build invocation consumes.
#[derive(Debug, Clone, Default)]
pub struct CreateTxParams {
    pub addressees: Vec<Addressee>,
    /// Wallet UTXOs grouped per asset, in the caller's preferred
    /// spending order.
    pub utxos: BTreeMap<AssetId, Vec<Utxo>>,
    /// Fee rate in sat/kvB; the session default applies when absent.
    pub fee_rate: Option<u64>,
    pub utxo_strategy: UtxoStrategy,
    /// Exact inputs to spend under [`UtxoStrategy::Manual`].
    pub used_utxos: Vec<Utxo>,
    pub send_all: bool,
    /// Build an incomplete transaction for multi-party flows: no fee
    /// output, no change, no final-blinder solve.
    pub is_partial: bool,
    pub locktime: Option<u32>,
    pub version: Option<u32>,
    /// Shuffling new inputs is a privacy mechanism; tests disable it.
    pub randomize_inputs: Option<bool>,
    /// Size dummy signatures for a low-R signer (one byte smaller).
    pub low_r: bool,
    pub previous_transaction: Option<PreviousTransaction>,
    /// Scalar offsets covering pre-blinded contributions, one per
    /// blinded addressee.
    pub scalars: Vec<[u8; 32]>,
}

/// Metadata for one draft-transaction output, index-aligned with
/// `transaction.output`.
#[derive(Debug, Clone)]
pub struct OutputMeta {
    pub script_pubkey: Script,
    pub asset_id: AssetId,
    pub satoshi: u64,
    pub is_fee: bool,
    pub is_change: bool,
    /// Ours-to-blind when set; pre-blinded outputs have `asset_blinder`
    /// but no blinding key.
    pub blinding_pubkey: Option<PublicKey>,
    pub asset_blinder: Option<AssetBlindingFactor>,
    pub amount_blinder: Option<ValueBlindingFactor>,
    pub eph_public_key: Option<PublicKey>,
    pub blinding_nonce: Option<[u8; 32]>,
    /// Position in the caller's addressee list, if this output pays one.
    pub addressee_index: Option<usize>,
}

/// Per-asset change bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ChangeEntry {
    pub index: Option<u32>,
    pub amount: u64,
    pub address: Option<ChangeAddress>,
}

/// What a build produces: the draft transaction plus everything needed to
/// inspect, blind, sign or retry it.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub transaction: Transaction,
    /// Index-aligned with `transaction.output`.
    pub outputs: Vec<OutputMeta>,
    /// Inputs chosen this build, in final (shuffled) order.
    pub used_utxos: Vec<Utxo>,
    /// Carry-over inputs of a replaced transaction; always a fixed
    /// prefix of the input list.
    pub old_used_utxos: Vec<Utxo>,
    /// Addressees re-emitted in output insertion order.
    pub addressees: Vec<Addressee>,
    pub change: BTreeMap<AssetId, ChangeEntry>,
    pub change_subaccount: Option<u32>,
    /// Requested amount per asset.
    pub satoshi: BTreeMap<AssetId, u64>,
    /// Spendable total per asset, for insufficient-funds handling.
    pub available_total: BTreeMap<AssetId, u64>,
    pub fee: u64,
    pub fee_rate: u64,
    /// CPFP subsidy folded into `fee`.
    pub network_fee: u64,
    pub old_fee: u64,
    pub old_fee_rate: u64,
    pub calculated_fee_rate: u64,
    pub weight: u64,
    pub vsize: u64,
    pub is_rbf: bool,
    pub is_cpfp: bool,
    pub is_redeposit: bool,
    pub is_sweep: bool,
    pub is_partial: bool,
    pub send_all: bool,
    pub is_blinded: bool,
    /// ECDH nonces per output when requested; `None` for the fee output.
    pub blinding_nonces: Vec<Option<[u8; 32]>>,
    pub error: Option<TxError>,
}

impl BuildResult {
    pub(crate) fn empty() -> Self {
        BuildResult {
            transaction: Transaction {
                version: 2,
                lock_time: elements::LockTime::ZERO,
                input: Vec::new(),
                output: Vec::new(),
            },
            outputs: Vec::new(),
            used_utxos: Vec::new(),
            old_used_utxos: Vec::new(),
            addressees: Vec::new(),
            change: BTreeMap::new(),
            change_subaccount: None,
            satoshi: BTreeMap::new(),
            available_total: BTreeMap::new(),
            fee: 0,
            fee_rate: 0,
            network_fee: 0,
            old_fee: 0,
            old_fee_rate: 0,
            calculated_fee_rate: 0,
            weight: 0,
            vsize: 0,
            is_rbf: false,
            is_cpfp: false,
            is_redeposit: false,
            is_sweep: false,
            is_partial: false,
            send_all: false,
            is_blinded: false,
            blinding_nonces: Vec::new(),
            error: None,
        }
    }

    /// Record a recoverable error; the first one sticks.
    pub(crate) fn set_error(&mut self, error: TxError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// `NoRecipients` overrides anything recorded earlier.
    pub(crate) fn set_error_overriding(&mut self, error: TxError) {
        self.error = Some(error);
    }

    /// All inputs in signing order: carry-over inputs first.
    pub fn signing_inputs(&self) -> Vec<&Utxo> {
        self.old_used_utxos
            .iter()
            .chain(self.used_utxos.iter())
            .collect()
    }

    pub fn change_index(&self, asset: &AssetId) -> Option<u32> {
        self.change.get(asset).and_then(|c| c.index)
    }
}
