//! Transaction construction for Bitcoin-style and Liquid-style wallets:
//! coin selection with fee/change iteration, RBF and CPFP fee bumps,
//! script/witness synthesis, signing, and confidential blinding.
//!
//! The usual pipeline is [`create_transaction`] to build a draft,
//! [`blind_transaction`] on confidential chains, then
//! [`sign_transaction`]. The wallet around this crate supplies the
//! [`Session`] and [`Signer`] capabilities.

pub use elements;

pub mod address_type;
pub mod blind;
pub mod bump;
pub mod builder;
pub mod error;
pub mod fee;
pub mod model;
pub mod network;
pub mod script;
pub mod session;
pub mod sign;
pub mod sigs;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Core types
pub use address_type::AddressType;
pub use error::{Error, Result};
pub use model::{
    Addressee, BuildResult, ChangeEntry, CreateTxParams, OutputCommitments, OutputMeta,
    PreviousIo, PreviousTransaction, TxError, Utxo, UtxoStrategy, SEQUENCE_NO_RBF, SEQUENCE_RBF,
};
pub use network::{Chain, Network};
pub use session::{ChangeAddress, Session, Signer};

// Pipeline entry points
pub use blind::{blind_transaction, hash_prevouts, unblind_output};
pub use builder::create_transaction;
pub use sign::{sign_transaction, validate_sighash, SIGHASH_ALL, SIGHASH_SINGLE_ANYONECANPAY};
pub use sigs::{decode_input, DecodedInput, InputSignature};
