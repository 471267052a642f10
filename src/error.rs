use thiserror::Error;

/// Fatal errors: violated preconditions and internal invariants.
///
/// Recoverable, user-correctable conditions (insufficient funds, missing
/// recipients and so on) are *not* represented here; they are recorded on
/// the build result as a [`TxError`](crate::model::TxError) so the caller
/// can inspect the partial state, adjust, and retry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("fee/change loop failed to converge after {0} iterations")]
    FeeLoopDivergence(usize),

    #[error("transaction can not be fee-bumped")]
    CannotBump,

    #[error("no suitable subaccount inputs found for fee bump")]
    CrossSubaccountBump,

    #[error("previous transaction input/output mismatch")]
    PreviousTxMismatch,

    #[error("malformed witness stack for input {0}")]
    MalformedWitness(usize),

    #[error("malformed script sig for input {0}")]
    MalformedScriptSig(usize),

    #[error("signature verification failed for input {0}")]
    SignatureVerification(usize),

    #[error("unsupported sighash 0x{0:02x}")]
    UnsupportedSighash(u32),

    #[error("output {0} is neither fully blinded nor fully explicit")]
    MixedOutput(usize),

    #[error("attempt to {0} a transaction that carries an error")]
    InvalidState(&'static str),

    #[error("utxo is missing required field `{0}`")]
    MissingUtxoField(&'static str),

    #[error("blinding error: {0}")]
    Blinding(String),

    #[error("cannot unblind output: {0}")]
    Unblind(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1_zkp::Error),

    #[error("secp256k1 error: {0}")]
    SecpUpstream(#[from] secp256k1_zkp::UpstreamError),

    #[error("script error: {0}")]
    Script(String),
}

impl From<elements::script::Error> for Error {
    fn from(e: elements::script::Error) -> Self {
        Error::Script(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
