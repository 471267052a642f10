//! Spend script and witness synthesis for the supported address types,
//! plus the dummy variants used to size transactions before signing.

use elements::hashes::{hash160, sha256, Hash};
use elements::opcodes::all as opcodes;
use elements::script::{Builder, Instruction};
use elements::secp256k1_zkp::PublicKey;
use elements::Script;
use rand::{CryptoRng, Rng, RngCore};

use crate::error::{Error, Result};

/// Maximum DER signature length including the trailing sighash byte.
pub const SIG_DER_MAX_LEN: usize = 73;
/// Same, for signers that grind low-R signatures.
pub const SIG_DER_MAX_LOW_R_LEN: usize = 72;

/// A correctly sized stand-in for a DER signature plus sighash byte.
pub fn dummy_sig(low_r: bool) -> Vec<u8> {
    vec![
        0;
        if low_r {
            SIG_DER_MAX_LOW_R_LEN
        } else {
            SIG_DER_MAX_LEN
        }
    ]
}

/// Placeholder for a scriptsig holding a pushed v0 witness program.
pub fn dummy_witness_script() -> Script {
    Script::from(vec![0u8; 3 + sha256::Hash::LEN])
}

/// `<sig> <pubkey>` scriptsig spending a p2pkh output.
pub fn scriptsig_p2pkh(der: &[u8], pubkey: &PublicKey) -> Script {
    Builder::new()
        .push_slice(der)
        .push_slice(&pubkey.serialize())
        .into_script()
}

/// `OP_0 <service_sig> <user_sig> <redeem>` scriptsig spending the legacy
/// 2-of-2 multisig type. Signatures are DER encoded with sighash byte.
pub fn scriptsig_multisig(redeem: &Script, service_der: &[u8], user_der: &[u8]) -> Script {
    Builder::new()
        .push_int(0)
        .push_slice(service_der)
        .push_slice(user_der)
        .push_slice(redeem.as_bytes())
        .into_script()
}

/// Multisig scriptsig with both signatures replaced by sized dummies.
pub fn dummy_scriptsig_multisig(low_r: bool, redeem: &Script) -> Script {
    let sig = dummy_sig(low_r);
    scriptsig_multisig(redeem, &sig, &sig)
}

/// p2pkh scriptsig with a sized dummy signature, for sweep inputs.
pub fn dummy_scriptsig_p2pkh(low_r: bool, pubkey: &PublicKey) -> Script {
    scriptsig_p2pkh(&dummy_sig(low_r), pubkey)
}

/// Dummy witness stack for a multisig segwit input:
/// `<> <service_sig> <user_sig> <redeem>`.
pub fn dummy_multisig_witness(low_r: bool, redeem: &Script) -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        dummy_sig(low_r),
        dummy_sig(low_r),
        redeem.as_bytes().to_vec(),
    ]
}

/// v0 witness program committing to `script` by its sha256.
pub fn witness_program(script: &Script) -> Script {
    let hash = sha256::Hash::hash(script.as_bytes());
    Builder::new()
        .push_int(0)
        .push_slice(hash.as_ref())
        .into_script()
}

/// v0 witness program for a single public key (p2wpkh).
pub fn p2wpkh_program(pubkey: &PublicKey) -> Script {
    let hash = hash160::Hash::hash(&pubkey.serialize());
    Builder::new()
        .push_int(0)
        .push_slice(hash.as_ref())
        .into_script()
}

/// Scriptsig wrapping a witness program for the p2sh-nested segwit types.
pub fn scriptsig_p2sh_wrapped(program: &Script) -> Script {
    Builder::new().push_slice(program.as_bytes()).into_script()
}

/// Standard p2pkh scriptpubkey, also the BIP143 script code for the
/// single-key segwit types.
pub fn p2pkh_scriptpubkey(pubkey: &PublicKey) -> Script {
    let hash = hash160::Hash::hash(&pubkey.serialize());
    Builder::new()
        .push_opcode(opcodes::OP_DUP)
        .push_opcode(opcodes::OP_HASH160)
        .push_slice(hash.as_ref())
        .push_opcode(opcodes::OP_EQUALVERIFY)
        .push_opcode(opcodes::OP_CHECKSIG)
        .into_script()
}

/// p2sh scriptpubkey for a redeem script or witness program.
pub fn p2sh_scriptpubkey(inner: &Script) -> Script {
    let hash = hash160::Hash::hash(inner.as_bytes());
    Builder::new()
        .push_opcode(opcodes::OP_HASH160)
        .push_slice(hash.as_ref())
        .push_opcode(opcodes::OP_EQUAL)
        .into_script()
}

/// Read the CSV block count out of a csv-type redeem script.
///
/// The user can change their CSV setting at any time, so when rebuilding a
/// prior transaction the value must come from the redeem script that was
/// actually used, not from the wallet's current configuration.
pub fn csv_blocks_from_redeem_script(redeem: &Script) -> Result<u32> {
    let mut last_push: Option<u32> = None;
    for ins in redeem.instructions() {
        match ins? {
            Instruction::PushBytes(data) => last_push = read_scriptnum(data),
            Instruction::Op(op) if op == opcodes::OP_CSV => {
                return last_push.ok_or(Error::MalformedScriptSig(0));
            }
            Instruction::Op(op) => {
                // OP_PUSHNUM_1..16 encode small CSV values directly.
                let v = op.into_u8();
                last_push = if (0x51..=0x60).contains(&v) {
                    Some(u32::from(v - 0x50))
                } else {
                    None
                };
            }
        }
    }
    Err(Error::MalformedScriptSig(0))
}

fn read_scriptnum(data: &[u8]) -> Option<u32> {
    if data.is_empty() || data.len() > 4 {
        return None;
    }
    let mut value: u64 = 0;
    for (i, byte) in data.iter().enumerate() {
        value |= u64::from(*byte) << (8 * i);
    }
    // Negative script numbers are never valid CSV block counts.
    if data.last().map_or(false, |b| b & 0x80 != 0) {
        return None;
    }
    Some(value as u32)
}

/// Locktime for new transactions: the current height, occasionally moved
/// back a little so our transactions do not all fingerprint the same way.
/// Discourages fee sniping by making reorg-based replacement unattractive.
pub fn anti_snipe_locktime<R: RngCore + CryptoRng>(rng: &mut R, block_height: u32) -> u32 {
    let mut locktime = block_height;
    if rng.gen_range(0..10u32) == 0 {
        locktime = locktime.saturating_sub(rng.gen_range(0..100u32));
    }
    locktime
}
