//! Per-input signature hashes, signature application and verification.
//!
//! Multisig inputs are signed with the user key only; the service
//! cosigner's slot stays empty for the cosigning service to fill.

use elements::confidential::Value;
use elements::hashes::Hash;
use elements::secp256k1_zkp::{ecdsa, Message, PublicKey, SECP256K1};
use elements::sighash::SighashCache;
use elements::{EcdsaSighashType, Script, Transaction, TxIn};
use log::debug;

use crate::address_type::AddressType;
use crate::error::{Error, Result};
use crate::model::{BuildResult, Utxo};
use crate::network::{Chain, Network};
use crate::script;
use crate::session::{Session, Signer};
use crate::sigs::InputSignature;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_SINGLE_ANYONECANPAY: u32 = 0x83;

/// Only `ALL` is accepted, plus `SINGLE|ANYONECANPAY` on confidential
/// chains where multi-party flows need it.
pub fn validate_sighash(network: &Network, sighash: u32) -> Result<EcdsaSighashType> {
    match sighash {
        SIGHASH_ALL => Ok(EcdsaSighashType::All),
        SIGHASH_SINGLE_ANYONECANPAY if network.is_confidential() => {
            Ok(EcdsaSighashType::SinglePlusAnyoneCanPay)
        }
        other => Err(Error::UnsupportedSighash(other)),
    }
}

/// The hash input `index` commits to: legacy for the pre-segwit types,
/// BIP143 (over the value or its commitment) for the segwit ones.
pub fn signature_hash<S>(
    session: &S,
    tx: &Transaction,
    index: usize,
    utxo: &Utxo,
    sighash_type: EcdsaSighashType,
) -> Result<[u8; 32]>
where
    S: Session + ?Sized,
{
    let script_code = prevout_script(session, utxo)?;
    let mut cache = SighashCache::new(tx);
    let hash = if utxo.address_type.is_segwit() {
        let value = match utxo.value_commitment {
            Some(v) => v,
            None => Value::Explicit(utxo.satoshi),
        };
        cache
            .segwitv0_sighash(index, &script_code, value, sighash_type)
            .to_byte_array()
    } else {
        cache
            .legacy_sighash(index, &script_code, sighash_type)
            .to_byte_array()
    };
    Ok(hash)
}

/// Sign every input of a finished build in place.
///
/// Sweep inputs sign with their raw key; everything else goes through the
/// signer capability at the derivation path of the spent output. A
/// sighash recovered from a replaced input is honored when re-signing.
pub fn sign_transaction<S, G>(
    network: &Network,
    session: &S,
    signer: &G,
    result: &mut BuildResult,
) -> Result<()>
where
    S: Session + ?Sized,
    G: Signer + ?Sized,
{
    let utxos: Vec<Utxo> = result.signing_inputs().into_iter().cloned().collect();
    for (index, utxo) in utxos.iter().enumerate() {
        if utxo.skip_signing {
            debug!("input {index}: signing skipped");
            continue;
        }
        let sighash = utxo.user_sighash.unwrap_or(SIGHASH_ALL);
        let sighash_type = validate_sighash(network, sighash)?;
        let hash = signature_hash(session, &result.transaction, index, utxo, sighash_type)?;
        let signature = match &utxo.private_key {
            Some(sk) => {
                let msg = Message::from_digest_slice(&hash)?;
                SECP256K1.sign_ecdsa_low_r(&msg, sk)
            }
            None => {
                let path = match &utxo.user_path {
                    Some(p) => p.clone(),
                    None => session.subaccount_full_path(
                        utxo.subaccount,
                        utxo.pointer,
                        utxo.is_internal,
                    ),
                };
                signer.sign_hash(&path, &hash)?
            }
        };
        let mut der = signature.serialize_der().to_vec();
        der.push(sighash as u8);
        embed_signature(network, session, utxo, &mut result.transaction.input[index], &der)?;
    }
    Ok(())
}

/// Place a user signature into the input's script/witness shape.
fn embed_signature<S>(
    network: &Network,
    session: &S,
    utxo: &Utxo,
    txin: &mut TxIn,
    der_sig: &[u8],
) -> Result<()>
where
    S: Session + ?Sized,
{
    match utxo.address_type {
        AddressType::P2pkh => {
            let pk = utxo_pubkey(session, utxo)?;
            txin.script_sig = script::scriptsig_p2pkh(der_sig, &pk);
            txin.witness.script_witness.clear();
        }
        AddressType::P2sh => {
            let redeem = prevout_script(session, utxo)?;
            txin.script_sig = script::scriptsig_multisig(&redeem, &[], der_sig);
            txin.witness.script_witness.clear();
        }
        AddressType::P2wpkh => {
            let pk = utxo_pubkey(session, utxo)?;
            txin.script_sig = Script::new();
            txin.witness.script_witness = vec![der_sig.to_vec(), pk.serialize().to_vec()];
        }
        AddressType::P2shP2wpkh => {
            let pk = utxo_pubkey(session, utxo)?;
            txin.script_sig = script::scriptsig_p2sh_wrapped(&script::p2wpkh_program(&pk));
            txin.witness.script_witness = vec![der_sig.to_vec(), pk.serialize().to_vec()];
        }
        AddressType::P2wsh => {
            let redeem = prevout_script(session, utxo)?;
            txin.script_sig = Script::new();
            txin.witness.script_witness = vec![
                Vec::new(),
                Vec::new(), // service cosigner slot
                der_sig.to_vec(),
                redeem.to_bytes(),
            ];
        }
        AddressType::Csv => {
            let redeem = prevout_script(session, utxo)?;
            txin.script_sig = Script::new();
            txin.witness.script_witness = match network.chain() {
                Chain::Confidential => {
                    vec![der_sig.to_vec(), Vec::new(), redeem.to_bytes()]
                }
                Chain::Plain => vec![Vec::new(), der_sig.to_vec(), redeem.to_bytes()],
            };
        }
    }
    Ok(())
}

/// Check a recovered signature against its recomputed hash. Used when a
/// replaced transaction's data is being reused, to prove it was not
/// tampered with.
pub(crate) fn verify_input_signature<S>(
    network: &Network,
    session: &S,
    tx: &Transaction,
    index: usize,
    utxo: &Utxo,
    pubkey: &PublicKey,
    signature: &InputSignature,
) -> Result<()>
where
    S: Session + ?Sized,
{
    let sighash_type = validate_sighash(network, signature.sighash)?;
    let hash = signature_hash(session, tx, index, utxo, sighash_type)?;
    let msg = Message::from_digest_slice(&hash)?;
    let sig = ecdsa::Signature::from_der(&signature.der)
        .map_err(|_| Error::SignatureVerification(index))?;
    SECP256K1
        .verify_ecdsa(&msg, &sig, pubkey)
        .map_err(|_| Error::SignatureVerification(index))
}

fn prevout_script<S: Session + ?Sized>(session: &S, utxo: &Utxo) -> Result<Script> {
    match &utxo.prevout_script {
        Some(s) => Ok(s.clone()),
        None => session.output_script_from_utxo(utxo),
    }
}

fn utxo_pubkey<S: Session + ?Sized>(session: &S, utxo: &Utxo) -> Result<PublicKey> {
    if let Some(pk) = utxo.public_key {
        return Ok(pk);
    }
    session
        .pubkeys_from_utxo(utxo)?
        .into_iter()
        .next()
        .ok_or(Error::MissingUtxoField("public_key"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use elements::AssetId;

    fn network(chain: Chain) -> Network {
        Network::new(chain, AssetId::from_slice(&[0x11; 32]).unwrap())
    }

    #[test]
    fn sighash_policy() {
        let plain = network(Chain::Plain);
        let conf = network(Chain::Confidential);
        assert!(validate_sighash(&plain, SIGHASH_ALL).is_ok());
        assert!(matches!(
            validate_sighash(&plain, SIGHASH_SINGLE_ANYONECANPAY),
            Err(Error::UnsupportedSighash(0x83))
        ));
        assert!(validate_sighash(&conf, SIGHASH_SINGLE_ANYONECANPAY).is_ok());
        assert!(matches!(
            validate_sighash(&conf, 0x02),
            Err(Error::UnsupportedSighash(0x02))
        ));
    }
}
