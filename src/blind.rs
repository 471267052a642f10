//! Confidential blinding: deterministic factors, commitments and proofs.
//!
//! Blinding factors are never random. Each wallet output derives its pair
//! from the master blinding key, the transaction's prevout set and the
//! output index, so the same transaction shape always rederives the same
//! factors. The last blindable output's value factor is solved so the
//! Pedersen sum over all inputs and outputs balances; contributions from
//! outputs blinded by other parties arrive as caller-supplied scalars.

use elements::confidential::{Asset, AssetBlindingFactor, Nonce, Value, ValueBlindingFactor};
use elements::encode::serialize;
use elements::hashes::{sha256d, Hash, HashEngine};
use elements::secp256k1_zkp::{
    Generator, PedersenCommitment, RangeProof, SecretKey, SurjectionProof, SECP256K1,
};
use elements::{Transaction, TxOut, TxOutSecrets, TxOutWitness};
use hmac::{Hmac, Mac};
use log::debug;
use rand::{CryptoRng, Rng};
use sha2::Sha512;

use crate::error::{Error, Result};
use crate::fee::update_result_size;
use crate::model::BuildResult;
use crate::network::Network;
use crate::session::Signer;

type HmacSha512 = Hmac<Sha512>;

/// Double-SHA256 over the serialized prevouts, the transaction-shape key
/// the factor derivation is bound to.
pub fn hash_prevouts(tx: &Transaction) -> [u8; 32] {
    let mut engine = sha256d::Hash::engine();
    for txin in &tx.input {
        engine.input(&serialize(&txin.previous_output));
    }
    sha256d::Hash::from_engine(engine).to_byte_array()
}

/// abf/vbf for output `vout`: HMAC-SHA512(master, prevouts || vout),
/// split in half.
fn derive_factors(
    master: &[u8; 64],
    prevouts: &[u8; 32],
    vout: u32,
) -> Result<(AssetBlindingFactor, ValueBlindingFactor)> {
    let mut mac =
        HmacSha512::new_from_slice(master).map_err(|e| Error::Blinding(e.to_string()))?;
    mac.update(prevouts);
    mac.update(&vout.to_le_bytes());
    let digest = mac.finalize().into_bytes();
    let abf = AssetBlindingFactor::from_slice(&digest[..32])
        .map_err(|e| Error::Blinding(e.to_string()))?;
    let vbf = ValueBlindingFactor::from_slice(&digest[32..])
        .map_err(|e| Error::Blinding(e.to_string()))?;
    Ok((abf, vbf))
}

/// Blind every wallet-owned output of a finished build in place.
///
/// Safe to call again after the transaction changed: outputs whose
/// generator and commitment are unchanged keep their existing proofs
/// instead of paying for regeneration.
pub fn blind_transaction<G, R>(
    network: &Network,
    signer: &G,
    rng: &mut R,
    scalars: &[[u8; 32]],
    result: &mut BuildResult,
) -> Result<()>
where
    G: Signer + ?Sized,
    R: Rng + CryptoRng,
{
    if !network.is_confidential() {
        return Ok(());
    }
    let master = signer.master_blinding_key()?;
    let prevouts = hash_prevouts(&result.transaction);
    debug!("blinding over prevouts {}", hex::encode(prevouts));

    // Input side: secrets of what we spend, and the proof domain every
    // surjection proof must range over.
    let mut input_secrets = Vec::new();
    let mut domain = Vec::new();
    for utxo in result.old_used_utxos.iter().chain(result.used_utxos.iter()) {
        let abf = utxo.asset_blinder.unwrap_or_else(AssetBlindingFactor::zero);
        let vbf = utxo
            .amount_blinder
            .unwrap_or_else(ValueBlindingFactor::zero);
        let tag = utxo.asset_id.into_tag();
        let generator = Generator::new_blinded(SECP256K1, tag, abf.into_inner());
        domain.push((generator, tag, abf.into_inner()));
        input_secrets.push((utxo.satoshi, abf, vbf));
    }

    let to_blind: Vec<usize> = result
        .outputs
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.is_fee && m.blinding_pubkey.is_some())
        .map(|(i, _)| i)
        .collect();
    if to_blind.is_empty() {
        return Err(Error::Blinding(
            "transaction has no output to blind".into(),
        ));
    }

    let mut factors = Vec::with_capacity(to_blind.len());
    for &vout in &to_blind {
        factors.push(derive_factors(&master, &prevouts, vout as u32)?);
    }

    // Solve the last value factor against everything else in the
    // balance: our other outputs, pre-blinded outputs with known
    // factors, and scalar offsets standing in for the rest.
    if !result.is_partial {
        let mut others: Vec<(u64, AssetBlindingFactor, ValueBlindingFactor)> = Vec::new();
        for (k, &vout) in to_blind.iter().enumerate() {
            if k + 1 == to_blind.len() {
                continue;
            }
            let (abf, vbf) = factors[k];
            others.push((result.outputs[vout].satoshi, abf, vbf));
        }
        for meta in &result.outputs {
            if meta.blinding_pubkey.is_none() && !meta.is_fee {
                if let (Some(abf), Some(vbf)) = (meta.asset_blinder, meta.amount_blinder) {
                    others.push((meta.satoshi, abf, vbf));
                }
            }
        }
        for scalar in scalars {
            let vbf = ValueBlindingFactor::from_slice(scalar)
                .map_err(|e| Error::Blinding(e.to_string()))?;
            others.push((0, AssetBlindingFactor::zero(), vbf));
        }
        let last = to_blind.len() - 1;
        let last_vout = to_blind[last];
        let (last_abf, _) = factors[last];
        factors[last].1 = ValueBlindingFactor::last(
            SECP256K1,
            result.outputs[last_vout].satoshi,
            last_abf,
            &input_secrets,
            &others,
        );
    }

    for (k, &vout) in to_blind.iter().enumerate() {
        let (abf, vbf) = factors[k];
        let meta = &result.outputs[vout];
        let value = meta.satoshi;
        let tag = meta.asset_id.into_tag();
        let generator = Generator::new_blinded(SECP256K1, tag, abf.into_inner());
        let commitment = PedersenCommitment::new(SECP256K1, value, vbf.into_inner(), generator);

        let out = &result.transaction.output[vout];
        let unchanged = out.asset == Asset::Confidential(generator)
            && out.value == Value::Confidential(commitment)
            && out.witness.rangeproof.is_some();
        if unchanged {
            debug!("output {vout}: commitments unchanged, proofs kept");
            continue;
        }

        let receiver = meta
            .blinding_pubkey
            .ok_or(Error::InvalidState("blindable output without key"))?;
        let (nonce, shared_secret) = Nonce::new_confidential(rng, SECP256K1, &receiver);
        let mut message = [0u8; 64];
        message[..32].copy_from_slice(&serialize(&meta.asset_id));
        message[32..].copy_from_slice(abf.into_inner().as_ref());
        let rangeproof = RangeProof::new(
            SECP256K1,
            value.min(1),
            commitment,
            value,
            vbf.into_inner(),
            &message,
            meta.script_pubkey.as_bytes(),
            shared_secret,
            0,
            52,
            generator,
        )?;
        let surjection_proof = SurjectionProof::new(
            SECP256K1,
            rng,
            tag,
            abf.into_inner(),
            &domain,
        )?;

        let script_pubkey = out.script_pubkey.clone();
        result.transaction.output[vout] = TxOut {
            asset: Asset::Confidential(generator),
            value: Value::Confidential(commitment),
            nonce,
            script_pubkey,
            witness: TxOutWitness {
                surjection_proof: Some(Box::new(surjection_proof)),
                rangeproof: Some(Box::new(rangeproof)),
            },
        };
        let meta = &mut result.outputs[vout];
        meta.asset_blinder = Some(abf);
        meta.amount_blinder = Some(vbf);
        meta.eph_public_key = match nonce {
            Nonce::Confidential(pk) => Some(pk),
            _ => None,
        };
        meta.blinding_nonce = Some(shared_secret.secret_bytes());
    }

    // Outputs blinded by another party still need a surjection proof
    // over this transaction's input domain.
    for vout in 0..result.outputs.len() {
        let meta = &result.outputs[vout];
        if meta.is_fee || meta.blinding_pubkey.is_some() {
            continue;
        }
        let Some(abf) = meta.asset_blinder else {
            continue;
        };
        if result.transaction.output[vout]
            .witness
            .surjection_proof
            .is_some()
        {
            continue;
        }
        let proof = SurjectionProof::new(
            SECP256K1,
            rng,
            meta.asset_id.into_tag(),
            abf.into_inner(),
            &domain,
        )?;
        result.transaction.output[vout].witness.surjection_proof = Some(Box::new(proof));
    }

    result.blinding_nonces = result.outputs.iter().map(|m| m.blinding_nonce).collect();
    result.is_blinded = true;
    update_result_size(network, result);
    Ok(())
}

/// Recover the secrets of one output with its private blinding key.
///
/// Explicit outputs come back with zero factors; an output that is
/// blinded on only one of its asset/value sides is malformed.
pub fn unblind_output(txout: &TxOut, blinding_key: &SecretKey, vout: usize) -> Result<TxOutSecrets> {
    match (&txout.asset, &txout.value) {
        (Asset::Explicit(asset), Value::Explicit(value)) => Ok(TxOutSecrets {
            asset: *asset,
            asset_bf: AssetBlindingFactor::zero(),
            value: *value,
            value_bf: ValueBlindingFactor::zero(),
        }),
        (Asset::Confidential(_), Value::Confidential(_)) => txout
            .unblind(SECP256K1, *blinding_key)
            .map_err(|e| Error::Unblind(e.to_string())),
        _ => Err(Error::MixedOutput(vout)),
    }
}
