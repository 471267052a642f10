//! Fee arithmetic and blinding-aware weight estimation.
//!
//! Fees are quoted in satoshi per 1000 virtual bytes and always rounded
//! up. On confidential chains the draft transaction is weighed as if it
//! were already blinded, so the fee computed from the unblinded draft
//! still covers the final transaction.

use elements::confidential::Nonce;
use elements::Transaction;

use crate::model::{BuildResult, OutputMeta};
use crate::network::Network;

/// Witness discount divisor.
const WITNESS_SCALE: u64 = 4;

/// ceil(weight / 4)
pub fn vsize_from_weight(weight: u64) -> u64 {
    (weight + WITNESS_SCALE - 1) / WITNESS_SCALE
}

/// ceil(vsize * rate / 1000)
pub fn fee_from_weight(weight: u64, rate: u64) -> u64 {
    let vsize = vsize_from_weight(weight);
    (vsize * rate + 999) / 1000
}

/// Effective rate of a known fee over a known weight, in sat/kvB.
pub fn rate_from_fee(fee: u64, weight: u64) -> u64 {
    let vsize = vsize_from_weight(weight);
    if vsize == 0 {
        0
    } else {
        fee * 1000 / vsize
    }
}

fn varint_len(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Serialized size of a surjection proof over `n_inputs` domain assets,
/// including the length prefix.
fn surjectionproof_size(n_inputs: u64) -> u64 {
    let used = n_inputs.min(3);
    let body = 2 + (n_inputs + 7) / 8 + 32 * (1 + used);
    varint_len(body) + body
}

/// Upper bound on a 52-bit range proof, including the length prefix.
fn rangeproof_size() -> u64 {
    const BITS: u64 = 52;
    let rings = (BITS + 1) / 2;
    let body = 10 + 32 + rings * 4 * 32 + rings * 33;
    varint_len(body) + body
}

/// Weight of the transaction as it will look once blinded.
///
/// The draft holds explicit assets and values; each to-be-blinded output
/// grows by the commitment delta, the nonce, and the two proofs. Plain
/// chains weigh the transaction as-is.
pub fn adjusted_weight(network: &Network, tx: &Transaction, outputs: &[OutputMeta]) -> u64 {
    let mut weight = tx.weight() as u64;
    if !network.is_confidential() {
        return weight;
    }
    let n_inputs = tx.input.len().max(1) as u64;
    for (vout, meta) in outputs.iter().enumerate() {
        if meta.is_fee {
            continue;
        }
        let out = &tx.output[vout];
        if meta.blinding_pubkey.is_none() {
            // Pre-blinded outputs still need a surjection proof over this
            // transaction's input domain.
            if meta.asset_blinder.is_some() && out.witness.surjection_proof.is_none() {
                weight += surjectionproof_size(n_inputs);
            }
            continue;
        }
        if out.value.is_explicit() {
            // explicit value (9) -> commitment (33)
            weight += (33 - 9) * WITNESS_SCALE;
        }
        if matches!(out.nonce, Nonce::Null) {
            // null nonce (1) -> ephemeral key (33)
            weight += (33 - 1) * WITNESS_SCALE;
        }
        // Proofs live in the output witness, un-discounted; already
        // blinded outputs carry their real proofs in `tx.weight()`.
        if out.witness.rangeproof.is_none() {
            weight += rangeproof_size();
        }
        if out.witness.surjection_proof.is_none() {
            weight += surjectionproof_size(n_inputs);
        }
    }
    weight
}

/// Recompute and store the result's weight, vsize and realized rate.
pub fn update_result_size(network: &Network, result: &mut BuildResult) {
    result.weight = adjusted_weight(network, &result.transaction, &result.outputs);
    result.vsize = vsize_from_weight(result.weight);
    result.calculated_fee_rate = rate_from_fee(result.fee, result.weight);
}
