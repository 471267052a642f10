//! Reconstructing fee bumps of a prior unconfirmed transaction.
//!
//! A replacement (RBF) re-derives the prior transaction's inputs as
//! synthetic UTXOs and its outputs as addressees, after proving the prior
//! witness data really signs what the wallet record claims. A
//! child-pays-for-parent (CPFP) spends one wallet-owned prior output back
//! to the wallet with a fee large enough to subsidize the parent.

use elements::secp256k1_zkp::PublicKey;
use log::debug;

use crate::address_type::AddressType;
use crate::error::{Error, Result};
use crate::fee::fee_from_weight;
use crate::model::{Addressee, BuildResult, PreviousTransaction, Utxo, UtxoStrategy};
use crate::network::Network;
use crate::script;
use crate::session::Session;
use crate::sigs;

/// What the builder must override to turn a prior transaction into a
/// bump build.
pub(crate) struct BumpPlan {
    pub addressees: Vec<Addressee>,
    /// Replaced inputs; stay a fixed prefix of the new input list.
    pub old_used_utxos: Vec<Utxo>,
    /// CPFP: the parent output to spend.
    pub manual_utxos: Vec<Utxo>,
    pub strategy: Option<UtxoStrategy>,
    pub send_all: bool,
    pub subaccount: u32,
}

/// Detect the bump mode for `prev` and reconstruct the build inputs,
/// recording mode/fee bookkeeping on `result`.
pub(crate) fn prepare<S>(
    network: &Network,
    session: &S,
    prev: &PreviousTransaction,
    fee_rate: u64,
    result: &mut BuildResult,
) -> Result<BumpPlan>
where
    S: Session + ?Sized,
{
    if !prev.can_rbf && !prev.can_cpfp {
        return Err(Error::CannotBump);
    }
    let tx = session.raw_transaction(&prev.txid)?;
    if tx.txid() != prev.txid
        || tx.input.len() != prev.inputs.len()
        || tx.output.len() != prev.outputs.len()
    {
        return Err(Error::PreviousTxMismatch);
    }
    result.old_fee = prev.fee;
    result.old_fee_rate = prev.fee_rate;

    if prev.can_rbf {
        result.is_rbf = true;
        prepare_rbf(network, session, prev, &tx, result)
    } else {
        result.is_cpfp = true;
        prepare_cpfp(network, session, prev, &tx, fee_rate, result)
    }
}

fn prepare_rbf<S>(
    network: &Network,
    session: &S,
    prev: &PreviousTransaction,
    tx: &elements::Transaction,
    result: &mut BuildResult,
) -> Result<BumpPlan>
where
    S: Session + ?Sized,
{
    let policy = network.policy_asset();
    let subaccount = prev
        .inputs
        .iter()
        .find(|io| io.is_relevant)
        .map(|io| io.subaccount)
        .ok_or(Error::CrossSubaccountBump)?;
    // Third-party inputs cannot be re-signed, so every input must be ours.
    if prev.inputs.iter().any(|io| !io.is_relevant) {
        return Err(Error::CannotBump);
    }

    let mut old_used_utxos = Vec::with_capacity(prev.inputs.len());
    for (index, io) in prev.inputs.iter().enumerate() {
        let address_type = io
            .address_type
            .ok_or(Error::MissingUtxoField("address_type"))?;
        let txin = &tx.input[index];
        let mut utxo = Utxo::new(
            txin.previous_output.txid,
            txin.previous_output.vout,
            io.satoshi,
            policy,
            address_type,
            io.subaccount,
            io.pointer,
            io.is_internal,
        );
        utxo.sequence = Some(txin.sequence.to_consensus_u32());

        let witness = txin.witness.script_witness.clone();
        let decoded =
            sigs::decode_input(network.chain(), address_type, &txin.script_sig, &witness, index)?;
        if let Some(redeem) = &decoded.redeem_script {
            // The locktime parameter may have changed since; the witness
            // holds the one this output was created with.
            if address_type == AddressType::Csv {
                utxo.subtype = script::csv_blocks_from_redeem_script(redeem)?;
            }
            utxo.prevout_script = Some(redeem.clone());
        }
        let pubkey = match &decoded.public_key {
            Some(bytes) => PublicKey::from_slice(bytes)
                .map_err(|_| Error::MalformedWitness(index))?,
            None => *session
                .pubkeys_from_utxo(&utxo)?
                .first()
                .ok_or(Error::MissingUtxoField("public_key"))?,
        };
        utxo.public_key = Some(pubkey);

        crate::sign::verify_input_signature(
            network,
            session,
            tx,
            index,
            &utxo,
            &pubkey,
            decoded.user_signature(),
        )?;
        utxo.user_sighash = Some(decoded.sighash());
        utxo.script_sig = Some(txin.script_sig.clone());
        utxo.witness = Some(witness);
        old_used_utxos.push(utxo);
    }

    // Wallet-internal outputs are change and get rebuilt; everything else
    // is a payment to re-emit.
    let mut addressees = Vec::new();
    for io in &prev.outputs {
        if io.script_pubkey.is_empty() {
            continue; // fee output
        }
        if io.is_relevant && io.is_internal {
            continue;
        }
        addressees.push(Addressee::new(io.script_pubkey.clone(), io.satoshi, None));
    }

    if addressees.is_empty() {
        // Nothing but change: replace with a redeposit of the whole input
        // value, spending only the original inputs.
        debug!("replacement of {} is a redeposit", prev.txid);
        result.is_redeposit = true;
        let address = session.change_address(subaccount)?;
        let mut addressee = Addressee::new(address.script_pubkey.clone(), 0, None);
        addressee.blinding_pubkey = address.blinding_pubkey;
        return Ok(BumpPlan {
            addressees: vec![addressee],
            old_used_utxos,
            manual_utxos: Vec::new(),
            strategy: Some(UtxoStrategy::Manual),
            send_all: true,
            subaccount,
        });
    }

    Ok(BumpPlan {
        addressees,
        old_used_utxos,
        manual_utxos: Vec::new(),
        strategy: None,
        send_all: false,
        subaccount,
    })
}

fn prepare_cpfp<S>(
    network: &Network,
    session: &S,
    prev: &PreviousTransaction,
    tx: &elements::Transaction,
    fee_rate: u64,
    result: &mut BuildResult,
) -> Result<BumpPlan>
where
    S: Session + ?Sized,
{
    let policy = network.policy_asset();
    let io = prev
        .outputs
        .iter()
        .find(|io| io.is_relevant && !io.script_pubkey.is_empty())
        .ok_or(Error::CrossSubaccountBump)?;
    let address_type = io
        .address_type
        .ok_or(Error::MissingUtxoField("address_type"))?;

    // What the parent is short of at the new rate; the child's fee loop
    // adds this on top of its own cost.
    let parent_target = fee_from_weight(tx.weight() as u64, fee_rate);
    result.network_fee = parent_target.saturating_sub(prev.fee);
    result.is_redeposit = true;
    debug!(
        "cpfp of {}: parent needs {parent_target}, paid {}, subsidy {}",
        prev.txid, prev.fee, result.network_fee
    );

    let utxo = Utxo::new(
        prev.txid,
        io.pt_idx,
        io.satoshi,
        policy,
        address_type,
        io.subaccount,
        io.pointer,
        io.is_internal,
    );
    let address = session.change_address(io.subaccount)?;
    let mut addressee = Addressee::new(address.script_pubkey.clone(), 0, None);
    addressee.blinding_pubkey = address.blinding_pubkey;

    Ok(BumpPlan {
        addressees: vec![addressee],
        old_used_utxos: Vec::new(),
        manual_utxos: vec![utxo],
        strategy: Some(UtxoStrategy::Manual),
        send_all: true,
        subaccount: io.subaccount,
    })
}
