//! Coin selection and the fee/change fixed point.
//!
//! One [`TxBuilder`] owns the draft transaction for the duration of one
//! build. Outputs for every addressee go in first, then inputs are chosen
//! per asset (policy asset last, so its change can absorb the fee) and the
//! fee/change loop runs to a fixed point. The finished [`BuildResult`] is
//! handed to the blinding engine and then the signing engine.

use std::collections::BTreeMap;

use elements::confidential::{Asset, Nonce, Value};
use elements::secp256k1_zkp::{PublicKey, SECP256K1};
use elements::{AssetId, LockTime, OutPoint, Script, Sequence, TxIn, TxOut, TxOutWitness};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};

use crate::bump;
use crate::error::{Error, Result};
use crate::fee::{adjusted_weight, fee_from_weight, update_result_size};
use crate::model::{
    Addressee, BuildResult, CreateTxParams, OutputMeta, TxError, Utxo, UtxoStrategy,
    SEQUENCE_NO_RBF, SEQUENCE_RBF,
};
use crate::network::Network;
use crate::script;
use crate::session::Session;

/// Build a transaction for `params`.
///
/// Recoverable problems land in `BuildResult::error` with the result
/// populated as far as possible; fatal invariant violations abort.
pub fn create_transaction<S, R>(
    network: &Network,
    session: &S,
    rng: &mut R,
    params: &CreateTxParams,
) -> Result<BuildResult>
where
    S: Session + ?Sized,
    R: Rng + CryptoRng,
{
    TxBuilder::new(network, session, rng, params)?.run(params)
}

struct TxBuilder<'a, S: Session + ?Sized, R: Rng + CryptoRng> {
    network: &'a Network,
    session: &'a S,
    rng: &'a mut R,
    result: BuildResult,
    addressees: Vec<Addressee>,
    fee_rate: u64,
    send_all: bool,
    strategy: UtxoStrategy,
    manual_utxos: Vec<Utxo>,
    wallet_utxos: BTreeMap<AssetId, Vec<Utxo>>,
    low_r: bool,
    randomize_inputs: bool,
    is_partial: bool,
    /// Index of the placeholder fee output, confidential chains only.
    fee_index: Option<usize>,
}

impl<'a, S: Session + ?Sized, R: Rng + CryptoRng> TxBuilder<'a, S, R> {
    fn new(
        network: &'a Network,
        session: &'a S,
        rng: &'a mut R,
        params: &CreateTxParams,
    ) -> Result<Self> {
        let mut result = BuildResult::empty();
        result.is_partial = params.is_partial;
        result.transaction.version = params.version.unwrap_or(2);

        let mut addressees = params.addressees.clone();
        let mut strategy = params.utxo_strategy;
        let mut manual_utxos = params.used_utxos.clone();
        let mut send_all = params.send_all;
        let fee_rate = params
            .fee_rate
            .unwrap_or_else(|| session.default_fee_rate())
            .max(session.min_fee_rate());

        if let Some(prev) = &params.previous_transaction {
            let plan = bump::prepare(network, session, prev, fee_rate, &mut result)?;
            addressees = plan.addressees;
            result.old_used_utxos = plan.old_used_utxos;
            result.change_subaccount = Some(plan.subaccount);
            if let Some(forced) = plan.strategy {
                strategy = forced;
                manual_utxos = plan.manual_utxos;
            }
            send_all = send_all || plan.send_all;
        }
        result.send_all = send_all;

        Ok(TxBuilder {
            network,
            session,
            rng,
            result,
            addressees,
            fee_rate,
            send_all,
            strategy,
            manual_utxos,
            wallet_utxos: params.utxos.clone(),
            low_r: params.low_r,
            randomize_inputs: params.randomize_inputs.unwrap_or(true) && !params.is_partial,
            is_partial: params.is_partial,
            fee_index: None,
        })
    }

    fn run(mut self, params: &CreateTxParams) -> Result<BuildResult> {
        let policy = self.network.policy_asset();

        let requested = params.fee_rate.unwrap_or_else(|| self.session.default_fee_rate());
        if requested < self.session.min_fee_rate() {
            self.result.set_error(TxError::FeeRateBelowMinimum);
        }
        self.result.fee_rate = self.fee_rate;
        if self.result.is_rbf && self.fee_rate <= self.result.old_fee_rate {
            self.result.set_error(TxError::InvalidReplacementFeeRate);
        }

        // Unconditional: nothing to build without recipients.
        if self.addressees.is_empty() {
            self.result.set_error_overriding(TxError::NoRecipients);
            return self.finish();
        }
        if self.send_all && self.addressees.len() != 1 {
            self.result.set_error(TxError::SendAllRequiresSingleOutput);
            return self.finish();
        }
        if !self.send_all && !self.is_partial {
            if let Some(a) = self
                .addressees
                .iter()
                .find(|a| a.satoshi == 0 && !a.is_blinded())
            {
                debug!("zero amount for output {:?}", a.script_pubkey);
                self.result.set_error(TxError::NoAmountSpecified);
                return self.finish();
            }
        }

        self.result.is_sweep = self
            .manual_utxos
            .iter()
            .chain(params.utxos.values().flatten())
            .any(Utxo::is_sweep);
        if self.result.is_sweep && self.network.is_confidential() {
            self.result.set_error(TxError::SweepNotSupported);
            return self.finish();
        }

        let blinded_count = self.addressees.iter().filter(|a| a.is_blinded()).count();
        if !params.scalars.is_empty() && params.scalars.len() != blinded_count {
            return Err(Error::InvalidState("one scalar per blinded output required"));
        }
        if self.is_partial && self.strategy != UtxoStrategy::Manual {
            return Err(Error::InvalidState("partial builds select utxos manually"));
        }

        self.result.transaction.lock_time = LockTime::from_consensus(
            params
                .locktime
                .unwrap_or_else(|| script::anti_snipe_locktime(self.rng, self.session.block_height())),
        );

        // Requested amounts per asset; the policy asset always takes part
        // because the fee comes out of it.
        for a in &self.addressees {
            let asset = a.asset_id.unwrap_or(policy);
            *self.result.satoshi.entry(asset).or_insert(0) += a.satoshi;
        }
        self.result.satoshi.entry(policy).or_insert(0);
        if !self.network.is_confidential()
            && self.result.satoshi.keys().any(|asset| *asset != policy)
        {
            return Err(Error::InvalidState("non-policy asset on a plain chain"));
        }
        for (asset, utxos) in &params.utxos {
            let total = utxos.iter().map(|u| u.satoshi).sum();
            self.result.available_total.insert(*asset, total);
        }

        if self.strategy == UtxoStrategy::Manual {
            if self.manual_utxos.is_empty() && self.result.old_used_utxos.is_empty() {
                self.result.set_error(TxError::NoUtxosFound);
                return self.finish();
            }
            if !self.is_partial {
                if let Some(u) = self
                    .manual_utxos
                    .iter()
                    .find(|u| !self.result.satoshi.contains_key(&u.asset_id))
                {
                    self.result
                        .set_error(TxError::MissingRecipientForAsset(u.asset_id.to_string()));
                    return self.finish();
                }
            }
        }

        self.add_addressee_outputs()?;
        if self.network.is_confidential() && !self.is_partial {
            let idx = self.result.transaction.output.len();
            self.result
                .transaction
                .output
                .push(TxOut::new_fee(0, policy));
            self.result.outputs.push(OutputMeta {
                script_pubkey: Script::new(),
                asset_id: policy,
                satoshi: 0,
                is_fee: true,
                is_change: false,
                blinding_pubkey: None,
                asset_blinder: None,
                amount_blinder: None,
                eph_public_key: None,
                blinding_nonce: None,
                addressee_index: None,
            });
            self.fee_index = Some(idx);
        }

        self.add_old_inputs()?;

        if self.is_partial {
            for utxo in self.manual_utxos.clone() {
                self.add_input(utxo)?;
            }
            return self.finish();
        }

        // Policy asset last so its change absorbs the fee.
        let mut assets: Vec<AssetId> = self
            .result
            .satoshi
            .keys()
            .copied()
            .filter(|a| *a != policy)
            .collect();
        assets.push(policy);
        for asset in assets {
            let required = self.result.satoshi.get(&asset).copied().unwrap_or(0);
            self.select(asset, asset == policy, required)?;
        }

        if let Some(idx) = self.fee_index {
            self.result.transaction.output[idx] = TxOut::new_fee(self.result.fee, policy);
            self.result.outputs[idx].satoshi = self.result.fee;
        }
        self.randomize_change_position();
        self.shuffle_new_inputs();
        self.check_replacement_dominance();
        self.finish()
    }

    fn finish(mut self) -> Result<BuildResult> {
        update_result_size(self.network, &mut self.result);
        let mut finals = Vec::with_capacity(self.addressees.len());
        for meta in &self.result.outputs {
            if let Some(i) = meta.addressee_index {
                let mut addressee = self.addressees[i].clone();
                addressee.satoshi = meta.satoshi;
                finals.push(addressee);
            }
        }
        self.result.addressees = finals;
        if let Some(err) = &self.result.error {
            warn!("transaction build failed: {err}");
        }
        Ok(self.result)
    }

    /// One output per addressee, in request order unless an explicit
    /// insertion index is given. Pre-blinded addressees carry their
    /// commitments and proofs straight into the output.
    fn add_addressee_outputs(&mut self) -> Result<()> {
        let policy = self.network.policy_asset();
        let confidential = self.network.is_confidential();
        for (i, addressee) in self.addressees.clone().into_iter().enumerate() {
            let asset = addressee.asset_id.unwrap_or(policy);
            let (txout, mut meta) = match &addressee.commitments {
                Some(c) => {
                    // Its balance contribution arrives through a caller
                    // scalar, not through factors of ours.
                    debug!("output {i} arrives pre-blinded");
                    let txout = TxOut {
                        asset: Asset::Confidential(c.asset_commitment),
                        value: Value::Confidential(c.value_commitment),
                        nonce: c
                            .eph_public_key
                            .map(Nonce::Confidential)
                            .unwrap_or(Nonce::Null),
                        script_pubkey: addressee.script_pubkey.clone(),
                        witness: TxOutWitness {
                            surjection_proof: None,
                            rangeproof: c.range_proof.clone(),
                        },
                    };
                    let meta = OutputMeta {
                        script_pubkey: addressee.script_pubkey.clone(),
                        asset_id: asset,
                        satoshi: addressee.satoshi,
                        is_fee: false,
                        is_change: false,
                        blinding_pubkey: None,
                        asset_blinder: Some(c.asset_blinder),
                        amount_blinder: c.amount_blinder,
                        eph_public_key: c.eph_public_key,
                        blinding_nonce: c.blinding_nonce,
                        addressee_index: None,
                    };
                    (txout, meta)
                }
                None => {
                    let txout = explicit_txout(asset, addressee.satoshi, &addressee.script_pubkey);
                    let meta = OutputMeta {
                        script_pubkey: addressee.script_pubkey.clone(),
                        asset_id: asset,
                        satoshi: addressee.satoshi,
                        is_fee: false,
                        is_change: false,
                        blinding_pubkey: if confidential {
                            addressee.blinding_pubkey
                        } else {
                            None
                        },
                        asset_blinder: None,
                        amount_blinder: None,
                        eph_public_key: None,
                        blinding_nonce: None,
                        addressee_index: None,
                    };
                    (txout, meta)
                }
            };
            meta.addressee_index = Some(i);
            let at = addressee
                .index
                .filter(|&at| at <= self.result.transaction.output.len());
            self.insert_output(txout, meta, at);
        }
        Ok(())
    }

    fn insert_output(&mut self, txout: TxOut, meta: OutputMeta, at: Option<usize>) -> usize {
        let idx = at.unwrap_or(self.result.transaction.output.len());
        self.result.transaction.output.insert(idx, txout);
        self.result.outputs.insert(idx, meta);
        if let Some(fee) = self.fee_index {
            if fee >= idx {
                self.fee_index = Some(fee + 1);
            }
        }
        for entry in self.result.change.values_mut() {
            if let Some(c) = entry.index {
                if c as usize >= idx {
                    entry.index = Some(c + 1);
                }
            }
        }
        idx
    }

    /// Replaced inputs come first and keep their position; their spend
    /// data is carried over so the size estimate matches reality.
    fn add_old_inputs(&mut self) -> Result<()> {
        for mut utxo in std::mem::take(&mut self.result.old_used_utxos) {
            let mut txin = self.new_txin(&utxo);
            if utxo.script_sig.is_none() && utxo.witness.is_none() {
                self.dummy_spend(&mut utxo, &mut txin)?;
            } else {
                if let Some(sig) = &utxo.script_sig {
                    txin.script_sig = sig.clone();
                }
                if let Some(wit) = &utxo.witness {
                    txin.witness.script_witness = wit.clone();
                }
            }
            self.result.transaction.input.push(txin);
            self.result.old_used_utxos.push(utxo);
        }
        Ok(())
    }

    /// Input selection for one asset: take the caller's list verbatim in
    /// manual mode, otherwise append candidates in presented order, and
    /// iterate fee against change until neither moves.
    fn select(&mut self, asset: AssetId, is_policy: bool, required: u64) -> Result<()> {
        // Asset change can never be donated to the fee (the per-asset sum
        // must balance exactly), so only zero change is droppable.
        let dust = if is_policy {
            self.session.dust_threshold(&asset).max(1)
        } else {
            1
        };
        let candidates: Vec<Utxo> = match self.strategy {
            UtxoStrategy::Manual => self
                .manual_utxos
                .iter()
                .filter(|u| u.asset_id == asset)
                .cloned()
                .collect(),
            UtxoStrategy::Default => self.wallet_candidates(asset),
        };
        let send_all_here = self.send_all
            && self.addressees[0].asset_id.unwrap_or(self.network.policy_asset()) == asset;

        let mut total: u64 = self
            .result
            .old_used_utxos
            .iter()
            .chain(self.result.used_utxos.iter())
            .filter(|u| u.asset_id == asset)
            .map(|u| u.satoshi)
            .sum();
        let mut next = 0usize;
        if self.strategy == UtxoStrategy::Manual || send_all_here {
            while next < candidates.len() {
                total += self.add_input(candidates[next].clone())?;
                next += 1;
            }
        }

        let limit = std::cmp::max(8, 2 * candidates.len() + 1);
        let mut last_fee: Option<u64> = None;
        for _ in 0..limit {
            let fee = if is_policy { self.current_fee() } else { 0 };

            if send_all_here {
                let value = if is_policy {
                    // A send-all payment below the dust threshold is not
                    // worth emitting.
                    if total < fee + dust {
                        self.result.set_error(TxError::InsufficientFunds);
                        return Ok(());
                    }
                    self.result.fee = fee;
                    total - fee
                } else {
                    total
                };
                self.set_addressee_value(asset, value);
                return Ok(());
            }

            if total < required + fee {
                if next < candidates.len() {
                    total += self.add_input(candidates[next].clone())?;
                    next += 1;
                    continue;
                }
                debug!("{asset}: {total} sat available, {required} + {fee} needed");
                self.result.set_error(TxError::InsufficientFunds);
                if is_policy {
                    self.result.fee = fee;
                }
                return Ok(());
            }

            let change = total - required - fee;
            let have_change = self
                .result
                .change
                .get(&asset)
                .is_some_and(|c| c.index.is_some());
            if change < dust {
                if !have_change {
                    // Dusty change is cheaper donated to the fee than kept.
                    if is_policy {
                        self.result.fee = fee + change;
                    }
                    return Ok(());
                }
                // Adding the change output grew the fee enough to make the
                // change itself dusty; only another input can fix that.
                if next < candidates.len() {
                    total += self.add_input(candidates[next].clone())?;
                    next += 1;
                    continue;
                }
                self.result.set_error(TxError::InsufficientFunds);
                if is_policy {
                    self.result.fee = fee;
                }
                return Ok(());
            }

            self.set_change(asset, change)?;
            if last_fee == Some(fee) {
                if is_policy {
                    self.result.fee = fee;
                }
                return Ok(());
            }
            last_fee = Some(fee);
        }
        Err(Error::FeeLoopDivergence(limit))
    }

    fn wallet_candidates(&self, asset: AssetId) -> Vec<Utxo> {
        let used: Vec<(elements::Txid, u32)> = self
            .result
            .old_used_utxos
            .iter()
            .map(Utxo::outpoint)
            .collect();
        self.wallet_utxos
            .get(&asset)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|u| !used.contains(&u.outpoint()))
            .collect()
    }

    fn current_fee(&self) -> u64 {
        let weight = adjusted_weight(self.network, &self.result.transaction, &self.result.outputs);
        fee_from_weight(weight, self.fee_rate) + self.result.network_fee
    }

    fn set_addressee_value(&mut self, asset: AssetId, value: u64) {
        for (vout, meta) in self.result.outputs.iter_mut().enumerate() {
            if meta.addressee_index.is_some() && meta.asset_id == asset {
                meta.satoshi = value;
                self.result.transaction.output[vout].value = Value::Explicit(value);
            }
        }
        self.result.satoshi.insert(asset, value);
    }

    fn set_change(&mut self, asset: AssetId, amount: u64) -> Result<()> {
        let existing = self.result.change.get(&asset).and_then(|c| c.index);
        match existing {
            Some(idx) => {
                let idx = idx as usize;
                self.result.transaction.output[idx].value = Value::Explicit(amount);
                self.result.outputs[idx].satoshi = amount;
            }
            None => {
                let subaccount = self.change_subaccount();
                let address = self.session.change_address(subaccount)?;
                debug!("change output for {asset}: {amount} sat");
                let txout = explicit_txout(asset, amount, &address.script_pubkey);
                let meta = OutputMeta {
                    script_pubkey: address.script_pubkey.clone(),
                    asset_id: asset,
                    satoshi: amount,
                    is_fee: false,
                    is_change: true,
                    blinding_pubkey: if self.network.is_confidential() {
                        address.blinding_pubkey
                    } else {
                        None
                    },
                    asset_blinder: None,
                    amount_blinder: None,
                    eph_public_key: None,
                    blinding_nonce: None,
                    addressee_index: None,
                };
                // The fee output keeps the last slot: change takes its
                // place and the fee shifts right.
                let idx = self.insert_output(txout, meta, self.fee_index);
                let entry = self.result.change.entry(asset).or_default();
                entry.index = Some(idx as u32);
                entry.address = Some(address);
                self.result.change_subaccount = Some(subaccount);
            }
        }
        if let Some(entry) = self.result.change.get_mut(&asset) {
            entry.amount = amount;
        }
        Ok(())
    }

    fn change_subaccount(&self) -> u32 {
        self.result
            .change_subaccount
            .or_else(|| self.result.old_used_utxos.first().map(|u| u.subaccount))
            .or_else(|| self.result.used_utxos.first().map(|u| u.subaccount))
            .unwrap_or(0)
    }

    fn new_txin(&self, utxo: &Utxo) -> TxIn {
        let sequence = utxo.sequence.unwrap_or(if self.session.rbf_enabled() {
            SEQUENCE_RBF
        } else {
            SEQUENCE_NO_RBF
        });
        TxIn {
            previous_output: OutPoint::new(utxo.txhash, utxo.pt_idx),
            is_pegin: false,
            script_sig: Script::new(),
            sequence: Sequence::from_consensus(sequence),
            asset_issuance: Default::default(),
            witness: Default::default(),
        }
    }

    fn add_input(&mut self, mut utxo: Utxo) -> Result<u64> {
        let mut txin = self.new_txin(&utxo);
        self.dummy_spend(&mut utxo, &mut txin)?;
        debug!(
            "adding input {}:{} {} sat",
            utxo.txhash, utxo.pt_idx, utxo.satoshi
        );
        self.result.transaction.input.push(txin);
        let value = utxo.satoshi;
        self.result.used_utxos.push(utxo);
        Ok(value)
    }

    /// Fill in a spend script/witness sized exactly like the real one, so
    /// the weight estimate is right before any signature exists.
    fn dummy_spend(&self, utxo: &mut Utxo, txin: &mut TxIn) -> Result<()> {
        use crate::address_type::AddressType::*;
        let prevout = self.prevout_script(utxo)?;
        match utxo.address_type {
            P2pkh => {
                let pk = self.utxo_pubkey(utxo)?;
                txin.script_sig = script::dummy_scriptsig_p2pkh(self.low_r, &pk);
            }
            P2sh => {
                txin.script_sig = script::dummy_scriptsig_multisig(self.low_r, &prevout);
            }
            P2wpkh => {
                let pk = self.utxo_pubkey(utxo)?;
                txin.witness.script_witness =
                    vec![script::dummy_sig(self.low_r), pk.serialize().to_vec()];
            }
            P2shP2wpkh => {
                let pk = self.utxo_pubkey(utxo)?;
                txin.script_sig = script::scriptsig_p2sh_wrapped(&script::p2wpkh_program(&pk));
                txin.witness.script_witness =
                    vec![script::dummy_sig(self.low_r), pk.serialize().to_vec()];
            }
            P2wsh => {
                txin.witness.script_witness = script::dummy_multisig_witness(self.low_r, &prevout);
            }
            Csv => {
                txin.witness.script_witness = vec![
                    script::dummy_sig(self.low_r),
                    script::dummy_sig(self.low_r),
                    prevout.to_bytes(),
                ];
            }
        }
        Ok(())
    }

    fn prevout_script(&self, utxo: &mut Utxo) -> Result<Script> {
        if let Some(s) = &utxo.prevout_script {
            return Ok(s.clone());
        }
        let script = if let Some(pk) = utxo.private_key.map(|sk| PublicKey::from_secret_key(SECP256K1, &sk)) {
            // Sweep inputs spend a plain p2pkh of the supplied key.
            utxo.public_key = Some(pk);
            script::p2pkh_scriptpubkey(&pk)
        } else {
            self.session.output_script_from_utxo(utxo)?
        };
        utxo.prevout_script = Some(script.clone());
        Ok(script)
    }

    fn utxo_pubkey(&self, utxo: &mut Utxo) -> Result<PublicKey> {
        if let Some(pk) = utxo.public_key {
            return Ok(pk);
        }
        let pk = match &utxo.private_key {
            Some(sk) => PublicKey::from_secret_key(SECP256K1, sk),
            None => *self
                .session
                .pubkeys_from_utxo(utxo)?
                .first()
                .ok_or(Error::MissingUtxoField("public_key"))?,
        };
        utxo.public_key = Some(pk);
        Ok(pk)
    }

    /// Plain chains have no fixed fee/change layout, so the change slot is
    /// picked uniformly to defeat position heuristics.
    fn randomize_change_position(&mut self) {
        if self.network.is_confidential() {
            return;
        }
        let policy = self.network.policy_asset();
        let Some(idx) = self.result.change_index(&policy).map(|i| i as usize) else {
            return;
        };
        let n = self.result.transaction.output.len();
        if n < 2 {
            return;
        }
        let target = self.rng.gen_range(0..n);
        if target != idx {
            let out = self.result.transaction.output.remove(idx);
            self.result.transaction.output.insert(target, out);
            let meta = self.result.outputs.remove(idx);
            self.result.outputs.insert(target, meta);
            for (i, meta) in self.result.outputs.iter().enumerate() {
                if meta.is_change {
                    if let Some(entry) = self.result.change.get_mut(&meta.asset_id) {
                        entry.index = Some(i as u32);
                    }
                }
            }
        }
    }

    /// Shuffle the new inputs only; replaced inputs keep their prefix
    /// positions so the replacement stays recognizable.
    fn shuffle_new_inputs(&mut self) {
        let n = self.result.used_utxos.len();
        if !self.randomize_inputs || n < 2 {
            return;
        }
        let old = self.result.old_used_utxos.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(self.rng);
        let utxos = std::mem::take(&mut self.result.used_utxos);
        let tail = self.result.transaction.input.split_off(old);
        let mut slots: Vec<Option<(Utxo, TxIn)>> =
            utxos.into_iter().zip(tail).map(Some).collect();
        for &i in &order {
            if let Some((utxo, txin)) = slots[i].take() {
                self.result.transaction.input.push(txin);
                self.result.used_utxos.push(utxo);
            }
        }
    }

    /// A replacement must strictly dominate the original fee-wise.
    fn check_replacement_dominance(&mut self) {
        if !self.result.is_rbf || self.result.error.is_some() {
            return;
        }
        let weight = adjusted_weight(self.network, &self.result.transaction, &self.result.outputs);
        let bump_cost = fee_from_weight(weight, self.session.min_fee_rate());
        let old_fee = self.result.old_fee;
        let new_rate = crate::fee::rate_from_fee(self.result.fee, weight);
        if self.result.fee < old_fee + bump_cost || new_rate <= self.result.old_fee_rate {
            warn!(
                "replacement fee {} at {new_rate} sat/kvB does not dominate {old_fee} at {}",
                self.result.fee, self.result.old_fee_rate
            );
            self.result.set_error(TxError::InvalidReplacementFeeRate);
        }
    }
}

pub(crate) fn explicit_txout(asset: AssetId, value: u64, script_pubkey: &Script) -> TxOut {
    TxOut {
        asset: Asset::Explicit(asset),
        value: Value::Explicit(value),
        nonce: Nonce::Null,
        script_pubkey: script_pubkey.clone(),
        witness: TxOutWitness::default(),
    }
}
