//! End-to-end build, blind, sign and bump scenarios over the software
//! session fixture.

use std::collections::BTreeMap;

use estuary_sdk::elements::confidential::{AssetBlindingFactor, ValueBlindingFactor};
use estuary_sdk::elements::encode::serialize;
use estuary_sdk::elements::script::Instruction;
use estuary_sdk::elements::secp256k1_zkp::{
    ecdsa, Generator, Message, PedersenCommitment, PublicKey, SecretKey, SECP256K1,
};
use estuary_sdk::elements::{AssetId, EcdsaSighashType, Script};
use estuary_sdk::sign::signature_hash;
use estuary_sdk::testing::{csv_redeem, multisig_redeem, TestSession};
use estuary_sdk::{
    blind_transaction, create_transaction, decode_input, script, sign_transaction, unblind_output,
    AddressType, Addressee, Chain, CreateTxParams, Network, OutputCommitments, PreviousIo,
    PreviousTransaction, Session, Signer, TxError, Utxo, UtxoStrategy, SEQUENCE_NO_RBF,
    SEQUENCE_RBF,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn policy() -> AssetId {
    AssetId::from_slice(&[0x11; 32]).unwrap()
}

fn other_asset() -> AssetId {
    AssetId::from_slice(&[0x22; 32]).unwrap()
}

fn plain_session() -> (Network, TestSession) {
    let network = Network::new(Chain::Plain, policy());
    (network, TestSession::new(network))
}

fn liquid_session() -> (Network, TestSession) {
    let network = Network::new(Chain::Confidential, policy());
    (network, TestSession::new(network))
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(7)
}

fn dest_script(tag: u8) -> Script {
    let sk = SecretKey::from_slice(&[tag; 32]).unwrap();
    script::p2wpkh_program(&PublicKey::from_secret_key(SECP256K1, &sk))
}

fn params_for(utxos: Vec<Utxo>, addressees: Vec<Addressee>) -> CreateTxParams {
    let mut by_asset: BTreeMap<AssetId, Vec<Utxo>> = BTreeMap::new();
    for utxo in utxos {
        by_asset.entry(utxo.asset_id).or_default().push(utxo);
    }
    CreateTxParams {
        addressees,
        utxos: by_asset,
        fee_rate: Some(1000),
        randomize_inputs: Some(false),
        ..Default::default()
    }
}

#[test]
fn one_utxo_pays_one_addressee_with_change() {
    let (network, session) = plain_session();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);
    let params = params_for(
        vec![utxo],
        vec![Addressee::new(dest_script(0x31), 50_000, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();

    assert_eq!(result.error, None);
    assert_eq!(result.transaction.output.len(), 2);
    // 1000 sat/kvB means the fee equals the vsize.
    assert_eq!(result.fee, result.vsize);
    let change = result.change.get(&policy()).unwrap();
    assert_eq!(change.amount, 100_000 - 50_000 - result.fee);
    assert!(change.amount >= session.dust);
    assert!(change.index.is_some());
    assert_eq!(result.used_utxos.len(), 1);
}

#[test]
fn send_all_sweeps_the_balance_without_change() {
    let (network, session) = plain_session();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);
    let mut params = params_for(vec![utxo], vec![Addressee::new(dest_script(0x31), 0, None)]);
    params.send_all = true;
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();

    assert_eq!(result.error, None);
    assert_eq!(result.transaction.output.len(), 1);
    assert!(result.change.is_empty());
    assert_eq!(result.addressees[0].satoshi, 100_000 - result.fee);
}

#[test]
fn send_all_requires_a_single_addressee() {
    let (network, session) = plain_session();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);
    let mut params = params_for(
        vec![utxo],
        vec![
            Addressee::new(dest_script(0x31), 0, None),
            Addressee::new(dest_script(0x32), 0, None),
        ],
    );
    params.send_all = true;
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, Some(TxError::SendAllRequiresSingleOutput));
}

#[test]
fn send_all_below_dust_is_insufficient() {
    let (network, session) = plain_session();
    // After the fee the remainder would land under the dust threshold.
    let utxo = session.utxo(300, policy(), AddressType::P2wpkh, 1);
    let mut params = params_for(vec![utxo], vec![Addressee::new(dest_script(0x31), 0, None)]);
    params.send_all = true;
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, Some(TxError::InsufficientFunds));
}

#[test]
fn sweep_input_signs_with_its_raw_key() {
    let (network, session) = plain_session();
    let sweep_sk = SecretKey::from_slice(&[0x61; 32]).unwrap();
    let sweep_pk = PublicKey::from_secret_key(SECP256K1, &sweep_sk);
    let mut swept = session.utxo(80_000, policy(), AddressType::P2pkh, 9);
    swept.private_key = Some(sweep_sk);
    let params = params_for(
        vec![swept],
        vec![Addressee::new(dest_script(0x31), 40_000, None)],
    );
    let mut result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, None);
    assert!(result.is_sweep);
    // The spent script comes from the supplied key, not from the wallet.
    assert_eq!(
        result.used_utxos[0].prevout_script,
        Some(script::p2pkh_scriptpubkey(&sweep_pk))
    );

    sign_transaction(&network, &session, &session.signer, &mut result).unwrap();
    let decoded = decode_input(
        Chain::Plain,
        AddressType::P2pkh,
        &result.transaction.input[0].script_sig,
        &[],
        0,
    )
    .unwrap();
    assert_eq!(decoded.public_key.as_deref(), Some(&sweep_pk.serialize()[..]));
    assert_eq!(decoded.sighash(), 0x01);

    let hash = signature_hash(
        &session,
        &result.transaction,
        0,
        &result.used_utxos[0],
        EcdsaSighashType::All,
    )
    .unwrap();
    let msg = Message::from_digest_slice(&hash).unwrap();
    let sig = ecdsa::Signature::from_der(&decoded.user_signature().der).unwrap();
    SECP256K1.verify_ecdsa(&msg, &sig, &sweep_pk).unwrap();
}

#[test]
fn sweep_is_rejected_on_confidential_chains() {
    let (network, session) = liquid_session();
    let mut swept = session.utxo(80_000, policy(), AddressType::P2pkh, 9);
    swept.private_key = Some(SecretKey::from_slice(&[0x61; 32]).unwrap());
    let params = params_for(
        vec![swept],
        vec![Addressee::new(dest_script(0x31), 40_000, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, Some(TxError::SweepNotSupported));
    assert!(result.used_utxos.is_empty());
}

#[test]
fn no_recipients_takes_priority_over_other_errors() {
    let (network, session) = plain_session();
    let mut params = params_for(vec![], vec![]);
    params.fee_rate = Some(10); // also below minimum
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, Some(TxError::NoRecipients));
}

#[test]
fn manual_utxo_without_recipient_is_reported_untouched() {
    let (network, session) = liquid_session();
    let stray = session.utxo(1_000, other_asset(), AddressType::P2wpkh, 3);
    let mut params = params_for(vec![], vec![Addressee::new(dest_script(0x31), 500, None)]);
    params.utxo_strategy = UtxoStrategy::Manual;
    params.used_utxos = vec![stray];
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(
        result.error,
        Some(TxError::MissingRecipientForAsset(other_asset().to_string()))
    );
    assert!(result.used_utxos.is_empty());
}

#[test]
fn insufficient_funds_reports_available_total() {
    let (network, session) = plain_session();
    let utxo = session.utxo(10_000, policy(), AddressType::P2wpkh, 1);
    let params = params_for(
        vec![utxo],
        vec![Addressee::new(dest_script(0x31), 50_000, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, Some(TxError::InsufficientFunds));
    assert_eq!(result.available_total.get(&policy()), Some(&10_000));
}

#[test]
fn dusty_change_is_donated_to_the_fee() {
    let (network, session) = plain_session();
    let utxo = session.utxo(51_000, policy(), AddressType::P2wpkh, 1);
    let params = params_for(
        vec![utxo],
        vec![Addressee::new(dest_script(0x31), 50_600, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();

    assert_eq!(result.error, None);
    assert_eq!(result.transaction.output.len(), 1);
    assert!(result.change.is_empty());
    // The whole remainder became fee.
    assert_eq!(result.fee, 51_000 - 50_600);
}

#[test]
fn fee_loop_converges_over_many_small_utxos() {
    let (network, session) = plain_session();
    let utxos: Vec<Utxo> = (0..12)
        .map(|i| session.utxo(10_000, policy(), AddressType::P2wpkh, i))
        .collect();
    let params = params_for(
        utxos,
        vec![Addressee::new(dest_script(0x31), 100_000, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, None);
    assert!(result.used_utxos.len() >= 11);
    let change = result.change.get(&policy()).unwrap();
    let total: u64 = result.used_utxos.iter().map(|u| u.satoshi).sum();
    assert_eq!(total, 100_000 + result.fee + change.amount);
}

#[test]
fn input_shuffle_is_reproducible_under_a_seed() {
    let network = Network::new(Chain::Plain, policy());
    // Each build gets its own session so the change pointer starts over
    // and both passes derive the same change address.
    let build = |seed: u64| {
        let session = TestSession::new(network);
        let utxos: Vec<Utxo> = (0..4)
            .map(|i| session.utxo(30_000, policy(), AddressType::P2wpkh, i))
            .collect();
        let mut params = params_for(
            utxos,
            vec![Addressee::new(dest_script(0x31), 100_000, None)],
        );
        params.randomize_inputs = Some(true);
        let mut rng = StdRng::seed_from_u64(seed);
        create_transaction(&network, &session, &mut rng, &params).unwrap()
    };
    let a = build(7);
    let b = build(7);
    let order = |r: &estuary_sdk::BuildResult| -> Vec<u32> {
        r.used_utxos.iter().map(|u| u.pointer).collect()
    };
    assert_eq!(order(&a), order(&b));
    assert_eq!(serialize(&a.transaction), serialize(&b.transaction));
}

#[test]
fn sequences_follow_rbf_setting_and_explicit_overrides() {
    let (network, mut session) = plain_session();
    let mut expired = session.utxo(60_000, policy(), AddressType::P2wpkh, 1);
    expired.sequence = Some(144);
    let normal = session.utxo(60_000, policy(), AddressType::P2wpkh, 2);
    let params = params_for(
        vec![expired, normal],
        vec![Addressee::new(dest_script(0x31), 100_000, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    let sequences: Vec<u32> = result
        .transaction
        .input
        .iter()
        .map(|i| i.sequence.to_consensus_u32())
        .collect();
    assert!(sequences.contains(&144));
    assert!(sequences.contains(&SEQUENCE_RBF));

    session.rbf = false;
    let normal = session.utxo(60_000, policy(), AddressType::P2wpkh, 2);
    let params = params_for(
        vec![normal],
        vec![Addressee::new(dest_script(0x31), 50_000, None)],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(
        result.transaction.input[0].sequence.to_consensus_u32(),
        SEQUENCE_NO_RBF
    );
}

#[test]
fn multi_asset_build_keeps_fee_output_last() {
    let (network, session) = liquid_session();
    let asset_utxo = session.utxo(1_000, other_asset(), AddressType::P2wpkh, 1);
    let policy_utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 2);
    let params = params_for(
        vec![asset_utxo, policy_utxo],
        vec![Addressee::new(dest_script(0x31), 400, Some(other_asset()))],
    );
    let result = create_transaction(&network, &session, &mut rng(), &params).unwrap();

    assert_eq!(result.error, None);
    // payment, asset change, policy change, fee
    assert_eq!(result.transaction.output.len(), 4);
    assert!(result.outputs.last().unwrap().is_fee);
    assert_eq!(result.change.get(&other_asset()).unwrap().amount, 600);
    let policy_change = result.change.get(&policy()).unwrap();
    assert_eq!(policy_change.amount, 100_000 - result.fee);
}

#[test]
fn partial_build_has_no_fee_or_change() {
    let (network, session) = liquid_session();
    let mut rng = rng();
    let utxo = session.utxo(1_000, other_asset(), AddressType::P2wpkh, 1);
    let receiver_sk = SecretKey::from_slice(&[0x52; 32]).unwrap();
    let mut addressee = Addressee::new(dest_script(0x33), 600, Some(other_asset()));
    addressee.blinding_pubkey = Some(PublicKey::from_secret_key(SECP256K1, &receiver_sk));
    let mut params = params_for(vec![], vec![addressee]);
    params.is_partial = true;
    params.utxo_strategy = UtxoStrategy::Manual;
    params.used_utxos = vec![utxo];
    let mut result = create_transaction(&network, &session, &mut rng, &params).unwrap();

    assert_eq!(result.error, None);
    assert!(result.is_partial);
    // One payment output, no fee placeholder, no change, no fee loop.
    assert_eq!(result.transaction.output.len(), 1);
    assert!(result.change.is_empty());
    assert_eq!(result.fee, 0);
    assert_eq!(result.used_utxos.len(), 1);

    // Partial blinding keeps the derived factors; the receiver can still
    // recover the payment.
    blind_transaction(&network, &session.signer, &mut rng, &[], &mut result).unwrap();
    let secrets = unblind_output(&result.transaction.output[0], &receiver_sk, 0).unwrap();
    assert_eq!(secrets.value, 600);
    assert_eq!(secrets.asset, other_asset());
}

#[test]
fn blinded_build_balances_and_unblinds() {
    let (network, session) = liquid_session();
    let mut rng = rng();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);
    let receiver_sk = SecretKey::from_slice(&[0x51; 32]).unwrap();
    let mut addressee = Addressee::new(dest_script(0x31), 50_000, None);
    addressee.blinding_pubkey = Some(PublicKey::from_secret_key(SECP256K1, &receiver_sk));
    let params = params_for(vec![utxo], vec![addressee]);
    let mut result = create_transaction(&network, &session, &mut rng, &params).unwrap();
    assert_eq!(result.error, None);

    blind_transaction(&network, &session.signer, &mut rng, &[], &mut result).unwrap();
    assert!(result.is_blinded);

    // payment + change confidential, fee explicit and last
    assert_eq!(result.transaction.output.len(), 3);
    let fee_out = result.transaction.output.last().unwrap();
    assert!(fee_out.value.is_explicit());

    let payment = &result.transaction.output[0];
    let secrets = unblind_output(payment, &receiver_sk, 0).unwrap();
    assert_eq!(secrets.value, 50_000);
    assert_eq!(secrets.asset, policy());

    let change = result.change.get(&policy()).unwrap();
    let change_idx = change.index.unwrap() as usize;
    let change_script = &result.outputs[change_idx].script_pubkey;
    let change_sk = session
        .signer
        .blinding_key_for_script(change_script)
        .unwrap();
    let change_out = &result.transaction.output[change_idx];
    let change_secrets = unblind_output(change_out, &change_sk, change_idx).unwrap();
    assert_eq!(change_secrets.value, change.amount);

    // Explicit balance under the commitments.
    assert_eq!(50_000 + change.amount + result.fee, 100_000);

    // Re-blinding an unchanged transaction keeps every proof.
    let before = serialize(&result.transaction);
    blind_transaction(&network, &session.signer, &mut rng, &[], &mut result).unwrap();
    assert_eq!(before, serialize(&result.transaction));
}

#[test]
fn multisig_and_csv_inputs_sign_into_their_witness_shapes() {
    let (network, session) = plain_session();
    let csv = session.utxo(60_000, policy(), AddressType::Csv, 5);
    let p2sh = session.utxo(60_000, policy(), AddressType::P2sh, 6);
    let p2wsh = session.utxo(60_000, policy(), AddressType::P2wsh, 7);
    let params = params_for(
        vec![csv, p2sh, p2wsh],
        vec![Addressee::new(dest_script(0x31), 150_000, None)],
    );
    let mut result = create_transaction(&network, &session, &mut rng(), &params).unwrap();
    assert_eq!(result.error, None);
    assert_eq!(result.used_utxos.len(), 3);
    sign_transaction(&network, &session, &session.signer, &mut result).unwrap();
    let tx = &result.transaction;

    let keys = |pointer: u32| {
        let path = session.subaccount_full_path(0, pointer, false);
        (
            session.signer.pubkey_for_path(&path),
            session.service.pubkey_for_path(&path),
        )
    };

    // csv: the user signature sits after the empty service slot on
    // plain chains, followed by the redeem script.
    let (user, service) = keys(5);
    let witness = &tx.input[0].witness.script_witness;
    assert_eq!(witness.len(), 3);
    assert!(witness[0].is_empty());
    assert_eq!(*witness[1].last().unwrap(), 0x01);
    assert_eq!(witness[2], csv_redeem(&service, &user, 144).to_bytes());
    let hash = signature_hash(
        &session,
        tx,
        0,
        &result.used_utxos[0],
        EcdsaSighashType::All,
    )
    .unwrap();
    let msg = Message::from_digest_slice(&hash).unwrap();
    let der = &witness[1][..witness[1].len() - 1];
    let sig = ecdsa::Signature::from_der(der).unwrap();
    SECP256K1.verify_ecdsa(&msg, &sig, &user).unwrap();

    // p2sh multisig: OP_0, empty service slot, user signature, redeem.
    let (user, service) = keys(6);
    assert!(tx.input[1].witness.script_witness.is_empty());
    let pushes: Vec<Vec<u8>> = tx.input[1]
        .script_sig
        .instructions()
        .map(|ins| match ins.unwrap() {
            Instruction::PushBytes(data) => data.to_vec(),
            other => panic!("unexpected instruction {other:?}"),
        })
        .collect();
    assert_eq!(pushes.len(), 4);
    assert!(pushes[0].is_empty() && pushes[1].is_empty());
    assert_eq!(*pushes[2].last().unwrap(), 0x01);
    assert_eq!(pushes[3], multisig_redeem(&service, &user).to_bytes());

    // p2wsh multisig: dummy, service slot, user signature, redeem.
    let (user, service) = keys(7);
    let witness = &tx.input[2].witness.script_witness;
    assert_eq!(witness.len(), 4);
    assert!(witness[0].is_empty() && witness[1].is_empty());
    assert_eq!(*witness[2].last().unwrap(), 0x01);
    assert_eq!(witness[3], multisig_redeem(&service, &user).to_bytes());
    let hash = signature_hash(
        &session,
        tx,
        2,
        &result.used_utxos[2],
        EcdsaSighashType::All,
    )
    .unwrap();
    let msg = Message::from_digest_slice(&hash).unwrap();
    let der = &witness[2][..witness[2].len() - 1];
    let sig = ecdsa::Signature::from_der(der).unwrap();
    SECP256K1.verify_ecdsa(&msg, &sig, &user).unwrap();
}

#[test]
fn scalar_offset_balances_a_preblinded_output() {
    let (network, session) = liquid_session();
    let mut rng = rng();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);

    // An output blinded by another party: we know its commitments and
    // asset blinder but not its value blinder, only the combined scalar.
    let abf = AssetBlindingFactor::from_slice(&[0x0a; 32]).unwrap();
    let vbf = ValueBlindingFactor::from_slice(&[0x0b; 32]).unwrap();
    let value = 700u64;
    let tag = policy().into_tag();
    let generator = Generator::new_blinded(SECP256K1, tag, abf.into_inner());
    let commitment = PedersenCommitment::new(SECP256K1, value, vbf.into_inner(), generator);
    // value * abf + vbf, the output's contribution to the balance.
    let scalar_vbf = ValueBlindingFactor::last(
        SECP256K1,
        0,
        AssetBlindingFactor::zero(),
        &[(value, abf, vbf)],
        &[],
    );
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(scalar_vbf.into_inner().as_ref());

    let mut addressee = Addressee::new(dest_script(0x34), value, None);
    addressee.commitments = Some(OutputCommitments {
        asset_commitment: generator,
        value_commitment: commitment,
        eph_public_key: None,
        asset_blinder: abf,
        amount_blinder: None,
        range_proof: None,
        blinding_nonce: None,
    });
    let mut params = params_for(vec![utxo], vec![addressee]);
    params.scalars = vec![scalar];
    let mut result = create_transaction(&network, &session, &mut rng, &params).unwrap();
    assert_eq!(result.error, None);

    blind_transaction(&network, &session.signer, &mut rng, &params.scalars, &mut result).unwrap();

    // The foreign output keeps its commitments and gains a surjection
    // proof over our input domain.
    let foreign = &result.transaction.output[0];
    assert_eq!(
        foreign.value,
        estuary_sdk::elements::confidential::Value::Confidential(commitment)
    );
    assert!(foreign.witness.surjection_proof.is_some());

    let change = result.change.get(&policy()).unwrap().clone();
    let idx = change.index.unwrap() as usize;
    let change_script = &result.outputs[idx].script_pubkey;
    let sk = session.signer.blinding_key_for_script(change_script).unwrap();
    let secrets = unblind_output(&result.transaction.output[idx], &sk, idx).unwrap();
    assert_eq!(secrets.value, change.amount);
    assert_eq!(value + change.amount + result.fee, 100_000);

    // The change blinder was solved against the scalar, which stands in
    // for the foreign output's unknown factors.
    let expected = ValueBlindingFactor::last(
        SECP256K1,
        change.amount,
        secrets.asset_bf,
        &[(
            100_000,
            AssetBlindingFactor::zero(),
            ValueBlindingFactor::zero(),
        )],
        &[(0, AssetBlindingFactor::zero(), scalar_vbf)],
    );
    assert_eq!(secrets.value_bf, expected);
}

#[test]
fn rbf_replacement_dominates_and_reuses_inputs() {
    let (network, session) = plain_session();
    let mut rng = rng();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);
    let outpoint = utxo.outpoint();
    let dest = dest_script(0x31);
    let params = params_for(vec![utxo], vec![Addressee::new(dest.clone(), 40_000, None)]);
    let mut first = create_transaction(&network, &session, &mut rng, &params).unwrap();
    assert_eq!(first.error, None);
    sign_transaction(&network, &session, &session.signer, &mut first).unwrap();
    session.insert_transaction(first.transaction.clone());

    let change = first.change.get(&policy()).unwrap().clone();
    let change_idx = change.index.unwrap();
    let change_address = change.address.clone().unwrap();
    let prev = PreviousTransaction {
        txid: first.transaction.txid(),
        fee: first.fee,
        fee_rate: first.calculated_fee_rate,
        can_rbf: true,
        can_cpfp: false,
        inputs: vec![PreviousIo {
            address_type: Some(AddressType::P2wpkh),
            subaccount: 0,
            pointer: 1,
            is_internal: false,
            is_relevant: true,
            satoshi: 100_000,
            script_pubkey: Script::new(),
            pt_idx: 0,
        }],
        outputs: vec![
            PreviousIo {
                address_type: None,
                subaccount: 0,
                pointer: 0,
                is_internal: false,
                is_relevant: false,
                satoshi: 40_000,
                script_pubkey: dest.clone(),
                pt_idx: 1 - change_idx,
            },
            PreviousIo {
                address_type: Some(AddressType::P2wpkh),
                subaccount: 0,
                pointer: change_address.pointer,
                is_internal: true,
                is_relevant: true,
                satoshi: change.amount,
                script_pubkey: change_address.script_pubkey.clone(),
                pt_idx: change_idx,
            },
        ],
    };

    let extra = session.utxo(20_000, policy(), AddressType::P2wpkh, 2);
    let mut params = params_for(vec![extra], vec![]);
    params.previous_transaction = Some(prev);
    params.fee_rate = Some(3000);
    let second = create_transaction(&network, &session, &mut rng, &params).unwrap();

    assert_eq!(second.error, None);
    assert!(second.is_rbf);
    assert_eq!(second.old_used_utxos.len(), 1);
    assert_eq!(second.old_used_utxos[0].outpoint(), outpoint);
    assert_eq!(second.old_fee, first.fee);
    assert!(second.fee > first.fee);
    // The payment is re-emitted as-is.
    assert!(second
        .addressees
        .iter()
        .any(|a| a.script_pubkey == dest && a.satoshi == 40_000));
    // Recovered sighash is remembered for re-signing.
    assert_eq!(second.old_used_utxos[0].user_sighash, Some(0x01));
}

#[test]
fn cpfp_builds_a_subsidized_redeposit() {
    let (network, session) = plain_session();
    let mut rng = rng();
    let utxo = session.utxo(100_000, policy(), AddressType::P2wpkh, 1);
    let params = params_for(
        vec![utxo],
        vec![Addressee::new(dest_script(0x31), 40_000, None)],
    );
    let first = create_transaction(&network, &session, &mut rng, &params).unwrap();
    assert_eq!(first.error, None);
    session.insert_transaction(first.transaction.clone());

    let change = first.change.get(&policy()).unwrap().clone();
    let change_idx = change.index.unwrap();
    let change_address = change.address.clone().unwrap();
    let prev = PreviousTransaction {
        txid: first.transaction.txid(),
        fee: first.fee,
        fee_rate: first.calculated_fee_rate,
        can_rbf: false,
        can_cpfp: true,
        inputs: vec![PreviousIo {
            address_type: Some(AddressType::P2wpkh),
            subaccount: 0,
            pointer: 1,
            is_internal: false,
            is_relevant: true,
            satoshi: 100_000,
            script_pubkey: Script::new(),
            pt_idx: 0,
        }],
        outputs: vec![
            PreviousIo {
                address_type: None,
                subaccount: 0,
                pointer: 0,
                is_internal: false,
                is_relevant: false,
                satoshi: 40_000,
                script_pubkey: dest_script(0x31),
                pt_idx: 1 - change_idx,
            },
            PreviousIo {
                address_type: Some(AddressType::P2wpkh),
                subaccount: 0,
                pointer: change_address.pointer,
                is_internal: true,
                is_relevant: true,
                satoshi: change.amount,
                script_pubkey: change_address.script_pubkey.clone(),
                pt_idx: change_idx,
            },
        ],
    };

    let mut params = params_for(vec![], vec![]);
    params.previous_transaction = Some(prev);
    params.fee_rate = Some(2000);
    let child = create_transaction(&network, &session, &mut rng, &params).unwrap();

    assert_eq!(child.error, None);
    assert!(child.is_cpfp);
    assert!(child.is_redeposit);
    assert!(child.send_all);
    assert_eq!(child.used_utxos.len(), 1);
    assert_eq!(
        child.used_utxos[0].outpoint(),
        (first.transaction.txid(), change_idx)
    );
    // The parent's shortfall at 2 sat/vb is folded into the child fee.
    let parent_target = (first.vsize * 2000 + 999) / 1000;
    assert_eq!(child.network_fee, parent_target.saturating_sub(first.fee));
    assert_eq!(child.transaction.output.len(), 1);
    assert_eq!(
        child.addressees[0].satoshi + child.fee,
        change.amount
    );
}
