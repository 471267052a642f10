//! Software session and signer fixtures.
//!
//! A deterministic in-memory wallet good enough to exercise the whole
//! build/blind/sign pipeline without a network or a device: keys are
//! derived from a fixed seed, change addresses count up from zero, and
//! prior transactions are registered by hand.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use elements::hashes::{sha256, Hash};
use elements::opcodes::all as opcodes;
use elements::script::Builder;
use elements::secp256k1_zkp::{ecdsa, Message, PublicKey, SecretKey, SECP256K1};
use elements::{AssetId, Script, Transaction, Txid};

use crate::address_type::AddressType;
use crate::error::{Error, Result};
use crate::model::Utxo;
use crate::network::Network;
use crate::script;
use crate::session::{ChangeAddress, Session, Signer};

/// 2-of-2 redeem script, service key first.
pub fn multisig_redeem(service: &PublicKey, user: &PublicKey) -> Script {
    Builder::new()
        .push_int(2)
        .push_slice(&service.serialize())
        .push_slice(&user.serialize())
        .push_int(2)
        .push_opcode(opcodes::OP_CHECKMULTISIG)
        .into_script()
}

/// CSV recovery script: service+user before expiry, user alone after
/// `blocks` confirmations.
pub fn csv_redeem(service: &PublicKey, user: &PublicKey, blocks: u32) -> Script {
    Builder::new()
        .push_opcode(opcodes::OP_IF)
        .push_slice(&service.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_opcode(opcodes::OP_ELSE)
        .push_int(i64::from(blocks))
        .push_opcode(opcodes::OP_CSV)
        .push_opcode(opcodes::OP_DROP)
        .push_opcode(opcodes::OP_ENDIF)
        .push_slice(&user.serialize())
        .push_opcode(opcodes::OP_CHECKSIG)
        .into_script()
}

/// Deterministic software signer seeded with 32 bytes.
#[derive(Clone)]
pub struct TestSigner {
    seed: [u8; 32],
}

impl TestSigner {
    pub fn new(seed: [u8; 32]) -> Self {
        TestSigner { seed }
    }

    pub fn secret_for_path(&self, path: &[u32]) -> SecretKey {
        let mut engine = sha256::Hash::engine();
        use elements::hashes::HashEngine;
        engine.input(&self.seed);
        for step in path {
            engine.input(&step.to_le_bytes());
        }
        SecretKey::from_slice(sha256::Hash::from_engine(engine).as_ref())
            .expect("derived key in range")
    }

    pub fn pubkey_for_path(&self, path: &[u32]) -> PublicKey {
        PublicKey::from_secret_key(SECP256K1, &self.secret_for_path(path))
    }

    fn master_blind(&self) -> [u8; 64] {
        let a = sha256::Hash::hash(&[&self.seed[..], b"blind-lo"].concat());
        let b = sha256::Hash::hash(&[&self.seed[..], b"blind-hi"].concat());
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(a.as_ref());
        out[32..].copy_from_slice(b.as_ref());
        out
    }
}

impl Signer for TestSigner {
    fn sign_hash(&self, path: &[u32], hash: &[u8; 32]) -> Result<ecdsa::Signature> {
        let msg = Message::from_digest_slice(hash)?;
        Ok(SECP256K1.sign_ecdsa_low_r(&msg, &self.secret_for_path(path)))
    }

    fn master_blinding_key(&self) -> Result<[u8; 64]> {
        Ok(self.master_blind())
    }

    fn blinding_key_for_script(&self, script_pubkey: &Script) -> Result<SecretKey> {
        let digest =
            sha256::Hash::hash(&[&self.master_blind()[..], script_pubkey.as_bytes()].concat());
        SecretKey::from_slice(digest.as_ref())
            .map_err(|_| Error::InvalidState("blinding key out of range"))
    }
}

/// In-memory session over a [`TestSigner`] (user) and a second fixed
/// cosigner for the multisig types.
pub struct TestSession {
    pub network: Network,
    pub signer: TestSigner,
    pub service: TestSigner,
    pub fee_rate: u64,
    pub min_rate: u64,
    pub dust: u64,
    pub height: u32,
    pub rbf: bool,
    change_pointer: Cell<u32>,
    transactions: RefCell<HashMap<Txid, Transaction>>,
}

impl TestSession {
    pub fn new(network: Network) -> Self {
        TestSession {
            network,
            signer: TestSigner::new([0x42; 32]),
            service: TestSigner::new([0x24; 32]),
            fee_rate: 1000,
            min_rate: 1000,
            dust: 546,
            height: 700_000,
            rbf: true,
            change_pointer: Cell::new(0),
            transactions: RefCell::new(HashMap::new()),
        }
    }

    /// Register a prior transaction so bump reconstruction can fetch it.
    pub fn insert_transaction(&self, tx: Transaction) {
        self.transactions.borrow_mut().insert(tx.txid(), tx);
    }

    /// A wallet UTXO at a synthetic outpoint derived from `pointer`.
    pub fn utxo(
        &self,
        satoshi: u64,
        asset: AssetId,
        address_type: AddressType,
        pointer: u32,
    ) -> Utxo {
        let digest = sha256::Hash::hash(&pointer.to_le_bytes());
        let txhash = Txid::from_slice(digest.as_ref()).expect("32 bytes");
        Utxo::new(txhash, 0, satoshi, asset, address_type, 0, pointer, false)
    }

    fn keys(&self, utxo: &Utxo) -> (PublicKey, PublicKey) {
        let path = self.subaccount_full_path(utxo.subaccount, utxo.pointer, utxo.is_internal);
        (
            self.signer.pubkey_for_path(&path),
            self.service.pubkey_for_path(&path),
        )
    }
}

impl Session for TestSession {
    fn output_script_from_utxo(&self, utxo: &Utxo) -> Result<Script> {
        let (user, service) = self.keys(utxo);
        Ok(match utxo.address_type {
            AddressType::P2pkh | AddressType::P2wpkh | AddressType::P2shP2wpkh => {
                script::p2pkh_scriptpubkey(&user)
            }
            AddressType::P2sh | AddressType::P2wsh => multisig_redeem(&service, &user),
            AddressType::Csv => {
                let blocks = if utxo.subtype == 0 { 144 } else { utxo.subtype };
                csv_redeem(&service, &user, blocks)
            }
        })
    }

    fn pubkeys_from_utxo(&self, utxo: &Utxo) -> Result<Vec<PublicKey>> {
        let (user, service) = self.keys(utxo);
        Ok(vec![user, service])
    }

    fn subaccount_full_path(&self, subaccount: u32, pointer: u32, is_internal: bool) -> Vec<u32> {
        vec![subaccount, u32::from(is_internal), pointer]
    }

    fn change_address(&self, subaccount: u32) -> Result<ChangeAddress> {
        let pointer = self.change_pointer.get();
        self.change_pointer.set(pointer + 1);
        let path = self.subaccount_full_path(subaccount, pointer, true);
        let script_pubkey = script::p2wpkh_program(&self.signer.pubkey_for_path(&path));
        let blinding_pubkey = if self.network.is_confidential() {
            let sk = self.signer.blinding_key_for_script(&script_pubkey)?;
            Some(PublicKey::from_secret_key(SECP256K1, &sk))
        } else {
            None
        };
        Ok(ChangeAddress {
            script_pubkey,
            blinding_pubkey,
            subaccount,
            pointer,
            is_internal: true,
        })
    }

    fn default_fee_rate(&self) -> u64 {
        self.fee_rate
    }

    fn min_fee_rate(&self) -> u64 {
        self.min_rate
    }

    fn dust_threshold(&self, _asset: &AssetId) -> u64 {
        self.dust
    }

    fn block_height(&self) -> u32 {
        self.height
    }

    fn raw_transaction(&self, txid: &Txid) -> Result<Transaction> {
        self.transactions
            .borrow()
            .get(txid)
            .cloned()
            .ok_or_else(|| Error::Session(format!("unknown transaction {txid}")))
    }

    fn rbf_enabled(&self) -> bool {
        self.rbf
    }
}
