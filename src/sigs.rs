//! Extracting signatures back out of finalized inputs.
//!
//! Replacement builds carry over already-signed inputs and must verify
//! them against the prior transaction. Each address type stores its
//! signatures differently, so decoding is per-type.

use elements::script::Instruction;
use elements::Script;

use crate::address_type::AddressType;
use crate::error::{Error, Result};
use crate::network::Chain;

/// A DER signature split from its trailing sighash byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSignature {
    pub der: Vec<u8>,
    pub sighash: u32,
}

impl InputSignature {
    fn from_push(bytes: &[u8], index: usize) -> Result<Self> {
        match bytes.split_last() {
            Some((&sighash, der)) if !der.is_empty() => Ok(InputSignature {
                der: der.to_vec(),
                sighash: sighash as u32,
            }),
            _ => Err(Error::MalformedWitness(index)),
        }
    }
}

/// Collect the data pushes of a scriptsig, rejecting anything else
/// except a leading OP_0 (the multisig CHECKMULTISIG dummy).
fn scriptsig_pushes(script: &Script, index: usize) -> Result<Vec<Vec<u8>>> {
    let mut pushes = Vec::new();
    for (i, instruction) in script.instructions().enumerate() {
        match instruction.map_err(|_| Error::MalformedScriptSig(index))? {
            Instruction::PushBytes(data) => pushes.push(data.to_vec()),
            Instruction::Op(op) if i == 0 && op == elements::opcodes::all::OP_PUSHBYTES_0 => {
                pushes.push(Vec::new())
            }
            Instruction::Op(_) => return Err(Error::MalformedScriptSig(index)),
        }
    }
    Ok(pushes)
}

/// Signatures of one input, in user-first order, plus the sighash they
/// commit to.
#[derive(Debug, Clone)]
pub struct DecodedInput {
    /// `[user]` for single-sig, `[user, service]` for multisig.
    pub signatures: Vec<InputSignature>,
    pub public_key: Option<Vec<u8>>,
    pub redeem_script: Option<Script>,
}

impl DecodedInput {
    pub fn user_signature(&self) -> &InputSignature {
        &self.signatures[0]
    }

    pub fn sighash(&self) -> u32 {
        self.signatures[0].sighash
    }
}

/// Decode the signatures of input `index` of a finalized transaction.
///
/// CSV inputs on confidential chains carry the signatures in the
/// opposite order to multisig, so the chain matters.
pub fn decode_input(
    chain: Chain,
    address_type: AddressType,
    script_sig: &Script,
    witness: &[Vec<u8>],
    index: usize,
) -> Result<DecodedInput> {
    match address_type {
        AddressType::P2pkh => {
            // scriptsig: <sig> <pubkey>
            let pushes = scriptsig_pushes(script_sig, index)?;
            if pushes.len() != 2 {
                return Err(Error::MalformedScriptSig(index));
            }
            Ok(DecodedInput {
                signatures: vec![InputSignature::from_push(&pushes[0], index)?],
                public_key: Some(pushes[1].clone()),
                redeem_script: None,
            })
        }
        AddressType::P2sh => {
            // scriptsig: OP_0 <service_sig> <user_sig> <redeem_script>
            let pushes = scriptsig_pushes(script_sig, index)?;
            if pushes.len() != 4 || !pushes[0].is_empty() {
                return Err(Error::MalformedScriptSig(index));
            }
            Ok(DecodedInput {
                signatures: vec![
                    InputSignature::from_push(&pushes[2], index)?,
                    InputSignature::from_push(&pushes[1], index)?,
                ],
                public_key: None,
                redeem_script: Some(Script::from(pushes[3].clone())),
            })
        }
        AddressType::P2wpkh | AddressType::P2shP2wpkh => {
            // witness: <sig> <pubkey>
            if witness.len() != 2 {
                return Err(Error::MalformedWitness(index));
            }
            Ok(DecodedInput {
                signatures: vec![InputSignature::from_push(&witness[0], index)?],
                public_key: Some(witness[1].clone()),
                redeem_script: None,
            })
        }
        AddressType::P2wsh => {
            // witness: <> <service_sig> <user_sig> <redeem_script>
            if witness.len() != 4 {
                return Err(Error::MalformedWitness(index));
            }
            Ok(DecodedInput {
                signatures: vec![
                    InputSignature::from_push(&witness[2], index)?,
                    InputSignature::from_push(&witness[1], index)?,
                ],
                public_key: None,
                redeem_script: Some(Script::from(witness[3].clone())),
            })
        }
        AddressType::Csv => {
            // witness: <service_sig> <user_sig> <redeem_script>, with the
            // two signatures swapped on confidential chains.
            if witness.len() != 3 {
                return Err(Error::MalformedWitness(index));
            }
            let (user, service) = match chain {
                Chain::Confidential => (&witness[0], &witness[1]),
                Chain::Plain => (&witness[1], &witness[0]),
            };
            Ok(DecodedInput {
                signatures: vec![
                    InputSignature::from_push(user, index)?,
                    InputSignature::from_push(service, index)?,
                ],
                public_key: None,
                redeem_script: Some(Script::from(witness[2].clone())),
            })
        }
    }
}
