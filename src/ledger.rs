//! Transfers and the unspent-output set (UTRO).
//!
//! A transfer consumes outputs it owns in the tip's UTRO and produces new
//! ones; the embedded VRF evaluation over the transfer body doubles as
//! both signature and content id. The UTRO is mutated exclusively through
//! [`Utro::apply`], which is transactional: either every input is
//! consumed and every output inserted, or nothing changes.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::crypto::vrf::{self, Keypair, PublicKey};
use crate::{Error, Hash, Result};

/// Content id of a transfer: the VRF token over the transfer body.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TransferId(pub Hash);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::short_hex(&self.0))
    }
}

impl std::fmt::Debug for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransferId({})", self)
    }
}

/// Reference to one output of a transfer.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OutputRef {
    pub transfer: TransferId,
    pub index: u64,
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.transfer, self.index)
    }
}

impl std::fmt::Debug for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutputRef({})", self)
    }
}

/// A transfer output. Outputs flagged `is_deposit` are stake bonds: they
/// count toward sortition weight while locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub amount: u64,
    pub receiver: PublicKey,
    pub is_deposit: bool,
    /// The output cannot be spent in any round `r ≤ unlocks_after`.
    pub unlocks_after: u64,
}

/// A signed transfer of value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub inputs: Vec<OutputRef>,
    pub outputs: Vec<Output>,
    pub sender: PublicKey,
    /// VRF proof over [`Transfer::body_hash`] under the sender's key.
    pub proof: Vec<u8>,
    /// VRF token over the body hash; doubles as the content id.
    pub id: TransferId,
}

impl Transfer {
    /// Build and sign a transfer.
    pub fn new(inputs: Vec<OutputRef>, outputs: Vec<Output>, keypair: &Keypair) -> Self {
        let sender = keypair.public;
        let body = Self::body_hash(&inputs, &outputs, &sender);
        let (token, proof) = keypair.prove(&body);
        Transfer {
            inputs,
            outputs,
            sender,
            proof,
            id: TransferId(token),
        }
    }

    /// Build the input-less coinbase transfer paying `reward` to the
    /// proposer. The reward output matures one round later
    /// (`unlocks_after = round`), which also makes the coinbase body — and
    /// therefore its id — unique per round.
    pub fn coinbase(keypair: &Keypair, reward: u64, round: u64) -> Self {
        let output = Output {
            amount: reward,
            receiver: keypair.public,
            is_deposit: false,
            unlocks_after: round,
        };
        Self::new(Vec::new(), vec![output], keypair)
    }

    /// Canonical hash of every field except `proof` and `id`: fixed-width
    /// big-endian integers, u64-BE length prefixes on the sequences.
    pub fn body_hash(inputs: &[OutputRef], outputs: &[Output], sender: &PublicKey) -> Hash {
        let mut bytes = Vec::with_capacity(8 + inputs.len() * 40 + 8 + outputs.len() * 49 + 32);
        bytes.extend_from_slice(&(inputs.len() as u64).to_be_bytes());
        for input in inputs {
            bytes.extend_from_slice(&input.transfer.0);
            bytes.extend_from_slice(&input.index.to_be_bytes());
        }
        bytes.extend_from_slice(&(outputs.len() as u64).to_be_bytes());
        for output in outputs {
            bytes.extend_from_slice(&output.amount.to_be_bytes());
            bytes.extend_from_slice(&output.receiver.0);
            bytes.push(output.is_deposit as u8);
            bytes.extend_from_slice(&output.unlocks_after.to_be_bytes());
        }
        bytes.extend_from_slice(&sender.0);
        crate::sha256_concat(&[&bytes])
    }

    /// The mempool dedup nonce: the body hash, unique per
    /// sender-and-content.
    pub fn nonce(&self) -> Hash {
        Self::body_hash(&self.inputs, &self.outputs, &self.sender)
    }

    /// Check the embedded VRF signature.
    pub fn verify_signature(&self) -> Result<()> {
        let body = self.nonce();
        if vrf::verify(&self.sender, &body, &self.id.0, &self.proof) {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }

    /// Reference to the output at `index`.
    pub fn output_ref(&self, index: u64) -> OutputRef {
        OutputRef {
            transfer: self.id,
            index,
        }
    }

    /// Sum of output amounts, overflow-checked.
    pub fn output_sum(&self) -> Result<u64> {
        let mut sum: u64 = 0;
        for output in &self.outputs {
            sum = sum.checked_add(output.amount).ok_or(Error::AmountOverflow)?;
        }
        Ok(sum)
    }
}

/// The unspent-transfer-output set under a given tip.
#[derive(Clone, Debug, Default)]
pub struct Utro {
    outputs: HashMap<OutputRef, Output>,
}

impl Utro {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, r: &OutputRef) -> Option<&Output> {
        self.outputs.get(r)
    }

    pub fn contains(&self, r: &OutputRef) -> bool {
        self.outputs.contains_key(r)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Total amount owned by `pk`, spendable or not.
    pub fn balance_of(&self, pk: &PublicKey) -> u64 {
        self.outputs
            .values()
            .filter(|o| &o.receiver == pk)
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }

    /// Sortition weight of `pk`: the sum of its deposit outputs.
    pub fn stake_of(&self, pk: &PublicKey) -> u64 {
        self.outputs
            .values()
            .filter(|o| o.is_deposit && &o.receiver == pk)
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }

    /// Total deposited stake across all participants.
    pub fn total_stake(&self) -> u64 {
        self.outputs
            .values()
            .filter(|o| o.is_deposit)
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }

    /// Validate and apply a transfer at `round`.
    ///
    /// Transactional: validation runs to completion before any mutation.
    /// With `dry_run` the validation result is returned and the set is
    /// left untouched. The genesis allocation (a round-zero coinbase from
    /// the nil sender) is exempt from the signature check.
    pub fn apply(
        &mut self,
        tr: &Transfer,
        round: u64,
        deposit_ttl: u64,
        coinbase: bool,
        dry_run: bool,
    ) -> Result<()> {
        if tr.outputs.is_empty() {
            return Err(Error::EmptyTransfer);
        }
        if !coinbase && tr.inputs.is_empty() {
            return Err(Error::EmptyTransfer);
        }
        if coinbase && !tr.inputs.is_empty() {
            return Err(Error::ProposalMalformed("coinbase with inputs".into()));
        }

        let genesis_allocation = coinbase && tr.sender.is_nil() && round == 0;
        if !genesis_allocation {
            tr.verify_signature()?;
        }

        let mut consumed = HashSet::new();
        let mut in_sum: u64 = 0;
        for input in &tr.inputs {
            if !consumed.insert(*input) {
                // Same output referenced twice within one transfer.
                return Err(Error::UnspendableOutput(*input));
            }
            let output = self
                .outputs
                .get(input)
                .ok_or(Error::UnspendableOutput(*input))?;
            if output.receiver != tr.sender {
                return Err(Error::NotOwner);
            }
            if round <= output.unlocks_after {
                return Err(Error::TimeLocked {
                    unlocks_after: output.unlocks_after,
                });
            }
            in_sum = in_sum.checked_add(output.amount).ok_or(Error::AmountOverflow)?;
        }

        let out_sum = tr.output_sum()?;
        if !coinbase && in_sum != out_sum {
            return Err(Error::AmountMismatch {
                input: in_sum,
                output: out_sum,
            });
        }

        for output in &tr.outputs {
            if output.is_deposit {
                if output.unlocks_after <= round {
                    return Err(Error::DepositNotLocked);
                }
                let lockup = output.unlocks_after - round;
                // Genesis allocations are agreed out of band and may be
                // locked for longer than the ttl.
                if !genesis_allocation && lockup > deposit_ttl {
                    return Err(Error::DepositTooLong {
                        lockup,
                        ttl: deposit_ttl,
                    });
                }
            } else if output.unlocks_after > round {
                return Err(Error::DepositNotMarked);
            }
        }

        if dry_run {
            return Ok(());
        }

        for input in &tr.inputs {
            self.outputs.remove(input);
        }
        for (idx, output) in tr.outputs.iter().enumerate() {
            self.outputs.insert(tr.output_ref(idx as u64), *output);
        }
        Ok(())
    }
}
