//! Blocks and votes.
//!
//! A block binds a parent, a round, the proposer's sortition evaluation,
//! a coinbase, a batch of transfers, and the votes that witnessed its
//! parent. Its id is the SHA-256 of a canonical byte layout: fixed-width
//! big-endian integers and 32-byte ids in declaration order, u64-BE
//! length prefixes on every variable-length sequence. Verification that
//! needs chain context (parent lookup, stake at the parent, vote seeds)
//! lives in [`crate::consensus`].

use serde::{Deserialize, Serialize};

use crate::crypto::vrf::{self, Keypair, PublicKey};
use crate::ledger::{Output, Transfer, TransferId, Utro};
use crate::{Error, Hash, Result};

/// Content id of a block.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockId(pub Hash);

impl BlockId {
    /// The nil sentinel: the genesis parent.
    pub fn nil() -> Self {
        BlockId(crate::NIL_HASH)
    }

    pub fn is_nil(&self) -> bool {
        self.0 == crate::NIL_HASH
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::short_hex(&self.0))
    }
}

impl std::fmt::Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockId({})", self)
    }
}

/// A vote endorsing a block as the round's tip.
///
/// `(token, proof)` is the voter's VRF evaluation on the round seed — the
/// same evaluation sortition admission is judged on, so a vote carries
/// its own lottery ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub tip: BlockId,
    pub token: Hash,
    pub proof: Vec<u8>,
    pub pk: PublicKey,
}

impl Vote {
    /// Cast a vote for `tip` under the given round seed.
    pub fn new(keypair: &Keypair, tip: BlockId, seed: &Hash) -> Self {
        let (token, proof) = keypair.prove(seed);
        Vote {
            tip,
            token,
            proof,
            pk: keypair.public,
        }
    }

    /// Content id: `SHA256(token ‖ proof ‖ pk ‖ tip)`.
    pub fn id(&self) -> Hash {
        crate::sha256_concat(&[&self.token, &self.proof, &self.pk.0, &self.tip.0])
    }

    /// Check the VRF evaluation against the round seed.
    pub fn verify_signature(&self, seed: &Hash) -> Result<()> {
        if vrf::verify(&self.pk, seed, &self.token, &self.proof) {
            Ok(())
        } else {
            Err(Error::VoteMalformed)
        }
    }
}

/// A proposed block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub prev: BlockId,
    pub round: u64,
    /// Proposer's VRF token on `seed_for(round, prev.ticket)`.
    pub ticket: Hash,
    pub proof: Vec<u8>,
    pub pk: PublicKey,
    pub coinbase: Transfer,
    pub transfers: Vec<Transfer>,
    /// Votes witnessing `prev` at round `round − 1`.
    pub votes: Vec<Vote>,
}

impl Block {
    /// Mint a block extending `prev`.
    pub fn mint(
        keypair: &Keypair,
        prev: BlockId,
        round: u64,
        seed: &Hash,
        reward: u64,
        transfers: Vec<Transfer>,
        votes: Vec<Vote>,
    ) -> Self {
        let (ticket, proof) = keypair.prove(seed);
        Block {
            prev,
            round,
            ticket,
            proof,
            pk: keypair.public,
            coinbase: Transfer::coinbase(keypair, reward, round),
            transfers,
            votes,
        }
    }

    /// The genesis block: nil parent, round zero, nil proposer, and a
    /// coinbase holding the initial allocations. Unsigned — genesis is
    /// agreed out of band, not won by sortition.
    pub fn genesis(allocations: Vec<Output>) -> Self {
        let sender = PublicKey::nil();
        let body = Transfer::body_hash(&[], &allocations, &sender);
        let coinbase = Transfer {
            inputs: Vec::new(),
            outputs: allocations,
            sender,
            proof: Vec::new(),
            id: TransferId(body),
        };
        Block {
            prev: BlockId::nil(),
            round: 0,
            ticket: crate::NIL_HASH,
            proof: Vec::new(),
            pk: PublicKey::nil(),
            coinbase,
            transfers: Vec::new(),
            votes: Vec::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.prev.is_nil() && self.round == 0
    }

    /// Content id: SHA-256 over the canonical byte layout.
    pub fn id(&self) -> BlockId {
        BlockId(crate::sha256_concat(&[&self.canonical_bytes()]))
    }

    /// Canonical byte layout of every field, in declaration order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(&self.prev.0);
        bytes.extend_from_slice(&self.round.to_be_bytes());
        bytes.extend_from_slice(&self.ticket);
        append_bytes(&mut bytes, &self.proof);
        bytes.extend_from_slice(&self.pk.0);
        append_transfer(&mut bytes, &self.coinbase);
        bytes.extend_from_slice(&(self.transfers.len() as u64).to_be_bytes());
        for tr in &self.transfers {
            append_transfer(&mut bytes, tr);
        }
        bytes.extend_from_slice(&(self.votes.len() as u64).to_be_bytes());
        for vote in &self.votes {
            append_vote(&mut bytes, vote);
        }
        bytes
    }

    /// Check the proposer's VRF evaluation against the round seed.
    pub fn verify_signature(&self, seed: &Hash) -> Result<()> {
        if vrf::verify(&self.pk, seed, &self.ticket, &self.proof) {
            Ok(())
        } else {
            Err(Error::ProposalMalformed("bad proposer vrf".into()))
        }
    }

    /// Validate the coinbase shape and amount.
    pub fn verify_coinbase(&self, reward: u64) -> Result<()> {
        if self.coinbase.outputs.len() != 1 {
            return Err(Error::ProposalMalformed("coinbase output count".into()));
        }
        let out = &self.coinbase.outputs[0];
        if out.amount != reward {
            return Err(Error::ProposalMalformed("coinbase amount".into()));
        }
        if out.receiver != self.pk {
            return Err(Error::ProposalMalformed("coinbase payee".into()));
        }
        Ok(())
    }

    /// Apply the block body — coinbase first, then each transfer in
    /// listed order — to `utro`. Any failure fails the whole block with
    /// `utro` untouched.
    pub fn apply_body(&self, utro: &Utro, deposit_ttl: u64) -> Result<Utro> {
        let mut next = utro.clone();
        next.apply(&self.coinbase, self.round, deposit_ttl, true, false)?;
        for tr in &self.transfers {
            next.apply(tr, self.round, deposit_ttl, false, false)?;
        }
        Ok(next)
    }
}

fn append_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn append_transfer(buf: &mut Vec<u8>, tr: &Transfer) {
    buf.extend_from_slice(&(tr.inputs.len() as u64).to_be_bytes());
    for input in &tr.inputs {
        buf.extend_from_slice(&input.transfer.0);
        buf.extend_from_slice(&input.index.to_be_bytes());
    }
    buf.extend_from_slice(&(tr.outputs.len() as u64).to_be_bytes());
    for output in &tr.outputs {
        buf.extend_from_slice(&output.amount.to_be_bytes());
        buf.extend_from_slice(&output.receiver.0);
        buf.push(output.is_deposit as u8);
        buf.extend_from_slice(&output.unlocks_after.to_be_bytes());
    }
    buf.extend_from_slice(&tr.sender.0);
    append_bytes(buf, &tr.proof);
    buf.extend_from_slice(&tr.id.0);
}

fn append_vote(buf: &mut Vec<u8>, vote: &Vote) {
    buf.extend_from_slice(&vote.tip.0);
    buf.extend_from_slice(&vote.token);
    append_bytes(buf, &vote.proof);
    buf.extend_from_slice(&vote.pk.0);
}
