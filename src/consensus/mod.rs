//! Consensus rules that need chain context: full block and vote
//! verification, and block strength.
//!
//! A block's local strength is the proposer's priority plus the
//! priorities of its embedded votes; votes visibly reinforce ancestors
//! without any global state. Strength is what [`crate::chain::Chain`]
//! ranks branches by.

pub mod buffer;
pub mod engine;

use bigdecimal::BigDecimal;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::block::{Block, Vote};
use crate::chain::Chain;
use crate::config::EngineConfig;
use crate::crypto::threshold;
use crate::ledger::Utro;
use crate::{sortition, Error, Hash, Result};

/// Outcome of a successful [`verify_block`]: what the caller needs to
/// append and adopt the block.
pub struct Verified {
    /// The proposer's own priority for the block's round.
    pub priority: BigUint,
    /// Local strength: proposer priority plus embedded vote priorities.
    pub strength: BigUint,
    /// Ledger state after applying the block body.
    pub utro: Utro,
}

/// Fully verify a block against the chain store.
///
/// Checks, in order: parent presence (`PrevMissing` routes the caller to
/// the out-of-order buffer), round monotonicity, proposer sortition on
/// the parent's stake distribution, coinbase, body application, and the
/// embedded votes witnessing the parent. Blocks extending genesis are
/// exempt from the witness threshold — there is no round before them to
/// vote in.
pub fn verify_block(block: &Block, chain: &Chain, config: &EngineConfig) -> Result<Verified> {
    if block.is_genesis() {
        return Err(Error::ProposalMalformed("unexpected genesis".into()));
    }
    if chain.contains(&block.id()) {
        return Err(Error::BlockExists);
    }
    let prev = chain
        .read(&block.prev)
        .ok_or(Error::PrevMissing(block.prev))?;
    if block.round <= prev.round {
        return Err(Error::ProposalMalformed("round not increasing".into()));
    }

    let prev_utro = chain.utro_at(&block.prev, config.deposit_ttl)?;
    let total = prev_utro.total_stake();
    let stake = prev_utro.stake_of(&block.pk);
    let f = config.f_value()?;

    let seed = sortition::seed_for(block.round, &prev.ticket);
    block.verify_signature(&seed)?;
    if !threshold::qualifies(stake, total, &f, &block.ticket) {
        return Err(Error::BadSortition);
    }
    block.verify_coinbase(config.block_reward)?;
    let utro = block.apply_body(&prev_utro, config.deposit_ttl)?;

    let priority = priority_of(&block.ticket, stake);
    let strength = &priority + verify_embedded_votes(block, prev, chain, &f, config)?;

    Ok(Verified {
        priority,
        strength,
        utro,
    })
}

/// Verify the votes a block embeds for its parent; returns their summed
/// priority.
fn verify_embedded_votes(
    block: &Block,
    prev: &Block,
    chain: &Chain,
    f: &BigDecimal,
    config: &EngineConfig,
) -> Result<BigUint> {
    if chain.is_genesis(&block.prev) {
        if !block.votes.is_empty() {
            return Err(Error::VoteMalformed);
        }
        return Ok(BigUint::zero());
    }
    if block.votes.len() < config.witness_threshold {
        return Err(Error::ProposalMalformed("not enough witnesses".into()));
    }

    // Votes for `prev` were cast under the seed of `prev`'s own round,
    // judged on the stake distribution at `prev`'s parent.
    let grandparent = chain
        .read(&prev.prev)
        .ok_or(Error::PrevMissing(prev.prev))?;
    let vote_seed = sortition::seed_for(prev.round, &grandparent.ticket);
    let vote_utro = chain.utro_at(&prev.prev, config.deposit_ttl)?;
    let total = vote_utro.total_stake();

    let mut sum = BigUint::zero();
    let mut voters = std::collections::HashSet::new();
    for vote in &block.votes {
        if vote.tip != block.prev {
            return Err(Error::VoteMalformed);
        }
        if !voters.insert(vote.pk) {
            return Err(Error::DoubleVote);
        }
        vote.verify_signature(&vote_seed)?;
        let stake = vote_utro.stake_of(&vote.pk);
        if !threshold::qualifies(stake, total, f, &vote.token) {
            return Err(Error::BadSortition);
        }
        sum += priority_of(&vote.token, stake);
    }
    Ok(sum)
}

/// Verify a standalone vote against the chain store.
///
/// Returns the voter's priority and the round of the endorsed block.
/// `PrevMissing` means the endorsed block has not arrived yet.
pub fn verify_vote(vote: &Vote, chain: &Chain, config: &EngineConfig) -> Result<(BigUint, u64)> {
    let tip = chain.read(&vote.tip).ok_or(Error::PrevMissing(vote.tip))?;
    if tip.is_genesis() {
        return Err(Error::VoteMalformed);
    }
    let parent = chain.read(&tip.prev).ok_or(Error::PrevMissing(tip.prev))?;

    let seed = sortition::seed_for(tip.round, &parent.ticket);
    vote.verify_signature(&seed)?;

    let utro = chain.utro_at(&tip.prev, config.deposit_ttl)?;
    let total = utro.total_stake();
    let stake = utro.stake_of(&vote.pk);
    let f = config.f_value()?;
    if !threshold::qualifies(stake, total, &f, &vote.token) {
        return Err(Error::BadSortition);
    }
    Ok((priority_of(&vote.token, stake), tip.round))
}

/// Priority of a sortition token held with `stake` units: the maximum
/// sub-draw, as an integer. Zero stake has zero priority.
pub fn priority_of(token: &Hash, stake: u64) -> BigUint {
    if stake == 0 {
        return BigUint::zero();
    }
    let (best, _) = sortition::best_sub_draw(token, stake);
    BigUint::from_bytes_be(&best)
}
