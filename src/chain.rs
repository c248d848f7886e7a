//! Block store and strongest-chain selection.
//!
//! The store holds an append-only DAG of blocks keyed by id, with a
//! parallel map of per-block local strength. Exactly one block is the
//! *tip*: the block with the greatest cumulative strength from genesis.
//! A new block on a previously weaker branch can move the tip — a reorg —
//! which is reported to the caller as a [`TipChange`] so ledger state can
//! be rolled to the new branch.
//!
//! Cumulative strength is recomputed by walking to genesis on demand; it
//! is deliberately uncached, since callers touch it once per append.

use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::info;

use crate::block::{Block, BlockId};
use crate::ledger::Utro;
use crate::{Error, Result};

/// A tip movement reported by [`Chain::append`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TipChange {
    pub old_tip: BlockId,
    pub new_tip: BlockId,
}

pub struct Chain {
    blocks: HashMap<BlockId, Block>,
    local_strength: HashMap<BlockId, BigUint>,
    genesis: HashSet<BlockId>,
    tip: BlockId,
}

impl Chain {
    /// Create a store seeded with a genesis block (strength zero).
    pub fn new(genesis_block: Block) -> Self {
        let id = genesis_block.id();
        let mut blocks = HashMap::new();
        blocks.insert(id, genesis_block);
        let mut local_strength = HashMap::new();
        local_strength.insert(id, BigUint::zero());
        let mut genesis = HashSet::new();
        genesis.insert(id);
        Chain {
            blocks,
            local_strength,
            genesis,
            tip: id,
        }
    }

    pub fn tip(&self) -> BlockId {
        self.tip
    }

    /// The tip block itself. The tip id always resolves.
    pub fn tip_block(&self) -> &Block {
        &self.blocks[&self.tip]
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn read(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_genesis(&self, id: &BlockId) -> bool {
        self.genesis.contains(id)
    }

    /// Insert a block with its local strength and re-choose the tip.
    ///
    /// The tip moves only when the new block's cumulative strength
    /// strictly exceeds the current tip's; ties keep the current tip.
    /// Returns the tip delta when it moved.
    pub fn append(&mut self, block: Block, strength: BigUint) -> Result<Option<TipChange>> {
        let id = block.id();
        if self.blocks.contains_key(&id) {
            return Err(Error::BlockExists);
        }
        if !block.is_genesis() && !self.blocks.contains_key(&block.prev) {
            return Err(Error::PrevMissing(block.prev));
        }

        if block.is_genesis() {
            self.genesis.insert(id);
        }
        self.blocks.insert(id, block);
        self.local_strength.insert(id, strength);

        let candidate = self.strength(&id)?;
        let incumbent = self.strength(&self.tip)?;
        if candidate > incumbent {
            let change = TipChange {
                old_tip: self.tip,
                new_tip: id,
            };
            self.tip = id;
            if change.old_tip != self.blocks[&id].prev {
                info!(old = %change.old_tip, new = %change.new_tip, "reorg");
            }
            return Ok(Some(change));
        }
        Ok(None)
    }

    /// Iterate from `from` toward genesis, calling `f` on each block.
    /// Stops at the nil sentinel or when `f` returns `false`; fails
    /// `PrevMissing` on a broken chain.
    pub fn walk(&self, from: BlockId, mut f: impl FnMut(&Block) -> bool) -> Result<()> {
        let mut cursor = from;
        while !cursor.is_nil() {
            let block = self.blocks.get(&cursor).ok_or(Error::PrevMissing(cursor))?;
            if !f(block) {
                return Ok(());
            }
            cursor = block.prev;
        }
        Ok(())
    }

    /// Cumulative strength from genesis to `id`.
    pub fn strength(&self, id: &BlockId) -> Result<BigUint> {
        let mut sum = BigUint::zero();
        self.walk(*id, |block| {
            if let Some(local) = self.local_strength.get(&block.id()) {
                sum += local;
            }
            true
        })?;
        Ok(sum)
    }

    /// Block ids from genesis to `id`, genesis first.
    pub fn path_from_genesis(&self, id: &BlockId) -> Result<Vec<BlockId>> {
        let mut path = Vec::new();
        self.walk(*id, |block| {
            path.push(block.id());
            true
        })?;
        path.reverse();
        Ok(path)
    }

    /// Lowest common ancestor of two blocks, if any.
    pub fn lca(&self, a: &BlockId, b: &BlockId) -> Result<Option<BlockId>> {
        let mut ancestors = HashSet::new();
        self.walk(*a, |block| {
            ancestors.insert(block.id());
            true
        })?;
        let mut found = None;
        self.walk(*b, |block| {
            let id = block.id();
            if ancestors.contains(&id) {
                found = Some(id);
                false
            } else {
                true
            }
        })?;
        Ok(found)
    }

    /// Rebuild the UTRO as of `id` by replaying every block from genesis.
    ///
    /// Full replay trades speed for correctness across reorgs of any
    /// depth; branches stay short in a round-bounded protocol.
    pub fn utro_at(&self, id: &BlockId, deposit_ttl: u64) -> Result<Utro> {
        let mut utro = Utro::new();
        for step in self.path_from_genesis(id)? {
            let block = self.blocks.get(&step).ok_or(Error::PrevMissing(step))?;
            utro = block.apply_body(&utro, deposit_ttl)?;
        }
        Ok(utro)
    }

    /// A new store holding only the blocks present in every input chain.
    /// No gap guarantee. Returns `None` when the stores share no block.
    pub fn intersect(&self, others: &[&Chain]) -> Option<Chain> {
        let common: Vec<BlockId> = self
            .blocks
            .keys()
            .filter(|id| others.iter().all(|c| c.blocks.contains_key(id)))
            .copied()
            .collect();
        if common.is_empty() {
            return None;
        }

        // Tip of the intersection: strongest by cumulative strength in
        // self (which has no gaps); ties break by lexicographic id.
        let mut best: Option<(BigUint, BlockId)> = None;
        for id in &common {
            let Ok(s) = self.strength(id) else { continue };
            let better = match &best {
                None => true,
                Some((bs, bid)) => s > *bs || (s == *bs && id.0 > bid.0),
            };
            if better {
                best = Some((s, *id));
            }
        }
        let (_, tip) = best?;

        let mut blocks = HashMap::new();
        let mut local_strength = HashMap::new();
        let mut genesis = HashSet::new();
        for id in common {
            blocks.insert(id, self.blocks[&id].clone());
            local_strength.insert(id, self.local_strength[&id].clone());
            if self.genesis.contains(&id) {
                genesis.insert(id);
            }
        }
        Some(Chain {
            blocks,
            local_strength,
            genesis,
            tip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::vrf::Keypair;
    use crate::ledger::Output;
    use crate::sortition;

    fn keypair(tag: &[u8]) -> Keypair {
        Keypair::generate(tag)
    }

    fn genesis() -> Block {
        let kp = keypair(b"founder");
        Block::genesis(vec![Output {
            amount: 100,
            receiver: kp.public,
            is_deposit: true,
            unlocks_after: 100,
        }])
    }

    /// A block over `prev` with no transfers; `tag` varies the proposer
    /// so sibling blocks get distinct ids.
    fn child(prev: &Block, round: u64, tag: &[u8]) -> Block {
        let kp = keypair(tag);
        let seed = sortition::seed_for(round, &prev.ticket);
        Block::mint(&kp, prev.id(), round, &seed, 50, Vec::new(), Vec::new())
    }

    fn s(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn append_and_walk_to_genesis() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&b1, 2, b"p2");

        let mut chain = Chain::new(g.clone());
        chain.append(b1.clone(), s(10)).unwrap();
        chain.append(b2.clone(), s(10)).unwrap();

        let mut seen = Vec::new();
        chain
            .walk(b2.id(), |b| {
                seen.push(b.id());
                true
            })
            .unwrap();
        assert_eq!(seen, vec![b2.id(), b1.id(), g.id()]);
        assert_eq!(chain.tip(), b2.id());
    }

    #[test]
    fn duplicate_append_rejected() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let mut chain = Chain::new(g);
        chain.append(b1.clone(), s(1)).unwrap();
        assert!(matches!(
            chain.append(b1, s(1)),
            Err(Error::BlockExists)
        ));
    }

    #[test]
    fn orphan_append_signals_prev_missing() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&b1, 2, b"p2");
        let mut chain = Chain::new(g);
        assert!(matches!(
            chain.append(b2, s(1)),
            Err(Error::PrevMissing(id)) if id == b1.id()
        ));
    }

    #[test]
    fn strongest_branch_reorg() {
        // A → B1 (10) vs A → B2 (8): tip is B1. B2' (5) on B2 takes the
        // branch to 13 > 10: tip becomes B2'.
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&g, 1, b"p2");
        let b2_child = child(&b2, 2, b"p3");

        let mut chain = Chain::new(g);
        assert!(chain.append(b1.clone(), s(10)).unwrap().is_some());
        assert!(chain.append(b2.clone(), s(8)).unwrap().is_none());
        assert_eq!(chain.tip(), b1.id());

        let change = chain.append(b2_child.clone(), s(5)).unwrap().unwrap();
        assert_eq!(change.old_tip, b1.id());
        assert_eq!(change.new_tip, b2_child.id());
        assert_eq!(chain.tip(), b2_child.id());
        assert_eq!(chain.strength(&b2_child.id()).unwrap(), s(13));
    }

    #[test]
    fn equal_strength_keeps_current_tip() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&g, 1, b"p2");

        let mut chain = Chain::new(g);
        chain.append(b1.clone(), s(10)).unwrap();
        assert!(chain.append(b2, s(10)).unwrap().is_none());
        assert_eq!(chain.tip(), b1.id());
    }

    #[test]
    fn tip_strength_dominates_after_every_append() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&g, 1, b"p2");
        let b3 = child(&b2, 2, b"p3");

        let mut chain = Chain::new(g.clone());
        for (b, st) in [(b1, 4u64), (b2, 3), (b3, 7)] {
            chain.append(b, s(st)).unwrap();
            let tip_strength = chain.strength(&chain.tip()).unwrap();
            for id in [&g.id()] {
                assert!(chain.strength(id).unwrap() <= tip_strength);
            }
        }
    }

    #[test]
    fn lca_of_forked_branches() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&g, 1, b"p2");
        let b2c = child(&b2, 2, b"p3");

        let mut chain = Chain::new(g.clone());
        chain.append(b1.clone(), s(1)).unwrap();
        chain.append(b2.clone(), s(1)).unwrap();
        chain.append(b2c.clone(), s(1)).unwrap();

        assert_eq!(chain.lca(&b1.id(), &b2c.id()).unwrap(), Some(g.id()));
        assert_eq!(chain.lca(&b2c.id(), &b2.id()).unwrap(), Some(b2.id()));
    }

    #[test]
    fn utro_at_replays_branch() {
        let founder = keypair(b"founder");
        let g = Block::genesis(vec![Output {
            amount: 100,
            receiver: founder.public,
            is_deposit: true,
            unlocks_after: 100,
        }]);
        let b1 = child(&g, 1, b"p1");
        let proposer = keypair(b"p1");

        let mut chain = Chain::new(g.clone());
        chain.append(b1.clone(), s(1)).unwrap();

        let utro = chain.utro_at(&b1.id(), 100).unwrap();
        assert_eq!(utro.stake_of(&founder.public), 100);
        // Coinbase landed for the proposer.
        assert_eq!(utro.balance_of(&proposer.public), 50);

        // The genesis-only view has no coinbase yet.
        let at_genesis = chain.utro_at(&g.id(), 100).unwrap();
        assert_eq!(at_genesis.balance_of(&proposer.public), 0);
    }

    #[test]
    fn intersect_keeps_common_blocks() {
        let g = genesis();
        let b1 = child(&g, 1, b"p1");
        let b2 = child(&g, 1, b"p2");

        let mut a = Chain::new(g.clone());
        a.append(b1.clone(), s(5)).unwrap();
        a.append(b2.clone(), s(1)).unwrap();

        let mut b = Chain::new(g.clone());
        b.append(b2.clone(), s(1)).unwrap();

        let common = a.intersect(&[&b]).unwrap();
        assert_eq!(common.len(), 2);
        assert!(common.contains(&g.id()));
        assert!(common.contains(&b2.id()));
        assert!(!common.contains(&b1.id()));
    }

    #[test]
    fn intersect_disjoint_is_none() {
        let g1 = genesis();
        let g2 = Block::genesis(vec![Output {
            amount: 7,
            receiver: keypair(b"other").public,
            is_deposit: true,
            unlocks_after: 100,
        }]);
        let a = Chain::new(g1);
        let b = Chain::new(g2);
        assert!(a.intersect(&[&b]).is_none());
    }
}
