//! The per-round consensus state machine.
//!
//! Each round moves through `Idle → Proposing → Voting → Closed`. On
//! round entry the engine rolls its sortition; a qualifying draw mints a
//! block from the mempool and broadcasts it. During Voting it collects
//! proposals and votes, and at the deadline endorses the
//! highest-priority proposal it has seen. A vote quorum closes the round
//! early. Late messages for a closed round are discarded.
//!
//! The machine is driven by three inputs — an inbound message, a timer
//! tick, a shutdown signal — and every transition is a synchronous
//! method returning the messages to write, so tests can drive it without
//! a runtime. [`RoundEngine::run`] is the async driver multiplexing the
//! three inputs over `tokio::select!`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use num_bigint::BigUint;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::block::{Block, BlockId, Vote};
use crate::broadcast::{Broadcast, Msg, SyncReq};
use crate::chain::Chain;
use crate::config::EngineConfig;
use crate::consensus::buffer::OooBuffer;
use crate::crypto::threshold;
use crate::crypto::vrf::PublicKey;
use crate::identity::Identity;
use crate::journal::Journal;
use crate::ledger::Utro;
use crate::mempool::Mempool;
use crate::{consensus, sortition, Error, Hash, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Proposing,
    Voting,
    Closed,
}

/// The local sortition evaluation for the current round.
struct RoundDraw {
    ticket: Hash,
    proof: Vec<u8>,
    qualified: bool,
}

pub struct RoundEngine<B: Broadcast> {
    identity: Identity,
    config: EngineConfig,
    chain: Arc<RwLock<Chain>>,
    mempool: Arc<Mutex<Mempool>>,
    buffer: OooBuffer,
    journal: Option<Journal>,
    broadcast: B,
    shutdown: CancellationToken,

    round: u64,
    phase: Phase,
    draw: Option<RoundDraw>,
    voted: bool,
    /// Current-round proposals: id → proposer priority.
    proposals: HashMap<BlockId, BigUint>,
    best_proposal: Option<(BigUint, BlockId)>,
    /// Collected votes per endorsed block, kept for the current and the
    /// previous round so the next proposer can embed them.
    votes: HashMap<BlockId, Vec<Vote>>,
    /// Voter pks per round; at most one vote per pk per round.
    voters: HashMap<u64, HashSet<PublicKey>>,
    /// Dropped-message counter: invalid signatures, failed sortition,
    /// double votes.
    anomalies: u64,
}

impl<B: Broadcast> RoundEngine<B> {
    pub fn new(
        identity: Identity,
        config: EngineConfig,
        genesis: Block,
        broadcast: B,
        journal: Option<Journal>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let round = genesis.round + 1;
        let mempool = Mempool::new(config.mempool_capacity);
        let buffer = OooBuffer::new(config.ooo_capacity);
        Ok(RoundEngine {
            identity,
            chain: Arc::new(RwLock::new(Chain::new(genesis))),
            mempool: Arc::new(Mutex::new(mempool)),
            buffer,
            journal,
            broadcast,
            shutdown,
            round,
            phase: Phase::Idle,
            draw: None,
            voted: false,
            proposals: HashMap::new(),
            best_proposal: None,
            votes: HashMap::new(),
            voters: HashMap::new(),
            anomalies: 0,
            config,
        })
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shared handle on the chain store.
    pub fn chain(&self) -> Arc<RwLock<Chain>> {
        self.chain.clone()
    }

    /// Shared handle on the mempool, for transfer submission.
    pub fn mempool(&self) -> Arc<Mutex<Mempool>> {
        self.mempool.clone()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Enter the current round: roll sortition and, on a qualifying
    /// draw, mint and self-admit a proposal. Ends in Voting either way.
    pub fn open_round(&mut self) -> Result<Vec<Msg>> {
        self.phase = Phase::Idle;
        let (tip, seed, utro, stake, total, tip_is_genesis) = {
            let chain = self.read_chain();
            let tip = chain.tip();
            let tip_block = chain.tip_block();
            let seed = sortition::seed_for(self.round, &tip_block.ticket);
            let utro = chain.utro_at(&tip, self.config.deposit_ttl)?;
            let stake = utro.stake_of(&self.identity.public());
            let total = utro.total_stake();
            let genesis = chain.is_genesis(&tip);
            (tip, seed, utro, stake, total, genesis)
        };

        let (ticket, proof) = self.identity.keypair().prove(&seed);
        let f = self.config.f_value()?;
        let qualified = threshold::qualifies(stake, total, &f, &ticket);
        self.draw = Some(RoundDraw {
            ticket,
            proof,
            qualified,
        });

        let mut outbox = Vec::new();
        if qualified {
            if let Some(block) = self.try_mint(tip, &seed, &utro, tip_is_genesis)? {
                self.phase = Phase::Proposing;
                outbox.push(Msg::Block(block));
            }
        }
        self.phase = Phase::Voting;
        Ok(outbox)
    }

    /// Mint a proposal over `tip`, self-verify it, and admit it locally.
    /// Returns `None` when the witness requirement cannot be met.
    fn try_mint(
        &mut self,
        tip: BlockId,
        seed: &Hash,
        utro: &Utro,
        tip_is_genesis: bool,
    ) -> Result<Option<Block>> {
        let witnesses = if tip_is_genesis {
            Vec::new()
        } else {
            let collected = self.votes.get(&tip).cloned().unwrap_or_default();
            if collected.len() < self.config.witness_threshold {
                debug!(round = self.round, "qualified but short of witnesses, not minting");
                return Ok(None);
            }
            collected
        };

        let transfers = {
            let pool = self.lock_mempool();
            let mut picked = Vec::new();
            pool.pick(
                utro,
                self.round,
                self.config.deposit_ttl,
                self.config.mint_limit,
                |tr| {
                    picked.push(tr.clone());
                    true
                },
            );
            picked
        };

        let block = Block::mint(
            self.identity.keypair(),
            tip,
            self.round,
            seed,
            self.config.block_reward,
            transfers,
            witnesses,
        );

        let verified = {
            let chain = self.read_chain();
            match consensus::verify_block(&block, &chain, &self.config) {
                Ok(v) => v,
                Err(e) if e.is_validation() => {
                    // A transfer raced past the pick snapshot; skip the slot.
                    warn!(round = self.round, error = %e, "own proposal failed verification");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        };
        let id = block.id();
        let priority = verified.priority.clone();
        self.admit(block.clone(), verified)?;
        // Our own block competes like any other proposal this round.
        self.register_proposal(id, priority);
        info!(round = self.round, block = %id, "proposed");
        Ok(Some(block))
    }

    /// Process one inbound message; returns the messages to write back.
    pub fn handle(&mut self, msg: Msg) -> Result<Vec<Msg>> {
        let mut outbox = Vec::new();
        match msg {
            Msg::Transfer(tr) => {
                let admitted = self.lock_mempool().add(tr);
                match admitted {
                    Ok(()) | Err(Error::AlreadyInPool) => {}
                    Err(e) if e.is_validation() => self.anomaly(&e),
                    Err(e) => return Err(e),
                }
            }
            Msg::Block(block) => self.on_block(block, &mut outbox)?,
            Msg::Vote(vote) => self.on_vote(vote, &mut outbox)?,
            Msg::Sync(req) => {
                let chain = self.read_chain();
                for id in req.ids {
                    if let Some(block) = chain.read(&id) {
                        outbox.push(Msg::Block(block.clone()));
                    }
                }
            }
        }
        Ok(outbox)
    }

    fn on_block(&mut self, block: Block, outbox: &mut Vec<Msg>) -> Result<()> {
        let verified = {
            let chain = self.read_chain();
            consensus::verify_block(&block, &chain, &self.config)
        };
        match verified {
            Ok(verified) => {
                let id = block.id();
                let round = block.round;
                let priority = verified.priority.clone();
                self.admit(block, verified)?;

                if round == self.round && self.phase != Phase::Closed {
                    self.register_proposal(id, priority);
                }
                // Replay whatever was waiting on this block.
                for parked in self.buffer.drain(&id) {
                    outbox.extend(self.handle(parked)?);
                }
            }
            Err(Error::PrevMissing(dep)) => {
                if self.buffer.insert(dep, Msg::Block(block))? {
                    outbox.push(Msg::Sync(SyncReq { ids: vec![dep] }));
                }
            }
            Err(Error::BlockExists) => {}
            Err(e) if e.is_validation() => self.anomaly(&e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn on_vote(&mut self, vote: Vote, outbox: &mut Vec<Msg>) -> Result<()> {
        let verdict = {
            let chain = self.read_chain();
            consensus::verify_vote(&vote, &chain, &self.config)
        };
        match verdict {
            Ok((_, tip_round)) => {
                // Accept votes for the current round and the one before
                // (those are the witnesses the next proposal embeds);
                // anything older is late for a closed round.
                if tip_round + 1 < self.round {
                    debug!(round = tip_round, "discarding late vote");
                    return Ok(());
                }
                if !self.voters.entry(tip_round).or_default().insert(vote.pk) {
                    self.anomaly(&Error::DoubleVote);
                    return Ok(());
                }
                let tip = vote.tip;
                self.votes.entry(tip).or_default().push(vote);
                self.check_quorum(tip, tip_round);
            }
            Err(Error::PrevMissing(dep)) => {
                if self.buffer.insert(dep, Msg::Vote(vote))? {
                    outbox.push(Msg::Sync(SyncReq { ids: vec![dep] }));
                }
            }
            Err(e) if e.is_validation() => self.anomaly(&e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Round deadline: endorse the best proposal if our draw qualifies,
    /// then close the round.
    pub fn deadline_expired(&mut self) -> Result<Vec<Msg>> {
        let mut outbox = Vec::new();
        if self.phase == Phase::Voting {
            if let Some(msg) = self.cast_vote() {
                outbox.push(msg);
            }
        }
        self.phase = Phase::Closed;
        Ok(outbox)
    }

    fn cast_vote(&mut self) -> Option<Msg> {
        if self.voted {
            return None;
        }
        let (_, best) = self.best_proposal.as_ref()?;
        let draw = self.draw.as_ref()?;
        if !draw.qualified {
            return None;
        }
        let vote = Vote {
            tip: *best,
            token: draw.ticket,
            proof: draw.proof.clone(),
            pk: self.identity.public(),
        };
        self.voted = true;
        self.voters
            .entry(self.round)
            .or_default()
            .insert(vote.pk);
        self.votes.entry(vote.tip).or_default().push(vote.clone());
        debug!(round = self.round, tip = %vote.tip, "voted");
        Some(Msg::Vote(vote))
    }

    /// Advance to the next round and reset per-round state.
    pub fn close_round(&mut self) {
        let tip_round = self.read_chain().tip_block().round;
        self.round = (self.round + 1).max(tip_round + 1);
        self.phase = Phase::Idle;
        self.draw = None;
        self.voted = false;
        self.proposals.clear();
        self.best_proposal = None;

        // Keep vote state only for the round just ended.
        let horizon = self.round;
        self.voters.retain(|r, _| r + 1 >= horizon);
        let chain = self.chain.clone();
        let chain = chain.read().unwrap_or_else(|e| e.into_inner());
        self.votes
            .retain(|id, _| chain.read(id).is_some_and(|b| b.round + 1 >= horizon));
    }

    /// Append a verified block, journal its strength, and refresh the
    /// mempool when the tip moved.
    fn admit(&mut self, block: Block, verified: consensus::Verified) -> Result<()> {
        let id = block.id();
        let change = {
            let mut chain = self.chain.write().unwrap_or_else(|e| e.into_inner());
            chain.append(block.clone(), verified.strength.clone())?
        };
        if let Some(journal) = &mut self.journal {
            journal.record(&id, &verified.strength)?;
        }
        if change.is_some() {
            let mut pool = self.lock_mempool();
            pool.remove_committed(&block.transfers);
            pool.retain_applicable(&verified.utro, self.round, self.config.deposit_ttl);
        }
        Ok(())
    }

    fn register_proposal(&mut self, id: BlockId, priority: BigUint) {
        self.proposals.insert(id, priority.clone());
        let better = match &self.best_proposal {
            None => true,
            // Equal priorities break by lexicographic block id.
            Some((best, best_id)) => priority > *best || (priority == *best && id.0 > best_id.0),
        };
        if better {
            self.best_proposal = Some((priority, id));
        }
        self.check_quorum(id, self.round);
    }

    fn check_quorum(&mut self, tip: BlockId, tip_round: u64) {
        if tip_round != self.round || self.phase == Phase::Closed {
            return;
        }
        let Some((_, best)) = &self.best_proposal else {
            return;
        };
        if *best != tip {
            return;
        }
        let count = self.votes.get(&tip).map_or(0, Vec::len);
        if count >= self.config.vote_threshold {
            info!(round = self.round, tip = %tip, votes = count, "vote quorum, closing round");
            self.phase = Phase::Closed;
        }
    }

    fn anomaly(&mut self, e: &Error) {
        self.anomalies += 1;
        warn!(error = %e, anomalies = self.anomalies, "dropped invalid message");
    }

    fn read_chain(&self) -> std::sync::RwLockReadGuard<'_, Chain> {
        self.chain.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_mempool(&self) -> std::sync::MutexGuard<'_, Mempool> {
        self.mempool.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drive the machine until shutdown or a fatal transport error.
    ///
    /// Shutdown closes broadcast first, then drains the reader to
    /// EndOfStream; in-flight messages are dropped.
    pub async fn run(mut self) -> Result<()> {
        loop {
            for msg in self.open_round()? {
                self.broadcast.write(msg).await?;
            }

            let deadline = tokio::time::sleep(self.config.block_time());
            tokio::pin!(deadline);

            while self.phase != Phase::Closed {
                let best_before = self.best_proposal.clone();
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        self.broadcast.close().await;
                        while self.broadcast.read().await.is_ok() {}
                        return Ok(());
                    }
                    () = &mut deadline => {
                        for msg in self.deadline_expired()? {
                            self.broadcast.write(msg).await?;
                        }
                    }
                    inbound = self.broadcast.read() => match inbound {
                        Ok(msg) => {
                            for out in self.handle(msg)? {
                                self.broadcast.write(out).await?;
                            }
                            if self.best_proposal != best_before {
                                // A higher-priority proposal re-arms the
                                // round deadline.
                                deadline.as_mut().reset(
                                    tokio::time::Instant::now() + self.config.block_time(),
                                );
                            }
                        }
                        Err(Error::EndOfStream) => return Ok(()),
                        Err(e) => return Err(e),
                    },
                }
            }
            self.close_round();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Hub;
    use crate::ledger::Output;

    fn config() -> EngineConfig {
        EngineConfig {
            f: "0.999999".into(),
            block_time_ms: 50,
            vote_threshold: 2,
            witness_threshold: 1,
            ..EngineConfig::default()
        }
    }

    fn identity(tag: &[u8]) -> Identity {
        Identity::from_entropy(String::from_utf8_lossy(tag), tag)
    }

    fn genesis_for(ids: &[&Identity]) -> Block {
        Block::genesis(
            ids.iter()
                .map(|id| Output {
                    amount: 100,
                    receiver: id.public(),
                    is_deposit: true,
                    unlocks_after: 1_000,
                })
                .collect(),
        )
    }

    fn engine(id: Identity, genesis: Block, hub: &Hub) -> RoundEngine<crate::broadcast::Endpoint> {
        RoundEngine::new(
            id,
            config(),
            genesis,
            hub.endpoint(),
            None,
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn staked_node_proposes_on_round_open() {
        let alice = identity(b"alice");
        let genesis = genesis_for(&[&alice]);
        let hub = Hub::new(64, None);
        let mut engine = engine(alice, genesis, &hub);

        let outbox = engine.open_round().unwrap();
        assert_eq!(outbox.len(), 1);
        assert!(matches!(outbox[0], Msg::Block(_)));
        assert_eq!(engine.phase(), Phase::Voting);
        // The proposal was self-admitted.
        let chain = engine.chain();
        assert_eq!(chain.read().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unstaked_node_never_proposes() {
        let alice = identity(b"alice");
        let mallory = identity(b"mallory");
        let genesis = genesis_for(&[&alice]);
        let hub = Hub::new(64, None);
        let mut engine = engine(mallory, genesis, &hub);

        let outbox = engine.open_round().unwrap();
        assert!(outbox.is_empty());
        assert_eq!(engine.phase(), Phase::Voting);
    }

    #[tokio::test]
    async fn proposal_from_peer_is_admitted_and_voted_at_deadline() {
        let alice = identity(b"alice");
        let bob = identity(b"bob");
        let genesis = genesis_for(&[&alice, &bob]);
        let hub = Hub::new(64, None);
        let mut a = engine(alice, genesis.clone(), &hub);
        let mut b = engine(bob, genesis, &hub);

        let proposal = a.open_round().unwrap().remove(0);
        // Bob minted his own proposal too; Alice's joins it.
        b.open_round().unwrap();
        b.handle(proposal.clone()).unwrap();
        assert_eq!(b.chain().read().unwrap().len(), 3);

        let outbox = b.deadline_expired().unwrap();
        assert_eq!(outbox.len(), 1);
        assert!(matches!(outbox[0], Msg::Vote(_)));
        assert_eq!(b.phase(), Phase::Closed);
    }

    #[tokio::test]
    async fn one_vote_per_pk_per_round() {
        let alice = identity(b"alice");
        let bob = identity(b"bob");
        let genesis = genesis_for(&[&alice, &bob]);
        let hub = Hub::new(64, None);
        let mut a = engine(alice, genesis.clone(), &hub);
        let mut b = engine(bob, genesis, &hub);

        // Exchange both proposals so Alice and Bob agree on the best.
        let pa = a.open_round().unwrap().remove(0);
        let pb = b.open_round().unwrap().remove(0);
        a.handle(pb).unwrap();
        b.handle(pa).unwrap();
        let vote = match b.deadline_expired().unwrap().remove(0) {
            Msg::Vote(v) => v,
            other => panic!("expected vote, got {}", other.kind()),
        };

        a.handle(Msg::Vote(vote.clone())).unwrap();
        let before = a.anomalies();
        a.handle(Msg::Vote(vote)).unwrap();
        assert_eq!(a.anomalies(), before + 1);
    }

    #[tokio::test]
    async fn quorum_closes_round_early() {
        let alice = identity(b"alice");
        let bob = identity(b"bob");
        let carol = identity(b"carol");
        let genesis = genesis_for(&[&alice, &bob, &carol]);
        let hub = Hub::new(64, None);
        let mut a = engine(alice, genesis.clone(), &hub);
        let mut b = engine(bob, genesis.clone(), &hub);
        let mut c = engine(carol, genesis, &hub);

        // Everyone proposes; full exchange makes the best unanimous.
        let pa = a.open_round().unwrap().remove(0);
        let pb = b.open_round().unwrap().remove(0);
        let pc = c.open_round().unwrap().remove(0);
        a.handle(pb.clone()).unwrap();
        a.handle(pc.clone()).unwrap();
        b.handle(pa.clone()).unwrap();
        b.handle(pc).unwrap();
        c.handle(pa).unwrap();
        c.handle(pb).unwrap();

        let vb = b.deadline_expired().unwrap().remove(0);
        let vc = c.deadline_expired().unwrap().remove(0);

        a.handle(vb).unwrap();
        assert_ne!(a.phase(), Phase::Closed);
        a.handle(vc).unwrap();
        assert_eq!(a.phase(), Phase::Closed);
    }

    #[tokio::test]
    async fn out_of_order_block_is_parked_then_replayed_once() {
        let alice = identity(b"alice");
        let bob = identity(b"bob");
        let genesis = genesis_for(&[&alice, &bob]);
        let hub = Hub::new(64, None);
        let mut a = engine(alice.clone(), genesis.clone(), &hub);
        let mut b = engine(bob.clone(), genesis, &hub);

        // Alice proposes P in round 1, Bob votes, Alice builds C in
        // round 2 embedding the vote.
        let p = a.open_round().unwrap().remove(0);
        b.open_round().unwrap();
        b.handle(p.clone()).unwrap();
        let vote = b.deadline_expired().unwrap().remove(0);
        b.close_round();
        a.handle(vote).unwrap();
        a.deadline_expired().unwrap();
        a.close_round();
        let c = a.open_round().unwrap().remove(0);

        // A third node sees C before P.
        let carol = identity(b"carol");
        let mut fresh = engine(carol, genesis_for(&[&alice, &bob]), &hub);
        fresh.open_round().unwrap();
        let outbox = fresh.handle(c.clone()).unwrap();
        assert_eq!(fresh.buffered(), 1);
        // It asked peers for the missing parent.
        assert!(matches!(&outbox[0], Msg::Sync(req) if req.ids.len() == 1));

        // P arrives: both blocks admitted, buffer empty.
        fresh.handle(p).unwrap();
        assert_eq!(fresh.buffered(), 0);
        assert_eq!(fresh.chain().read().unwrap().len(), 3);

        // C bounced at us again is refused by the store, not replayed.
        let before = fresh.chain().read().unwrap().len();
        fresh.handle(c).unwrap();
        assert_eq!(fresh.chain().read().unwrap().len(), before);
    }

    #[tokio::test]
    async fn transfer_lands_in_mempool_and_in_next_block() {
        let alice = identity(b"alice");
        let bob = identity(b"bob");
        let genesis = genesis_for(&[&alice, &bob]);
        let hub = Hub::new(64, None);
        let mut a = engine(alice.clone(), genesis, &hub);

        // Round 1: empty proposal establishes a spendable coinbase.
        a.open_round().unwrap();
        a.deadline_expired().unwrap();
        a.close_round();

        // Alice spends her round-1 coinbase (matured after round 1).
        let chain = a.chain();
        let tip = chain.read().unwrap().tip();
        let coinbase_ref = {
            let guard = chain.read().unwrap();
            guard.tip_block().coinbase.output_ref(0)
        };
        let tr = crate::ledger::Transfer::new(
            vec![coinbase_ref],
            vec![Output {
                amount: 50,
                receiver: bob.public(),
                is_deposit: false,
                unlocks_after: 0,
            }],
            alice.keypair(),
        );
        a.handle(Msg::Transfer(tr.clone())).unwrap();
        assert_eq!(a.mempool().lock().unwrap().len(), 1);

        // Round 2 needs a witness for the tip before Alice can mint.
        let vote_seed = {
            let guard = chain.read().unwrap();
            let tip_block = guard.tip_block();
            let parent = guard.read(&tip_block.prev).unwrap().clone();
            sortition::seed_for(tip_block.round, &parent.ticket)
        };
        let vote = Vote::new(bob.keypair(), tip, &vote_seed);
        a.handle(Msg::Vote(vote)).unwrap();

        let minted = a.open_round().unwrap().remove(0);
        let Msg::Block(block) = minted else {
            panic!("expected block");
        };
        assert_eq!(block.transfers, vec![tr]);
        // Committed transfers leave the pool once the tip adopts them.
        assert!(a.mempool().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn engine_stops_on_shutdown() {
        let alice = identity(b"alice");
        let genesis = genesis_for(&[&alice]);
        let hub = Hub::new(64, None);
        let shutdown = CancellationToken::new();
        let engine = RoundEngine::new(
            alice,
            config(),
            genesis,
            hub.endpoint(),
            None,
            shutdown.clone(),
        )
        .unwrap();

        let task = tokio::spawn(engine.run());
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        shutdown.cancel();
        task.await.unwrap().unwrap();
    }
}
