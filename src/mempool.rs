//! Pending-transfer pool.
//!
//! Entries are keyed by the transfer nonce (the body hash) and kept in
//! insertion order. At capacity the oldest entry is evicted, never the
//! newest, so recent senders are not starved under burst. The pool holds
//! only signature-valid transfers; full UTRO validation happens at
//! [`Mempool::pick`] time against a snapshot of the tip state.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::ledger::{Transfer, Utro};
use crate::{Error, Hash, Result};

pub struct Mempool {
    entries: HashMap<Hash, Transfer>,
    /// Nonces in insertion order; the front is the eviction candidate.
    order: VecDeque<Hash>,
    capacity: usize,
}

impl Mempool {
    pub fn new(capacity: usize) -> Self {
        Mempool {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, nonce: &Hash) -> bool {
        self.entries.contains_key(nonce)
    }

    /// Admit a transfer. Rejects bad signatures and duplicates; at
    /// capacity the oldest entry is evicted first.
    pub fn add(&mut self, tr: Transfer) -> Result<()> {
        tr.verify_signature()?;
        let nonce = tr.nonce();
        if self.entries.contains_key(&nonce) {
            return Err(Error::AlreadyInPool);
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                debug!(nonce = %hex::encode(&oldest[..4]), "mempool full, evicted oldest");
            }
        }
        self.order.push_back(nonce);
        self.entries.insert(nonce, tr);
        Ok(())
    }

    /// Select transfers for a block at `round`, in insertion order.
    ///
    /// Each candidate is dry-run validated against a working copy of
    /// `tip_state`; survivors are committed into the copy before the next
    /// candidate, so the emitted sequence applies atomically against the
    /// real tip state with no internal conflicts. Stops at `limit`
    /// transfers or when `f` returns `false`.
    pub fn pick(
        &self,
        tip_state: &Utro,
        round: u64,
        deposit_ttl: u64,
        limit: usize,
        mut f: impl FnMut(&Transfer) -> bool,
    ) {
        let mut working = tip_state.clone();
        let mut taken = 0usize;
        for nonce in &self.order {
            if taken >= limit {
                break;
            }
            let Some(tr) = self.entries.get(nonce) else {
                continue;
            };
            if working.apply(tr, round, deposit_ttl, false, true).is_err() {
                continue;
            }
            // Validated above; committing into the copy cannot fail.
            let _ = working.apply(tr, round, deposit_ttl, false, false);
            taken += 1;
            if !f(tr) {
                break;
            }
        }
    }

    /// Drop the entries a committed block incorporated.
    pub fn remove_committed<'a>(&mut self, committed: impl IntoIterator<Item = &'a Transfer>) {
        for tr in committed {
            let nonce = tr.nonce();
            if self.entries.remove(&nonce).is_some() {
                self.order.retain(|n| n != &nonce);
            }
        }
    }

    /// Drop entries that conflict with the given committed state — spent
    /// inputs, broken locks. Called after a tip change.
    pub fn retain_applicable(&mut self, tip_state: &Utro, round: u64, deposit_ttl: u64) {
        let entries = &mut self.entries;
        self.order.retain(|nonce| {
            let keep = match entries.get(nonce) {
                Some(tr) => {
                    let mut probe = tip_state.clone();
                    probe.apply(tr, round, deposit_ttl, false, true).is_ok()
                }
                None => false,
            };
            if !keep {
                entries.remove(nonce);
            }
            keep
        });
    }
}
