//! Out-of-order buffer.
//!
//! Broadcast makes no ordering promise across peers, so a block can
//! arrive before its parent and a vote before the block it endorses.
//! Such messages are parked here, keyed by the missing dependency, and
//! replayed in insertion order when the chain store admits it.
//!
//! A content digest of every message currently or previously buffered
//! is retained so no message is replayed twice. The byte cap applies to
//! each dependency key independently; overflow within a key drops that
//! key's oldest message and never touches messages parked under other
//! keys, so a flood of orphans pointing at one fabricated parent cannot
//! starve the rest of the buffer. An evicted message's digest is
//! forgotten, so a retransmit can be parked again.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::block::BlockId;
use crate::broadcast::Msg;
use crate::{Hash, Result};

/// The missing chain entry a message is waiting on, if any.
pub fn dependency(msg: &Msg) -> Option<BlockId> {
    match msg {
        Msg::Block(b) => Some(b.prev),
        Msg::Vote(v) => Some(v.tip),
        Msg::Transfer(_) | Msg::Sync(_) => None,
    }
}

struct Parked {
    msg: Msg,
    digest: Hash,
    bytes: usize,
}

#[derive(Default)]
struct DepQueue {
    queue: VecDeque<Parked>,
    bytes: usize,
}

pub struct OooBuffer {
    parked: HashMap<BlockId, DepQueue>,
    /// Digests of everything parked or replayed; consulted to refuse
    /// re-buffering. Evicted digests are removed again.
    seen: HashSet<Hash>,
    count: usize,
    bytes: usize,
    /// Byte cap per dependency key.
    capacity: usize,
}

impl OooBuffer {
    pub fn new(capacity: usize) -> Self {
        OooBuffer {
            parked: HashMap::new(),
            seen: HashSet::new(),
            count: 0,
            bytes: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Park `msg` until `dep` is admitted. Returns whether the message
    /// was accepted; a message seen before is refused so it can never be
    /// replayed twice.
    pub fn insert(&mut self, dep: BlockId, msg: Msg) -> Result<bool> {
        let digest = msg.digest()?;
        if self.seen.contains(&digest) {
            return Ok(false);
        }
        let bytes = crate::serialize(&msg)?.len();
        let slot = self.parked.entry(dep).or_default();
        while slot.bytes + bytes > self.capacity {
            let Some(evicted) = slot.queue.pop_front() else {
                break;
            };
            slot.bytes -= evicted.bytes;
            self.bytes -= evicted.bytes;
            self.count -= 1;
            // A retransmit of the evicted message may park again.
            self.seen.remove(&evicted.digest);
            debug!(dep = %dep, "dependency over byte cap, evicted its oldest message");
        }
        self.seen.insert(digest);
        slot.bytes += bytes;
        slot.queue.push_back(Parked { msg, digest, bytes });
        self.bytes += bytes;
        self.count += 1;
        debug!(dep = %dep, buffered = self.count, "parked out-of-order message");
        Ok(true)
    }

    /// Release every message waiting on `dep`, in insertion order.
    pub fn drain(&mut self, dep: &BlockId) -> Vec<Msg> {
        let Some(slot) = self.parked.remove(dep) else {
            return Vec::new();
        };
        self.bytes -= slot.bytes;
        self.count -= slot.queue.len();
        slot.queue.into_iter().map(|parked| parked.msg).collect()
    }
}
