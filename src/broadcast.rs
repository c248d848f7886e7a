//! Broadcast contract and the in-process hub implementation.
//!
//! The contract is a capability set: `write` must eventually deliver the
//! message to every non-failed peer at least once, `read` hands back
//! undelivered messages in per-peer FIFO order and returns
//! [`Error::EndOfStream`] once the endpoint is closed. Duplicates are
//! deduplicated on the receiving side by content digest, so redundant
//! delivery is harmless.
//!
//! [`Hub`] is the in-process implementation used by the engine tests: a
//! shared set of per-peer queues with optional simulated latency. A wire
//! transport would be a second implementation of the same trait.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::trace;

use crate::block::{Block, BlockId, Vote};
use crate::ledger::Transfer;
use crate::{Error, Hash, Result};

/// Request for a set of blocks the sender is missing; peers answer with
/// ordinary `Msg::Block` writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReq {
    pub ids: Vec<BlockId>,
}

/// The tagged wire message. Encoding is deterministic (bincode legacy),
/// which receivers rely on for digest-based dedup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    Block(Block),
    Vote(Vote),
    Transfer(Transfer),
    Sync(SyncReq),
}

impl Msg {
    /// Content digest used for receiver-side dedup.
    pub fn digest(&self) -> Result<Hash> {
        let bytes = crate::serialize(self)?;
        Ok(crate::sha256_concat(&[&bytes]))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Block(_) => "block",
            Msg::Vote(_) => "vote",
            Msg::Transfer(_) => "transfer",
            Msg::Sync(_) => "sync",
        }
    }
}

/// The broadcast capability set.
#[allow(async_fn_in_trait)]
pub trait Broadcast {
    /// Next undelivered message, in per-peer FIFO order.
    /// [`Error::EndOfStream`] after [`Broadcast::close`].
    async fn read(&mut self) -> Result<Msg>;

    /// Deliver `msg` to every other non-failed peer at least once.
    async fn write(&mut self, msg: Msg) -> Result<()>;

    /// Stop this endpoint; pending unread messages are dropped.
    async fn close(&mut self);
}

struct PeerSlot {
    queue: VecDeque<(Hash, Msg)>,
    /// Digests currently enqueued or already delivered at this peer.
    /// A message evicted on overflow is removed again so a retransmit
    /// can still get through.
    seen: HashSet<Hash>,
    notify: Arc<Notify>,
    closed: bool,
}

struct HubShared {
    peers: Mutex<Vec<PeerSlot>>,
    capacity: usize,
    latency: Option<Duration>,
}

/// In-process broadcast hub. Clone-cheap; each participant takes one
/// [`Endpoint`] via [`Hub::endpoint`].
#[derive(Clone)]
pub struct Hub {
    shared: Arc<HubShared>,
}

impl Hub {
    pub fn new(capacity: usize, latency: Option<Duration>) -> Self {
        Hub {
            shared: Arc::new(HubShared {
                peers: Mutex::new(Vec::new()),
                capacity,
                latency,
            }),
        }
    }

    /// Register a new peer and return its endpoint.
    pub fn endpoint(&self) -> Endpoint {
        let notify = Arc::new(Notify::new());
        let mut peers = self.shared.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.push(PeerSlot {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            notify: notify.clone(),
            closed: false,
        });
        Endpoint {
            shared: self.shared.clone(),
            index: peers.len() - 1,
            notify,
        }
    }
}

/// One peer's handle on the hub.
pub struct Endpoint {
    shared: Arc<HubShared>,
    index: usize,
    notify: Arc<Notify>,
}

impl Broadcast for Endpoint {
    async fn read(&mut self) -> Result<Msg> {
        loop {
            {
                let mut peers = self.shared.peers.lock().unwrap_or_else(|e| e.into_inner());
                let slot = &mut peers[self.index];
                if let Some((_, msg)) = slot.queue.pop_front() {
                    return Ok(msg);
                }
                if slot.closed {
                    return Err(Error::EndOfStream);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn write(&mut self, msg: Msg) -> Result<()> {
        if let Some(latency) = self.shared.latency {
            tokio::time::sleep(latency).await;
        }
        let digest = msg.digest()?;
        let mut peers = self.shared.peers.lock().unwrap_or_else(|e| e.into_inner());
        for (i, slot) in peers.iter_mut().enumerate() {
            if i == self.index || slot.closed {
                continue;
            }
            if !slot.seen.insert(digest) {
                continue;
            }
            if slot.queue.len() >= self.shared.capacity {
                // Overflow drops the oldest, never the newest. Forget
                // its digest so a retransmit of the lost message is
                // deliverable; sync repair depends on that.
                if let Some((evicted, _)) = slot.queue.pop_front() {
                    slot.seen.remove(&evicted);
                }
            }
            slot.queue.push_back((digest, msg.clone()));
            slot.notify.notify_one();
        }
        trace!(kind = msg.kind(), "broadcast");
        Ok(())
    }

    async fn close(&mut self) {
        let mut peers = self.shared.peers.lock().unwrap_or_else(|e| e.into_inner());
        let slot = &mut peers[self.index];
        slot.closed = true;
        slot.queue.clear();
        slot.notify.notify_one();
    }
}
