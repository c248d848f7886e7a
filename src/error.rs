//! The single tagged error type shared across the engine.
//!
//! Propagation policy:
//! - validation errors are logged and the offending message dropped;
//! - [`Error::PrevMissing`] is not a failure — it signals the caller to
//!   park the message in the out-of-order buffer;
//! - transport failures other than [`Error::EndOfStream`] terminate the
//!   round engine;
//! - resource errors evict the oldest entry of the saturated structure.

use crate::block::BlockId;
use crate::ledger::OutputRef;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    // ── Validation ──
    #[error("invalid signature")]
    InvalidSignature,
    #[error("transfer has no outputs, or no inputs on a non-coinbase transfer")]
    EmptyTransfer,
    #[error("input sum {input} does not match output sum {output}")]
    AmountMismatch { input: u64, output: u64 },
    #[error("amount sum overflows u64")]
    AmountOverflow,
    #[error("referenced output {0} does not exist or is already spent")]
    UnspendableOutput(OutputRef),
    #[error("referenced output is not owned by the sender")]
    NotOwner,
    #[error("referenced output is time-locked until after round {unlocks_after}")]
    TimeLocked { unlocks_after: u64 },
    #[error("deposit locked {lockup} rounds, exceeding the ttl of {ttl}")]
    DepositTooLong { lockup: u64, ttl: u64 },
    #[error("time-locked output is not marked as a deposit")]
    DepositNotMarked,
    #[error("deposit output is not locked beyond the current round")]
    DepositNotLocked,
    #[error("malformed proposal: {0}")]
    ProposalMalformed(String),
    #[error("malformed vote")]
    VoteMalformed,
    #[error("sortition proof does not qualify or does not verify")]
    BadSortition,
    #[error("participant already voted this round")]
    DoubleVote,

    // ── Dependency ──
    #[error("previous block {0} not in the chain store")]
    PrevMissing(BlockId),

    // ── Conflict ──
    #[error("transfer already in the mempool")]
    AlreadyInPool,
    #[error("block already in the chain store")]
    BlockExists,
    #[error("voter already counted for this block")]
    VoterAlreadyVoted,

    // ── Transport ──
    #[error("end of broadcast stream")]
    EndOfStream,
    #[error("broadcast transport failure: {0}")]
    TransportFailure(String),

    // ── Resource ──
    #[error("capacity exceeded")]
    CapacityExceeded,

    // ── Ambient ──
    #[error("journal i/o: {0}")]
    Journal(String),
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is a validation failure (drop and log) rather
    /// than a dependency, conflict, transport, or resource condition.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidSignature
                | Error::EmptyTransfer
                | Error::AmountMismatch { .. }
                | Error::AmountOverflow
                | Error::UnspendableOutput(_)
                | Error::NotOwner
                | Error::TimeLocked { .. }
                | Error::DepositTooLong { .. }
                | Error::DepositNotMarked
                | Error::DepositNotLocked
                | Error::ProposalMalformed(_)
                | Error::VoteMalformed
                | Error::BadSortition
                | Error::DoubleVote
        )
    }
}
