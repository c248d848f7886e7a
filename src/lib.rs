//! # Sortis
//!
//! An experimental workbench for a permissionless, stake-weighted
//! consensus engine:
//! - **Cryptographic sortition** — every participant privately rolls a
//!   verifiable lottery each round; rolls that clear a stake-weighted
//!   threshold entitle the holder to propose or vote on a block.
//! - **UTXO-style transfers** — blocks carry transfers validated against
//!   the unspent-output set of their parent.
//! - **Strongest-chain selection** — the tip is the block with the
//!   greatest cumulative strength from genesis; reorgs roll the UTXO
//!   state to the new branch.
//! - **Round engine** — a per-round state machine driving broadcast I/O,
//!   out-of-order buffering, voting deadlines, and minting.
//!
//! The TLS transport, CLI entry points, and durable storage beyond an
//! append-only strength journal live outside this crate.

pub mod block;
pub mod broadcast;
pub mod chain;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod journal;
pub mod ledger;
pub mod mempool;
pub mod sortition;

pub use error::{Error, Result};

/// Protocol constants
pub mod constants {
    /// Length of every content hash and identifier in the protocol.
    pub const HASH_LEN: usize = 32;
    /// Length of a VRF proof (an Ed25519 signature).
    pub const PROOF_LEN: usize = 64;
    /// Significant decimal digits the threshold comparison is rounded to.
    /// Nodes that disagree on this value fork.
    pub const THRESHOLD_PRECISION: u64 = 34;
    /// Default active-slot coefficient, as a decimal string.
    pub const DEFAULT_F: &str = "0.2";
    /// Default round duration in milliseconds.
    pub const DEFAULT_BLOCK_TIME_MS: u64 = 1_000;
    /// Default vote quorum that closes a round early.
    pub const DEFAULT_VOTE_THRESHOLD: usize = 3;
    /// Default maximum lockup, in rounds, for a deposit output.
    pub const DEFAULT_DEPOSIT_TTL: u64 = 64;
    /// Default votes a post-genesis block must embed.
    pub const DEFAULT_WITNESS_THRESHOLD: usize = 1;
    /// Default block reward paid by the coinbase transfer.
    pub const DEFAULT_BLOCK_REWARD: u64 = 50;
    /// Default maximum number of pending transfers in the mempool.
    pub const DEFAULT_MEMPOOL_CAPACITY: usize = 10_000;
    /// Default per-peer outbound queue depth of the broadcast layer.
    pub const DEFAULT_OUTBOX_CAPACITY: usize = 1_024;
    /// Default byte cap of the out-of-order buffer, per missing
    /// dependency.
    pub const DEFAULT_OOO_CAPACITY: usize = 4 * 1024 * 1024;
    /// Default number of transfers drawn from the mempool per minted block.
    pub const DEFAULT_MINT_LIMIT: usize = 1_000;
    /// Maximum wire message size accepted by the decoder (16 MiB).
    pub const MAX_WIRE_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
}

/// 32-byte content hash used throughout the protocol.
pub type Hash = [u8; constants::HASH_LEN];

/// The all-zero sentinel hash: absent value / genesis parent.
pub const NIL_HASH: Hash = [0u8; constants::HASH_LEN];

/// SHA-256 over the concatenation of the given parts, in order.
///
/// This is the canonical protocol hash: callers are responsible for
/// unambiguous field layouts (fixed-width integers, length prefixes on
/// variable-length sequences).
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Domain-separated SHA-256: `SHA256(domain ‖ data)`.
///
/// The domain is hashed as raw bytes with no length prefix; domains must
/// therefore never be prefixes of one another.
pub fn hash_domain(domain: &[u8], data: &[u8]) -> Hash {
    sha256_concat(&[domain, data])
}

/// Render the first four bytes of a hash as hex, for logs.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

/// Serialize a wire value using bincode with legacy (v1-compatible)
/// encoding. The encoding is deterministic: the same logical value always
/// produces the same bytes, which receivers rely on for dedup.
pub fn serialize<T: serde::Serialize>(val: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(val, bincode::config::legacy())
        .map_err(|e| Error::TransportFailure(e.to_string()))
}

/// Deserialize a wire value using bincode with legacy encoding.
///
/// Rejects inputs larger than `MAX_WIRE_MESSAGE_BYTES` to prevent OOM
/// from oversized payloads.
pub fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() > constants::MAX_WIRE_MESSAGE_BYTES {
        return Err(Error::CapacityExceeded);
    }
    let (val, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
        .map_err(|e| Error::TransportFailure(e.to_string()))?;
    Ok(val)
}
