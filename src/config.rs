//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid config.
//! `f` is kept as a decimal string and parsed on demand: protocol math
//! runs in arbitrary-precision decimal, and a binary float here would
//! silently change the threshold comparison.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::{Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Active-slot coefficient, decimal in (0, 1].
    pub f: String,
    /// Round duration in milliseconds.
    pub block_time_ms: u64,
    /// Vote quorum that closes a round early.
    pub vote_threshold: usize,
    /// Maximum lockup, in rounds, of a deposit output.
    pub deposit_ttl: u64,
    /// Votes a post-genesis block must embed; blocks extending genesis
    /// are exempt.
    pub witness_threshold: usize,
    /// Block reward paid by the coinbase.
    pub block_reward: u64,
    /// Maximum pending transfers in the mempool.
    pub mempool_capacity: usize,
    /// Per-peer outbound queue depth of the broadcast layer.
    pub outbox_capacity: usize,
    /// Byte cap of the out-of-order buffer, per missing dependency.
    pub ooo_capacity: usize,
    /// Transfers drawn from the mempool per minted block.
    pub mint_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            f: constants::DEFAULT_F.to_string(),
            block_time_ms: constants::DEFAULT_BLOCK_TIME_MS,
            vote_threshold: constants::DEFAULT_VOTE_THRESHOLD,
            deposit_ttl: constants::DEFAULT_DEPOSIT_TTL,
            witness_threshold: constants::DEFAULT_WITNESS_THRESHOLD,
            block_reward: constants::DEFAULT_BLOCK_REWARD,
            mempool_capacity: constants::DEFAULT_MEMPOOL_CAPACITY,
            outbox_capacity: constants::DEFAULT_OUTBOX_CAPACITY,
            ooo_capacity: constants::DEFAULT_OOO_CAPACITY,
            mint_limit: constants::DEFAULT_MINT_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(doc: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(doc).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let doc =
            std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config(e.to_string()))?;
        Self::from_toml(&doc)
    }

    pub fn validate(&self) -> Result<()> {
        let f = self.f_value()?;
        if f <= BigDecimal::zero() || f > BigDecimal::one() {
            return Err(Error::Config(format!("f must be in (0, 1], got {}", self.f)));
        }
        if self.block_time_ms == 0 {
            return Err(Error::Config("block_time_ms must be nonzero".into()));
        }
        if self.vote_threshold == 0 {
            return Err(Error::Config("vote_threshold must be nonzero".into()));
        }
        if self.mempool_capacity == 0 || self.outbox_capacity == 0 || self.ooo_capacity == 0 {
            return Err(Error::Config("capacities must be nonzero".into()));
        }
        Ok(())
    }

    /// The active-slot coefficient as a decimal.
    pub fn f_value(&self) -> Result<BigDecimal> {
        BigDecimal::from_str(&self.f)
            .map_err(|e| Error::Config(format!("f is not a decimal: {e}")))
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }
}
