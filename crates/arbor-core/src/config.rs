//! Block tree configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{max_retained_nodes, CUT_OFF_AGE, DEFAULT_COINBASE_REWARD};
use crate::error::ConfigError;

/// Largest accepted cut-off age. Keeps retention and per-node pool copies bounded.
pub const MAX_CUT_OFF_AGE: u64 = 10_000;

/// Parameters of a [`BlockChain`](crate::chain::BlockChain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Maximum height deficit behind the best node at which a block is still admitted.
    pub cut_off_age: u64,
    /// Value minted by coinbases built through [`BlockProducer`](crate::producer::BlockProducer).
    pub coinbase_reward: u64,
    /// Override for the number of retained nodes. Defaults to `cut_off_age + 1`
    /// and may only widen that window.
    ///
    /// With the default window no retained parent can sit far enough behind
    /// the best node to trip the stale-height rule; a wider window makes it reachable.
    pub retention_limit: Option<usize>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            cut_off_age: CUT_OFF_AGE,
            coinbase_reward: DEFAULT_COINBASE_REWARD,
            retention_limit: None,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cut_off_age == 0 {
            return Err(ConfigError::ZeroCutOffAge);
        }
        if self.cut_off_age > MAX_CUT_OFF_AGE {
            return Err(ConfigError::CutOffAgeTooLarge(self.cut_off_age));
        }
        if let Some(limit) = self.retention_limit {
            let required = max_retained_nodes(self.cut_off_age);
            if limit < required {
                return Err(ConfigError::RetentionBelowWindow { limit, required });
            }
        }
        Ok(())
    }

    /// Number of chain nodes the block tree keeps.
    pub fn max_nodes(&self) -> usize {
        self.retention_limit
            .unwrap_or_else(|| max_retained_nodes(self.cut_off_age))
    }
}
