//! Outcome types of block execution.

use super::{Receipt, SealedBlock};
use alloy_primitives::{Address, B256, U256};
use std::collections::HashMap;

/// Per-transaction accounting reported by the executor's finalization
/// stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Hash of the executed transaction.
    pub tx_hash: B256,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// Fee paid to the miner, in wei.
    pub fee: U256,
}

/// The outcome of executing a block: receipts, per-transaction summaries
/// and the rewards credited to coinbases.
///
/// The total difficulty is attached once the block has been committed.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    /// The executed block.
    pub block: SealedBlock,
    /// Reward credited per coinbase. The miner's entry also includes the
    /// transaction fees, which the executor credits separately on-state.
    pub rewards: HashMap<Address, U256>,
    /// Receipts in transaction order.
    pub receipts: Vec<Receipt>,
    /// Execution summaries in transaction order.
    pub summaries: Vec<ExecutionSummary>,
    /// Total difficulty of the chain up to and including this block, set
    /// after the block was committed.
    pub total_difficulty: Option<U256>,
}

impl BlockSummary {
    /// Builds a summary for a freshly executed, not yet committed block.
    pub fn new(
        block: SealedBlock,
        rewards: HashMap<Address, U256>,
        receipts: Vec<Receipt>,
        summaries: Vec<ExecutionSummary>,
    ) -> Self {
        Self { block, rewards, receipts, summaries, total_difficulty: None }
    }

    /// A summary without execution effects, used for the genesis block and
    /// for chain-only imports.
    pub fn empty(block: SealedBlock) -> Self {
        Self::new(block, HashMap::new(), Vec::new(), Vec::new())
    }

    /// Whether this summary's chain is heavier than the given total
    /// difficulty. False until the summary has been committed.
    pub fn better_than(&self, total_difficulty: U256) -> bool {
        self.total_difficulty.is_some_and(|td| td > total_difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Block;

    #[test]
    fn uncommitted_summary_is_never_better() {
        let summary = BlockSummary::empty(Block::default().seal_slow());
        assert!(!summary.better_than(U256::ZERO));
    }

    #[test]
    fn better_than_is_strict() {
        let mut summary = BlockSummary::empty(Block::default().seal_slow());
        summary.total_difficulty = Some(U256::from(10));
        assert!(summary.better_than(U256::from(9)));
        assert!(!summary.better_than(U256::from(10)));
    }
}
