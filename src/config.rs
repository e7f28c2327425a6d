//! Per-fork chain rules and import configuration.

use crate::{
    constants::{
        BASE_BLOCK_REWARD, MAXIMUM_EXTRA_DATA_SIZE, UNCLE_GENERATION_LIMIT, UNCLE_LIST_LIMIT,
    },
    externals::StateRepository,
    primitives::{SealedBlock, SealedHeader},
};
use alloy_primitives::{BlockNumber, Bytes, U256};
use std::path::PathBuf;

/// The minimum that the difficulty may ever be.
const MINIMUM_DIFFICULTY: u64 = 131_072;

/// Per-block chain rules.
///
/// Every method receives the height it is being asked about so that an
/// implementation can switch rules at hard-fork boundaries.
#[auto_impl::auto_impl(&, Arc)]
pub trait ForkSchedule: Send + Sync {
    /// Base reward credited to the miner of a block at this height.
    fn block_reward(&self, number: BlockNumber) -> U256;

    /// Whether receipts at this height carry a status bit instead of an
    /// intermediate state root.
    fn eip658(&self, number: BlockNumber) -> bool;

    /// Applies state transfers scheduled for this block, if any.
    ///
    /// Called before the block's transactions are executed.
    fn hard_fork_transfers(&self, _block: &SealedBlock, _state: &mut dyn StateRepository) {}

    /// Extra data to stamp into a locally assembled block at this height.
    fn extra_data(&self, configured: &Bytes, _number: BlockNumber) -> Bytes {
        if configured.len() > MAXIMUM_EXTRA_DATA_SIZE {
            configured.slice(..MAXIMUM_EXTRA_DATA_SIZE)
        } else {
            configured.clone()
        }
    }

    /// Difficulty of a child of `parent` mined at `timestamp`.
    fn next_difficulty(&self, parent: &SealedHeader, timestamp: u64) -> U256;

    /// Maximum number of uncles per block.
    fn uncle_list_limit(&self) -> usize {
        UNCLE_LIST_LIMIT
    }

    /// Number of generations an uncle's parent may lie in the past.
    fn uncle_generation_limit(&self) -> u64 {
        UNCLE_GENERATION_LIMIT
    }
}

/// A [`ForkSchedule`] with fixed rules and a single EIP-658 transition
/// block.
#[derive(Debug, Clone)]
pub struct StaticForkSchedule {
    /// Reward per block, in wei.
    pub block_reward: U256,
    /// First block at which receipts carry a status bit. `None` keeps
    /// post-state receipts forever.
    pub eip658_transition: Option<BlockNumber>,
}

impl Default for StaticForkSchedule {
    fn default() -> Self {
        Self { block_reward: BASE_BLOCK_REWARD, eip658_transition: Some(0) }
    }
}

impl StaticForkSchedule {
    /// Rules with post-state receipts at every height.
    pub fn pre_eip658() -> Self {
        Self { eip658_transition: None, ..Default::default() }
    }
}

impl ForkSchedule for StaticForkSchedule {
    fn block_reward(&self, _number: BlockNumber) -> U256 {
        self.block_reward
    }

    fn eip658(&self, number: BlockNumber) -> bool {
        self.eip658_transition.is_some_and(|at| number >= at)
    }

    fn next_difficulty(&self, parent: &SealedHeader, timestamp: u64) -> U256 {
        let adjustment = parent.difficulty / U256::from(2048);
        let elapsed = timestamp.saturating_sub(parent.timestamp);

        // homeostasis: fast blocks push difficulty up, slow blocks pull it
        // down, bounded at 99 adjustment quanta
        let period = elapsed / 10;
        let raw = if period == 0 {
            parent.difficulty + adjustment
        } else {
            let down = (period - 1).min(99);
            parent.difficulty.saturating_sub(adjustment * U256::from(down))
        };

        raw.max(U256::from(MINIMUM_DIFFICULTY))
    }
}

/// What to do when an import fails and the block is re-executed for
/// diagnosis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Never re-execute a failed block.
    #[default]
    Disabled,
    /// Re-execute once against a fresh snapshot. A retried success is
    /// reported and the block stays rejected.
    Strict,
    /// Re-execute once against a fresh snapshot and adopt the result if it
    /// succeeds.
    Lenient,
}

/// Import behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct ImportConfig {
    /// Terminate the process when a block conflicts with locally computed
    /// state. Suppressed in test mode.
    pub exit_on_block_conflict: bool,
    /// Append the hex encoding of every imported block to this file.
    pub record_blocks: Option<PathBuf>,
    /// Emit per-transaction state roots for blocks at or above this
    /// height.
    pub trace_start_block: Option<BlockNumber>,
    /// Store blocks without executing their transactions.
    pub chain_only: bool,
    /// Force a synchronous flush and terminate once a block above this
    /// height is imported.
    pub exit_on: Option<BlockNumber>,
    /// Diagnostic re-execution of failed imports.
    pub retry: RetryPolicy,
    /// Persist imports synchronously and never terminate the process.
    pub test_mode: bool,
}

impl ImportConfig {
    /// Configuration for tests: synchronous persistence, no process
    /// termination.
    pub fn for_tests() -> Self {
        Self { test_mode: true, ..Default::default() }
    }
}
