//! Capability traits for the components surrounding the chain core.
//!
//! The core owns none of its storage or execution machinery: world state,
//! block and transaction persistence, transaction execution, event
//! delivery, flushing and pruning are all injected at construction through
//! the traits in this module. [`ChainExternals`] bundles them.

use crate::{
    config::ForkSchedule,
    error::{ExecutionError, ValidationError},
    primitives::{
        BlockSummary, ExecutionSummary, Receipt, SealedBlock, SealedHeader, TransactionSigned,
    },
};
use alloy_primitives::{Address, BlockNumber, B256, U256};
use std::sync::Arc;

/// A handle onto the world state trie.
///
/// A handle is a snapshot: mutations stay private to it until [`commit`]
/// publishes them under the resulting root. [`snapshot_at`] opens a new
/// handle rooted at any previously committed root, which is how speculative
/// fork imports stay isolated from the canonical state.
///
/// Per-transaction isolation inside a block uses the checkpoint journal:
/// [`checkpoint`] marks a point, [`checkpoint_revert`] unwinds to it,
/// [`checkpoint_commit`] folds it into the handle.
///
/// [`commit`]: StateRepository::commit
/// [`snapshot_at`]: StateRepository::snapshot_at
/// [`checkpoint`]: StateRepository::checkpoint
/// [`checkpoint_revert`]: StateRepository::checkpoint_revert
/// [`checkpoint_commit`]: StateRepository::checkpoint_commit
pub trait StateRepository: Send {
    /// Root hash describing the current contents of this handle,
    /// including uncommitted mutations.
    fn root(&self) -> B256;

    /// Opens a fresh handle rooted at the given committed root.
    fn snapshot_at(&self, root: B256) -> Box<dyn StateRepository>;

    /// Marks a point the journal can unwind to.
    fn checkpoint(&mut self);

    /// Folds the most recent checkpoint into the handle.
    fn checkpoint_commit(&mut self);

    /// Unwinds all mutations back to the most recent checkpoint.
    fn checkpoint_revert(&mut self);

    /// Publishes this handle's mutations under [`Self::root`].
    fn commit(&mut self);

    /// Discards all mutations since the last commit or snapshot.
    fn rollback(&mut self);

    /// Nonce of the given account.
    fn nonce(&self, address: Address) -> u64;

    /// Bumps the nonce of the given account by one.
    fn increment_nonce(&mut self, address: Address);

    /// Balance of the given account, in wei.
    fn balance(&self, address: Address) -> U256;

    /// Credits the given account.
    fn add_balance(&mut self, address: Address, amount: U256);

    /// Debits the given account, saturating at zero.
    fn sub_balance(&mut self, address: Address, amount: U256);
}

/// Persistent block storage indexed by hash and by height.
///
/// The store distinguishes main-chain blocks from side-branch blocks; the
/// by-number lookups answer along the main chain.
#[auto_impl::auto_impl(&, Arc)]
pub trait BlockStore: Send + Sync {
    /// Whether a block with the given hash is stored.
    fn contains(&self, hash: B256) -> bool;

    /// The block with the given hash, main chain or not.
    fn block_by_hash(&self, hash: B256) -> Option<SealedBlock>;

    /// The main-chain block at the given height.
    fn chain_block_by_number(&self, number: BlockNumber) -> Option<SealedBlock>;

    /// All stored blocks at the given height, across branches.
    fn blocks_by_number(&self, number: BlockNumber) -> Vec<SealedBlock>;

    /// The main-chain tip.
    fn best_block(&self) -> Option<SealedBlock>;

    /// The greatest height of any stored block, across branches.
    fn max_number(&self) -> BlockNumber;

    /// Cumulative difficulty recorded for the block with the given hash.
    fn total_difficulty(&self, hash: B256) -> Option<U256>;

    /// Stores a block together with its cumulative difficulty.
    fn save_block(&self, block: SealedBlock, total_difficulty: U256, on_main_chain: bool);

    /// Flips main-chain designations so that the branch ending in `head`
    /// becomes the main chain, up to the lowest common ancestor.
    fn rebranch(&self, head: &SealedBlock);

    /// Walks the parent chain from `hash` and returns up to `count`
    /// hashes, starting with `hash` itself.
    fn list_hashes_ending_with(&self, hash: B256, count: usize) -> Vec<B256>;
}

/// Where a transaction's receipt lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    /// The receipt produced when the transaction executed.
    pub receipt: Receipt,
    /// Hash of the containing block.
    pub block_hash: B256,
    /// Index of the transaction within the block.
    pub index: usize,
}

/// Persistent receipt storage keyed by transaction hash.
///
/// A transaction may appear in several blocks across branches, so a hash
/// maps to a list of locations.
pub trait TransactionStore: Send + Sync {
    /// Records where a transaction executed.
    fn put(&self, tx_hash: B256, info: TransactionInfo);

    /// All recorded locations of the given transaction.
    fn get(&self, tx_hash: B256) -> Vec<TransactionInfo>;
}

/// Everything a transaction executor needs to know about its position in
/// the block.
pub struct TxContext<'a> {
    /// The transaction to execute.
    pub tx: &'a TransactionSigned,
    /// The containing block.
    pub block: &'a SealedBlock,
    /// Coinbase to credit with the transaction fee.
    pub coinbase: Address,
    /// Gas consumed by the block before this transaction.
    pub gas_used: u64,
    /// Block storage, for history lookups during execution.
    pub store: &'a dyn BlockStore,
}

/// Staged execution of a single transaction.
///
/// The driver calls [`init`], [`execute`], [`go`] and [`finalization`] in
/// that order against the same state handle, then reads the gas used and
/// the receipt. Any stage error aborts the containing block's import.
///
/// [`init`]: TransactionExecutor::init
/// [`execute`]: TransactionExecutor::execute
/// [`go`]: TransactionExecutor::go
/// [`finalization`]: TransactionExecutor::finalization
pub trait TransactionExecutor {
    /// Static checks and gas prepayment.
    fn init(&mut self, state: &mut dyn StateRepository) -> Result<(), ExecutionError>;

    /// Value transfer and message-call setup.
    fn execute(&mut self, state: &mut dyn StateRepository) -> Result<(), ExecutionError>;

    /// Virtual machine execution.
    fn go(&mut self, state: &mut dyn StateRepository) -> Result<(), ExecutionError>;

    /// Refunds, fee payment and summary construction.
    fn finalization(
        &mut self,
        state: &mut dyn StateRepository,
    ) -> Result<Option<ExecutionSummary>, ExecutionError>;

    /// Gas consumed by this transaction.
    fn gas_used(&self) -> u64;

    /// The receipt of this transaction. Meaningful after
    /// [`TransactionExecutor::finalization`].
    fn receipt(&self) -> Receipt;
}

/// Creates a [`TransactionExecutor`] per transaction.
pub trait ExecutorFactory: Send + Sync {
    /// Builds an executor for the given transaction.
    fn create(&self, ctx: TxContext<'_>) -> Box<dyn TransactionExecutor>;
}

/// Receives chain events synchronously, inside the import critical
/// section.
#[auto_impl::auto_impl(&, Arc)]
pub trait ChainListener: Send + Sync {
    /// A block was imported. `best` is true when the block (or its branch)
    /// became the canonical tip.
    fn on_block(&self, _summary: &BlockSummary, _best: bool) {}

    /// Free-form progress line.
    fn trace(&self, _message: &str) {}
}

/// A listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ChainListener for NoopListener {}

/// The pending transaction pool, notified off the import lock whenever the
/// canonical tip advances.
pub trait PendingPool: Send + Sync {
    /// A new best block was committed; re-evaluate pending transactions.
    fn process_best(&self, block: &SealedBlock, receipts: &[Receipt]);
}

/// Batches database writes behind the import path.
///
/// [`commit`] runs the task immediately and schedules the underlying
/// write caches for flushing; [`flush_sync`] forces everything to disk
/// before returning.
///
/// [`commit`]: FlushManager::commit
/// [`flush_sync`]: FlushManager::flush_sync
pub trait FlushManager: Send + Sync {
    /// Runs the persistence task and schedules a flush.
    fn commit(&self, task: &mut dyn FnMut());

    /// Flushes all pending writes before returning.
    fn flush_sync(&self);
}

/// A [`FlushManager`] that does no background batching.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineFlushManager;

impl FlushManager for InlineFlushManager {
    fn commit(&self, task: &mut dyn FnMut()) {
        task();
    }

    fn flush_sync(&self) {}
}

/// Observes committed blocks so that old trie nodes can be reclaimed.
pub trait PruneManager: Send + Sync {
    /// A block was committed to the main chain.
    fn block_committed(&self, header: &SealedHeader);
}

/// Validates a header against its parent.
#[auto_impl::auto_impl(&, Arc)]
pub trait HeaderValidator: Send + Sync {
    /// Checks the linkage rules between `header` and `parent`.
    fn validate_against_parent(
        &self,
        header: &SealedHeader,
        parent: &SealedHeader,
    ) -> Result<(), ValidationError>;
}

/// The components surrounding the chain core.
#[derive(Clone)]
pub struct ChainExternals {
    /// Block persistence.
    pub store: Arc<dyn BlockStore>,
    /// Receipt persistence.
    pub tx_store: Arc<dyn TransactionStore>,
    /// Transaction execution.
    pub executor_factory: Arc<dyn ExecutorFactory>,
    /// Parent-header rule.
    pub header_validator: Arc<dyn HeaderValidator>,
    /// Per-fork chain rules.
    pub schedule: Arc<dyn ForkSchedule>,
    /// Synchronous event sink.
    pub listener: Arc<dyn ChainListener>,
    /// Write batching.
    pub flush: Arc<dyn FlushManager>,
    /// Trie pruning, if configured.
    pub prune: Option<Arc<dyn PruneManager>>,
}

impl std::fmt::Debug for ChainExternals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainExternals").finish_non_exhaustive()
    }
}
