//! The chain core: block import, fork choice over total difficulty, and
//! canonical state management.

use crate::{
    config::{ImportConfig, RetryPolicy},
    error::{ChainError, ExecutionError},
    events::{ChainEvent, EventSender},
    execute::apply_block,
    externals::{ChainExternals, StateRepository, TransactionInfo},
    metrics::ImportMetrics,
    proofs::{calculate_logs_bloom, calculate_ommers_root, calculate_receipt_root,
        calculate_transaction_root},
    primitives::{
        Block, BlockBody, BlockSummary, Header, Receipt, SealedBlock, TransactionSigned,
    },
    validate::BlockValidator,
};
use alloy_primitives::{hex, Address, BlockNumber, Bytes, B256, U256};
use std::{
    io::Write,
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, warn};

/// Outcome of [`Blockchain::try_to_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportResult {
    /// The block was already known; nothing was done.
    Exist,
    /// The block (or the branch it completes) is now the canonical tip.
    ImportedBest,
    /// The block was stored on a side branch; the tip is unchanged.
    ImportedNotBest,
    /// The block failed validation or a post-execution check; state is
    /// unchanged.
    InvalidBlock,
    /// The block's parent is unknown; the block was not stored.
    NoParent,
}

impl ImportResult {
    /// Whether the block ended up stored on some branch.
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::ImportedBest | Self::ImportedNotBest)
    }

    /// Whether the block advanced the canonical tip.
    pub const fn is_best(&self) -> bool {
        matches!(self, Self::ImportedBest)
    }
}

/// The canonical tip as a value: a state handle rooted at the tip, the tip
/// block, and the chain's total difficulty.
///
/// Fork imports build a second `ChainHead` off the fork parent and run the
/// full state transition against it; the canonical head is replaced only
/// if the fork turns out heavier, so losing forks never touch canonical
/// state.
struct ChainHead {
    /// Live state handle, rooted at `block.state_root` whenever the head
    /// is at rest.
    state: Box<dyn StateRepository>,
    /// The tip block.
    block: SealedBlock,
    /// Cumulative difficulty up to and including `block`.
    total_difficulty: U256,
}

impl ChainHead {
    /// Runs the state transition for `block` on this head.
    ///
    /// On failure the head's state is restored and `None` is returned;
    /// the configured [`RetryPolicy`] may re-execute the block once
    /// against a fresh snapshot for diagnosis.
    fn add(
        &mut self,
        block: &SealedBlock,
        externals: &ChainExternals,
        config: &ImportConfig,
        validator: &BlockValidator,
        on_main: bool,
    ) -> Option<BlockSummary> {
        let summary = self.add_impl(block, externals, config, validator, on_main);
        if summary.is_some() || config.retry == RetryPolicy::Disabled {
            return summary
        }

        warn!(target: "chain::state", number = block.number(), "Reimporting the block for diagnosis");
        thread::sleep(Duration::from_millis(50));
        self.state = self.state.snapshot_at(self.block.state_root());

        let Some(retried) = self.add_impl(block, externals, config, validator, on_main) else {
            warn!(target: "chain::state", number = block.number(), "Second import attempt failed");
            return None
        };
        // the same block passing against the same parent state means the
        // first failure was not the block's fault
        warn!(target: "chain::state", number = block.number(), "Second import attempt succeeded");
        if config.retry == RetryPolicy::Lenient {
            return Some(retried)
        }
        error!(target: "chain::state", "Inconsistent import behavior");
        if !config.test_mode {
            externals.flush.flush_sync();
            std::process::exit(-1);
        }
        Some(retried)
    }

    fn add_impl(
        &mut self,
        block: &SealedBlock,
        externals: &ChainExternals,
        config: &ImportConfig,
        validator: &BlockValidator,
        on_main: bool,
    ) -> Option<BlockSummary> {
        if config.exit_on.is_some_and(|limit| limit < block.number()) {
            info!(target: "chain", "Exiting after block number {}", self.block.number());
            externals.flush.flush_sync();
            std::process::exit(-1);
        }

        if let Err(err) = validator.validate_block(&*self.state, &*externals.store, block) {
            warn!(target: "chain", number = block.number(), %err, "Invalid block");
            return None
        }

        let orig_root = self.state.root();
        let detailed_trace =
            config.trace_start_block.is_some_and(|start| block.number() >= start);

        let mut summary = match self.process_block(block, externals, config, detailed_trace) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(target: "chain", number = block.number(), %err, "Block execution failed");
                self.state.rollback();
                self.state = self.state.snapshot_at(orig_root);
                return None
            }
        };

        let receipts_root = calculate_receipt_root(&summary.receipts);
        if block.header.receipts_root != receipts_root {
            warn!(
                target: "chain",
                given = %block.header.receipts_root,
                computed = %receipts_root,
                "Block's receipts root doesn't match"
            );
            self.state.rollback();
            self.state = self.state.snapshot_at(orig_root);
            return None
        }

        let logs_bloom = calculate_logs_bloom(&summary.receipts);
        if block.header.logs_bloom != logs_bloom {
            warn!(target: "chain", "Block's logs bloom doesn't match");
            self.state.rollback();
            self.state = self.state.snapshot_at(orig_root);
            return None
        }

        if block.state_root() != self.state.root() {
            warn!(
                target: "chain::state",
                number = block.number(),
                given = %block.state_root(),
                computed = %self.state.root(),
                "State conflict or invalid block"
            );
            warn!(
                target: "chain::state",
                "Conflict block dump: {}",
                hex::encode(block.encoded())
            );
            self.state = self.state.snapshot_at(orig_root);
            if config.exit_on_block_conflict && !config.test_mode {
                error!(target: "chain::state", "Lost consensus at block {}, exiting", block.number());
                std::process::exit(1);
            }
            return None
        }

        self.state.commit();
        self.total_difficulty += block.difficulty();
        debug!(target: "chain", td = %self.total_difficulty, "Total difficulty updated");
        summary.total_difficulty = Some(self.total_difficulty);

        let receipts = summary.receipts.clone();
        if config.test_mode {
            self.store_block(block, &receipts, externals, on_main);
        } else {
            let flush = externals.flush.clone();
            let mut unit = || {
                self.store_block(block, &receipts, externals, on_main);
                self.state.commit();
            };
            flush.commit(&mut unit);
        }

        Some(summary)
    }

    /// Executes the block, or returns an empty summary for the genesis
    /// block and for chain-only imports.
    fn process_block(
        &mut self,
        block: &SealedBlock,
        externals: &ChainExternals,
        config: &ImportConfig,
        detailed_trace: bool,
    ) -> Result<BlockSummary, ExecutionError> {
        if !block.is_genesis() && !config.chain_only {
            apply_block(&mut *self.state, block, externals, detailed_trace)
        } else {
            Ok(BlockSummary::empty(block.clone()))
        }
    }

    /// Persists the block and its receipts and moves this head onto it.
    fn store_block(
        &mut self,
        block: &SealedBlock,
        receipts: &[Receipt],
        externals: &ChainExternals,
        on_main: bool,
    ) {
        externals.store.save_block(block.clone(), self.total_difficulty, on_main);
        for (index, receipt) in receipts.iter().enumerate() {
            externals.tx_store.put(
                block.body.transactions[index].hash,
                TransactionInfo { receipt: receipt.clone(), block_hash: block.hash(), index },
            );
        }
        if let Some(prune) = &externals.prune {
            prune.block_committed(&block.header);
        }

        debug!(
            target: "chain",
            number = block.number(),
            hash = %block.hash(),
            td = %self.total_difficulty,
            "Block saved"
        );
        if block.number() % 100 == 0 {
            info!(target: "chain", "Last block added [ #{} ]", block.number());
        }

        self.block = block.clone();
        self.state = self.state.snapshot_at(block.state_root());
    }
}

/// The block-import and chain-management core.
///
/// All state-mutating operations take `&mut self`; wrap the chain in a
/// [`ShareableBlockchain`](crate::ShareableBlockchain) to share it across
/// threads under the single-writer lock.
pub struct Blockchain {
    externals: ChainExternals,
    config: ImportConfig,
    validator: BlockValidator,
    head: ChainHead,
    events: Option<EventSender>,
    metrics: ImportMetrics,
    miner_coinbase: Address,
    miner_extra_data: Bytes,
}

impl Blockchain {
    /// Builds the core around an initialized block store.
    ///
    /// The store must already hold a best block (at least a genesis) and
    /// its total difficulty; the given state handle is re-rooted at the
    /// best block's state root.
    pub fn new(
        externals: ChainExternals,
        config: ImportConfig,
        state: Box<dyn StateRepository>,
    ) -> Result<Self, ChainError> {
        let best = externals.store.best_block().ok_or(ChainError::MissingBestBlock)?;
        let total_difficulty = externals
            .store
            .total_difficulty(best.hash())
            .ok_or(ChainError::MissingTotalDifficulty(best.hash()))?;
        let state = state.snapshot_at(best.state_root());

        info!(
            target: "chain",
            number = best.number(),
            hash = %best.hash(),
            td = %total_difficulty,
            "Chain core initialized"
        );

        let validator = BlockValidator::new(
            externals.schedule.clone(),
            externals.header_validator.clone(),
        );
        Ok(Self {
            validator,
            head: ChainHead { state, block: best, total_difficulty },
            externals,
            config,
            events: None,
            metrics: ImportMetrics::default(),
            miner_coinbase: Address::ZERO,
            miner_extra_data: Bytes::new(),
        })
    }

    /// Routes best-block events onto the given queue.
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Sets the coinbase and extra data stamped into locally assembled
    /// blocks.
    pub fn with_miner(mut self, coinbase: Address, extra_data: Bytes) -> Self {
        self.miner_coinbase = coinbase;
        self.miner_extra_data = extra_data;
        self
    }

    /// Changes the coinbase stamped into locally assembled blocks.
    pub fn set_miner_coinbase(&mut self, coinbase: Address) {
        self.miner_coinbase = coinbase;
    }

    /// Tries to connect a candidate block to the chain.
    ///
    /// Classifies the block as known, tip-extending, forking or orphaned,
    /// runs the state transition where needed, and applies the
    /// heaviest-total-difficulty fork choice.
    pub fn try_to_connect(&mut self, block: &SealedBlock) -> ImportResult {
        debug!(
            target: "chain",
            hash = %block.hash(),
            number = block.number(),
            "Trying to connect block"
        );

        if self.externals.store.max_number() >= block.number() &&
            self.externals.store.contains(block.hash())
        {
            debug!(target: "chain", hash = %block.hash(), "Block already exists");
            self.metrics.known_blocks.increment(1);
            return ImportResult::Exist
        }

        let started = Instant::now();
        let (result, summary) = if self.head.block.is_parent_of(block) {
            // the simple case: the block extends the canonical tip
            self.record_block(block);
            match self.head.add(block, &self.externals, &self.config, &self.validator, true) {
                Some(summary) => (ImportResult::ImportedBest, Some(summary)),
                None => (ImportResult::InvalidBlock, None),
            }
        } else if self.externals.store.contains(block.parent_hash()) {
            let old_total_difficulty = self.head.total_difficulty;
            self.record_block(block);
            match self.try_connect_and_fork(block) {
                Some(summary) => {
                    let result = if summary.better_than(old_total_difficulty) {
                        ImportResult::ImportedBest
                    } else {
                        ImportResult::ImportedNotBest
                    };
                    (result, Some(summary))
                }
                None => (ImportResult::InvalidBlock, None),
            }
        } else {
            (ImportResult::NoParent, None)
        };
        self.metrics.block_execution_duration.record(started.elapsed().as_secs_f64());

        match result {
            ImportResult::ImportedBest => self.metrics.imported_best.increment(1),
            ImportResult::ImportedNotBest => self.metrics.imported_not_best.increment(1),
            ImportResult::InvalidBlock => self.metrics.invalid_blocks.increment(1),
            ImportResult::NoParent => self.metrics.no_parent.increment(1),
            ImportResult::Exist => {}
        }

        if let Some(summary) = summary.filter(|_| result.is_successful()) {
            self.externals.listener.on_block(&summary, result.is_best());
            self.externals.listener.trace(&format!("Block chain size: [ {} ]", self.size()));

            if result.is_best() {
                self.metrics.canonical_height.set(self.head.block.number() as f64);
                if let Some(events) = &self.events {
                    events.send(ChainEvent::BestBlock {
                        block: summary.block.clone(),
                        receipts: summary.receipts.clone(),
                    });
                }
            }
        }

        result
    }

    /// Imports a block whose parent is known but is not the tip.
    ///
    /// The transition runs on a fork head rooted at the fork parent; the
    /// canonical head is replaced only if the fork ends up heavier.
    fn try_connect_and_fork(&mut self, block: &SealedBlock) -> Option<BlockSummary> {
        let parent = self.externals.store.block_by_hash(block.parent_hash())?;
        let Some(parent_td) = self.externals.store.total_difficulty(parent.hash()) else {
            warn!(
                target: "chain",
                parent = %parent.hash(),
                "No total difficulty stored for fork parent"
            );
            return None
        };

        let mut fork = ChainHead {
            state: self.head.state.snapshot_at(parent.state_root()),
            block: parent,
            total_difficulty: parent_td,
        };

        let summary =
            fork.add(block, &self.externals, &self.config, &self.validator, false)?;

        if summary.better_than(self.head.total_difficulty) {
            info!(
                target: "chain",
                old = %self.head.block.hash(),
                new = %block.hash(),
                "Rebranching"
            );
            // the fork has proven heavier; its branch becomes the main
            // chain and its head becomes the canonical head
            self.externals.store.rebranch(block);
            self.metrics.rebranches.increment(1);
            self.head = fork;
        }

        Some(summary)
    }

    /// Assembles a child of `parent` from the given transactions and
    /// uncles, executing it to fill in the post-execution header fields.
    ///
    /// The proof-of-work fields are left zeroed for the miner.
    pub fn create_new_block(
        &mut self,
        parent: &SealedBlock,
        transactions: Vec<TransactionSigned>,
        ommers: Vec<Header>,
    ) -> Result<SealedBlock, ExecutionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        // keep the child strictly after the parent even when clocks drift
        let timestamp = now.max(parent.header.timestamp + 1);
        self.create_new_block_with_timestamp(parent, transactions, ommers, timestamp)
    }

    /// [`Self::create_new_block`] with an explicit timestamp.
    pub fn create_new_block_with_timestamp(
        &mut self,
        parent: &SealedBlock,
        transactions: Vec<TransactionSigned>,
        ommers: Vec<Header>,
        timestamp: u64,
    ) -> Result<SealedBlock, ExecutionError> {
        let number = parent.number() + 1;
        let header = Header {
            parent_hash: parent.hash(),
            ommers_hash: calculate_ommers_root(&ommers),
            beneficiary: self.miner_coinbase,
            transactions_root: calculate_transaction_root(&transactions),
            difficulty: self.externals.schedule.next_difficulty(&parent.header, timestamp),
            number,
            gas_limit: parent.header.gas_limit,
            timestamp,
            extra_data: self.externals.schedule.extra_data(&self.miner_extra_data, number),
            ..Default::default()
        };

        let draft =
            Block { header, body: BlockBody { transactions, ommers } }.seal_slow();

        // run the block on a throwaway snapshot to learn the
        // post-execution header fields
        let mut state = self.head.state.snapshot_at(parent.state_root());
        let summary = apply_block(&mut *state, &draft, &self.externals, false)?;

        let mut block = draft.unseal();
        block.header.state_root = state.root();
        block.header.logs_bloom = calculate_logs_bloom(&summary.receipts);
        block.header.gas_used =
            summary.receipts.last().map_or(0, |receipt| receipt.cumulative_gas_used);
        block.header.receipts_root = calculate_receipt_root(&summary.receipts);

        Ok(block.seal_slow())
    }

    /// The canonical tip.
    pub fn best_block(&self) -> &SealedBlock {
        &self.head.block
    }

    /// Total difficulty of the canonical chain.
    pub fn total_difficulty(&self) -> U256 {
        self.head.total_difficulty
    }

    /// Root of the live state handle.
    pub fn state_root(&self) -> B256 {
        self.head.state.root()
    }

    /// Number of blocks on the canonical chain.
    pub fn size(&self) -> u64 {
        self.head.block.number() + 1
    }

    /// The components surrounding this core.
    pub fn externals(&self) -> &ChainExternals {
        &self.externals
    }

    /// The main-chain block at the given height.
    pub fn block_by_number(&self, number: BlockNumber) -> Option<SealedBlock> {
        self.externals.store.chain_block_by_number(number)
    }

    /// The block with the given hash, on any branch.
    pub fn block_by_hash(&self, hash: B256) -> Option<SealedBlock> {
        self.externals.store.block_by_hash(hash)
    }

    /// Whether a block with the given hash is stored.
    pub fn is_block_known(&self, hash: B256) -> bool {
        self.externals.store.contains(hash)
    }

    /// The main-chain receipt location of a transaction.
    ///
    /// When a transaction executed on several branches, the entry whose
    /// block is on the main chain wins.
    pub fn transaction_info(&self, tx_hash: B256) -> Option<TransactionInfo> {
        let mut infos = self.externals.tx_store.get(tx_hash);
        if infos.len() <= 1 {
            return infos.pop()
        }
        for info in infos {
            let Some(block) = self.externals.store.block_by_hash(info.block_hash) else {
                continue
            };
            let main = self.externals.store.chain_block_by_number(block.number());
            if main.is_some_and(|main| main.hash() == info.block_hash) {
                return Some(info)
            }
        }
        warn!(target: "chain", %tx_hash, "No main chain block for transaction");
        None
    }

    /// Up to `count` block hashes walking the parent chain from `hash`.
    pub fn list_hashes_starting_from(&self, hash: B256, count: usize) -> Vec<B256> {
        self.externals.store.list_hashes_ending_with(hash, count)
    }

    /// Up to `count` main-chain hashes in ascending order starting at the
    /// given height.
    pub fn list_hashes_starting_from_number(
        &self,
        number: BlockNumber,
        count: usize,
    ) -> Vec<B256> {
        let best_number = self.head.block.number();
        if number > best_number {
            return Vec::new()
        }
        let count = count.min((best_number - number + 1) as usize);
        let end = number + count as u64 - 1;

        let Some(end_block) = self.block_by_number(end) else { return Vec::new() };
        let mut hashes =
            self.externals.store.list_hashes_ending_with(end_block.hash(), count);
        hashes.reverse();
        hashes
    }

    /// Flushes outstanding writes. The chain must not be used afterwards.
    pub fn close(&mut self) {
        info!(target: "chain", "Closing chain core");
        self.externals.flush.flush_sync();
    }

    /// Appends the block's encoding to the configured dump file.
    fn record_block(&self, block: &SealedBlock) {
        let Some(path) = &self.config.record_blocks else { return };

        let result = (|| -> std::io::Result<()> {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let mut file =
                std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            if self.head.block.is_genesis() {
                writeln!(file, "{}", hex::encode(self.head.block.encoded()))?;
            }
            writeln!(file, "{}", hex::encode(block.encoded()))
        })();

        if let Err(err) = result {
            error!(target: "chain", %err, "Failed to record block");
        }
    }
}

impl std::fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blockchain")
            .field("best", &self.head.block.hash())
            .field("number", &self.head.block.number())
            .field("total_difficulty", &self.head.total_difficulty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ImportConfig,
        constants::BASE_BLOCK_REWARD,
        externals::{BlockStore, ChainListener, TransactionStore},
        test_utils::{
            setup_chain, setup_chain_full, signer, signer_address, transfer, TestChain,
        },
    };
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const FUND: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

    /// Assembles a child of `parent` mined `ts_delta` seconds after it.
    fn child(
        chain: &mut Blockchain,
        parent: &SealedBlock,
        transactions: Vec<TransactionSigned>,
        ommers: Vec<Header>,
        ts_delta: u64,
    ) -> SealedBlock {
        chain
            .create_new_block_with_timestamp(
                parent,
                transactions,
                ommers,
                parent.header.timestamp + ts_delta,
            )
            .expect("test blocks execute cleanly")
    }

    /// Extends the canonical chain by `count` empty blocks.
    fn grow(test: &mut TestChain, count: usize) -> Vec<SealedBlock> {
        let mut parent = test.chain.best_block().clone();
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            let block = child(&mut test.chain, &parent, vec![], vec![], 10);
            assert_eq!(test.chain.try_to_connect(&block), ImportResult::ImportedBest);
            parent = block.clone();
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn linear_extension() {
        let key = signer(1);
        let sender = signer_address(&key);
        let recipient = Address::repeat_byte(0x42);
        let mut test = setup_chain(&[(sender, FUND)]);

        let mut parent = test.genesis.clone();
        let mut expected_td = test.genesis.difficulty();
        for nonce in 0..10 {
            let tx = transfer(&key, nonce, recipient, 1_000);
            let block = child(&mut test.chain, &parent, vec![tx], vec![], 10);
            assert_eq!(test.chain.try_to_connect(&block), ImportResult::ImportedBest);
            expected_td += block.difficulty();
            parent = block;
        }

        assert_eq!(test.chain.best_block().number(), 10);
        assert_eq!(test.chain.total_difficulty(), expected_td);
        // the live state is rooted at the tip, and the store agrees on
        // the accumulated difficulty
        assert_eq!(test.chain.state_root(), test.chain.best_block().state_root());
        assert_eq!(
            test.store.total_difficulty(test.chain.best_block().hash()),
            Some(expected_td)
        );
        assert_eq!(test.best_balance(recipient), U256::from(10_000));
    }

    #[test]
    fn known_block_returns_exist_without_state_change() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 2);

        let td = test.chain.total_difficulty();
        let root = test.chain.state_root();
        assert_eq!(test.chain.try_to_connect(&blocks[0]), ImportResult::Exist);
        assert_eq!(test.chain.total_difficulty(), td);
        assert_eq!(test.chain.state_root(), root);
        assert_eq!(test.chain.best_block().hash(), blocks[1].hash());
    }

    #[test]
    fn heavier_fork_wins_and_rebranches() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 5);
        let old_td = test.chain.total_difficulty();

        // a faster sibling of block 5 carries more difficulty
        let side = child(&mut test.chain, &blocks[3], vec![], vec![], 1);
        assert!(side.difficulty() > blocks[4].difficulty());

        assert_eq!(test.chain.try_to_connect(&side), ImportResult::ImportedBest);
        assert_eq!(test.chain.best_block().hash(), side.hash());
        assert!(test.chain.total_difficulty() > old_td);
        // the store flipped the main-chain designation at height 5
        assert_eq!(test.store.chain_block_by_number(5).unwrap().hash(), side.hash());
        assert_eq!(test.chain.state_root(), side.state_root());
        assert_eq!(
            test.store.total_difficulty(side.hash()),
            Some(test.chain.total_difficulty())
        );
    }

    #[test]
    fn lighter_fork_is_stored_on_a_side_branch() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 5);
        let old_td = test.chain.total_difficulty();
        let old_root = test.chain.state_root();

        // a slower sibling of block 5 carries less difficulty
        let side = child(&mut test.chain, &blocks[3], vec![], vec![], 25);
        assert!(side.difficulty() < blocks[4].difficulty());

        assert_eq!(test.chain.try_to_connect(&side), ImportResult::ImportedNotBest);
        assert_eq!(test.chain.best_block().hash(), blocks[4].hash());
        assert_eq!(test.chain.total_difficulty(), old_td);
        assert_eq!(test.chain.state_root(), old_root);
        // persisted, but off the main chain
        assert!(test.store.contains(side.hash()));
        assert_eq!(test.store.chain_block_by_number(5).unwrap().hash(), blocks[4].hash());
        assert_eq!(test.store.blocks_by_number(5).len(), 2);
    }

    #[test]
    fn deep_fork_overtakes_across_heights() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 5);

        // a lighter sibling of block 5 first, then its child; together
        // they outweigh the canonical chain
        let side5 = child(&mut test.chain, &blocks[3], vec![], vec![], 25);
        assert_eq!(test.chain.try_to_connect(&side5), ImportResult::ImportedNotBest);
        let side6 = child(&mut test.chain, &side5, vec![], vec![], 10);
        assert_eq!(test.chain.try_to_connect(&side6), ImportResult::ImportedBest);

        assert_eq!(test.chain.best_block().hash(), side6.hash());
        assert_eq!(test.store.chain_block_by_number(5).unwrap().hash(), side5.hash());
        assert_eq!(test.store.chain_block_by_number(6).unwrap().hash(), side6.hash());
    }

    #[test]
    fn wrong_state_root_is_rejected_without_side_effects() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 1);

        let mut bad = child(&mut test.chain, &blocks[0], vec![], vec![], 10).unseal();
        bad.header.state_root = B256::repeat_byte(9);
        let bad = bad.seal_slow();

        let td = test.chain.total_difficulty();
        let root = test.chain.state_root();
        let best = test.chain.best_block().hash();

        assert_eq!(test.chain.try_to_connect(&bad), ImportResult::InvalidBlock);
        assert_eq!(test.chain.total_difficulty(), td);
        assert_eq!(test.chain.state_root(), root);
        assert_eq!(test.chain.best_block().hash(), best);
        assert!(!test.store.contains(bad.hash()));
    }

    #[test]
    fn wrong_receipts_root_is_rejected() {
        let key = signer(2);
        let mut test = setup_chain(&[(signer_address(&key), FUND)]);

        let tx = transfer(&key, 0, Address::repeat_byte(0x33), 1);
        let mut bad =
            child(&mut test.chain, &test.genesis.clone(), vec![tx], vec![], 10).unseal();
        bad.header.receipts_root = B256::repeat_byte(7);
        let bad = bad.seal_slow();

        assert_eq!(test.chain.try_to_connect(&bad), ImportResult::InvalidBlock);
        assert_eq!(test.chain.best_block().hash(), test.genesis.hash());
    }

    #[test]
    fn unknown_parent_is_not_stored() {
        let mut test = setup_chain(&[]);
        let mut orphan =
            child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 10).unseal();
        orphan.header.parent_hash = B256::repeat_byte(0x55);
        let orphan = orphan.seal_slow();

        assert_eq!(test.chain.try_to_connect(&orphan), ImportResult::NoParent);
        assert!(!test.store.contains(orphan.hash()));
    }

    #[test]
    fn wrong_nonce_is_rejected() {
        let key = signer(4);
        let mut test = setup_chain(&[(signer_address(&key), FUND)]);

        // account nonce is zero; the transaction claims five
        let tx = transfer(&key, 5, Address::repeat_byte(0x11), 1);
        let block = child(&mut test.chain, &test.genesis.clone(), vec![tx], vec![], 10);

        assert_eq!(test.chain.try_to_connect(&block), ImportResult::InvalidBlock);
        assert_eq!(test.chain.best_block().hash(), test.genesis.hash());
    }

    #[test]
    fn uncle_inclusion_pays_discounted_reward() {
        let uncle_coinbase = Address::repeat_byte(0xee);
        let mut test = setup_chain(&[]);

        let b1 = grow(&mut test, 1).remove(0);

        // a sibling of block 1 mined by someone else becomes the uncle
        test.chain.set_miner_coinbase(uncle_coinbase);
        let u1 = child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 11);
        test.chain.set_miner_coinbase(Address::ZERO);
        assert_eq!(test.chain.try_to_connect(&u1), ImportResult::ImportedNotBest);

        let b2 = grow(&mut test, 1).remove(0);
        let b3 = child(
            &mut test.chain,
            &b2,
            vec![],
            vec![u1.header.header.clone()],
            10,
        );
        assert_eq!(test.chain.try_to_connect(&b3), ImportResult::ImportedBest);

        // uncle at depth two earns 6/8 of the block reward
        let uncle_reward = BASE_BLOCK_REWARD * U256::from(6) / U256::from(8);
        assert_eq!(test.best_balance(uncle_coinbase), uncle_reward);
        // the miner earned three block rewards plus one inclusion reward
        let miner_reward =
            BASE_BLOCK_REWARD * U256::from(3) + BASE_BLOCK_REWARD / U256::from(32);
        assert_eq!(test.best_balance(Address::ZERO), miner_reward);

        assert_eq!(b1.number(), 1);
    }

    #[test]
    fn duplicate_uncle_is_rejected() {
        let mut test = setup_chain(&[]);
        grow(&mut test, 1);

        let u1 = child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 11);
        assert_eq!(test.chain.try_to_connect(&u1), ImportResult::ImportedNotBest);
        grow(&mut test, 1);

        let tip = test.chain.best_block().clone();
        let b3 = child(
            &mut test.chain,
            &tip,
            vec![],
            vec![u1.header.header.clone()],
            10,
        );
        assert_eq!(test.chain.try_to_connect(&b3), ImportResult::ImportedBest);

        // the same uncle again, two generations later
        let tip = test.chain.best_block().clone();
        let b4 = child(
            &mut test.chain,
            &tip,
            vec![],
            vec![u1.header.header.clone()],
            10,
        );
        assert_eq!(test.chain.try_to_connect(&b4), ImportResult::InvalidBlock);
    }

    #[test]
    fn ancestor_as_uncle_is_rejected() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 3);

        let tip = test.chain.best_block().clone();
        let bad = child(
            &mut test.chain,
            &tip,
            vec![],
            vec![blocks[1].header.header.clone()],
            10,
        );
        assert_eq!(test.chain.try_to_connect(&bad), ImportResult::InvalidBlock);
    }

    #[test]
    fn uncle_at_the_generation_boundary_is_accepted() {
        let mut test = setup_chain(&[]);
        let u1 = {
            grow(&mut test, 1);
            let u1 = child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 11);
            assert_eq!(test.chain.try_to_connect(&u1), ImportResult::ImportedNotBest);
            u1
        };
        // heights 2..=6; the uncle's parent (genesis) sits exactly at
        // block.number - UNCLE_GENERATION_LIMIT for block 7
        grow(&mut test, 5);
        let tip = test.chain.best_block().clone();
        let b7 = child(
            &mut test.chain,
            &tip,
            vec![],
            vec![u1.header.header.clone()],
            10,
        );
        assert_eq!(b7.number(), 7);
        assert_eq!(test.chain.try_to_connect(&b7), ImportResult::ImportedBest);
    }

    #[test]
    fn uncle_one_generation_too_old_is_rejected() {
        let mut test = setup_chain(&[]);
        let u1 = {
            grow(&mut test, 1);
            let u1 = child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 11);
            assert_eq!(test.chain.try_to_connect(&u1), ImportResult::ImportedNotBest);
            u1
        };
        grow(&mut test, 6);
        let tip = test.chain.best_block().clone();
        let b8 = child(
            &mut test.chain,
            &tip,
            vec![],
            vec![u1.header.header.clone()],
            10,
        );
        assert_eq!(b8.number(), 8);
        assert_eq!(test.chain.try_to_connect(&b8), ImportResult::InvalidBlock);
    }

    #[test]
    fn transaction_info_prefers_the_main_chain() {
        let key = signer(5);
        let mut test = setup_chain(&[(signer_address(&key), FUND)]);

        let tx = transfer(&key, 0, Address::repeat_byte(0x21), 500);
        let b1 = child(
            &mut test.chain,
            &test.genesis.clone(),
            vec![tx.clone()],
            vec![],
            10,
        );
        assert_eq!(test.chain.try_to_connect(&b1), ImportResult::ImportedBest);

        // the same transaction on an equally heavy side branch
        let side = child(
            &mut test.chain,
            &test.genesis.clone(),
            vec![tx.clone()],
            vec![],
            11,
        );
        assert_eq!(test.chain.try_to_connect(&side), ImportResult::ImportedNotBest);

        assert_eq!(test.tx_store.get(tx.hash).len(), 2);
        let info = test.chain.transaction_info(tx.hash).expect("transaction is known");
        assert_eq!(info.block_hash, b1.hash());
        assert_eq!(info.index, 0);
    }

    #[test]
    fn replaying_the_same_blocks_is_deterministic() {
        let key = signer(6);
        let accounts = [(signer_address(&key), FUND)];
        let mut a = setup_chain(&accounts);
        let mut b = setup_chain(&accounts);

        let mut parent = a.genesis.clone();
        for nonce in 0..3 {
            let tx = transfer(&key, nonce, Address::repeat_byte(0x77), 9);
            let block = child(&mut a.chain, &parent, vec![tx], vec![], 10);
            assert_eq!(a.chain.try_to_connect(&block), ImportResult::ImportedBest);
            assert_eq!(b.chain.try_to_connect(&block), ImportResult::ImportedBest);
            parent = block;
        }

        assert_eq!(a.chain.state_root(), b.chain.state_root());
        assert_eq!(a.chain.total_difficulty(), b.chain.total_difficulty());
        assert_eq!(a.chain.best_block().hash(), b.chain.best_block().hash());
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<(u64, bool)>>,
    }

    impl ChainListener for RecordingListener {
        fn on_block(&self, summary: &BlockSummary, best: bool) {
            // committed summaries always carry their total difficulty
            assert!(summary.total_difficulty.is_some());
            self.events.lock().push((summary.block.number(), best));
        }
    }

    #[test]
    fn listener_observes_imports_in_order() {
        let listener = Arc::new(RecordingListener::default());
        let mut test =
            setup_chain_full(&[], ImportConfig::for_tests(), listener.clone());

        let blocks = grow(&mut test, 2);
        let side = child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 25);
        assert_eq!(test.chain.try_to_connect(&side), ImportResult::ImportedNotBest);

        assert_eq!(*listener.events.lock(), vec![(1, true), (2, true), (1, false)]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn assembled_blocks_carry_execution_results() {
        let key = signer(7);
        let mut test = setup_chain(&[(signer_address(&key), FUND)]);

        let tx = transfer(&key, 0, Address::repeat_byte(0x13), 42);
        let block = child(&mut test.chain, &test.genesis.clone(), vec![tx], vec![], 10);

        assert_eq!(block.header.gas_used, 21_000);
        assert_ne!(block.header.receipts_root, test.genesis.header.receipts_root);
        assert_ne!(block.header.logs_bloom, alloy_primitives::Bloom::default());
        assert_matches!(
            test.chain.try_to_connect(&block),
            ImportResult::ImportedBest
        );
    }

    #[test]
    fn hash_listing_is_ascending_from_a_height() {
        let mut test = setup_chain(&[]);
        let blocks = grow(&mut test, 4);

        let hashes = test.chain.list_hashes_starting_from_number(2, 10);
        assert_eq!(
            hashes,
            vec![blocks[1].hash(), blocks[2].hash(), blocks[3].hash()]
        );
        assert!(test.chain.list_hashes_starting_from_number(9, 3).is_empty());
    }

    #[derive(Default)]
    struct RecordingPool {
        seen: Mutex<Vec<u64>>,
    }

    impl crate::externals::PendingPool for RecordingPool {
        fn process_best(&self, block: &SealedBlock, _receipts: &[Receipt]) {
            self.seen.lock().push(block.number());
        }
    }

    #[test]
    fn best_blocks_reach_the_pending_pool_in_order() {
        let pool = Arc::new(RecordingPool::default());
        let (dispatcher, sender) = crate::events::EventDispatcher::spawn(pool.clone(), 8);

        let mut test = setup_chain(&[]).with_event_sender(sender);

        grow(&mut test, 2);
        let side = child(&mut test.chain, &test.genesis.clone(), vec![], vec![], 25);
        assert_eq!(test.chain.try_to_connect(&side), ImportResult::ImportedNotBest);

        // dropping the core drops the sender and drains the queue
        drop(test);
        dispatcher.join();
        assert_eq!(*pool.seen.lock(), vec![1, 2]);
    }
}
