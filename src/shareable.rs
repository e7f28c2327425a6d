//! Wrapper around [`Blockchain`] that allows it to be shared.

use crate::{
    blockchain::{Blockchain, ImportResult},
    error::ExecutionError,
    externals::TransactionInfo,
    iter::{BlockIdentifier, BodiesIterator, HeadersIterator},
    primitives::{Header, SealedBlock, SealedHeader, TransactionSigned},
};
use alloy_primitives::{BlockNumber, B256, U256};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Shareable chain core behind the single-writer lock.
///
/// Every operation, including reads of the canonical tip, takes the lock;
/// only one import is ever in flight. The query iterators capture what
/// they need under the lock and then walk the store without holding it.
#[derive(Debug, Clone)]
pub struct ShareableBlockchain {
    /// The wrapped chain core.
    pub chain: Arc<Mutex<Blockchain>>,
}

impl ShareableBlockchain {
    /// Wraps a chain core for sharing.
    pub fn new(chain: Blockchain) -> Self {
        Self { chain: Arc::new(Mutex::new(chain)) }
    }

    /// See [`Blockchain::try_to_connect`].
    pub fn try_to_connect(&self, block: &SealedBlock) -> ImportResult {
        trace!(
            target: "chain",
            hash = %block.hash(),
            number = block.number(),
            "Connecting block"
        );
        self.chain.lock().try_to_connect(block)
    }

    /// See [`Blockchain::create_new_block`].
    pub fn create_new_block(
        &self,
        parent: &SealedBlock,
        transactions: Vec<TransactionSigned>,
        ommers: Vec<Header>,
    ) -> Result<SealedBlock, ExecutionError> {
        self.chain.lock().create_new_block(parent, transactions, ommers)
    }

    /// The canonical tip.
    pub fn best_block(&self) -> SealedBlock {
        self.chain.lock().best_block().clone()
    }

    /// Hash of the canonical tip.
    pub fn best_block_hash(&self) -> B256 {
        self.chain.lock().best_block().hash()
    }

    /// Total difficulty of the canonical chain.
    pub fn total_difficulty(&self) -> U256 {
        self.chain.lock().total_difficulty()
    }

    /// Number of blocks on the canonical chain.
    pub fn size(&self) -> u64 {
        self.chain.lock().size()
    }

    /// The main-chain block at the given height.
    pub fn block_by_number(&self, number: BlockNumber) -> Option<SealedBlock> {
        self.chain.lock().block_by_number(number)
    }

    /// The block with the given hash, on any branch.
    pub fn block_by_hash(&self, hash: B256) -> Option<SealedBlock> {
        self.chain.lock().block_by_hash(hash)
    }

    /// The main-chain receipt location of a transaction.
    pub fn transaction_info(&self, tx_hash: B256) -> Option<TransactionInfo> {
        self.chain.lock().transaction_info(tx_hash)
    }

    /// Up to `count` block hashes walking the parent chain from `hash`.
    pub fn list_hashes_starting_from(&self, hash: B256, count: usize) -> Vec<B256> {
        self.chain.lock().list_hashes_starting_from(hash, count)
    }

    /// Up to `count` main-chain hashes in ascending order from a height.
    pub fn list_hashes_starting_from_number(
        &self,
        number: BlockNumber,
        count: usize,
    ) -> Vec<B256> {
        self.chain.lock().list_hashes_starting_from_number(number, count)
    }

    /// A lazy walk over main-chain headers; see [`HeadersIterator`].
    pub fn headers_starting_from(
        &self,
        start: BlockIdentifier,
        skip: u64,
        limit: usize,
        reverse: bool,
    ) -> HeadersIterator<Arc<dyn crate::externals::BlockStore>> {
        trace!(target: "chain", ?start, skip, limit, reverse, "Serving headers");
        let store = self.chain.lock().externals().store.clone();
        HeadersIterator::new(store, start, skip, limit, reverse)
    }

    /// Collected form of [`Self::headers_starting_from`].
    pub fn list_headers_starting_from(
        &self,
        start: BlockIdentifier,
        skip: u64,
        limit: usize,
        reverse: bool,
    ) -> Vec<SealedHeader> {
        self.headers_starting_from(start, skip, limit, reverse).collect()
    }

    /// A lazy walk over encoded block bodies; see [`BodiesIterator`].
    pub fn bodies_by_hashes(&self, hashes: Vec<B256>) -> BodiesIterator {
        let store = self.chain.lock().externals().store.clone();
        BodiesIterator::new(store, hashes)
    }

    /// Flushes outstanding writes and releases the core.
    pub fn close(&self) {
        self.chain.lock().close();
    }
}
