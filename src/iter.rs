//! Lazy header and body enumeration for peer serving.
//!
//! The iterators are standalone values over a [`HeaderSource`] capability
//! and a best-number snapshot taken at construction, so a concurrent
//! import cannot extend or shrink a walk that is already underway.

use crate::{
    externals::BlockStore,
    primitives::SealedHeader,
};
use alloy_primitives::{BlockNumber, Bytes, B256};
use std::sync::Arc;

/// Designates the block a header walk starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIdentifier {
    /// Start from the block with this hash.
    Hash(B256),
    /// Start from the main-chain block at this height.
    Number(BlockNumber),
}

impl From<B256> for BlockIdentifier {
    fn from(hash: B256) -> Self {
        Self::Hash(hash)
    }
}

impl From<BlockNumber> for BlockIdentifier {
    fn from(number: BlockNumber) -> Self {
        Self::Number(number)
    }
}

/// What a header walk needs from the chain: main-chain headers by height,
/// headers by hash, and the height of the tip.
pub trait HeaderSource {
    /// The main-chain header at the given height.
    fn chain_header_by_number(&self, number: BlockNumber) -> Option<SealedHeader>;

    /// The header with the given hash, on any branch.
    fn header_by_hash(&self, hash: B256) -> Option<SealedHeader>;

    /// Height of the best block.
    fn best_number(&self) -> BlockNumber;
}

impl<T: BlockStore + ?Sized> HeaderSource for T {
    fn chain_header_by_number(&self, number: BlockNumber) -> Option<SealedHeader> {
        self.chain_block_by_number(number).map(|block| block.header)
    }

    fn header_by_hash(&self, hash: B256) -> Option<SealedHeader> {
        self.block_by_hash(hash).map(|block| block.header)
    }

    fn best_number(&self) -> BlockNumber {
        self.best_block().map_or(0, |block| block.number())
    }
}

/// Walks main-chain headers from a start block, stepping `skip + 1`
/// heights at a time, yielding at most `limit` headers.
///
/// The first yielded header is the start header itself. Walks addressed by
/// a hash that is not on the main chain are empty. Stepping outside
/// `[0, best]` ends the walk; `best` is snapshotted at construction.
#[derive(Debug)]
pub struct HeadersIterator<S> {
    source: S,
    cursor: Option<SealedHeader>,
    best_number: BlockNumber,
    skip: u64,
    remaining: usize,
    reverse: bool,
}

impl<S: HeaderSource> HeadersIterator<S> {
    /// Builds a header walk. See the type docs for the contract.
    pub fn new(source: S, start: BlockIdentifier, skip: u64, limit: usize, reverse: bool) -> Self {
        let start_header = match start {
            BlockIdentifier::Hash(hash) => source.header_by_hash(hash).filter(|header| {
                // a hash off the main chain yields an empty walk
                source
                    .chain_header_by_number(header.number)
                    .is_some_and(|main| main.hash == header.hash)
            }),
            BlockIdentifier::Number(number) => source.chain_header_by_number(number),
        };
        let best_number = source.best_number();

        Self { source, cursor: start_header, best_number, skip, remaining: limit, reverse }
    }
}

impl<S: HeaderSource> Iterator for HeadersIterator<S> {
    type Item = SealedHeader;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None
        }
        let current = self.cursor.take()?;
        self.remaining -= 1;

        if self.remaining > 0 {
            let step = self.skip + 1;
            let next_number = if self.reverse {
                current.number.checked_sub(step)
            } else {
                let next = current.number + step;
                (next <= self.best_number).then_some(next)
            };
            self.cursor =
                next_number.and_then(|number| self.source.chain_header_by_number(number));
        }

        Some(current)
    }
}

/// Yields the RLP-encoded bodies of the given blocks in order, ending at
/// the first hash the store does not know.
pub struct BodiesIterator {
    store: Arc<dyn BlockStore>,
    hashes: std::vec::IntoIter<B256>,
}

impl std::fmt::Debug for BodiesIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodiesIterator").field("hashes", &self.hashes).finish()
    }
}

impl BodiesIterator {
    /// Builds a body walk over the given hashes.
    pub fn new(store: Arc<dyn BlockStore>, hashes: Vec<B256>) -> Self {
        Self { store, hashes: hashes.into_iter() }
    }
}

impl Iterator for BodiesIterator {
    type Item = Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.hashes.next()?;
        match self.store.block_by_hash(hash) {
            Some(block) => Some(block.encoded_body()),
            None => {
                // a missing block ends the walk for good
                self.hashes = Vec::new().into_iter();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        externals::BlockStore,
        primitives::{Block, Header},
        test_utils::MemoryBlockStore,
    };
    use alloy_primitives::U256;

    fn store_with_chain(len: u64) -> (Arc<MemoryBlockStore>, Vec<crate::primitives::SealedBlock>) {
        let store = Arc::new(MemoryBlockStore::default());
        let mut blocks = Vec::new();
        let mut parent_hash = B256::ZERO;
        for number in 0..=len {
            let block = Block {
                header: Header { number, parent_hash, timestamp: number, ..Default::default() },
                body: Default::default(),
            }
            .seal_slow();
            store.save_block(block.clone(), U256::from(number), true);
            parent_hash = block.hash();
            blocks.push(block);
        }
        (store, blocks)
    }

    #[test]
    fn forward_walk_starts_at_the_start_header() {
        let (store, blocks) = store_with_chain(8);
        let numbers: Vec<_> =
            HeadersIterator::new(store, BlockIdentifier::Number(2), 0, 3, false)
                .map(|header| header.number)
                .collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert_eq!(blocks.len(), 9);
    }

    #[test]
    fn skip_steps_over_headers() {
        let (store, _) = store_with_chain(8);
        let numbers: Vec<_> =
            HeadersIterator::new(store, BlockIdentifier::Number(0), 2, 4, false)
                .map(|header| header.number)
                .collect();
        assert_eq!(numbers, vec![0, 3, 6]);
    }

    #[test]
    fn reverse_walk_stops_at_zero() {
        let (store, _) = store_with_chain(8);
        let numbers: Vec<_> =
            HeadersIterator::new(store, BlockIdentifier::Number(8), 1, 10, true)
                .map(|header| header.number)
                .collect();
        assert_eq!(numbers, vec![8, 6, 4, 2, 0]);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        let (store, _) = store_with_chain(3);
        assert_eq!(
            HeadersIterator::new(store, BlockIdentifier::Number(1), 0, 0, false).count(),
            0
        );
    }

    #[test]
    fn walk_never_passes_the_best_snapshot() {
        let (store, _) = store_with_chain(4);
        let numbers: Vec<_> =
            HeadersIterator::new(store, BlockIdentifier::Number(3), 0, 10, false)
                .map(|header| header.number)
                .collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[test]
    fn off_chain_hash_yields_nothing() {
        let (store, blocks) = store_with_chain(4);

        // a sibling of block 2 that is stored but not canonical
        let side = Block {
            header: Header {
                number: 2,
                parent_hash: blocks[1].hash(),
                timestamp: 99,
                ..Default::default()
            },
            body: Default::default(),
        }
        .seal_slow();
        store.save_block(side.clone(), U256::from(2), false);

        assert_eq!(
            HeadersIterator::new(
                store.clone(),
                BlockIdentifier::Hash(side.hash()),
                0,
                5,
                false
            )
            .count(),
            0
        );
        // while a canonical hash starts the walk normally
        let numbers: Vec<_> = HeadersIterator::new(
            store,
            BlockIdentifier::Hash(blocks[2].hash()),
            0,
            2,
            false,
        )
        .map(|header| header.number)
        .collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[test]
    fn bodies_stop_at_the_first_missing_hash() {
        let (store, blocks) = store_with_chain(3);
        let hashes = vec![
            blocks[1].hash(),
            B256::repeat_byte(0xaa),
            blocks[2].hash(),
        ];
        let mut iter = BodiesIterator::new(store, hashes);
        assert_eq!(iter.next(), Some(blocks[1].encoded_body()));
        assert_eq!(iter.next(), None);
        // the walk stays finished even though a known hash follows
        assert_eq!(iter.next(), None);
    }
}
