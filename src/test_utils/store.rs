//! In-memory block and transaction stores.

use crate::{
    externals::{BlockStore, TransactionInfo, TransactionStore},
    primitives::SealedBlock,
};
use alloy_primitives::{BlockNumber, B256, U256};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct StoredBlock {
    block: SealedBlock,
    total_difficulty: U256,
}

#[derive(Debug, Default)]
struct StoreInner {
    blocks: HashMap<B256, StoredBlock>,
    by_number: HashMap<BlockNumber, Vec<B256>>,
    canonical: BTreeMap<BlockNumber, B256>,
    max_number: BlockNumber,
}

/// An in-memory [`BlockStore`] that tracks main-chain designation per
/// height and supports rebranching.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    inner: RwLock<StoreInner>,
}

impl BlockStore for MemoryBlockStore {
    fn contains(&self, hash: B256) -> bool {
        self.inner.read().blocks.contains_key(&hash)
    }

    fn block_by_hash(&self, hash: B256) -> Option<SealedBlock> {
        self.inner.read().blocks.get(&hash).map(|stored| stored.block.clone())
    }

    fn chain_block_by_number(&self, number: BlockNumber) -> Option<SealedBlock> {
        let inner = self.inner.read();
        let hash = inner.canonical.get(&number)?;
        inner.blocks.get(hash).map(|stored| stored.block.clone())
    }

    fn blocks_by_number(&self, number: BlockNumber) -> Vec<SealedBlock> {
        let inner = self.inner.read();
        inner
            .by_number
            .get(&number)
            .into_iter()
            .flatten()
            .filter_map(|hash| inner.blocks.get(hash))
            .map(|stored| stored.block.clone())
            .collect()
    }

    fn best_block(&self) -> Option<SealedBlock> {
        let inner = self.inner.read();
        let (_, hash) = inner.canonical.last_key_value()?;
        inner.blocks.get(hash).map(|stored| stored.block.clone())
    }

    fn max_number(&self) -> BlockNumber {
        self.inner.read().max_number
    }

    fn total_difficulty(&self, hash: B256) -> Option<U256> {
        self.inner.read().blocks.get(&hash).map(|stored| stored.total_difficulty)
    }

    fn save_block(&self, block: SealedBlock, total_difficulty: U256, on_main_chain: bool) {
        let mut inner = self.inner.write();
        let hash = block.hash();
        let number = block.number();

        inner.max_number = inner.max_number.max(number);
        let slot = inner.by_number.entry(number).or_default();
        if !slot.contains(&hash) {
            slot.push(hash);
        }
        if on_main_chain {
            inner.canonical.insert(number, hash);
        }
        inner.blocks.insert(hash, StoredBlock { block, total_difficulty });
    }

    fn rebranch(&self, head: &SealedBlock) {
        let mut inner = self.inner.write();

        // the old branch may reach higher than the new head
        let stale = inner.canonical.split_off(&(head.number() + 1));
        drop(stale);

        // walk down the new branch until it rejoins the main chain
        let mut cursor = head.clone();
        loop {
            let number = cursor.number();
            if inner.canonical.get(&number) == Some(&cursor.hash()) {
                break
            }
            inner.canonical.insert(number, cursor.hash());
            if number == 0 {
                break
            }
            match inner.blocks.get(&cursor.parent_hash()) {
                Some(stored) => cursor = stored.block.clone(),
                None => break,
            }
        }
    }

    fn list_hashes_ending_with(&self, hash: B256, count: usize) -> Vec<B256> {
        let inner = self.inner.read();
        let mut hashes = Vec::with_capacity(count);
        let mut cursor = inner.blocks.get(&hash);
        while let Some(stored) = cursor {
            if hashes.len() == count {
                break
            }
            hashes.push(stored.block.hash());
            cursor = inner.blocks.get(&stored.block.parent_hash());
        }
        hashes
    }
}

/// An in-memory [`TransactionStore`].
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    inner: RwLock<HashMap<B256, Vec<TransactionInfo>>>,
}

impl TransactionStore for MemoryTransactionStore {
    fn put(&self, tx_hash: B256, info: TransactionInfo) {
        let mut inner = self.inner.write();
        let infos = inner.entry(tx_hash).or_default();
        if !infos.iter().any(|existing| existing.block_hash == info.block_hash) {
            infos.push(info);
        }
    }

    fn get(&self, tx_hash: B256) -> Vec<TransactionInfo> {
        self.inner.read().get(&tx_hash).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Block, Header};

    fn block(number: BlockNumber, parent: B256, seed: u8) -> SealedBlock {
        Block {
            header: Header {
                number,
                parent_hash: parent,
                extra_data: vec![seed].into(),
                ..Default::default()
            },
            body: Default::default(),
        }
        .seal_slow()
    }

    #[test]
    fn rebranch_flips_the_main_chain() {
        let store = MemoryBlockStore::default();
        let genesis = block(0, B256::ZERO, 0);
        let a1 = block(1, genesis.hash(), 1);
        let a2 = block(2, a1.hash(), 2);
        let b1 = block(1, genesis.hash(), 3);

        store.save_block(genesis.clone(), U256::from(10), true);
        store.save_block(a1.clone(), U256::from(20), true);
        store.save_block(a2.clone(), U256::from(30), true);
        store.save_block(b1.clone(), U256::from(35), false);

        assert_eq!(store.best_block().unwrap().hash(), a2.hash());

        store.rebranch(&b1);
        assert_eq!(store.chain_block_by_number(1).unwrap().hash(), b1.hash());
        assert_eq!(store.best_block().unwrap().hash(), b1.hash());
        // both branches stay stored
        assert_eq!(store.blocks_by_number(1).len(), 2);
        assert_eq!(store.max_number(), 2);
    }

    #[test]
    fn hash_walk_descends_the_parent_chain() {
        let store = MemoryBlockStore::default();
        let genesis = block(0, B256::ZERO, 0);
        let b1 = block(1, genesis.hash(), 1);
        let b2 = block(2, b1.hash(), 2);
        store.save_block(genesis.clone(), U256::from(1), true);
        store.save_block(b1.clone(), U256::from(2), true);
        store.save_block(b2.clone(), U256::from(3), true);

        assert_eq!(
            store.list_hashes_ending_with(b2.hash(), 2),
            vec![b2.hash(), b1.hash()]
        );
        assert_eq!(store.list_hashes_ending_with(b2.hash(), 10).len(), 3);
    }
}
