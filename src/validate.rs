//! Pre-execution block validation: parent rules, transaction trie root,
//! sender nonces and uncle checks.

use crate::{
    config::ForkSchedule,
    constants::MAXIMUM_EXTRA_DATA_SIZE,
    error::{GotExpected, ValidationError},
    externals::{BlockStore, HeaderValidator, StateRepository},
    proofs::{calculate_ommers_root, calculate_transaction_root},
    primitives::{SealedBlock, SealedHeader},
};
use alloy_primitives::{Address, B256};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// The standard linkage rules between a header and its parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentRules;

impl HeaderValidator for ParentRules {
    fn validate_against_parent(
        &self,
        header: &SealedHeader,
        parent: &SealedHeader,
    ) -> Result<(), ValidationError> {
        if header.number != parent.number + 1 {
            return Err(ValidationError::ParentNumberMismatch {
                parent_number: parent.number,
                block_number: header.number,
            })
        }
        if header.timestamp <= parent.timestamp {
            return Err(ValidationError::TimestampNotAfterParent {
                parent_timestamp: parent.timestamp,
                timestamp: header.timestamp,
            })
        }
        if header.gas_used > header.gas_limit {
            return Err(ValidationError::GasUsedExceedsGasLimit {
                gas_used: header.gas_used,
                gas_limit: header.gas_limit,
            })
        }
        // the limit may drift by at most 1/1024 of the parent's per block
        let bound = parent.gas_limit / 1024;
        if header.gas_limit.abs_diff(parent.gas_limit) >= bound.max(1) {
            return Err(ValidationError::GasLimitOutOfBounds {
                parent_gas_limit: parent.gas_limit,
                child_gas_limit: header.gas_limit,
            })
        }
        if header.extra_data.len() > MAXIMUM_EXTRA_DATA_SIZE {
            return Err(ValidationError::ExtraDataTooLong { len: header.extra_data.len() })
        }
        Ok(())
    }
}

/// Structural and semantic checks on a candidate block, run before its
/// transactions are executed.
#[derive(Clone)]
pub struct BlockValidator {
    schedule: Arc<dyn ForkSchedule>,
    header_validator: Arc<dyn HeaderValidator>,
}

impl BlockValidator {
    /// Builds a validator from the fork rules and the parent-header rule.
    pub fn new(
        schedule: Arc<dyn ForkSchedule>,
        header_validator: Arc<dyn HeaderValidator>,
    ) -> Self {
        Self { schedule, header_validator }
    }

    /// Validates a candidate block against its parent and the account
    /// state at the parent.
    ///
    /// The genesis block is valid by definition.
    pub fn validate_block(
        &self,
        state: &dyn StateRepository,
        store: &dyn BlockStore,
        block: &SealedBlock,
    ) -> Result<(), ValidationError> {
        if block.is_genesis() {
            return Ok(())
        }

        self.validate_header(store, &block.header)?;

        let computed = calculate_transaction_root(&block.body.transactions);
        if computed != block.header.transactions_root {
            return Err(ValidationError::TransactionRootMismatch(GotExpected {
                got: computed,
                expected: block.header.transactions_root,
            }))
        }

        self.validate_uncles(store, block)?;
        self.validate_nonces(state, block)
    }

    /// Applies the parent-header rule to a single header.
    pub fn validate_header(
        &self,
        store: &dyn BlockStore,
        header: &SealedHeader,
    ) -> Result<(), ValidationError> {
        let parent = store
            .block_by_hash(header.parent_hash)
            .ok_or(ValidationError::UnknownParent(header.parent_hash))?;
        self.header_validator.validate_against_parent(header, &parent.header)
    }

    /// Every transaction must have a recoverable sender and carry that
    /// sender's next nonce.
    fn validate_nonces(
        &self,
        state: &dyn StateRepository,
        block: &SealedBlock,
    ) -> Result<(), ValidationError> {
        let mut next_nonce: HashMap<Address, u64> = HashMap::new();
        for tx in &block.body.transactions {
            let sender =
                tx.recover_signer().ok_or(ValidationError::UnrecoverableSender(tx.hash))?;
            let expected = *next_nonce.entry(sender).or_insert_with(|| state.nonce(sender));
            if tx.nonce != expected {
                return Err(ValidationError::NonceMismatch {
                    sender,
                    got: tx.nonce,
                    expected,
                })
            }
            next_nonce.insert(sender, expected + 1);
        }
        Ok(())
    }

    /// Validates the uncle headers of a block.
    ///
    /// Each uncle must be header-valid, young enough, not an ancestor of
    /// the including block, not already included in the recent window, and
    /// a child of one of the block's recent ancestors.
    pub fn validate_uncles(
        &self,
        store: &dyn BlockStore,
        block: &SealedBlock,
    ) -> Result<(), ValidationError> {
        let computed = calculate_ommers_root(&block.body.ommers);
        if computed != block.header.ommers_hash {
            return Err(ValidationError::OmmersHashMismatch(GotExpected {
                got: computed,
                expected: block.header.ommers_hash,
            }))
        }

        if block.body.ommers.len() > self.schedule.uncle_list_limit() {
            return Err(ValidationError::TooManyUncles { len: block.body.ommers.len() })
        }
        if block.body.ommers.is_empty() {
            return Ok(())
        }

        let generation_limit = self.schedule.uncle_generation_limit();
        let ancestors = ancestor_hashes(store, block, generation_limit + 1);
        let used = used_uncle_hashes(store, block, generation_limit);

        for ommer in &block.body.ommers {
            let uncle = ommer.clone().seal_slow();
            self.validate_header(store, &uncle)?;

            let uncle_parent = store
                .block_by_hash(uncle.parent_hash)
                .ok_or(ValidationError::UnknownParent(uncle.parent_hash))?;
            if uncle_parent.number() < block.number().saturating_sub(generation_limit) {
                return Err(ValidationError::UncleTooOld(uncle.hash))
            }
            if ancestors.contains(&uncle.hash) {
                return Err(ValidationError::UncleIsAncestor(uncle.hash))
            }
            if used.contains(&uncle.hash) {
                return Err(ValidationError::UncleAlreadyIncluded(uncle.hash))
            }
            if !ancestors.contains(&uncle_parent.hash()) {
                return Err(ValidationError::UncleUnrelated(uncle.hash))
            }
        }

        Ok(())
    }
}

/// Hashes of the ancestors of `block` (exclusive) whose number is at least
/// `block.number - generations`.
fn ancestor_hashes(
    store: &dyn BlockStore,
    block: &SealedBlock,
    generations: u64,
) -> HashSet<B256> {
    let floor = block.number().saturating_sub(generations);
    let mut hashes = HashSet::new();
    let mut current = store.block_by_hash(block.parent_hash());
    while let Some(ancestor) = current {
        if ancestor.number() < floor {
            break
        }
        hashes.insert(ancestor.hash());
        current = store.block_by_hash(ancestor.parent_hash());
    }
    hashes
}

/// Hashes of every uncle referenced by the ancestors of `block`
/// (exclusive) within the generation window.
fn used_uncle_hashes(
    store: &dyn BlockStore,
    block: &SealedBlock,
    generations: u64,
) -> HashSet<B256> {
    let floor = block.number().saturating_sub(generations);
    let mut hashes = HashSet::new();
    let mut current = store.block_by_hash(block.parent_hash());
    while let Some(ancestor) = current {
        if ancestor.number() <= floor {
            break
        }
        for ommer in &ancestor.body.ommers {
            hashes.insert(ommer.hash_slow());
        }
        current = store.block_by_hash(ancestor.parent_hash());
    }
    hashes
}
