//! The block execution driver: applies transactions through the injected
//! executor, stamps receipts and distributes rewards.

use crate::{
    constants::MAGIC_REWARD_OFFSET,
    error::ExecutionError,
    externals::{ChainExternals, StateRepository, TxContext},
    primitives::{BlockSummary, ExecutionSummary, ReceiptOutcome, SealedBlock},
};
use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Executes every transaction of `block` against `state` and returns the
/// resulting [`BlockSummary`].
///
/// Transactions are applied strictly in block order, each inside its own
/// state checkpoint. Receipts are stamped with the status bit where
/// EIP-658 is active and with the post-transaction state root elsewhere.
/// Stage errors abort the block.
pub(crate) fn apply_block(
    state: &mut dyn StateRepository,
    block: &SealedBlock,
    externals: &ChainExternals,
    detailed_trace: bool,
) -> Result<BlockSummary, ExecutionError> {
    debug!(
        target: "chain::execute",
        number = block.number(),
        txs = block.body.transactions.len(),
        "Applying block"
    );

    externals.schedule.hard_fork_transfers(block, state);
    let eip658 = externals.schedule.eip658(block.number());

    let mut total_gas_used = 0u64;
    let mut receipts = Vec::with_capacity(block.body.transactions.len());
    let mut summaries = Vec::new();

    for (index, tx) in block.body.transactions.iter().enumerate() {
        state.checkpoint();

        let mut executor = externals.executor_factory.create(TxContext {
            tx,
            block,
            coinbase: block.beneficiary(),
            gas_used: total_gas_used,
            store: &*externals.store,
        });

        let staged = (|| {
            executor.init(state)?;
            executor.execute(state)?;
            executor.go(state)?;
            executor.finalization(state)
        })();
        let summary = match staged {
            Ok(summary) => summary,
            Err(err) => {
                state.checkpoint_revert();
                return Err(err)
            }
        };

        total_gas_used += executor.gas_used();
        state.checkpoint_commit();

        let mut receipt = executor.receipt();
        receipt.cumulative_gas_used = total_gas_used;
        if eip658 {
            receipt.outcome = ReceiptOutcome::Status(receipt.is_successful());
        } else {
            receipt.outcome = ReceiptOutcome::PostState(state.root());
        }

        if detailed_trace {
            trace!(
                target: "chain::state",
                number = block.number(),
                tx = index,
                root = %state.root(),
                "Executed transaction"
            );
        }

        receipts.push(receipt);
        if let Some(summary) = summary {
            summaries.push(summary);
        }
    }

    let rewards = distribute_rewards(state, block, &summaries, externals);

    Ok(BlockSummary::new(block.clone(), rewards, receipts, summaries))
}

/// Credits the block and uncle coinbases, assuming the block is valid.
///
/// Returns the reward map of the summary. The miner's map entry is the
/// block reward plus the transaction fees; only the reward itself is
/// credited here, as the executor already paid the fees to the miner.
pub(crate) fn distribute_rewards(
    state: &mut dyn StateRepository,
    block: &SealedBlock,
    summaries: &[ExecutionSummary],
    externals: &ChainExternals,
) -> HashMap<Address, U256> {
    let mut rewards = HashMap::new();

    let block_reward = externals.schedule.block_reward(block.number());
    let inclusion_reward = block_reward / U256::from(32);

    for ommer in &block.body.ommers {
        let depth = block.number() - ommer.number;
        let uncle_reward = block_reward * U256::from(MAGIC_REWARD_OFFSET.saturating_sub(depth)) /
            U256::from(MAGIC_REWARD_OFFSET);

        state.add_balance(ommer.beneficiary, uncle_reward);
        *rewards.entry(ommer.beneficiary).or_insert(U256::ZERO) += uncle_reward;
    }

    let miner_reward =
        block_reward + inclusion_reward * U256::from(block.body.ommers.len() as u64);
    let total_fees: U256 = summaries.iter().map(|summary| summary.fee).sum();

    rewards.insert(block.beneficiary(), miner_reward + total_fees);
    state.add_balance(block.beneficiary(), miner_reward);

    rewards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StaticForkSchedule,
        constants::BASE_BLOCK_REWARD,
        externals::{InlineFlushManager, NoopListener},
        primitives::{Block, Header},
        test_utils::{
            MemoryBlockStore, MemoryState, MemoryTransactionStore, TransferExecutorFactory,
        },
        validate::ParentRules,
    };
    use alloy_primitives::B256;
    use std::sync::Arc;

    fn externals() -> ChainExternals {
        ChainExternals {
            store: Arc::new(MemoryBlockStore::default()),
            tx_store: Arc::new(MemoryTransactionStore::default()),
            executor_factory: Arc::new(TransferExecutorFactory),
            header_validator: Arc::new(ParentRules),
            schedule: Arc::new(StaticForkSchedule::default()),
            listener: Arc::new(NoopListener),
            flush: Arc::new(InlineFlushManager),
            prune: None,
        }
    }

    fn block_with_ommers(miner: Address, ommers: Vec<Header>) -> SealedBlock {
        Block {
            header: Header { number: 10, beneficiary: miner, ..Default::default() },
            body: crate::primitives::BlockBody { transactions: vec![], ommers },
        }
        .seal_slow()
    }

    #[test]
    fn miner_map_entry_includes_fees_but_the_state_credit_does_not() {
        let miner = Address::repeat_byte(1);
        let mut state = MemoryState::empty();
        let block = block_with_ommers(miner, vec![]);
        let summaries = vec![ExecutionSummary {
            tx_hash: B256::ZERO,
            gas_used: 21_000,
            fee: U256::from(777),
        }];

        let rewards = distribute_rewards(&mut state, &block, &summaries, &externals());

        // the report shows reward plus fees, the balance change here is
        // the reward alone; the executor pays the fees during execution
        assert_eq!(rewards[&miner], BASE_BLOCK_REWARD + U256::from(777));
        assert_eq!(state.balance(miner), BASE_BLOCK_REWARD);
    }

    #[test]
    fn uncle_rewards_accumulate_on_a_shared_coinbase() {
        let miner = Address::repeat_byte(1);
        let uncle_miner = Address::repeat_byte(2);
        let ommer = |number| Header {
            number,
            beneficiary: uncle_miner,
            ..Default::default()
        };
        let mut state = MemoryState::empty();
        let block = block_with_ommers(miner, vec![ommer(9), ommer(8)]);

        let rewards = distribute_rewards(&mut state, &block, &[], &externals());

        // depths one and two pay 7/8 and 6/8 of the block reward
        let expected = BASE_BLOCK_REWARD * U256::from(7) / U256::from(8) +
            BASE_BLOCK_REWARD * U256::from(6) / U256::from(8);
        assert_eq!(rewards[&uncle_miner], expected);
        assert_eq!(state.balance(uncle_miner), expected);

        // two uncles double the miner's inclusion bonus
        let miner_reward = BASE_BLOCK_REWARD + BASE_BLOCK_REWARD / U256::from(32) * U256::from(2);
        assert_eq!(rewards[&miner], miner_reward);
        assert_eq!(state.balance(miner), miner_reward);
    }
}
