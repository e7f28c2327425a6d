//! A scripted transaction executor performing plain value transfers.

use crate::{
    constants::TRANSFER_GAS,
    error::ExecutionError,
    externals::{ExecutorFactory, StateRepository, TransactionExecutor, TxContext},
    primitives::{ExecutionSummary, Receipt, TransactionSigned},
};
use alloy_primitives::{Address, Log, LogData, TxKind, U256};

/// Builds [`TransferExecutor`]s: every transaction is treated as a
/// 21000-gas value transfer whose fee goes to the coinbase, with a single
/// log naming the recipient.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferExecutorFactory;

impl ExecutorFactory for TransferExecutorFactory {
    fn create(&self, ctx: TxContext<'_>) -> Box<dyn TransactionExecutor> {
        Box::new(TransferExecutor {
            tx: ctx.tx.clone(),
            coinbase: ctx.coinbase,
            gas_used_before: ctx.gas_used,
            sender: None,
            fee: U256::ZERO,
            receipt: None,
        })
    }
}

/// Staged executor for a single value transfer.
#[derive(Debug)]
pub struct TransferExecutor {
    tx: TransactionSigned,
    coinbase: Address,
    gas_used_before: u64,
    sender: Option<Address>,
    fee: U256,
    receipt: Option<Receipt>,
}

impl TransferExecutor {
    fn err(&self, stage: &'static str, message: impl Into<String>) -> ExecutionError {
        ExecutionError::Transaction { hash: self.tx.hash, stage, message: message.into() }
    }
}

impl TransactionExecutor for TransferExecutor {
    fn init(&mut self, state: &mut dyn StateRepository) -> Result<(), ExecutionError> {
        let sender = self
            .tx
            .recover_signer()
            .ok_or_else(|| self.err("init", "sender not recoverable"))?;
        self.fee = U256::from(self.tx.gas_price) * U256::from(TRANSFER_GAS);

        if state.balance(sender) < self.tx.value + self.fee {
            return Err(self.err("init", "insufficient balance"))
        }
        self.sender = Some(sender);
        Ok(())
    }

    fn execute(&mut self, state: &mut dyn StateRepository) -> Result<(), ExecutionError> {
        let sender = self.sender.ok_or_else(|| self.err("execute", "init not run"))?;
        state.increment_nonce(sender);
        state.sub_balance(sender, self.tx.value + self.fee);
        Ok(())
    }

    fn go(&mut self, state: &mut dyn StateRepository) -> Result<(), ExecutionError> {
        if let TxKind::Call(to) = self.tx.to {
            state.add_balance(to, self.tx.value);
        }
        Ok(())
    }

    fn finalization(
        &mut self,
        state: &mut dyn StateRepository,
    ) -> Result<Option<ExecutionSummary>, ExecutionError> {
        state.add_balance(self.coinbase, self.fee);

        let log_address = match self.tx.to {
            TxKind::Call(to) => to,
            TxKind::Create => Address::ZERO,
        };
        let log = Log { address: log_address, data: LogData::default() };
        self.receipt = Some(Receipt::success(
            self.gas_used_before + TRANSFER_GAS,
            vec![log],
        ));

        Ok(Some(ExecutionSummary {
            tx_hash: self.tx.hash,
            gas_used: TRANSFER_GAS,
            fee: self.fee,
        }))
    }

    fn gas_used(&self) -> u64 {
        TRANSFER_GAS
    }

    fn receipt(&self) -> Receipt {
        self.receipt.clone().unwrap_or_else(|| Receipt::success(self.gas_used_before, vec![]))
    }
}
