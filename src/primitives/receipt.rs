//! Transaction receipts.

use alloy_primitives::{Bloom, Log, B256};
use alloy_rlp::{Encodable, Header as RlpHeader};

/// First receipt field: intermediate state root before EIP-658, a status
/// bit after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// Root of the world state after the transaction was applied.
    PostState(B256),
    /// Whether the transaction executed successfully.
    Status(bool),
}

impl Encodable for ReceiptOutcome {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        match self {
            Self::PostState(root) => root.encode(out),
            Self::Status(status) => status.encode(out),
        }
    }

    fn length(&self) -> usize {
        match self {
            Self::PostState(root) => root.length(),
            Self::Status(status) => status.length(),
        }
    }
}

/// The result of executing a single transaction.
///
/// Produced by the transaction executor with a [`ReceiptOutcome::Status`];
/// the block driver rewrites the outcome to the post-transaction state root
/// on chains where EIP-658 is not yet active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Execution outcome.
    pub outcome: ReceiptOutcome,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom filter of [`Self::logs`].
    pub bloom: Bloom,
    /// Logs emitted during execution.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Builds a successful receipt, deriving the bloom from the logs.
    pub fn success(cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        Self::with_status(true, cumulative_gas_used, logs)
    }

    /// Builds a receipt with the given status, deriving the bloom from the
    /// logs.
    pub fn with_status(success: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let bloom = alloy_primitives::logs_bloom(logs.iter());
        Self { outcome: ReceiptOutcome::Status(success), cumulative_gas_used, bloom, logs }
    }

    /// Whether the transaction executed successfully.
    ///
    /// Pre-EIP-658 receipts do not carry a status; they report success,
    /// matching how they were produced by the executor before the outcome
    /// was rewritten.
    pub fn is_successful(&self) -> bool {
        match self.outcome {
            ReceiptOutcome::Status(status) => status,
            ReceiptOutcome::PostState(_) => true,
        }
    }

    fn fields_len(&self) -> usize {
        self.outcome.length() +
            self.cumulative_gas_used.length() +
            self.bloom.length() +
            self.logs.length()
    }
}

impl Encodable for Receipt {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        RlpHeader { list: true, payload_length: self.fields_len() }.encode(out);
        self.outcome.encode(out);
        self.cumulative_gas_used.encode(out);
        self.bloom.encode(out);
        self.logs.encode(out);
    }

    fn length(&self) -> usize {
        let payload = self.fields_len();
        payload + RlpHeader { list: true, payload_length: payload }.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, LogData};

    #[test]
    fn status_and_post_state_encode_differently() {
        let status = Receipt::success(21_000, vec![]);
        let post_state = Receipt {
            outcome: ReceiptOutcome::PostState(B256::repeat_byte(1)),
            ..status.clone()
        };
        assert_ne!(alloy_rlp::encode(&status), alloy_rlp::encode(&post_state));
    }

    #[test]
    fn bloom_covers_log_address() {
        let log = Log { address: Address::repeat_byte(0x11), data: LogData::default() };
        let receipt = Receipt::success(21_000, vec![log.clone()]);
        assert!(receipt.bloom.contains_input(alloy_primitives::BloomInput::Raw(
            log.address.as_slice()
        )));
    }

    #[test]
    fn encoded_length_matches_encoding() {
        let receipt = Receipt::with_status(false, 42_000, vec![]);
        assert_eq!(alloy_rlp::encode(&receipt).len(), receipt.length());
    }
}
