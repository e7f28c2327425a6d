//! Error types for validation, execution and import.

use alloy_primitives::{Address, BlockNumber, B256};
use std::fmt;

/// A pair of values, one observed and one expected.
///
/// Used by mismatch errors so that both sides of a failed comparison end up
/// in the log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotExpected<T> {
    /// The value that was observed.
    pub got: T,
    /// The value that was expected.
    pub expected: T,
}

impl<T: fmt::Display> fmt::Display for GotExpected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "got {}, expected {}", self.got, self.expected)
    }
}

impl<T> From<(T, T)> for GotExpected<T> {
    fn from((got, expected): (T, T)) -> Self {
        Self { got, expected }
    }
}

/// A block failed a structural or semantic check before execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The parent block could not be found in the store.
    #[error("parent block {0} is not known")]
    UnknownParent(B256),
    /// The parent-header rule rejected the header.
    #[error("header failed the parent rule: {0}")]
    ParentRule(String),
    /// Block number does not follow the parent.
    #[error("block number {block_number} does not follow parent number {parent_number}")]
    ParentNumberMismatch {
        /// Number of the parent header.
        parent_number: BlockNumber,
        /// Number of the rejected header.
        block_number: BlockNumber,
    },
    /// Timestamp is not strictly greater than the parent's.
    #[error("timestamp {timestamp} is not after parent timestamp {parent_timestamp}")]
    TimestampNotAfterParent {
        /// Timestamp of the parent header.
        parent_timestamp: u64,
        /// Timestamp of the rejected header.
        timestamp: u64,
    },
    /// Header gas used exceeds its gas limit.
    #[error("block used gas ({gas_used}) is greater than gas limit ({gas_limit})")]
    GasUsedExceedsGasLimit {
        /// Gas used declared by the header.
        gas_used: u64,
        /// Gas limit declared by the header.
        gas_limit: u64,
    },
    /// Gas limit moved more than the allowed fraction of the parent's.
    #[error("gas limit {child_gas_limit} is out of bounds for parent gas limit {parent_gas_limit}")]
    GasLimitOutOfBounds {
        /// Gas limit of the parent header.
        parent_gas_limit: u64,
        /// Gas limit of the rejected header.
        child_gas_limit: u64,
    },
    /// Extra data is longer than the protocol allows.
    #[error("extra data length {len} exceeds maximum")]
    ExtraDataTooLong {
        /// Observed extra-data length.
        len: usize,
    },
    /// The transaction trie root in the header does not match the body.
    #[error("mismatched transaction root: {0}")]
    TransactionRootMismatch(GotExpected<B256>),
    /// A transaction carries a signature that does not recover to a sender.
    #[error("transaction {0} has no recoverable sender")]
    UnrecoverableSender(B256),
    /// A transaction nonce does not match the account state.
    #[error("transaction nonce {got} of sender {sender} does not match expected nonce {expected}")]
    NonceMismatch {
        /// Sender of the offending transaction.
        sender: Address,
        /// Nonce carried by the transaction.
        got: u64,
        /// Nonce expected for the sender at this point of the block.
        expected: u64,
    },
    /// The ommers hash in the header does not match the uncle list.
    #[error("mismatched ommers hash: {0}")]
    OmmersHashMismatch(GotExpected<B256>),
    /// More uncles than the protocol allows.
    #[error("uncle list of length {len} exceeds limit")]
    TooManyUncles {
        /// Observed number of uncles.
        len: usize,
    },
    /// An uncle's parent lies outside the generation window.
    #[error("uncle {0} is too old")]
    UncleTooOld(B256),
    /// An uncle is a direct ancestor of the including block.
    #[error("uncle {0} is a direct ancestor")]
    UncleIsAncestor(B256),
    /// An uncle was already included in a recent block.
    #[error("uncle {0} is not unique")]
    UncleAlreadyIncluded(B256),
    /// An uncle's parent is not an ancestor of the including block.
    #[error("uncle {0} has no common parent with the including block")]
    UncleUnrelated(B256),
}

/// A transaction executor stage failed.
///
/// Any such failure aborts the import of the containing block.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The executor rejected the transaction.
    #[error("transaction {hash} failed at stage {stage}: {message}")]
    Transaction {
        /// Hash of the failed transaction.
        hash: B256,
        /// Executor stage that reported the failure.
        stage: &'static str,
        /// Executor-provided description.
        message: String,
    },
    /// A scheduled hard-fork transfer could not be applied.
    #[error("hard fork transfer failed: {0}")]
    HardForkTransfer(String),
}

/// Errors surfaced by chain construction and queries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The block store holds no best block; the chain was never initialized.
    #[error("block store has no best block; store a genesis block first")]
    MissingBestBlock,
    /// The block store holds no total difficulty for the given hash.
    #[error("no total difficulty stored for block {0}")]
    MissingTotalDifficulty(B256),
}
