#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]
//! Block import and chain management with heaviest-total-difficulty fork
//! choice.
//!
//! The [`Blockchain`] core takes candidate blocks, validates them against
//! consensus rules, executes their transactions against a snapshot-able
//! world state, and decides whether each block extends the canonical
//! chain, starts or continues a side branch, or is rejected. Committed
//! state transitions are persisted atomically through an injected flush
//! manager.
//!
//! The surrounding machinery (the state trie, block and transaction
//! stores, the transaction executor, listeners, flushing and pruning) is
//! consumed through the capability traits in [`externals`].
//!
//! ## Feature Flags
//!
//! - `test-utils`: Export in-memory collaborator implementations for
//!   testing.

pub mod blockchain;
pub use blockchain::{Blockchain, ImportResult};

pub mod config;
pub use config::{ForkSchedule, ImportConfig, RetryPolicy, StaticForkSchedule};

pub mod constants;

pub mod error;
pub use error::{ChainError, ExecutionError, GotExpected, ValidationError};

pub mod events;
pub use events::{ChainEvent, EventDispatcher, EventSender};

mod execute;

pub mod externals;
pub use externals::ChainExternals;

pub mod iter;
pub use iter::{BlockIdentifier, BodiesIterator, HeadersIterator};

pub mod metrics;

pub mod primitives;
pub use primitives::{
    Block, BlockBody, BlockSummary, Header, Receipt, SealedBlock, SealedHeader,
    TransactionSigned,
};

pub mod proofs;

pub mod shareable;
pub use shareable::ShareableBlockchain;

pub mod validate;
pub use validate::{BlockValidator, ParentRules};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
