//! Chain primitives: headers, blocks, transactions, receipts and
//! execution outcomes.

mod block;
mod header;
mod receipt;
mod summary;
mod transaction;

pub use block::{Block, BlockBody, SealedBlock};
pub use header::{Header, SealedHeader};
pub use receipt::{Receipt, ReceiptOutcome};
pub use summary::{BlockSummary, ExecutionSummary};
pub use transaction::{
    public_key_to_address, Signature, Transaction, TransactionSigned,
};
