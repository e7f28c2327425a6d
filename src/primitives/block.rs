//! Blocks and their sealed forms.

use super::{Header, SealedHeader, TransactionSigned};
use alloy_primitives::{Address, BlockNumber, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header as RlpHeader, RlpEncodable};

/// The body of a block: transactions and uncle headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable)]
pub struct BlockBody {
    /// Transactions in execution order.
    pub transactions: Vec<TransactionSigned>,
    /// Uncle headers included by this block.
    pub ommers: Vec<Header>,
}

/// A block: header plus body.
///
/// Encodes as the canonical three-item list
/// `[header, transactions, ommers]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The block body.
    pub body: BlockBody,
}

impl Block {
    /// Seals the block, memoizing the header hash.
    pub fn seal_slow(self) -> SealedBlock {
        SealedBlock { header: self.header.seal_slow(), body: self.body }
    }

    fn payload_len(&self) -> usize {
        self.header.length() + self.body.transactions.length() + self.body.ommers.length()
    }
}

impl Encodable for Block {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        RlpHeader { list: true, payload_length: self.payload_len() }.encode(out);
        self.header.encode(out);
        self.body.transactions.encode(out);
        self.body.ommers.encode(out);
    }

    fn length(&self) -> usize {
        let payload = self.payload_len();
        payload + RlpHeader { list: true, payload_length: payload }.length()
    }
}

/// A block whose header hash has been computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    /// Sealed header.
    pub header: SealedHeader,
    /// Block body.
    pub body: BlockBody,
}

impl SealedBlock {
    /// Hash of this block.
    pub const fn hash(&self) -> B256 {
        self.header.hash
    }

    /// Height of this block.
    pub const fn number(&self) -> BlockNumber {
        self.header.header.number
    }

    /// Hash of the parent block.
    pub const fn parent_hash(&self) -> B256 {
        self.header.header.parent_hash
    }

    /// State root declared by the header.
    pub const fn state_root(&self) -> B256 {
        self.header.header.state_root
    }

    /// Difficulty declared by the header.
    pub const fn difficulty(&self) -> U256 {
        self.header.header.difficulty
    }

    /// Address credited with the block reward.
    pub const fn beneficiary(&self) -> Address {
        self.header.header.beneficiary
    }

    /// True for the genesis block.
    pub const fn is_genesis(&self) -> bool {
        self.header.header.number == 0
    }

    /// Whether `child` names this block as its parent.
    pub fn is_parent_of(&self, child: &SealedBlock) -> bool {
        child.parent_hash() == self.hash()
    }

    /// RLP encoding of the whole block.
    pub fn encoded(&self) -> Bytes {
        let block =
            Block { header: self.header.header.clone(), body: self.body.clone() };
        alloy_rlp::encode(&block).into()
    }

    /// RLP encoding of the body alone, as served to peers.
    pub fn encoded_body(&self) -> Bytes {
        alloy_rlp::encode(&self.body).into()
    }

    /// Drops the memoized hash.
    pub fn unseal(self) -> Block {
        Block { header: self.header.unseal(), body: self.body }
    }
}
