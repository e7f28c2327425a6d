//! Block header and its sealed form.

use alloy_primitives::{keccak256, Address, BlockNumber, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use crate::constants::EMPTY_OMMER_ROOT_HASH;

/// A block header.
///
/// The fields `state_root`, `receipts_root`, `logs_bloom`, `gas_used` and
/// `transactions_root` are only meaningful after the block's transactions
/// have been executed; block assembly fills them in last.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Header {
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Hash of the RLP-encoded uncle header list.
    pub ommers_hash: B256,
    /// Address credited with the block reward.
    pub beneficiary: Address,
    /// Root of the world state trie after executing this block.
    pub state_root: B256,
    /// Root of the transaction trie.
    pub transactions_root: B256,
    /// Root of the receipts trie.
    pub receipts_root: B256,
    /// Union of the bloom filters of all receipts in the block.
    pub logs_bloom: Bloom,
    /// Difficulty target this block was mined against.
    pub difficulty: U256,
    /// Height of this block.
    pub number: BlockNumber,
    /// Gas limit of the block.
    pub gas_limit: u64,
    /// Total gas consumed by the block's transactions.
    pub gas_used: u64,
    /// Unix timestamp at which the block was mined.
    pub timestamp: u64,
    /// Arbitrary extra data, at most 32 bytes.
    pub extra_data: Bytes,
    /// Proof-of-work mix hash.
    pub mix_hash: B256,
    /// Proof-of-work nonce.
    pub nonce: B64,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: Address::ZERO,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            logs_bloom: Bloom::ZERO,
            difficulty: U256::ZERO,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: B256::ZERO,
            nonce: B64::ZERO,
        }
    }
}

impl Header {
    /// Computes the header hash. This encodes the header, so prefer a
    /// [`SealedHeader`] when the hash is needed more than once.
    pub fn hash_slow(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    /// Seals the header, memoizing its hash.
    pub fn seal_slow(self) -> SealedHeader {
        let hash = self.hash_slow();
        SealedHeader { header: self, hash }
    }

    /// True for the genesis header.
    pub const fn is_genesis(&self) -> bool {
        self.number == 0
    }
}

/// A [`Header`] together with its memoized hash.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Deref)]
pub struct SealedHeader {
    /// The sealed header.
    #[deref]
    pub header: Header,
    /// Hash of the header.
    pub hash: B256,
}

impl SealedHeader {
    /// Seals the header with a hash computed elsewhere.
    ///
    /// The caller is responsible for the hash being correct.
    pub const fn new(header: Header, hash: B256) -> Self {
        Self { header, hash }
    }

    /// Returns the wrapped header, dropping the hash.
    pub fn unseal(self) -> Header {
        self.header
    }
}
