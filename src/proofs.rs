//! Trie roots and bloom aggregation over block contents.

use crate::{
    constants::EMPTY_OMMER_ROOT_HASH,
    primitives::{Header, Receipt, TransactionSigned},
};
use alloy_primitives::{keccak256, Bloom, B256};
use alloy_rlp::Encodable;
use alloy_trie::root::ordered_trie_root_with_encoder;

/// Calculates the transaction trie root: `(rlp(index), rlp(tx))` pairs.
///
/// An empty transaction list yields the empty-trie hash.
pub fn calculate_transaction_root(transactions: &[TransactionSigned]) -> B256 {
    ordered_trie_root_with_encoder(transactions, |tx, buf| tx.encode(buf))
}

/// Calculates the receipts trie root: `(rlp(index), rlp(receipt))` pairs.
///
/// An empty receipt list yields the empty-trie hash.
pub fn calculate_receipt_root(receipts: &[Receipt]) -> B256 {
    ordered_trie_root_with_encoder(receipts, |receipt, buf| receipt.encode(buf))
}

/// Calculates the ommers hash: `keccak256(rlp(ommers))`.
pub fn calculate_ommers_root(ommers: &[Header]) -> B256 {
    if ommers.is_empty() {
        return EMPTY_OMMER_ROOT_HASH
    }
    let mut buf = Vec::new();
    alloy_rlp::encode_list(ommers, &mut buf);
    keccak256(buf)
}

/// ORs together the bloom filters of the given receipts.
pub fn calculate_logs_bloom(receipts: &[Receipt]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for receipt in receipts {
        bloom |= receipt.bloom;
    }
    bloom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EMPTY_TRIE_ROOT;
    use alloy_primitives::{Address, Log, LogData};

    #[test]
    fn empty_lists_yield_canonical_roots() {
        assert_eq!(calculate_transaction_root(&[]), EMPTY_TRIE_ROOT);
        assert_eq!(calculate_receipt_root(&[]), EMPTY_TRIE_ROOT);
        assert_eq!(calculate_ommers_root(&[]), EMPTY_OMMER_ROOT_HASH);
        assert_eq!(EMPTY_TRIE_ROOT, alloy_trie::EMPTY_ROOT_HASH);
    }

    #[test]
    fn receipt_root_depends_on_order() {
        let a = Receipt::success(21_000, vec![]);
        let b = Receipt::success(42_000, vec![]);
        assert_ne!(
            calculate_receipt_root(&[a.clone(), b.clone()]),
            calculate_receipt_root(&[b, a])
        );
    }

    #[test]
    fn logs_bloom_is_union() {
        let log = |byte| Log {
            address: Address::repeat_byte(byte),
            data: LogData::default(),
        };
        let a = Receipt::success(21_000, vec![log(0x11)]);
        let b = Receipt::success(42_000, vec![log(0x22)]);
        let union = calculate_logs_bloom(&[a.clone(), b.clone()]);
        assert_eq!(union, a.bloom | b.bloom);
        assert_ne!(union, Bloom::ZERO);
    }

    #[test]
    fn ommers_root_matches_single_header_encoding() {
        let ommer = Header { number: 5, ..Default::default() };
        let mut buf = Vec::new();
        alloy_rlp::encode_list(std::slice::from_ref(&ommer), &mut buf);
        assert_eq!(calculate_ommers_root(&[ommer]), keccak256(buf));
    }
}
