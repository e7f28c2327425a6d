//! Protocol constants used across validation, execution and rewards.

use alloy_primitives::{b256, B256, U256};

/// Maximum number of uncle headers a single block may carry.
pub const UNCLE_LIST_LIMIT: usize = 2;

/// Number of generations back an uncle's parent may reach.
pub const UNCLE_GENERATION_LIMIT: u64 = 7;

/// Denominator of the uncle reward formula.
///
/// An uncle at distance `d` from the including block earns
/// `BLOCK_REWARD * (MAGIC_REWARD_OFFSET - d) / MAGIC_REWARD_OFFSET`.
pub const MAGIC_REWARD_OFFSET: u64 = 8;

/// Base block reward credited to the miner, in wei (5 ether).
pub const BASE_BLOCK_REWARD: U256 = U256::from_limbs([0x4563918244f40000, 0, 0, 0]);

/// Lower bound advertised for the gas price of locally assembled blocks,
/// in wei (10 szabo). Guards against inheriting `minGasPrice = 0` from a
/// genesis description.
pub const INITIAL_MIN_GAS_PRICE: u128 = 10_000_000_000_000;

/// Maximum length of the header extra-data field in bytes.
pub const MAXIMUM_EXTRA_DATA_SIZE: usize = 32;

/// Root hash of an empty trie: `keccak256(rlp(""))`.
pub const EMPTY_TRIE_ROOT: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// Ommer root of a block with no uncles: `keccak256(rlp([]))`.
pub const EMPTY_OMMER_ROOT_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Gas cost of a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;
