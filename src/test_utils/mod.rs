//! In-memory collaborators and fixtures for testing the chain core.

mod executor;
mod state;
mod store;

pub use executor::{TransferExecutor, TransferExecutorFactory};
pub use state::{Account, MemoryState};
pub use store::{MemoryBlockStore, MemoryTransactionStore};

use crate::{
    blockchain::Blockchain,
    config::{ImportConfig, StaticForkSchedule},
    constants::EMPTY_TRIE_ROOT,
    externals::{BlockStore, ChainExternals, InlineFlushManager, NoopListener, StateRepository},
    primitives::{
        public_key_to_address, Block, Header, SealedBlock, Signature, Transaction,
        TransactionSigned,
    },
    validate::ParentRules,
};
use alloy_primitives::{Address, TxKind, B256, U256};
use k256::ecdsa::SigningKey;
use std::sync::Arc;

/// Gas limit stamped into test genesis blocks.
pub const GENESIS_GAS_LIMIT: u64 = 3_000_000;

/// Difficulty of test genesis blocks.
pub const GENESIS_DIFFICULTY: u64 = 131_072;

/// A deterministic signing key derived from a single byte.
pub fn signer(byte: u8) -> SigningKey {
    let mut bytes = [0u8; 32];
    bytes[31] = byte;
    SigningKey::from_slice(&bytes).expect("non-zero scalar")
}

/// The address controlled by the given key.
pub fn signer_address(key: &SigningKey) -> Address {
    public_key_to_address(key.verifying_key())
}

/// Signs a transaction with the given key.
pub fn sign_tx(transaction: Transaction, key: &SigningKey) -> TransactionSigned {
    let hash = transaction.signature_hash();
    let (signature, recovery_id) =
        key.sign_prehash_recoverable(hash.as_slice()).expect("signing cannot fail");
    TransactionSigned::new(
        transaction,
        Signature {
            r: U256::from_be_slice(&signature.r().to_bytes()),
            s: U256::from_be_slice(&signature.s().to_bytes()),
            odd_y_parity: recovery_id.is_y_odd(),
        },
    )
}

/// A signed 21000-gas value transfer.
pub fn transfer(key: &SigningKey, nonce: u64, to: Address, value: u64) -> TransactionSigned {
    sign_tx(
        Transaction {
            nonce,
            gas_price: 10,
            gas_limit: 21_000,
            to: TxKind::Call(to),
            value: U256::from(value),
            input: Default::default(),
        },
        key,
    )
}

/// A genesis block over the given state root.
pub fn genesis_block(state_root: B256) -> SealedBlock {
    Block {
        header: Header {
            state_root,
            transactions_root: EMPTY_TRIE_ROOT,
            receipts_root: EMPTY_TRIE_ROOT,
            difficulty: U256::from(GENESIS_DIFFICULTY),
            gas_limit: GENESIS_GAS_LIMIT,
            ..Default::default()
        },
        body: Default::default(),
    }
    .seal_slow()
}

/// A chain core wired to in-memory collaborators, with handles onto the
/// stores for assertions.
pub struct TestChain {
    /// The chain core under test.
    pub chain: Blockchain,
    /// The seeded genesis block.
    pub genesis: SealedBlock,
    /// The backing block store.
    pub store: Arc<MemoryBlockStore>,
    /// The backing transaction store.
    pub tx_store: Arc<MemoryTransactionStore>,
    state_probe: Box<dyn StateRepository>,
}

impl TestChain {
    /// Routes best-block events from the wrapped core onto `sender`.
    pub fn with_event_sender(mut self, sender: crate::events::EventSender) -> Self {
        self.chain = self.chain.with_event_sender(sender);
        self
    }

    /// A read handle onto the committed world state at the given root.
    pub fn state_at(&self, root: B256) -> Box<dyn StateRepository> {
        self.state_probe.snapshot_at(root)
    }

    /// Balance of an account at the canonical tip.
    pub fn best_balance(&self, address: Address) -> U256 {
        self.state_at(self.chain.best_block().state_root()).balance(address)
    }
}

/// Builds a chain over a genesis holding the given account balances.
pub fn setup_chain(accounts: &[(Address, U256)]) -> TestChain {
    setup_chain_full(accounts, ImportConfig::for_tests(), Arc::new(NoopListener))
}

/// [`setup_chain`] with an explicit import configuration.
pub fn setup_chain_with_config(
    accounts: &[(Address, U256)],
    config: ImportConfig,
) -> TestChain {
    setup_chain_full(accounts, config, Arc::new(NoopListener))
}

/// [`setup_chain`] with an explicit configuration and listener.
pub fn setup_chain_full(
    accounts: &[(Address, U256)],
    config: ImportConfig,
    listener: Arc<dyn crate::externals::ChainListener>,
) -> TestChain {
    let state = MemoryState::with_accounts(accounts);
    let state_probe = state.snapshot_at(state.root());
    let genesis = genesis_block(state.root());

    let store = Arc::new(MemoryBlockStore::default());
    store.save_block(genesis.clone(), genesis.difficulty(), true);
    let tx_store = Arc::new(MemoryTransactionStore::default());

    let externals = ChainExternals {
        store: store.clone(),
        tx_store: tx_store.clone(),
        executor_factory: Arc::new(TransferExecutorFactory),
        header_validator: Arc::new(ParentRules),
        schedule: Arc::new(StaticForkSchedule::default()),
        listener,
        flush: Arc::new(InlineFlushManager),
        prune: None,
    };

    let chain = Blockchain::new(externals, config, Box::new(state))
        .expect("the genesis block is stored");
    TestChain { chain, genesis, store, tx_store, state_probe }
}
