//! In-memory world state with snapshot, checkpoint and rollback support.

use crate::externals::StateRepository;
use alloy_primitives::{keccak256, Address, B256, U256};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

/// An account of the in-memory world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    /// Account nonce.
    pub nonce: u64,
    /// Account balance, in wei.
    pub balance: U256,
}

type World = BTreeMap<Address, Account>;
type Backing = Arc<RwLock<HashMap<B256, World>>>;

fn world_root(world: &World) -> B256 {
    let mut buf = Vec::with_capacity(world.len() * 60);
    for (address, account) in world {
        buf.extend_from_slice(address.as_slice());
        buf.extend_from_slice(&account.nonce.to_be_bytes());
        buf.extend_from_slice(&account.balance.to_be_bytes::<32>());
    }
    keccak256(buf)
}

/// A [`StateRepository`] backed by a shared map of committed worlds keyed
/// by their root hash.
///
/// The root hash is a digest of the full account set, so identical worlds
/// always agree on their root, which is what the state-root sanity checks
/// of the import path rely on.
#[derive(Debug)]
pub struct MemoryState {
    backing: Backing,
    world: World,
    base_root: B256,
    journal: Vec<World>,
}

impl MemoryState {
    /// An empty world with an empty backing store, committed under its
    /// root.
    pub fn empty() -> Self {
        Self::with_accounts(&[])
    }

    /// A world seeded with the given balances (nonce zero), committed
    /// under its root.
    pub fn with_accounts(accounts: &[(Address, U256)]) -> Self {
        let world: World = accounts
            .iter()
            .map(|(address, balance)| (*address, Account { nonce: 0, balance: *balance }))
            .collect();
        let root = world_root(&world);
        let backing: Backing = Arc::new(RwLock::new(HashMap::new()));
        backing.write().insert(root, world.clone());
        Self { backing, world, base_root: root, journal: Vec::new() }
    }

    /// The account at the given address, if it exists.
    pub fn account(&self, address: Address) -> Option<Account> {
        self.world.get(&address).cloned()
    }
}

impl StateRepository for MemoryState {
    fn root(&self) -> B256 {
        world_root(&self.world)
    }

    fn snapshot_at(&self, root: B256) -> Box<dyn StateRepository> {
        let world = self.backing.read().get(&root).cloned().unwrap_or_default();
        Box::new(Self {
            backing: self.backing.clone(),
            world,
            base_root: root,
            journal: Vec::new(),
        })
    }

    fn checkpoint(&mut self) {
        self.journal.push(self.world.clone());
    }

    fn checkpoint_commit(&mut self) {
        self.journal.pop();
    }

    fn checkpoint_revert(&mut self) {
        if let Some(saved) = self.journal.pop() {
            self.world = saved;
        }
    }

    fn commit(&mut self) {
        let root = world_root(&self.world);
        self.backing.write().insert(root, self.world.clone());
        self.base_root = root;
        self.journal.clear();
    }

    fn rollback(&mut self) {
        self.world = self.backing.read().get(&self.base_root).cloned().unwrap_or_default();
        self.journal.clear();
    }

    fn nonce(&self, address: Address) -> u64 {
        self.world.get(&address).map_or(0, |account| account.nonce)
    }

    fn increment_nonce(&mut self, address: Address) {
        self.world.entry(address).or_default().nonce += 1;
    }

    fn balance(&self, address: Address) -> U256 {
        self.world.get(&address).map_or(U256::ZERO, |account| account.balance)
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.world.entry(address).or_default();
        account.balance += amount;
    }

    fn sub_balance(&mut self, address: Address, amount: U256) {
        let account = self.world.entry(address).or_default();
        account.balance = account.balance.saturating_sub(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_isolation() {
        let mut state = MemoryState::with_accounts(&[(Address::repeat_byte(1), U256::from(100))]);
        let base = state.root();

        state.add_balance(Address::repeat_byte(1), U256::from(50));
        assert_ne!(state.root(), base);

        // an uncommitted change is invisible to a fresh snapshot
        let snapshot = state.snapshot_at(base);
        assert_eq!(snapshot.balance(Address::repeat_byte(1)), U256::from(100));

        state.commit();
        let committed = state.root();
        let snapshot = state.snapshot_at(committed);
        assert_eq!(snapshot.balance(Address::repeat_byte(1)), U256::from(150));
    }

    #[test]
    fn rollback_restores_the_base_root() {
        let mut state = MemoryState::with_accounts(&[(Address::repeat_byte(2), U256::from(7))]);
        let base = state.root();
        state.increment_nonce(Address::repeat_byte(2));
        state.rollback();
        assert_eq!(state.root(), base);
        assert_eq!(state.nonce(Address::repeat_byte(2)), 0);
    }

    #[test]
    fn checkpoints_nest() {
        let mut state = MemoryState::empty();
        state.checkpoint();
        state.add_balance(Address::repeat_byte(3), U256::from(1));
        state.checkpoint();
        state.add_balance(Address::repeat_byte(3), U256::from(1));
        state.checkpoint_revert();
        assert_eq!(state.balance(Address::repeat_byte(3)), U256::from(1));
        state.checkpoint_commit();
        assert_eq!(state.balance(Address::repeat_byte(3)), U256::from(1));
    }

    #[test]
    fn identical_worlds_share_a_root() {
        let a = MemoryState::with_accounts(&[(Address::repeat_byte(4), U256::from(9))]);
        let b = MemoryState::with_accounts(&[(Address::repeat_byte(4), U256::from(9))]);
        assert_eq!(a.root(), b.root());
    }
}
