//! Ledger access.
//!
//! The host never owns account state. It reads through [`BlockchainHook`]
//! and reports changes in a [`VmOutput`] that the embedder commits.
//! [`World`] is an in-memory ledger used by tests and simple embedders.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Signed;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use vmhost_types::{Account, Address, CodeMetadata, VmOutput};

/// Information about the block the transaction executes in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub timestamp: u64,
    pub nonce: u64,
    pub round: u64,
    pub epoch: u32,
    pub random_seed: [u8; 32],
}

/// Read access to ledger state.
pub trait BlockchainHook: Send + Sync {
    fn account_exists(&self, address: &Address) -> bool;

    fn balance(&self, address: &Address) -> BigUint;

    fn nonce(&self, address: &Address) -> u64;

    /// Deployed code, `None` for user accounts and unknown addresses.
    fn code(&self, address: &Address) -> Option<Vec<u8>>;

    fn code_metadata(&self, address: &Address) -> CodeMetadata;

    fn owner(&self, address: &Address) -> Option<Address>;

    /// Stored value, empty when the key is absent.
    fn storage(&self, address: &Address, key: &[u8]) -> Vec<u8>;

    fn current_block(&self) -> BlockInfo;

    fn block_hash(&self, nonce: u64) -> Option<[u8; 32]>;
}

#[derive(Debug, Default)]
struct WorldState {
    accounts: BTreeMap<Address, Account>,
    block: BlockInfo,
    block_hashes: HashMap<u64, [u8; 32]>,
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct World {
    state: RwLock<WorldState>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account.
    pub fn with_account(self, address: Address, account: Account) -> Self {
        self.set_account(address, account);
        self
    }

    /// Set the current block.
    pub fn with_block(self, block: BlockInfo) -> Self {
        self.set_block(block);
        self
    }

    pub fn set_account(&self, address: Address, account: Account) {
        self.state.write().accounts.insert(address, account);
    }

    pub fn set_block(&self, block: BlockInfo) {
        let mut state = self.state.write();
        let hash = *blake3::hash(&block.nonce.to_be_bytes()).as_bytes();
        state.block_hashes.insert(block.nonce, hash);
        state.block = block;
    }

    pub fn set_block_timestamp(&self, timestamp: u64) {
        self.state.write().block.timestamp = timestamp;
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.state.read().accounts.get(address).cloned()
    }

    /// Stored value, `None` when the key is absent.
    pub fn storage_value(&self, address: &Address, key: &[u8]) -> Option<Vec<u8>> {
        self.state
            .read()
            .accounts
            .get(address)
            .and_then(|account| account.storage.get(key).cloned())
    }

    /// Apply the account changes of a successful execution.
    pub fn commit(&self, output: &VmOutput) {
        let mut state = self.state.write();
        for (address, changes) in &output.output_accounts {
            let account = state.accounts.entry(*address).or_default();

            if changes.balance_delta.sign() != Sign::NoSign {
                let balance = BigInt::from(account.balance.clone()) + &changes.balance_delta;
                account.balance = if balance.is_negative() {
                    tracing::warn!(%address, "balance would become negative, clamping to zero");
                    BigUint::default()
                } else {
                    balance.magnitude().clone()
                };
            }
            if let Some(nonce) = changes.nonce {
                account.nonce = nonce;
            }
            if let Some(code) = &changes.code {
                account.code = code.clone();
            }
            if let Some(metadata) = changes.code_metadata {
                account.code_metadata = metadata;
            }
            if let Some(owner) = changes.owner {
                account.owner = owner;
            }
            for (key, value) in &changes.storage_updates {
                if value.is_empty() {
                    account.storage.remove(key);
                } else {
                    account.storage.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl BlockchainHook for World {
    fn account_exists(&self, address: &Address) -> bool {
        self.state.read().accounts.contains_key(address)
    }

    fn balance(&self, address: &Address) -> BigUint {
        self.state
            .read()
            .accounts
            .get(address)
            .map(|account| account.balance.clone())
            .unwrap_or_default()
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.state
            .read()
            .accounts
            .get(address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    fn code(&self, address: &Address) -> Option<Vec<u8>> {
        self.state
            .read()
            .accounts
            .get(address)
            .filter(|account| account.has_code())
            .map(|account| account.code.clone())
    }

    fn code_metadata(&self, address: &Address) -> CodeMetadata {
        self.state
            .read()
            .accounts
            .get(address)
            .map(|account| account.code_metadata)
            .unwrap_or_default()
    }

    fn owner(&self, address: &Address) -> Option<Address> {
        self.state.read().accounts.get(address).map(|account| account.owner)
    }

    fn storage(&self, address: &Address, key: &[u8]) -> Vec<u8> {
        self.storage_value(address, key).unwrap_or_default()
    }

    fn current_block(&self) -> BlockInfo {
        self.state.read().block.clone()
    }

    fn block_hash(&self, nonce: u64) -> Option<[u8; 32]> {
        self.state.read().block_hashes.get(&nonce).copied()
    }
}
