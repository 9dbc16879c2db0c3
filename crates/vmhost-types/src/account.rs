use crate::address::Address;
use crate::error::TypesError;
use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::BTreeMap;

/// Contract flags, two bytes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeMetadata {
    pub upgradeable: bool,
    pub readable: bool,
    pub payable: bool,
    pub payable_by_sc: bool,
}

impl CodeMetadata {
    pub const LEN: usize = 2;

    const UPGRADEABLE: u8 = 1;
    const READABLE: u8 = 4;
    const PAYABLE: u8 = 2;
    const PAYABLE_BY_SC: u8 = 4;

    /// Metadata allowing upgrades and nothing else
    pub const fn upgradeable() -> Self {
        Self {
            upgradeable: true,
            readable: false,
            payable: false,
            payable_by_sc: false,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != Self::LEN {
            return Err(TypesError::InvalidCodeMetadataLength(bytes.len()));
        }
        Ok(Self {
            upgradeable: bytes[0] & Self::UPGRADEABLE != 0,
            readable: bytes[0] & Self::READABLE != 0,
            payable: bytes[1] & Self::PAYABLE != 0,
            payable_by_sc: bytes[1] & Self::PAYABLE_BY_SC != 0,
        })
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        let mut bytes = [0u8; 2];
        if self.upgradeable {
            bytes[0] |= Self::UPGRADEABLE;
        }
        if self.readable {
            bytes[0] |= Self::READABLE;
        }
        if self.payable {
            bytes[1] |= Self::PAYABLE;
        }
        if self.payable_by_sc {
            bytes[1] |= Self::PAYABLE_BY_SC;
        }
        bytes
    }
}

/// Ledger account as seen by the execution host.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Account {
    /// Transaction count (nonce)
    pub nonce: u64,
    /// Balance
    pub balance: BigUint,
    /// WASM bytecode (empty for user accounts)
    pub code: Vec<u8>,
    /// Contract flags
    pub code_metadata: CodeMetadata,
    /// Owner of a contract account
    pub owner: Address,
    /// Key-value storage
    pub storage: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Account {
    /// Create a new empty account
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user account with the given balance
    pub fn new_user(balance: impl Into<BigUint>) -> Self {
        Self {
            balance: balance.into(),
            ..Self::default()
        }
    }

    /// Create a contract account
    pub fn new_contract(code: Vec<u8>, owner: Address) -> Self {
        Self {
            code,
            owner,
            code_metadata: CodeMetadata::upgradeable(),
            ..Self::default()
        }
    }

    pub fn with_balance(mut self, balance: impl Into<BigUint>) -> Self {
        self.balance = balance.into();
        self
    }

    pub fn with_code_metadata(mut self, metadata: CodeMetadata) -> Self {
        self.code_metadata = metadata;
        self
    }

    pub fn with_storage(mut self, key: &[u8], value: &[u8]) -> Self {
        self.storage.insert(key.to_vec(), value.to_vec());
        self
    }

    /// Check if account is empty (nonce=0, balance=0, no code)
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    /// Check if account has code deployed
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// Increment nonce
    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }
}
