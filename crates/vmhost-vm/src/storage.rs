//! Contract storage with time-locks.
//!
//! Reads see the pending writes of the transaction first, then the ledger.
//! A lock on a key is kept in the same account under
//! `VMHOST_TIMELOCK` + key and holds the timestamp until which the key
//! cannot be written.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use vmhost_types::Address;

use crate::error::VmError;
use crate::managed_types::{big_int_from_unsigned, unsigned_bytes};
use crate::runtime::Runtime;
use crate::{RESERVED_KEY_PREFIX, TIMELOCK_KEY_PREFIX};

/// Outcome of a storage write, returned to contracts as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StorageStatus {
    Unchanged = 0,
    Modified = 1,
    Added = 2,
    Deleted = 3,
    /// The key is locked; the write was dropped
    Locked = 4,
}

impl StorageStatus {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Storage key holding the lock of `key`.
pub fn lock_key(key: &[u8]) -> Vec<u8> {
    let mut lock = Vec::with_capacity(TIMELOCK_KEY_PREFIX.len() + key.len());
    lock.extend_from_slice(TIMELOCK_KEY_PREFIX);
    lock.extend_from_slice(key);
    lock
}

pub fn is_reserved_key(key: &[u8]) -> bool {
    key.starts_with(RESERVED_KEY_PREFIX)
}

impl Runtime {
    /// Current value of a key, empty when absent. Not metered.
    pub fn storage_value(&self, address: &Address, key: &[u8]) -> Vec<u8> {
        match self.output().storage_update(address, key) {
            Some(value) => value.to_vec(),
            None => self.world().storage(address, key),
        }
    }

    fn storage_address(&self) -> Address {
        self.frame().recipient
    }

    fn lock_timestamp(&self, address: &Address, key: &[u8]) -> i64 {
        let raw = self.storage_value(address, &lock_key(key));
        big_int_from_unsigned(&raw).to_i64().unwrap_or(i64::MAX)
    }

    fn is_locked_unmetered(&self, key: &[u8]) -> bool {
        let address = self.storage_address();
        let now = i64::try_from(self.block().timestamp).unwrap_or(i64::MAX);
        self.lock_timestamp(&address, key) > now
    }

    /// Write without reserved-key or lock checks.
    fn write_storage(&mut self, key: &[u8], value: &[u8]) -> StorageStatus {
        let address = self.storage_address();
        let old = self.storage_value(&address, key);
        if old == value {
            return StorageStatus::Unchanged;
        }

        self.output_mut().set_storage(&address, key, value);
        if old.is_empty() {
            StorageStatus::Added
        } else if value.is_empty() {
            let refund = self.schedule().storage_delete_refund;
            self.gas().refund(refund);
            StorageStatus::Deleted
        } else {
            StorageStatus::Modified
        }
    }

    fn store_checked(&mut self, key: &[u8], value: &[u8], base_cost: u64) -> Result<StorageStatus, VmError> {
        if is_reserved_key(key) {
            return Err(VmError::StoreReservedKey);
        }

        let per_byte = self.schedule().storage_per_byte;
        self.gas().charge_with_bytes(base_cost, per_byte, value.len())?;

        if self.is_locked_unmetered(key) {
            tracing::trace!(key = %hex::encode(key), "write to locked key dropped");
            return Ok(StorageStatus::Locked);
        }
        Ok(self.write_storage(key, value))
    }

    pub fn storage_store(&mut self, key: &[u8], value: &[u8]) -> Result<StorageStatus, VmError> {
        let cost = self.schedule().storage_store;
        self.store_checked(key, value, cost)
    }

    pub fn storage_load(&mut self, key: &[u8]) -> Result<Vec<u8>, VmError> {
        let cost = self.schedule().storage_load;
        self.use_gas(cost)?;
        let value = self.storage_value(&self.storage_address(), key);
        self.gas().charge_data_copy(value.len())?;
        Ok(value)
    }

    pub fn storage_load_length(&mut self, key: &[u8]) -> Result<usize, VmError> {
        let cost = self.schedule().storage_load;
        self.use_gas(cost)?;
        Ok(self.storage_value(&self.storage_address(), key).len())
    }

    /// Read another account's storage. Contracts that are not readable
    /// appear empty to everyone but themselves.
    pub fn storage_load_from_address(&mut self, address: &Address, key: &[u8]) -> Result<Vec<u8>, VmError> {
        let cost = self.schedule().storage_load;
        self.use_gas(cost)?;

        if *address != self.storage_address() && !self.code_metadata(address).readable {
            return Ok(Vec::new());
        }
        let value = self.storage_value(address, key);
        self.gas().charge_data_copy(value.len())?;
        Ok(value)
    }

    pub fn int64_storage_store(&mut self, key: &[u8], value: i64) -> Result<StorageStatus, VmError> {
        let cost = self.schedule().int64_storage_store;
        let bytes = unsigned_bytes(&BigInt::from(value));
        self.store_checked(key, &bytes, cost)
    }

    pub fn int64_storage_load(&mut self, key: &[u8]) -> Result<i64, VmError> {
        let cost = self.schedule().storage_load;
        self.use_gas(cost)?;
        let value = self.storage_value(&self.storage_address(), key);
        Ok(big_int_from_unsigned(&value).to_i64().unwrap_or(i64::MAX))
    }

    // Locks

    /// Lock `key` until `timestamp`. A timestamp of zero or less removes the
    /// lock.
    pub fn set_storage_lock(&mut self, key: &[u8], timestamp: i64) -> Result<StorageStatus, VmError> {
        let cost = self.schedule().int64_storage_store;
        self.use_gas(cost)?;

        let value = if timestamp > 0 {
            unsigned_bytes(&BigInt::from(timestamp))
        } else {
            Vec::new()
        };
        Ok(self.write_storage(&lock_key(key), &value))
    }

    pub fn storage_lock(&mut self, key: &[u8]) -> Result<i64, VmError> {
        let cost = self.schedule().storage_load;
        self.use_gas(cost)?;
        let address = self.storage_address();
        Ok(self.lock_timestamp(&address, key))
    }

    /// Whether the lock of `key` is later than the current block.
    pub fn is_storage_locked(&mut self, key: &[u8]) -> Result<bool, VmError> {
        let cost = self.schedule().storage_load;
        self.use_gas(cost)?;
        Ok(self.is_locked_unmetered(key))
    }

    /// Remove the lock of `key`; a no-op for unlocked keys.
    pub fn clear_storage_lock(&mut self, key: &[u8]) -> Result<StorageStatus, VmError> {
        self.set_storage_lock(key, 0)
    }
}
