//! 64-bit integer shortcuts for arguments, results and storage.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::VmError;
use crate::managed_types::{big_int_from_signed, big_int_from_unsigned, signed_bytes, unsigned_bytes};
use crate::runtime::Runtime;
use crate::storage::StorageStatus;

const MAX_SMALL_INT_BYTES: usize = 8;

fn unsigned_small_int(bytes: &[u8]) -> Result<i64, VmError> {
    big_int_from_unsigned(bytes)
        .to_u64()
        .map(|value| value as i64)
        .ok_or_else(|| VmError::InvalidArgument("value does not fit in 64 bits".to_string()))
}

fn signed_small_int(bytes: &[u8]) -> Result<i64, VmError> {
    if bytes.len() > MAX_SMALL_INT_BYTES {
        return Err(VmError::InvalidArgument("value does not fit in 64 bits".to_string()));
    }
    big_int_from_signed(bytes)
        .to_i64()
        .ok_or_else(|| VmError::InvalidArgument("value does not fit in 64 bits".to_string()))
}

/// Minimal big-endian bytes of the value read as unsigned.
fn unsigned_value_bytes(value: i64) -> Vec<u8> {
    unsigned_bytes(&BigInt::from(value as u64))
}

impl Runtime {
    fn charge_small_int(&mut self) -> Result<(), VmError> {
        let cost = self.schedule().small_int_op;
        self.use_gas(cost)
    }

    /// Argument as an integer; only the magnitude is kept and wider values
    /// wrap to their low 64 bits.
    pub fn int64_argument(&mut self, index: i32) -> Result<i64, VmError> {
        let argument = self.argument(index)?;
        let value = big_int_from_unsigned(&argument);
        let low = value.iter_u64_digits().next().unwrap_or(0);
        Ok(low as i64)
    }

    pub fn int64_finish(&mut self, value: i64) -> Result<(), VmError> {
        self.finish(unsigned_bytes(&BigInt::from(value)))
    }

    pub fn small_int_get_unsigned_argument(&mut self, index: i32) -> Result<i64, VmError> {
        self.charge_small_int()?;
        let argument = self.argument(index)?;
        unsigned_small_int(&argument)
    }

    pub fn small_int_get_signed_argument(&mut self, index: i32) -> Result<i64, VmError> {
        self.charge_small_int()?;
        let argument = self.argument(index)?;
        signed_small_int(&argument)
    }

    pub fn small_int_finish_unsigned(&mut self, value: i64) -> Result<(), VmError> {
        self.charge_small_int()?;
        self.finish(unsigned_value_bytes(value))
    }

    pub fn small_int_finish_signed(&mut self, value: i64) -> Result<(), VmError> {
        self.charge_small_int()?;
        self.finish(signed_bytes(&BigInt::from(value)))
    }

    pub fn small_int_storage_store_unsigned(&mut self, key: &[u8], value: i64) -> Result<StorageStatus, VmError> {
        self.charge_small_int()?;
        self.storage_store(key, &unsigned_value_bytes(value))
    }

    pub fn small_int_storage_store_signed(&mut self, key: &[u8], value: i64) -> Result<StorageStatus, VmError> {
        self.charge_small_int()?;
        self.storage_store(key, &signed_bytes(&BigInt::from(value)))
    }

    pub fn small_int_storage_load_unsigned(&mut self, key: &[u8]) -> Result<i64, VmError> {
        self.charge_small_int()?;
        let value = self.storage_load(key)?;
        unsigned_small_int(&value)
    }

    pub fn small_int_storage_load_signed(&mut self, key: &[u8]) -> Result<i64, VmError> {
        self.charge_small_int()?;
        let value = self.storage_load(key)?;
        signed_small_int(&value)
    }
}
