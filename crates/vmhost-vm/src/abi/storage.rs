//! Storage and time-locks, in both generations.

use super::{arg, arg64, flag, load, load_address, store, HostFunction, I, L, LEGACY_KEY_LEN};
use crate::error::VmError;
use crate::executor::Host;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::current("storageStore", &[I, I, I, I], Some(I), storage_store),
    HostFunction::legacy("storageStore", &[I, I, I], Some(I), storage_store_legacy),
    HostFunction::current("storageLoad", &[I, I, I], Some(I), storage_load),
    HostFunction::legacy("storageLoad", &[I, I], Some(I), storage_load_legacy),
    HostFunction::current("storageLoadLength", &[I, I], Some(I), storage_load_length),
    HostFunction::legacy("storageGetValueLength", &[I], Some(I), storage_get_value_length),
    HostFunction::current("storageLoadFromAddress", &[I, I, I, I], Some(I), storage_load_from_address),
    HostFunction::current("int64storageStore", &[I, I, L], Some(I), int64_storage_store),
    HostFunction::legacy("int64storageStore", &[I, L], Some(I), int64_storage_store_legacy),
    HostFunction::current("int64storageLoad", &[I, I], Some(L), int64_storage_load),
    HostFunction::legacy("int64storageLoad", &[I], Some(L), int64_storage_load_legacy),
    HostFunction::current("setStorageLock", &[I, I, L], Some(I), set_storage_lock),
    HostFunction::legacy("setStorageLock", &[I, L], Some(I), set_storage_lock_legacy),
    HostFunction::current("getStorageLock", &[I, I], Some(L), get_storage_lock),
    HostFunction::legacy("getStorageLock", &[I], Some(L), get_storage_lock_legacy),
    HostFunction::current("isStorageLocked", &[I, I], Some(I), is_storage_locked),
    HostFunction::legacy("isStorageLocked", &[I], Some(I), is_storage_locked_legacy),
    HostFunction::current("clearStorageLock", &[I, I], Some(I), clear_storage_lock),
    HostFunction::legacy("clearStorageLock", &[I], Some(I), clear_storage_lock_legacy),
    HostFunction::current("bigIntStorageStoreUnsigned", &[I, I, I], Some(I), big_int_storage_store),
    HostFunction::legacy("bigIntStorageStoreUnsigned", &[I, I], Some(I), big_int_storage_store_legacy),
    HostFunction::current("bigIntStorageLoadUnsigned", &[I, I, I], Some(I), big_int_storage_load),
    HostFunction::legacy("bigIntStorageLoadUnsigned", &[I, I], Some(I), big_int_storage_load_legacy),
];

/// Explicit-length key at `args[0..2]`.
fn key(host: &mut dyn Host, args: &[i64]) -> Result<Vec<u8>, VmError> {
    load(host, arg(args, 0), arg(args, 1))
}

/// 32-byte key at `args[0]`.
fn legacy_key(host: &mut dyn Host, args: &[i64]) -> Result<Vec<u8>, VmError> {
    load(host, arg(args, 0), LEGACY_KEY_LEN)
}

fn store_value(host: &mut dyn Host, key: Vec<u8>, offset: i32, len: i32) -> Result<i64, VmError> {
    let value = load(host, offset, len)?;
    let status = host.runtime().storage_store(&key, &value)?;
    Ok(i64::from(status.as_i32()))
}

fn load_value_into(host: &mut dyn Host, key: Vec<u8>, offset: i32) -> Result<i64, VmError> {
    let value = host.runtime().storage_load(&key)?;
    store(host, offset, &value)?;
    Ok(value.len() as i64)
}

fn storage_store(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    store_value(host, key, arg(args, 2), arg(args, 3))
}

fn storage_store_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    store_value(host, key, arg(args, 1), arg(args, 2))
}

fn storage_load(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    load_value_into(host, key, arg(args, 2))
}

fn storage_load_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    load_value_into(host, key, arg(args, 1))
}

fn storage_load_length(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    host.runtime().storage_load_length(&key).map(|len| len as i64)
}

fn storage_get_value_length(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    host.runtime().storage_load_length(&key).map(|len| len as i64)
}

fn storage_load_from_address(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let address = load_address(host, arg(args, 0))?;
    let key = load(host, arg(args, 1), arg(args, 2))?;
    let value = host.runtime().storage_load_from_address(&address, &key)?;
    store(host, arg(args, 3), &value)?;
    Ok(value.len() as i64)
}

fn int64_storage_store(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    let status = host.runtime().int64_storage_store(&key, arg64(args, 2))?;
    Ok(i64::from(status.as_i32()))
}

fn int64_storage_store_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    let status = host.runtime().int64_storage_store(&key, arg64(args, 1))?;
    Ok(i64::from(status.as_i32()))
}

fn int64_storage_load(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    host.runtime().int64_storage_load(&key)
}

fn int64_storage_load_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    host.runtime().int64_storage_load(&key)
}

// Locks

fn set_storage_lock(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    let status = host.runtime().set_storage_lock(&key, arg64(args, 2))?;
    Ok(i64::from(status.as_i32()))
}

fn set_storage_lock_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    let status = host.runtime().set_storage_lock(&key, arg64(args, 1))?;
    Ok(i64::from(status.as_i32()))
}

fn get_storage_lock(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    host.runtime().storage_lock(&key)
}

fn get_storage_lock_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    host.runtime().storage_lock(&key)
}

fn is_storage_locked(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    host.runtime().is_storage_locked(&key).map(flag)
}

fn is_storage_locked_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    host.runtime().is_storage_locked(&key).map(flag)
}

fn clear_storage_lock(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    let status = host.runtime().clear_storage_lock(&key)?;
    Ok(i64::from(status.as_i32()))
}

fn clear_storage_lock_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    let status = host.runtime().clear_storage_lock(&key)?;
    Ok(i64::from(status.as_i32()))
}

// Big integers in storage

fn store_big_int(host: &mut dyn Host, key: Vec<u8>, handle: i32) -> Result<i64, VmError> {
    let rt = host.runtime();
    let value = rt.big_int_get_unsigned_bytes(handle)?;
    let status = rt.storage_store(&key, &value)?;
    Ok(i64::from(status.as_i32()))
}

/// Loads into the big int and returns the stored byte length.
fn load_big_int(host: &mut dyn Host, key: Vec<u8>, handle: i32) -> Result<i64, VmError> {
    let rt = host.runtime();
    let value = rt.storage_load(&key)?;
    rt.big_int_set_unsigned_bytes(handle, &value)?;
    Ok(value.len() as i64)
}

fn big_int_storage_store(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    store_big_int(host, key, arg(args, 2))
}

fn big_int_storage_store_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    store_big_int(host, key, arg(args, 1))
}

fn big_int_storage_load(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = key(host, args)?;
    load_big_int(host, key, arg(args, 2))
}

fn big_int_storage_load_legacy(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = legacy_key(host, args)?;
    load_big_int(host, key, arg(args, 1))
}
