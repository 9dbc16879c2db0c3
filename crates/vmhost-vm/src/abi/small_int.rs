//! 64-bit integer arguments, results and storage values.

use super::{arg, arg64, load, HostFunction, I, L};
use crate::error::VmError;
use crate::executor::Host;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("smallIntGetUnsignedArgument", &[I], Some(L), get_unsigned_argument),
    HostFunction::shared("smallIntGetSignedArgument", &[I], Some(L), get_signed_argument),
    HostFunction::shared("smallIntFinishUnsigned", &[L], None, finish_unsigned),
    HostFunction::shared("smallIntFinishSigned", &[L], None, finish_signed),
    HostFunction::shared("smallIntStorageStoreUnsigned", &[I, I, L], Some(I), storage_store_unsigned),
    HostFunction::shared("smallIntStorageStoreSigned", &[I, I, L], Some(I), storage_store_signed),
    HostFunction::shared("smallIntStorageLoadUnsigned", &[I, I], Some(L), storage_load_unsigned),
    HostFunction::shared("smallIntStorageLoadSigned", &[I, I], Some(L), storage_load_signed),
];

fn get_unsigned_argument(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().small_int_get_unsigned_argument(arg(args, 0))
}

fn get_signed_argument(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().small_int_get_signed_argument(arg(args, 0))
}

fn finish_unsigned(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().small_int_finish_unsigned(arg64(args, 0))?;
    Ok(0)
}

fn finish_signed(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().small_int_finish_signed(arg64(args, 0))?;
    Ok(0)
}

fn storage_store_unsigned(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = load(host, arg(args, 0), arg(args, 1))?;
    let status = host.runtime().small_int_storage_store_unsigned(&key, arg64(args, 2))?;
    Ok(i64::from(status.as_i32()))
}

fn storage_store_signed(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = load(host, arg(args, 0), arg(args, 1))?;
    let status = host.runtime().small_int_storage_store_signed(&key, arg64(args, 2))?;
    Ok(i64::from(status.as_i32()))
}

fn storage_load_unsigned(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = load(host, arg(args, 0), arg(args, 1))?;
    host.runtime().small_int_storage_load_unsigned(&key)
}

fn storage_load_signed(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let key = load(host, arg(args, 0), arg(args, 1))?;
    host.runtime().small_int_storage_load_signed(&key)
}
