//! Managed buffer handles.
//!
//! Functions returning an `i32` status report 0 on success. The slice
//! functions report 1 for out-of-range slices instead of faulting.

use super::{arg, flag, load, store, HostFunction, I};
use crate::error::VmError;
use crate::executor::Host;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("mBufferNew", &[], Some(I), new),
    HostFunction::shared("mBufferNewFromBytes", &[I, I], Some(I), new_from_bytes),
    HostFunction::shared("mBufferGetLength", &[I], Some(I), get_length),
    HostFunction::shared("mBufferGetBytes", &[I, I], Some(I), get_bytes),
    HostFunction::shared("mBufferGetByteSlice", &[I, I, I, I], Some(I), get_byte_slice),
    HostFunction::shared("mBufferCopyByteSlice", &[I, I, I, I], Some(I), copy_byte_slice),
    HostFunction::shared("mBufferEq", &[I, I], Some(I), eq),
    HostFunction::shared("mBufferSetBytes", &[I, I, I], Some(I), set_bytes),
    HostFunction::shared("mBufferSetByteSlice", &[I, I, I, I], Some(I), set_byte_slice),
    HostFunction::shared("mBufferAppend", &[I, I], Some(I), append),
    HostFunction::shared("mBufferAppendBytes", &[I, I, I], Some(I), append_bytes),
    HostFunction::shared("mBufferToBigIntUnsigned", &[I, I], Some(I), to_big_int_unsigned),
    HostFunction::shared("mBufferToBigIntSigned", &[I, I], Some(I), to_big_int_signed),
    HostFunction::shared("mBufferFromBigIntUnsigned", &[I, I], Some(I), from_big_int_unsigned),
    HostFunction::shared("mBufferFromBigIntSigned", &[I, I], Some(I), from_big_int_signed),
    HostFunction::shared("mBufferToBigFloat", &[I, I], Some(I), to_big_float),
    HostFunction::shared("mBufferFromBigFloat", &[I, I], Some(I), from_big_float),
    HostFunction::shared("mBufferStorageStore", &[I, I], Some(I), storage_store),
    HostFunction::shared("mBufferStorageLoad", &[I, I], Some(I), storage_load),
    HostFunction::shared("mBufferStorageLoadFromAddress", &[I, I, I], None, storage_load_from_address),
    HostFunction::shared("mBufferGetArgument", &[I, I], Some(I), get_argument),
    HostFunction::shared("mBufferFinish", &[I], Some(I), finish),
    HostFunction::shared("mBufferSetRandom", &[I, I], Some(I), set_random),
    HostFunction::shared("managedSCAddress", &[I], None, sc_address),
    HostFunction::shared("managedCaller", &[I], None, caller),
    HostFunction::shared("managedSignalError", &[I], None, signal_error),
    HostFunction::shared("managedGetReturnData", &[I, I], None, get_return_data),
];

handle_op!(append => m_buffer_append(0, 1));
handle_op!(to_big_int_unsigned => m_buffer_to_big_int_unsigned(0, 1));
handle_op!(to_big_int_signed => m_buffer_to_big_int_signed(0, 1));
handle_op!(from_big_int_unsigned => m_buffer_from_big_int_unsigned(0, 1));
handle_op!(from_big_int_signed => m_buffer_from_big_int_signed(0, 1));
handle_op!(to_big_float => m_buffer_to_big_float(0, 1));
handle_op!(from_big_float => m_buffer_from_big_float(0, 1));
handle_op!(storage_load => m_buffer_storage_load(0, 1));
handle_op!(storage_load_from_address => m_buffer_storage_load_from_address(0, 1, 2));
handle_op!(get_argument => m_buffer_get_argument(0, 1));
handle_op!(finish => m_buffer_finish(0));
handle_op!(set_random => m_buffer_set_random(0, 1));
handle_op!(sc_address => managed_sc_address(0));
handle_op!(caller => managed_caller(0));
handle_op!(get_return_data => managed_get_return_data(0, 1));

/// 0 on success, 1 when the slice is out of range.
fn status(done: bool) -> i64 {
    if done {
        0
    } else {
        1
    }
}

fn new(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().m_buffer_new().map(i64::from)
}

fn new_from_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = load(host, arg(args, 0), arg(args, 1))?;
    host.runtime().m_buffer_new_from_bytes(bytes).map(i64::from)
}

fn get_length(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().m_buffer_get_length(arg(args, 0)).map(i64::from)
}

fn get_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = host.runtime().m_buffer_get_bytes(arg(args, 0))?;
    store(host, arg(args, 1), &bytes)?;
    Ok(0)
}

fn get_byte_slice(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let slice = host
        .runtime()
        .m_buffer_get_byte_slice(arg(args, 0), arg(args, 1), arg(args, 2))?;
    match slice {
        Some(bytes) => {
            store(host, arg(args, 3), &bytes)?;
            Ok(0)
        }
        None => Ok(1),
    }
}

fn copy_byte_slice(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime()
        .m_buffer_copy_byte_slice(arg(args, 0), arg(args, 1), arg(args, 2), arg(args, 3))
        .map(status)
}

/// 1 when equal, 0 otherwise.
fn eq(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().m_buffer_eq(arg(args, 0), arg(args, 1)).map(flag)
}

fn set_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = load(host, arg(args, 1), arg(args, 2))?;
    host.runtime().m_buffer_set_bytes(arg(args, 0), bytes)?;
    Ok(0)
}

/// `(handle, start, dataLength, dataOffset)`
fn set_byte_slice(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = load(host, arg(args, 3), arg(args, 2))?;
    host.runtime()
        .m_buffer_set_byte_slice(arg(args, 0), arg(args, 1), &data)
        .map(status)
}

fn append_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = load(host, arg(args, 1), arg(args, 2))?;
    host.runtime().m_buffer_append_bytes(arg(args, 0), &data)?;
    Ok(0)
}

fn storage_store(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().m_buffer_storage_store(arg(args, 0), arg(args, 1))?;
    Ok(0)
}

fn signal_error(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    Err(host.runtime().managed_signal_error(arg(args, 0)))
}
