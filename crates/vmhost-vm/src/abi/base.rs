//! Arguments, output, return data, context and block information.

use super::{arg, arg64, flag, load, load_address, load_value, store, store_address, HostFunction, I, L};
use crate::error::VmError;
use crate::executor::Host;
use crate::runtime::balance_bytes;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("getNumArguments", &[], Some(I), get_num_arguments),
    HostFunction::shared("getArgument", &[I, I], Some(I), get_argument),
    HostFunction::shared("getArgumentLength", &[I], Some(I), get_argument_length),
    HostFunction::shared("int64getArgument", &[I], Some(L), int64_get_argument),
    HostFunction::shared("getFunction", &[I], Some(I), get_function),
    HostFunction::shared("finish", &[I, I], None, finish),
    HostFunction::shared("int64finish", &[L], None, int64_finish),
    HostFunction::shared("signalError", &[I, I], None, signal_error),
    HostFunction::shared("getCaller", &[I], None, get_caller),
    HostFunction::shared("getSCAddress", &[I], None, get_sc_address),
    HostFunction::shared("getOwnerAddress", &[I], None, get_owner_address),
    HostFunction::shared("getCallValue", &[I], Some(I), get_call_value),
    HostFunction::shared("getGasLeft", &[], Some(L), get_gas_left),
    HostFunction::shared("getBlockTimestamp", &[], Some(L), get_block_timestamp),
    HostFunction::shared("getBlockNonce", &[], Some(L), get_block_nonce),
    HostFunction::shared("getBlockRound", &[], Some(L), get_block_round),
    HostFunction::shared("getBlockEpoch", &[], Some(L), get_block_epoch),
    HostFunction::shared("getBlockHash", &[L, I], Some(I), get_block_hash),
    HostFunction::shared("getBlockRandomSeed", &[I], None, get_block_random_seed),
    HostFunction::shared("getExternalBalance", &[I, I], None, get_external_balance),
    HostFunction::shared("isSmartContract", &[I], Some(I), is_smart_contract),
    HostFunction::shared("transferValue", &[I, I, I, I], Some(I), transfer_value),
    HostFunction::legacy("writeLog", &[I, I, I, I], None, write_log),
    HostFunction::current("writeEventLog", &[I, I, I, I, I], None, write_event_log),
    HostFunction::shared("getNumReturnData", &[], Some(I), get_num_return_data),
    HostFunction::shared("getReturnDataSize", &[I], Some(I), get_return_data_size),
    HostFunction::shared("getReturnData", &[I, I], Some(I), get_return_data),
    HostFunction::shared("cleanReturnData", &[], None, clean_return_data),
    HostFunction::shared("deleteFromReturnData", &[I], None, delete_from_return_data),
    HostFunction::shared("activateUnsafeMode", &[], None, activate_unsafe_mode),
    HostFunction::shared("deactivateUnsafeMode", &[], None, deactivate_unsafe_mode),
];

fn len_result(len: usize) -> i64 {
    len as i64
}

// Arguments

fn get_num_arguments(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().num_arguments().map(i64::from)
}

/// Writes the argument and returns its length.
fn get_argument(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let argument = host.runtime().argument(arg(args, 0))?;
    store(host, arg(args, 1), &argument)?;
    Ok(len_result(argument.len()))
}

fn get_argument_length(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().argument_length(arg(args, 0)).map(i64::from)
}

fn int64_get_argument(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().int64_argument(arg(args, 0))
}

fn get_function(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let name = host.runtime().function_name()?;
    store(host, arg(args, 0), name.as_bytes())?;
    Ok(len_result(name.len()))
}

// Output

fn finish(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = load(host, arg(args, 0), arg(args, 1))?;
    host.runtime().finish(data)?;
    Ok(0)
}

fn int64_finish(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().int64_finish(arg64(args, 0))?;
    Ok(0)
}

fn signal_error(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let message = load(host, arg(args, 0), arg(args, 1))?;
    Err(host.runtime().signal_error(&message))
}

// Context

fn get_caller(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let caller = host.runtime().caller()?;
    store_address(host, arg(args, 0), &caller)?;
    Ok(0)
}

fn get_sc_address(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let address = host.runtime().sc_address()?;
    store_address(host, arg(args, 0), &address)?;
    Ok(0)
}

fn get_owner_address(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let owner = host.runtime().owner_address()?;
    store_address(host, arg(args, 0), &owner)?;
    Ok(0)
}

/// Writes the call value as 32 big-endian bytes and returns 32.
fn get_call_value(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let value = balance_bytes(&host.runtime().call_value()?);
    store(host, arg(args, 0), &value)?;
    Ok(len_result(value.len()))
}

fn get_gas_left(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    let gas = host.runtime().gas_left()?;
    Ok(i64::try_from(gas).unwrap_or(i64::MAX))
}

fn get_external_balance(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let address = load_address(host, arg(args, 0))?;
    let balance = host.runtime().external_balance(&address)?;
    store(host, arg(args, 1), &balance_bytes(&balance))?;
    Ok(0)
}

fn is_smart_contract(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let address = load_address(host, arg(args, 0))?;
    host.runtime().is_smart_contract(&address).map(flag)
}

/// 0 when the value moved, 1 when the sender lacks funds or the
/// destination does not accept value.
fn transfer_value(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let destination = load_address(host, arg(args, 0))?;
    let value = load_value(host, arg(args, 1))?;
    let data = load(host, arg(args, 2), arg(args, 3))?;
    match host.runtime().transfer_value(&destination, &value, &data) {
        Ok(()) => Ok(0),
        Err(err @ (VmError::TransferInsufficientFunds | VmError::AccountNotPayable)) => {
            tracing::debug!(%destination, error = %err, "transfer refused");
            Ok(1)
        }
        Err(err) => Err(err),
    }
}

// Block

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn get_block_timestamp(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().block_timestamp().map(as_i64)
}

fn get_block_nonce(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().block_nonce().map(as_i64)
}

fn get_block_round(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().block_round().map(as_i64)
}

fn get_block_epoch(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().block_epoch().map(i64::from)
}

/// 0 when the hash was written, 1 for unknown or future blocks.
fn get_block_hash(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let nonce = u64::try_from(arg64(args, 0)).unwrap_or(u64::MAX);
    match host.runtime().block_hash(nonce)? {
        Some(hash) => {
            store(host, arg(args, 1), &hash)?;
            Ok(0)
        }
        None => Ok(1),
    }
}

fn get_block_random_seed(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let seed = host.runtime().block_random_seed()?;
    store(host, arg(args, 0), &seed)?;
    Ok(0)
}

// Logs

/// Legacy form: 32-byte topics back to back.
fn write_log(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = load(host, arg(args, 0), arg(args, 1))?;
    let num_topics = arg(args, 3);
    if num_topics < 0 {
        return Err(VmError::NegativeLength);
    }
    let topic_bytes = load(host, arg(args, 2), num_topics.saturating_mul(super::LEGACY_KEY_LEN))?;
    let topics = topic_bytes
        .chunks_exact(super::LEGACY_KEY_LEN as usize)
        .map(<[u8]>::to_vec)
        .collect();
    host.runtime().write_log(topics, data)?;
    Ok(0)
}

/// Current form: topic lengths as little-endian `i32`s.
fn write_event_log(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let topics = super::load_arguments(host, arg(args, 0), arg(args, 1), arg(args, 2))?;
    let data = load(host, arg(args, 3), arg(args, 4))?;
    host.runtime().write_log(topics, data)?;
    Ok(0)
}

// Return data

fn get_num_return_data(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().num_return_data().map(i64::from)
}

fn get_return_data_size(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().return_data_size(arg(args, 0)).map(i64::from)
}

fn get_return_data(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = host.runtime().return_data(arg(args, 0))?;
    store(host, arg(args, 1), &data)?;
    Ok(len_result(data.len()))
}

fn clean_return_data(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().clean_return_data()?;
    Ok(0)
}

fn delete_from_return_data(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().delete_return_data(arg(args, 0))?;
    Ok(0)
}

// Unsafe mode

fn activate_unsafe_mode(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().set_unsafe_mode(true);
    Ok(0)
}

fn deactivate_unsafe_mode(host: &mut dyn Host, _args: &[i64]) -> Result<i64, VmError> {
    host.runtime().set_unsafe_mode(false);
    Ok(0)
}
