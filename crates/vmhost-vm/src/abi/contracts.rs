//! Calls into other contracts, promises and contract deployment.

use vmhost_types::CodeMetadata;

use super::{
    arg, gas_arg, load, load_address, load_arguments, load_string, load_value, store_address, HostFunction, I, L,
};
use crate::async_call::AsyncCallRequest;
use crate::composition::Composition;
use crate::error::VmError;
use crate::executor::Host;
use crate::lifecycle::Lifecycle;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("executeOnSameContext", &[L, I, I, I, I, I, I, I], Some(I), execute_on_same_context),
    HostFunction::shared("executeOnDestContext", &[L, I, I, I, I, I, I, I], Some(I), execute_on_dest_context),
    HostFunction::shared(
        "executeOnDestContextByCaller",
        &[L, I, I, I, I, I, I, I],
        Some(I),
        execute_on_dest_context_by_caller,
    ),
    HostFunction::shared("asyncCall", &[I, I, I, I], None, async_call),
    HostFunction::current("createAsyncCall", &[I, I, I, I, I, I, I, I, L, L], Some(I), create_async_call),
    HostFunction::current(
        "createAsyncCall",
        &[I, I, I, I, I, I, I, I, I, I, L],
        Some(I),
        create_grouped_async_call,
    ),
    HostFunction::shared("createContract", &[L, I, I, I, I, I, I, I, I], Some(I), create_contract),
    HostFunction::shared(
        "deployFromSourceContract",
        &[L, I, I, I, I, I, I, I],
        Some(I),
        deploy_from_source_contract,
    ),
    HostFunction::shared("upgradeContract", &[I, L, I, I, I, I, I, I, I], None, upgrade_contract),
    HostFunction::shared(
        "upgradeFromSourceContract",
        &[I, L, I, I, I, I, I, I],
        None,
        upgrade_from_source_contract,
    ),
];

fn load_metadata(host: &mut dyn Host, offset: i32) -> Result<CodeMetadata, VmError> {
    let bytes = load(host, offset, CodeMetadata::LEN as i32)?;
    Ok(CodeMetadata::from_bytes(&bytes)?)
}

/// Which synchronous call an `execute*` import performs.
#[derive(Clone, Copy)]
enum Execute {
    SameContext,
    DestContext,
    DestContextByCaller,
}

/// `(gas, addressOffset, valueOffset, functionOffset, functionLength,
/// numArguments, argumentLengthsOffset, dataOffset)`
fn execute(host: &mut dyn Host, args: &[i64], kind: Execute) -> Result<i64, VmError> {
    let gas = gas_arg(args, 0);
    let destination = load_address(host, arg(args, 1))?;
    let value = load_value(host, arg(args, 2))?;
    let function = load_string(host, arg(args, 3), arg(args, 4))?;
    let arguments = load_arguments(host, arg(args, 5), arg(args, 6), arg(args, 7))?;

    let status = match kind {
        Execute::SameContext => host.execute_on_same_context(gas, &destination, &value, &function, arguments)?,
        Execute::DestContext => host.execute_on_dest_context(gas, &destination, &value, &function, arguments)?,
        Execute::DestContextByCaller => {
            host.execute_on_dest_context_by_caller(gas, &destination, &value, &function, arguments)?
        }
    };
    Ok(i64::from(status))
}

fn execute_on_same_context(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    execute(host, args, Execute::SameContext)
}

fn execute_on_dest_context(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    execute(host, args, Execute::DestContext)
}

fn execute_on_dest_context_by_caller(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    execute(host, args, Execute::DestContextByCaller)
}

/// `(destinationOffset, valueOffset, dataOffset, length)`
fn async_call(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let destination = load_address(host, arg(args, 0))?;
    let value = load_value(host, arg(args, 1))?;
    let data = load(host, arg(args, 2), arg(args, 3))?;
    host.async_call(&destination, &value, &data)?;
    Ok(0)
}

/// Promise fields starting at `args[first]`: destination, value, data,
/// success callback and error callback.
fn load_promise(host: &mut dyn Host, args: &[i64], first: usize) -> Result<AsyncCallRequest, VmError> {
    let destination = load_address(host, arg(args, first))?;
    let value = load_value(host, arg(args, first + 1))?;
    let data = load(host, arg(args, first + 2), arg(args, first + 3))?;
    let success = load_string(host, arg(args, first + 4), arg(args, first + 5))?;
    let error = load_string(host, arg(args, first + 6), arg(args, first + 7))?;
    Ok(AsyncCallRequest::new(destination, value, data).with_callbacks(success, error))
}

/// `(destinationOffset, valueOffset, dataOffset, dataLength,
/// successOffset, successLength, errorOffset, errorLength, gas, extraGas)`
fn create_async_call(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let request = load_promise(host, args, 0)?
        .with_gas(gas_arg(args, 8))
        .with_extra_gas(gas_arg(args, 9));
    host.create_async_call(request).map(i64::from)
}

/// Grouped form: `(groupOffset, groupLength, ...promise fields, gas)`.
fn create_grouped_async_call(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let group = load(host, arg(args, 0), arg(args, 1))?;
    let request = load_promise(host, args, 2)?
        .with_gas(gas_arg(args, 10))
        .with_group(group);
    host.create_async_call(request).map(i64::from)
}

/// `(gas, valueOffset, codeOffset, codeMetadataOffset, codeLength,
/// resultOffset, numArguments, argumentLengthsOffset, dataOffset)`
fn create_contract(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let value = load_value(host, arg(args, 1))?;
    let code = load(host, arg(args, 2), arg(args, 4))?;
    let metadata = load_metadata(host, arg(args, 3))?;
    let arguments = load_arguments(host, arg(args, 6), arg(args, 7), arg(args, 8))?;

    match host.create_contract(gas_arg(args, 0), &value, code, metadata, arguments)? {
        Some(address) => {
            store_address(host, arg(args, 5), &address)?;
            Ok(0)
        }
        None => Ok(1),
    }
}

/// `(gas, valueOffset, sourceAddressOffset, codeMetadataOffset,
/// resultOffset, numArguments, argumentLengthsOffset, dataOffset)`
fn deploy_from_source_contract(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let value = load_value(host, arg(args, 1))?;
    let source = load_address(host, arg(args, 2))?;
    let metadata = load_metadata(host, arg(args, 3))?;
    let arguments = load_arguments(host, arg(args, 5), arg(args, 6), arg(args, 7))?;

    match host.deploy_from_source_contract(gas_arg(args, 0), &value, &source, metadata, arguments)? {
        Some(address) => {
            store_address(host, arg(args, 4), &address)?;
            Ok(0)
        }
        None => Ok(1),
    }
}

/// `(destinationOffset, gas, valueOffset, codeOffset, codeMetadataOffset,
/// codeLength, numArguments, argumentLengthsOffset, dataOffset)`
///
/// The gas argument is ignored: the upgrade runs as the legacy async call
/// of the context and gets all of its remaining gas.
fn upgrade_contract(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let destination = load_address(host, arg(args, 0))?;
    let value = load_value(host, arg(args, 2))?;
    let code = load(host, arg(args, 3), arg(args, 5))?;
    let metadata = load_metadata(host, arg(args, 4))?;
    let arguments = load_arguments(host, arg(args, 6), arg(args, 7), arg(args, 8))?;
    host.upgrade_contract(&destination, &value, &code, metadata, arguments)?;
    Ok(0)
}

/// `(destinationOffset, gas, valueOffset, sourceAddressOffset,
/// codeMetadataOffset, numArguments, argumentLengthsOffset, dataOffset)`
fn upgrade_from_source_contract(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let destination = load_address(host, arg(args, 0))?;
    let value = load_value(host, arg(args, 2))?;
    let source = load_address(host, arg(args, 3))?;
    let metadata = load_metadata(host, arg(args, 4))?;
    let arguments = load_arguments(host, arg(args, 5), arg(args, 6), arg(args, 7))?;
    host.upgrade_from_source_contract(&destination, &value, &source, metadata, arguments)?;
    Ok(0)
}
