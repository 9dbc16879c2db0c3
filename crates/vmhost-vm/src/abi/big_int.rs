//! Big integer handles.

use super::{arg, arg64, flag, load, load_address, store, HostFunction, I, L};
use crate::error::VmError;
use crate::executor::Host;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("bigIntNew", &[L], Some(I), big_int_new),
    HostFunction::shared("bigIntUnsignedByteLength", &[I], Some(I), unsigned_byte_length),
    HostFunction::shared("bigIntSignedByteLength", &[I], Some(I), signed_byte_length),
    HostFunction::shared("bigIntGetUnsignedBytes", &[I, I], Some(I), get_unsigned_bytes),
    HostFunction::shared("bigIntGetSignedBytes", &[I, I], Some(I), get_signed_bytes),
    HostFunction::shared("bigIntSetUnsignedBytes", &[I, I, I], None, set_unsigned_bytes),
    HostFunction::shared("bigIntSetSignedBytes", &[I, I, I], None, set_signed_bytes),
    HostFunction::shared("bigIntIsInt64", &[I], Some(I), is_int64),
    HostFunction::shared("bigIntGetInt64", &[I], Some(L), get_int64),
    HostFunction::shared("bigIntSetInt64", &[I, L], None, set_int64),
    HostFunction::shared("bigIntAdd", &[I, I, I], None, add),
    HostFunction::shared("bigIntSub", &[I, I, I], None, sub),
    HostFunction::shared("bigIntMul", &[I, I, I], None, mul),
    HostFunction::shared("bigIntTDiv", &[I, I, I], None, tdiv),
    HostFunction::shared("bigIntTMod", &[I, I, I], None, tmod),
    HostFunction::shared("bigIntEDiv", &[I, I, I], None, ediv),
    HostFunction::shared("bigIntEMod", &[I, I, I], None, emod),
    HostFunction::shared("bigIntPow", &[I, I, I], None, pow),
    HostFunction::shared("bigIntSqrt", &[I, I], None, sqrt),
    HostFunction::shared("bigIntAbs", &[I, I], None, abs),
    HostFunction::shared("bigIntNeg", &[I, I], None, neg),
    HostFunction::shared("bigIntNot", &[I, I], None, not),
    HostFunction::shared("bigIntLog2", &[I], Some(I), log2),
    HostFunction::shared("bigIntSign", &[I], Some(I), sign),
    HostFunction::shared("bigIntCmp", &[I, I], Some(I), cmp),
    HostFunction::shared("bigIntAnd", &[I, I, I], None, and),
    HostFunction::shared("bigIntOr", &[I, I, I], None, or),
    HostFunction::shared("bigIntXor", &[I, I, I], None, xor),
    HostFunction::shared("bigIntShr", &[I, I, I], None, shr),
    HostFunction::shared("bigIntShl", &[I, I, I], None, shl),
    HostFunction::shared("bigIntFinishUnsigned", &[I], None, finish_unsigned),
    HostFunction::shared("bigIntFinishSigned", &[I], None, finish_signed),
    HostFunction::shared("bigIntGetUnsignedArgument", &[I, I], None, get_unsigned_argument),
    HostFunction::shared("bigIntGetSignedArgument", &[I, I], None, get_signed_argument),
    HostFunction::shared("bigIntGetCallValue", &[I], None, get_call_value),
    HostFunction::shared("bigIntGetExternalBalance", &[I, I], None, get_external_balance),
    HostFunction::shared("bigIntToString", &[I, I], None, to_string),
];

handle_op!(add => big_int_add(0, 1, 2));
handle_op!(sub => big_int_sub(0, 1, 2));
handle_op!(mul => big_int_mul(0, 1, 2));
handle_op!(tdiv => big_int_tdiv(0, 1, 2));
handle_op!(tmod => big_int_tmod(0, 1, 2));
handle_op!(ediv => big_int_ediv(0, 1, 2));
handle_op!(emod => big_int_emod(0, 1, 2));
handle_op!(pow => big_int_pow(0, 1, 2));
handle_op!(sqrt => big_int_sqrt(0, 1));
handle_op!(abs => big_int_abs(0, 1));
handle_op!(neg => big_int_neg(0, 1));
handle_op!(not => big_int_not(0, 1));
handle_op!(and => big_int_and(0, 1, 2));
handle_op!(or => big_int_or(0, 1, 2));
handle_op!(xor => big_int_xor(0, 1, 2));
handle_op!(shr => big_int_shr(0, 1, 2));
handle_op!(shl => big_int_shl(0, 1, 2));
handle_op!(finish_unsigned => big_int_finish_unsigned(0));
handle_op!(finish_signed => big_int_finish_signed(0));
handle_op!(get_unsigned_argument => big_int_get_unsigned_argument(0, 1));
handle_op!(get_signed_argument => big_int_get_signed_argument(0, 1));
handle_op!(get_call_value => big_int_get_call_value(0));
handle_op!(to_string => big_int_to_string(0, 1));

fn big_int_new(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_new(arg64(args, 0)).map(i64::from)
}

fn unsigned_byte_length(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_unsigned_byte_length(arg(args, 0)).map(i64::from)
}

fn signed_byte_length(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_signed_byte_length(arg(args, 0)).map(i64::from)
}

/// Writes the magnitude and returns its length.
fn get_unsigned_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = host.runtime().big_int_get_unsigned_bytes(arg(args, 0))?;
    store(host, arg(args, 1), &bytes)?;
    Ok(bytes.len() as i64)
}

fn get_signed_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = host.runtime().big_int_get_signed_bytes(arg(args, 0))?;
    store(host, arg(args, 1), &bytes)?;
    Ok(bytes.len() as i64)
}

fn set_unsigned_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = load(host, arg(args, 1), arg(args, 2))?;
    host.runtime().big_int_set_unsigned_bytes(arg(args, 0), &bytes)?;
    Ok(0)
}

fn set_signed_bytes(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let bytes = load(host, arg(args, 1), arg(args, 2))?;
    host.runtime().big_int_set_signed_bytes(arg(args, 0), &bytes)?;
    Ok(0)
}

fn is_int64(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_is_int64(arg(args, 0)).map(flag)
}

fn get_int64(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_get_int64(arg(args, 0))
}

fn set_int64(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_set_int64(arg(args, 0), arg64(args, 1))?;
    Ok(0)
}

fn log2(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_log2(arg(args, 0)).map(i64::from)
}

fn sign(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_sign(arg(args, 0)).map(i64::from)
}

fn cmp(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_int_cmp(arg(args, 0), arg(args, 1)).map(i64::from)
}

fn get_external_balance(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let address = load_address(host, arg(args, 0))?;
    host.runtime().big_int_get_external_balance(&address, arg(args, 1))?;
    Ok(0)
}
