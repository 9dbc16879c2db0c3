//! Big float handles.

use super::{arg, arg64, flag, HostFunction, I, L};
use crate::error::VmError;
use crate::executor::Host;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("bigFloatNewFromParts", &[I, I, I], Some(I), new_from_parts),
    HostFunction::shared("bigFloatNewFromFrac", &[L, L], Some(I), new_from_frac),
    HostFunction::shared("bigFloatNewFromSci", &[L, L], Some(I), new_from_sci),
    HostFunction::shared("bigFloatAdd", &[I, I, I], None, add),
    HostFunction::shared("bigFloatSub", &[I, I, I], None, sub),
    HostFunction::shared("bigFloatMul", &[I, I, I], None, mul),
    HostFunction::shared("bigFloatDiv", &[I, I, I], None, div),
    HostFunction::shared("bigFloatNeg", &[I, I], None, neg),
    HostFunction::shared("bigFloatAbs", &[I, I], None, abs),
    HostFunction::shared("bigFloatSqrt", &[I, I], None, sqrt),
    HostFunction::shared("bigFloatClone", &[I, I], None, clone),
    HostFunction::shared("bigFloatCmp", &[I, I], Some(I), cmp),
    HostFunction::shared("bigFloatSign", &[I], Some(I), sign),
    HostFunction::shared("bigFloatPow", &[I, I, I], None, pow),
    HostFunction::shared("bigFloatFloor", &[I, I], None, floor),
    HostFunction::shared("bigFloatCeil", &[I, I], None, ceil),
    HostFunction::shared("bigFloatTruncate", &[I, I], None, truncate),
    HostFunction::shared("bigFloatIsInt", &[I], Some(I), is_int),
    HostFunction::shared("bigFloatSetInt64", &[I, L], None, set_int64),
    HostFunction::shared("bigFloatSetBigInt", &[I, I], None, set_big_int),
    HostFunction::shared("bigFloatGetConstPi", &[I], None, get_const_pi),
    HostFunction::shared("bigFloatGetConstE", &[I], None, get_const_e),
];

handle_op!(add => big_float_add(0, 1, 2));
handle_op!(sub => big_float_sub(0, 1, 2));
handle_op!(mul => big_float_mul(0, 1, 2));
handle_op!(div => big_float_div(0, 1, 2));
handle_op!(neg => big_float_neg(0, 1));
handle_op!(abs => big_float_abs(0, 1));
handle_op!(sqrt => big_float_sqrt(0, 1));
handle_op!(clone => big_float_clone(0, 1));
handle_op!(pow => big_float_pow(0, 1, 2));
handle_op!(floor => big_float_floor(0, 1));
handle_op!(ceil => big_float_ceil(0, 1));
handle_op!(truncate => big_float_truncate(0, 1));
handle_op!(set_big_int => big_float_set_big_int(0, 1));
handle_op!(get_const_pi => big_float_get_const_pi(0));
handle_op!(get_const_e => big_float_get_const_e(0));

fn new_from_parts(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime()
        .big_float_new_from_parts(arg(args, 0), arg(args, 1), arg(args, 2))
        .map(i64::from)
}

fn new_from_frac(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime()
        .big_float_new_from_frac(arg64(args, 0), arg64(args, 1))
        .map(i64::from)
}

fn new_from_sci(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime()
        .big_float_new_from_sci(arg64(args, 0), arg64(args, 1))
        .map(i64::from)
}

fn cmp(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_float_cmp(arg(args, 0), arg(args, 1)).map(i64::from)
}

fn sign(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_float_sign(arg(args, 0)).map(i64::from)
}

fn is_int(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_float_is_int(arg(args, 0)).map(flag)
}

fn set_int64(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    host.runtime().big_float_set_int64(arg(args, 0), arg64(args, 1))?;
    Ok(0)
}
