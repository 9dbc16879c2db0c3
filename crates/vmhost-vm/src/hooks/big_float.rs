//! Floating point operations on handles.
//!
//! Values are IEEE-754 doubles. Any operation that would produce an
//! infinite or NaN value fails with `InfinityFloatOperation` and leaves the
//! destination unchanged.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use std::cmp::Ordering;

use crate::error::VmError;
use crate::runtime::Runtime;

/// Size of an encoded float in a managed buffer.
pub const ENCODED_FLOAT_LEN: usize = 8;

fn finite(value: f64) -> Result<f64, VmError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(VmError::InfinityFloatOperation)
    }
}

/// Big-endian IEEE-754 bytes.
pub fn encode_float(value: f64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_float(bytes: &[u8]) -> Result<f64, VmError> {
    let raw: [u8; ENCODED_FLOAT_LEN] = bytes.try_into().map_err(|_| {
        VmError::InvalidArgument(format!("encoded float must be {} bytes", ENCODED_FLOAT_LEN))
    })?;
    finite(f64::from_be_bytes(raw))
}

impl Runtime {
    fn big_float_value(&mut self, handle: i32) -> Result<f64, VmError> {
        self.managed()?.big_float(handle)
    }

    fn set_big_float_value(&mut self, handle: i32, value: f64) -> Result<(), VmError> {
        let value = finite(value)?;
        self.managed()?.set_big_float(handle, value)
    }

    fn big_float_binary<F>(&mut self, cost: u64, dest: i32, a: i32, b: i32, op: F) -> Result<(), VmError>
    where
        F: FnOnce(f64, f64) -> Result<f64, VmError>,
    {
        self.use_gas(cost)?;
        let a = self.big_float_value(a)?;
        let b = self.big_float_value(b)?;
        let result = op(a, b)?;
        self.set_big_float_value(dest, result)
    }

    fn big_float_unary<F>(&mut self, cost: u64, dest: i32, a: i32, op: F) -> Result<(), VmError>
    where
        F: FnOnce(f64) -> Result<f64, VmError>,
    {
        self.use_gas(cost)?;
        let a = self.big_float_value(a)?;
        let result = op(a)?;
        self.set_big_float_value(dest, result)
    }

    fn new_big_float_checked(&mut self, value: f64) -> Result<i32, VmError> {
        let value = finite(value)?;
        Ok(self.managed()?.new_big_float(value))
    }

    /// `integral.fractional * 10^exponent`, where the exponent places the
    /// fractional digits and must not be positive.
    pub fn big_float_new_from_parts(&mut self, integral: i32, fractional: i32, exponent: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_float_new;
        self.use_gas(cost)?;
        if exponent > 0 || fractional < 0 {
            return Err(VmError::InvalidArgument(
                "fractional part must be positive and its exponent not positive".to_string(),
            ));
        }

        let fraction = f64::from(fractional) * 10f64.powi(exponent);
        let value = if integral < 0 {
            f64::from(integral) - fraction
        } else {
            f64::from(integral) + fraction
        };
        self.new_big_float_checked(value)
    }

    pub fn big_float_new_from_frac(&mut self, numerator: i64, denominator: i64) -> Result<i32, VmError> {
        let cost = self.schedule().big_float_new;
        self.use_gas(cost)?;
        if denominator == 0 {
            return Err(VmError::DivisionByZero);
        }
        self.new_big_float_checked(numerator as f64 / denominator as f64)
    }

    /// `significand * 10^exponent`.
    pub fn big_float_new_from_sci(&mut self, significand: i64, exponent: i64) -> Result<i32, VmError> {
        let cost = self.schedule().big_float_new;
        self.use_gas(cost)?;
        let exponent = i32::try_from(exponent)
            .map_err(|_| VmError::InvalidArgument("exponent out of range".to_string()))?;
        self.new_big_float_checked(significand as f64 * 10f64.powi(exponent))
    }

    pub fn big_float_add(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.big_float_binary(cost, dest, a, b, |a, b| Ok(a + b))
    }

    pub fn big_float_sub(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.big_float_binary(cost, dest, a, b, |a, b| Ok(a - b))
    }

    pub fn big_float_mul(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.big_float_binary(cost, dest, a, b, |a, b| Ok(a * b))
    }

    pub fn big_float_div(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_div;
        self.big_float_binary(cost, dest, a, b, |a, b| {
            if b == 0.0 {
                return Err(VmError::DivisionByZero);
            }
            Ok(a / b)
        })
    }

    pub fn big_float_neg(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.big_float_unary(cost, dest, a, |a| Ok(-a))
    }

    pub fn big_float_abs(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.big_float_unary(cost, dest, a, |a| Ok(a.abs()))
    }

    pub fn big_float_clone(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.big_float_unary(cost, dest, a, Ok)
    }

    pub fn big_float_sqrt(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_sqrt;
        self.big_float_unary(cost, dest, a, |a| {
            if a < 0.0 {
                return Err(VmError::InvalidArgument("square root of a negative number".to_string()));
            }
            Ok(a.sqrt())
        })
    }

    pub fn big_float_pow(&mut self, dest: i32, a: i32, exponent: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_pow;
        self.big_float_unary(cost, dest, a, |a| Ok(a.powi(exponent)))
    }

    pub fn big_float_cmp(&mut self, a: i32, b: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        let a = self.big_float_value(a)?;
        let b = self.big_float_value(b)?;
        Ok(match a.partial_cmp(&b) {
            Some(Ordering::Less) => -1,
            Some(Ordering::Greater) => 1,
            _ => 0,
        })
    }

    pub fn big_float_sign(&mut self, handle: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        let value = self.big_float_value(handle)?;
        Ok(if value > 0.0 {
            1
        } else if value < 0.0 {
            -1
        } else {
            0
        })
    }

    pub fn big_float_is_int(&mut self, handle: i32) -> Result<bool, VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        Ok(self.big_float_value(handle)?.fract() == 0.0)
    }

    fn big_float_round_into<F>(&mut self, dest_big_int: i32, a: i32, round: F) -> Result<(), VmError>
    where
        F: FnOnce(f64) -> f64,
    {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        let value = round(self.big_float_value(a)?);
        let integer = BigInt::from_f64(value).ok_or(VmError::InfinityFloatOperation)?;
        self.managed()?.set_big_int(dest_big_int, integer)
    }

    pub fn big_float_floor(&mut self, dest_big_int: i32, a: i32) -> Result<(), VmError> {
        self.big_float_round_into(dest_big_int, a, f64::floor)
    }

    pub fn big_float_ceil(&mut self, dest_big_int: i32, a: i32) -> Result<(), VmError> {
        self.big_float_round_into(dest_big_int, a, f64::ceil)
    }

    pub fn big_float_truncate(&mut self, dest_big_int: i32, a: i32) -> Result<(), VmError> {
        self.big_float_round_into(dest_big_int, a, f64::trunc)
    }

    pub fn big_float_set_int64(&mut self, dest: i32, value: i64) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        self.set_big_float_value(dest, value as f64)
    }

    pub fn big_float_set_big_int(&mut self, dest: i32, big_int: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        let value = self.managed()?.big_int(big_int)?;
        let value = value.to_f64().ok_or(VmError::InfinityFloatOperation)?;
        self.set_big_float_value(dest, value)
    }

    pub fn big_float_get_const_pi(&mut self, dest: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        self.set_big_float_value(dest, std::f64::consts::PI)
    }

    pub fn big_float_get_const_e(&mut self, dest: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_float_op;
        self.use_gas(cost)?;
        self.set_big_float_value(dest, std::f64::consts::E)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_support::*;

    fn value(rt: &mut Runtime, handle: i32) -> f64 {
        rt.managed().unwrap().big_float(handle).unwrap()
    }

    #[test]
    fn test_constructors() {
        let mut rt = runtime();
        let parts = rt.big_float_new_from_parts(-3, 25, -2).unwrap();
        assert_eq!(value(&mut rt, parts), -3.25);
        let frac = rt.big_float_new_from_frac(1, 4).unwrap();
        assert_eq!(value(&mut rt, frac), 0.25);
        let sci = rt.big_float_new_from_sci(15, -1).unwrap();
        assert_eq!(value(&mut rt, sci), 1.5);

        assert_eq!(rt.big_float_new_from_frac(1, 0), Err(VmError::DivisionByZero));
        assert!(rt.big_float_new_from_parts(1, 1, 2).is_err());
        assert_eq!(
            rt.big_float_new_from_sci(1, 400),
            Err(VmError::InfinityFloatOperation)
        );
    }

    #[test]
    fn test_arithmetic() {
        let mut rt = runtime();
        let a = rt.big_float_new_from_frac(3, 2).unwrap();
        let b = rt.big_float_new_from_frac(1, 2).unwrap();
        let dest = rt.big_float_new_from_frac(0, 1).unwrap();

        rt.big_float_add(dest, a, b).unwrap();
        assert_eq!(value(&mut rt, dest), 2.0);
        rt.big_float_div(dest, a, b).unwrap();
        assert_eq!(value(&mut rt, dest), 3.0);
        rt.big_float_pow(dest, dest, 2).unwrap();
        assert_eq!(value(&mut rt, dest), 9.0);
        rt.big_float_sqrt(dest, dest).unwrap();
        assert_eq!(value(&mut rt, dest), 3.0);
        assert_eq!(rt.big_float_cmp(a, b).unwrap(), 1);
        rt.big_float_neg(dest, a).unwrap();
        assert_eq!(rt.big_float_sign(dest).unwrap(), -1);
    }

    #[test]
    fn test_overflow_leaves_destination() {
        let mut rt = runtime();
        let huge = rt.big_float_new_from_sci(1, 300).unwrap();
        let dest = rt.big_float_new_from_frac(7, 1).unwrap();
        assert_eq!(rt.big_float_mul(dest, huge, huge), Err(VmError::InfinityFloatOperation));
        assert_eq!(value(&mut rt, dest), 7.0);

        let zero = rt.big_float_new_from_frac(0, 1).unwrap();
        assert_eq!(rt.big_float_div(dest, huge, zero), Err(VmError::DivisionByZero));
    }

    #[test]
    fn test_rounding_into_big_int() {
        let mut rt = runtime();
        let f = rt.big_float_new_from_frac(-7, 2).unwrap();
        rt.big_float_floor(0, f).unwrap();
        rt.big_float_ceil(1, f).unwrap();
        rt.big_float_truncate(2, f).unwrap();
        let types = rt.managed().unwrap();
        assert_eq!(types.big_int(0).unwrap(), BigInt::from(-4));
        assert_eq!(types.big_int(1).unwrap(), BigInt::from(-3));
        assert_eq!(types.big_int(2).unwrap(), BigInt::from(-3));
        assert!(!rt.big_float_is_int(f).unwrap());
    }

    #[test]
    fn test_unallocated_float_handle() {
        let mut rt = runtime();
        assert!(matches!(
            rt.big_float_get_const_pi(0),
            Err(VmError::InvalidHandle { .. })
        ));
        let h = rt.big_float_new_from_frac(0, 1).unwrap();
        rt.big_float_get_const_pi(h).unwrap();
        assert_eq!(value(&mut rt, h), std::f64::consts::PI);
    }

    #[test]
    fn test_float_encoding() {
        assert_eq!(decode_float(&encode_float(-2.5)).unwrap(), -2.5);
        assert!(decode_float(&[0u8; 4]).is_err());
        assert_eq!(
            decode_float(&encode_float(f64::NAN)),
            Err(VmError::InfinityFloatOperation)
        );
    }
}
