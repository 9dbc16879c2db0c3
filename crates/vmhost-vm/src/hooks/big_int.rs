//! Arbitrary-precision integer operations on handles.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;

use vmhost_types::Address;

use crate::error::VmError;
use crate::managed_types::{
    big_int_from_signed, big_int_from_unsigned, signed_bytes, unsigned_bytes,
};
use crate::runtime::Runtime;

/// Euclidean quotient and remainder; the remainder is never negative.
fn euclid_div_rem(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let mut remainder = a % b;
    if remainder.is_negative() {
        remainder += b.abs();
    }
    let quotient = (a - &remainder) / b;
    (quotient, remainder)
}

fn ordering_to_i32(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// 64-bit limbs holding a value of `bits` bits.
fn limbs(bits: u64) -> u64 {
    bits / 64 + u64::from(bits % 64 != 0)
}

fn require_non_negative(values: &[&BigInt]) -> Result<(), VmError> {
    if values.iter().any(|v| v.is_negative()) {
        return Err(VmError::BitwiseNegative);
    }
    Ok(())
}

fn require_non_zero(divisor: &BigInt) -> Result<(), VmError> {
    if divisor.is_zero() {
        return Err(VmError::DivisionByZero);
    }
    Ok(())
}

impl Runtime {
    fn charge_big_int(&mut self, cost: u64) -> Result<(), VmError> {
        self.use_gas(cost)
    }

    /// Size-dependent cost of multiplying operands of `a_bits` and `b_bits`
    /// bits: every pair of limbs plus the bytes of the product.
    fn charge_product(&mut self, a_bits: u64, b_bits: u64) -> Result<(), VmError> {
        let schedule = *self.schedule();
        let limb_products = limbs(a_bits).saturating_mul(limbs(b_bits));
        let product_bytes = a_bits.saturating_add(b_bits) / 8;
        self.gas().charge_with_bytes(
            schedule.big_int_per_limb_product.saturating_mul(limb_products),
            schedule.data_copy_per_byte,
            usize::try_from(product_bytes).unwrap_or(usize::MAX),
        )
    }

    fn big_int_value(&mut self, handle: i32) -> Result<BigInt, VmError> {
        self.managed()?.big_int(handle)
    }

    fn set_big_int_value(&mut self, handle: i32, value: BigInt) -> Result<(), VmError> {
        self.managed()?.set_big_int(handle, value)
    }

    /// Read both operands, compute, then store. The destination is only
    /// touched when the operation succeeds.
    fn big_int_binary<F>(&mut self, cost: u64, dest: i32, a: i32, b: i32, op: F) -> Result<(), VmError>
    where
        F: FnOnce(&BigInt, &BigInt) -> Result<BigInt, VmError>,
    {
        self.charge_big_int(cost)?;
        let a = self.big_int_value(a)?;
        let b = self.big_int_value(b)?;
        let result = op(&a, &b)?;
        self.set_big_int_value(dest, result)
    }

    fn big_int_unary<F>(&mut self, cost: u64, dest: i32, a: i32, op: F) -> Result<(), VmError>
    where
        F: FnOnce(&BigInt) -> Result<BigInt, VmError>,
    {
        self.charge_big_int(cost)?;
        let a = self.big_int_value(a)?;
        let result = op(&a)?;
        self.set_big_int_value(dest, result)
    }

    pub fn big_int_new(&mut self, value: i64) -> Result<i32, VmError> {
        let cost = self.schedule().big_int_new;
        self.charge_big_int(cost)?;
        Ok(self.managed()?.new_big_int(BigInt::from(value)))
    }

    pub fn big_int_unsigned_byte_length(&mut self, handle: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        Ok(unsigned_bytes(&self.big_int_value(handle)?).len() as i32)
    }

    pub fn big_int_signed_byte_length(&mut self, handle: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        Ok(signed_bytes(&self.big_int_value(handle)?).len() as i32)
    }

    pub fn big_int_get_unsigned_bytes(&mut self, handle: i32) -> Result<Vec<u8>, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let bytes = unsigned_bytes(&self.big_int_value(handle)?);
        self.gas().charge_data_copy(bytes.len())?;
        Ok(bytes)
    }

    pub fn big_int_get_signed_bytes(&mut self, handle: i32) -> Result<Vec<u8>, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let bytes = signed_bytes(&self.big_int_value(handle)?);
        self.gas().charge_data_copy(bytes.len())?;
        Ok(bytes)
    }

    pub fn big_int_set_unsigned_bytes(&mut self, handle: i32, bytes: &[u8]) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.use_gas_with_bytes(cost, bytes.len())?;
        self.set_big_int_value(handle, big_int_from_unsigned(bytes))
    }

    pub fn big_int_set_signed_bytes(&mut self, handle: i32, bytes: &[u8]) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.use_gas_with_bytes(cost, bytes.len())?;
        self.set_big_int_value(handle, big_int_from_signed(bytes))
    }

    pub fn big_int_is_int64(&mut self, handle: i32) -> Result<bool, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        Ok(self.big_int_value(handle)?.to_i64().is_some())
    }

    pub fn big_int_get_int64(&mut self, handle: i32) -> Result<i64, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        self.big_int_value(handle)?
            .to_i64()
            .ok_or_else(|| VmError::InvalidArgument("big int does not fit in 64 bits".to_string()))
    }

    pub fn big_int_set_int64(&mut self, handle: i32, value: i64) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        self.set_big_int_value(handle, BigInt::from(value))
    }

    pub fn big_int_add(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_binary(cost, dest, a, b, |a, b| Ok(a + b))
    }

    pub fn big_int_sub(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_binary(cost, dest, a, b, |a, b| Ok(a - b))
    }

    pub fn big_int_mul(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_mul;
        self.charge_big_int(cost)?;
        let a = self.big_int_value(a)?;
        let b = self.big_int_value(b)?;
        self.charge_product(a.bits(), b.bits())?;
        self.set_big_int_value(dest, a * b)
    }

    /// Quotient truncated towards zero.
    pub fn big_int_tdiv(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_div;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_zero(b)?;
            Ok(a / b)
        })
    }

    /// Remainder with the sign of the dividend.
    pub fn big_int_tmod(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_div;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_zero(b)?;
            Ok(a % b)
        })
    }

    pub fn big_int_ediv(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_div;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_zero(b)?;
            Ok(euclid_div_rem(a, b).0)
        })
    }

    pub fn big_int_emod(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_div;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_zero(b)?;
            Ok(euclid_div_rem(a, b).1)
        })
    }

    pub fn big_int_pow(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_pow;
        self.charge_big_int(cost)?;
        let base = self.big_int_value(a)?;
        let exponent = self.big_int_value(b)?;
        let exponent = exponent
            .to_u32()
            .ok_or_else(|| VmError::InvalidArgument("exponent must be a non-negative 32-bit value".to_string()))?;

        // Pay for the result before computing it; the last squaring
        // dominates.
        let result_bits = base.bits().saturating_mul(u64::from(exponent));
        self.charge_product(result_bits / 2, result_bits - result_bits / 2)?;

        self.set_big_int_value(dest, base.pow(exponent))
    }

    pub fn big_int_sqrt(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_sqrt;
        self.big_int_unary(cost, dest, a, |a| {
            if a.is_negative() {
                return Err(VmError::InvalidArgument("square root of a negative number".to_string()));
            }
            Ok(a.sqrt())
        })
    }

    pub fn big_int_abs(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_unary(cost, dest, a, |a| Ok(a.abs()))
    }

    pub fn big_int_neg(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_unary(cost, dest, a, |a| Ok(-a))
    }

    /// Bitwise complement of a non-negative value, `-a - 1`.
    pub fn big_int_not(&mut self, dest: i32, a: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_unary(cost, dest, a, |a| {
            require_non_negative(&[a])?;
            Ok(-a - 1)
        })
    }

    pub fn big_int_and(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_negative(&[a, b])?;
            Ok(a & b)
        })
    }

    pub fn big_int_or(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_negative(&[a, b])?;
            Ok(a | b)
        })
    }

    pub fn big_int_xor(&mut self, dest: i32, a: i32, b: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_binary(cost, dest, a, b, |a, b| {
            require_non_negative(&[a, b])?;
            Ok(a ^ b)
        })
    }

    pub fn big_int_shr(&mut self, dest: i32, a: i32, bits: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.big_int_unary(cost, dest, a, |a| {
            if a.is_negative() || bits < 0 {
                return Err(VmError::ShiftNegative);
            }
            Ok(a >> bits as usize)
        })
    }

    pub fn big_int_shl(&mut self, dest: i32, a: i32, bits: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let value = self.big_int_value(a)?;
        if value.is_negative() || bits < 0 {
            return Err(VmError::ShiftNegative);
        }
        self.gas().charge_data_copy(bits as usize / 8)?;
        self.set_big_int_value(dest, value << bits as usize)
    }

    /// Position of the highest set bit, -1 for values below one.
    pub fn big_int_log2(&mut self, handle: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let value = self.big_int_value(handle)?;
        if value.sign() != Sign::Plus {
            return Ok(-1);
        }
        Ok(value.bits() as i32 - 1)
    }

    pub fn big_int_sign(&mut self, handle: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        Ok(match self.big_int_value(handle)?.sign() {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        })
    }

    pub fn big_int_cmp(&mut self, a: i32, b: i32) -> Result<i32, VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let a = self.big_int_value(a)?;
        let b = self.big_int_value(b)?;
        Ok(ordering_to_i32(a.cmp(&b)))
    }

    pub fn big_int_finish_unsigned(&mut self, handle: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let bytes = unsigned_bytes(&self.big_int_value(handle)?);
        self.finish(bytes)
    }

    pub fn big_int_finish_signed(&mut self, handle: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_op;
        self.charge_big_int(cost)?;
        let bytes = signed_bytes(&self.big_int_value(handle)?);
        self.finish(bytes)
    }

    pub fn big_int_get_unsigned_argument(&mut self, index: i32, handle: i32) -> Result<(), VmError> {
        let argument = self.argument(index)?;
        self.set_big_int_value(handle, big_int_from_unsigned(&argument))
    }

    pub fn big_int_get_signed_argument(&mut self, index: i32, handle: i32) -> Result<(), VmError> {
        let argument = self.argument(index)?;
        self.set_big_int_value(handle, big_int_from_signed(&argument))
    }

    pub fn big_int_get_call_value(&mut self, handle: i32) -> Result<(), VmError> {
        let value = self.call_value()?;
        self.set_big_int_value(handle, BigInt::from(value))
    }

    pub fn big_int_get_external_balance(&mut self, address: &Address, handle: i32) -> Result<(), VmError> {
        let balance = self.external_balance(address)?;
        self.set_big_int_value(handle, BigInt::from(balance))
    }

    /// Decimal representation of a big int, written into a managed buffer.
    pub fn big_int_to_string(&mut self, handle: i32, dest_buffer: i32) -> Result<(), VmError> {
        let cost = self.schedule().big_int_to_string;
        self.charge_big_int(cost)?;
        let value = self.big_int_value(handle)?;
        // Radix conversion is quadratic in the length of the value.
        self.charge_product(value.bits(), value.bits())?;
        self.managed()?.set_buffer(dest_buffer, value.to_string().into_bytes())
    }
}
