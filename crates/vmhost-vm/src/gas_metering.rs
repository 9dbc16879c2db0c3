//! Gas schedule and per-context gas tracking.
//!
//! WASM instructions are metered by the executor (one unit per fuel unit);
//! host functions charge the costs below before acting.

use serde::{Deserialize, Serialize};

use crate::error::VmError;

/// Gas schedule for host API operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    // Base API
    pub get_argument: u64,           // 100
    pub finish: u64,                 // 100
    pub signal_error: u64,           // 100
    pub get_context_info: u64,       // 100
    pub get_block_info: u64,         // 100
    pub get_return_data: u64,        // 100
    pub transfer_value: u64,         // 2,000
    pub log: u64,                    // 375
    pub log_per_topic: u64,          // 100
    pub data_copy_per_byte: u64,     // 1

    // Storage
    pub storage_load: u64,           // 1,000
    pub storage_store: u64,          // 5,000
    pub storage_per_byte: u64,       // 10
    pub int64_storage_store: u64,    // 5,000
    pub storage_delete_refund: u64,  // 1,000

    // Big integers
    pub big_int_new: u64,            // 20
    pub big_int_op: u64,             // 20
    pub big_int_mul: u64,            // 60
    pub big_int_div: u64,            // 100
    pub big_int_pow: u64,            // 300
    pub big_int_sqrt: u64,           // 300
    pub big_int_to_string: u64,      // 500
    pub big_int_per_limb_product: u64, // 1

    // Big floats
    pub big_float_new: u64,          // 30
    pub big_float_op: u64,           // 40
    pub big_float_div: u64,          // 100
    pub big_float_sqrt: u64,         // 300
    pub big_float_pow: u64,          // 500

    // Managed buffers
    pub m_buffer_new: u64,           // 20
    pub m_buffer_op: u64,            // 20

    // Small integers
    pub small_int_op: u64,           // 10

    // Crypto
    pub sha256: u64,                 // 1,000
    pub keccak256: u64,              // 1,000
    pub hash_per_byte: u64,          // 2

    // Composition
    pub execute_on_same_context: u64, // 1,000
    pub execute_on_dest_context: u64, // 1,000
    pub async_call_step: u64,         // 1,000
    pub async_callback_gas_lock: u64, // 3,000
    pub create_contract: u64,         // 10,000
    pub compile_per_byte: u64,        // 1
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            // Base API
            get_argument: 100,
            finish: 100,
            signal_error: 100,
            get_context_info: 100,
            get_block_info: 100,
            get_return_data: 100,
            transfer_value: 2_000,
            log: 375,
            log_per_topic: 100,
            data_copy_per_byte: 1,

            // Storage
            storage_load: 1_000,
            storage_store: 5_000,
            storage_per_byte: 10,
            int64_storage_store: 5_000,
            storage_delete_refund: 1_000,

            // Big integers
            big_int_new: 20,
            big_int_op: 20,
            big_int_mul: 60,
            big_int_div: 100,
            big_int_pow: 300,
            big_int_sqrt: 300,
            big_int_to_string: 500,
            big_int_per_limb_product: 1,

            // Big floats
            big_float_new: 30,
            big_float_op: 40,
            big_float_div: 100,
            big_float_sqrt: 300,
            big_float_pow: 500,

            // Managed buffers
            m_buffer_new: 20,
            m_buffer_op: 20,

            // Small integers
            small_int_op: 10,

            // Crypto
            sha256: 1_000,
            keccak256: 1_000,
            hash_per_byte: 2,

            // Composition
            execute_on_same_context: 1_000,
            execute_on_dest_context: 1_000,
            async_call_step: 1_000,
            async_callback_gas_lock: 3_000,
            create_contract: 10_000,
            compile_per_byte: 1,
        }
    }
}

impl GasSchedule {
    /// Gas every legacy async call must be able to reserve.
    pub fn min_async_call_cost(&self) -> u64 {
        self.async_call_step
            .saturating_mul(2)
            .saturating_add(self.async_callback_gas_lock)
    }

    /// Schedule where every operation is free. Handy for tests that only
    /// care about semantics.
    pub fn zero() -> Self {
        Self {
            get_argument: 0,
            finish: 0,
            signal_error: 0,
            get_context_info: 0,
            get_block_info: 0,
            get_return_data: 0,
            transfer_value: 0,
            log: 0,
            log_per_topic: 0,
            data_copy_per_byte: 0,
            storage_load: 0,
            storage_store: 0,
            storage_per_byte: 0,
            int64_storage_store: 0,
            storage_delete_refund: 0,
            big_int_new: 0,
            big_int_op: 0,
            big_int_mul: 0,
            big_int_div: 0,
            big_int_pow: 0,
            big_int_sqrt: 0,
            big_int_to_string: 0,
            big_int_per_limb_product: 0,
            big_float_new: 0,
            big_float_op: 0,
            big_float_div: 0,
            big_float_sqrt: 0,
            big_float_pow: 0,
            m_buffer_new: 0,
            m_buffer_op: 0,
            small_int_op: 0,
            sha256: 0,
            keccak256: 0,
            hash_per_byte: 0,
            execute_on_same_context: 0,
            execute_on_dest_context: 0,
            async_call_step: 0,
            async_callback_gas_lock: 0,
            create_contract: 0,
            compile_per_byte: 0,
        }
    }
}

/// Gas tracking for one call context.
#[derive(Debug, Clone)]
pub struct GasTracker {
    /// Gas limit for this execution
    limit: u64,
    /// Gas already used
    used: u64,
    /// Gas refunded
    refunded: u64,
    /// Gas schedule
    schedule: GasSchedule,
}

impl GasTracker {
    /// Create a new gas tracker.
    pub fn new(limit: u64, schedule: GasSchedule) -> Self {
        Self {
            limit,
            used: 0,
            refunded: 0,
            schedule,
        }
    }

    /// Create with default schedule.
    pub fn with_default_schedule(limit: u64) -> Self {
        Self::new(limit, GasSchedule::default())
    }

    /// Get gas limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Get gas used.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Get gas refunded.
    pub fn refunded(&self) -> u64 {
        self.refunded
    }

    /// Get remaining gas.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Get effective gas (used - refunded, never negative).
    pub fn effective_gas(&self) -> u64 {
        self.used.saturating_sub(self.refunded)
    }

    /// Charge gas.
    pub fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        let new_used = self.used.checked_add(amount).ok_or(VmError::OutOfGas {
            used: u64::MAX,
            limit: self.limit,
        })?;

        if new_used > self.limit {
            // Whatever was left is consumed by the failed charge.
            self.used = self.limit;
            Err(VmError::OutOfGas {
                used: new_used,
                limit: self.limit,
            })
        } else {
            self.used = new_used;
            Ok(())
        }
    }

    /// Charge a base cost plus a per-byte cost.
    pub fn charge_with_bytes(&mut self, base: u64, per_byte: u64, len: usize) -> Result<(), VmError> {
        let cost = per_byte
            .saturating_mul(len as u64)
            .saturating_add(base);
        self.charge(cost)
    }

    /// Charge for copying `len` bytes across the memory boundary.
    pub fn charge_data_copy(&mut self, len: usize) -> Result<(), VmError> {
        self.charge_with_bytes(0, self.schedule.data_copy_per_byte, len)
    }

    /// Consume everything that is left.
    pub fn exhaust(&mut self) {
        self.used = self.limit;
    }

    /// Align the tracker with an externally metered remaining amount
    /// (executor fuel). Only ever moves `used` forward.
    pub fn sync_remaining(&mut self, remaining: u64) {
        let used = self.limit.saturating_sub(remaining);
        if used > self.used {
            self.used = used;
        }
    }

    /// Refund gas (for storage deletion).
    pub fn refund(&mut self, amount: u64) {
        self.refunded = self.refunded.saturating_add(amount);
    }

    /// Get gas schedule.
    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_tracker() {
        let mut tracker = GasTracker::with_default_schedule(100_000);
        assert_eq!(tracker.limit(), 100_000);
        assert_eq!(tracker.remaining(), 100_000);

        tracker.charge(10_000).unwrap();
        assert_eq!(tracker.used(), 10_000);
        assert_eq!(tracker.remaining(), 90_000);
    }

    #[test]
    fn test_gas_tracker_out_of_gas() {
        let mut tracker = GasTracker::with_default_schedule(1_000);
        assert!(tracker.charge(10_000).is_err());
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn test_gas_refund() {
        let mut tracker = GasTracker::with_default_schedule(100_000);
        tracker.charge(10_000).unwrap();
        tracker.refund(2_500);
        assert_eq!(tracker.refunded(), 2_500);
        assert_eq!(tracker.effective_gas(), 7_500);
    }

    #[test]
    fn test_charge_with_bytes() {
        let mut tracker = GasTracker::with_default_schedule(100_000);
        tracker.charge_with_bytes(100, 10, 5).unwrap();
        assert_eq!(tracker.used(), 150);
        tracker.charge_data_copy(32).unwrap();
        assert_eq!(tracker.used(), 182);
    }

    #[test]
    fn test_sync_remaining_is_monotonic() {
        let mut tracker = GasTracker::with_default_schedule(1_000);
        tracker.sync_remaining(600);
        assert_eq!(tracker.used(), 400);
        tracker.sync_remaining(900);
        assert_eq!(tracker.used(), 400);
    }

    #[test]
    fn test_min_async_call_cost() {
        let schedule = GasSchedule::default();
        assert_eq!(schedule.min_async_call_cost(), 2 * 1_000 + 3_000);
        assert_eq!(GasSchedule::zero().min_async_call_cost(), 0);
    }
}
