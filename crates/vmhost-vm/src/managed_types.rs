//! Handle tables for big integers, big floats and managed buffers.
//!
//! Handles are allocated monotonically from 0 inside a scope. A same-context
//! call reuses its parent's scope, a destination-context call opens a fresh
//! one, so the scopes form a stack that mirrors the call stack.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use crate::error::{HandleKind, VmError};

/// Highest big-int handle that may be materialized without an explicit
/// allocation.
pub const LENIENT_HANDLE_LIMIT: i32 = 65_536;

/// Arena of values addressed by small integer handles.
#[derive(Debug, Clone)]
pub struct HandleTable<T> {
    values: Vec<T>,
    kind: HandleKind,
}

impl<T: Default + Clone> HandleTable<T> {
    pub fn new(kind: HandleKind) -> Self {
        Self {
            values: Vec::new(),
            kind,
        }
    }

    /// Allocate the next handle.
    pub fn insert(&mut self, value: T) -> i32 {
        self.values.push(value);
        (self.values.len() - 1) as i32
    }

    /// Next handle `insert` will return.
    pub fn next_handle(&self) -> i32 {
        self.values.len() as i32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn index(&self, handle: i32) -> Result<usize, VmError> {
        if handle < 0 || handle as usize >= self.values.len() {
            return Err(VmError::InvalidHandle {
                kind: self.kind,
                handle,
            });
        }
        Ok(handle as usize)
    }

    pub fn get(&self, handle: i32) -> Result<&T, VmError> {
        let index = self.index(handle)?;
        Ok(&self.values[index])
    }

    pub fn get_mut(&mut self, handle: i32) -> Result<&mut T, VmError> {
        let index = self.index(handle)?;
        Ok(&mut self.values[index])
    }

    pub fn set(&mut self, handle: i32, value: T) -> Result<(), VmError> {
        *self.get_mut(handle)? = value;
        Ok(())
    }

    /// Like `get_mut`, but materializes default values up to `handle`
    /// when it was never allocated.
    pub fn get_or_default(&mut self, handle: i32) -> Result<&mut T, VmError> {
        if handle < 0 || handle > LENIENT_HANDLE_LIMIT {
            return Err(VmError::InvalidHandle {
                kind: self.kind,
                handle,
            });
        }
        let index = handle as usize;
        if index >= self.values.len() {
            self.values.resize(index + 1, T::default());
        }
        Ok(&mut self.values[index])
    }
}

/// All handle tables of one scope.
#[derive(Debug, Clone)]
pub struct ManagedTypes {
    big_ints: HandleTable<BigInt>,
    big_floats: HandleTable<f64>,
    buffers: HandleTable<Vec<u8>>,
}

impl Default for ManagedTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedTypes {
    pub fn new() -> Self {
        Self {
            big_ints: HandleTable::new(HandleKind::BigInt),
            big_floats: HandleTable::new(HandleKind::BigFloat),
            buffers: HandleTable::new(HandleKind::ManagedBuffer),
        }
    }

    // Big integers are lenient: unknown handles read as zero.

    pub fn new_big_int(&mut self, value: BigInt) -> i32 {
        self.big_ints.insert(value)
    }

    pub fn big_int(&mut self, handle: i32) -> Result<BigInt, VmError> {
        self.big_ints.get_or_default(handle).map(|v| v.clone())
    }

    pub fn set_big_int(&mut self, handle: i32, value: BigInt) -> Result<(), VmError> {
        *self.big_ints.get_or_default(handle)? = value;
        Ok(())
    }

    pub fn next_big_int_handle(&self) -> i32 {
        self.big_ints.next_handle()
    }

    pub fn new_big_float(&mut self, value: f64) -> i32 {
        self.big_floats.insert(value)
    }

    pub fn big_float(&self, handle: i32) -> Result<f64, VmError> {
        self.big_floats.get(handle).copied()
    }

    pub fn set_big_float(&mut self, handle: i32, value: f64) -> Result<(), VmError> {
        self.big_floats.set(handle, value)
    }

    pub fn new_buffer(&mut self, bytes: Vec<u8>) -> i32 {
        self.buffers.insert(bytes)
    }

    pub fn buffer(&self, handle: i32) -> Result<&[u8], VmError> {
        self.buffers.get(handle).map(Vec::as_slice)
    }

    pub fn buffer_mut(&mut self, handle: i32) -> Result<&mut Vec<u8>, VmError> {
        self.buffers.get_mut(handle)
    }

    pub fn set_buffer(&mut self, handle: i32, bytes: Vec<u8>) -> Result<(), VmError> {
        self.buffers.set(handle, bytes)
    }

    pub fn next_buffer_handle(&self) -> i32 {
        self.buffers.next_handle()
    }
}

/// Stack of handle scopes; a scope is addressed by its index.
#[derive(Debug, Clone, Default)]
pub struct ManagedScopes {
    scopes: Vec<ManagedTypes>,
}

impl ManagedScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh scope and return its index.
    pub fn push(&mut self) -> usize {
        self.scopes.push(ManagedTypes::new());
        self.scopes.len() - 1
    }

    /// Drop the innermost scope.
    pub fn pop(&mut self) -> Option<ManagedTypes> {
        self.scopes.pop()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ManagedTypes> {
        self.scopes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ManagedTypes> {
        self.scopes.get_mut(index)
    }
}

/// Magnitude as big-endian bytes; zero encodes as no bytes.
pub fn unsigned_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.magnitude().to_bytes_be()
}

/// Two's complement big-endian bytes; zero encodes as no bytes.
pub fn signed_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_be()
}

pub fn big_int_from_unsigned(bytes: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, bytes)
}

pub fn big_int_from_signed(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_be(bytes)
}
