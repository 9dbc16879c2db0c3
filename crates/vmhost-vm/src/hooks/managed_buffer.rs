//! Byte buffers held by the host and addressed by handles.

use vmhost_types::Address;

use crate::error::VmError;
use crate::hooks::big_float::{decode_float, encode_float};
use crate::managed_types::{
    big_int_from_signed, big_int_from_unsigned, signed_bytes, unsigned_bytes,
};
use crate::runtime::Runtime;
use crate::storage::StorageStatus;

/// Range `[start, start + len)` of a buffer of `size` bytes, if it fits.
fn slice_range(size: usize, start: i32, len: i32) -> Option<std::ops::Range<usize>> {
    if start < 0 || len < 0 {
        return None;
    }
    let start = start as usize;
    let end = start.checked_add(len as usize)?;
    (end <= size).then_some(start..end)
}

impl Runtime {
    fn charge_buffer_op(&mut self, len: usize) -> Result<(), VmError> {
        let cost = self.schedule().m_buffer_op;
        self.use_gas_with_bytes(cost, len)
    }

    fn buffer_bytes(&mut self, handle: i32) -> Result<Vec<u8>, VmError> {
        Ok(self.managed()?.buffer(handle)?.to_vec())
    }

    pub fn m_buffer_new(&mut self) -> Result<i32, VmError> {
        let cost = self.schedule().m_buffer_new;
        self.use_gas(cost)?;
        Ok(self.managed()?.new_buffer(Vec::new()))
    }

    pub fn m_buffer_new_from_bytes(&mut self, bytes: Vec<u8>) -> Result<i32, VmError> {
        let cost = self.schedule().m_buffer_new;
        self.use_gas_with_bytes(cost, bytes.len())?;
        Ok(self.managed()?.new_buffer(bytes))
    }

    pub fn m_buffer_get_length(&mut self, handle: i32) -> Result<i32, VmError> {
        self.charge_buffer_op(0)?;
        Ok(self.managed()?.buffer(handle)?.len() as i32)
    }

    pub fn m_buffer_get_bytes(&mut self, handle: i32) -> Result<Vec<u8>, VmError> {
        let bytes = self.buffer_bytes(handle)?;
        self.charge_buffer_op(bytes.len())?;
        Ok(bytes)
    }

    /// Bytes `[start, start + len)`; `None` when the range does not fit.
    pub fn m_buffer_get_byte_slice(&mut self, handle: i32, start: i32, len: i32) -> Result<Option<Vec<u8>>, VmError> {
        self.charge_buffer_op(len.max(0) as usize)?;
        let buffer = self.managed()?.buffer(handle)?;
        Ok(slice_range(buffer.len(), start, len).map(|range| buffer[range].to_vec()))
    }

    /// Copy a slice of `source` into `dest`, replacing its contents. Returns
    /// false when the range does not fit.
    pub fn m_buffer_copy_byte_slice(&mut self, source: i32, start: i32, len: i32, dest: i32) -> Result<bool, VmError> {
        self.charge_buffer_op(len.max(0) as usize)?;
        let types = self.managed()?;
        let buffer = types.buffer(source)?;
        let Some(range) = slice_range(buffer.len(), start, len) else {
            return Ok(false);
        };
        let slice = buffer[range].to_vec();
        types.set_buffer(dest, slice)?;
        Ok(true)
    }

    pub fn m_buffer_eq(&mut self, a: i32, b: i32) -> Result<bool, VmError> {
        self.charge_buffer_op(0)?;
        let types = self.managed()?;
        Ok(types.buffer(a)? == types.buffer(b)?)
    }

    pub fn m_buffer_set_bytes(&mut self, handle: i32, bytes: Vec<u8>) -> Result<(), VmError> {
        self.charge_buffer_op(bytes.len())?;
        self.managed()?.set_buffer(handle, bytes)
    }

    /// Overwrite bytes starting at `start`. Returns false, leaving the
    /// buffer untouched, when the data would run past the end.
    pub fn m_buffer_set_byte_slice(&mut self, handle: i32, start: i32, data: &[u8]) -> Result<bool, VmError> {
        self.charge_buffer_op(data.len())?;
        let buffer = self.managed()?.buffer_mut(handle)?;
        let Some(range) = slice_range(buffer.len(), start, data.len() as i32) else {
            return Ok(false);
        };
        buffer[range].copy_from_slice(data);
        Ok(true)
    }

    pub fn m_buffer_append(&mut self, dest: i32, source: i32) -> Result<(), VmError> {
        let data = self.buffer_bytes(source)?;
        self.m_buffer_append_bytes(dest, &data)
    }

    pub fn m_buffer_append_bytes(&mut self, dest: i32, data: &[u8]) -> Result<(), VmError> {
        self.charge_buffer_op(data.len())?;
        self.managed()?.buffer_mut(dest)?.extend_from_slice(data);
        Ok(())
    }

    pub fn m_buffer_to_big_int_unsigned(&mut self, buffer: i32, big_int: i32) -> Result<(), VmError> {
        let bytes = self.buffer_bytes(buffer)?;
        self.charge_buffer_op(bytes.len())?;
        self.managed()?.set_big_int(big_int, big_int_from_unsigned(&bytes))
    }

    pub fn m_buffer_to_big_int_signed(&mut self, buffer: i32, big_int: i32) -> Result<(), VmError> {
        let bytes = self.buffer_bytes(buffer)?;
        self.charge_buffer_op(bytes.len())?;
        self.managed()?.set_big_int(big_int, big_int_from_signed(&bytes))
    }

    pub fn m_buffer_from_big_int_unsigned(&mut self, buffer: i32, big_int: i32) -> Result<(), VmError> {
        let bytes = unsigned_bytes(&self.managed()?.big_int(big_int)?);
        self.charge_buffer_op(bytes.len())?;
        self.managed()?.set_buffer(buffer, bytes)
    }

    pub fn m_buffer_from_big_int_signed(&mut self, buffer: i32, big_int: i32) -> Result<(), VmError> {
        let bytes = signed_bytes(&self.managed()?.big_int(big_int)?);
        self.charge_buffer_op(bytes.len())?;
        self.managed()?.set_buffer(buffer, bytes)
    }

    pub fn m_buffer_to_big_float(&mut self, buffer: i32, big_float: i32) -> Result<(), VmError> {
        let bytes = self.buffer_bytes(buffer)?;
        self.charge_buffer_op(bytes.len())?;
        let value = decode_float(&bytes)?;
        self.managed()?.set_big_float(big_float, value)
    }

    pub fn m_buffer_from_big_float(&mut self, buffer: i32, big_float: i32) -> Result<(), VmError> {
        let value = self.managed()?.big_float(big_float)?;
        let bytes = encode_float(value);
        self.charge_buffer_op(bytes.len())?;
        self.managed()?.set_buffer(buffer, bytes)
    }

    pub fn m_buffer_storage_store(&mut self, key: i32, value: i32) -> Result<StorageStatus, VmError> {
        let key = self.buffer_bytes(key)?;
        let value = self.buffer_bytes(value)?;
        self.storage_store(&key, &value)
    }

    pub fn m_buffer_storage_load(&mut self, key: i32, dest: i32) -> Result<(), VmError> {
        let key = self.buffer_bytes(key)?;
        let value = self.storage_load(&key)?;
        self.managed()?.set_buffer(dest, value)
    }

    pub fn m_buffer_storage_load_from_address(&mut self, address: i32, key: i32, dest: i32) -> Result<(), VmError> {
        let address = Address::from_slice(&self.buffer_bytes(address)?)?;
        let key = self.buffer_bytes(key)?;
        let value = self.storage_load_from_address(&address, &key)?;
        self.managed()?.set_buffer(dest, value)
    }

    pub fn m_buffer_get_argument(&mut self, index: i32, dest: i32) -> Result<(), VmError> {
        let argument = self.argument(index)?;
        self.managed()?.set_buffer(dest, argument)
    }

    pub fn m_buffer_finish(&mut self, handle: i32) -> Result<(), VmError> {
        let bytes = self.buffer_bytes(handle)?;
        self.finish(bytes)
    }

    /// Fill the buffer with `len` pseudo-random bytes.
    pub fn m_buffer_set_random(&mut self, handle: i32, len: i32) -> Result<(), VmError> {
        if len < 0 {
            return Err(VmError::NegativeLength);
        }
        self.charge_buffer_op(len as usize)?;
        let bytes = self.random_bytes(len as usize);
        self.managed()?.set_buffer(handle, bytes)
    }

    pub fn managed_sc_address(&mut self, dest: i32) -> Result<(), VmError> {
        let address = self.sc_address()?;
        self.managed()?.set_buffer(dest, address.as_bytes().to_vec())
    }

    pub fn managed_caller(&mut self, dest: i32) -> Result<(), VmError> {
        let caller = self.caller()?;
        self.managed()?.set_buffer(dest, caller.as_bytes().to_vec())
    }

    /// Build the error that ends the context, with the buffer as message.
    pub fn managed_signal_error(&mut self, message: i32) -> VmError {
        match self.buffer_bytes(message) {
            Ok(bytes) => self.signal_error(&bytes),
            Err(err) => err,
        }
    }

    pub fn managed_get_return_data(&mut self, index: i32, dest: i32) -> Result<(), VmError> {
        let data = self.return_data(index)?;
        self.managed()?.set_buffer(dest, data)
    }
}
