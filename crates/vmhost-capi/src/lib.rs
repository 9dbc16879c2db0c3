//! C embedding surface for the execution host, in the shape of
//! `libvmexeccapi.h`.
//!
//! Errors are reported per thread: a failing call records its message and
//! the embedder reads it back with a length query followed by a buffer fill.

#![allow(non_camel_case_types)]

pub mod error;
pub mod imports;

use std::os::raw::{c_char, c_int, c_uint};
use std::slice;

use vmhost_types::{ContractCallInput, ContractCreateInput, VmOutput};
use vmhost_vm::{ValueType, VmHost};

pub use error::{execution_info, set_execution_info, take_last_error, update_last_error, CapiError};
pub use imports::{ImportEntry, ImportFunc, RawImportFn};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum vm_exec_result_t {
    VM_EXEC_OK = 1,
    VM_EXEC_ERROR = 2,
}

pub type vm_exec_value_tag = u32;

pub const VM_EXEC_VALUE_I32: vm_exec_value_tag = 0;
pub const VM_EXEC_VALUE_I64: vm_exec_value_tag = 1;

/// Opaque to C; points at an [`ImportFunc`].
#[repr(C)]
pub struct vm_exec_import_func_t {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct vm_exec_byte_array {
    pub bytes: *const u8,
    pub bytes_len: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct vm_exec_import_t {
    pub module_name: vm_exec_byte_array,
    pub import_name: vm_exec_byte_array,
    pub import_func: *const vm_exec_import_func_t,
}

fn value_type(tag: vm_exec_value_tag) -> Result<ValueType, CapiError> {
    match tag {
        VM_EXEC_VALUE_I32 => Ok(ValueType::I32),
        VM_EXEC_VALUE_I64 => Ok(ValueType::I64),
        other => Err(CapiError::UnknownValueTag(other)),
    }
}

/// # Safety
///
/// `tags` must be null or valid for `len` reads.
unsafe fn value_types(tags: *const vm_exec_value_tag, len: c_uint, what: &'static str) -> Result<Vec<ValueType>, CapiError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if tags.is_null() {
        return Err(CapiError::NullPointer(what));
    }
    slice::from_raw_parts(tags, len as usize)
        .iter()
        .map(|tag| value_type(*tag))
        .collect()
}

/// # Safety
///
/// `array.bytes` must be null or valid for `array.bytes_len` reads.
unsafe fn byte_array_str<'a>(array: &vm_exec_byte_array, what: &'static str) -> Result<&'a str, CapiError> {
    if array.bytes_len == 0 {
        return Ok("");
    }
    if array.bytes.is_null() {
        return Err(CapiError::NullPointer(what));
    }
    let bytes = slice::from_raw_parts(array.bytes, array.bytes_len as usize);
    std::str::from_utf8(bytes).map_err(|_| CapiError::InvalidUtf8(what))
}

#[no_mangle]
pub extern "C" fn vm_exec_last_error_length() -> c_int {
    error::last_error_length()
}

/// Copy the last error message into `dest_buffer`, trailing NUL included.
///
/// Returns the number of bytes written, 0 when there is no error, or -1
/// when the buffer is null or too small. The message is kept until it has
/// been read successfully.
///
/// # Safety
///
/// `dest_buffer` must be null or valid for `dest_buffer_len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn vm_exec_last_error_message(dest_buffer: *mut c_char, dest_buffer_len: c_int) -> c_int {
    let Some(message) = take_last_error() else {
        return 0;
    };
    let written = error::copy_message(&message, dest_buffer, dest_buffer_len);
    if written < 0 {
        update_last_error(message);
    }
    written
}

#[no_mangle]
pub extern "C" fn vm_exec_execution_info_length() -> c_int {
    error::message_length(Some(&execution_info()))
}

/// Same protocol as [`vm_exec_last_error_message`], for the info string of
/// the last execution on this thread.
///
/// # Safety
///
/// `dest_buffer` must be null or valid for `dest_buffer_len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn vm_exec_execution_info_message(dest_buffer: *mut c_char, dest_buffer_len: c_int) -> c_int {
    let info = execution_info();
    if info.is_empty() {
        return 0;
    }
    error::copy_message(&info, dest_buffer, dest_buffer_len)
}

/// Create an import function. Returns null and records the last error when
/// a tag is unknown or more than one return type is given.
///
/// # Safety
///
/// `params` and `returns` must be null or valid for their lengths.
#[no_mangle]
pub unsafe extern "C" fn vm_exec_import_func_new(
    func: Option<RawImportFn>,
    params: *const vm_exec_value_tag,
    params_len: c_uint,
    returns: *const vm_exec_value_tag,
    returns_len: c_uint,
) -> *mut vm_exec_import_func_t {
    let created = func.ok_or(CapiError::NullPointer("func")).and_then(|func| {
        let params = value_types(params, params_len, "params")?;
        let returns = value_types(returns, returns_len, "returns")?;
        ImportFunc::new(func, params, returns)
    });
    match created {
        Ok(func) => Box::into_raw(Box::new(func)).cast(),
        Err(err) => {
            update_last_error(err);
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `func` must be null or come from [`vm_exec_import_func_new`], and must
/// not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn vm_exec_import_func_destroy(func: *mut vm_exec_import_func_t) {
    if !func.is_null() {
        drop(Box::from_raw(func.cast::<ImportFunc>()));
    }
}

/// # Safety
///
/// `imports` must be null or valid for `imports_len` reads, and every
/// entry's byte arrays and function pointer must be valid.
unsafe fn bind_imports(imports: *const vm_exec_import_t, imports_len: c_uint) -> Result<Vec<ImportEntry>, CapiError> {
    if imports_len == 0 {
        return Ok(Vec::new());
    }
    if imports.is_null() {
        return Err(CapiError::NullPointer("imports"));
    }
    slice::from_raw_parts(imports, imports_len as usize)
        .iter()
        .map(|import| {
            let module = byte_array_str(&import.module_name, "module_name")?;
            let name = byte_array_str(&import.import_name, "import_name")?;
            let func = import
                .import_func
                .cast::<ImportFunc>()
                .as_ref()
                .ok_or(CapiError::NullPointer("import_func"))?;
            crate::imports::bind(module, name, func)
        })
        .collect()
}

/// Validate every import against the host function registry and install
/// them as the import table. On failure the table is left as it was.
///
/// # Safety
///
/// `imports` must be null or valid for `imports_len` reads, and every
/// entry's byte arrays and function pointer must be valid.
#[no_mangle]
pub unsafe extern "C" fn vm_exec_set_imports(imports: *mut vm_exec_import_t, imports_len: c_uint) -> vm_exec_result_t {
    match bind_imports(imports, imports_len) {
        Ok(entries) => {
            crate::imports::install(entries);
            vm_exec_result_t::VM_EXEC_OK
        }
        Err(err) => {
            tracing::warn!(error = %err, "rejected import table");
            update_last_error(err);
            vm_exec_result_t::VM_EXEC_ERROR
        }
    }
}

#[no_mangle]
pub extern "C" fn vm_exec_set_sigsegv_passthrough() {
    vmhost_vm::set_sigsegv_passthrough();
}

/// Record `output` as this thread's execution info, and as its last error
/// when the execution failed.
pub fn record_execution(output: &VmOutput) {
    set_execution_info(format!(
        "return code: {}, gas remaining: {}, message: {}",
        output.return_code, output.gas_remaining, output.return_message
    ));
    if !output.is_ok() {
        update_last_error(format!("{}: {}", output.return_code, output.return_message));
    }
}

pub fn run_smart_contract_call(host: &VmHost, input: &ContractCallInput) -> VmOutput {
    let output = host.run_smart_contract_call(input);
    record_execution(&output);
    output
}

pub fn run_smart_contract_create(host: &VmHost, input: &ContractCreateInput) -> VmOutput {
    let output = host.run_smart_contract_create(input);
    record_execution(&output);
    output
}
