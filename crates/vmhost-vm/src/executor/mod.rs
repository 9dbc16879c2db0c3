//! Execution backends.
//!
//! An [`Executor`] owns compiled code and runs a transaction's
//! [`Runtime`]. While code runs, host functions and composition operations
//! see the backend through [`Host`], which gives access to the runtime, to
//! the linear memory of the executing instance, and to nested execution.

pub mod mock;
pub mod wasmtime_executor;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::VmError;
use crate::runtime::Runtime;

pub use mock::{MockContract, MockExecutor, MockMethod};
pub use wasmtime_executor::WasmtimeExecutor;

static SIGSEGV_PASSTHROUGH: AtomicBool = AtomicBool::new(false);

/// Let faults inside execution reach the embedder instead of turning them
/// into failed transactions.
pub fn set_sigsegv_passthrough() {
    SIGSEGV_PASSTHROUGH.store(true, Ordering::SeqCst);
}

pub fn sigsegv_passthrough() -> bool {
    SIGSEGV_PASSTHROUGH.load(Ordering::SeqCst)
}

/// The executing instance, as seen from host functions.
pub trait Host {
    fn runtime(&mut self) -> &mut Runtime;

    /// Copy `len` bytes out of the executing instance's memory.
    fn mem_load(&mut self, offset: i32, len: i32) -> Result<Vec<u8>, VmError>;

    /// Copy `data` into the executing instance's memory.
    fn mem_store(&mut self, offset: i32, data: &[u8]) -> Result<(), VmError>;

    /// Whether `code` exports `function`.
    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError>;

    /// Validate `code` for deployment.
    fn check_code(&self, code: &[u8]) -> Result<(), VmError>;

    /// Instantiate `code` and run `function` on the current call context.
    /// The caller is responsible for pushing and popping the context.
    fn run_instance(&mut self, code: &[u8], function: &str) -> Result<(), VmError>;
}

/// Entry point run by an executor once the transaction's host is set up.
pub type Entry<'a> = &'a mut dyn FnMut(&mut dyn Host) -> Result<(), VmError>;

/// Backend running contract code.
pub trait Executor: Send + Sync {
    fn check_code(&self, code: &[u8]) -> Result<(), VmError>;

    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError>;

    /// Run `entry` against a host built around `runtime` and hand the
    /// runtime back together with the result.
    fn execute(&self, runtime: Runtime, entry: Entry<'_>) -> (Runtime, Result<(), VmError>);
}

/// Bounds of `len` bytes at `offset` in a memory of `size` bytes.
pub(crate) fn memory_range(offset: i32, len: i32, size: usize) -> Result<std::ops::Range<usize>, VmError> {
    if len < 0 {
        return Err(VmError::NegativeLength);
    }
    if offset < 0 {
        return Err(VmError::MemoryAccess);
    }
    let start = offset as usize;
    let end = start.checked_add(len as usize).ok_or(VmError::MemoryAccess)?;
    if end > size {
        return Err(VmError::MemoryAccess);
    }
    Ok(start..end)
}
