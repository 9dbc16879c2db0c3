//! Per-thread message slots read back through the two-call protocol.

use std::cell::RefCell;
use std::os::raw::{c_char, c_int};

use thiserror::Error;
use vmhost_vm::VmError;

#[derive(Debug, Error)]
pub enum CapiError {
    #[error("null pointer passed as {0}")]
    NullPointer(&'static str),

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("imports must come from module `env`, got `{0}`")]
    UnknownModule(String),

    #[error("unknown value tag {0}")]
    UnknownValueTag(u32),

    #[error("import functions return at most one value, got {0}")]
    TooManyReturns(usize),

    #[error(transparent)]
    Vm(#[from] VmError),
}

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = RefCell::new(None);
    static EXECUTION_INFO: RefCell<String> = RefCell::new(String::new());
}

pub fn update_last_error(error: impl ToString) {
    let message = error.to_string();
    tracing::debug!(%message, "recording last error");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

pub fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

pub fn last_error_length() -> c_int {
    LAST_ERROR.with(|slot| message_length(slot.borrow().as_deref()))
}

pub fn set_execution_info(info: impl Into<String>) {
    EXECUTION_INFO.with(|slot| *slot.borrow_mut() = info.into());
}

pub fn execution_info() -> String {
    EXECUTION_INFO.with(|slot| slot.borrow().clone())
}

/// Buffer size needed for `message`, trailing NUL included; 0 when empty.
pub(crate) fn message_length(message: Option<&str>) -> c_int {
    match message {
        Some(message) if !message.is_empty() => c_int::try_from(message.len() + 1).unwrap_or(c_int::MAX),
        _ => 0,
    }
}

/// Copy `message` and a trailing NUL into the caller's buffer.
///
/// Returns the number of bytes written, or -1 when the buffer is null or
/// too small.
///
/// # Safety
///
/// `buffer` must be null or valid for `length` bytes of writes.
pub(crate) unsafe fn copy_message(message: &str, buffer: *mut c_char, length: c_int) -> c_int {
    if buffer.is_null() {
        return -1;
    }
    let Ok(length) = usize::try_from(length) else {
        return -1;
    };
    if length <= message.len() {
        return -1;
    }
    let Ok(written) = c_int::try_from(message.len() + 1) else {
        return -1;
    };

    let target = std::slice::from_raw_parts_mut(buffer.cast::<u8>(), length);
    target[..message.len()].copy_from_slice(message.as_bytes());
    target[message.len()] = 0;
    written
}
