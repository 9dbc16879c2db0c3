//! Host API operations on managed values.
//!
//! Each submodule adds methods to [`Runtime`](crate::runtime::Runtime). They
//! charge gas, validate handles and report faults as `VmError`; moving bytes
//! in and out of WASM memory is left to the ABI layer.

pub mod big_float;
pub mod big_int;
pub mod crypto;
pub mod managed_buffer;
pub mod small_int;

pub use big_float::{decode_float, encode_float};
