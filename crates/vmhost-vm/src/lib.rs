//! vmhost - smart-contract execution host.
//!
//! This crate provides:
//! - Handle tables for big integers, big floats and managed buffers
//! - Contract storage with time-locks and reserved keys
//! - The host function registry, with the legacy and current ABI generations
//! - Nested call composition (same context, destination context, by caller)
//! - Legacy async calls and promises with callbacks
//! - Contract deployment and upgrade
//! - Executors: fuel-metered wasmtime and native mock contracts

mod hooks;

pub mod abi;
pub mod async_call;
pub mod call_stack;
pub mod composition;
pub mod config;
pub mod error;
pub mod executor;
pub mod gas_metering;
pub mod host;
pub mod lifecycle;
pub mod managed_types;
pub mod output;
pub mod runtime;
pub mod storage;
pub mod telemetry;
pub mod world;

pub use abi::{registry, AbiGeneration, HostFunction, Registry, ValueType};
pub use async_call::AsyncCallRequest;
pub use call_stack::{CallContext, CallMode, CallPhase, CallStack, FrameStatus};
pub use composition::Composition;
pub use config::{AbiConfig, HostConfig};
pub use error::{HandleKind, VmError};
pub use executor::{
    set_sigsegv_passthrough, Executor, Host, MockContract, MockExecutor, MockMethod, WasmtimeExecutor,
};
pub use gas_metering::{GasSchedule, GasTracker};
pub use host::VmHost;
pub use lifecycle::Lifecycle;
pub use managed_types::{HandleTable, ManagedScopes, ManagedTypes};
pub use output::OutputContext;
pub use runtime::Runtime;
pub use storage::StorageStatus;
pub use world::{BlockInfo, BlockchainHook, World};

/// VM version constant
pub const VM_VERSION: u32 = 1;

/// Maximum depth of nested call contexts
pub const MAX_CALL_DEPTH: usize = 4096;

/// Maximum contract code size (1 MiB)
pub const MAX_CODE_SIZE: usize = 1024 * 1024;

/// Maximum linear memory per instance, in 64 KiB pages (16 MiB)
pub const MAX_MEMORY_PAGES: u32 = 256;

/// Storage keys starting with this prefix are reserved to the host.
pub const RESERVED_KEY_PREFIX: &[u8] = b"VMHOST";

/// Prefix of the keys holding storage time-locks.
pub const TIMELOCK_KEY_PREFIX: &[u8] = b"VMHOST_TIMELOCK";
