use std::fmt;
use thiserror::Error;
use vmhost_types::{Address, ReturnCode};

/// Kind of value stored in a handle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    BigInt,
    BigFloat,
    ManagedBuffer,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::BigInt => write!(f, "big int"),
            HandleKind::BigFloat => write!(f, "big float"),
            HandleKind::ManagedBuffer => write!(f, "managed buffer"),
        }
    }
}

/// Errors that can occur during VM execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Out of gas: used {used}, limit {limit}")]
    OutOfGas { used: u64, limit: u64 },

    #[error("Argument index out of range: {index} (have {count})")]
    ArgumentIndexOutOfRange { index: i32, count: usize },

    #[error("No {kind} under handle {handle}")]
    InvalidHandle { kind: HandleKind, handle: i32 },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Max call depth exceeded: {depth}")]
    MaxCallDepthExceeded { depth: usize },

    #[error("Contract not found: {0}")]
    ContractNotFound(Address),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("{0}")]
    SignalledError(String),

    #[error("Wrong signature for exported function: {function}")]
    ArityMismatch { function: String },

    #[error("Invalid WASM module: {0}")]
    InvalidWasm(String),

    #[error("Unknown import: {module}.{name} with {arity} parameters")]
    UnknownImport { module: String, name: String, arity: usize },

    #[error("Code size exceeded: {size} > {limit}")]
    CodeSizeExceeded { size: usize, limit: usize },

    #[error("Invalid code metadata: {0}")]
    InvalidCodeMetadata(String),

    #[error("Memory access out of bounds")]
    MemoryAccess,

    #[error("Negative length")]
    NegativeLength,

    #[error("Cannot write to storage under reserved key")]
    StoreReservedKey,

    #[error("It is not allowed to call init in a smart contract call")]
    InitFuncCalledInRun,

    #[error("It is not allowed to call callBack directly")]
    CallBackFuncCalledInRun,

    #[error("Upgrade not allowed")]
    UpgradeNotAllowed,

    #[error("Calling built-in functions on the same context is disallowed")]
    BuiltinCallOnSameContextDisallowed,

    #[error("Only one legacy async call allowed")]
    OnlyOneLegacyAsyncCallAllowed,

    #[error("Not enough gas")]
    NotEnoughGas,

    #[error("Infinity float operation")]
    InfinityFloatOperation,

    #[error("Bitwise operations only allowed on positive integers")]
    BitwiseNegative,

    #[error("Shift operations only allowed on positive integers and by a positive amount")]
    ShiftNegative,

    #[error("Insufficient funds for transfer")]
    TransferInsufficientFunds,

    #[error("Sending value to non payable contract")]
    AccountNotPayable,

    #[error("Account collision: {0}")]
    AccountCollision(Address),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raised by the legacy async call to end the caller's execution early.
    /// Treated as a successful exit.
    #[error("Execution interrupted by legacy async call")]
    AsyncCallBreakpoint,

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl VmError {
    /// Return code reported for a context that failed with this error.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            VmError::OutOfGas { .. } => ReturnCode::OutOfGas,
            VmError::FunctionNotFound(_)
            | VmError::InitFuncCalledInRun
            | VmError::CallBackFuncCalledInRun => ReturnCode::FunctionNotFound,
            VmError::ArityMismatch { .. } => ReturnCode::FunctionWrongSignature,
            VmError::ContractNotFound(_) => ReturnCode::ContractNotFound,
            VmError::SignalledError(_) => ReturnCode::UserError,
            VmError::MaxCallDepthExceeded { .. } => ReturnCode::CallStackOverFlow,
            VmError::InvalidWasm(_)
            | VmError::UnknownImport { .. }
            | VmError::CodeSizeExceeded { .. }
            | VmError::InvalidCodeMetadata(_) => ReturnCode::ContractInvalid,
            VmError::TransferInsufficientFunds => ReturnCode::OutOfFunds,
            VmError::AccountCollision(_) => ReturnCode::AccountCollision,
            VmError::UpgradeNotAllowed => ReturnCode::UpgradeFailed,
            VmError::AsyncCallBreakpoint => ReturnCode::Ok,
            _ => ReturnCode::ExecutionFailed,
        }
    }

    /// Faults of a host API call that unsafe mode may swallow.
    pub fn is_api_fault(&self) -> bool {
        matches!(
            self,
            VmError::ArgumentIndexOutOfRange { .. }
                | VmError::InvalidHandle { .. }
                | VmError::DivisionByZero
                | VmError::MemoryAccess
                | VmError::NegativeLength
                | VmError::StoreReservedKey
                | VmError::InfinityFloatOperation
                | VmError::BitwiseNegative
                | VmError::ShiftNegative
                | VmError::InvalidArgument(_)
        )
    }
}

impl From<wasmtime::Error> for VmError {
    fn from(e: wasmtime::Error) -> Self {
        if let Some(err) = e.downcast_ref::<VmError>() {
            return err.clone();
        }
        match e.downcast_ref::<wasmtime::Trap>() {
            Some(wasmtime::Trap::OutOfFuel) => VmError::OutOfGas { used: 0, limit: 0 },
            Some(trap) => VmError::ExecutionFailed(trap.to_string()),
            None => VmError::ExecutionFailed(e.to_string()),
        }
    }
}

impl From<vmhost_types::TypesError> for VmError {
    fn from(e: vmhost_types::TypesError) -> Self {
        VmError::InvalidArgument(e.to_string())
    }
}
