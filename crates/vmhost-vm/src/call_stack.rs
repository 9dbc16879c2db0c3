//! Call contexts and the call stack.
//!
//! Every running piece of contract code has a [`CallContext`]. Nested
//! calls push a new context and pop it when they exit, so the stack depth
//! is the nesting depth of the transaction.

use num_bigint::BigUint;
use std::fmt;
use std::mem;

use vmhost_types::{Address, CallType};

use crate::async_call::AsyncCallRequest;
use crate::error::VmError;
use crate::gas_metering::GasTracker;
use crate::MAX_CALL_DEPTH;

/// How a context was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Top-level transaction
    Direct,
    /// `executeOnSameContext`
    SameContext,
    /// `executeOnDestContext`
    DestContext,
    /// `executeOnDestContextByCaller`
    DestContextByCaller,
    /// Destination of an async call
    AsyncCall,
    /// Callback of a promise, runs on the caller's account
    Callback,
    /// `init` or `upgrade` of a freshly deployed code
    Deploy,
}

impl CallMode {
    /// Whether the context reuses its parent's handle scope.
    pub fn shares_scope(&self) -> bool {
        matches!(self, CallMode::SameContext | CallMode::Callback)
    }

    /// Whether a failure of the context undoes its effects.
    pub fn rolls_back(&self) -> bool {
        !self.shares_scope()
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallMode::Direct => "direct",
            CallMode::SameContext => "same-context",
            CallMode::DestContext => "dest-context",
            CallMode::DestContextByCaller => "dest-context-by-caller",
            CallMode::AsyncCall => "async-call",
            CallMode::Callback => "callback",
            CallMode::Deploy => "deploy",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStatus {
    #[default]
    Active,
    Succeeded,
    Failed,
    OutOfGas,
}

impl FrameStatus {
    pub fn from_result(result: &Result<(), VmError>) -> Self {
        match result {
            Ok(()) => FrameStatus::Succeeded,
            Err(VmError::OutOfGas { .. }) => FrameStatus::OutOfGas,
            Err(_) => FrameStatus::Failed,
        }
    }
}

/// Steps a nested call goes through, reported in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Requested,
    GasReserved,
    Running,
    Merged,
    Discarded,
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallPhase::Requested => "requested",
            CallPhase::GasReserved => "gas-reserved",
            CallPhase::Running => "running",
            CallPhase::Merged => "merged",
            CallPhase::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// State of one executing piece of contract code.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Address reported by `getCaller`
    pub caller: Address,
    /// Account whose storage and balance the code works on
    pub recipient: Address,
    /// Account the executing code was loaded from
    pub code_address: Address,
    pub call_value: BigUint,
    pub function: String,
    pub arguments: Vec<Vec<u8>>,
    pub gas: GasTracker,
    pub call_type: CallType,
    pub mode: CallMode,
    /// Index of the handle scope in use
    pub scope: usize,
    pub unsafe_mode: bool,
    /// Legacy async call issued by this context, run once it returns
    pub legacy_async: Option<AsyncCallRequest>,
    pub status: FrameStatus,
}

impl CallContext {
    pub fn new(
        caller: Address,
        recipient: Address,
        function: impl Into<String>,
        gas: GasTracker,
        mode: CallMode,
    ) -> Self {
        Self {
            caller,
            recipient,
            code_address: recipient,
            call_value: BigUint::default(),
            function: function.into(),
            arguments: Vec::new(),
            gas,
            call_type: CallType::DirectCall,
            mode,
            scope: 0,
            unsafe_mode: false,
            legacy_async: None,
            status: FrameStatus::Active,
        }
    }

    pub fn with_code_address(mut self, code_address: Address) -> Self {
        self.code_address = code_address;
        self
    }

    pub fn with_value(mut self, value: BigUint) -> Self {
        self.call_value = value;
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Vec<u8>>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn with_scope(mut self, scope: usize) -> Self {
        self.scope = scope;
        self
    }
}

/// Stack of call contexts. Never empty: the top-level context is always
/// present.
#[derive(Debug, Clone)]
pub struct CallStack {
    current: CallContext,
    parents: Vec<CallContext>,
    max_depth: usize,
}

impl CallStack {
    /// Create a stack holding the top-level context.
    pub fn new(root: CallContext) -> Self {
        Self::with_max_depth(root, MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(root: CallContext, max_depth: usize) -> Self {
        Self {
            current: root,
            parents: Vec::new(),
            max_depth,
        }
    }

    /// Enter a nested context.
    ///
    /// # Errors
    /// Returns `MaxCallDepthExceeded` when the stack is already at the
    /// maximum depth; the stack is left unchanged.
    pub fn push(&mut self, frame: CallContext) -> Result<usize, VmError> {
        let depth = self.depth() + 1;
        if depth > self.max_depth {
            return Err(VmError::MaxCallDepthExceeded { depth });
        }

        let parent = mem::replace(&mut self.current, frame);
        self.parents.push(parent);
        Ok(depth)
    }

    /// Leave the current context, returning it. The top-level context
    /// cannot be popped.
    pub fn pop(&mut self) -> Option<CallContext> {
        let parent = self.parents.pop()?;
        Some(mem::replace(&mut self.current, parent))
    }

    /// Nesting depth; 0 for the top-level context.
    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn current(&self) -> &CallContext {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut CallContext {
        &mut self.current
    }

    /// Context that issued the current one.
    pub fn parent(&self) -> Option<&CallContext> {
        self.parents.last()
    }

    pub fn root(&self) -> &CallContext {
        self.parents.first().unwrap_or(&self.current)
    }

    /// Consume the stack, returning the top-level context.
    pub fn into_root(mut self) -> CallContext {
        while self.pop().is_some() {}
        self.current
    }
}
