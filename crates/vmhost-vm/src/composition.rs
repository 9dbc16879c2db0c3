//! Nested contract calls.
//!
//! Every nested execution goes through [`run_nested`]: it checks the entry
//! point, opens a call context (and a handle scope when the mode asks for
//! one), transfers the call value, runs the code and merges or discards the
//! effects. The public operations wrap it with the gas accounting of the
//! calling context.

use num_bigint::BigUint;

use vmhost_types::{Address, CallType};

use crate::async_call::{self, AsyncCallRequest};
use crate::call_stack::{CallContext, CallMode, CallPhase, FrameStatus};
use crate::error::VmError;
use crate::executor::Host;
use crate::gas_metering::GasTracker;

/// Constructor, callable only while deploying.
pub const INIT_FUNCTION: &str = "init";
/// Called on upgrade when exported; `init` otherwise.
pub const UPGRADE_ENTRY_FUNCTION: &str = "upgrade";
/// Reserved name of legacy callbacks.
pub const CALLBACK_FUNCTION: &str = "callBack";

/// Description of one nested execution.
#[derive(Debug, Clone)]
pub(crate) struct NestedCall {
    pub mode: CallMode,
    pub caller: Address,
    pub recipient: Address,
    pub code_address: Address,
    pub value: BigUint,
    pub function: String,
    pub arguments: Vec<Vec<u8>>,
    pub gas_limit: u64,
    pub call_type: CallType,
}

/// Result of a nested execution, as seen by the context that issued it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NestedOutcome {
    pub result: Result<(), VmError>,
    pub gas_used: u64,
}

impl NestedOutcome {
    /// Failure detected before any code ran; nothing is charged.
    pub fn rejected(err: VmError) -> Self {
        Self {
            result: Err(err),
            gas_used: 0,
        }
    }

    pub fn status(&self) -> i32 {
        if self.result.is_ok() {
            0
        } else {
            1
        }
    }
}

fn validate_entry(mode: CallMode, function: &str) -> Result<(), VmError> {
    if function == INIT_FUNCTION && mode != CallMode::Deploy {
        return Err(VmError::InitFuncCalledInRun);
    }
    if function == CALLBACK_FUNCTION && mode != CallMode::Callback {
        return Err(VmError::CallBackFuncCalledInRun);
    }
    Ok(())
}

/// Run `function` of `code` in the current context, then the legacy async
/// call it may have issued.
pub(crate) fn execute_frame<H: Host + ?Sized>(host: &mut H, code: &[u8], function: &str) -> Result<(), VmError> {
    match host.run_instance(code, function) {
        Ok(()) | Err(VmError::AsyncCallBreakpoint) => {}
        Err(err) => return Err(err),
    }
    async_call::run_pending_legacy(host)
}

/// Execute a nested call. The issuing context is not charged here; callers
/// charge `gas_used` themselves.
pub(crate) fn run_nested<H: Host + ?Sized>(host: &mut H, call: NestedCall) -> NestedOutcome {
    tracing::debug!(
        mode = %call.mode,
        destination = %call.recipient,
        function = %call.function,
        gas = call.gas_limit,
        phase = %CallPhase::Requested,
        "nested call"
    );

    if let Err(err) = validate_entry(call.mode, &call.function) {
        return NestedOutcome::rejected(err);
    }

    let rt = host.runtime();
    let Some(code) = rt.contract_code(&call.code_address) else {
        return NestedOutcome::rejected(VmError::ContractNotFound(call.code_address));
    };

    let sender = rt.frame().recipient;
    let schedule = *rt.schedule();
    let shares_scope = call.mode.shares_scope();
    let rolls_back = call.mode.rolls_back();
    let scope = if shares_scope {
        rt.frame().scope
    } else {
        rt.scopes_mut().push()
    };

    let frame = CallContext::new(
        call.caller,
        call.recipient,
        call.function.clone(),
        GasTracker::new(call.gas_limit, schedule),
        call.mode,
    )
    .with_code_address(call.code_address)
    .with_value(call.value.clone())
    .with_arguments(call.arguments)
    .with_call_type(call.call_type)
    .with_scope(scope);

    if let Err(err) = rt.stack_mut().push(frame) {
        if !shares_scope {
            rt.scopes_mut().pop();
        }
        tracing::debug!(error = %err, "nested call rejected");
        return NestedOutcome::rejected(err);
    }
    if rolls_back {
        rt.output_mut().push_snapshot();
    }
    tracing::debug!(depth = rt.stack().depth(), phase = %CallPhase::GasReserved, "nested call");

    let result = rt
        .transfer_call_value(&sender, &call.recipient, &call.value, call.gas_limit, call.call_type)
        .and_then(|()| {
            tracing::debug!(phase = %CallPhase::Running, "nested call");
            execute_frame(host, &code, &call.function)
        });

    let rt = host.runtime();
    let Some(mut frame) = rt.stack_mut().pop() else {
        return NestedOutcome::rejected(VmError::ExecutionFailed("call stack underflow".to_string()));
    };
    frame.status = FrameStatus::from_result(&result);
    if !shares_scope {
        rt.scopes_mut().pop();
    }

    match &result {
        Ok(()) => {
            if rolls_back {
                rt.output_mut().discard_snapshot();
            }
            rt.gas().refund(frame.gas.refunded());
            tracing::debug!(
                function = %frame.function,
                gas_used = frame.gas.used(),
                phase = %CallPhase::Merged,
                "nested call"
            );
        }
        Err(err) => {
            if rolls_back {
                rt.output_mut().restore_snapshot();
            }
            tracing::debug!(
                function = %frame.function,
                status = ?frame.status,
                error = %err,
                phase = %CallPhase::Discarded,
                "nested call"
            );
        }
    }

    NestedOutcome {
        result,
        gas_used: frame.gas.used(),
    }
}

/// Functions handled by the host instead of contract code.
pub fn is_builtin_function(function: &str) -> bool {
    function == async_call::UPGRADE_FUNCTION
}

/// Synchronous and asynchronous calls to other contracts.
///
/// Each operation returns 0 when the nested execution succeeded and 1 when
/// it failed; `Err` is reserved for faults of the calling context itself,
/// such as running out of gas while paying for the call.
pub trait Composition: Host {
    /// Run the destination's code against the caller's account and handle
    /// scope. Effects are not rolled back on failure.
    fn execute_on_same_context(
        &mut self,
        gas: u64,
        destination: &Address,
        value: &BigUint,
        function: &str,
        arguments: Vec<Vec<u8>>,
    ) -> Result<i32, VmError> {
        let rt = self.runtime();
        let cost = rt.schedule().execute_on_same_context;
        rt.use_gas(cost)?;
        if is_builtin_function(function) {
            tracing::debug!(function, "{}", VmError::BuiltinCallOnSameContextDisallowed);
            return Ok(1);
        }

        let recipient = rt.frame().recipient;
        let call = NestedCall {
            mode: CallMode::SameContext,
            caller: recipient,
            recipient,
            code_address: *destination,
            value: value.clone(),
            function: function.to_string(),
            arguments,
            gas_limit: gas.min(rt.gas().remaining()),
            call_type: CallType::DirectCall,
        };
        let outcome = run_nested(self, call);
        self.runtime().gas().charge(outcome.gas_used)?;
        Ok(outcome.status())
    }

    /// Run the destination's code against its own account in a fresh
    /// handle scope. A failure rolls back everything the call did.
    fn execute_on_dest_context(
        &mut self,
        gas: u64,
        destination: &Address,
        value: &BigUint,
        function: &str,
        arguments: Vec<Vec<u8>>,
    ) -> Result<i32, VmError> {
        let caller = self.runtime().frame().recipient;
        dest_context_call(self, CallMode::DestContext, caller, gas, destination, value, function, arguments)
    }

    /// Like [`execute_on_dest_context`](Composition::execute_on_dest_context),
    /// but the callee sees the current caller as its caller.
    fn execute_on_dest_context_by_caller(
        &mut self,
        gas: u64,
        destination: &Address,
        value: &BigUint,
        function: &str,
        arguments: Vec<Vec<u8>>,
    ) -> Result<i32, VmError> {
        let caller = self.runtime().frame().caller;
        dest_context_call(
            self,
            CallMode::DestContextByCaller,
            caller,
            gas,
            destination,
            value,
            function,
            arguments,
        )
    }

    /// Issue the legacy async call of this context and stop executing it.
    ///
    /// Always returns an error: `AsyncCallBreakpoint` ends the context
    /// successfully and the request runs once the context has returned, with
    /// whatever gas is left.
    fn async_call(&mut self, destination: &Address, value: &BigUint, data: &[u8]) -> Result<(), VmError> {
        let rt = self.runtime();
        let cost = rt.schedule().async_call_step;
        rt.use_gas_with_bytes(cost, data.len())?;
        if rt.frame().legacy_async.is_some() {
            return Err(VmError::OnlyOneLegacyAsyncCallAllowed);
        }

        let gas = rt.gas().remaining();
        let request = AsyncCallRequest::new(*destination, value.clone(), data.to_vec()).with_gas(gas);
        tracing::debug!(destination = %destination, gas, "legacy async call registered");
        rt.frame_mut().legacy_async = Some(request);
        Err(VmError::AsyncCallBreakpoint)
    }

    /// Run a promise: the destination executes now, followed by exactly one
    /// of its callbacks. Returns 0 when the callback (if any) succeeded.
    fn create_async_call(&mut self, request: AsyncCallRequest) -> Result<i32, VmError> {
        async_call::run_promise(self, request)
    }
}

impl<H: Host + ?Sized> Composition for H {}

#[allow(clippy::too_many_arguments)]
fn dest_context_call<H: Host + ?Sized>(
    host: &mut H,
    mode: CallMode,
    caller: Address,
    gas: u64,
    destination: &Address,
    value: &BigUint,
    function: &str,
    arguments: Vec<Vec<u8>>,
) -> Result<i32, VmError> {
    let rt = host.runtime();
    let cost = rt.schedule().execute_on_dest_context;
    rt.use_gas(cost)?;

    let call = NestedCall {
        mode,
        caller,
        recipient: *destination,
        code_address: *destination,
        value: value.clone(),
        function: function.to_string(),
        arguments,
        gas_limit: gas.min(rt.gas().remaining()),
        call_type: CallType::DirectCall,
    };
    let outcome = run_nested(host, call);
    host.runtime().gas().charge(outcome.gas_used)?;
    Ok(outcome.status())
}
