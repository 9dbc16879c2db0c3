//! Asynchronous calls: legacy fire-and-forget requests and promises.
//!
//! Everything runs inside the transaction. A legacy request waits until the
//! context that issued it has returned; a promise runs its destination right
//! away and then exactly one of its callbacks, after which the issuing code
//! continues.

use num_bigint::{BigInt, BigUint};

use vmhost_types::{Address, CallData, CallType, CodeMetadata};

use crate::call_stack::CallMode;
use crate::composition::{run_nested, NestedCall, NestedOutcome, INIT_FUNCTION, UPGRADE_ENTRY_FUNCTION};
use crate::error::VmError;
use crate::executor::Host;

/// Builtin function replacing the code of a contract.
pub const UPGRADE_FUNCTION: &str = "upgradeContract";

/// A call to run asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncCallRequest {
    pub destination: Address,
    pub value: BigUint,
    /// Call data in the `function@hexarg...` format
    pub data: Vec<u8>,
    /// Gas for the destination
    pub gas: u64,
    /// Gas set aside for the callback on top of the destination's leftover
    pub extra_gas: u64,
    pub success_callback: String,
    pub error_callback: String,
    /// Group of a grouped promise; informational only
    pub group_id: Option<Vec<u8>>,
}

impl AsyncCallRequest {
    pub fn new(destination: Address, value: BigUint, data: Vec<u8>) -> Self {
        Self {
            destination,
            value,
            data,
            gas: 0,
            extra_gas: 0,
            success_callback: String::new(),
            error_callback: String::new(),
            group_id: None,
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_extra_gas(mut self, extra_gas: u64) -> Self {
        self.extra_gas = extra_gas;
        self
    }

    pub fn with_callbacks(mut self, success: impl Into<String>, error: impl Into<String>) -> Self {
        self.success_callback = success.into();
        self.error_callback = error.into();
        self
    }

    pub fn with_group(mut self, group_id: Vec<u8>) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

/// Run the legacy async call registered by the current context, if any.
///
/// The request gets all the gas the context has left. Its outcome does not
/// affect the issuing context: a failure is rolled back and only reported in
/// traces, and its return data is dropped.
pub(crate) fn run_pending_legacy<H: Host + ?Sized>(host: &mut H) -> Result<(), VmError> {
    let rt = host.runtime();
    let Some(request) = rt.frame_mut().legacy_async.take() else {
        return Ok(());
    };
    let issuer = rt.frame().recipient;
    let gas = rt.gas().remaining();

    if !rt.has_code(&request.destination) {
        // Plain value transfer carrying the data.
        if rt.balance(&issuer) < BigInt::from(request.value.clone()) {
            tracing::debug!(destination = %request.destination, "legacy async transfer lacks funds");
            return Ok(());
        }
        rt.output_mut().transfer(
            &issuer,
            &request.destination,
            &request.value,
            &request.data,
            gas,
            CallType::AsynchronousCall,
        );
        return Ok(());
    }

    let call_data = match CallData::parse(&request.data) {
        Ok(call_data) => call_data,
        Err(err) => {
            tracing::debug!(destination = %request.destination, error = %err, "legacy async call has invalid data");
            return Ok(());
        }
    };

    let outcome = if call_data.function == UPGRADE_FUNCTION {
        run_builtin_upgrade(host, &request, call_data, gas)
    } else {
        let start = host.runtime().output().return_data().len();
        let call = NestedCall {
            mode: CallMode::AsyncCall,
            caller: issuer,
            recipient: request.destination,
            code_address: request.destination,
            value: request.value.clone(),
            function: call_data.function,
            arguments: call_data.arguments,
            gas_limit: gas,
            call_type: CallType::AsynchronousCall,
        };
        let outcome = run_nested(host, call);
        host.runtime().output_mut().take_return_data_from(start);
        outcome
    };

    host.runtime().gas().charge(outcome.gas_used)?;
    if let Err(err) = &outcome.result {
        tracing::debug!(destination = %request.destination, error = %err, "legacy async call failed");
    }
    Ok(())
}

/// Replace the code of `request.destination` and run its upgrade entry.
fn run_builtin_upgrade<H: Host + ?Sized>(
    host: &mut H,
    request: &AsyncCallRequest,
    call_data: CallData,
    gas: u64,
) -> NestedOutcome {
    let rt = host.runtime();
    let sender = rt.frame().recipient;
    let destination = request.destination;
    if rt.owner(&destination) != Some(sender) || !rt.code_metadata(&destination).upgradeable {
        return NestedOutcome::rejected(VmError::UpgradeNotAllowed);
    }

    let mut arguments = call_data.arguments.into_iter();
    let (Some(code), Some(metadata)) = (arguments.next(), arguments.next()) else {
        return NestedOutcome::rejected(VmError::InvalidArgument(
            "upgrade needs code and code metadata".to_string(),
        ));
    };
    let metadata = match CodeMetadata::from_bytes(&metadata) {
        Ok(metadata) => metadata,
        Err(err) => return NestedOutcome::rejected(VmError::InvalidCodeMetadata(err.to_string())),
    };
    if let Err(err) = host.check_code(&code) {
        return NestedOutcome::rejected(err);
    }
    let entry = match upgrade_entry(host, &code) {
        Ok(entry) => entry,
        Err(err) => return NestedOutcome::rejected(err),
    };

    let rt = host.runtime();
    rt.output_mut().push_snapshot();
    let account = rt.output_mut().account_mut(&destination);
    account.code = Some(code);
    account.code_metadata = Some(metadata);
    tracing::debug!(contract = %destination, entry = ?entry, "contract code replaced");

    let outcome = match entry {
        Some(function) => run_nested(
            host,
            NestedCall {
                mode: CallMode::Deploy,
                caller: sender,
                recipient: destination,
                code_address: destination,
                value: request.value.clone(),
                function: function.to_string(),
                arguments: arguments.collect(),
                gas_limit: gas,
                call_type: CallType::AsynchronousCall,
            },
        ),
        None => NestedOutcome {
            result: host.runtime().transfer_call_value(
                &sender,
                &destination,
                &request.value,
                gas,
                CallType::AsynchronousCall,
            ),
            gas_used: 0,
        },
    };

    let output = host.runtime().output_mut();
    if outcome.result.is_ok() {
        output.discard_snapshot();
    } else {
        output.restore_snapshot();
    }
    outcome
}

fn upgrade_entry<H: Host + ?Sized>(host: &H, code: &[u8]) -> Result<Option<&'static str>, VmError> {
    if host.has_function(code, UPGRADE_ENTRY_FUNCTION)? {
        return Ok(Some(UPGRADE_ENTRY_FUNCTION));
    }
    if host.has_function(code, INIT_FUNCTION)? {
        return Ok(Some(INIT_FUNCTION));
    }
    Ok(None)
}

/// Run a promise to completion.
///
/// Gas and extra gas are taken from the caller up front. The destination
/// runs in its own context; then the success callback receives its return
/// data, or the error callback receives `[return code, message]`. The
/// callback runs on the caller's account and handle scope with the extra gas
/// plus whatever the destination left.
pub(crate) fn run_promise<H: Host + ?Sized>(host: &mut H, request: AsyncCallRequest) -> Result<i32, VmError> {
    let rt = host.runtime();
    let cost = rt.schedule().async_call_step;
    rt.use_gas_with_bytes(cost, request.data.len())?;

    let reserved = request.gas.saturating_add(request.extra_gas);
    if rt.gas().remaining() < reserved {
        return Err(VmError::NotEnoughGas);
    }
    rt.gas().charge(reserved)?;

    let frame = rt.frame();
    let issuer = frame.recipient;
    let issuer_code = frame.code_address;
    tracing::debug!(
        destination = %request.destination,
        gas = request.gas,
        extra_gas = request.extra_gas,
        group = ?request.group_id.as_ref().map(hex::encode),
        "promise created"
    );

    let destination_outcome = match CallData::parse(&request.data) {
        Ok(call_data) => {
            let start = rt.output().return_data().len();
            let call = NestedCall {
                mode: CallMode::AsyncCall,
                caller: issuer,
                recipient: request.destination,
                code_address: request.destination,
                value: request.value.clone(),
                function: call_data.function,
                arguments: call_data.arguments,
                gas_limit: request.gas,
                call_type: CallType::AsynchronousCall,
            };
            let outcome = run_nested(host, call);
            let return_data = host.runtime().output_mut().take_return_data_from(start);
            (outcome, return_data)
        }
        Err(err) => (NestedOutcome::rejected(VmError::from(err)), Vec::new()),
    };
    let (outcome, return_data) = destination_outcome;

    let (callback, arguments) = match &outcome.result {
        Ok(()) => (request.success_callback.as_str(), return_data),
        Err(err) => (
            request.error_callback.as_str(),
            vec![err.return_code().to_bytes(), err.to_string().into_bytes()],
        ),
    };
    if callback.is_empty() {
        return Ok(0);
    }

    let leftover = request.gas.saturating_sub(outcome.gas_used);
    let call = NestedCall {
        mode: CallMode::Callback,
        caller: request.destination,
        recipient: issuer,
        code_address: issuer_code,
        value: BigUint::default(),
        function: callback.to_string(),
        arguments,
        gas_limit: request.extra_gas.saturating_add(leftover),
        call_type: CallType::AsynchronousCallBack,
    };
    let callback_outcome = run_nested(host, call);
    Ok(callback_outcome.status())
}
