//! Transaction entry points.
//!
//! [`VmHost`] is the long-lived object an embedder keeps: it owns the
//! configuration, the executor and the view of the chain. Every transaction
//! gets a fresh [`Runtime`] and runs on a dedicated thread whose stack is
//! large enough for deep same-context recursion.

use std::any::Any;
use std::panic;
use std::sync::Arc;
use std::thread;

use num_traits::Zero;

use vmhost_types::{Address, CallType, ContractCallInput, ContractCreateInput, VmOutput};

use crate::call_stack::{CallContext, CallMode};
use crate::composition::{execute_frame, CALLBACK_FUNCTION, INIT_FUNCTION};
use crate::config::HostConfig;
use crate::error::VmError;
use crate::executor::{sigsegv_passthrough, Executor, Host};
use crate::gas_metering::GasTracker;
use crate::lifecycle::install_contract;
use crate::runtime::Runtime;
use crate::world::BlockchainHook;

/// Name of the threads transactions run on.
const EXECUTION_THREAD_NAME: &str = "vmhost-exec";

/// Smart-contract execution host.
pub struct VmHost {
    config: Arc<HostConfig>,
    executor: Arc<dyn Executor>,
    world: Arc<dyn BlockchainHook>,
}

impl VmHost {
    pub fn new(config: HostConfig, executor: Arc<dyn Executor>, world: Arc<dyn BlockchainHook>) -> Self {
        tracing::info!(
            max_call_depth = config.max_call_depth,
            legacy_abi = config.abi.legacy,
            current_abi = config.abi.current,
            "execution host created"
        );
        Self {
            config: Arc::new(config),
            executor,
            world,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn world(&self) -> &Arc<dyn BlockchainHook> {
        &self.world
    }

    /// Execute `input.function` of the contract at `input.recipient`.
    pub fn run_smart_contract_call(&self, input: &ContractCallInput) -> VmOutput {
        self.on_execution_thread(|| self.call(input))
    }

    /// Deploy `input.code` and run its constructor when it has one.
    pub fn run_smart_contract_create(&self, input: &ContractCreateInput) -> VmOutput {
        self.on_execution_thread(|| self.create(input))
    }

    fn runtime(&self, root: CallContext) -> Runtime {
        Runtime::new(self.config.clone(), self.world.clone(), root)
    }

    fn call(&self, input: &ContractCallInput) -> VmOutput {
        tracing::debug!(
            caller = %input.caller,
            contract = %input.recipient,
            function = %input.function,
            gas = input.gas_provided,
            "contract call"
        );
        let root = CallContext::new(
            input.caller,
            input.recipient,
            input.function.clone(),
            GasTracker::new(input.gas_provided, self.config.gas_schedule),
            CallMode::Direct,
        )
        .with_value(input.call_value.clone())
        .with_arguments(input.arguments.clone())
        .with_call_type(input.call_type);
        let mut runtime = self.runtime(root);

        let code = match prepare_call(&mut runtime, input) {
            Ok(code) => code,
            Err(err) => return runtime.into_output(Err(err)),
        };

        let function = input.function.as_str();
        let mut entry = |host: &mut dyn Host| execute_frame(host, &code, function);
        let (runtime, result) = self.executor.execute(runtime, &mut entry);
        runtime.into_output(result)
    }

    fn create(&self, input: &ContractCreateInput) -> VmOutput {
        let address = Address::new_contract_address(&input.caller, self.world.nonce(&input.caller));
        tracing::debug!(
            creator = %input.caller,
            contract = %address,
            code_len = input.code.len(),
            gas = input.gas_provided,
            "contract deployment"
        );
        let root = CallContext::new(
            input.caller,
            address,
            INIT_FUNCTION,
            GasTracker::new(input.gas_provided, self.config.gas_schedule),
            CallMode::Deploy,
        )
        .with_value(input.call_value.clone())
        .with_arguments(input.arguments.clone());
        let mut runtime = self.runtime(root);

        let has_init = match self.prepare_create(&mut runtime, input, &address) {
            Ok(has_init) => has_init,
            Err(err) => return runtime.into_output(Err(err)),
        };
        if !has_init {
            return runtime.into_output(Ok(()));
        }

        let code = input.code.as_slice();
        let mut entry = |host: &mut dyn Host| execute_frame(host, code, INIT_FUNCTION);
        let (runtime, result) = self.executor.execute(runtime, &mut entry);
        runtime.into_output(result)
    }

    /// Charge for and install the new contract. Returns whether it has a
    /// constructor to run.
    fn prepare_create(&self, runtime: &mut Runtime, input: &ContractCreateInput, address: &Address) -> Result<bool, VmError> {
        let schedule = *runtime.schedule();
        runtime
            .gas()
            .charge_with_bytes(schedule.create_contract, schedule.compile_per_byte, input.code.len())?;
        self.executor.check_code(&input.code)?;
        if runtime.has_code(address) {
            return Err(VmError::AccountCollision(*address));
        }
        let has_init = self.executor.has_function(&input.code, INIT_FUNCTION)?;

        install_contract(runtime, &input.caller, address, input.code.clone(), input.code_metadata);
        let gas = runtime.gas().remaining();
        runtime.transfer_call_value(&input.caller, address, &input.call_value, gas, CallType::DirectCall)?;
        Ok(has_init)
    }

    /// Run `job` on a thread with the configured stack. Panics become failed
    /// transactions unless SIGSEGV passthrough is enabled.
    fn on_execution_thread<F>(&self, job: F) -> VmOutput
    where
        F: FnOnce() -> VmOutput + Send,
    {
        let joined = thread::scope(|scope| {
            thread::Builder::new()
                .name(EXECUTION_THREAD_NAME.to_string())
                .stack_size(self.config.execution_stack_bytes)
                .spawn_scoped(scope, job)
                .map(|handle| handle.join())
        });

        match joined {
            Ok(Ok(output)) => output,
            Ok(Err(payload)) => {
                if sigsegv_passthrough() {
                    panic::resume_unwind(payload);
                }
                let message = panic_message(payload.as_ref());
                tracing::error!(%message, "execution panicked");
                VmOutput::failure(
                    VmError::ExecutionFailed(String::new()).return_code(),
                    format!("execution panicked: {}", message),
                )
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn execution thread");
                VmOutput::failure(
                    VmError::ExecutionFailed(String::new()).return_code(),
                    format!("Failed to spawn execution thread: {}", e),
                )
            }
        }
    }
}

/// Checks before a top-level call runs. Returns the code to execute.
fn prepare_call(runtime: &mut Runtime, input: &ContractCallInput) -> Result<Vec<u8>, VmError> {
    if input.function == INIT_FUNCTION {
        return Err(VmError::InitFuncCalledInRun);
    }
    if input.function == CALLBACK_FUNCTION {
        return Err(VmError::CallBackFuncCalledInRun);
    }
    let code = runtime
        .contract_code(&input.recipient)
        .ok_or(VmError::ContractNotFound(input.recipient))?;

    if !input.call_value.is_zero() {
        let metadata = runtime.code_metadata(&input.recipient);
        let payable = if runtime.has_code(&input.caller) {
            metadata.payable_by_sc
        } else {
            metadata.payable
        };
        if !payable {
            return Err(VmError::AccountNotPayable);
        }
    }
    runtime.transfer_call_value(
        &input.caller,
        &input.recipient,
        &input.call_value,
        input.gas_provided,
        input.call_type,
    )?;
    Ok(code)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{MockContract, MockExecutor};
    use crate::world::World;
    use num_bigint::BigInt;
    use vmhost_types::{Account, CodeMetadata, ReturnCode};

    const CODE: &[u8] = b"adder";

    fn owner() -> Address {
        Address::user_from_name("owner")
    }

    fn adder() -> Address {
        Address::contract_from_name("adder")
    }

    fn executor() -> MockExecutor {
        MockExecutor::new().with_contract(
            CODE,
            MockContract::new()
                .with_method("init", |host| host.runtime().finish(b"ready".to_vec()))
                .with_method("add", |host| {
                    let rt = host.runtime();
                    let a = rt.int64_argument(0)?;
                    let b = rt.int64_argument(1)?;
                    rt.int64_finish(a + b)
                })
                .with_method("explode", |_| panic!("contract bug")),
        )
    }

    fn vm_host(world: World) -> VmHost {
        VmHost::new(HostConfig::default(), Arc::new(executor()), Arc::new(world))
    }

    fn world() -> World {
        World::new()
            .with_account(owner(), Account::new_user(1_000u32))
            .with_account(adder(), Account::new_contract(CODE.to_vec(), owner()))
    }

    #[test]
    fn test_call_returns_data() {
        let host = vm_host(world());
        let input = ContractCallInput::new(owner(), adder(), "add", 100_000)
            .with_argument(2i64.to_be_bytes())
            .with_argument(40i64.to_be_bytes());
        let output = host.run_smart_contract_call(&input);

        assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
        assert_eq!(output.return_data, vec![vec![42u8]]);
        assert!(output.gas_remaining < 100_000);
    }

    #[test]
    fn test_reserved_entry_points_are_rejected() {
        let host = vm_host(world());
        for function in ["init", "callBack"] {
            let output = host.run_smart_contract_call(&ContractCallInput::new(owner(), adder(), function, 10_000));
            assert!(!output.is_ok());
            assert_eq!(output.gas_remaining, 0);
        }
    }

    #[test]
    fn test_call_to_missing_contract() {
        let host = vm_host(world());
        let missing = Address::contract_from_name("missing");
        let output = host.run_smart_contract_call(&ContractCallInput::new(owner(), missing, "add", 10_000));
        assert_eq!(output.return_code, ReturnCode::ContractNotFound);
    }

    #[test]
    fn test_value_to_non_payable_contract() {
        let host = vm_host(world());
        let input = ContractCallInput::new(owner(), adder(), "add", 10_000).with_value(5u32);
        let output = host.run_smart_contract_call(&input);
        assert!(!output.is_ok());
        assert_eq!(output.return_message, VmError::AccountNotPayable.to_string());
    }

    #[test]
    fn test_panic_becomes_failure() {
        let host = vm_host(world());
        let output = host.run_smart_contract_call(&ContractCallInput::new(owner(), adder(), "explode", 10_000));
        assert_eq!(output.return_code, VmError::ExecutionFailed(String::new()).return_code());
        assert!(output.return_message.contains("contract bug"));
    }

    #[test]
    fn test_create_runs_init() {
        let host = vm_host(world());
        let input = ContractCreateInput::new(owner(), CODE.to_vec(), 1_000_000)
            .with_code_metadata(CodeMetadata::upgradeable())
            .with_value(10u32);
        let output = host.run_smart_contract_create(&input);

        assert!(output.is_ok(), "{}", output.return_message);
        assert_eq!(output.return_data, vec![b"ready".to_vec()]);
        let address = Address::new_contract_address(&owner(), 0);
        let account = output.account(&address).unwrap();
        assert_eq!(account.code.as_deref(), Some(CODE));
        assert_eq!(account.balance_delta, BigInt::from(10));
        assert_eq!(output.account(&owner()).unwrap().nonce, Some(1));
    }

    #[test]
    fn test_create_detects_collision() {
        let address = Address::new_contract_address(&owner(), 0);
        let world = world().with_account(address, Account::new_contract(CODE.to_vec(), owner()));
        let host = vm_host(world);
        let output = host.run_smart_contract_create(&ContractCreateInput::new(owner(), CODE.to_vec(), 1_000_000));
        assert!(!output.is_ok());
        assert_eq!(output.return_message, VmError::AccountCollision(address).to_string());
    }

    #[test]
    fn test_create_rejects_unknown_code() {
        let host = vm_host(world());
        let output = host.run_smart_contract_create(&ContractCreateInput::new(owner(), b"junk".to_vec(), 1_000_000));
        assert!(!output.is_ok());
        assert!(output.output_accounts.is_empty());
    }
}
