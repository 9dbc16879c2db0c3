//! Per-transaction execution state.
//!
//! A [`Runtime`] is created for every transaction and owned by the
//! executor while the transaction runs. It holds the call stack, the handle
//! scopes and the pending output, and implements the host API on top of
//! them. The ABI layer only moves bytes between WASM memory and these
//! methods; native contracts call them directly.

use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, Zero};
use std::sync::Arc;

use vmhost_types::{Address, CallType, CodeMetadata, LogEntry, ReturnCode, VmOutput};

use crate::call_stack::{CallContext, CallMode, CallStack};
use crate::config::HostConfig;
use crate::error::VmError;
use crate::gas_metering::{GasSchedule, GasTracker};
use crate::managed_types::{ManagedScopes, ManagedTypes};
use crate::output::OutputContext;
use crate::world::{BlockInfo, BlockchainHook};

/// Identifier of the log entry carrying the message of a failed execution.
pub const INTERNAL_ERRORS_IDENTIFIER: &[u8] = b"internalVMErrors";

/// Width of balances and call values written to contract memory.
pub const BALANCE_LEN: usize = 32;

/// Mutable state of one transaction.
pub struct Runtime {
    config: Arc<HostConfig>,
    world: Arc<dyn BlockchainHook>,
    block: BlockInfo,
    stack: CallStack,
    scopes: ManagedScopes,
    output: OutputContext,
    random_counter: u64,
}

impl Runtime {
    /// Create the state of a transaction whose top-level context is `root`.
    pub fn new(config: Arc<HostConfig>, world: Arc<dyn BlockchainHook>, root: CallContext) -> Self {
        let block = world.current_block();
        let mut scopes = ManagedScopes::new();
        let scope = scopes.push();
        let stack = CallStack::with_max_depth(root.with_scope(scope), config.max_call_depth);

        Self {
            config,
            world,
            block,
            stack,
            scopes,
            output: OutputContext::new(),
            random_counter: 0,
        }
    }

    /// Empty state left in place while this one is lent to a nested
    /// instance. It shares the configuration and world but no call state.
    pub(crate) fn vacant(&self) -> Self {
        let gas = GasTracker::new(0, self.config.gas_schedule);
        let root = CallContext::new(Address::default(), Address::default(), "", gas, CallMode::Direct);
        Self {
            config: Arc::clone(&self.config),
            world: Arc::clone(&self.world),
            block: BlockInfo::default(),
            stack: CallStack::with_max_depth(root, 0),
            scopes: ManagedScopes::default(),
            output: OutputContext::new(),
            random_counter: 0,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn schedule(&self) -> &GasSchedule {
        &self.config.gas_schedule
    }

    pub fn world(&self) -> &dyn BlockchainHook {
        self.world.as_ref()
    }

    pub fn block(&self) -> &BlockInfo {
        &self.block
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut CallStack {
        &mut self.stack
    }

    /// Context of the code currently executing.
    pub fn frame(&self) -> &CallContext {
        self.stack.current()
    }

    pub fn frame_mut(&mut self) -> &mut CallContext {
        self.stack.current_mut()
    }

    pub fn gas(&mut self) -> &mut GasTracker {
        &mut self.stack.current_mut().gas
    }

    pub fn output(&self) -> &OutputContext {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputContext {
        &mut self.output
    }

    pub fn scopes_mut(&mut self) -> &mut ManagedScopes {
        &mut self.scopes
    }

    /// Handle tables of the current context.
    pub fn managed(&mut self) -> Result<&mut ManagedTypes, VmError> {
        let scope = self.stack.current().scope;
        self.scopes
            .get_mut(scope)
            .ok_or_else(|| VmError::ExecutionFailed(format!("handle scope {} is gone", scope)))
    }

    /// Charge the current context.
    pub fn use_gas(&mut self, amount: u64) -> Result<(), VmError> {
        self.gas().charge(amount)
    }

    /// Charge a base cost plus the data copy cost of `len` bytes.
    pub fn use_gas_with_bytes(&mut self, base: u64, len: usize) -> Result<(), VmError> {
        let per_byte = self.schedule().data_copy_per_byte;
        self.gas().charge_with_bytes(base, per_byte, len)
    }

    // Unsafe mode

    pub fn set_unsafe_mode(&mut self, enabled: bool) {
        self.frame_mut().unsafe_mode = enabled;
    }

    pub fn is_unsafe_mode(&self) -> bool {
        self.frame().unsafe_mode
    }

    /// Apply the unsafe-mode policy to the result of a host call: API faults
    /// become `neutral` while unsafe mode is active, anything else passes
    /// through.
    pub fn handle_fault<T>(&self, result: Result<T, VmError>, neutral: T) -> Result<T, VmError> {
        match result {
            Err(err) if err.is_api_fault() && self.is_unsafe_mode() => {
                tracing::warn!(
                    contract = %self.frame().recipient,
                    function = %self.frame().function,
                    error = %err,
                    "host call fault ignored in unsafe mode"
                );
                Ok(neutral)
            }
            other => other,
        }
    }

    // Account views, pending changes first

    /// Code deployed at `address`, including code deployed by this
    /// transaction.
    pub fn contract_code(&self, address: &Address) -> Option<Vec<u8>> {
        if let Some(code) = self.output.account(address).and_then(|a| a.code.as_ref()) {
            if !code.is_empty() {
                return Some(code.clone());
            }
        }
        self.world.code(address)
    }

    pub fn has_code(&self, address: &Address) -> bool {
        self.contract_code(address).is_some()
    }

    pub fn account_exists(&self, address: &Address) -> bool {
        self.output.account(address).is_some() || self.world.account_exists(address)
    }

    pub fn code_metadata(&self, address: &Address) -> CodeMetadata {
        self.output
            .account(address)
            .and_then(|a| a.code_metadata)
            .unwrap_or_else(|| self.world.code_metadata(address))
    }

    pub fn owner(&self, address: &Address) -> Option<Address> {
        self.output
            .account(address)
            .and_then(|a| a.owner)
            .or_else(|| self.world.owner(address))
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.output
            .account(address)
            .and_then(|a| a.nonce)
            .unwrap_or_else(|| self.world.nonce(address))
    }

    /// Ledger balance plus the pending delta.
    pub fn balance(&self, address: &Address) -> BigInt {
        BigInt::from(self.world.balance(address)) + self.output.balance_delta(address)
    }

    // Arguments

    pub fn num_arguments(&mut self) -> Result<i32, VmError> {
        let cost = self.schedule().get_argument;
        self.use_gas(cost)?;
        Ok(self.frame().arguments.len() as i32)
    }

    /// Argument without charging gas.
    pub fn argument_ref(&self, index: i32) -> Result<&[u8], VmError> {
        let arguments = &self.frame().arguments;
        if index < 0 || index as usize >= arguments.len() {
            return Err(VmError::ArgumentIndexOutOfRange {
                index,
                count: arguments.len(),
            });
        }
        Ok(&arguments[index as usize])
    }

    pub fn argument(&mut self, index: i32) -> Result<Vec<u8>, VmError> {
        let cost = self.schedule().get_argument;
        self.use_gas(cost)?;
        let argument = self.argument_ref(index)?.to_vec();
        self.gas().charge_data_copy(argument.len())?;
        Ok(argument)
    }

    pub fn argument_length(&mut self, index: i32) -> Result<i32, VmError> {
        let cost = self.schedule().get_argument;
        self.use_gas(cost)?;
        Ok(self.argument_ref(index)?.len() as i32)
    }

    pub fn function_name(&mut self) -> Result<String, VmError> {
        let cost = self.schedule().get_context_info;
        self.use_gas(cost)?;
        Ok(self.frame().function.clone())
    }

    // Output

    pub fn finish(&mut self, data: Vec<u8>) -> Result<(), VmError> {
        let cost = self.schedule().finish;
        self.use_gas_with_bytes(cost, data.len())?;
        self.output.finish(data);
        Ok(())
    }

    /// Charge for signalling and build the error that ends the context.
    pub fn signal_error(&mut self, message: &[u8]) -> VmError {
        let cost = self.schedule().signal_error;
        if let Err(err) = self.use_gas_with_bytes(cost, message.len()) {
            return err;
        }
        VmError::SignalledError(String::from_utf8_lossy(message).into_owned())
    }

    /// Record an event. The first topic becomes the identifier.
    pub fn write_log(&mut self, topics: Vec<Vec<u8>>, data: Vec<u8>) -> Result<(), VmError> {
        let schedule = *self.schedule();
        let topic_cost = schedule.log_per_topic.saturating_mul(topics.len() as u64);
        let topic_bytes: usize = topics.iter().map(Vec::len).sum();
        self.use_gas_with_bytes(schedule.log.saturating_add(topic_cost), topic_bytes + data.len())?;

        let mut topics = topics.into_iter();
        let identifier = topics.next().unwrap_or_default();
        let entry = LogEntry {
            address: self.frame().recipient,
            identifier,
            topics: topics.collect(),
            data,
        };
        self.output.add_log(entry);
        Ok(())
    }

    // Return data

    pub fn num_return_data(&mut self) -> Result<i32, VmError> {
        let cost = self.schedule().get_return_data;
        self.use_gas(cost)?;
        Ok(self.output.return_data().len() as i32)
    }

    fn return_data_ref(&self, index: i32) -> Result<&[u8], VmError> {
        let data = self.output.return_data();
        if index < 0 || index as usize >= data.len() {
            return Err(VmError::InvalidArgument(format!(
                "return data index {} out of range ({} entries)",
                index,
                data.len()
            )));
        }
        Ok(&data[index as usize])
    }

    pub fn return_data_size(&mut self, index: i32) -> Result<i32, VmError> {
        let cost = self.schedule().get_return_data;
        self.use_gas(cost)?;
        Ok(self.return_data_ref(index)?.len() as i32)
    }

    pub fn return_data(&mut self, index: i32) -> Result<Vec<u8>, VmError> {
        let cost = self.schedule().get_return_data;
        self.use_gas(cost)?;
        let data = self.return_data_ref(index)?.to_vec();
        self.gas().charge_data_copy(data.len())?;
        Ok(data)
    }

    pub fn clean_return_data(&mut self) -> Result<(), VmError> {
        let cost = self.schedule().get_return_data;
        self.use_gas(cost)?;
        self.output.clean_return_data();
        Ok(())
    }

    pub fn delete_return_data(&mut self, index: i32) -> Result<(), VmError> {
        let cost = self.schedule().get_return_data;
        self.use_gas(cost)?;
        if index >= 0 {
            self.output.delete_return_data(index as usize);
        }
        Ok(())
    }

    // Context information

    fn charge_context_info(&mut self) -> Result<(), VmError> {
        let cost = self.schedule().get_context_info;
        self.use_gas(cost)
    }

    fn charge_block_info(&mut self) -> Result<(), VmError> {
        let cost = self.schedule().get_block_info;
        self.use_gas(cost)
    }

    pub fn caller(&mut self) -> Result<Address, VmError> {
        self.charge_context_info()?;
        Ok(self.frame().caller)
    }

    pub fn sc_address(&mut self) -> Result<Address, VmError> {
        self.charge_context_info()?;
        Ok(self.frame().recipient)
    }

    /// Owner of the executing contract; zero when it has none.
    pub fn owner_address(&mut self) -> Result<Address, VmError> {
        self.charge_context_info()?;
        let recipient = self.frame().recipient;
        Ok(self.owner(&recipient).unwrap_or(Address::ZERO))
    }

    pub fn call_value(&mut self) -> Result<BigUint, VmError> {
        self.charge_context_info()?;
        Ok(self.frame().call_value.clone())
    }

    pub fn call_type(&self) -> CallType {
        self.frame().call_type
    }

    pub fn gas_left(&mut self) -> Result<u64, VmError> {
        self.charge_context_info()?;
        Ok(self.gas().remaining())
    }

    pub fn external_balance(&mut self, address: &Address) -> Result<BigUint, VmError> {
        self.charge_context_info()?;
        let balance = self.balance(address);
        Ok(if balance.is_negative() {
            BigUint::zero()
        } else {
            balance.magnitude().clone()
        })
    }

    pub fn is_smart_contract(&mut self, address: &Address) -> Result<bool, VmError> {
        self.charge_context_info()?;
        Ok(self.has_code(address))
    }

    pub fn block_timestamp(&mut self) -> Result<u64, VmError> {
        self.charge_block_info()?;
        Ok(self.block.timestamp)
    }

    pub fn block_nonce(&mut self) -> Result<u64, VmError> {
        self.charge_block_info()?;
        Ok(self.block.nonce)
    }

    pub fn block_round(&mut self) -> Result<u64, VmError> {
        self.charge_block_info()?;
        Ok(self.block.round)
    }

    pub fn block_epoch(&mut self) -> Result<u32, VmError> {
        self.charge_block_info()?;
        Ok(self.block.epoch)
    }

    pub fn block_random_seed(&mut self) -> Result<[u8; 32], VmError> {
        self.charge_block_info()?;
        Ok(self.block.random_seed)
    }

    /// Hash of a past block; `None` for the future or unknown blocks.
    pub fn block_hash(&mut self, nonce: u64) -> Result<Option<[u8; 32]>, VmError> {
        self.charge_block_info()?;
        if nonce > self.block.nonce {
            return Ok(None);
        }
        Ok(self.world.block_hash(nonce))
    }

    /// Deterministic pseudo-random bytes derived from the block seed.
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        self.random_counter += 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.block.random_seed);
        hasher.update(&self.random_counter.to_be_bytes());
        let mut bytes = vec![0u8; len];
        hasher.finalize_xof().fill(&mut bytes);
        bytes
    }

    // Value transfers

    /// Move value from the executing contract to `destination`.
    ///
    /// # Errors
    /// `TransferInsufficientFunds` when the contract cannot cover the value,
    /// `AccountNotPayable` when the destination is a contract that does not
    /// accept value from contracts.
    pub fn transfer_value(
        &mut self,
        destination: &Address,
        value: &BigUint,
        data: &[u8],
    ) -> Result<(), VmError> {
        let cost = self.schedule().transfer_value;
        self.use_gas_with_bytes(cost, data.len())?;

        let sender = self.frame().recipient;
        if !value.is_zero() {
            if self.balance(&sender) < BigInt::from(value.clone()) {
                return Err(VmError::TransferInsufficientFunds);
            }
            if self.has_code(destination) && !self.code_metadata(destination).payable_by_sc {
                return Err(VmError::AccountNotPayable);
            }
        }

        let call_type = self.frame().call_type;
        self.output
            .transfer(&sender, destination, value, data, 0, call_type);
        tracing::trace!(%sender, %destination, %value, "value transferred");
        Ok(())
    }

    /// Move value without charging or checking payability. Used when a call
    /// carries value along with a function call.
    pub(crate) fn transfer_call_value(
        &mut self,
        sender: &Address,
        destination: &Address,
        value: &BigUint,
        gas_limit: u64,
        call_type: CallType,
    ) -> Result<(), VmError> {
        if value.is_zero() || sender == destination {
            return Ok(());
        }
        if self.balance(sender) < BigInt::from(value.clone()) {
            return Err(VmError::TransferInsufficientFunds);
        }
        self.output
            .transfer(sender, destination, value, &[], gas_limit, call_type);
        Ok(())
    }

    /// Build the transaction result. Consumes the runtime.
    pub fn into_output(self, result: Result<(), VmError>) -> VmOutput {
        let root = self.stack.into_root();
        match result {
            Ok(()) | Err(VmError::AsyncCallBreakpoint) => {
                let (output_accounts, return_data, logs) = self.output.into_parts();
                VmOutput {
                    return_code: ReturnCode::Ok,
                    return_message: String::new(),
                    return_data,
                    gas_remaining: root.gas.remaining(),
                    gas_refund: root.gas.refunded(),
                    output_accounts,
                    logs,
                }
            }
            Err(err) => {
                let message = err.to_string();
                let gas_remaining = match err {
                    VmError::SignalledError(_) => root.gas.remaining(),
                    _ => 0,
                };
                tracing::debug!(
                    contract = %root.recipient,
                    function = %root.function,
                    error = %message,
                    "transaction failed"
                );

                let mut output = VmOutput::failure(err.return_code(), message.clone());
                output.gas_remaining = gas_remaining;
                output.logs.push(LogEntry {
                    address: root.recipient,
                    identifier: INTERNAL_ERRORS_IDENTIFIER.to_vec(),
                    topics: vec![root.recipient.as_bytes().to_vec(), root.function.into_bytes()],
                    data: message.into_bytes(),
                });
                output
            }
        }
    }
}

/// Left-pad big-endian bytes to `len`.
pub fn pad_left(bytes: &[u8], len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes.to_vec();
    }
    let mut padded = vec![0u8; len - bytes.len()];
    padded.extend_from_slice(bytes);
    padded
}

/// Call value as written to contract memory.
pub fn balance_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        return vec![0u8; BALANCE_LEN];
    }
    pad_left(&value.to_bytes_be(), BALANCE_LEN)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::world::World;
    use vmhost_types::Account;

    pub fn contract() -> Address {
        Address::contract_from_name("contract")
    }

    pub fn user() -> Address {
        Address::user_from_name("user")
    }

    pub fn world() -> World {
        World::new()
            .with_account(user(), Account::new_user(1_000u32))
            .with_account(
                contract(),
                Account::new_contract(b"code".to_vec(), user()).with_balance(500u32),
            )
    }

    pub fn runtime_with(world: World, arguments: Vec<Vec<u8>>) -> Runtime {
        let config = Arc::new(HostConfig::default());
        let gas = GasTracker::new(1_000_000, config.gas_schedule);
        let root = CallContext::new(user(), contract(), "run", gas, CallMode::Direct)
            .with_arguments(arguments);
        Runtime::new(config, Arc::new(world), root)
    }

    pub fn runtime() -> Runtime {
        runtime_with(world(), Vec::new())
    }
}
