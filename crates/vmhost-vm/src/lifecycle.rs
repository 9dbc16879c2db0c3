//! Deploying and upgrading contracts from running code.

use num_bigint::BigUint;

use vmhost_types::{Address, CallData, CallType, CodeMetadata};

use crate::async_call::UPGRADE_FUNCTION;
use crate::call_stack::CallMode;
use crate::composition::{run_nested, Composition, NestedCall, NestedOutcome, INIT_FUNCTION};
use crate::error::VmError;
use crate::executor::Host;
use crate::runtime::Runtime;

/// Address the next contract deployed by `creator` will get.
pub fn next_contract_address(runtime: &Runtime, creator: &Address) -> Address {
    Address::new_contract_address(creator, runtime.nonce(creator))
}

/// Record a new contract in the pending output and bump the creator's
/// nonce.
pub(crate) fn install_contract(
    runtime: &mut Runtime,
    creator: &Address,
    address: &Address,
    code: Vec<u8>,
    metadata: CodeMetadata,
) {
    let nonce = runtime.nonce(creator);
    let output = runtime.output_mut();
    output.account_mut(creator).nonce = Some(nonce + 1);

    let account = output.account_mut(address);
    account.code = Some(code);
    account.code_metadata = Some(metadata);
    account.owner = Some(*creator);
    tracing::debug!(%creator, contract = %address, "contract installed");
}

struct DeployOutcome {
    address: Result<Address, VmError>,
    gas_used: u64,
}

fn deploy<H: Host + ?Sized>(
    host: &mut H,
    value: &BigUint,
    code: Vec<u8>,
    metadata: CodeMetadata,
    arguments: Vec<Vec<u8>>,
    gas_limit: u64,
) -> DeployOutcome {
    let rejected = |err| DeployOutcome {
        address: Err(err),
        gas_used: 0,
    };

    if let Err(err) = host.check_code(&code) {
        return rejected(err);
    }
    let has_init = match host.has_function(&code, INIT_FUNCTION) {
        Ok(has_init) => has_init,
        Err(err) => return rejected(err),
    };

    let rt = host.runtime();
    let creator = rt.frame().recipient;
    let address = next_contract_address(rt, &creator);
    if rt.has_code(&address) {
        return rejected(VmError::AccountCollision(address));
    }

    rt.output_mut().push_snapshot();
    install_contract(rt, &creator, &address, code, metadata);

    let outcome = if has_init {
        run_nested(
            host,
            NestedCall {
                mode: CallMode::Deploy,
                caller: creator,
                recipient: address,
                code_address: address,
                value: value.clone(),
                function: INIT_FUNCTION.to_string(),
                arguments,
                gas_limit,
                call_type: CallType::DirectCall,
            },
        )
    } else {
        NestedOutcome {
            result: rt.transfer_call_value(&creator, &address, value, gas_limit, CallType::DirectCall),
            gas_used: 0,
        }
    };

    let output = host.runtime().output_mut();
    if outcome.result.is_ok() {
        output.discard_snapshot();
    } else {
        output.restore_snapshot();
    }
    DeployOutcome {
        address: outcome.result.map(|()| address),
        gas_used: outcome.gas_used,
    }
}

/// Contract deployment and upgrade.
///
/// Deployments return the new address, or `None` when the deployment
/// failed and was rolled back. `Err` is reserved for faults of the calling
/// context.
pub trait Lifecycle: Host {
    fn create_contract(
        &mut self,
        gas: u64,
        value: &BigUint,
        code: Vec<u8>,
        metadata: CodeMetadata,
        arguments: Vec<Vec<u8>>,
    ) -> Result<Option<Address>, VmError> {
        let rt = self.runtime();
        let schedule = *rt.schedule();
        rt.gas()
            .charge_with_bytes(schedule.create_contract, schedule.compile_per_byte, code.len())?;
        let gas_limit = gas.min(rt.gas().remaining());

        let outcome = deploy(self, value, code, metadata, arguments, gas_limit);
        self.runtime().gas().charge(outcome.gas_used)?;
        match outcome.address {
            Ok(address) => Ok(Some(address)),
            Err(err) => {
                tracing::debug!(error = %err, "contract deployment failed");
                Ok(None)
            }
        }
    }

    /// Deploy a copy of the code of an existing contract.
    fn deploy_from_source_contract(
        &mut self,
        gas: u64,
        value: &BigUint,
        source: &Address,
        metadata: CodeMetadata,
        arguments: Vec<Vec<u8>>,
    ) -> Result<Option<Address>, VmError> {
        let Some(code) = self.runtime().contract_code(source) else {
            let rt = self.runtime();
            let cost = rt.schedule().create_contract;
            rt.use_gas(cost)?;
            tracing::debug!(%source, "source contract not found");
            return Ok(None);
        };
        self.create_contract(gas, value, code, metadata, arguments)
    }

    /// Replace the code of `destination`. Issued as a legacy async call, so
    /// it ends the current context.
    fn upgrade_contract(
        &mut self,
        destination: &Address,
        value: &BigUint,
        code: &[u8],
        metadata: CodeMetadata,
        arguments: Vec<Vec<u8>>,
    ) -> Result<(), VmError> {
        let rt = self.runtime();
        let minimum = rt.schedule().min_async_call_cost();
        if rt.gas().remaining() < minimum {
            return Err(VmError::NotEnoughGas);
        }

        let mut call_data = CallData::new(UPGRADE_FUNCTION)
            .with_argument(code)
            .with_argument(metadata.to_bytes());
        call_data.arguments.extend(arguments);
        self.async_call(destination, value, &call_data.encode())
    }

    fn upgrade_from_source_contract(
        &mut self,
        destination: &Address,
        value: &BigUint,
        source: &Address,
        metadata: CodeMetadata,
        arguments: Vec<Vec<u8>>,
    ) -> Result<(), VmError> {
        let code = self
            .runtime()
            .contract_code(source)
            .ok_or(VmError::ContractNotFound(*source))?;
        self.upgrade_contract(destination, value, &code, metadata, arguments)
    }
}

impl<H: Host + ?Sized> Lifecycle for H {}
