//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use vmhost_types::{Account, Address, ContractCallInput, VmOutput};
use vmhost_vm::{HostConfig, MockContract, MockExecutor, VmHost, World};

pub const GAS: u64 = 100_000_000;

pub fn user() -> Address {
    Address::user_from_name("alice")
}

pub fn contract(name: &str) -> Address {
    Address::contract_from_name(name)
}

/// World holding `user()` and one contract per `(name, code)` pair, all
/// owned by `user()`.
pub fn world_with(contracts: &[(&str, &[u8])]) -> World {
    contracts.iter().fold(
        World::new().with_account(user(), Account::new_user(1_000_000u32)),
        |world, (name, code)| {
            world.with_account(
                contract(name),
                Account::new_contract(code.to_vec(), user()).with_balance(1_000u32),
            )
        },
    )
}

pub struct Fixture {
    pub executor: MockExecutor,
    pub world: Arc<World>,
    pub host: VmHost,
}

impl Fixture {
    pub fn new(world: World) -> Self {
        Self::with_config(world, HostConfig::default())
    }

    pub fn with_config(world: World, config: HostConfig) -> Self {
        let executor = MockExecutor::new();
        let world = Arc::new(world);
        let host = VmHost::new(config, Arc::new(executor.clone()), world.clone());
        Self { executor, world, host }
    }

    pub fn register(&self, code: &[u8], contract: MockContract) {
        self.executor.register(code, contract);
    }

    pub fn call(&self, name: &str, function: &str, arguments: Vec<Vec<u8>>) -> VmOutput {
        let input = ContractCallInput::new(user(), contract(name), function, GAS).with_arguments(arguments);
        self.host.run_smart_contract_call(&input)
    }
}

pub fn int_bytes(value: i64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Big-endian magnitude as finished by `int64finish`.
pub fn as_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}
