//! Native contracts standing in for WASM code.
//!
//! A [`MockContract`] is a set of Rust closures registered under a code
//! identifier. Deploying that identifier as account code makes the host run
//! the closures instead of compiled WASM. Each instance gets its own
//! 64 KiB scratch memory so the ABI layer can be driven from native code
//! through [`abi::call_import`](crate::abi::call_import).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::VmError;
use crate::executor::{memory_range, Entry, Executor, Host};
use crate::runtime::Runtime;

/// Size of the scratch memory of a mock instance.
pub const MOCK_MEMORY_SIZE: usize = 64 * 1024;

/// Exported function of a mock contract.
pub type MockMethod = Arc<dyn Fn(&mut dyn Host) -> Result<(), VmError> + Send + Sync>;

/// Exported functions of a native contract.
#[derive(Clone, Default)]
pub struct MockContract {
    methods: HashMap<String, MockMethod>,
}

impl fmt::Debug for MockContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MockContract").field("methods", &names).finish()
    }
}

impl MockContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut dyn Host) -> Result<(), VmError> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn method(&self, name: &str) -> Option<MockMethod> {
        self.methods.get(name).cloned()
    }
}

/// Executor running registered native contracts.
#[derive(Clone, Default)]
pub struct MockExecutor {
    contracts: Arc<RwLock<HashMap<Vec<u8>, MockContract>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contract` as the implementation of `code`.
    pub fn register(&self, code: impl Into<Vec<u8>>, contract: MockContract) {
        self.contracts.write().insert(code.into(), contract);
    }

    pub fn with_contract(self, code: impl Into<Vec<u8>>, contract: MockContract) -> Self {
        self.register(code, contract);
        self
    }

    fn method(&self, code: &[u8], function: &str) -> Result<MockMethod, VmError> {
        let contracts = self.contracts.read();
        let contract = contracts
            .get(code)
            .ok_or_else(|| VmError::InvalidWasm("unknown mock code".to_string()))?;
        contract
            .method(function)
            .ok_or_else(|| VmError::FunctionNotFound(function.to_string()))
    }
}

impl Executor for MockExecutor {
    fn check_code(&self, code: &[u8]) -> Result<(), VmError> {
        if self.contracts.read().contains_key(code) {
            Ok(())
        } else {
            Err(VmError::InvalidWasm("unknown mock code".to_string()))
        }
    }

    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError> {
        let contracts = self.contracts.read();
        let contract = contracts
            .get(code)
            .ok_or_else(|| VmError::InvalidWasm("unknown mock code".to_string()))?;
        Ok(contract.has_method(function))
    }

    fn execute(&self, runtime: Runtime, entry: Entry<'_>) -> (Runtime, Result<(), VmError>) {
        let mut host = MockHost {
            runtime,
            executor: self,
            memories: Vec::new(),
        };
        let result = entry(&mut host);
        (host.runtime, result)
    }
}

/// Host of a transaction run by [`MockExecutor`].
pub struct MockHost<'a> {
    runtime: Runtime,
    executor: &'a MockExecutor,
    memories: Vec<Vec<u8>>,
}

impl MockHost<'_> {
    fn memory(&mut self) -> Result<&mut Vec<u8>, VmError> {
        self.memories.last_mut().ok_or(VmError::MemoryAccess)
    }
}

impl Host for MockHost<'_> {
    fn runtime(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    fn mem_load(&mut self, offset: i32, len: i32) -> Result<Vec<u8>, VmError> {
        let memory = self.memory()?;
        let range = memory_range(offset, len, memory.len())?;
        Ok(memory[range].to_vec())
    }

    fn mem_store(&mut self, offset: i32, data: &[u8]) -> Result<(), VmError> {
        let len = i32::try_from(data.len()).map_err(|_| VmError::MemoryAccess)?;
        let memory = self.memory()?;
        let range = memory_range(offset, len, memory.len())?;
        memory[range].copy_from_slice(data);
        Ok(())
    }

    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError> {
        self.executor.has_function(code, function)
    }

    fn check_code(&self, code: &[u8]) -> Result<(), VmError> {
        self.executor.check_code(code)
    }

    fn run_instance(&mut self, code: &[u8], function: &str) -> Result<(), VmError> {
        let method = self.executor.method(code, function)?;
        self.memories.push(vec![0u8; MOCK_MEMORY_SIZE]);
        let result = method(self);
        self.memories.pop();
        result
    }
}
