//! WASM backend on wasmtime.
//!
//! Gas is metered with wasmtime fuel: before code runs, the store gets as
//! much fuel as the current call context has gas left, and the fuel left
//! afterwards is written back to the context. Host functions sync the two
//! counters around every call so host charges and instruction costs come
//! out of the same budget.
//!
//! Compiled modules are cached by the blake3 hash of their code. Imports
//! are resolved against the host function registry when a module is
//! compiled and bound afresh for every instance.
//!
//! Every instance lives in a store of its own. The transaction's runtime is
//! moved into that store for the duration of the call and moved back out
//! when it returns, so instances and their memories are released as soon as
//! their call context ends.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wasmtime::{
    AsContextMut, Caller, Config, Engine, Extern, ExternType, Func, FuncType, Instance, Memory, Module, OptLevel,
    Store, StoreLimits, StoreLimitsBuilder, Val, ValType,
};

use crate::abi::{self, HostFunction, ValueType, IMPORT_MODULE};
use crate::config::HostConfig;
use crate::error::VmError;
use crate::executor::{memory_range, Entry, Executor, Host};
use crate::runtime::Runtime;

/// Size of a WASM memory page.
pub const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Export every contract must provide.
pub const MEMORY_EXPORT: &str = "memory";

struct StoreData {
    runtime: Runtime,
    limits: StoreLimits,
}

/// A validated module and the host functions its imports resolved to.
struct CompiledModule {
    module: Module,
    imports: Vec<(FuncType, &'static HostFunction)>,
}

struct ExecutorInner {
    engine: Engine,
    config: HostConfig,
    modules: Mutex<HashMap<[u8; 32], Arc<CompiledModule>>>,
}

/// Executor compiling and running WASM contracts.
#[derive(Clone)]
pub struct WasmtimeExecutor {
    inner: Arc<ExecutorInner>,
}

impl WasmtimeExecutor {
    pub fn new(config: &HostConfig) -> Result<Self, VmError> {
        let mut engine_config = Config::new();
        engine_config
            .consume_fuel(true)
            .max_wasm_stack(config.max_wasm_stack_bytes)
            .wasm_bulk_memory(true)
            .wasm_multi_value(true)
            .wasm_reference_types(true)
            .cranelift_opt_level(OptLevel::Speed);

        let engine = Engine::new(&engine_config)
            .map_err(|e| VmError::ExecutionFailed(format!("Failed to create engine: {}", e)))?;

        Ok(Self {
            inner: Arc::new(ExecutorInner {
                engine,
                config: config.clone(),
                modules: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Number of modules in the compilation cache.
    pub fn cached_modules(&self) -> usize {
        self.inner.modules.lock().len()
    }
}

impl Executor for WasmtimeExecutor {
    fn check_code(&self, code: &[u8]) -> Result<(), VmError> {
        self.inner.compile(code).map(|_| ())
    }

    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError> {
        self.inner.has_function(code, function)
    }

    fn execute(&self, runtime: Runtime, entry: Entry<'_>) -> (Runtime, Result<(), VmError>) {
        let mut store = self.inner.store(runtime);
        let result = {
            let mut host = WasmtimeHost {
                store: &mut store,
                inner: &self.inner,
                memory: None,
            };
            entry(&mut host)
        };
        (store.into_data().runtime, result)
    }
}

fn value_type(ty: &ValType) -> Option<ValueType> {
    match ty {
        ValType::I32 => Some(ValueType::I32),
        ValType::I64 => Some(ValueType::I64),
        _ => None,
    }
}

impl ExecutorInner {
    fn store(&self, runtime: Runtime) -> Store<StoreData> {
        let memory_size = self.config.max_memory_pages as usize * WASM_PAGE_SIZE;
        let limits = StoreLimitsBuilder::new()
            .memory_size(memory_size)
            .instances(1)
            .memories(1)
            .build();
        let mut store = Store::new(&self.engine, StoreData { runtime, limits });
        store.limiter(|data| &mut data.limits);
        store
    }

    fn compile(&self, code: &[u8]) -> Result<Arc<CompiledModule>, VmError> {
        if code.len() > self.config.max_code_size {
            return Err(VmError::CodeSizeExceeded {
                size: code.len(),
                limit: self.config.max_code_size,
            });
        }

        let key = *blake3::hash(code).as_bytes();
        if let Some(compiled) = self.modules.lock().get(&key) {
            return Ok(Arc::clone(compiled));
        }

        let module = Module::new(&self.engine, code).map_err(|e| VmError::InvalidWasm(e.to_string()))?;
        let compiled = Arc::new(self.validate(module)?);
        self.modules.lock().insert(key, Arc::clone(&compiled));
        tracing::debug!(code_hash = %hex::encode(key), size = code.len(), "module compiled");
        Ok(compiled)
    }

    fn validate(&self, module: Module) -> Result<CompiledModule, VmError> {
        let mut has_memory = false;
        for export in module.exports() {
            match export.ty() {
                ExternType::Func(ty) => {
                    if ty.params().len() != 0 || ty.results().len() != 0 {
                        return Err(VmError::ArityMismatch {
                            function: export.name().to_string(),
                        });
                    }
                }
                ExternType::Memory(_) if export.name() == MEMORY_EXPORT => has_memory = true,
                _ => {}
            }
        }
        if !has_memory {
            return Err(VmError::InvalidWasm(format!("missing \"{}\" export", MEMORY_EXPORT)));
        }

        let mut imports = Vec::new();
        for import in module.imports() {
            let unknown = |arity| VmError::UnknownImport {
                module: import.module().to_string(),
                name: import.name().to_string(),
                arity,
            };
            let ExternType::Func(ty) = import.ty() else {
                tracing::warn!(module = import.module(), name = import.name(), "non-function import rejected");
                return Err(unknown(0));
            };
            if import.module() != IMPORT_MODULE {
                tracing::warn!(module = import.module(), name = import.name(), "import from unknown module");
                return Err(unknown(ty.params().len()));
            }

            let params = ty
                .params()
                .map(|param| value_type(&param))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| unknown(ty.params().len()))?;
            let result = {
                let mut results = ty.results();
                match (results.next(), results.next()) {
                    (None, _) => None,
                    (Some(result), None) => Some(value_type(&result).ok_or_else(|| unknown(params.len()))?),
                    (Some(_), Some(_)) => return Err(unknown(params.len())),
                }
            };

            let function = abi::registry().resolve(import.name(), &params, result, &self.config.abi)?;
            imports.push((ty, function));
        }

        Ok(CompiledModule { module, imports })
    }

    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError> {
        let compiled = self.compile(code)?;
        Ok(matches!(compiled.module.get_export(function), Some(ExternType::Func(_))))
    }
}

/// Run `function` of a fresh instance in a store holding `runtime`.
fn run_in_store(
    inner: &Arc<ExecutorInner>,
    runtime: Runtime,
    compiled: &CompiledModule,
    function: &str,
) -> (Runtime, Result<(), VmError>) {
    let mut store = inner.store(runtime);
    let result = {
        let mut host = WasmtimeHost {
            store: &mut store,
            inner,
            memory: None,
        };
        host.call_metered(compiled, function)
    };
    (store.into_data().runtime, result)
}

/// Store access shared by the top-level store and host call callers.
trait StoreAccess: AsContextMut<Data = StoreData> {
    fn store_data(&mut self) -> &mut StoreData;

    fn remaining_fuel(&self) -> u64;

    fn refuel(&mut self, fuel: u64) -> Result<(), VmError>;
}

impl StoreAccess for Store<StoreData> {
    fn store_data(&mut self) -> &mut StoreData {
        self.data_mut()
    }

    fn remaining_fuel(&self) -> u64 {
        self.get_fuel().unwrap_or(0)
    }

    fn refuel(&mut self, fuel: u64) -> Result<(), VmError> {
        self.set_fuel(fuel).map_err(VmError::from)
    }
}

impl StoreAccess for Caller<'_, StoreData> {
    fn store_data(&mut self) -> &mut StoreData {
        self.data_mut()
    }

    fn remaining_fuel(&self) -> u64 {
        self.get_fuel().unwrap_or(0)
    }

    fn refuel(&mut self, fuel: u64) -> Result<(), VmError> {
        self.set_fuel(fuel).map_err(VmError::from)
    }
}

struct WasmtimeHost<'a, S: StoreAccess> {
    store: &'a mut S,
    inner: &'a Arc<ExecutorInner>,
    /// Memory of the instance making the host call
    memory: Option<Memory>,
}

impl<S: StoreAccess> WasmtimeHost<'_, S> {
    fn bind_import(&mut self, ty: FuncType, function: &'static HostFunction) -> Extern {
        let inner = Arc::clone(self.inner);
        let func = Func::new(
            &mut *self.store,
            ty,
            move |mut caller: Caller<'_, StoreData>, params: &[Val], results: &mut [Val]| {
                let memory = caller.get_export(MEMORY_EXPORT).and_then(Extern::into_memory);
                let mut host = WasmtimeHost {
                    store: &mut caller,
                    inner: &inner,
                    memory,
                };
                host.invoke(function, params, results).map_err(wasmtime::Error::new)
            },
        );
        Extern::Func(func)
    }

    fn invoke(&mut self, function: &HostFunction, params: &[Val], results: &mut [Val]) -> Result<(), VmError> {
        let args: Vec<i64> = params
            .iter()
            .map(|val| val.i64().or_else(|| val.i32().map(i64::from)).unwrap_or_default())
            .collect();

        let fuel = self.store.remaining_fuel();
        self.runtime().gas().sync_remaining(fuel);
        let result = abi::dispatch(self, function, &args);
        let remaining = self.runtime().gas().remaining();
        self.store.refuel(remaining)?;

        let value = result?;
        if let Some(slot) = results.first_mut() {
            *slot = match function.result {
                Some(ValueType::I32) => Val::I32(value as i32),
                _ => Val::I64(value),
            };
        }
        Ok(())
    }

    fn instantiate_and_call(&mut self, compiled: &CompiledModule, function: &str) -> Result<(), VmError> {
        let imports: Vec<Extern> = compiled
            .imports
            .iter()
            .map(|(ty, host_function)| self.bind_import(ty.clone(), host_function))
            .collect();
        let instance = Instance::new(&mut *self.store, &compiled.module, &imports)?;
        let func = instance
            .get_func(&mut *self.store, function)
            .ok_or_else(|| VmError::FunctionNotFound(function.to_string()))?;
        func.call(&mut *self.store, &[], &mut [])?;
        Ok(())
    }

    /// Call `function` with as much fuel as the current context has gas.
    fn call_metered(&mut self, compiled: &CompiledModule, function: &str) -> Result<(), VmError> {
        let gas = self.runtime().gas().remaining();
        self.store.refuel(gas)?;

        let result = self.instantiate_and_call(compiled, function);

        let fuel = self.store.remaining_fuel();
        let gas = self.runtime().gas();
        match result {
            Err(VmError::OutOfGas { .. }) => {
                gas.exhaust();
                Err(VmError::OutOfGas {
                    used: gas.limit(),
                    limit: gas.limit(),
                })
            }
            other => {
                gas.sync_remaining(fuel);
                other
            }
        }
    }
}

impl<S: StoreAccess> Host for WasmtimeHost<'_, S> {
    fn runtime(&mut self) -> &mut Runtime {
        &mut self.store.store_data().runtime
    }

    fn mem_load(&mut self, offset: i32, len: i32) -> Result<Vec<u8>, VmError> {
        let memory = self.memory.ok_or(VmError::MemoryAccess)?;
        let data = memory.data(&*self.store);
        let range = memory_range(offset, len, data.len())?;
        Ok(data[range].to_vec())
    }

    fn mem_store(&mut self, offset: i32, bytes: &[u8]) -> Result<(), VmError> {
        let memory = self.memory.ok_or(VmError::MemoryAccess)?;
        let len = i32::try_from(bytes.len()).map_err(|_| VmError::MemoryAccess)?;
        let data = memory.data_mut(&mut *self.store);
        let range = memory_range(offset, len, data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn has_function(&self, code: &[u8], function: &str) -> Result<bool, VmError> {
        self.inner.has_function(code, function)
    }

    fn check_code(&self, code: &[u8]) -> Result<(), VmError> {
        self.inner.compile(code).map(|_| ())
    }

    fn run_instance(&mut self, code: &[u8], function: &str) -> Result<(), VmError> {
        let compiled = self.inner.compile(code)?;
        let vacant = self.runtime().vacant();
        let runtime = std::mem::replace(self.runtime(), vacant);
        let (runtime, result) = run_in_store(self.inner, runtime, &compiled, function);
        *self.runtime() = runtime;
        result
    }
}
