//! Host function surface.
//!
//! Every function a contract may import lives in one flat registry keyed by
//! name and arity. Two ABI generations share the registry: the legacy one
//! passes storage keys as implicit 32-byte values, the current one passes
//! explicit lengths. Functions with the same signature in both are tagged
//! `Shared`. A module's imports decide which generation it speaks.
//!
//! Entries take their arguments widened to `i64` and return an `i64`
//! (ignored for functions without a result). Handles, offsets and lengths
//! are `i32` values on the WASM side.

/// Host function calling a `Runtime` method that takes only handles.
macro_rules! handle_op {
    ($name:ident => $method:ident($($index:literal),*)) => {
        fn $name(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
            host.runtime().$method($(arg(args, $index)),*)?;
            Ok(0)
        }
    };
}

mod base;
mod big_float;
mod big_int;
mod contracts;
mod crypto;
mod managed_buffer;
mod small_int;
mod storage;

use num_bigint::BigUint;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use vmhost_types::Address;

use crate::config::AbiConfig;
use crate::error::VmError;
use crate::executor::Host;

/// Module every import must come from.
pub const IMPORT_MODULE: &str = "env";

/// Width of keys in the legacy generation.
pub const LEGACY_KEY_LEN: i32 = 32;

/// WASM value type of a host function parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    I32,
    I64,
}

/// ABI generation a host function belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiGeneration {
    /// Implicit 32-byte keys
    Legacy,
    /// Explicit lengths
    Current,
    /// Same signature in both generations
    Shared,
}

impl AbiGeneration {
    pub fn enabled(&self, config: &AbiConfig) -> bool {
        match self {
            AbiGeneration::Legacy => config.legacy,
            AbiGeneration::Current => config.current,
            AbiGeneration::Shared => config.legacy || config.current,
        }
    }
}

pub type HostCall = fn(&mut dyn Host, &[i64]) -> Result<i64, VmError>;

/// One importable host function.
#[derive(Clone, Copy)]
pub struct HostFunction {
    pub name: &'static str,
    pub params: &'static [ValueType],
    pub result: Option<ValueType>,
    pub generation: AbiGeneration,
    pub call: HostCall,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("result", &self.result)
            .field("generation", &self.generation)
            .finish()
    }
}

const I: ValueType = ValueType::I32;
const L: ValueType = ValueType::I64;

impl HostFunction {
    const fn new(
        name: &'static str,
        params: &'static [ValueType],
        result: Option<ValueType>,
        generation: AbiGeneration,
        call: HostCall,
    ) -> Self {
        Self {
            name,
            params,
            result,
            generation,
            call,
        }
    }

    const fn shared(name: &'static str, params: &'static [ValueType], result: Option<ValueType>, call: HostCall) -> Self {
        Self::new(name, params, result, AbiGeneration::Shared, call)
    }

    const fn legacy(name: &'static str, params: &'static [ValueType], result: Option<ValueType>, call: HostCall) -> Self {
        Self::new(name, params, result, AbiGeneration::Legacy, call)
    }

    const fn current(name: &'static str, params: &'static [ValueType], result: Option<ValueType>, call: HostCall) -> Self {
        Self::new(name, params, result, AbiGeneration::Current, call)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn matches(&self, params: &[ValueType], result: Option<ValueType>) -> bool {
        self.params == params && self.result == result
    }
}

/// All host functions, by name.
pub struct Registry {
    functions: HashMap<&'static str, Vec<&'static HostFunction>>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let tables: [&'static [HostFunction]; 8] = [
        base::FUNCTIONS,
        storage::FUNCTIONS,
        big_int::FUNCTIONS,
        big_float::FUNCTIONS,
        managed_buffer::FUNCTIONS,
        small_int::FUNCTIONS,
        crypto::FUNCTIONS,
        contracts::FUNCTIONS,
    ];
    let mut functions: HashMap<&'static str, Vec<&'static HostFunction>> = HashMap::new();
    for function in tables.into_iter().flatten() {
        functions.entry(function.name).or_default().push(function);
    }
    Registry { functions }
});

pub fn registry() -> &'static Registry {
    &REGISTRY
}

impl Registry {
    /// Function named `name` taking `arity` parameters.
    pub fn lookup(&self, name: &str, arity: usize) -> Option<&'static HostFunction> {
        self.functions
            .get(name)?
            .iter()
            .copied()
            .find(|function| function.arity() == arity)
    }

    /// Resolve an import with the given signature among the enabled
    /// generations.
    pub fn resolve(
        &self,
        name: &str,
        params: &[ValueType],
        result: Option<ValueType>,
        abi: &AbiConfig,
    ) -> Result<&'static HostFunction, VmError> {
        self.lookup(name, params.len())
            .filter(|function| function.matches(params, result) && function.generation.enabled(abi))
            .ok_or_else(|| {
                tracing::warn!(name, arity = params.len(), "import does not resolve");
                VmError::UnknownImport {
                    module: IMPORT_MODULE.to_string(),
                    name: name.to_string(),
                    arity: params.len(),
                }
            })
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static HostFunction> + '_ {
        self.functions.values().flat_map(|functions| functions.iter().copied())
    }
}

/// Call `function` on behalf of the executing code.
///
/// API faults become -1 while unsafe mode is active.
pub fn dispatch(host: &mut dyn Host, function: &HostFunction, args: &[i64]) -> Result<i64, VmError> {
    if args.len() != function.arity() {
        return Err(VmError::ExecutionFailed(format!(
            "{} takes {} arguments, got {}",
            function.name,
            function.arity(),
            args.len()
        )));
    }
    tracing::trace!(function = function.name, ?args, "host call");
    let result = (function.call)(host, args);
    host.runtime().handle_fault(result, -1)
}

/// Call a host function by name, the way imported code would.
pub fn call_import(host: &mut dyn Host, name: &str, args: &[i64]) -> Result<i64, VmError> {
    let function = registry().lookup(name, args.len()).ok_or_else(|| VmError::UnknownImport {
        module: IMPORT_MODULE.to_string(),
        name: name.to_string(),
        arity: args.len(),
    })?;
    dispatch(host, function, args)
}

// Argument helpers

fn arg(args: &[i64], index: usize) -> i32 {
    args.get(index).copied().unwrap_or_default() as i32
}

fn arg64(args: &[i64], index: usize) -> i64 {
    args.get(index).copied().unwrap_or_default()
}

fn gas_arg(args: &[i64], index: usize) -> u64 {
    u64::try_from(arg64(args, index)).unwrap_or(0)
}

fn flag(value: bool) -> i64 {
    i64::from(value)
}

fn load(host: &mut dyn Host, offset: i32, len: i32) -> Result<Vec<u8>, VmError> {
    host.mem_load(offset, len)
}

fn store(host: &mut dyn Host, offset: i32, data: &[u8]) -> Result<(), VmError> {
    host.mem_store(offset, data)
}

fn load_address(host: &mut dyn Host, offset: i32) -> Result<Address, VmError> {
    let bytes = host.mem_load(offset, Address::LEN as i32)?;
    Ok(Address::from_slice(&bytes)?)
}

fn store_address(host: &mut dyn Host, offset: i32, address: &Address) -> Result<(), VmError> {
    host.mem_store(offset, address.as_bytes())
}

/// 32-byte big-endian value.
fn load_value(host: &mut dyn Host, offset: i32) -> Result<BigUint, VmError> {
    let bytes = host.mem_load(offset, crate::runtime::BALANCE_LEN as i32)?;
    Ok(BigUint::from_bytes_be(&bytes))
}

fn load_string(host: &mut dyn Host, offset: i32, len: i32) -> Result<String, VmError> {
    let bytes = host.mem_load(offset, len)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `count` byte strings laid out back to back at `data_offset`, with their
/// lengths as little-endian `i32`s at `lengths_offset`.
fn load_arguments(host: &mut dyn Host, count: i32, lengths_offset: i32, data_offset: i32) -> Result<Vec<Vec<u8>>, VmError> {
    if count < 0 {
        return Err(VmError::NegativeLength);
    }
    let lengths = host.mem_load(lengths_offset, count.saturating_mul(4))?;
    let mut arguments = Vec::with_capacity(count as usize);
    let mut offset = data_offset;
    for chunk in lengths.chunks_exact(4) {
        let len = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        arguments.push(host.mem_load(offset, len)?);
        offset = offset.checked_add(len).ok_or(VmError::MemoryAccess)?;
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        let finish = registry.lookup("finish", 2).unwrap();
        assert_eq!(finish.params, &[I, I]);
        assert_eq!(finish.result, None);
        assert!(registry.lookup("finish", 3).is_none());
        assert!(registry.lookup("launchRockets", 0).is_none());
    }

    #[test]
    fn test_generations_coexist() {
        let registry = registry();
        let current = registry.lookup("storageStore", 4).unwrap();
        let legacy = registry.lookup("storageStore", 3).unwrap();
        assert_eq!(current.generation, AbiGeneration::Current);
        assert_eq!(legacy.generation, AbiGeneration::Legacy);

        let grouped = registry.lookup("createAsyncCall", 11).unwrap();
        let plain = registry.lookup("createAsyncCall", 10).unwrap();
        assert_eq!(grouped.params.last(), Some(&L));
        assert_eq!(&plain.params[8..], &[L, L]);
    }

    #[test]
    fn test_resolve_checks_types_and_generation() {
        let registry = registry();
        let both = AbiConfig::default();
        assert!(registry.resolve("getGasLeft", &[], Some(L), &both).is_ok());
        assert!(registry.resolve("getGasLeft", &[], Some(I), &both).is_err());

        let current_only = AbiConfig {
            legacy: false,
            current: true,
        };
        assert!(registry.resolve("storageLoad", &[I, I], Some(I), &current_only).is_err());
        assert!(registry.resolve("storageLoad", &[I, I, I], Some(I), &current_only).is_ok());
        assert!(registry.resolve("getNumArguments", &[], Some(I), &current_only).is_ok());
    }

    #[test]
    fn test_no_duplicate_signatures() {
        let mut seen = HashSet::new();
        for function in registry().iter() {
            assert!(
                seen.insert((function.name, function.arity())),
                "{} registered twice with arity {}",
                function.name,
                function.arity()
            );
        }
        assert_eq!(seen.len(), registry().len());
        assert!(!registry().is_empty());
    }

    #[test]
    fn test_argument_helpers() {
        let args = [7, -1, i64::MAX];
        assert_eq!(arg(&args, 0), 7);
        assert_eq!(arg(&args, 1), -1);
        assert_eq!(arg(&args, 5), 0);
        assert_eq!(gas_arg(&args, 1), 0);
        assert_eq!(gas_arg(&args, 2), i64::MAX as u64);
        assert_eq!(flag(true), 1);
    }
}
