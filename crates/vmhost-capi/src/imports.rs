//! Import table supplied by the embedder.

use std::collections::BTreeMap;
use std::os::raw::c_void;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use vmhost_vm::abi::IMPORT_MODULE;
use vmhost_vm::{registry, AbiConfig, AbiGeneration, ValueType};

use crate::error::CapiError;

pub type RawImportFn = unsafe extern "C" fn(data: *mut c_void);

/// Host function handed over by the embedder, before it is bound to a name.
#[derive(Debug, Clone)]
pub struct ImportFunc {
    pub func: RawImportFn,
    pub params: Vec<ValueType>,
    pub result: Option<ValueType>,
}

impl ImportFunc {
    pub fn new(func: RawImportFn, params: Vec<ValueType>, mut returns: Vec<ValueType>) -> Result<Self, CapiError> {
        if returns.len() > 1 {
            return Err(CapiError::TooManyReturns(returns.len()));
        }
        Ok(Self {
            func,
            params,
            result: returns.pop(),
        })
    }
}

/// A validated import, keyed by name and arity in the table.
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub name: String,
    pub func: RawImportFn,
    pub params: Vec<ValueType>,
    pub result: Option<ValueType>,
    pub generation: AbiGeneration,
}

static IMPORTS: Lazy<RwLock<BTreeMap<(String, usize), ImportEntry>>> = Lazy::new(Default::default);

/// Check an import against the host function registry.
pub fn bind(module: &str, name: &str, func: &ImportFunc) -> Result<ImportEntry, CapiError> {
    if module != IMPORT_MODULE {
        return Err(CapiError::UnknownModule(module.to_string()));
    }
    let function = registry().resolve(name, &func.params, func.result, &AbiConfig::default())?;
    Ok(ImportEntry {
        name: name.to_string(),
        func: func.func,
        params: func.params.clone(),
        result: func.result,
        generation: function.generation,
    })
}

/// Replace the whole table.
pub fn install(entries: Vec<ImportEntry>) {
    let table = entries
        .into_iter()
        .map(|entry| ((entry.name.clone(), entry.params.len()), entry))
        .collect::<BTreeMap<_, _>>();
    tracing::info!(imports = table.len(), "import table installed");
    *IMPORTS.write() = table;
}

pub fn lookup(name: &str, arity: usize) -> Option<ImportEntry> {
    IMPORTS.read().get(&(name.to_string(), arity)).cloned()
}

pub fn imports() -> Vec<ImportEntry> {
    IMPORTS.read().values().cloned().collect()
}
