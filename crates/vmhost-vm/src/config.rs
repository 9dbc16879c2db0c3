//! Host configuration.
//!
//! Handles loading and validation of the execution host configuration
//! from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::gas_metering::GasSchedule;
use crate::{MAX_CALL_DEPTH, MAX_CODE_SIZE, MAX_MEMORY_PAGES};

/// Execution host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Maximum depth of nested call contexts
    pub max_call_depth: usize,
    /// Maximum contract code size in bytes
    pub max_code_size: usize,
    /// Maximum linear memory per instance, in 64 KiB pages
    pub max_memory_pages: u32,
    /// Native stack available to WASM code, in bytes
    pub max_wasm_stack_bytes: usize,
    /// Stack of the thread each transaction runs on, in bytes
    pub execution_stack_bytes: usize,
    /// Host API costs
    pub gas_schedule: GasSchedule,
    /// Enabled ABI generations
    pub abi: AbiConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_call_depth: MAX_CALL_DEPTH,
            max_code_size: MAX_CODE_SIZE,
            max_memory_pages: MAX_MEMORY_PAGES,
            max_wasm_stack_bytes: 512 * 1024 * 1024,
            execution_stack_bytes: 1024 * 1024 * 1024,
            gas_schedule: GasSchedule::default(),
            abi: AbiConfig::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_call_depth == 0 {
            anyhow::bail!("max_call_depth cannot be 0");
        }

        if self.max_code_size == 0 {
            anyhow::bail!("max_code_size cannot be 0");
        }

        if self.max_memory_pages == 0 || self.max_memory_pages > 65_536 {
            anyhow::bail!("max_memory_pages must be between 1 and 65536");
        }

        if self.max_wasm_stack_bytes >= self.execution_stack_bytes {
            anyhow::bail!("max_wasm_stack_bytes must be smaller than execution_stack_bytes");
        }

        if !self.abi.legacy && !self.abi.current {
            anyhow::bail!("at least one ABI generation must be enabled");
        }

        Ok(())
    }

    /// Set maximum call depth.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set gas schedule.
    pub fn with_gas_schedule(mut self, schedule: GasSchedule) -> Self {
        self.gas_schedule = schedule;
        self
    }
}

/// ABI generations a module may import from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbiConfig {
    /// Implicit 32-byte keys (older contracts)
    pub legacy: bool,
    /// Explicit key and buffer lengths
    pub current: bool,
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self {
            legacy: true,
            current: true,
        }
    }
}
