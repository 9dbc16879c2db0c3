//! vmhost Types - Core type definitions for the vmhost execution host.
//!
//! This crate provides the types shared by the host and its embedders:
//! - Addresses (32-byte, contract addresses marked by a zero prefix)
//! - Accounts and code metadata
//! - Call and deployment inputs, call data encoding
//! - Execution output, logs and return codes

pub mod address;
pub mod account;
pub mod call;
pub mod output;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use account::{Account, CodeMetadata};
pub use call::{CallData, CallType, ContractCallInput, ContractCreateInput};
pub use output::{LogEntry, OutputAccount, OutputTransfer, ReturnCode, VmOutput};
pub use error::TypesError;

pub use num_bigint::{BigInt, BigUint};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Account, Address, BigInt, BigUint, CallData, CallType, CodeMetadata,
        ContractCallInput, ContractCreateInput, LogEntry, OutputAccount,
        OutputTransfer, ReturnCode, TypesError, VmOutput,
    };
}
