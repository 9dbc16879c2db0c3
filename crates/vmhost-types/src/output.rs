use crate::account::CodeMetadata;
use crate::address::Address;
use crate::call::CallType;
use crate::error::TypesError;
use num_bigint::{BigInt, BigUint};
use std::collections::BTreeMap;

/// Outcome of an execution, numeric on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ReturnCode {
    #[default]
    #[display(fmt = "ok")]
    Ok = 0,
    #[display(fmt = "function not found")]
    FunctionNotFound = 1,
    #[display(fmt = "wrong signature for function")]
    FunctionWrongSignature = 2,
    #[display(fmt = "contract not found")]
    ContractNotFound = 3,
    #[display(fmt = "user error")]
    UserError = 4,
    #[display(fmt = "out of gas")]
    OutOfGas = 5,
    #[display(fmt = "account collision")]
    AccountCollision = 6,
    #[display(fmt = "out of funds")]
    OutOfFunds = 7,
    #[display(fmt = "call stack overflow")]
    CallStackOverFlow = 8,
    #[display(fmt = "contract invalid")]
    ContractInvalid = 9,
    #[display(fmt = "execution failed")]
    ExecutionFailed = 10,
    #[display(fmt = "upgrade failed")]
    UpgradeFailed = 11,
}

impl ReturnCode {
    pub fn is_ok(&self) -> bool {
        *self == ReturnCode::Ok
    }

    /// Minimal big-endian encoding, as passed to error callbacks.
    pub fn to_bytes(&self) -> Vec<u8> {
        BigUint::from(*self as u8).to_bytes_be()
    }
}

impl TryFrom<u64> for ReturnCode {
    type Error = TypesError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ReturnCode::Ok,
            1 => ReturnCode::FunctionNotFound,
            2 => ReturnCode::FunctionWrongSignature,
            3 => ReturnCode::ContractNotFound,
            4 => ReturnCode::UserError,
            5 => ReturnCode::OutOfGas,
            6 => ReturnCode::AccountCollision,
            7 => ReturnCode::OutOfFunds,
            8 => ReturnCode::CallStackOverFlow,
            9 => ReturnCode::ContractInvalid,
            10 => ReturnCode::ExecutionFailed,
            11 => ReturnCode::UpgradeFailed,
            other => return Err(TypesError::UnknownReturnCode(other)),
        })
    }
}

/// A single log entry (event).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogEntry {
    /// Contract address that emitted the log
    pub address: Address,
    /// Event identifier (first topic)
    pub identifier: Vec<u8>,
    /// Remaining topics
    pub topics: Vec<Vec<u8>>,
    /// Non-indexed data
    pub data: Vec<u8>,
}

/// Value moved to an account during execution.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputTransfer {
    pub sender: Address,
    pub value: BigUint,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub call_type: CallType,
}

/// Pending changes to one account.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OutputAccount {
    pub address: Address,
    /// New nonce, when changed
    pub nonce: Option<u64>,
    /// Signed change to the balance
    pub balance_delta: BigInt,
    /// New code, when deployed or upgraded
    pub code: Option<Vec<u8>>,
    pub code_metadata: Option<CodeMetadata>,
    pub owner: Option<Address>,
    /// Written keys; an empty value deletes the key
    pub storage_updates: BTreeMap<Vec<u8>, Vec<u8>>,
    pub output_transfers: Vec<OutputTransfer>,
}

impl OutputAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// Result of running a transaction through the host.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VmOutput {
    pub return_code: ReturnCode,
    pub return_message: String,
    pub return_data: Vec<Vec<u8>>,
    pub gas_remaining: u64,
    pub gas_refund: u64,
    pub output_accounts: BTreeMap<Address, OutputAccount>,
    pub logs: Vec<LogEntry>,
}

impl VmOutput {
    /// Output of a transaction rejected before or during execution.
    pub fn failure(return_code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            return_code,
            return_message: message.into(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.return_code.is_ok()
    }

    pub fn account(&self, address: &Address) -> Option<&OutputAccount> {
        self.output_accounts.get(address)
    }

    /// Value written to `key` of `address` in this output, if any.
    pub fn storage_update(&self, address: &Address, key: &[u8]) -> Option<&[u8]> {
        self.output_accounts
            .get(address)
            .and_then(|account| account.storage_updates.get(key))
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_roundtrip() {
        for code in 0u64..=11 {
            let rc = ReturnCode::try_from(code).unwrap();
            assert_eq!(rc as u64, code);
        }
        assert!(ReturnCode::try_from(12).is_err());
    }

    #[test]
    fn test_return_code_bytes() {
        assert_eq!(ReturnCode::UserError.to_bytes(), vec![4]);
        assert_eq!(ReturnCode::Ok.to_bytes(), Vec::<u8>::new());
    }

    #[test]
    fn test_return_code_display() {
        assert_eq!(ReturnCode::OutOfGas.to_string(), "out of gas");
    }

    #[test]
    fn test_vm_output_failure() {
        let output = VmOutput::failure(ReturnCode::UserError, "boom");
        assert!(!output.is_ok());
        assert_eq!(output.return_message, "boom");
        assert!(output.output_accounts.is_empty());
    }

    #[test]
    fn test_storage_update_lookup() {
        let address = Address::contract_from_name("sc");
        let mut account = OutputAccount::new(address);
        account.storage_updates.insert(b"key".to_vec(), b"value".to_vec());

        let mut output = VmOutput::default();
        output.output_accounts.insert(address, account);

        assert_eq!(output.storage_update(&address, b"key"), Some(&b"value"[..]));
        assert_eq!(output.storage_update(&address, b"other"), None);
    }
}
