use crate::account::CodeMetadata;
use crate::address::Address;
use crate::error::TypesError;
use num_bigint::BigUint;

/// How a call reached the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallType {
    /// Transaction or synchronous nested call
    #[default]
    #[display(fmt = "DirectCall")]
    DirectCall,
    /// Destination side of an async call
    #[display(fmt = "AsynchronousCall")]
    AsynchronousCall,
    /// Callback of an async call
    #[display(fmt = "AsynchronousCallBack")]
    AsynchronousCallBack,
}

/// Input of a contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractCallInput {
    pub caller: Address,
    pub recipient: Address,
    pub call_value: BigUint,
    pub function: String,
    pub arguments: Vec<Vec<u8>>,
    pub gas_provided: u64,
    pub call_type: CallType,
}

impl ContractCallInput {
    pub fn new(caller: Address, recipient: Address, function: impl Into<String>, gas_provided: u64) -> Self {
        Self {
            caller,
            recipient,
            call_value: BigUint::default(),
            function: function.into(),
            arguments: Vec::new(),
            gas_provided,
            call_type: CallType::DirectCall,
        }
    }

    /// Set call value.
    pub fn with_value(mut self, value: impl Into<BigUint>) -> Self {
        self.call_value = value.into();
        self
    }

    /// Append one argument.
    pub fn with_argument(mut self, argument: impl AsRef<[u8]>) -> Self {
        self.arguments.push(argument.as_ref().to_vec());
        self
    }

    /// Replace all arguments.
    pub fn with_arguments(mut self, arguments: Vec<Vec<u8>>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }
}

/// Input of a contract deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractCreateInput {
    pub caller: Address,
    pub call_value: BigUint,
    pub code: Vec<u8>,
    pub code_metadata: CodeMetadata,
    pub arguments: Vec<Vec<u8>>,
    pub gas_provided: u64,
}

impl ContractCreateInput {
    pub fn new(caller: Address, code: Vec<u8>, gas_provided: u64) -> Self {
        Self {
            caller,
            call_value: BigUint::default(),
            code,
            code_metadata: CodeMetadata::upgradeable(),
            arguments: Vec::new(),
            gas_provided,
        }
    }

    pub fn with_value(mut self, value: impl Into<BigUint>) -> Self {
        self.call_value = value.into();
        self
    }

    pub fn with_argument(mut self, argument: impl AsRef<[u8]>) -> Self {
        self.arguments.push(argument.as_ref().to_vec());
        self
    }

    pub fn with_code_metadata(mut self, metadata: CodeMetadata) -> Self {
        self.code_metadata = metadata;
        self
    }
}

/// Call data in the `function@hexarg@hexarg` format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallData {
    pub function: String,
    pub arguments: Vec<Vec<u8>>,
}

impl CallData {
    pub const SEPARATOR: u8 = b'@';

    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: impl AsRef<[u8]>) -> Self {
        self.arguments.push(argument.as_ref().to_vec());
        self
    }

    /// Parse raw call data.
    pub fn parse(data: &[u8]) -> Result<Self, TypesError> {
        let mut parts = data.split(|&b| b == Self::SEPARATOR);
        let function = parts.next().unwrap_or_default();
        if function.is_empty() {
            return Err(TypesError::InvalidCallData("missing function name".to_string()));
        }
        let function = std::str::from_utf8(function)
            .map_err(|e| TypesError::InvalidCallData(e.to_string()))?
            .to_string();

        let arguments = parts.map(hex::decode).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { function, arguments })
    }

    /// Encode back to raw call data.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = self.function.as_bytes().to_vec();
        for argument in &self.arguments {
            data.push(Self::SEPARATOR);
            data.extend_from_slice(hex::encode(argument).as_bytes());
        }
        data
    }
}
