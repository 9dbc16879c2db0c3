use thiserror::Error;

/// Errors that can occur in type operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid address length: expected 32, got {0}")]
    InvalidAddressLength(usize),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid code metadata length: expected 2, got {0}")]
    InvalidCodeMetadataLength(usize),

    #[error("Invalid call data: {0}")]
    InvalidCallData(String),

    #[error("Unknown return code: {0}")]
    UnknownReturnCode(u64),
}

impl From<hex::FromHexError> for TypesError {
    fn from(e: hex::FromHexError) -> Self {
        TypesError::InvalidHex(e.to_string())
    }
}
