use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 32-byte account address.
///
/// Smart contract addresses start with [`Address::SC_PREFIX_LEN`] zero bytes,
/// followed by two VM type bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const ZERO: Self = Self([0u8; 32]);
    pub const LEN: usize = 32;

    /// Number of leading zero bytes that mark a contract address
    pub const SC_PREFIX_LEN: usize = 8;

    /// VM type written after the contract prefix
    pub const VM_TYPE: [u8; 2] = [0x0F, 0x0F];

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from a byte slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Contract address with a readable name, padded with '.'.
    ///
    /// `Address::contract_from_name("parentSC")` yields
    /// `00 * 8 | 0F 0F | "parentSC......................"`.
    pub fn contract_from_name(name: &str) -> Self {
        let mut bytes = [b'.'; 32];
        bytes[..Self::SC_PREFIX_LEN].fill(0);
        bytes[Self::SC_PREFIX_LEN..Self::SC_PREFIX_LEN + 2].copy_from_slice(&Self::VM_TYPE);
        let start = Self::SC_PREFIX_LEN + 2;
        let name = name.as_bytes();
        let len = name.len().min(Self::LEN - start);
        bytes[start..start + len].copy_from_slice(&name[..len]);
        Self(bytes)
    }

    /// User (non-contract) address with a readable name, padded with '.'.
    pub fn user_from_name(name: &str) -> Self {
        let mut bytes = [b'.'; 32];
        let name = name.as_bytes();
        let len = name.len().min(Self::LEN);
        bytes[..len].copy_from_slice(&name[..len]);
        Self(bytes)
    }

    /// Derive the address of a contract deployed by `creator` at `nonce`.
    pub fn new_contract_address(creator: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&creator.0);
        hasher.update(&nonce.to_le_bytes());
        let hash = hasher.finalize();

        let mut bytes = *hash.as_bytes();
        bytes[..Self::SC_PREFIX_LEN].fill(0);
        bytes[Self::SC_PREFIX_LEN..Self::SC_PREFIX_LEN + 2].copy_from_slice(&Self::VM_TYPE);
        Self(bytes)
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Check if this address designates a smart contract
    pub fn is_smart_contract(&self) -> bool {
        self.0[..Self::SC_PREFIX_LEN].iter().all(|&b| b == 0) && !self.is_zero()
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| TypesError::InvalidAddressFormat(s.to_string()))?;
        let bytes = hex::decode(digits)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
