//! Hash functions exposed to contracts.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::error::VmError;
use crate::runtime::Runtime;

pub const HASH_LEN: usize = 32;

fn to_array(digest: &[u8]) -> [u8; HASH_LEN] {
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(digest);
    hash
}

impl Runtime {
    fn charge_hash(&mut self, base: u64, len: usize) -> Result<(), VmError> {
        let per_byte = self.schedule().hash_per_byte;
        self.gas().charge_with_bytes(base, per_byte, len)
    }

    pub fn sha256(&mut self, data: &[u8]) -> Result<[u8; HASH_LEN], VmError> {
        let cost = self.schedule().sha256;
        self.charge_hash(cost, data.len())?;
        Ok(to_array(&Sha256::digest(data)))
    }

    pub fn keccak256(&mut self, data: &[u8]) -> Result<[u8; HASH_LEN], VmError> {
        let cost = self.schedule().keccak256;
        self.charge_hash(cost, data.len())?;
        Ok(to_array(&Keccak256::digest(data)))
    }

    pub fn managed_sha256(&mut self, input: i32, output: i32) -> Result<(), VmError> {
        let data = self.managed()?.buffer(input)?.to_vec();
        let hash = self.sha256(&data)?;
        self.managed()?.set_buffer(output, hash.to_vec())
    }

    pub fn managed_keccak256(&mut self, input: i32, output: i32) -> Result<(), VmError> {
        let data = self.managed()?.buffer(input)?.to_vec();
        let hash = self.keccak256(&data)?;
        self.managed()?.set_buffer(output, hash.to_vec())
    }
}
