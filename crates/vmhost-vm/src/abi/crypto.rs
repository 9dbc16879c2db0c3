use super::{arg, load, store, HostFunction, I};
use crate::error::VmError;
use crate::executor::Host;

pub(super) const FUNCTIONS: &[HostFunction] = &[
    HostFunction::shared("sha256", &[I, I, I], Some(I), sha256),
    HostFunction::shared("keccak256", &[I, I, I], Some(I), keccak256),
    HostFunction::shared("managedSha256", &[I, I], Some(I), managed_sha256),
    HostFunction::shared("managedKeccak256", &[I, I], Some(I), managed_keccak256),
];

handle_op!(managed_sha256 => managed_sha256(0, 1));
handle_op!(managed_keccak256 => managed_keccak256(0, 1));

fn sha256(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = load(host, arg(args, 0), arg(args, 1))?;
    let hash = host.runtime().sha256(&data)?;
    store(host, arg(args, 2), &hash)?;
    Ok(0)
}

fn keccak256(host: &mut dyn Host, args: &[i64]) -> Result<i64, VmError> {
    let data = load(host, arg(args, 0), arg(args, 1))?;
    let hash = host.runtime().keccak256(&data)?;
    store(host, arg(args, 2), &hash)?;
    Ok(0)
}
