//! Pending effects of a transaction.
//!
//! Everything a transaction changes is accumulated here: storage writes,
//! balance deltas, deployed code, transfers, logs and the global
//! return-data log. Destination-context calls take a snapshot on entry and
//! restore it when they fail.

use num_bigint::{BigInt, BigUint};
use std::collections::BTreeMap;

use vmhost_types::{Address, CallType, LogEntry, OutputAccount, OutputTransfer};

#[derive(Debug, Clone, Default)]
struct OutputState {
    accounts: BTreeMap<Address, OutputAccount>,
    return_data: Vec<Vec<u8>>,
    logs: Vec<LogEntry>,
}

/// Accumulated output of the running transaction.
#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    state: OutputState,
    snapshots: Vec<OutputState>,
}

impl OutputContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending changes for `address`, created on first use.
    pub fn account_mut(&mut self, address: &Address) -> &mut OutputAccount {
        self.state
            .accounts
            .entry(*address)
            .or_insert_with(|| OutputAccount::new(*address))
    }

    pub fn account(&self, address: &Address) -> Option<&OutputAccount> {
        self.state.accounts.get(address)
    }

    /// Pending value of a storage key, if it was written.
    pub fn storage_update(&self, address: &Address, key: &[u8]) -> Option<&[u8]> {
        self.state
            .accounts
            .get(address)
            .and_then(|account| account.storage_updates.get(key))
            .map(Vec::as_slice)
    }

    pub fn set_storage(&mut self, address: &Address, key: &[u8], value: &[u8]) {
        self.account_mut(address)
            .storage_updates
            .insert(key.to_vec(), value.to_vec());
    }

    pub fn balance_delta(&self, address: &Address) -> BigInt {
        self.state
            .accounts
            .get(address)
            .map(|account| account.balance_delta.clone())
            .unwrap_or_default()
    }

    /// Move value between accounts and record the transfer at the receiver.
    pub fn transfer(
        &mut self,
        sender: &Address,
        destination: &Address,
        value: &BigUint,
        data: &[u8],
        gas_limit: u64,
        call_type: CallType,
    ) {
        let amount = BigInt::from(value.clone());
        self.account_mut(sender).balance_delta -= &amount;

        let receiver = self.account_mut(destination);
        receiver.balance_delta += &amount;
        receiver.output_transfers.push(OutputTransfer {
            sender: *sender,
            value: value.clone(),
            data: data.to_vec(),
            gas_limit,
            call_type,
        });
    }

    pub fn finish(&mut self, data: Vec<u8>) {
        self.state.return_data.push(data);
    }

    pub fn return_data(&self) -> &[Vec<u8>] {
        &self.state.return_data
    }

    pub fn clean_return_data(&mut self) {
        self.state.return_data.clear();
    }

    /// Remove one entry; later entries shift down. Out-of-range indices are
    /// ignored.
    pub fn delete_return_data(&mut self, index: usize) {
        if index < self.state.return_data.len() {
            self.state.return_data.remove(index);
        }
    }

    /// Take every entry from `start` onwards out of the log.
    pub fn take_return_data_from(&mut self, start: usize) -> Vec<Vec<u8>> {
        if start >= self.state.return_data.len() {
            return Vec::new();
        }
        self.state.return_data.split_off(start)
    }

    pub fn add_log(&mut self, entry: LogEntry) {
        self.state.logs.push(entry);
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.state.logs
    }

    /// Remember the current state so a failing nested call can be undone.
    pub fn push_snapshot(&mut self) {
        self.snapshots.push(self.state.clone());
    }

    /// Undo everything since the last snapshot.
    pub fn restore_snapshot(&mut self) {
        if let Some(previous) = self.snapshots.pop() {
            self.state = previous;
        }
    }

    /// Keep everything since the last snapshot.
    pub fn discard_snapshot(&mut self) {
        self.snapshots.pop();
    }

    pub fn snapshot_depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Split into accounts, return data and logs.
    pub fn into_parts(self) -> (BTreeMap<Address, OutputAccount>, Vec<Vec<u8>>, Vec<LogEntry>) {
        (self.state.accounts, self.state.return_data, self.state.logs)
    }
}
