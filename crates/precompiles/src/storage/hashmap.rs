use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use alloy_primitives::{Address, B256, Bytes, LogData, U256};

use crate::{
    callback::{HeaderSink, execute_sink_call},
    config::DEFAULT_RETENTION_WINDOW,
    error::{HeaderRelayPrecompileError, Result},
    storage::{BlockHashOracle, CallOutcome, JournalCheckpoint, PrecompileStorageProvider},
};

#[derive(Debug)]
enum JournalEntry {
    Storage {
        address: Address,
        key: U256,
        previous: Option<U256>,
    },
    Transient {
        address: Address,
        key: U256,
        previous: Option<U256>,
    },
    Balance {
        address: Address,
        previous: U256,
    },
    Log {
        address: Address,
    },
}

/// In-memory host: journaled storage, balances, logs, a bounded block hash window and a set
/// of registered sink contracts.
pub struct HashMapStorageProvider {
    internals: HashMap<(Address, U256), U256>,
    transient: HashMap<(Address, U256), U256>,
    balances: HashMap<Address, U256>,
    rejects_payments: HashSet<Address>,
    sinks: HashMap<Address, Rc<dyn HeaderSink>>,
    block_hashes: HashMap<u64, B256>,
    block_number: u64,
    retention_window: u64,
    journal: Vec<JournalEntry>,
    pub events: HashMap<Address, Vec<LogData>>,
}

impl std::fmt::Debug for HashMapStorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashMapStorageProvider")
            .field("block_number", &self.block_number)
            .field("retention_window", &self.retention_window)
            .field("slots", &self.internals.len())
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .field("journal", &self.journal.len())
            .finish_non_exhaustive()
    }
}

impl Default for HashMapStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HashMapStorageProvider {
    pub fn new() -> Self {
        Self {
            internals: HashMap::new(),
            transient: HashMap::new(),
            balances: HashMap::new(),
            rejects_payments: HashSet::new(),
            sinks: HashMap::new(),
            block_hashes: HashMap::new(),
            block_number: 1,
            retention_window: DEFAULT_RETENTION_WINDOW,
            journal: Vec::new(),
            events: HashMap::new(),
        }
    }

    pub fn with_retention_window(mut self, retention_window: u64) -> Self {
        self.retention_window = retention_window;
        self
    }

    pub fn set_block_number(&mut self, block_number: u64) {
        self.block_number = block_number;
    }

    pub fn advance_blocks(&mut self, blocks: u64) {
        self.block_number += blocks;
    }

    /// Records the canonical hash of `block_number`. The oracle only serves it while the
    /// block is inside the retention window.
    pub fn set_block_hash(&mut self, block_number: u64, hash: B256) {
        self.block_hashes.insert(block_number, hash);
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.balances.insert(address, balance);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    /// Makes every future payment to `address` fail, like a contract whose receive reverts.
    pub fn reject_payments(&mut self, address: Address) {
        self.rejects_payments.insert(address);
    }

    /// Deploys `sink` at `address`. Calls to that address, nested ones included, run it.
    pub fn register_sink(&mut self, address: Address, sink: Box<dyn HeaderSink>) {
        self.sinks.insert(address, Rc::from(sink));
    }

    pub fn events(&self, address: Address) -> &[LogData] {
        self.events.get(&address).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ends the current transaction: transient storage is cleared and the journal dropped.
    pub fn end_transaction(&mut self) {
        self.transient.clear();
        self.journal.clear();
    }

    fn write_balance(&mut self, address: Address, balance: U256) {
        let previous = self.balance_of(address);
        self.journal.push(JournalEntry::Balance { address, previous });
        self.balances.insert(address, balance);
    }
}

impl BlockHashOracle for HashMapStorageProvider {
    fn current_block_number(&self) -> u64 {
        self.block_number
    }

    fn hash_of(&self, block_number: u64) -> Option<B256> {
        if block_number >= self.block_number
            || self.block_number - block_number > self.retention_window
        {
            return None;
        }
        self.block_hashes.get(&block_number).copied()
    }
}

impl PrecompileStorageProvider for HashMapStorageProvider {
    fn sstore(&mut self, address: Address, key: U256, value: U256) -> Result<()> {
        let previous = self.internals.insert((address, key), value);
        self.journal.push(JournalEntry::Storage {
            address,
            key,
            previous,
        });
        Ok(())
    }

    fn sload(&mut self, address: Address, key: U256) -> Result<U256> {
        Ok(self
            .internals
            .get(&(address, key))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn tstore(&mut self, address: Address, key: U256, value: U256) -> Result<()> {
        let previous = self.transient.insert((address, key), value);
        self.journal.push(JournalEntry::Transient {
            address,
            key,
            previous,
        });
        Ok(())
    }

    fn tload(&mut self, address: Address, key: U256) -> Result<U256> {
        Ok(self
            .transient
            .get(&(address, key))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn emit_event(&mut self, address: Address, event: LogData) -> Result<()> {
        self.events.entry(address).or_default().push(event);
        self.journal.push(JournalEntry::Log { address });
        Ok(())
    }

    fn balance(&mut self, address: Address) -> Result<U256> {
        Ok(self.balance_of(address))
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<bool> {
        if self.rejects_payments.contains(&to) {
            return Ok(false);
        }

        let from_balance = self.balance_of(from);
        let remaining = from_balance.checked_sub(amount).ok_or_else(|| {
            HeaderRelayPrecompileError::Fatal(format!(
                "insufficient balance: {from} holds {from_balance}, needs {amount}"
            ))
        })?;

        self.write_balance(from, remaining);
        let to_balance = self.balance_of(to);
        self.write_balance(to, to_balance + amount);
        Ok(true)
    }

    fn call(
        &mut self,
        caller: Address,
        target: Address,
        input: Bytes,
        gas_limit: u64,
    ) -> Result<CallOutcome> {
        // An address without a sink behaves like an account without code.
        let Some(sink) = self.sinks.get(&target).cloned() else {
            return Ok(CallOutcome::success(0));
        };

        let checkpoint = self.checkpoint();
        let outcome = execute_sink_call(sink.as_ref(), self, caller, &input, gas_limit);
        if outcome.success {
            self.checkpoint_commit(checkpoint);
        } else {
            self.checkpoint_revert(checkpoint);
        }
        Ok(outcome)
    }

    fn checkpoint(&mut self) -> JournalCheckpoint {
        JournalCheckpoint(self.journal.len())
    }

    fn checkpoint_commit(&mut self, _checkpoint: JournalCheckpoint) {}

    fn checkpoint_revert(&mut self, checkpoint: JournalCheckpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Storage {
                    address,
                    key,
                    previous,
                } => match previous {
                    Some(value) => {
                        self.internals.insert((address, key), value);
                    }
                    None => {
                        self.internals.remove(&(address, key));
                    }
                },
                JournalEntry::Transient {
                    address,
                    key,
                    previous,
                } => match previous {
                    Some(value) => {
                        self.transient.insert((address, key), value);
                    }
                    None => {
                        self.transient.remove(&(address, key));
                    }
                },
                JournalEntry::Balance { address, previous } => {
                    self.balances.insert(address, previous);
                }
                JournalEntry::Log { address } => {
                    if let Some(logs) = self.events.get_mut(&address) {
                        logs.pop();
                    }
                }
            }
        }
    }
}
