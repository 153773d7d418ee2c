pub mod hashmap;
pub mod layout;
pub mod slots;

pub use layout::{Mapping, Slot, Storable, StorageKey};

use alloy_primitives::{Address, B256, Bytes, LogData, U256};

use crate::error::Result;

/// Source of trusted block hashes.
///
/// Hashes are only served for a bounded window of recent blocks; anything older, the current
/// block, or a future block yields `None`.
pub trait BlockHashOracle {
    fn current_block_number(&self) -> u64;
    fn hash_of(&self, block_number: u64) -> Option<B256>;
}

/// Outcome of an outbound call made through the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub gas_used: u64,
    pub output: Bytes,
}

impl CallOutcome {
    pub fn success(gas_used: u64) -> Self {
        Self {
            success: true,
            gas_used,
            output: Bytes::new(),
        }
    }

    pub fn failure(gas_used: u64, output: Bytes) -> Self {
        Self {
            success: false,
            gas_used,
            output,
        }
    }
}

/// Opaque marker into the host's state journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JournalCheckpoint(pub usize);

/// Host environment the relay runs against.
///
/// Every state change made through this trait is journaled: reverting a checkpoint undoes
/// storage writes, transient writes, balance movements and emitted logs made since it was
/// taken.
pub trait PrecompileStorageProvider: BlockHashOracle {
    fn sstore(&mut self, address: Address, key: U256, value: U256) -> Result<()>;
    fn sload(&mut self, address: Address, key: U256) -> Result<U256>;
    fn tstore(&mut self, address: Address, key: U256, value: U256) -> Result<()>;
    fn tload(&mut self, address: Address, key: U256) -> Result<U256>;
    fn emit_event(&mut self, address: Address, event: LogData) -> Result<()>;

    fn balance(&mut self, address: Address) -> Result<U256>;
    /// Moves `amount` from `from` to `to`. Returns `false` when the recipient refuses the
    /// payment; an underfunded sender is a fatal error.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<bool>;
    /// Calls `target` with `input` and no value, bounded by `gas_limit`.
    fn call(
        &mut self,
        caller: Address,
        target: Address,
        input: Bytes,
        gas_limit: u64,
    ) -> Result<CallOutcome>;

    fn checkpoint(&mut self) -> JournalCheckpoint;
    fn checkpoint_commit(&mut self, checkpoint: JournalCheckpoint);
    fn checkpoint_revert(&mut self, checkpoint: JournalCheckpoint);
}

/// Storage access scoped to a single contract address.
pub trait StorageOps {
    fn sstore(&mut self, slot: U256, value: U256) -> Result<()>;
    fn sload(&mut self, slot: U256) -> Result<U256>;
    fn tstore(&mut self, slot: U256, value: U256) -> Result<()>;
    fn tload(&mut self, slot: U256) -> Result<U256>;
}
