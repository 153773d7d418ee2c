//! Durable block hash commitments.
//!
//! The host only knows the hashes of its most recent blocks. Committing copies a hash into
//! relay storage while it is still available, so headers of that block stay verifiable after
//! the host has forgotten it.

use alloy_primitives::{Address, B256, IntoLogData, U256};
use header_relay_contracts::precompiles::{HeaderRelayEvent, IHeaderRelay};
use tracing::debug;

use crate::{
    error::Result,
    header_relay::slots,
    storage::{Mapping, PrecompileStorageProvider, StorageOps},
};

/// First-write-wins mapping from block number to block hash, layered over the host oracle.
pub struct CommitmentStore<'a, S: PrecompileStorageProvider + ?Sized> {
    address: Address,
    storage: &'a mut S,
    commitments: Mapping<u64, B256>,
}

impl<S: PrecompileStorageProvider + ?Sized> std::fmt::Debug for CommitmentStore<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitmentStore")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl<'a, S: PrecompileStorageProvider + ?Sized> CommitmentStore<'a, S> {
    pub fn new(address: Address, storage: &'a mut S) -> Self {
        Self {
            address,
            storage,
            commitments: Mapping::new(slots::COMMITMENTS),
        }
    }

    /// Stores the oracle's current hash for `block_number`.
    ///
    /// Returns `false` without touching storage when a commitment already exists or the oracle
    /// has no (or a zero) hash for the block.
    pub fn commit(&mut self, block_number: u64) -> Result<bool> {
        if self.committed(block_number)?.is_some() {
            return Ok(false);
        }

        let Some(hash) = self.storage.hash_of(block_number).filter(|hash| !hash.is_zero())
        else {
            return Ok(false);
        };

        let commitments = self.commitments;
        commitments.write(self, &block_number, hash)?;
        self.storage.emit_event(
            self.address,
            HeaderRelayEvent::BlockHashCommitted(IHeaderRelay::BlockHashCommitted {
                blockNumber: block_number,
                blockHash: hash,
            })
            .into_log_data(),
        )?;

        debug!(block_number, %hash, "block hash committed");
        Ok(true)
    }

    /// Commits every block in `block_numbers`, returning how many new commitments were written.
    pub fn commit_many(&mut self, block_numbers: &[u64]) -> Result<usize> {
        let mut committed = 0;
        for &block_number in block_numbers {
            if self.commit(block_number)? {
                committed += 1;
            }
        }
        Ok(committed)
    }

    /// The stored commitment for `block_number`, if any.
    pub fn committed(&mut self, block_number: u64) -> Result<Option<B256>> {
        let commitments = self.commitments;
        let hash = commitments.read(self, &block_number)?;
        Ok((!hash.is_zero()).then_some(hash))
    }

    /// Committed hash, falling back to the oracle's live answer. A zero hash counts as
    /// unavailable.
    pub fn get(&mut self, block_number: u64) -> Result<Option<B256>> {
        if let Some(hash) = self.committed(block_number)? {
            return Ok(Some(hash));
        }
        Ok(self.storage.hash_of(block_number).filter(|hash| !hash.is_zero()))
    }
}

impl<S: PrecompileStorageProvider + ?Sized> StorageOps for CommitmentStore<'_, S> {
    fn sstore(&mut self, slot: U256, value: U256) -> Result<()> {
        self.storage.sstore(self.address, slot, value)
    }

    fn sload(&mut self, slot: U256) -> Result<U256> {
        self.storage.sload(self.address, slot)
    }

    fn tstore(&mut self, slot: U256, value: U256) -> Result<()> {
        self.storage.tstore(self.address, slot, value)
    }

    fn tload(&mut self, slot: U256) -> Result<U256> {
        self.storage.tload(self.address, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        HEADER_RELAY_ADDRESS,
        storage::{BlockHashOracle, hashmap::HashMapStorageProvider},
    };
    use alloy_primitives::{b256, keccak256};
    use alloy_sol_types::SolEvent;

    const HASH_100: B256 =
        b256!("0x1111111111111111111111111111111111111111111111111111111111111111");

    fn host_at(current: u64) -> HashMapStorageProvider {
        let mut storage = HashMapStorageProvider::new();
        storage.set_block_number(current);
        storage.set_block_hash(100, HASH_100);
        storage
    }

    #[test]
    fn test_commit_stores_oracle_hash_once() -> eyre::Result<()> {
        let mut storage = host_at(150);
        let mut store = CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage);

        assert!(store.commit(100)?);
        assert!(!store.commit(100)?);
        assert_eq!(store.committed(100)?, Some(HASH_100));

        let events = storage.events(HEADER_RELAY_ADDRESS);
        assert_eq!(events.len(), 1);
        let event = IHeaderRelay::BlockHashCommitted::decode_log_data(&events[0])?;
        assert_eq!(event.blockNumber, 100);
        assert_eq!(event.blockHash, HASH_100);
        Ok(())
    }

    #[test]
    fn test_commit_without_oracle_hash_is_noop() -> eyre::Result<()> {
        // current block, future block, unknown block and lapsed block
        for (current, block) in [(100, 100), (50, 100), (150, 120), (400, 100)] {
            let mut storage = host_at(current);
            let mut store = CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage);

            assert!(!store.commit(block)?);
            assert_eq!(store.committed(block)?, None);
            assert!(storage.events(HEADER_RELAY_ADDRESS).is_empty());
        }
        Ok(())
    }

    #[test]
    fn test_zero_hash_is_never_stored() -> eyre::Result<()> {
        let mut storage = host_at(150);
        storage.set_block_hash(101, B256::ZERO);
        let mut store = CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage);

        assert!(!store.commit(101)?);
        assert_eq!(store.get(101)?, None);
        assert_eq!(store.committed(101)?, None);
        Ok(())
    }

    #[test]
    fn test_commitment_outlives_oracle_window() -> eyre::Result<()> {
        let mut storage = host_at(150);
        CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage).commit(100)?;

        storage.advance_blocks(10_000);
        assert_eq!(storage.hash_of(100), None);

        let mut store = CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage);
        assert_eq!(store.get(100)?, Some(HASH_100));
        Ok(())
    }

    #[test]
    fn test_commitment_is_never_overwritten() -> eyre::Result<()> {
        let mut storage = host_at(150);
        CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage).commit(100)?;

        storage.set_block_hash(100, keccak256(b"reorg"));
        let mut store = CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage);
        assert!(!store.commit(100)?);
        assert_eq!(store.get(100)?, Some(HASH_100));
        Ok(())
    }

    #[test]
    fn test_commit_many_counts_new_commitments() -> eyre::Result<()> {
        let mut storage = host_at(150);
        storage.set_block_hash(101, keccak256(b"101"));
        storage.set_block_hash(102, keccak256(b"102"));
        let mut store = CommitmentStore::new(HEADER_RELAY_ADDRESS, &mut storage);

        assert!(store.commit(101)?);
        assert_eq!(store.commit_many(&[100, 101, 102, 103, 100])?, 2);
        assert_eq!(store.committed(102)?, Some(keccak256(b"102")));
        Ok(())
    }
}
