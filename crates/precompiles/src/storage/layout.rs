//! Typed handles over raw 32-byte storage slots.

use alloy_primitives::{Address, B256, U256};
use std::marker::PhantomData;

use crate::{error::Result, storage::StorageOps, storage::slots::mapping_slot};

/// Trait for types that can be stored/loaded from contract storage.
///
/// A type occupies `SLOT_COUNT` consecutive slots starting at its base slot. Implementations
/// must round-trip: `load(store(x)) == x`, and a never-written value must load as the type's
/// zero value.
pub trait Storable: Sized {
    const SLOT_COUNT: usize;

    fn load<S: StorageOps + ?Sized>(storage: &mut S, base_slot: U256) -> Result<Self>;
    fn store<S: StorageOps + ?Sized>(&self, storage: &mut S, base_slot: U256) -> Result<()>;
}

impl Storable for U256 {
    const SLOT_COUNT: usize = 1;

    fn load<S: StorageOps + ?Sized>(storage: &mut S, base_slot: U256) -> Result<Self> {
        storage.sload(base_slot)
    }

    fn store<S: StorageOps + ?Sized>(&self, storage: &mut S, base_slot: U256) -> Result<()> {
        storage.sstore(base_slot, *self)
    }
}

impl Storable for B256 {
    const SLOT_COUNT: usize = 1;

    fn load<S: StorageOps + ?Sized>(storage: &mut S, base_slot: U256) -> Result<Self> {
        Ok(Self::from(storage.sload(base_slot)?))
    }

    fn store<S: StorageOps + ?Sized>(&self, storage: &mut S, base_slot: U256) -> Result<()> {
        storage.sstore(base_slot, U256::from_be_bytes(self.0))
    }
}

impl Storable for Address {
    const SLOT_COUNT: usize = 1;

    fn load<S: StorageOps + ?Sized>(storage: &mut S, base_slot: U256) -> Result<Self> {
        let word = storage.sload(base_slot)?.to_be_bytes::<32>();
        Ok(Self::from_slice(&word[12..]))
    }

    fn store<S: StorageOps + ?Sized>(&self, storage: &mut S, base_slot: U256) -> Result<()> {
        storage.sstore(base_slot, U256::from_be_slice(self.as_slice()))
    }
}

/// Keys usable in a [`Mapping`].
pub trait StorageKey {
    fn as_storage_bytes(&self) -> [u8; 32];
}

impl StorageKey for u64 {
    fn as_storage_bytes(&self) -> [u8; 32] {
        U256::from(*self).to_be_bytes()
    }
}

impl StorageKey for U256 {
    fn as_storage_bytes(&self) -> [u8; 32] {
        self.to_be_bytes()
    }
}

impl StorageKey for Address {
    fn as_storage_bytes(&self) -> [u8; 32] {
        B256::left_padding_from(self.as_slice()).0
    }
}

/// A single value at a fixed slot.
#[derive(Debug, Clone, Copy)]
pub struct Slot<V> {
    slot: U256,
    _phantom: PhantomData<V>,
}

impl<V: Storable> Slot<V> {
    pub const fn new(slot: U256) -> Self {
        Self {
            slot,
            _phantom: PhantomData,
        }
    }

    pub const fn slot(&self) -> U256 {
        self.slot
    }

    pub fn read<S: StorageOps + ?Sized>(&self, storage: &mut S) -> Result<V> {
        V::load(storage, self.slot)
    }

    pub fn write<S: StorageOps + ?Sized>(&self, storage: &mut S, value: V) -> Result<()> {
        value.store(storage, self.slot)
    }
}

/// Solidity-style mapping rooted at a base slot.
///
/// The entry for key `k` starts at `keccak256(pad32(k) || base_slot)` and spans
/// `V::SLOT_COUNT` slots.
#[derive(Debug, Clone, Copy)]
pub struct Mapping<K, V> {
    base_slot: U256,
    _phantom: PhantomData<(K, V)>,
}

impl<K: StorageKey, V: Storable> Mapping<K, V> {
    pub const fn new(base_slot: U256) -> Self {
        Self {
            base_slot,
            _phantom: PhantomData,
        }
    }

    pub fn slot_of(&self, key: &K) -> U256 {
        mapping_slot(key.as_storage_bytes(), self.base_slot)
    }

    pub fn read<S: StorageOps + ?Sized>(&self, storage: &mut S, key: &K) -> Result<V> {
        V::load(storage, self.slot_of(key))
    }

    pub fn write<S: StorageOps + ?Sized>(&self, storage: &mut S, key: &K, value: V) -> Result<()> {
        value.store(storage, self.slot_of(key))
    }
}
