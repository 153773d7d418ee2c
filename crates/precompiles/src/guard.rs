use alloy_primitives::U256;
use header_relay_contracts::precompiles::HeaderRelayError;
use tracing::warn;

use crate::{error::Result, storage::StorageOps};

/// Single-entry latch kept in a transient storage slot.
///
/// The latch lives in host state rather than in this value, so a nested relay instance built
/// by a callback observes it. Transient storage also resets at the end of every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReentrancyGuard {
    slot: U256,
}

impl ReentrancyGuard {
    pub const fn new(slot: U256) -> Self {
        Self { slot }
    }

    pub const fn slot(&self) -> U256 {
        self.slot
    }

    pub fn is_locked<S: StorageOps + ?Sized>(&self, storage: &mut S) -> Result<bool> {
        Ok(!storage.tload(self.slot)?.is_zero())
    }

    /// Runs `f` with the latch held. Fails with `ReentrantCall` if the latch is already held;
    /// otherwise the latch is released after `f` returns, whatever it returned.
    pub fn run<S, T>(&self, storage: &mut S, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T>
    where
        S: StorageOps + ?Sized,
    {
        if self.is_locked(storage)? {
            warn!("rejecting reentrant call");
            return Err(HeaderRelayError::reentrant_call().into());
        }

        storage.tstore(self.slot, U256::ONE)?;
        let result = f(storage);
        storage.tstore(self.slot, U256::ZERO)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeaderRelayPrecompileError;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TransientOnly {
        slots: HashMap<U256, U256>,
    }

    impl StorageOps for TransientOnly {
        fn sstore(&mut self, _slot: U256, _value: U256) -> Result<()> {
            unreachable!("guard never touches persistent storage")
        }

        fn sload(&mut self, _slot: U256) -> Result<U256> {
            unreachable!("guard never touches persistent storage")
        }

        fn tstore(&mut self, slot: U256, value: U256) -> Result<()> {
            self.slots.insert(slot, value);
            Ok(())
        }

        fn tload(&mut self, slot: U256) -> Result<U256> {
            Ok(self.slots.get(&slot).copied().unwrap_or_default())
        }
    }

    const GUARD: ReentrancyGuard = ReentrancyGuard::new(U256::ZERO);

    #[test]
    fn test_latch_held_only_inside_run() -> eyre::Result<()> {
        let mut storage = TransientOnly::default();
        assert!(!GUARD.is_locked(&mut storage)?);

        let seen = GUARD.run(&mut storage, |storage| GUARD.is_locked(storage))?;
        assert!(seen);
        assert!(!GUARD.is_locked(&mut storage)?);
        Ok(())
    }

    #[test]
    fn test_nested_run_is_rejected() -> eyre::Result<()> {
        let mut storage = TransientOnly::default();

        let inner = GUARD.run(&mut storage, |storage| {
            Ok(GUARD.run(storage, |_| Ok(())))
        })?;
        assert_eq!(
            inner,
            Err(HeaderRelayPrecompileError::HeaderRelay(
                HeaderRelayError::reentrant_call()
            ))
        );
        assert!(!GUARD.is_locked(&mut storage)?);
        Ok(())
    }

    #[test]
    fn test_released_on_failure() -> eyre::Result<()> {
        let mut storage = TransientOnly::default();

        let result: Result<()> = GUARD.run(&mut storage, |_| {
            Err(HeaderRelayError::external_call_failed().into())
        });
        assert!(result.is_err());
        assert!(!GUARD.is_locked(&mut storage)?);

        GUARD.run(&mut storage, |_| Ok(()))?;
        Ok(())
    }

    #[test]
    fn test_guards_on_distinct_slots_are_independent() -> eyre::Result<()> {
        let mut storage = TransientOnly::default();
        let other = ReentrancyGuard::new(U256::from(1));

        GUARD.run(&mut storage, |storage| {
            assert!(!other.is_locked(storage)?);
            other.run(storage, |_| Ok(()))
        })?;
        Ok(())
    }
}
