use alloy_primitives::{U256, keccak256};

/// Compute storage slot for a mapping entry using the solidity layout:
/// `keccak256(pad32(key) || pad32(base_slot))`
pub fn mapping_slot<T: AsRef<[u8]>>(key: T, base_slot: U256) -> U256 {
    let mut data = [0u8; 64];
    let key = key.as_ref();
    let key = &key[key.len().saturating_sub(32)..];
    data[32 - key.len()..32].copy_from_slice(key);
    data[32..].copy_from_slice(&base_slot.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(data).0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, address, b256};

    #[test]
    fn test_mapping_slot_deterministic() {
        let key = U256::from(123).to_be_bytes::<32>();
        let slot1 = mapping_slot(key, U256::ZERO);
        let slot2 = mapping_slot(key, U256::ZERO);

        assert_eq!(slot1, slot2);
    }

    #[test]
    fn test_different_keys_different_slots() {
        let key1 = U256::from(123).to_be_bytes::<32>();
        let key2 = U256::from(456).to_be_bytes::<32>();

        assert_ne!(
            mapping_slot(key1, U256::ZERO),
            mapping_slot(key2, U256::ZERO)
        );
        assert_ne!(
            mapping_slot(key1, U256::ZERO),
            mapping_slot(key1, U256::from(1))
        );
    }

    #[test]
    fn test_short_keys_are_left_padded() {
        let short = 7u64.to_be_bytes();
        let padded = U256::from(7).to_be_bytes::<32>();

        assert_eq!(
            mapping_slot(short, U256::from(1)),
            mapping_slot(padded, U256::from(1))
        );
    }

    #[test]
    fn test_matches_solidity_layout() {
        // keccak256(abi.encode(address(0x01), uint256(0)))
        let account: Address = address!("0x0000000000000000000000000000000000000001");
        let expected = b256!("0xada5013122d395ba3c54772283fb069b10426056ef8ca54750cb9bb552a59e7d");

        assert_eq!(
            mapping_slot(account.as_slice(), U256::ZERO),
            U256::from_be_bytes(expected.0)
        );
    }
}
