//! Tunables of the header relay.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Number of most recent blocks whose hash the host can serve without a commitment.
pub const DEFAULT_RETENTION_WINDOW: u64 = 256;

/// Highest block number a task may reference (40-bit cap).
pub const DEFAULT_MAX_BLOCK_NUMBER: u64 = (1 << 40) - 1;

/// Gas stipend forwarded to a sink callback.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u64 = 30_000;

/// Largest reward a single task may lock: 10 ether.
pub const DEFAULT_MAX_REWARD: U256 = U256::from_limbs([10_000_000_000_000_000_000, 0, 0, 0]);

/// Block numbers above this would not fit a packed task id.
pub const MAX_TASK_BLOCK_NUMBER: u64 = (1 << 56) - 1;

/// Runtime configuration of the relay.
///
/// Missing fields fall back to [`HeaderRelayConfig::default`], so a partial JSON or TOML
/// document only has to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderRelayConfig {
    /// Must match the host oracle's own window.
    pub retention_window: u64,
    pub max_block_number: u64,
    pub max_reward: U256,
    pub callback_gas_limit: u64,
}

impl Default for HeaderRelayConfig {
    fn default() -> Self {
        Self {
            retention_window: DEFAULT_RETENTION_WINDOW,
            max_block_number: DEFAULT_MAX_BLOCK_NUMBER,
            max_reward: DEFAULT_MAX_REWARD,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
        }
    }
}

/// Reasons a [`HeaderRelayConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("retention window must be non-zero")]
    ZeroRetentionWindow,
    #[error("callback gas limit must be non-zero")]
    ZeroCallbackGasLimit,
    #[error("max block number must be in 1..={MAX_TASK_BLOCK_NUMBER}, got {0}")]
    MaxBlockNumberOutOfRange(u64),
}

impl HeaderRelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_window == 0 {
            return Err(ConfigError::ZeroRetentionWindow);
        }
        if self.callback_gas_limit == 0 {
            return Err(ConfigError::ZeroCallbackGasLimit);
        }
        if self.max_block_number == 0 || self.max_block_number > MAX_TASK_BLOCK_NUMBER {
            return Err(ConfigError::MaxBlockNumberOutOfRange(
                self.max_block_number,
            ));
        }
        Ok(())
    }

    /// Whether the hash of `block_number` has aged out of the host's window at `current`.
    pub fn is_expired(&self, block_number: u64, current: u64) -> bool {
        block_number < current && current - block_number > self.retention_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = HeaderRelayConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(
            config.max_reward,
            U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64))
        );
    }

    #[test]
    fn test_rejects_degenerate_values() {
        let config = HeaderRelayConfig {
            retention_window: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRetentionWindow));

        let config = HeaderRelayConfig {
            callback_gas_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCallbackGasLimit));

        let config = HeaderRelayConfig {
            max_block_number: 1 << 60,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MaxBlockNumberOutOfRange(1 << 60))
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() -> eyre::Result<()> {
        let config: HeaderRelayConfig =
            serde_json::from_str(r#"{ "retentionWindow": 8191, "callbackGasLimit": 22000 }"#)?;

        assert_eq!(config.retention_window, 8191);
        assert_eq!(config.callback_gas_limit, 22_000);
        assert_eq!(config.max_block_number, DEFAULT_MAX_BLOCK_NUMBER);
        assert_eq!(config.max_reward, DEFAULT_MAX_REWARD);
        Ok(())
    }

    #[test]
    fn test_expiry_window_boundaries() {
        let config = HeaderRelayConfig::default();

        assert!(!config.is_expired(1000, 1000));
        assert!(!config.is_expired(2000, 1000));
        assert!(!config.is_expired(744, 1000));
        assert!(config.is_expired(743, 1000));
    }
}
