use crate::{PrecompileError, PrecompileOutput, PrecompileResult};
use alloy_primitives::Bytes;
use alloy_sol_types::SolInterface;
use header_relay_contracts::precompiles::HeaderRelayError;

/// Top-level error type for all header relay operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderRelayPrecompileError {
    /// Error surfaced to the caller as an ABI-encoded revert
    #[error("Header relay error: {0:?}")]
    HeaderRelay(HeaderRelayError),

    /// Host failure that aborts execution instead of reverting
    #[error("Fatal precompile error: {0:?}")]
    Fatal(String),
}

/// Result type alias for header relay operations
pub type Result<T> = std::result::Result<T, HeaderRelayPrecompileError>;

impl HeaderRelayPrecompileError {
    /// Checked arithmetic on ledger balances failed. The ledger never lets this happen, so it
    /// is treated as host state corruption.
    pub fn under_overflow() -> Self {
        Self::Fatal("arithmetic under/overflow".into())
    }

    /// Returns the relay error if this is a revert, `None` for fatal errors.
    pub fn as_relay_error(&self) -> Option<&HeaderRelayError> {
        match self {
            Self::HeaderRelay(err) => Some(err),
            Self::Fatal(_) => None,
        }
    }
}

impl From<HeaderRelayError> for HeaderRelayPrecompileError {
    fn from(err: HeaderRelayError) -> Self {
        Self::HeaderRelay(err)
    }
}

/// Extension trait to convert `Result<T, HeaderRelayPrecompileError>` into `PrecompileResult`
pub trait IntoPrecompileResult<T> {
    fn into_precompile_result(self, encode_ok: impl FnOnce(T) -> Bytes) -> PrecompileResult;
}

impl<T> IntoPrecompileResult<T> for Result<T> {
    fn into_precompile_result(self, encode_ok: impl FnOnce(T) -> Bytes) -> PrecompileResult {
        match self {
            Ok(res) => Ok(PrecompileOutput::new(encode_ok(res))),
            Err(HeaderRelayPrecompileError::HeaderRelay(e)) => {
                Ok(PrecompileOutput::new_reverted(e.abi_encode().into()))
            }
            Err(HeaderRelayPrecompileError::Fatal(msg)) => Err(PrecompileError::Fatal(msg)),
        }
    }
}
