//! Header relay precompile implementation.
//!
//! The relay lets contracts request one field of a historical block header and receive it,
//! verified against a trusted block hash, through a callback. The crate contains the
//! verification and task accounting core; the EVM host is abstracted behind
//! [`storage::PrecompileStorageProvider`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub use error::{IntoPrecompileResult, Result};

pub mod config;
pub mod storage;

pub mod callback;
pub mod commitment;
pub mod guard;
pub mod header;
pub mod header_relay;
pub mod rlp;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_util;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use header_relay_contracts::precompiles::HeaderRelayError;

#[cfg(test)]
use alloy_sol_types::SolInterface;

pub use header_relay_contracts::precompiles::HEADER_RELAY_ADDRESS;

/// Output of a precompile call that did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecompileOutput {
    /// ABI-encoded return data, or ABI-encoded error data when reverted.
    pub bytes: Bytes,
    /// Whether the call reverted. The host discards all state changes of a reverted call.
    pub reverted: bool,
}

impl PrecompileOutput {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            reverted: false,
        }
    }

    pub fn new_reverted(bytes: Bytes) -> Self {
        Self {
            bytes,
            reverted: true,
        }
    }
}

/// Fatal precompile failure. Unlike a revert this halts the enclosing execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrecompileError {
    #[error("fatal precompile error: {0}")]
    Fatal(String),
}

pub type PrecompileResult = core::result::Result<PrecompileOutput, PrecompileError>;

/// Account type of the caller, attested by the integration layer.
///
/// The relay never inspects code size itself: whoever drives the precompile decides whether the
/// sender is a contract. Note that a contract under construction has no code yet, so hosts that
/// derive this from code presence will classify such callers as externally owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    Contract,
    ExternallyOwned,
}

/// Per-call environment handed to a precompile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub caller_kind: CallerKind,
    /// Value attached to the call, already credited to the precompile by the host.
    pub value: U256,
}

impl CallContext {
    /// Context for a contract caller sending no value.
    pub const fn contract(caller: Address) -> Self {
        Self {
            caller,
            caller_kind: CallerKind::Contract,
            value: U256::ZERO,
        }
    }

    /// Context for an externally owned account sending no value.
    pub const fn externally_owned(caller: Address) -> Self {
        Self {
            caller,
            caller_kind: CallerKind::ExternallyOwned,
            value: U256::ZERO,
        }
    }

    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn is_contract(&self) -> bool {
        self.caller_kind == CallerKind::Contract
    }
}

pub trait Precompile {
    fn call(&mut self, calldata: &[u8], ctx: CallContext) -> PrecompileResult;
}

#[inline]
fn view<T: SolCall>(call: T, f: impl FnOnce(T) -> Result<T::Return>) -> PrecompileResult {
    f(call).into_precompile_result(|ret| T::abi_encode_returns(&ret).into())
}

#[inline]
fn mutate<T: SolCall>(
    call: T,
    ctx: CallContext,
    f: impl FnOnce(CallContext, T) -> Result<T::Return>,
) -> PrecompileResult {
    f(ctx, call).into_precompile_result(|ret| T::abi_encode_returns(&ret).into())
}

#[inline]
fn mutate_void<T: SolCall>(
    call: T,
    ctx: CallContext,
    f: impl FnOnce(CallContext, T) -> Result<()>,
) -> PrecompileResult {
    f(ctx, call).into_precompile_result(|()| Bytes::new())
}

/// Helper function to return a revert for calldata that matches no entry point.
#[inline]
pub fn function_does_not_exist() -> PrecompileResult {
    revert(HeaderRelayError::function_does_not_exist())
}

#[inline]
fn revert(err: HeaderRelayError) -> PrecompileResult {
    Err::<(), _>(error::HeaderRelayPrecompileError::from(err))
        .into_precompile_result(|()| Bytes::new())
}

/// Helper function to decode calldata and dispatch it.
#[inline]
fn dispatch_call<T>(
    calldata: &[u8],
    decode: impl FnOnce(&[u8]) -> core::result::Result<T, alloy_sol_types::Error>,
    f: impl FnOnce(T) -> PrecompileResult,
) -> PrecompileResult {
    if calldata.len() < 4 {
        return function_does_not_exist();
    }

    match decode(calldata) {
        Ok(call) => f(call),
        Err(alloy_sol_types::Error::UnknownSelector { .. }) => function_does_not_exist(),
        Err(_) => Ok(PrecompileOutput::new_reverted(Bytes::new())),
    }
}

#[cfg(test)]
pub fn expect_precompile_revert<E>(result: &PrecompileResult, expected_error: E)
where
    E: SolInterface + PartialEq + std::fmt::Debug,
{
    match result {
        Ok(result) => {
            assert!(result.reverted);
            let decoded = E::abi_decode(&result.bytes).unwrap();
            assert_eq!(decoded, expected_error);
        }
        Err(other) => {
            panic!("expected reverted output, got: {other:?}");
        }
    }
}
