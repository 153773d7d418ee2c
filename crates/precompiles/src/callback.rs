//! Delivery of verified header data to consumer contracts.
//!
//! The relay never trusts the sink: calls carry no value, are capped at a fixed gas stipend,
//! their return data is ignored, and any kind of failure is reported uniformly as
//! `ExternalCallFailed` so the enclosing relay call reverts as a whole.

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::{SolCall, SolInterface};
use header_relay_contracts::precompiles::{HeaderRelayError, HeaderSinkCalls, IHeaderSink};
use tracing::{trace, warn};

use crate::{
    error::Result,
    storage::{CallOutcome, PrecompileStorageProvider},
};

/// Why a sink callback did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkFailure {
    Revert(Bytes),
    OutOfGas,
}

/// Gas consumed by a successful callback, or the reason it failed.
pub type SinkResult = std::result::Result<u64, SinkFailure>;

/// A consumer contract able to receive relay callbacks.
///
/// Implementations get the host back so they can read state or call into the relay again;
/// `gas_limit` is the stipend they must stay within. Like contract code, a sink is shared and
/// may be entered again while one of its calls is still running, so any state it keeps lives
/// behind interior mutability.
pub trait HeaderSink {
    fn receive_header_field(
        &self,
        host: &mut dyn PrecompileStorageProvider,
        caller: Address,
        block_number: u64,
        field_index: u8,
        value: B256,
        gas_limit: u64,
    ) -> SinkResult;

    /// Whole-header delivery. Sinks that only consume single fields revert, like a contract
    /// without the function would.
    fn receive_header(
        &self,
        _host: &mut dyn PrecompileStorageProvider,
        _caller: Address,
        _block_number: u64,
        _header: &Bytes,
        _gas_limit: u64,
    ) -> SinkResult {
        Err(SinkFailure::Revert(Bytes::new()))
    }
}

/// Decodes `input` as an `IHeaderSink` call and runs it against `sink`.
///
/// Used by hosts to execute a callback. Undecodable input reverts; exceeding `gas_limit`
/// consumes the whole stipend and fails.
pub fn execute_sink_call(
    sink: &dyn HeaderSink,
    host: &mut dyn PrecompileStorageProvider,
    caller: Address,
    input: &[u8],
    gas_limit: u64,
) -> CallOutcome {
    let result = match HeaderSinkCalls::abi_decode(input) {
        Ok(HeaderSinkCalls::receiveHeaderField(call)) => sink.receive_header_field(
            host,
            caller,
            call.blockNumber,
            call.fieldIndex,
            call.value,
            gas_limit,
        ),
        Ok(HeaderSinkCalls::receiveHeader(call)) => {
            sink.receive_header(host, caller, call.blockNumber, &call.header, gas_limit)
        }
        Err(_) => Err(SinkFailure::Revert(Bytes::new())),
    };

    match result {
        Ok(gas_used) if gas_used <= gas_limit => CallOutcome::success(gas_used),
        Ok(_) | Err(SinkFailure::OutOfGas) => CallOutcome::failure(gas_limit, Bytes::new()),
        Err(SinkFailure::Revert(data)) => CallOutcome::failure(0, data),
    }
}

/// Issues resource-bounded callbacks on behalf of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackDispatcher {
    relay: Address,
    gas_limit: u64,
}

impl CallbackDispatcher {
    pub const fn new(relay: Address, gas_limit: u64) -> Self {
        Self { relay, gas_limit }
    }

    pub const fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Delivers one verified field through `IHeaderSink.receiveHeaderField`.
    pub fn deliver_field<S: PrecompileStorageProvider + ?Sized>(
        &self,
        storage: &mut S,
        sink: Address,
        block_number: u64,
        field_index: u8,
        value: B256,
    ) -> Result<()> {
        let input = IHeaderSink::receiveHeaderFieldCall {
            blockNumber: block_number,
            fieldIndex: field_index,
            value,
        }
        .abi_encode();
        self.dispatch(storage, sink, input.into())
    }

    /// Delivers a whole verified header through `IHeaderSink.receiveHeader`.
    pub fn deliver_header<S: PrecompileStorageProvider + ?Sized>(
        &self,
        storage: &mut S,
        sink: Address,
        block_number: u64,
        header: Bytes,
    ) -> Result<()> {
        let input = IHeaderSink::receiveHeaderCall {
            blockNumber: block_number,
            header,
        }
        .abi_encode();
        self.dispatch(storage, sink, input.into())
    }

    fn dispatch<S: PrecompileStorageProvider + ?Sized>(
        &self,
        storage: &mut S,
        sink: Address,
        input: Bytes,
    ) -> Result<()> {
        let outcome = storage.call(self.relay, sink, input, self.gas_limit)?;

        if !outcome.success || outcome.gas_used > self.gas_limit {
            warn!(%sink, gas_used = outcome.gas_used, "sink callback failed");
            return Err(HeaderRelayError::external_call_failed().into());
        }

        trace!(%sink, gas_used = outcome.gas_used, "sink callback delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::HeaderRelayPrecompileError,
        storage::hashmap::HashMapStorageProvider,
        test_util::{FailingSink, GasHungrySink, RecordingSink},
    };
    use alloy_primitives::{address, b256};

    const RELAY: Address = address!("0xB10C000000000000000000000000000000000000");
    const SINK: Address = address!("0x5111111111111111111111111111111111111111");
    const VALUE: B256 =
        b256!("0x00000000000000000000000000000000000000000000000000000000000000ff");

    fn dispatcher() -> CallbackDispatcher {
        CallbackDispatcher::new(RELAY, 30_000)
    }

    #[test]
    fn test_delivers_field_to_sink() -> eyre::Result<()> {
        let mut storage = HashMapStorageProvider::new();
        let sink = RecordingSink::default();
        storage.register_sink(SINK, Box::new(sink.clone()));

        dispatcher().deliver_field(&mut storage, SINK, 1000, 15, VALUE)?;

        let received = sink.fields();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].caller, RELAY);
        assert_eq!(received[0].block_number, 1000);
        assert_eq!(received[0].field_index, 15);
        assert_eq!(received[0].value, VALUE);
        Ok(())
    }

    #[test]
    fn test_reverting_sink_fails_call() {
        let mut storage = HashMapStorageProvider::new();
        storage.register_sink(SINK, Box::new(FailingSink));

        let result = dispatcher().deliver_field(&mut storage, SINK, 1000, 15, VALUE);
        assert_eq!(
            result,
            Err(HeaderRelayPrecompileError::HeaderRelay(
                HeaderRelayError::external_call_failed()
            ))
        );
    }

    #[test]
    fn test_sink_over_gas_ceiling_fails_call() {
        let mut storage = HashMapStorageProvider::new();
        storage.register_sink(SINK, Box::new(GasHungrySink::new(30_001)));

        let result = dispatcher().deliver_field(&mut storage, SINK, 1000, 15, VALUE);
        assert!(matches!(
            result,
            Err(HeaderRelayPrecompileError::HeaderRelay(
                HeaderRelayError::ExternalCallFailed(_)
            ))
        ));

        let mut storage = HashMapStorageProvider::new();
        storage.register_sink(SINK, Box::new(GasHungrySink::new(30_000)));
        assert!(
            dispatcher()
                .deliver_field(&mut storage, SINK, 1000, 15, VALUE)
                .is_ok()
        );
    }

    #[test]
    fn test_field_only_sink_rejects_whole_header() {
        let mut storage = HashMapStorageProvider::new();
        storage.register_sink(SINK, Box::new(RecordingSink::default().field_only()));

        let header = Bytes::from_static(&[0xc0]);
        let result = dispatcher().deliver_header(&mut storage, SINK, 1000, header);
        assert!(result.is_err());
    }

    #[test]
    fn test_target_without_sink_behaves_like_empty_account() -> eyre::Result<()> {
        let mut storage = HashMapStorageProvider::new();
        dispatcher().deliver_field(&mut storage, SINK, 1000, 15, VALUE)?;
        Ok(())
    }

    #[test]
    fn test_garbage_input_reverts() {
        let sink = RecordingSink::default();
        let mut host = HashMapStorageProvider::new();
        let outcome = execute_sink_call(&sink, &mut host, RELAY, &[1, 2, 3, 4, 5], 30_000);

        assert!(!outcome.success);
        assert!(sink.fields().is_empty());
    }
}
