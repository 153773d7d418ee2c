//! Test utilities: sample headers, scripted sinks, a transaction executor and dispatch
//! coverage checks.

use std::{cell::RefCell, rc::Rc};

use alloy_consensus::Header;
use alloy_primitives::{Address, B64, B256, Bloom, Bytes, U256};
use alloy_sol_types::SolInterface;
use header_relay_contracts::precompiles::{HeaderRelayError, IHeaderRelay};

use crate::{
    CallContext, HEADER_RELAY_ADDRESS, Precompile, PrecompileError, PrecompileResult,
    callback::{HeaderSink, SinkFailure, SinkResult},
    error::HeaderRelayPrecompileError,
    header_relay::HeaderRelay,
    storage::{PrecompileStorageProvider, hashmap::HashMapStorageProvider},
};

/// Installs a `tracing` subscriber honoring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A post-Prague header for `number` with every optional field present.
///
/// `difficulty` and `excessBlobGas` are zero, so they encode as empty strings.
pub fn sample_header(number: u64) -> Header {
    Header {
        parent_hash: B256::repeat_byte(0x01),
        ommers_hash: B256::repeat_byte(0x02),
        beneficiary: Address::repeat_byte(0x03),
        state_root: B256::repeat_byte(0x04),
        transactions_root: B256::repeat_byte(0x05),
        receipts_root: B256::repeat_byte(0x06),
        logs_bloom: Bloom::repeat_byte(0x07),
        difficulty: U256::ZERO,
        number,
        gas_limit: 30_000_000,
        gas_used: 12_345_678,
        timestamp: 1_700_000_000 + number * 12,
        extra_data: Bytes::from_static(b"header-relay"),
        mix_hash: B256::repeat_byte(0x08),
        nonce: B64::ZERO,
        base_fee_per_gas: Some(7_000_000_000),
        withdrawals_root: Some(B256::repeat_byte(0x09)),
        blob_gas_used: Some(131_072),
        excess_blob_gas: Some(0),
        parent_beacon_block_root: Some(B256::repeat_byte(0x0a)),
        requests_hash: Some(B256::repeat_byte(0x0b)),
    }
}

/// RLP encoding of `header`, as a responder would submit it.
pub fn encode_header(header: &Header) -> Bytes {
    alloy_rlp::encode(header).into()
}

/// Registers the hash of [`sample_header`] for `number` with the host and returns the header.
pub fn seed_block(storage: &mut HashMapStorageProvider, number: u64) -> Header {
    let header = sample_header(number);
    storage.set_block_hash(number, header.hash_slow());
    header
}

/// Runs one top-level call against the relay as its own transaction.
///
/// The attached value is moved from the caller to the relay first. A reverted or failed call
/// discards every state change, the value transfer included.
pub fn execute(
    storage: &mut HashMapStorageProvider,
    ctx: CallContext,
    calldata: &[u8],
) -> PrecompileResult {
    let checkpoint = storage.checkpoint();

    let result = fund_relay(storage, ctx)
        .and_then(|()| HeaderRelay::new(&mut *storage).call(calldata, ctx));

    if matches!(&result, Ok(output) if !output.reverted) {
        storage.checkpoint_commit(checkpoint);
    } else {
        storage.checkpoint_revert(checkpoint);
    }
    storage.end_transaction();
    result
}

fn fund_relay(
    storage: &mut HashMapStorageProvider,
    ctx: CallContext,
) -> Result<(), PrecompileError> {
    if ctx.value.is_zero() {
        return Ok(());
    }
    match storage.transfer(ctx.caller, HEADER_RELAY_ADDRESS, ctx.value) {
        Ok(true) => Ok(()),
        Ok(false) => Err(PrecompileError::Fatal("relay rejected value".into())),
        Err(err) => Err(PrecompileError::Fatal(err.to_string())),
    }
}

/// A field delivered to a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedField {
    pub caller: Address,
    pub block_number: u64,
    pub field_index: u8,
    pub value: B256,
}

/// A whole header delivered to a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedHeader {
    pub caller: Address,
    pub block_number: u64,
    pub header: Bytes,
}

/// Sink that records every delivery. Clones share the same record, so a test keeps one clone
/// and registers the other with the host.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    fields: Rc<RefCell<Vec<ReceivedField>>>,
    headers: Rc<RefCell<Vec<ReceivedHeader>>>,
    field_only: bool,
}

impl RecordingSink {
    pub const GAS_PER_CALL: u64 = 5_000;

    /// Rejects whole-header deliveries, like a contract that only implements
    /// `receiveHeaderField`.
    pub fn field_only(mut self) -> Self {
        self.field_only = true;
        self
    }

    pub fn fields(&self) -> Vec<ReceivedField> {
        self.fields.borrow().clone()
    }

    pub fn headers(&self) -> Vec<ReceivedHeader> {
        self.headers.borrow().clone()
    }
}

impl HeaderSink for RecordingSink {
    fn receive_header_field(
        &self,
        _host: &mut dyn PrecompileStorageProvider,
        caller: Address,
        block_number: u64,
        field_index: u8,
        value: B256,
        _gas_limit: u64,
    ) -> SinkResult {
        self.fields.borrow_mut().push(ReceivedField {
            caller,
            block_number,
            field_index,
            value,
        });
        Ok(Self::GAS_PER_CALL)
    }

    fn receive_header(
        &self,
        _host: &mut dyn PrecompileStorageProvider,
        caller: Address,
        block_number: u64,
        header: &Bytes,
        _gas_limit: u64,
    ) -> SinkResult {
        if self.field_only {
            return Err(SinkFailure::Revert(Bytes::new()));
        }
        self.headers.borrow_mut().push(ReceivedHeader {
            caller,
            block_number,
            header: header.clone(),
        });
        Ok(Self::GAS_PER_CALL)
    }
}

/// Sink that always reverts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSink;

impl HeaderSink for FailingSink {
    fn receive_header_field(
        &self,
        _host: &mut dyn PrecompileStorageProvider,
        _caller: Address,
        _block_number: u64,
        _field_index: u8,
        _value: B256,
        _gas_limit: u64,
    ) -> SinkResult {
        Err(SinkFailure::Revert(Bytes::from_static(b"not today")))
    }
}

/// Sink that reports burning a fixed amount of gas. It runs out of gas when that exceeds the
/// stipend it was given.
#[derive(Debug, Clone, Copy)]
pub struct GasHungrySink {
    gas: u64,
}

impl GasHungrySink {
    pub const fn new(gas: u64) -> Self {
        Self { gas }
    }
}

impl HeaderSink for GasHungrySink {
    fn receive_header_field(
        &self,
        _host: &mut dyn PrecompileStorageProvider,
        _caller: Address,
        _block_number: u64,
        _field_index: u8,
        _value: B256,
        gas_limit: u64,
    ) -> SinkResult {
        if self.gas > gas_limit {
            return Err(SinkFailure::OutOfGas);
        }
        Ok(self.gas)
    }
}

/// Call a [`ReentrantSink`] makes back into the relay from inside its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reentry {
    Request {
        block_number: u64,
        field_index: u8,
    },
    Response {
        block_number: u64,
        field_index: u8,
        header: Bytes,
    },
    Refund {
        task_id: u64,
    },
}

/// Sink that calls back into the relay when it receives a field, records what that nested call
/// returned and then completes normally.
#[derive(Debug, Clone)]
pub struct ReentrantSink {
    address: Address,
    reentry: Reentry,
    attempts: Rc<RefCell<Vec<Result<(), HeaderRelayPrecompileError>>>>,
}

impl ReentrantSink {
    pub fn new(address: Address, reentry: Reentry) -> Self {
        Self {
            address,
            reentry,
            attempts: Rc::default(),
        }
    }

    pub fn attempts(&self) -> Vec<Result<(), HeaderRelayPrecompileError>> {
        self.attempts.borrow().clone()
    }
}

impl HeaderSink for ReentrantSink {
    fn receive_header_field(
        &self,
        host: &mut dyn PrecompileStorageProvider,
        _caller: Address,
        _block_number: u64,
        _field_index: u8,
        _value: B256,
        _gas_limit: u64,
    ) -> SinkResult {
        let ctx = CallContext::contract(self.address);
        let mut relay = HeaderRelay::new(host);

        let attempt = match &self.reentry {
            Reentry::Request {
                block_number,
                field_index,
            } => relay
                .request(
                    ctx,
                    IHeaderRelay::requestCall {
                        blockNumber: *block_number,
                        fieldIndex: *field_index,
                    },
                )
                .map(|_| ()),
            Reentry::Response {
                block_number,
                field_index,
                header,
            } => relay.response(
                ctx,
                IHeaderRelay::responseCall {
                    blockNumber: *block_number,
                    fieldIndex: *field_index,
                    header: header.clone(),
                    sink: self.address,
                },
            ),
            Reentry::Refund { task_id } => {
                relay.refund(ctx, IHeaderRelay::refundCall { taskId: *task_id })
            }
        };

        self.attempts.borrow_mut().push(attempt);
        Ok(RecordingSink::GAS_PER_CALL)
    }
}

/// Checks that all selectors in an interface have dispatch handlers.
///
/// Calls each selector with dummy parameters and checks for `FunctionDoesNotExist` reverts.
/// Returns unsupported selectors as `(selector_bytes, function_name)` tuples.
pub fn check_selector_coverage<P: Precompile>(
    precompile: &mut P,
    selectors: &[[u8; 4]],
    interface_name: &str,
    name_lookup: impl Fn([u8; 4]) -> Option<&'static str>,
) -> Vec<([u8; 4], &'static str)> {
    let mut unsupported_selectors = Vec::new();

    for selector in selectors.iter() {
        let mut calldata = selector.to_vec();
        // Add some dummy data for functions that require parameters
        calldata.extend_from_slice(&[0u8; 32]);

        let result = precompile.call(&calldata, CallContext::contract(Address::ZERO));

        let is_unsupported = matches!(&result, Ok(output)
            if output.reverted
                && HeaderRelayError::abi_decode(&output.bytes).ok()
                    == Some(HeaderRelayError::function_does_not_exist()));

        if is_unsupported && let Some(name) = name_lookup(*selector) {
            unsupported_selectors.push((*selector, name));
        }
    }

    if !unsupported_selectors.is_empty() {
        eprintln!("Unsupported {interface_name} selectors:");
        for (selector, name) in &unsupported_selectors {
            eprintln!("  - {name} ({selector:?})");
        }
    }

    unsupported_selectors
}

/// Asserts that multiple selector coverage checks all pass (no unsupported selectors).
pub fn assert_full_coverage(results: impl IntoIterator<Item = Vec<([u8; 4], &'static str)>>) {
    let all_unsupported: Vec<_> = results
        .into_iter()
        .flat_map(|r| r.into_iter())
        .map(|(_, name)| name)
        .collect();

    assert!(
        all_unsupported.is_empty(),
        "Found {} unsupported selectors: {:?}",
        all_unsupported.len(),
        all_unsupported
    );
}
