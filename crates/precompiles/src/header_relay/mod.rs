pub mod dispatch;


pub use header_relay_contracts::precompiles::IHeaderRelay;
use header_relay_contracts::precompiles::{HeaderRelayError, HeaderRelayEvent};

use alloy_primitives::{Address, B256, Bytes, IntoLogData, U256};
use tracing::{debug, trace};

use crate::{
    CallContext, HEADER_RELAY_ADDRESS,
    callback::CallbackDispatcher,
    commitment::CommitmentStore,
    config::{ConfigError, HeaderRelayConfig},
    error::{HeaderRelayPrecompileError, Result},
    guard::ReentrancyGuard,
    header::{extractable_field, verify_and_extract, verify_header},
    storage::{Mapping, PrecompileStorageProvider, Slot, Storable, StorageOps},
};

pub mod slots {
    use alloy_primitives::{U256, uint};

    // mapping(uint64 taskId => TaskEntry), each entry spans 3 slots
    pub const TASKS: U256 = uint!(0_U256);
    // mapping(uint64 blockNumber => bytes32)
    pub const COMMITMENTS: U256 = uint!(1_U256);
    pub const TOTAL_LOCKED: U256 = uint!(2_U256);

    /// Transient slot holding the reentrancy latch.
    pub const REENTRANCY_LATCH: U256 = uint!(0_U256);
}

/// Packs the natural task key into its handle: `block_number << 8 | field_index`.
pub const fn task_id(block_number: u64, field_index: u8) -> u64 {
    (block_number << 8) | field_index as u64
}

/// Inverse of [`task_id`].
pub const fn split_task_id(task_id: u64) -> (u64, u8) {
    (task_id >> 8, task_id as u8)
}

/// Refund eligibility: a paid task that never resolved, for a block that is already in the
/// past and whose hash can no longer be obtained.
pub const fn refund_eligible(
    has_reward: bool,
    resolved: bool,
    block_in_past: bool,
    hash_available: bool,
) -> bool {
    has_reward && !resolved && block_in_past && !hash_available
}

/// Ledger state of one `(block_number, field_index)` key.
///
/// Storage layout (3 slots from the mapping slot):
/// - slot + 0: tag (0 unrequested, 1 pending, 2 resolved, 3 refunded)
/// - slot + 1: requester
/// - slot + 2: reward while pending, the verified value once resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskEntry {
    #[default]
    Unrequested,
    Pending {
        requester: Address,
        reward: U256,
    },
    Resolved {
        value: B256,
    },
    Refunded {
        requester: Address,
    },
}

impl TaskEntry {
    const UNREQUESTED: u8 = 0;
    const PENDING: u8 = 1;
    const RESOLVED: u8 = 2;
    const REFUNDED: u8 = 3;

    const fn tag(&self) -> u8 {
        match self {
            Self::Unrequested => Self::UNREQUESTED,
            Self::Pending { .. } => Self::PENDING,
            Self::Resolved { .. } => Self::RESOLVED,
            Self::Refunded { .. } => Self::REFUNDED,
        }
    }

    pub const fn status(&self) -> IHeaderRelay::TaskStatus {
        match self {
            Self::Unrequested => IHeaderRelay::TaskStatus::Unrequested,
            Self::Pending { .. } => IHeaderRelay::TaskStatus::Pending,
            Self::Resolved { .. } => IHeaderRelay::TaskStatus::Resolved,
            Self::Refunded { .. } => IHeaderRelay::TaskStatus::Refunded,
        }
    }

    pub fn requester(&self) -> Address {
        match self {
            Self::Pending { requester, .. } | Self::Refunded { requester } => *requester,
            Self::Unrequested | Self::Resolved { .. } => Address::ZERO,
        }
    }

    /// Locked reward; zero in every state but `Pending`.
    pub fn reward(&self) -> U256 {
        match self {
            Self::Pending { reward, .. } => *reward,
            _ => U256::ZERO,
        }
    }

    pub fn value(&self) -> Option<B256> {
        match self {
            Self::Resolved { value } => Some(*value),
            _ => None,
        }
    }

    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

impl Storable for TaskEntry {
    const SLOT_COUNT: usize = 3;

    fn load<S: StorageOps + ?Sized>(storage: &mut S, base_slot: U256) -> Result<Self> {
        let tag = storage.sload(base_slot)?;
        let requester_slot = base_slot.wrapping_add(U256::from(1));
        let word_slot = base_slot.wrapping_add(U256::from(2));

        let entry = match u8::try_from(tag) {
            Ok(Self::UNREQUESTED) => Self::Unrequested,
            Ok(Self::PENDING) => Self::Pending {
                requester: Address::load(storage, requester_slot)?,
                reward: U256::load(storage, word_slot)?,
            },
            Ok(Self::RESOLVED) => Self::Resolved {
                value: B256::load(storage, word_slot)?,
            },
            Ok(Self::REFUNDED) => Self::Refunded {
                requester: Address::load(storage, requester_slot)?,
            },
            _ => {
                return Err(HeaderRelayPrecompileError::Fatal(format!(
                    "invalid task tag {tag}"
                )));
            }
        };
        Ok(entry)
    }

    fn store<S: StorageOps + ?Sized>(&self, storage: &mut S, base_slot: U256) -> Result<()> {
        let word = match self {
            Self::Pending { reward, .. } => *reward,
            Self::Resolved { value } => U256::from_be_bytes(value.0),
            Self::Unrequested | Self::Refunded { .. } => U256::ZERO,
        };

        storage.sstore(base_slot, U256::from(self.tag()))?;
        self.requester()
            .store(storage, base_slot.wrapping_add(U256::from(1)))?;
        word.store(storage, base_slot.wrapping_add(U256::from(2)))
    }
}

/// Header relay precompile.
///
/// Storage Layout (similar to Solidity contract):
/// ```solidity
/// contract HeaderRelay {
///     mapping(uint64 => TaskEntry) tasks;             // slot 0
///     mapping(uint64 => bytes32) commitments;         // slot 1
///     uint256 totalLocked;                            // slot 2
///     bool transient locked;                          // transient slot 0
/// }
/// ```
///
/// Every mutating entry point except `commit` runs under the reentrancy latch, and every one
/// of them either applies all of its state changes or none: failures revert to a storage
/// checkpoint taken on entry.
pub struct HeaderRelay<'a, S: PrecompileStorageProvider + ?Sized> {
    address: Address,
    config: HeaderRelayConfig,
    storage: &'a mut S,
    guard: ReentrancyGuard,
    dispatcher: CallbackDispatcher,
    tasks: Mapping<u64, TaskEntry>,
    total_locked: Slot<U256>,
}

impl<S: PrecompileStorageProvider + ?Sized> std::fmt::Debug for HeaderRelay<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderRelay")
            .field("address", &self.address)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a, S: PrecompileStorageProvider + ?Sized> HeaderRelay<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self::build(storage, HeaderRelayConfig::default())
    }

    /// Creates a relay with custom tunables, rejecting a `config` that fails
    /// [`HeaderRelayConfig::validate`]. Block numbers above the validated cap would not fit a
    /// task id.
    pub fn with_config(
        storage: &'a mut S,
        config: HeaderRelayConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(storage, config))
    }

    fn build(storage: &'a mut S, config: HeaderRelayConfig) -> Self {
        Self {
            address: HEADER_RELAY_ADDRESS,
            dispatcher: CallbackDispatcher::new(HEADER_RELAY_ADDRESS, config.callback_gas_limit),
            config,
            storage,
            guard: ReentrancyGuard::new(slots::REENTRANCY_LATCH),
            tasks: Mapping::new(slots::TASKS),
            total_locked: Slot::new(slots::TOTAL_LOCKED),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &HeaderRelayConfig {
        &self.config
    }

    /// Whether a mutating call is currently executing.
    pub fn is_locked(&mut self) -> Result<bool> {
        let guard = self.guard;
        guard.is_locked(self)
    }

    /// Requests field `fieldIndex` of block `blockNumber`, locking `ctx.value` as reward.
    pub fn request(&mut self, ctx: CallContext, call: IHeaderRelay::requestCall) -> Result<u64> {
        let guard = self.guard;
        guard.run(self, |relay| {
            relay.atomically(|relay| relay.open_task(ctx, call.blockNumber, call.fieldIndex))
        })
    }

    /// Resolves a task with an RLP header and delivers the verified field.
    pub fn response(&mut self, ctx: CallContext, call: IHeaderRelay::responseCall) -> Result<()> {
        let guard = self.guard;
        guard.run(self, |relay| {
            relay.atomically(|relay| {
                relay.resolve_task(
                    ctx.caller,
                    call.blockNumber,
                    call.fieldIndex,
                    &call.header,
                    call.sink,
                )
            })
        })
    }

    /// Verifies a whole header and delivers its bytes to `sink`. Keeps no ledger state and
    /// pays no reward.
    pub fn response_header(
        &mut self,
        ctx: CallContext,
        call: IHeaderRelay::responseHeaderCall,
    ) -> Result<()> {
        let guard = self.guard;
        guard.run(self, |relay| {
            relay.atomically(|relay| {
                relay.check_block_range(call.blockNumber)?;
                let block_hash = relay.block_hash_for_response(call.blockNumber)?;
                let header = verify_header(&call.header, block_hash)?;
                let header = Bytes::copy_from_slice(header.encoded());

                trace!(
                    responder = %ctx.caller,
                    block_number = call.blockNumber,
                    sink = %call.sink,
                    "header verified"
                );
                relay
                    .dispatcher
                    .deliver_header(relay.storage, call.sink, call.blockNumber, header)
            })
        })
    }

    /// Returns the locked reward of an unresolvable task to its requester.
    pub fn refund(&mut self, ctx: CallContext, call: IHeaderRelay::refundCall) -> Result<()> {
        let guard = self.guard;
        guard.run(self, |relay| {
            relay.atomically(|relay| relay.refund_task(ctx.caller, call.taskId))
        })
    }

    pub fn is_refundable(&mut self, task_id: u64) -> Result<bool> {
        let (block_number, _) = split_task_id(task_id);
        let task = self.task(task_id)?;
        let current = self.storage.current_block_number();
        let hash_available = self.commitments().get(block_number)?.is_some();

        Ok(refund_eligible(
            !task.reward().is_zero(),
            task.is_resolved(),
            block_number < current,
            hash_available,
        ))
    }

    /// Commits the current hash of `block_number`. See [`CommitmentStore::commit`].
    pub fn commit(&mut self, block_number: u64) -> Result<bool> {
        self.commitments().commit(block_number)
    }

    pub fn commit_many(&mut self, block_numbers: &[u64]) -> Result<usize> {
        self.commitments().commit_many(block_numbers)
    }

    /// Stored commitment, zero if none.
    pub fn committed_hash(&mut self, block_number: u64) -> Result<B256> {
        Ok(self
            .commitments()
            .committed(block_number)?
            .unwrap_or_default())
    }

    /// The hash a response for `block_number` would be verified against.
    pub fn block_hash(&mut self, block_number: u64) -> Result<B256> {
        self.commitments()
            .get(block_number)?
            .ok_or_else(|| HeaderRelayError::out_of_retention_range().into())
    }

    pub fn get_task(&mut self, task_id: u64) -> Result<IHeaderRelay::Task> {
        let (block_number, field_index) = split_task_id(task_id);
        let task = self.task(task_id)?;

        Ok(IHeaderRelay::Task {
            status: task.status(),
            blockNumber: block_number,
            fieldIndex: field_index,
            requester: task.requester(),
            reward: task.reward(),
            value: task.value().unwrap_or_default(),
        })
    }

    /// Verified value of a field, zero while unresolved.
    pub fn resolved_value(&mut self, block_number: u64, field_index: u8) -> Result<B256> {
        let task_id = self.task_id_of(block_number, field_index)?;
        Ok(self.task(task_id)?.value().unwrap_or_default())
    }

    pub fn task_id_of(&mut self, block_number: u64, field_index: u8) -> Result<u64> {
        if block_number > self.config.max_block_number {
            return Err(HeaderRelayError::invalid_block_number().into());
        }
        Ok(task_id(block_number, field_index))
    }

    /// Sum of all rewards currently locked in pending tasks.
    pub fn total_locked(&mut self) -> Result<U256> {
        let total_locked = self.total_locked;
        total_locked.read(self)
    }

    pub fn task(&mut self, task_id: u64) -> Result<TaskEntry> {
        let tasks = self.tasks;
        tasks.read(self, &task_id)
    }

    fn write_task(&mut self, task_id: u64, entry: TaskEntry) -> Result<()> {
        let tasks = self.tasks;
        tasks.write(self, &task_id, entry)
    }

    fn commitments(&mut self) -> CommitmentStore<'_, S> {
        CommitmentStore::new(self.address, self.storage)
    }

    fn open_task(&mut self, ctx: CallContext, block_number: u64, field_index: u8) -> Result<u64> {
        if !ctx.is_contract() {
            return Err(HeaderRelayError::caller_is_not_a_contract().into());
        }

        self.check_block_range(block_number)?;
        let task_id = task_id(block_number, field_index);
        let task = self.task(task_id)?;

        let current = self.storage.current_block_number();
        if self.config.is_expired(block_number, current) && !task.is_resolved() {
            return Err(HeaderRelayError::invalid_block_number().into());
        }

        extractable_field(field_index)?;

        let reward = ctx.value;
        if reward > self.config.max_reward {
            return Err(HeaderRelayError::reward_exceeds_limit().into());
        }

        match task {
            TaskEntry::Resolved { value } => {
                // Already answered: hand the reward back and deliver the cached value.
                if !reward.is_zero() {
                    self.send(ctx.caller, reward)?;
                }
                trace!(task_id, requester = %ctx.caller, "serving request from cache");
                return self
                    .dispatcher
                    .deliver_field(self.storage, ctx.caller, block_number, field_index, value)
                    .map(|()| task_id);
            }
            TaskEntry::Pending { .. } if !reward.is_zero() => {
                return Err(HeaderRelayError::task_already_pending().into());
            }
            _ => {}
        }

        if !reward.is_zero() {
            self.write_task(
                task_id,
                TaskEntry::Pending {
                    requester: ctx.caller,
                    reward,
                },
            )?;
            self.add_locked(reward)?;
        }

        self.emit(HeaderRelayEvent::HeaderRequested(IHeaderRelay::HeaderRequested {
            taskId: task_id,
            requester: ctx.caller,
            blockNumber: block_number,
            fieldIndex: field_index,
            reward,
        }))?;

        debug!(
            task_id,
            requester = %ctx.caller,
            block_number,
            field_index,
            %reward,
            "header requested"
        );
        Ok(task_id)
    }

    fn resolve_task(
        &mut self,
        responder: Address,
        block_number: u64,
        field_index: u8,
        header: &[u8],
        sink: Address,
    ) -> Result<()> {
        self.check_block_range(block_number)?;
        extractable_field(field_index)?;

        let task_id = task_id(block_number, field_index);
        let task = self.task(task_id)?;

        if let TaskEntry::Resolved { value } = task {
            trace!(task_id, %sink, "task already resolved, delivering cached value");
            return self
                .dispatcher
                .deliver_field(self.storage, sink, block_number, field_index, value);
        }

        let block_hash = self.block_hash_for_response(block_number)?;
        let value = verify_and_extract(header, block_hash, field_index)?;
        self.write_task(task_id, TaskEntry::Resolved { value })?;

        let (reward, recipient) = match task {
            TaskEntry::Pending { requester, reward } => {
                self.sub_locked(reward)?;
                self.send(responder, reward)?;
                (reward, requester)
            }
            _ => (U256::ZERO, sink),
        };

        self.emit(HeaderRelayEvent::HeaderResolved(IHeaderRelay::HeaderResolved {
            taskId: task_id,
            responder,
            value,
            reward,
        }))?;

        debug!(task_id, %responder, %recipient, %value, %reward, "task resolved");
        self.dispatcher
            .deliver_field(self.storage, recipient, block_number, field_index, value)
    }

    fn refund_task(&mut self, caller: Address, task_id: u64) -> Result<()> {
        if !self.is_refundable(task_id)? {
            return Err(HeaderRelayError::task_is_non_refundable().into());
        }

        let TaskEntry::Pending { requester, reward } = self.task(task_id)? else {
            return Err(HeaderRelayError::task_is_non_refundable().into());
        };

        self.write_task(task_id, TaskEntry::Refunded { requester })?;
        self.sub_locked(reward)?;
        self.send(requester, reward)?;

        self.emit(HeaderRelayEvent::TaskRefunded(IHeaderRelay::TaskRefunded {
            taskId: task_id,
            requester,
            amount: reward,
        }))?;

        debug!(task_id, %caller, %requester, %reward, "task refunded");
        Ok(())
    }

    fn check_block_range(&self, block_number: u64) -> Result<()> {
        if block_number == 0 || block_number > self.config.max_block_number {
            return Err(HeaderRelayError::invalid_block_number().into());
        }
        Ok(())
    }

    fn block_hash_for_response(&mut self, block_number: u64) -> Result<B256> {
        self.commitments()
            .get(block_number)?
            .ok_or_else(|| HeaderRelayError::failed_to_obtain_block_hash().into())
    }

    fn add_locked(&mut self, amount: U256) -> Result<()> {
        let total = self
            .total_locked()?
            .checked_add(amount)
            .ok_or_else(HeaderRelayPrecompileError::under_overflow)?;
        let total_locked = self.total_locked;
        total_locked.write(self, total)
    }

    fn sub_locked(&mut self, amount: U256) -> Result<()> {
        let total = self
            .total_locked()?
            .checked_sub(amount)
            .ok_or_else(HeaderRelayPrecompileError::under_overflow)?;
        let total_locked = self.total_locked;
        total_locked.write(self, total)
    }

    fn send(&mut self, to: Address, amount: U256) -> Result<()> {
        if !self.storage.transfer(self.address, to, amount)? {
            return Err(HeaderRelayError::failed_to_send_ether().into());
        }
        Ok(())
    }

    fn emit(&mut self, event: HeaderRelayEvent) -> Result<()> {
        self.storage.emit_event(self.address, event.into_log_data())
    }

    /// Runs `f` against a storage checkpoint, discarding every change it made if it fails.
    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.storage.checkpoint();
        let result = f(self);
        if result.is_ok() {
            self.storage.checkpoint_commit(checkpoint);
        } else {
            self.storage.checkpoint_revert(checkpoint);
        }
        result
    }
}

impl<S: PrecompileStorageProvider + ?Sized> StorageOps for HeaderRelay<'_, S> {
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
