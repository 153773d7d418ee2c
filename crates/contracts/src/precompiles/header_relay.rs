use alloy_sol_types::sol;

pub use IHeaderRelay::{
    IHeaderRelayErrors as HeaderRelayError, IHeaderRelayEvents as HeaderRelayEvent,
};

sol! {
    /// Header relay interface.
    ///
    /// Contracts request a single field of a historical block header, optionally locking a
    /// reward. Whoever first submits an RLP header whose keccak hash matches the known block
    /// hash resolves the request, collects the reward, and triggers delivery of the field to
    /// the requester through `IHeaderSink`.
    ///
    /// Task ids pack the natural key: `taskId = blockNumber << 8 | fieldIndex`.
    #[derive(Debug, PartialEq, Eq)]
    #[allow(clippy::too_many_arguments)]
    interface IHeaderRelay {
        enum TaskStatus {
            Unrequested,
            Pending,
            Resolved,
            Refunded
        }

        struct Task {
            TaskStatus status;
            uint64 blockNumber;
            uint8 fieldIndex;
            address requester;
            uint256 reward;
            bytes32 value;
        }

        // Ledger
        function request(uint64 blockNumber, uint8 fieldIndex) external payable returns (uint64 taskId);
        function response(uint64 blockNumber, uint8 fieldIndex, bytes calldata header, address sink) external;
        function responseHeader(uint64 blockNumber, bytes calldata header, address sink) external;
        function refund(uint64 taskId) external;
        function isRefundable(uint64 taskId) external view returns (bool);

        // Commitments
        function commit(uint64 blockNumber) external returns (bool);
        function commitMany(uint64[] calldata blockNumbers) external returns (uint256 committed);
        function committedHash(uint64 blockNumber) external view returns (bytes32);
        function blockHash(uint64 blockNumber) external view returns (bytes32);

        // Views
        function getTask(uint64 taskId) external view returns (Task memory);
        function resolvedValue(uint64 blockNumber, uint8 fieldIndex) external view returns (bytes32);
        function taskIdOf(uint64 blockNumber, uint8 fieldIndex) external view returns (uint64);
        function totalLocked() external view returns (uint256);

        // Events
        event HeaderRequested(uint64 indexed taskId, address indexed requester, uint64 blockNumber, uint8 fieldIndex, uint256 reward);
        event HeaderResolved(uint64 indexed taskId, address indexed responder, bytes32 value, uint256 reward);
        event TaskRefunded(uint64 indexed taskId, address indexed requester, uint256 amount);
        event BlockHashCommitted(uint64 indexed blockNumber, bytes32 blockHash);

        // Input validation
        error InvalidBlockNumber();
        error InvalidHeaderIndex();
        error RewardExceedsLimit();
        error OutOfRetentionRange();
        error CallerIsNotAContract();
        error TaskAlreadyPending();

        // Verification
        error HeaderIsEmpty();
        error HeaderHashMismatch();
        error FieldDataIsEmpty();
        error MalformedEncoding();

        // Availability
        error FailedToObtainBlockHash();
        error TaskIsNonRefundable();

        // Transfers and callbacks
        error FailedToSendEther();
        error ExternalCallFailed();
        error ReentrantCall();

        // Entry points
        error FunctionDoesNotExist();
        error DirectPaymentsNotSupported();
    }
}

impl HeaderRelayError {
    /// Creates an error for a zero, oversized, or expired block number.
    pub const fn invalid_block_number() -> Self {
        Self::InvalidBlockNumber(IHeaderRelay::InvalidBlockNumber {})
    }

    /// Creates an error for a field index outside the extractable catalog.
    pub const fn invalid_header_index() -> Self {
        Self::InvalidHeaderIndex(IHeaderRelay::InvalidHeaderIndex {})
    }

    /// Creates an error for a reward above the configured ceiling.
    pub const fn reward_exceeds_limit() -> Self {
        Self::RewardExceedsLimit(IHeaderRelay::RewardExceedsLimit {})
    }

    /// Creates an error for a block hash that is neither committed nor retained by the host.
    pub const fn out_of_retention_range() -> Self {
        Self::OutOfRetentionRange(IHeaderRelay::OutOfRetentionRange {})
    }

    /// Creates an error for requests coming from an externally owned account.
    pub const fn caller_is_not_a_contract() -> Self {
        Self::CallerIsNotAContract(IHeaderRelay::CallerIsNotAContract {})
    }

    /// Creates an error for a paid request on a key that already has a pending reward.
    pub const fn task_already_pending() -> Self {
        Self::TaskAlreadyPending(IHeaderRelay::TaskAlreadyPending {})
    }

    /// Creates an error for an empty header submission.
    pub const fn header_is_empty() -> Self {
        Self::HeaderIsEmpty(IHeaderRelay::HeaderIsEmpty {})
    }

    /// Creates an error for a header whose hash differs from the known block hash.
    pub const fn header_hash_mismatch() -> Self {
        Self::HeaderHashMismatch(IHeaderRelay::HeaderHashMismatch {})
    }

    /// Creates an error for an empty field payload.
    pub const fn field_data_is_empty() -> Self {
        Self::FieldDataIsEmpty(IHeaderRelay::FieldDataIsEmpty {})
    }

    /// Creates an error for bytes that are not a well-formed RLP header list.
    pub const fn malformed_encoding() -> Self {
        Self::MalformedEncoding(IHeaderRelay::MalformedEncoding {})
    }

    /// Creates an error when no block hash can be found for the requested block.
    pub const fn failed_to_obtain_block_hash() -> Self {
        Self::FailedToObtainBlockHash(IHeaderRelay::FailedToObtainBlockHash {})
    }

    /// Creates an error for a refund attempt on a task that does not qualify.
    pub const fn task_is_non_refundable() -> Self {
        Self::TaskIsNonRefundable(IHeaderRelay::TaskIsNonRefundable {})
    }

    /// Creates an error when the recipient rejects a payment.
    pub const fn failed_to_send_ether() -> Self {
        Self::FailedToSendEther(IHeaderRelay::FailedToSendEther {})
    }

    /// Creates an error when the sink callback reverts or exhausts its gas stipend.
    pub const fn external_call_failed() -> Self {
        Self::ExternalCallFailed(IHeaderRelay::ExternalCallFailed {})
    }

    /// Creates an error for a nested call into a guarded entry point.
    pub const fn reentrant_call() -> Self {
        Self::ReentrantCall(IHeaderRelay::ReentrantCall {})
    }

    /// Creates an error for unknown selectors and fallback calls.
    pub const fn function_does_not_exist() -> Self {
        Self::FunctionDoesNotExist(IHeaderRelay::FunctionDoesNotExist {})
    }

    /// Creates an error for value sent outside of `request`.
    pub const fn direct_payments_not_supported() -> Self {
        Self::DirectPaymentsNotSupported(IHeaderRelay::DirectPaymentsNotSupported {})
    }
}
