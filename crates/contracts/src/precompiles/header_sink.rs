use alloy_sol_types::sol;

pub use IHeaderSink::IHeaderSinkCalls as HeaderSinkCalls;

sol! {
    /// Callback surface a consumer contract exposes to receive verified header data.
    ///
    /// Calls arrive from the relay with a fixed gas stipend and no value attached.
    /// Anything returned by the sink is ignored; a revert fails the relay call.
    #[derive(Debug, PartialEq, Eq)]
    interface IHeaderSink {
        /// Receives one verified header field, right-aligned into 32 bytes.
        function receiveHeaderField(uint64 blockNumber, uint8 fieldIndex, bytes32 value) external;

        /// Receives a whole verified RLP-encoded header.
        function receiveHeader(uint64 blockNumber, bytes calldata header) external;
    }
}
