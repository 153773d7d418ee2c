//! Block header verification and positional field extraction.

use alloy_primitives::B256;
use header_relay_contracts::precompiles::HeaderRelayError;

use crate::{error::Result, rlp::RlpList};

/// Position of a field inside an RLP-encoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HeaderField {
    ParentHash = 0,
    OmmersHash = 1,
    Beneficiary = 2,
    StateRoot = 3,
    TransactionsRoot = 4,
    ReceiptsRoot = 5,
    LogsBloom = 6,
    Difficulty = 7,
    Number = 8,
    GasLimit = 9,
    GasUsed = 10,
    Timestamp = 11,
    ExtraData = 12,
    MixHash = 13,
    Nonce = 14,
    BaseFeePerGas = 15,
    WithdrawalsRoot = 16,
    BlobGasUsed = 17,
    ExcessBlobGas = 18,
    ParentBeaconBlockRoot = 19,
    RequestsHash = 20,
}

impl HeaderField {
    pub const ALL: [Self; 21] = [
        Self::ParentHash,
        Self::OmmersHash,
        Self::Beneficiary,
        Self::StateRoot,
        Self::TransactionsRoot,
        Self::ReceiptsRoot,
        Self::LogsBloom,
        Self::Difficulty,
        Self::Number,
        Self::GasLimit,
        Self::GasUsed,
        Self::Timestamp,
        Self::ExtraData,
        Self::MixHash,
        Self::Nonce,
        Self::BaseFeePerGas,
        Self::WithdrawalsRoot,
        Self::BlobGasUsed,
        Self::ExcessBlobGas,
        Self::ParentBeaconBlockRoot,
        Self::RequestsHash,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Whether the field fits a single 32-byte word. `logsBloom` (256 bytes) and `extraData`
    /// (up to 32 bytes, but unbounded on some chains) are never served.
    pub const fn is_extractable(self) -> bool {
        !matches!(self, Self::LogsBloom | Self::ExtraData)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ParentHash => "parentHash",
            Self::OmmersHash => "ommersHash",
            Self::Beneficiary => "beneficiary",
            Self::StateRoot => "stateRoot",
            Self::TransactionsRoot => "transactionsRoot",
            Self::ReceiptsRoot => "receiptsRoot",
            Self::LogsBloom => "logsBloom",
            Self::Difficulty => "difficulty",
            Self::Number => "number",
            Self::GasLimit => "gasLimit",
            Self::GasUsed => "gasUsed",
            Self::Timestamp => "timestamp",
            Self::ExtraData => "extraData",
            Self::MixHash => "mixHash",
            Self::Nonce => "nonce",
            Self::BaseFeePerGas => "baseFeePerGas",
            Self::WithdrawalsRoot => "withdrawalsRoot",
            Self::BlobGasUsed => "blobGasUsed",
            Self::ExcessBlobGas => "excessBlobGas",
            Self::ParentBeaconBlockRoot => "parentBeaconBlockRoot",
            Self::RequestsHash => "requestsHash",
        }
    }
}

impl core::fmt::Display for HeaderField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves `index` to a field that can be served as a single word, or `InvalidHeaderIndex`.
pub fn extractable_field(index: u8) -> Result<HeaderField> {
    HeaderField::from_index(index)
        .filter(|field| field.is_extractable())
        .ok_or_else(|| HeaderRelayError::invalid_header_index().into())
}

/// Decodes `raw` as an RLP list and checks its hash against `expected_hash`.
pub fn verify_header(raw: &[u8], expected_hash: B256) -> Result<RlpList<'_>> {
    if raw.is_empty() {
        return Err(HeaderRelayError::header_is_empty().into());
    }

    let header = RlpList::new(raw)?;
    if header.hash() != expected_hash {
        return Err(HeaderRelayError::header_hash_mismatch().into());
    }
    Ok(header)
}

/// Verifies `raw` against `expected_hash` and returns the field at `field_index` as a
/// right-aligned, zero-padded word.
///
/// An index past the last field reads as empty and fails with `FieldDataIsEmpty`, like an
/// empty field does. Payloads wider than a word are `MalformedEncoding`.
pub fn verify_and_extract(raw: &[u8], expected_hash: B256, field_index: u8) -> Result<B256> {
    let header = verify_header(raw, expected_hash)?;
    let field = header.fields().nth_field(field_index as usize)?;

    if field.is_empty() {
        return Err(HeaderRelayError::field_data_is_empty().into());
    }
    if field.len() > 32 {
        return Err(HeaderRelayError::malformed_encoding().into());
    }
    Ok(B256::left_padding_from(field.payload()))
}
