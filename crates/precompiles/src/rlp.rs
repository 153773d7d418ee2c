//! Positional walker over the immediate children of a top-level RLP list.
//!
//! Only what header verification needs is supported: one list level, string children, raw
//! payload slices. Children are never decoded recursively.

use alloy_primitives::{B256, keccak256};
use alloy_rlp::Header;
use header_relay_contracts::precompiles::HeaderRelayError;
use tracing::trace;

use crate::error::{HeaderRelayPrecompileError, Result};

fn malformed(err: alloy_rlp::Error) -> HeaderRelayPrecompileError {
    trace!(%err, "rejecting rlp input");
    HeaderRelayError::malformed_encoding().into()
}

/// Decodes one item header and checks its declared payload fits the bytes that follow it.
fn decode_header(buf: &mut &[u8]) -> Result<Header> {
    let header = Header::decode(buf).map_err(malformed)?;
    if header.payload_length > buf.len() {
        return Err(malformed(alloy_rlp::Error::InputTooShort));
    }
    Ok(header)
}

/// A validated top-level RLP list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlpList<'a> {
    /// The list including its length prefix.
    encoded: &'a [u8],
    payload: &'a [u8],
}

impl<'a> RlpList<'a> {
    /// Parses the list header at the start of `buf`.
    ///
    /// Bytes after the end of the list are not part of it and are ignored.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let mut cursor = buf;
        let header = decode_header(&mut cursor)?;
        if !header.list {
            return Err(HeaderRelayError::malformed_encoding().into());
        }

        let prefix_len = buf.len() - cursor.len();
        Ok(Self {
            encoded: &buf[..prefix_len + header.payload_length],
            payload: &cursor[..header.payload_length],
        })
    }

    pub fn encoded(&self) -> &'a [u8] {
        self.encoded
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// keccak256 over the exact list span, prefix included. For a block header this is the
    /// block hash.
    pub fn hash(&self) -> B256 {
        keccak256(self.encoded)
    }

    pub fn fields(&self) -> RlpFields<'a> {
        RlpFields {
            remaining: self.payload,
        }
    }
}

/// Raw payload of one list child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RlpField<'a> {
    payload: &'a [u8],
}

impl<'a> RlpField<'a> {
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Sequential cursor over the children of an [`RlpList`].
#[derive(Debug, Clone)]
pub struct RlpFields<'a> {
    remaining: &'a [u8],
}

impl<'a> RlpFields<'a> {
    /// Advances past the next child and returns its payload.
    ///
    /// Past the last child this keeps returning an empty field. A nested list or a child
    /// whose declared length runs past the list is `MalformedEncoding`.
    pub fn next_field(&mut self) -> Result<RlpField<'a>> {
        if self.remaining.is_empty() {
            return Ok(RlpField::default());
        }

        let mut cursor = self.remaining;
        let header = decode_header(&mut cursor)?;
        if header.list {
            return Err(HeaderRelayError::malformed_encoding().into());
        }

        let (payload, rest) = cursor.split_at(header.payload_length);
        self.remaining = rest;
        Ok(RlpField { payload })
    }

    /// Skips `index` children and returns the one after them.
    pub fn nth_field(&mut self, index: usize) -> Result<RlpField<'a>> {
        for _ in 0..index {
            self.next_field()?;
        }
        self.next_field()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }
}

impl<'a> Iterator for RlpFields<'a> {
    type Item = Result<RlpField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let field = self.next_field();
        if field.is_err() {
            self.remaining = &[];
        }
        Some(field)
    }
}
