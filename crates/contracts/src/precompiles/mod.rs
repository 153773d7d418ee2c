pub mod header_relay;
pub mod header_sink;

use alloy_primitives::{Address, address};

pub use header_relay::{HeaderRelayError, HeaderRelayEvent, IHeaderRelay};
pub use header_sink::{HeaderSinkCalls, IHeaderSink};

pub const HEADER_RELAY_ADDRESS: Address = address!("0xB10C000000000000000000000000000000000000");
