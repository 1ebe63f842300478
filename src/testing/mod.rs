//! Test doubles: a scriptable media sink, skewed clocks and network delays.

mod mock_sink;
mod network_sim;

pub use mock_sink::{MockSink, RecordedCall, SinkCall};
pub use network_sim::{NetworkSimulator, SkewedClock};
