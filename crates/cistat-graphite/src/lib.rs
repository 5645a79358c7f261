//! # cistat-graphite
//!
//! Metric delivery to a Graphite collector over the plaintext protocol.
//!
//! Each metric is written as `<path> <value> <epoch-seconds>\n` on its own
//! connection. Delivery failures are logged and swallowed by [`send_stat`].

mod sender;
mod sink;

pub use sender::GraphiteSender;
pub use sink::{epoch_secs, format_metric, send_stat, Metric, MetricSink, RecordingSink};
