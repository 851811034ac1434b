//! Event consumers for the marketplace executor.
//!
//! Every sink here runs the extraction protocol before it reports or
//! persists an event, so exception state never reaches a log line or a
//! serialized record.

pub mod error;
pub mod log;
pub mod record;
pub mod sink;
pub mod summary;

pub use error::{SinkError, SinkResult};
pub use log::{LogSink, log_event};
pub use record::{ErrorReport, EventRecord, JsonLinesSink};
pub use sink::{EventSink, FanOut};
pub use summary::{ComputationSummary, SummaryLogger};
