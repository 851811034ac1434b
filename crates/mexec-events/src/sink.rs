//! The consumer seam: anything that observes executor events.

use std::sync::Arc;

use mexec_protocol::Event;
use tracing::warn;

use crate::error::SinkResult;

/// A consumer of executor events.
///
/// Sinks are shared between concurrent producers, so `emit` takes `&self`.
/// A sink that reports or persists an event must run the extraction protocol
/// first; it never holds on to exception state.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event) -> SinkResult<()>;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &Event) -> SinkResult<()> {
        (**self).emit(event)
    }
}

/// Forwards every event to each of its sinks, in insertion order.
#[derive(Clone, Default)]
pub struct FanOut {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanOut {
    /// Every sink sees the event even if an earlier one fails; the first
    /// error is returned.
    fn emit(&self, event: &Event) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(error) = sink.emit(event) {
                warn!(event = event.name(), %error, "event sink failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
