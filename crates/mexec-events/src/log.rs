//! One structured `tracing` line per event.

use mexec_protocol::Event;
use tracing::{debug, warn};

use crate::error::SinkResult;
use crate::sink::EventSink;

macro_rules! event_line {
    ($level:ident, $event:ident, $($rest:tt)+) => {
        $level!(
            event = $event.name(),
            phase = %$event.phase(),
            sub_id = $event.sub_id().map(|id| id.as_str()),
            prop_id = $event.prop_id().map(|id| id.as_str()),
            agr_id = $event.agr_id().map(|id| id.as_str()),
            task_id = $event.task_id().map(|id| id.as_str()),
            $($rest)+
        )
    };
}

/// Logs every event through `tracing`.
///
/// Faults carried by an event are detached and logged at `WARN` together
/// with the event; the backtrace, when one was captured, goes to `DEBUG`.
/// Failure variants are logged at `WARN`, everything else at `DEBUG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &Event) -> SinkResult<()> {
        log_event(event);
        Ok(())
    }
}

pub fn log_event(event: &Event) {
    let (exc_info, event) = event.extract_exc_info();
    let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_owned());

    match exc_info {
        Some(exc) => {
            event_line!(
                warn,
                event,
                exc_type = exc.exc_type(),
                error = %exc.render(),
                %payload,
                "event reported a failure"
            );
            if let Some(trace) = exc.traceback() {
                debug!(event = event.name(), traceback = %trace, "failure backtrace");
            }
        }
        None if event.is_failure_variant() => {
            event_line!(warn, event, %payload, "event");
        }
        None => {
            event_line!(debug, event, %payload, "event");
        }
    }
}
