//! Detached, serializable event records.
//!
//! An [`EventRecord`] is what leaves the process: the extraction protocol
//! has already run, the live exception state is gone, and only a rendered
//! [`ErrorReport`] remains.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use mexec_protocol::{Event, ExcInfo, LifecyclePhase};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::SinkResult;
use crate::sink::EventSink;

/// Rendered form of a captured fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub exc_type: String,
    pub message: String,
}

impl From<&ExcInfo> for ErrorReport {
    fn from(exc: &ExcInfo) -> Self {
        Self {
            exc_type: exc.exc_type().to_owned(),
            message: exc.render(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub phase: LifecyclePhase,
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl EventRecord {
    /// Build a record stamped with the current time.
    pub fn capture(event: &Event) -> Self {
        Self::at(event, Utc::now())
    }

    pub fn at(event: &Event, timestamp: DateTime<Utc>) -> Self {
        let (exc_info, event) = event.extract_exc_info();
        Self {
            timestamp,
            phase: event.phase(),
            error: exc_info.as_ref().map(ErrorReport::from),
            event,
        }
    }

    pub fn to_json_line(&self) -> SinkResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Writes one JSON [`EventRecord`] per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write records to it.
    pub fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &Event) -> SinkResult<()> {
        let line = EventRecord::capture(event).to_json_line()?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mexec_protocol::{
        AgreementId, ComputationFinished, ComputationStarted, DownloadStarted, WorkerFinished,
    };

    #[test]
    fn record_detaches_the_fault() {
        let exc = ExcInfo::from_boxed("io", Box::new(std::io::Error::other("exe-unit gone")));
        let event: Event = WorkerFinished::failed(AgreementId::from_string("A1"), exc).into();

        let record = EventRecord::capture(&event);
        assert_eq!(record.phase, LifecyclePhase::Activity);
        assert_eq!(
            record.event,
            Event::from(WorkerFinished::ok(AgreementId::from_string("A1")))
        );
        assert_eq!(
            record.error,
            Some(ErrorReport {
                exc_type: "io".into(),
                message: "exe-unit gone".into(),
            })
        );
        assert!(event.has_exc_info());
    }

    #[test]
    fn record_json_shape() {
        let timestamp = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = EventRecord::at(
            &DownloadStarted {
                path: "/out/a.png".into(),
            }
            .into(),
            timestamp,
        );
        let json: serde_json::Value = serde_json::from_str(&record.to_json_line().unwrap()).unwrap();
        assert_eq!(json["phase"], "transfer");
        assert_eq!(json["event"]["type"], "DownloadStarted");
        assert_eq!(json["event"]["path"], "/out/a.png");
        assert!(json.get("error").is_none());

        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_event() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(&ComputationStarted {}.into()).unwrap();
        sink.emit(
            &ComputationFinished::failed(ExcInfo::from_boxed(
                "timeout",
                Box::new(std::io::Error::other("deadline exceeded")),
            ))
            .into(),
        )
        .unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let finished: EventRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(finished.event, Event::from(ComputationFinished::ok()));
        assert_eq!(finished.error.unwrap().message, "deadline exceeded");
    }
}
