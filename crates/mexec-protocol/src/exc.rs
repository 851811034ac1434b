//! Captured exception state carried by events that report the end of a
//! fallible, multi-step operation (a whole computation, a worker run).
//!
//! An [`ExcInfo`] holds live, non-serializable state (the error value and an
//! optional backtrace). It must be detached from its event through
//! [`crate::Event::extract_exc_info`] before the event is logged or
//! serialized.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Shared, thread-safe error value.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// The captured exception triple: error type, error value, and trace.
#[derive(Clone)]
pub struct ExcInfo {
    exc_type: String,
    value: SharedError,
    traceback: Option<Arc<Backtrace>>,
}

impl ExcInfo {
    /// Capture `err` together with a backtrace of the current call site.
    ///
    /// The backtrace is only recorded when backtraces are enabled through
    /// `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
    pub fn capture<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let backtrace = Backtrace::capture();
        let traceback = match backtrace.status() {
            BacktraceStatus::Captured => Some(Arc::new(backtrace)),
            _ => None,
        };
        Self {
            exc_type: std::any::type_name::<E>().to_owned(),
            value: Arc::new(err),
            traceback,
        }
    }

    /// Wrap an already boxed error. The concrete type name is not recoverable
    /// from a trait object, so `exc_type` is supplied by the caller.
    pub fn from_boxed(
        exc_type: impl Into<String>,
        err: Box<dyn StdError + Send + Sync + 'static>,
    ) -> Self {
        Self {
            exc_type: exc_type.into(),
            value: Arc::from(err),
            traceback: None,
        }
    }

    /// A copy of this triple with the trace dropped.
    pub fn without_backtrace(&self) -> Self {
        Self {
            exc_type: self.exc_type.clone(),
            value: Arc::clone(&self.value),
            traceback: None,
        }
    }

    pub fn exc_type(&self) -> &str {
        &self.exc_type
    }

    pub fn value(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.value.as_ref()
    }

    pub fn traceback(&self) -> Option<&Backtrace> {
        self.traceback.as_deref()
    }

    /// The error message followed by its `source()` chain, joined by `": "`.
    pub fn render(&self) -> String {
        let mut rendered = self.value.to_string();
        let mut source = self.value.source();
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

/// Two triples are equal when they hold the very same captured error and
/// trace. Distinct captures of equal-looking errors are not equal.
impl PartialEq for ExcInfo {
    fn eq(&self, other: &Self) -> bool {
        let same_trace = match (&self.traceback, &other.traceback) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.exc_type == other.exc_type && Arc::ptr_eq(&self.value, &other.value) && same_trace
    }
}

impl fmt::Debug for ExcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcInfo")
            .field("exc_type", &self.exc_type)
            .field("value", &self.render())
            .field("traceback", &self.traceback.is_some())
            .finish()
    }
}

impl fmt::Display for ExcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exc_type, self.render())
    }
}

/// Capability of an event to carry an optional [`ExcInfo`].
pub trait HasExcInfo: Sized {
    fn exc_info(&self) -> Option<&ExcInfo>;

    /// A new value identical to `self` except for the exception field.
    fn with_exc_info(&self, exc_info: Option<ExcInfo>) -> Self;

    /// Return the captured triple and a copy of `self` without it.
    fn extract(&self) -> (Option<ExcInfo>, Self) {
        (self.exc_info().cloned(), self.with_exc_info(None))
    }

    /// `true` when the event reports a failure.
    fn is_failure(&self) -> bool {
        self.exc_info().is_some()
    }
}
