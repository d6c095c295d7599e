//! Failure events and their observers.
//!
//! Two kinds of events leave the engine: a fetch failure (transport error,
//! non-success status, timeout, missing credentials) and a validation
//! failure. Sinks are registered explicitly on an [`Observers`] list owned by
//! whoever drives the engine.

use crate::lifecycle::Operation;
use crate::validator::FieldError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A failed fetch or save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub schema: String,
    pub operation: Operation,
    pub method: String,
    pub url: String,
    /// HTTP status, when the server answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
    /// Response body, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A failed validation pass, with every error found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub schema: String,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    FetchFailed(FetchFailure),
    ValidationFailed(ValidationFailure),
}

/// Receives engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

impl<F> EventSink for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn emit(&self, event: &Event) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Ordered list of registered sinks; emitting fans out to each of them.
#[derive(Clone, Default)]
pub struct Observers {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Observers {
    fn emit(&self, event: &Event) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
