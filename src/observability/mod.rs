//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle and protocol events
//! - Operational counters
//!
//! Observability is read-only: a failure to log never fails the caller.
//!
//! # Usage
//!
//! ```ignore
//! use pagestream::observability::{log_event_with_fields, Event, Logger};
//!
//! log_event_with_fields(Event::FilterStaged, &[("token", &token)]);
//! Logger::warn("STREAM_EVENT_DROPPED", &[("stream", "count")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
///
/// Failure events are written at ERROR, everything else at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log an event at an explicit severity
pub fn log_event_at(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}
