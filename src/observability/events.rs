//! Observable events
//!
//! Every log line the service writes names one of these events.

use std::fmt;

/// Observable events in the sync service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Server startup begins
    BootStart,
    /// Configuration loaded
    ConfigLoaded,
    /// Server is accepting connections
    Serving,
    /// Shutdown initiated
    ShutdownStart,

    // Record store
    /// Store seeded with initial orders
    StoreSeeded,
    /// A random order was inserted by the generator
    RandomOrderInserted,
    /// The random order generator failed to insert
    RandomOrderFailed,

    // Staging
    /// A filter was staged behind a token
    FilterStaged,
    /// Expired staged filters were swept
    StagingSwept,

    // Sessions
    /// A stream session passed token resolution
    StreamOpened,
    /// A stream session was refused (missing/unknown/expired token)
    SessionRejected,
    /// A stream session ended
    StreamClosed,

    // Recomputation
    /// A recomputation was started for a version
    RecomputeStarted,
    /// An in-flight recomputation was abandoned for a newer version
    RecomputeSuperseded,
    /// A recomputation result was delivered
    ResultDelivered,
    /// A recomputation failed; the stream is closed
    RecomputeFailed,

    // Client
    /// The client staged a filter
    ClientStaged,
    /// The client re-staged after a rejected session token
    ClientRestage,
    /// The client reopened a stream after a filter change
    ClientReopen,
    /// The client dropped an undecodable stream event
    StreamEventDropped,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "PAGESTREAM_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "PAGESTREAM_SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",

            Event::StoreSeeded => "STORE_SEEDED",
            Event::RandomOrderInserted => "RANDOM_ORDER_INSERTED",
            Event::RandomOrderFailed => "RANDOM_ORDER_FAILED",

            Event::FilterStaged => "FILTER_STAGED",
            Event::StagingSwept => "STAGING_SWEPT",

            Event::StreamOpened => "STREAM_OPENED",
            Event::SessionRejected => "SESSION_REJECTED",
            Event::StreamClosed => "STREAM_CLOSED",

            Event::RecomputeStarted => "RECOMPUTE_BEGIN",
            Event::RecomputeSuperseded => "RECOMPUTE_SUPERSEDED",
            Event::ResultDelivered => "RESULT_DELIVERED",
            Event::RecomputeFailed => "RECOMPUTE_FAILED",

            Event::ClientStaged => "CLIENT_STAGED",
            Event::ClientRestage => "CLIENT_RESTAGE",
            Event::ClientReopen => "CLIENT_REOPEN",
            Event::StreamEventDropped => "STREAM_EVENT_DROPPED",
        }
    }

    /// Returns true if this event indicates a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::RecomputeFailed | Event::RandomOrderFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_unique() {
        let all = [
            Event::BootStart,
            Event::ConfigLoaded,
            Event::Serving,
            Event::ShutdownStart,
            Event::StoreSeeded,
            Event::RandomOrderInserted,
            Event::RandomOrderFailed,
            Event::FilterStaged,
            Event::StagingSwept,
            Event::StreamOpened,
            Event::SessionRejected,
            Event::StreamClosed,
            Event::RecomputeStarted,
            Event::RecomputeSuperseded,
            Event::ResultDelivered,
            Event::RecomputeFailed,
            Event::ClientStaged,
            Event::ClientRestage,
            Event::ClientReopen,
            Event::StreamEventDropped,
        ];
        let names: std::collections::HashSet<_> = all.iter().map(|e| e.as_str()).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::RecomputeFailed.is_failure());
        assert!(!Event::ResultDelivered.is_failure());
    }
}
