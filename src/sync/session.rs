//! # Stream Sessions
//!
//! One session serves one stream connection: `Resolving -> Streaming ->
//! Closed`. A count stream and a window stream of the same logical client
//! session are two independent sessions that resolve the same token.
//!
//! Resolution happens in [`StreamSessionHandler::open`]; a missing,
//! unknown or expired token closes the session before anything is
//! streamed. The returned [`SessionStream`] owns the switch-latest driver:
//! dropping it (client disconnect) aborts the driver, which cancels the
//! in-flight recomputation and drops the version subscription.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::errors::{SyncError, SyncResult};
use super::notifier::ChangeNotifier;
use super::reexecutor::{run_switch_latest, Query, QueryReexecutor, Recomputed};
use super::staging::FilterStagingCache;
use crate::observability::{log_event_at, log_event_with_fields, Event, MetricsRegistry, Severity};

/// Header carrying the staged-filter token
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Buffered results per session before the driver waits on the consumer
const SESSION_BUFFER: usize = 16;

/// Lifecycle of a stream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Resolving,
    Streaming,
    Closed,
}

/// Opens stream sessions against the shared core components
pub struct StreamSessionHandler {
    staging: Arc<FilterStagingCache>,
    notifier: Arc<ChangeNotifier>,
    reexecutor: Arc<QueryReexecutor>,
    metrics: Arc<MetricsRegistry>,
    dedupe_unchanged: bool,
}

impl StreamSessionHandler {
    pub fn new(
        staging: Arc<FilterStagingCache>,
        notifier: Arc<ChangeNotifier>,
        reexecutor: Arc<QueryReexecutor>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            staging,
            notifier,
            reexecutor,
            metrics,
            dedupe_unchanged: true,
        }
    }

    /// Suppress results equal to the previously delivered one
    pub fn with_dedupe(mut self, dedupe_unchanged: bool) -> Self {
        self.dedupe_unchanged = dedupe_unchanged;
        self
    }

    /// Resolve `token` and start streaming `query`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, token: Option<&str>, query: Query) -> SyncResult<SessionStream> {
        let session_id = Uuid::new_v4().to_string();

        let resolved = match token {
            None => Err(SyncError::MissingToken(REQUEST_ID_HEADER)),
            Some(token) => self
                .staging
                .resolve(token)
                .ok_or(SyncError::SessionRejected),
        };
        let filter = match resolved {
            Ok(filter) => filter,
            Err(e) => {
                self.metrics.increment_sessions_rejected();
                log_event_with_fields(Event::SessionRejected, &[
                    ("reason", &e.to_string()),
                    ("session", &session_id),
                    ("stream", query.kind()),
                ]);
                return Err(e);
            }
        };

        // Subscribe before the first recomputation so no bump is missed
        let versions = self.notifier.subscribe();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let driver = tokio::spawn(run_switch_latest(
            Arc::clone(&self.reexecutor),
            filter,
            query,
            versions,
            self.dedupe_unchanged,
            tx,
        ));

        self.metrics.increment_sessions_opened();
        log_event_with_fields(Event::StreamOpened, &[
            ("session", &session_id),
            ("stream", query.kind()),
        ]);

        Ok(SessionStream {
            id: session_id,
            query,
            state: SessionState::Streaming,
            rx,
            driver,
            metrics: Arc::clone(&self.metrics),
        })
    }
}

/// Results of one streaming session.
///
/// Yields `Ok(Recomputed)` for every delivered result. A recomputation
/// failure is yielded once as `Err` and the stream then ends.
pub struct SessionStream {
    id: String,
    query: Query,
    state: SessionState,
    rx: mpsc::Receiver<SyncResult<Recomputed>>,
    driver: JoinHandle<()>,
    metrics: Arc<MetricsRegistry>,
}

impl SessionStream {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> Query {
        self.query
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl Stream for SessionStream {
    type Item = SyncResult<Recomputed>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.state == SessionState::Closed {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(e))) => {
                self.state = SessionState::Closed;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.state = SessionState::Closed;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.driver.abort();
        self.state = SessionState::Closed;
        self.metrics.increment_sessions_closed();
        log_event_at(Severity::Info, Event::StreamClosed, &[
            ("session", &self.id),
            ("stream", self.query.kind()),
        ]);
    }
}
