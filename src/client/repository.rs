//! # Client Sync Repository
//!
//! Keeps a count stream and any number of window streams live for the
//! current filter.
//!
//! - The filter is staged lazily, at most once per filter, no matter how
//!   many streams ask for a token at the same time
//! - A stream refused with 403 drops the cached token, re-stages and
//!   reopens once; a second refusal is surfaced to the consumer
//! - Changing the filter cancels every open inner stream and reopens it
//!   against a token for the new filter. Updates still queued for the old
//!   filter are discarded, so the first update read after `set_filter`
//!   belongs to the new one

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use super::errors::{ClientError, ClientResult};
use super::transport::{EventStream, SyncTransport};
use crate::observability::{log_event_at, Event, Severity};
use crate::records::OrderFilter;
use crate::sync::{token_prefix, WindowRequest, WindowResult};

/// Buffered updates per output stream
const STREAM_BUFFER: usize = 16;

/// Token staged for one specific filter
#[derive(Debug, Clone)]
struct StagedToken {
    filter: OrderFilter,
    token: String,
}

/// Current filter and the number of times it has changed
#[derive(Debug, Clone)]
struct FilterState {
    epoch: u64,
    filter: OrderFilter,
}

/// An update and the filter epoch it was produced under
type Tagged<V> = (u64, ClientResult<V>);

struct Shared<T> {
    transport: T,
    filter: watch::Sender<FilterState>,
    staged: Mutex<Option<StagedToken>>,
}

impl<T: SyncTransport> Shared<T> {
    /// Cached token for `filter`, staging it first if needed.
    ///
    /// The lock is held across the staging call, so concurrent callers
    /// share one staging request.
    async fn token_for(&self, filter: &OrderFilter) -> ClientResult<String> {
        let mut staged = self.staged.lock().await;
        if let Some(cached) = staged.as_ref() {
            if &cached.filter == filter {
                return Ok(cached.token.clone());
            }
        }

        let token = self.transport.stage(filter).await?;
        log_event_at(Severity::Debug, Event::ClientStaged, &[("token", token_prefix(&token))]);
        *staged = Some(StagedToken {
            filter: filter.clone(),
            token: token.clone(),
        });
        Ok(token)
    }

    /// Forget `token` unless it was already replaced
    async fn invalidate(&self, token: &str) {
        let mut staged = self.staged.lock().await;
        if staged.as_ref().map(|s| s.token.as_str()) == Some(token) {
            *staged = None;
        }
    }

    async fn open_with_retry<F: Feed>(&self, feed: &F, filter: &OrderFilter) -> ClientResult<EventStream<F::Item>> {
        let token = self.token_for(filter).await?;
        match feed.open(&self.transport, &token).await {
            Err(ClientError::SessionRejected(reason)) => {
                log_event_at(Severity::Warn, Event::ClientRestage, &[
                    ("reason", reason.as_str()),
                    ("stream", feed.name()),
                ]);
                self.invalidate(&token).await;
                let token = self.token_for(filter).await?;
                feed.open(&self.transport, &token).await
            }
            other => other,
        }
    }
}

/// One kind of server stream
#[async_trait]
trait Feed: Send + Sync + 'static {
    type Item: Send + 'static;

    fn name(&self) -> &'static str;

    async fn open<T: SyncTransport>(&self, transport: &T, token: &str) -> ClientResult<EventStream<Self::Item>>;
}

struct CountFeed;

#[async_trait]
impl Feed for CountFeed {
    type Item = u64;

    fn name(&self) -> &'static str {
        "count"
    }

    async fn open<T: SyncTransport>(&self, transport: &T, token: &str) -> ClientResult<EventStream<u64>> {
        transport.open_count(token).await
    }
}

struct WindowFeed(WindowRequest);

#[async_trait]
impl Feed for WindowFeed {
    type Item = WindowResult;

    fn name(&self) -> &'static str {
        "window"
    }

    async fn open<T: SyncTransport>(&self, transport: &T, token: &str) -> ClientResult<EventStream<WindowResult>> {
        transport.open_window(token, self.0).await
    }
}

/// Follow the current filter until the consumer goes away or an error is
/// surfaced.
async fn follow<T: SyncTransport, F: Feed>(
    shared: Arc<Shared<T>>,
    feed: F,
    tx: mpsc::Sender<Tagged<F::Item>>,
) {
    let mut filters = shared.filter.subscribe();

    loop {
        let (epoch, filter) = {
            let current = filters.borrow_and_update();
            (current.epoch, current.filter.clone())
        };

        let opened = tokio::select! {
            biased;
            _ = tx.closed() => return,
            changed = filters.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
            opened = shared.open_with_retry(&feed, &filter) => opened,
        };

        let mut events = match opened {
            Ok(events) => events,
            Err(e) => {
                let _ = tx.send((epoch, Err(e))).await;
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = tx.closed() => return,
                changed = filters.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    log_event_at(Severity::Debug, Event::ClientReopen, &[("stream", feed.name())]);
                    break;
                }
                next = events.next() => match next {
                    Some(Ok(update)) => {
                        if tx.send((epoch, Ok(update))).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.send((epoch, Err(e))).await;
                        return;
                    }
                    None => {
                        let _ = tx.send((epoch, Err(ClientError::StreamClosed))).await;
                        return;
                    }
                },
            }
        }
    }
}

/// Updates of one live stream. Dropping it closes the underlying
/// connection.
pub struct LiveStream<V> {
    rx: ReceiverStream<Tagged<V>>,
    filters: watch::Receiver<FilterState>,
    task: JoinHandle<()>,
}

impl<V> Stream for LiveStream<V> {
    type Item = ClientResult<V>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.rx).poll_next(cx)) {
                Some((epoch, Ok(_))) if epoch < self.filters.borrow().epoch => continue,
                Some((_, item)) => return Poll::Ready(Some(item)),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl<V> Drop for LiveStream<V> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Client-side view of the live filtered order set
pub struct ClientSyncRepository<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ClientSyncRepository<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: SyncTransport> ClientSyncRepository<T> {
    pub fn new(transport: T, filter: OrderFilter) -> Self {
        let (filter, _) = watch::channel(FilterState { epoch: 0, filter });
        Self {
            shared: Arc::new(Shared {
                transport,
                filter,
                staged: Mutex::new(None),
            }),
        }
    }

    /// Replace the filter. Open streams reopen for the new filter and drop
    /// updates queued for the old one; setting an equal filter is a no-op.
    pub fn set_filter(&self, filter: OrderFilter) {
        self.shared.filter.send_if_modified(|current| {
            if current.filter == filter {
                return false;
            }
            current.filter = filter;
            current.epoch += 1;
            true
        });
    }

    /// Current filter
    pub fn filter(&self) -> OrderFilter {
        self.shared.filter.borrow().filter.clone()
    }

    /// Live total for the current filter.
    ///
    /// Must be called from within a tokio runtime.
    pub fn count_stream(&self) -> LiveStream<u64> {
        self.spawn(CountFeed)
    }

    /// Live contents of `window` for the current filter.
    ///
    /// Must be called from within a tokio runtime.
    pub fn window_stream(&self, window: WindowRequest) -> LiveStream<WindowResult> {
        self.spawn(WindowFeed(window))
    }

    /// Token currently cached, if any
    pub async fn staged_token(&self) -> Option<String> {
        self.shared.staged.lock().await.as_ref().map(|s| s.token.clone())
    }

    fn spawn<F: Feed>(&self, feed: F) -> LiveStream<F::Item> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let task = tokio::spawn(follow(Arc::clone(&self.shared), feed, tx));
        LiveStream {
            rx: ReceiverStream::new(rx),
            filters: self.shared.filter.subscribe(),
            task,
        }
    }
}
