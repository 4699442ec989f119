//! # Query Re-executor
//!
//! Recomputes a count or a window against the record store, and drives
//! recomputation from a version subscription with switch-latest semantics:
//!
//! - every observed version starts a new recomputation tagged with a new
//!   generation
//! - the previous in-flight recomputation is aborted
//! - a result is delivered only if its generation is still current
//!
//! Delivered results are therefore non-decreasing in version, and once the
//! versions stop moving the last delivered result reflects the latest one.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use super::errors::{SyncError, SyncResult};
use super::notifier::VersionSubscription;
use super::window::{WindowRequest, WindowResult};
use crate::observability::{log_event_at, Event, MetricsRegistry, Severity};
use crate::records::{OrderFilter, RecordStore, StoreResult};

/// What a stream recomputes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Count,
    Window(WindowRequest),
}

impl Query {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Count => "count",
            Query::Window(_) => "window",
        }
    }
}

/// Outcome of one recomputation
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Count(u64),
    Window(WindowResult),
}

impl QueryResult {
    /// Event payload: a decimal integer for counts, a JSON object for windows
    pub fn to_payload(&self) -> SyncResult<String> {
        match self {
            QueryResult::Count(total) => Ok(total.to_string()),
            QueryResult::Window(window) => Ok(serde_json::to_string(window)?),
        }
    }
}

/// A delivered result with the version and generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Recomputed {
    pub version: u64,
    pub generation: u64,
    pub result: QueryResult,
}

/// Runs recomputations against a record store
pub struct QueryReexecutor {
    store: Arc<dyn RecordStore>,
    metrics: Arc<MetricsRegistry>,
}

impl QueryReexecutor {
    pub fn new(store: Arc<dyn RecordStore>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { store, metrics }
    }

    /// One synchronous recomputation
    pub fn compute(&self, filter: &OrderFilter, query: Query) -> StoreResult<QueryResult> {
        compute(self.store.as_ref(), filter, query)
    }

    /// One recomputation on the blocking pool
    pub async fn execute(&self, filter: OrderFilter, query: Query) -> SyncResult<QueryResult> {
        self.metrics.increment_recomputes_started();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || compute(store.as_ref(), &filter, query))
            .await
            .map_err(|e| SyncError::Internal(format!("recomputation task failed: {}", e)))?
            .map_err(SyncError::from)
    }
}

fn compute(store: &dyn RecordStore, filter: &OrderFilter, query: Query) -> StoreResult<QueryResult> {
    match query {
        Query::Count => Ok(QueryResult::Count(store.count(filter)?)),
        Query::Window(window) => {
            let page = store.page(filter, window.position, window.size)?;
            Ok(QueryResult::Window(WindowResult::from_page(window, page)))
        }
    }
}

type InFlight = JoinHandle<(u64, SyncResult<QueryResult>)>;

fn spawn_recompute(
    reexecutor: &Arc<QueryReexecutor>,
    filter: &OrderFilter,
    query: Query,
    generation: u64,
) -> InFlight {
    let reexecutor = Arc::clone(reexecutor);
    let filter = filter.clone();
    tokio::spawn(async move {
        let result = reexecutor.execute(filter, query).await;
        (generation, result)
    })
}

/// Await the in-flight recomputation, or never resolve if there is none
async fn join_in_flight(slot: &mut Option<InFlight>) -> Result<(u64, SyncResult<QueryResult>), JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Drive recomputation of `query` over `filter` until the receiver goes
/// away, the notifier is dropped, or a recomputation fails.
///
/// The first recomputation runs for the subscription's current version.
/// A failure is sent as `Err(SyncError::RecomputeFailed)` and ends the
/// loop; no result of the failed generation is ever sent. With
/// `dedupe_unchanged`, a result equal to the last delivered one is skipped.
pub async fn run_switch_latest(
    reexecutor: Arc<QueryReexecutor>,
    filter: OrderFilter,
    query: Query,
    mut versions: VersionSubscription,
    dedupe_unchanged: bool,
    tx: mpsc::Sender<SyncResult<Recomputed>>,
) {
    let kind = query.kind();
    let metrics = Arc::clone(&reexecutor.metrics);

    let mut generation: u64 = 0;
    let mut version = versions.current();
    let mut in_flight = Some(spawn_recompute(&reexecutor, &filter, query, generation));
    let mut last_delivered: Option<QueryResult> = None;
    let mut notifier_open = true;

    loop {
        tokio::select! {
            biased;

            _ = tx.closed() => break,

            next = versions.changed(), if notifier_open => {
                let Some(next_version) = next else {
                    notifier_open = false;
                    if in_flight.is_none() {
                        break;
                    }
                    continue;
                };

                if let Some(stale) = in_flight.take() {
                    stale.abort();
                    metrics.increment_recomputes_superseded();
                    log_event_at(Severity::Debug, Event::RecomputeSuperseded, &[
                        ("generation", &generation.to_string()),
                        ("stream", kind),
                    ]);
                }

                generation += 1;
                version = next_version;
                log_event_at(Severity::Trace, Event::RecomputeStarted, &[
                    ("generation", &generation.to_string()),
                    ("stream", kind),
                    ("version", &version.to_string()),
                ]);
                in_flight = Some(spawn_recompute(&reexecutor, &filter, query, generation));
            }

            joined = join_in_flight(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                match joined {
                    Ok((finished, Ok(result))) => {
                        if finished != generation {
                            continue;
                        }
                        if dedupe_unchanged && last_delivered.as_ref() == Some(&result) {
                            if !notifier_open {
                                break;
                            }
                            continue;
                        }
                        last_delivered = Some(result.clone());
                        let delivered = Recomputed { version, generation, result };
                        if tx.send(Ok(delivered)).await.is_err() {
                            break;
                        }
                        metrics.increment_results_delivered();
                        log_event_at(Severity::Trace, Event::ResultDelivered, &[
                            ("generation", &generation.to_string()),
                            ("stream", kind),
                            ("version", &version.to_string()),
                        ]);
                        if !notifier_open {
                            break;
                        }
                    }
                    Ok((_, Err(e))) => {
                        metrics.increment_recomputes_failed();
                        log_event_at(Severity::Error, Event::RecomputeFailed, &[
                            ("error", &e.to_string()),
                            ("stream", kind),
                            ("version", &version.to_string()),
                        ]);
                        let failure = match e {
                            SyncError::RecomputeFailed(_) => e,
                            other => SyncError::RecomputeFailed(other.to_string()),
                        };
                        let _ = tx.send(Err(failure)).await;
                        break;
                    }
                    Err(join_error) if join_error.is_cancelled() => {}
                    Err(join_error) => {
                        metrics.increment_recomputes_failed();
                        log_event_at(Severity::Error, Event::RecomputeFailed, &[
                            ("error", &join_error.to_string()),
                            ("stream", kind),
                        ]);
                        let _ = tx
                            .send(Err(SyncError::RecomputeFailed("recomputation panicked".into())))
                            .await;
                        break;
                    }
                }
            }
        }
    }

    if let Some(abandoned) = in_flight.take() {
        abandoned.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Order, OrderStatus, StoreError};
    use crate::sync::ChangeNotifier;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Count store whose answers and latencies are scripted per call
    struct ScriptedStore {
        calls: AtomicU64,
        script: Vec<(u64, u64)>, // (delay_ms, count); last entry repeats
        fail_on_call: Option<u64>,
    }

    impl ScriptedStore {
        fn new(script: Vec<(u64, u64)>) -> Self {
            Self { calls: AtomicU64::new(0), script, fail_on_call: None }
        }
    }

    impl RecordStore for ScriptedStore {
        fn count(&self, _filter: &OrderFilter) -> StoreResult<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(StoreError::Unavailable("disk gone".into()));
            }
            let index = (call as usize).min(self.script.len() - 1);
            let (delay, count) = self.script[index];
            std::thread::sleep(Duration::from_millis(delay));
            Ok(count)
        }

        fn page(&self, _filter: &OrderFilter, position: u64, size: u64) -> StoreResult<Vec<Order>> {
            let total = 35u64;
            Ok((position..total.min(position + size))
                .map(|i| Order {
                    id: i + 1,
                    order_date: "2025-01-01".to_string(),
                    customer: "Lucas Rodriguez".to_string(),
                    delivery_address: "City 4, Street 4".to_string(),
                    status: OrderStatus::New,
                    amount: 1.0,
                })
                .collect())
        }
    }

    fn reexecutor(store: impl RecordStore) -> Arc<QueryReexecutor> {
        Arc::new(QueryReexecutor::new(Arc::new(store), Arc::new(MetricsRegistry::new())))
    }

    async fn next(rx: &mut mpsc::Receiver<SyncResult<Recomputed>>) -> SyncResult<Recomputed> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for result")
            .expect("driver ended")
    }

    #[tokio::test]
    async fn test_execute_window_boundary() {
        let reexec = reexecutor(ScriptedStore::new(vec![(0, 35)]));
        let window = WindowRequest::new(30, 10).unwrap();
        let result = reexec.execute(OrderFilter::all(), Query::Window(window)).await.unwrap();
        let QueryResult::Window(items) = result else { panic!("expected window") };
        assert_eq!(items.keys().collect::<Vec<_>>(), vec![30, 31, 32, 33, 34]);
    }

    #[tokio::test]
    async fn test_initial_result_then_recompute_on_bump() {
        let notifier = ChangeNotifier::new();
        let reexec = reexecutor(ScriptedStore::new(vec![(0, 7), (0, 8)]));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(run_switch_latest(reexec, OrderFilter::all(), Query::Count, notifier.subscribe(), true, tx));

        let first = next(&mut rx).await.unwrap();
        assert_eq!(first.result, QueryResult::Count(7));
        assert_eq!(first.version, 0);

        notifier.bump();
        let second = next(&mut rx).await.unwrap();
        assert_eq!(second.result, QueryResult::Count(8));
        assert!(second.version >= first.version);
    }

    #[tokio::test]
    async fn test_superseded_result_is_never_delivered() {
        let notifier = ChangeNotifier::new();
        // First call is slow and stale, second is fast
        let reexec = reexecutor(ScriptedStore::new(vec![(300, 111), (0, 222)]));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(run_switch_latest(reexec, OrderFilter::all(), Query::Count, notifier.subscribe(), false, tx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        notifier.bump();

        let delivered = next(&mut rx).await.unwrap();
        assert_eq!(delivered.result, QueryResult::Count(222));
        assert_eq!(delivered.generation, 1);
        assert_eq!(delivered.version, 1);

        // The slow generation-0 answer must not show up later
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_versions_never_regress() {
        let notifier = Arc::new(ChangeNotifier::new());
        let reexec = reexecutor(ScriptedStore::new(vec![(5, 1)]));
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(run_switch_latest(reexec, OrderFilter::all(), Query::Count, notifier.subscribe(), false, tx));

        let bumper = {
            let notifier = Arc::clone(&notifier);
            tokio::spawn(async move {
                for _ in 0..20 {
                    notifier.bump();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        };
        bumper.await.unwrap();

        let mut last = 0;
        loop {
            let item = next(&mut rx).await.unwrap();
            assert!(item.version >= last);
            last = item.version;
            if last == 20 {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_dedupe_skips_unchanged() {
        let notifier = ChangeNotifier::new();
        let reexec = reexecutor(ScriptedStore::new(vec![(0, 5), (0, 5), (0, 6)]));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(run_switch_latest(reexec, OrderFilter::all(), Query::Count, notifier.subscribe(), true, tx));

        assert_eq!(next(&mut rx).await.unwrap().result, QueryResult::Count(5));
        notifier.bump();
        tokio::time::sleep(Duration::from_millis(50)).await;
        notifier.bump();

        let changed = next(&mut rx).await.unwrap();
        assert_eq!(changed.result, QueryResult::Count(6));
        assert_eq!(changed.version, 2);
    }

    #[tokio::test]
    async fn test_failure_is_fatal_to_stream() {
        let notifier = ChangeNotifier::new();
        let mut store = ScriptedStore::new(vec![(0, 3)]);
        store.fail_on_call = Some(1);
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(run_switch_latest(reexecutor(store), OrderFilter::all(), Query::Count, notifier.subscribe(), true, tx));

        assert_eq!(next(&mut rx).await.unwrap().result, QueryResult::Count(3));
        notifier.bump();
        assert!(matches!(next(&mut rx).await, Err(SyncError::RecomputeFailed(_))));

        let end = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_driver_stops_when_receiver_dropped() {
        let notifier = ChangeNotifier::new();
        let reexec = reexecutor(ScriptedStore::new(vec![(0, 1)]));
        let (tx, rx) = mpsc::channel(8);
        let driver = tokio::spawn(run_switch_latest(reexec, OrderFilter::all(), Query::Count, notifier.subscribe(), true, tx));

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), driver).await.unwrap().unwrap();
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
