//! # Change Notifier
//!
//! Process-wide monotonic version counter. Every committed mutation calls
//! [`ChangeNotifier::bump`]; every stream session holds a
//! [`VersionSubscription`] and recomputes when the version moves.
//!
//! Built on a `watch` channel: a bump never blocks and never fails, and a
//! slow subscriber sees only the latest value. A burst of bumps may be
//! observed as a single change, but the final value is always observed.

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Monotonic change signal shared by mutators and stream sessions
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: watch::Sender<u64>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// Create a notifier at version 0
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Signal a committed mutation.
    ///
    /// Succeeds with or without subscribers.
    pub fn bump(&self) {
        self.tx.send_modify(|version| *version += 1);
    }

    /// Current version
    pub fn version(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Register a new subscriber. Dropping the subscription unregisters it.
    pub fn subscribe(&self) -> VersionSubscription {
        VersionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the version counter
#[derive(Debug)]
pub struct VersionSubscription {
    rx: watch::Receiver<u64>,
}

impl VersionSubscription {
    /// Latest version, marking it as seen
    pub fn current(&mut self) -> u64 {
        *self.rx.borrow_and_update()
    }

    /// Wait for a version newer than the last one seen.
    ///
    /// Returns `None` once the notifier is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Stream of the current version followed by every observed change
    pub fn into_stream(self) -> impl Stream<Item = u64> {
        WatchStream::new(self.rx)
    }
}
