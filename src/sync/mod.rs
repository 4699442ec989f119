//! # Sync Core
//!
//! Live filtered pagination. A client stages its filter once, then opens
//! a count stream and a window stream with the returned token. Every
//! committed mutation bumps the [`ChangeNotifier`]; each open stream
//! recomputes its query with switch-latest semantics and pushes the fresh
//! result.
//!
//! ```text
//! stage(filter) -> token
//! open(token, Count)        -> 7, 8, 8, 9 ...
//! open(token, Window(p, s)) -> {p: order, p+1: order, ...} ...
//! ```

pub mod errors;
pub mod notifier;
pub mod reexecutor;
pub mod session;
pub mod staging;
pub mod window;

pub use errors::{SyncError, SyncResult};
pub use notifier::{ChangeNotifier, VersionSubscription};
pub use reexecutor::{run_switch_latest, Query, QueryReexecutor, QueryResult, Recomputed};
pub use session::{SessionState, SessionStream, StreamSessionHandler, REQUEST_ID_HEADER};
pub use staging::{token_prefix, FilterStagingCache, StagedFilter, FILTER_TTL_MS};
pub use window::{WindowRequest, WindowResult, DEFAULT_WINDOW_SIZE};
