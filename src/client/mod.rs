//! # Sync Client
//!
//! Consumer side of the protocol: stage a filter, follow the count and
//! window streams, re-stage on a refused token and reopen on filter change.
//!
//! ```ignore
//! let transport = HttpSyncTransport::new("http://localhost:8080")?;
//! let repo = ClientSyncRepository::new(transport, OrderFilter::all());
//! let mut total = repo.count_stream();
//! while let Some(count) = total.next().await {
//!     println!("{}", count?);
//! }
//! ```

pub mod errors;
pub mod repository;
pub mod sse;
pub mod transport;

pub use errors::{ClientError, ClientResult};
pub use repository::{ClientSyncRepository, LiveStream};
pub use sse::{event_data_stream, SseDecoder};
pub use transport::{EventStream, HttpSyncTransport, SyncTransport};
