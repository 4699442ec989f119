//! pagestream - live filtered pagination over server-sent events
//!
//! A client stages a filter once and opens two streams with the returned
//! token: the filtered total and one positional window of the filtered,
//! id-ordered orders. Every committed change re-runs the open queries and
//! pushes fresh results.

pub mod cli;
pub mod client;
pub mod http_server;
pub mod observability;
pub mod records;
pub mod sync;
