//! # Records
//!
//! The order table the sync protocol streams from: the record type, the
//! filter value object, and the store seam with its in-memory
//! implementation.

pub mod errors;
pub mod filter;
pub mod order;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use filter::OrderFilter;
pub use order::{NewOrder, Order, OrderStatus};
pub use store::{MemoryOrderStore, RecordStore};
