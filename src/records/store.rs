//! Record store seam and the in-memory order store.
//!
//! The sync core only needs `count` and `page`. `MemoryOrderStore` is the
//! store the binary runs with; every committed mutation bumps the
//! [`ChangeNotifier`] it was built with, after the write lock is released.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{Duration, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinHandle;

use super::errors::{StoreError, StoreResult};
use super::filter::OrderFilter;
use super::order::{NewOrder, Order, OrderStatus};
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};
use crate::sync::ChangeNotifier;

/// Read side of a record store.
///
/// Implementations may block; callers on the async runtime run them on
/// the blocking pool.
pub trait RecordStore: Send + Sync + 'static {
    /// Number of orders matching `filter`
    fn count(&self, filter: &OrderFilter) -> StoreResult<u64>;

    /// Orders matching `filter` at positions `[position, position + size)`
    /// in ascending id order
    fn page(&self, filter: &OrderFilter, position: u64, size: u64) -> StoreResult<Vec<Order>>;
}

const CUSTOMERS: [&str; 12] = [
    "Olivia Smith",
    "Liam Johnson",
    "Emma Williams",
    "Noah Brown",
    "Ava Jones",
    "Elijah Garcia",
    "Isabella Martinez",
    "Lucas Rodriguez",
    "Mia Davis",
    "Mason Hernandez",
    "Amelia Lopez",
    "Ethan Gonzalez",
];

const ADDRESS_COUNT: usize = 10;

fn address(index: usize) -> String {
    format!("City {}, Street {}", index + 1, index + 1)
}

fn date_days_ago(days: i64) -> String {
    (Local::now().date_naive() - Duration::days(days)).to_string()
}

/// In-memory order table keyed by auto-increment id
#[derive(Debug)]
pub struct MemoryOrderStore {
    orders: RwLock<BTreeMap<u64, Order>>,
    next_id: RwLock<u64>,
    notifier: Arc<ChangeNotifier>,
}

impl MemoryOrderStore {
    /// Create an empty store that signals `notifier` on every commit
    pub fn new(notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            orders: RwLock::new(BTreeMap::new()),
            next_id: RwLock::new(1),
            notifier,
        }
    }

    /// Notifier bumped by this store
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Total number of stored orders
    pub fn len(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert one order and bump the notifier
    pub fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let stored = self.commit(vec![order])?.pop();
        self.notifier.bump();
        stored.ok_or_else(|| StoreError::Internal("insert produced no row".into()))
    }

    /// Insert many orders as one commit; bumps once
    pub fn insert_all(&self, orders: Vec<NewOrder>) -> StoreResult<Vec<Order>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let stored = self.commit(orders)?;
        self.notifier.bump();
        Ok(stored)
    }

    /// Insert one order with random field values
    pub fn insert_random(&self) -> StoreResult<Order> {
        let mut rng = rand::thread_rng();
        let order = NewOrder {
            order_date: date_days_ago(rng.gen_range(0..30)),
            customer: CUSTOMERS[rng.gen_range(0..CUSTOMERS.len())].to_string(),
            delivery_address: address(rng.gen_range(0..ADDRESS_COUNT)),
            status: OrderStatus::ALL[rng.gen_range(0..OrderStatus::ALL.len())],
            amount: rng.gen_range(10.0..1010.0),
        };
        self.insert(order)
    }

    /// Seed `count` distinct (customer, address, status) combinations when
    /// the store is empty. Returns the number of inserted orders.
    pub fn seed_if_empty(&self, count: usize) -> StoreResult<usize> {
        if !self.is_empty() || count == 0 {
            return Ok(0);
        }

        let mut combinations: Vec<(usize, usize, OrderStatus)> = Vec::new();
        for customer in 0..CUSTOMERS.len() {
            for addr in 0..ADDRESS_COUNT {
                for status in OrderStatus::ALL {
                    combinations.push((customer, addr, status));
                }
            }
        }
        combinations.shuffle(&mut rand::thread_rng());

        let orders: Vec<NewOrder> = combinations
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(index, (customer, addr, status))| {
                let n = index as i64 + 2;
                NewOrder {
                    order_date: date_days_ago(n % 30),
                    customer: CUSTOMERS[customer].to_string(),
                    delivery_address: address(addr),
                    status,
                    amount: ((n % 1000) + 10) as f64,
                }
            })
            .collect();

        Ok(self.insert_all(orders)?.len())
    }

    /// Insert a random order every `interval` until the returned task is
    /// aborted. A failed insert is logged and the generator keeps going.
    pub fn spawn_random_inserter(store: Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let inserted = {
                    let store = Arc::clone(&store);
                    tokio::task::spawn_blocking(move || store.insert_random()).await
                };
                match inserted {
                    Ok(Ok(order)) => {
                        let id = order.id.to_string();
                        log_event_at(Severity::Debug, Event::RandomOrderInserted, &[
                            ("id", id.as_str()),
                            ("status", order.status.as_str()),
                        ]);
                    }
                    Ok(Err(e)) => {
                        log_event_with_fields(Event::RandomOrderFailed, &[("error", &e.to_string())]);
                    }
                    Err(e) => {
                        log_event_with_fields(Event::RandomOrderFailed, &[("error", &e.to_string())]);
                    }
                }
            }
        })
    }

    /// Write under the lock; the caller bumps after the lock is released.
    fn commit(&self, orders: Vec<NewOrder>) -> StoreResult<Vec<Order>> {
        let mut table = self
            .orders
            .write()
            .map_err(|_| StoreError::Internal("Lock poisoned".into()))?;
        let mut next_id = self
            .next_id
            .write()
            .map_err(|_| StoreError::Internal("Lock poisoned".into()))?;

        let mut stored = Vec::with_capacity(orders.len());
        for order in orders {
            let order = order.with_id(*next_id);
            *next_id += 1;
            table.insert(order.id, order.clone());
            stored.push(order);
        }
        Ok(stored)
    }
}

impl RecordStore for MemoryOrderStore {
    fn count(&self, filter: &OrderFilter) -> StoreResult<u64> {
        let table = self
            .orders
            .read()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))?;
        Ok(table.values().filter(|o| filter.matches(o)).count() as u64)
    }

    fn page(&self, filter: &OrderFilter, position: u64, size: u64) -> StoreResult<Vec<Order>> {
        let table = self
            .orders
            .read()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))?;
        let skip = usize::try_from(position).unwrap_or(usize::MAX);
        let take = usize::try_from(size).unwrap_or(usize::MAX);
        Ok(table
            .values()
            .filter(|o| filter.matches(o))
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }
}
