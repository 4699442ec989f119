//! Positional windows over a filtered, id-ordered result set

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::{SyncError, SyncResult};
use crate::records::Order;

/// Window size used when a request omits `size` or sends garbage
pub const DEFAULT_WINDOW_SIZE: u64 = 30;

/// Items `[position, position + size)` in ascending id order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRequest {
    pub position: u64,
    pub size: u64,
}

impl WindowRequest {
    /// Create a window; `size` must be positive
    pub fn new(position: u64, size: u64) -> SyncResult<Self> {
        if size == 0 {
            return Err(SyncError::InvalidWindow("size must be positive".into()));
        }
        Ok(Self { position, size })
    }

    /// Build from raw query parameters. A missing or unparseable position
    /// becomes 0; a missing, unparseable or zero size becomes
    /// [`DEFAULT_WINDOW_SIZE`].
    pub fn from_params(position: Option<&str>, size: Option<&str>) -> Self {
        Self::from_params_or(position, size, DEFAULT_WINDOW_SIZE)
    }

    /// Like [`from_params`](Self::from_params) with an explicit fallback size
    pub fn from_params_or(position: Option<&str>, size: Option<&str>, default_size: u64) -> Self {
        let position = position
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let size = size
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(default_size.max(1));
        Self { position, size }
    }

    /// Exclusive end index
    pub fn end(&self) -> u64 {
        self.position.saturating_add(self.size)
    }

    /// True if `index` falls inside the window
    pub fn contains(&self, index: u64) -> bool {
        index >= self.position && index < self.end()
    }
}

impl Default for WindowRequest {
    fn default() -> Self {
        Self {
            position: 0,
            size: DEFAULT_WINDOW_SIZE,
        }
    }
}

/// Sparse absolute-index -> order mapping.
///
/// On the wire this is a JSON object keyed by the decimal index. An empty
/// mapping is a valid result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowResult(BTreeMap<u64, Order>);

impl WindowResult {
    /// Key a page fetched at `window.position` by absolute index,
    /// never exceeding `window.size` entries.
    pub fn from_page(window: WindowRequest, page: Vec<Order>) -> Self {
        let size = usize::try_from(window.size).unwrap_or(usize::MAX);
        let items = page
            .into_iter()
            .take(size)
            .enumerate()
            .map(|(offset, order)| (window.position + offset as u64, order))
            .collect();
        Self(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&Order> {
        self.0.get(&index)
    }

    /// Absolute indices, ascending
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Order)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn into_inner(self) -> BTreeMap<u64, Order> {
        self.0
    }
}

impl From<BTreeMap<u64, Order>> for WindowResult {
    fn from(items: BTreeMap<u64, Order>) -> Self {
        Self(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::OrderStatus;

    fn order(id: u64) -> Order {
        Order {
            id,
            order_date: "2025-01-01".to_string(),
            customer: "Emma Williams".to_string(),
            delivery_address: "City 2, Street 2".to_string(),
            status: OrderStatus::Shipped,
            amount: 12.0,
        }
    }

    #[test]
    fn test_from_params_defaults() {
        assert_eq!(WindowRequest::from_params(None, None), WindowRequest::new(0, 30).unwrap());
        assert_eq!(
            WindowRequest::from_params(Some("abc"), Some("-3")),
            WindowRequest::new(0, 30).unwrap()
        );
        assert_eq!(WindowRequest::from_params(Some("12"), Some("0")).size, DEFAULT_WINDOW_SIZE);
        assert_eq!(
            WindowRequest::from_params(Some("60"), Some("15")),
            WindowRequest::new(60, 15).unwrap()
        );
    }

    #[test]
    fn test_from_params_configured_default() {
        assert_eq!(WindowRequest::from_params_or(Some("5"), None, 50), WindowRequest::new(5, 50).unwrap());
        assert_eq!(WindowRequest::from_params_or(None, Some("8"), 50).size, 8);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(WindowRequest::new(0, 0), Err(SyncError::InvalidWindow(_))));
    }

    #[test]
    fn test_from_page_keys_by_absolute_index() {
        let window = WindowRequest::new(30, 10).unwrap();
        let result = WindowResult::from_page(window, (31..=35).map(order).collect());
        let keys: Vec<u64> = result.keys().collect();
        assert_eq!(keys, vec![30, 31, 32, 33, 34]);
        assert_eq!(result.get(30).unwrap().id, 31);
    }

    #[test]
    fn test_from_page_caps_at_size() {
        let window = WindowRequest::new(0, 2).unwrap();
        let result = WindowResult::from_page(window, (1..=5).map(order).collect());
        assert_eq!(result.len(), 2);
        assert!(result.keys().all(|k| window.contains(k)));
    }

    #[test]
    fn test_wire_keys_are_decimal_strings() {
        let window = WindowRequest::new(7, 1).unwrap();
        let result = WindowResult::from_page(window, vec![order(8)]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["7"]["id"], 8);

        let decoded: WindowResult = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_empty_result_encodes_as_empty_object() {
        assert_eq!(serde_json::to_string(&WindowResult::default()).unwrap(), "{}");
    }
}
