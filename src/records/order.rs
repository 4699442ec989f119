//! Order record and status

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    OnHold,
    Backorder,
    Refunded,
    Partial,
    Processing,
}

impl OrderStatus {
    /// All statuses in declaration order
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::New,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::OnHold,
        OrderStatus::Backorder,
        OrderStatus::Refunded,
        OrderStatus::Partial,
        OrderStatus::Processing,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::OnHold => "ON_HOLD",
            OrderStatus::Backorder => "BACKORDER",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Processing => "PROCESSING",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("unknown order status '{}'", s))
    }
}

/// A stored order. `id` is assigned by the store and defines the stable
/// ordering used by windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    /// ISO-8601 date, e.g. `2025-09-13`
    pub order_date: String,
    pub customer: String,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub amount: f64,
}

/// An order before the store has assigned its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_date: String,
    pub customer: String,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub amount: f64,
}

impl NewOrder {
    /// Attach a store-assigned id
    pub fn with_id(self, id: u64) -> Order {
        Order {
            id,
            order_date: self.order_date,
            customer: self.customer,
            delivery_address: self.delivery_address,
            status: self.status,
            amount: self.amount,
        }
    }
}
