//! Order filter
//!
//! All predicates are optional and combine with AND semantics; a filter
//! with no predicates matches every order.

use serde::{Deserialize, Serialize};

use super::order::{Order, OrderStatus};

/// Predicates over order fields.
///
/// - `order_date`: exact match
/// - `customer`, `delivery_address`: substring match
/// - `status`: exact match
/// - `amount`: exact match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl OrderFilter {
    /// Filter that matches every order
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_delivery_address(mut self, address: impl Into<String>) -> Self {
        self.delivery_address = Some(address.into());
        self
    }

    pub fn with_order_date(mut self, date: impl Into<String>) -> Self {
        self.order_date = Some(date.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// True when no predicate is set
    pub fn is_empty(&self) -> bool {
        self.order_date.is_none()
            && self.customer.is_none()
            && self.delivery_address.is_none()
            && self.status.is_none()
            && self.amount.is_none()
    }

    /// Checks if an order satisfies every set predicate
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(date) = &self.order_date {
            if &order.order_date != date {
                return false;
            }
        }
        if let Some(customer) = &self.customer {
            if !order.customer.contains(customer.as_str()) {
                return false;
            }
        }
        if let Some(address) = &self.delivery_address {
            if !order.delivery_address.contains(address.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        if let Some(amount) = self.amount {
            if order.amount != amount {
                return false;
            }
        }
        true
    }
}
