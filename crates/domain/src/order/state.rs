//! Order status machine.

use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Paid ──► Published
/// ```
///
/// There is no failed status: an order whose publish step errors stays in
/// `Paid` with its `last_error` recorded, and publishing may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order was created, payment not yet confirmed.
    #[default]
    Pending,

    /// Payment confirmed, post not yet published.
    Paid,

    /// Post was published (terminal state).
    Published,
}

/// Every allowed `(from, to)` move. Anything not listed is rejected.
const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Paid),
    (OrderStatus::Paid, OrderStatus::Published),
];

impl OrderStatus {
    /// Returns true if the status machine allows moving to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        TRANSITIONS.contains(&(*self, next))
    }

    /// Checks a move against the transition table.
    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), OrderError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if payment can be confirmed in this status.
    pub fn can_confirm_payment(&self) -> bool {
        self.can_transition_to(OrderStatus::Paid)
    }

    /// Returns true if the post can be published in this status.
    pub fn can_publish(&self) -> bool {
        self.can_transition_to(OrderStatus::Published)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        TRANSITIONS.iter().all(|(from, _)| from != self)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "published" => Ok(OrderStatus::Published),
            other => Err(OrderError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}
