use std::str::FromStr;

use tracing::warn;

use crate::{entities::OrderStatus, errors::ServiceError};

/// Outcome of checking a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; nothing is written.
    Unchanged,
    /// The status column must be updated.
    Apply,
}

/// Decides which status changes an order may go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    strict: bool,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl StatusPolicy {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Enforces the transition table.
    pub fn strict() -> Self {
        Self::new(true)
    }

    /// Any enumerated status may overwrite any other.
    pub fn lenient() -> Self {
        Self::new(false)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Parses a caller-supplied status string.
    pub fn parse(raw: &str) -> Result<OrderStatus, ServiceError> {
        OrderStatus::from_str(raw.trim()).map_err(|_| {
            ServiceError::ValidationError(format!(
                "Invalid status '{}'. Valid statuses are: Pending, Processing, Shipped, Delivered, Cancelled",
                raw
            ))
        })
    }

    /// Status every new order starts in when the table is enforced.
    pub fn check_initial(&self, status: OrderStatus) -> Result<(), ServiceError> {
        if self.strict && status != OrderStatus::Pending {
            return Err(ServiceError::ValidationError(format!(
                "New orders must start as Pending, not {}",
                status
            )));
        }
        Ok(())
    }

    pub fn check(&self, from: OrderStatus, to: OrderStatus) -> Result<Transition, ServiceError> {
        if from == to {
            return Ok(Transition::Unchanged);
        }
        if !self.strict || Self::is_valid_transition(from, to) {
            return Ok(Transition::Apply);
        }

        warn!(%from, %to, "illegal status transition rejected");
        Err(ServiceError::ValidationError(format!(
            "Cannot transition from status '{}' to '{}'",
            from, to
        )))
    }

    /// Statuses reachable in one step from `from`.
    pub fn next_statuses(&self, from: OrderStatus) -> Vec<OrderStatus> {
        use sea_orm::Iterable;

        OrderStatus::iter()
            .filter(|to| *to != from)
            .filter(|to| !self.strict || Self::is_valid_transition(from, *to))
            .collect()
    }

    fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (from, to),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }
}
