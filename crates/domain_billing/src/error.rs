//! Billing domain errors

use core_kernel::{MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// A financial invariant would be violated
    #[error("Validation error: {0}")]
    Validation(String),

    /// The bill or discount is not in a state that allows the operation
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: String,
        to: String,
    },

    /// The bill is cancelled or adjusted and accepts no further changes
    #[error("Bill {0} is closed")]
    BillClosed(String),

    /// Line item not found on the bill
    #[error("Line item not found: {0}")]
    LineItemNotFound(String),

    /// Payment not found on the bill
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Bill not found
    #[error("Bill not found: {0}")]
    BillNotFound(String),

    /// The line item or payment was already voided
    #[error("Already voided: {0}")]
    AlreadyVoided(String),

    /// A line item has no unit price
    #[error("Line item {0} has no price")]
    MissingPrice(String),

    /// A line item has no quantity
    #[error("Line item {0} has no quantity")]
    MissingQuantity(String),

    /// Arithmetic failure
    #[error("Calculation error: {0}")]
    Calculation(#[from] MoneyError),

    /// A collaborator port failed
    #[error(transparent)]
    Port(#[from] PortError),
}

impl BillingError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    /// Creates an invalid state transition error
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        BillingError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns true for not-found errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::LineItemNotFound(_)
                | BillingError::PaymentNotFound(_)
                | BillingError::BillNotFound(_)
        ) || matches!(self, BillingError::Port(e) if e.is_not_found())
    }
}
