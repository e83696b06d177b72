//! Payment recording
//!
//! Payments are tendered against a bill. A voided payment stays on the bill
//! for history but no longer counts toward any total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, Money, PaymentId};

use crate::error::BillingError;

/// How the payment was tendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Cash at the cash point
    Cash,
    /// Mobile money transfer
    MobileMoney,
    /// Card payment
    Card,
    /// Settled by an insurance scheme
    Insurance,
    /// Waived by an authorised provider
    Waiver,
    /// Any other arrangement, described by the reference
    Other,
}

/// A payment tendered against a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Bill being paid
    pub bill_id: BillId,
    /// Amount handed over
    pub amount_tendered: Money,
    /// Payment mode
    pub mode: PaymentMode,
    /// External reference (mobile money code, card slip)
    pub reference: Option<String>,
    /// Whether the payment was voided
    pub voided: bool,
    /// Why the payment was voided
    pub void_reason: Option<String>,
    /// When the payment was received
    pub received_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new payment
    ///
    /// # Arguments
    ///
    /// * `bill_id` - Bill being paid
    /// * `amount_tendered` - Amount handed over, zero or more
    /// * `mode` - Payment mode
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Validation` for a negative amount.
    pub fn new(bill_id: BillId, amount_tendered: Money, mode: PaymentMode) -> Result<Self, BillingError> {
        if amount_tendered.is_negative() {
            return Err(BillingError::validation(format!(
                "payment amount cannot be negative: {}",
                amount_tendered
            )));
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            bill_id,
            amount_tendered,
            mode,
            reference: None,
            voided: false,
            void_reason: None,
            received_at: Utc::now(),
        })
    }

    /// Sets the external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Voids the payment
    ///
    /// # Errors
    ///
    /// - `Validation` when the reason is blank
    /// - `AlreadyVoided` when the payment was voided before
    pub fn void(&mut self, reason: &str) -> Result<(), BillingError> {
        if reason.trim().is_empty() {
            return Err(BillingError::validation("a void reason is required"));
        }
        if self.voided {
            return Err(BillingError::AlreadyVoided(self.id.to_string()));
        }
        self.voided = true;
        self.void_reason = Some(reason.trim().to_string());
        Ok(())
    }
}
