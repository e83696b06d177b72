//! Bill discounts
//!
//! A discount is requested by a cashier and only takes effect once approved.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, Rate};

use crate::error::BillingError;

/// How the discount value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// A fixed amount off the bill
    FixedAmount,
    /// A percentage of the line items total
    Percentage,
}

/// Approval state of a discount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscountStatus::Pending => "PENDING",
            DiscountStatus::Approved => "APPROVED",
            DiscountStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// A discount on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub discount_type: DiscountType,
    /// Amount for fixed discounts, percentage points for percentage discounts
    pub value: Decimal,
    pub status: DiscountStatus,
    pub reason: String,
    pub initiated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Discount {
    /// Validates and creates a pending discount
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Validation` when the value is negative, when a
    /// percentage exceeds 100, or when a fixed amount exceeds the line items
    /// total.
    pub fn request(
        discount_type: DiscountType,
        value: Decimal,
        reason: impl Into<String>,
        line_items_total: Money,
    ) -> Result<Self, BillingError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(BillingError::validation("discount cannot be negative"));
        }

        match discount_type {
            DiscountType::Percentage if value > dec!(100) => {
                return Err(BillingError::validation(format!(
                    "percentage discount {} exceeds 100",
                    value
                )));
            }
            DiscountType::FixedAmount if value > line_items_total.amount() => {
                return Err(BillingError::validation(format!(
                    "discount {} exceeds line items total {}",
                    value, line_items_total
                )));
            }
            _ => {}
        }

        Ok(Self {
            discount_type,
            value,
            status: DiscountStatus::Pending,
            reason: reason.into(),
            initiated_at: Utc::now(),
            decided_at: None,
        })
    }

    /// Returns true while the discount blocks a new one
    pub fn is_active(&self) -> bool {
        matches!(self.status, DiscountStatus::Pending | DiscountStatus::Approved)
    }

    pub fn is_approved(&self) -> bool {
        self.status == DiscountStatus::Approved
    }

    /// Amount taken off the given line items total
    pub fn amount_for(&self, line_items_total: Money) -> Money {
        match self.discount_type {
            DiscountType::FixedAmount => Money::new(self.value),
            DiscountType::Percentage => Rate::from_percentage(self.value).apply(&line_items_total),
        }
    }

    pub(crate) fn decide(&mut self, status: DiscountStatus) -> Result<(), BillingError> {
        if self.status != DiscountStatus::Pending {
            return Err(BillingError::invalid_transition(
                format!("discount {}", self.status),
                format!("discount {}", status),
            ));
        }
        self.status = status;
        self.decided_at = Some(Utc::now());
        Ok(())
    }
}
