//! Bill line items
//!
//! A line item charges for exactly one stock item or one billable service.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillableServiceId, LineItemId, Money, StockItemId};

use crate::error::BillingError;
use crate::status::BillStatus;

/// What a line item charges for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChargeRef {
    /// A dispensed commodity
    Stock(StockItemId),
    /// A billable service such as a consultation or lab test
    Service(BillableServiceId),
}

impl fmt::Display for ChargeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargeRef::Stock(id) => write!(f, "{}", id),
            ChargeRef::Service(id) => write!(f, "{}", id),
        }
    }
}

/// One charge on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLineItem {
    id: LineItemId,
    item: ChargeRef,
    /// Name of the price list entry the price came from
    price_name: Option<String>,
    price: Option<Money>,
    quantity: Option<u32>,
    payment_status: BillStatus,
    voided: bool,
    void_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl BillLineItem {
    /// Creates a priced line item
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Validation` for a negative price or a zero
    /// quantity.
    pub fn new(item: ChargeRef, price: Money, quantity: u32) -> Result<Self, BillingError> {
        let mut line = Self::draft(item);
        line.set_price(price)?;
        line.set_quantity(quantity)?;
        Ok(line)
    }

    /// Creates a line item for an exempt charge: zero price, status `EXEMPTED`
    pub fn exempted(item: ChargeRef, quantity: u32) -> Result<Self, BillingError> {
        let mut line = Self::new(item, Money::zero(), quantity)?;
        line.payment_status = BillStatus::Exempted;
        Ok(line)
    }

    /// Creates a line item with neither price nor quantity
    pub fn draft(item: ChargeRef) -> Self {
        Self {
            id: LineItemId::new_v7(),
            item,
            price_name: None,
            price: None,
            quantity: None,
            payment_status: BillStatus::Pending,
            voided: false,
            void_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_price_name(mut self, name: impl Into<String>) -> Self {
        self.price_name = Some(name.into());
        self
    }

    pub fn set_price(&mut self, price: Money) -> Result<(), BillingError> {
        if price.is_negative() {
            return Err(BillingError::validation(format!(
                "line item price cannot be negative: {}",
                price
            )));
        }
        self.price = Some(price);
        Ok(())
    }

    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), BillingError> {
        if quantity == 0 {
            return Err(BillingError::validation("line item quantity must be positive"));
        }
        self.quantity = Some(quantity);
        Ok(())
    }

    pub fn id(&self) -> LineItemId {
        self.id
    }

    pub fn item(&self) -> ChargeRef {
        self.item
    }

    pub fn price_name(&self) -> Option<&str> {
        self.price_name.as_deref()
    }

    pub fn price(&self) -> Option<Money> {
        self.price
    }

    pub fn quantity(&self) -> Option<u32> {
        self.quantity
    }

    pub fn payment_status(&self) -> BillStatus {
        self.payment_status
    }

    pub fn is_voided(&self) -> bool {
        self.voided
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_exempted(&self) -> bool {
        self.payment_status == BillStatus::Exempted
    }

    /// Price multiplied by quantity
    ///
    /// # Errors
    ///
    /// `MissingPrice` or `MissingQuantity` when either is unset.
    pub fn total(&self) -> Result<Money, BillingError> {
        let price = self
            .price
            .ok_or_else(|| BillingError::MissingPrice(self.id.to_string()))?;
        let quantity = self
            .quantity
            .ok_or_else(|| BillingError::MissingQuantity(self.id.to_string()))?;

        Ok(price.checked_multiply(Decimal::from(quantity))?)
    }

    /// Voids the line item; it stays on the bill but no longer counts
    ///
    /// # Errors
    ///
    /// - `Validation` when the reason is blank
    /// - `AlreadyVoided` when the line item was voided before
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

    pub(crate) fn set_payment_status(&mut self, status: BillStatus) {
        self.payment_status = status;
    }

    /// Copy for a corrective bill: fresh id, not voided, payment reset
    pub(crate) fn carry_over(&self) -> Self {
        let payment_status = if self.is_exempted() {
            BillStatus::Exempted
        } else {
            BillStatus::Pending
        };

        Self {
            id: LineItemId::new_v7(),
            payment_status,
            voided: false,
            void_reason: None,
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}
