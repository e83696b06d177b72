//! Bill Aggregate Root
//!
//! The Bill owns its line items, payments and discount, and keeps its status
//! consistent with the computed totals.
//!
//! # Invariants
//!
//! - `total()` is never negative
//! - At most one discount is pending or approved at a time
//! - After every mutation the status matches the reconciliation rule
//! - Cancelled and adjusted bills accept no further mutation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use core_kernel::{BillId, CashPointId, LineItemId, Money, PatientId, PaymentId, ProviderId};

use crate::audit::{Actor, AuditAction, BillAudit};
use crate::discount::{Discount, DiscountStatus, DiscountType};
use crate::error::BillingError;
use crate::line_item::BillLineItem;
use crate::payment::{Payment, PaymentMode};
use crate::status::BillStatus;

/// The Bill aggregate root
///
/// # Reconciliation
///
/// After each mutation the bill recomputes its totals:
/// - every non-voided line item `EXEMPTED` -> `EXEMPTED`
/// - payments cover the total (and there is something billed) -> `PAID`,
///   with every non-voided, non-exempted line item marked `PAID`
/// - some payment -> `POSTED`
/// - otherwise -> `PENDING`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    id: BillId,
    /// Human-readable receipt number
    receipt_number: String,
    patient_id: PatientId,
    cashier_id: ProviderId,
    cash_point_id: CashPointId,
    status: BillStatus,
    /// Line items in insertion order
    line_items: Vec<BillLineItem>,
    payments: Vec<Payment>,
    discount: Option<Discount>,
    /// The bill this one corrects
    adjusts: Option<BillId>,
    /// Why the bill was cancelled or adjusted
    closing_reason: Option<String>,
    /// Audit entries not yet handed to the ledger
    #[serde(skip)]
    audit_entries: Vec<BillAudit>,
    /// Version for optimistic concurrency
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Bill {
    /// Opens a new `PENDING` bill
    pub fn new(patient_id: PatientId, cashier_id: ProviderId, cash_point_id: CashPointId) -> Self {
        let id = BillId::new_v7();
        let now = Utc::now();

        let mut bill = Self {
            id,
            receipt_number: generate_receipt_number(&id, now),
            patient_id,
            cashier_id,
            cash_point_id,
            status: BillStatus::Pending,
            line_items: Vec::new(),
            payments: Vec::new(),
            discount: None,
            adjusts: None,
            closing_reason: None,
            audit_entries: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        bill.record(AuditAction::Created, Actor::Provider(cashier_id), None);
        info!(bill_id = %id, patient_id = %patient_id, "Bill created");
        bill
    }

    pub fn id(&self) -> BillId {
        self.id
    }

    pub fn receipt_number(&self) -> &str {
        &self.receipt_number
    }

    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    pub fn cashier_id(&self) -> ProviderId {
        self.cashier_id
    }

    pub fn cash_point_id(&self) -> CashPointId {
        self.cash_point_id
    }

    pub fn status(&self) -> BillStatus {
        self.status
    }

    pub fn line_items(&self) -> &[BillLineItem] {
        &self.line_items
    }

    pub fn line_item(&self, id: LineItemId) -> Option<&BillLineItem> {
        self.line_items.iter().find(|l| l.id() == id)
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    pub fn adjusts(&self) -> Option<BillId> {
        self.adjusts
    }

    pub fn closing_reason(&self) -> Option<&str> {
        self.closing_reason.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns accumulated audit entries and clears them
    pub fn take_audit_entries(&mut self) -> Vec<BillAudit> {
        std::mem::take(&mut self.audit_entries)
    }

    /// Audit entries waiting to be taken
    pub fn pending_audit_entries(&self) -> &[BillAudit] {
        &self.audit_entries
    }

    /// Checks if the bill still accepts mutations
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    // Totals

    /// Sum of price x quantity over non-voided line items
    pub fn line_items_total(&self) -> Result<Money, BillingError> {
        self.line_items
            .iter()
            .filter(|l| !l.is_voided())
            .try_fold(Money::zero(), |acc, line| Ok(acc.checked_add(&line.total()?)?))
    }

    /// Amount the approved discount takes off, zero otherwise
    pub fn discount_amount(&self) -> Result<Money, BillingError> {
        match &self.discount {
            Some(discount) if discount.is_approved() => Ok(discount.amount_for(self.line_items_total()?)),
            _ => Ok(Money::zero()),
        }
    }

    /// Line items total less an approved discount, never negative
    pub fn total(&self) -> Result<Money, BillingError> {
        Ok((self.line_items_total()? - self.discount_amount()?).floor_zero())
    }

    /// Sum of non-voided payments
    pub fn total_payments(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| !p.voided)
            .map(|p| p.amount_tendered)
            .sum()
    }

    /// What is still owed, never negative
    pub fn balance_due(&self) -> Result<Money, BillingError> {
        Ok((self.total()? - self.total_payments()).floor_zero())
    }

    /// Overpayment to hand back, never negative
    pub fn change_due(&self) -> Result<Money, BillingError> {
        Ok((self.total_payments() - self.total()?).floor_zero())
    }

    // Line items and payments

    /// Adds a line item at the end of the bill
    ///
    /// # Errors
    ///
    /// - `BillClosed` for cancelled or adjusted bills
    /// - `MissingPrice` / `MissingQuantity` when the line item cannot be totalled
    /// - `Validation` when the line item is already voided
    pub fn add_line_item(&mut self, line_item: BillLineItem, actor: Actor) -> Result<LineItemId, BillingError> {
        self.ensure_open()?;
        line_item.total()?;
        if line_item.is_voided() {
            return Err(BillingError::validation("cannot add a voided line item"));
        }

        let id = line_item.id();
        debug!(bill_id = %self.id, line_item_id = %id, item = %line_item.item(), "Line item added");
        self.line_items.push(line_item);
        self.record(AuditAction::LineItemAdded, actor, None);
        self.reconcile(actor)?;
        Ok(id)
    }

    /// Voids a line item; it stays on the bill but stops counting
    pub fn void_line_item(&mut self, id: LineItemId, reason: &str, actor: Actor) -> Result<(), BillingError> {
        self.ensure_open()?;
        let line = self
            .line_items
            .iter_mut()
            .find(|l| l.id() == id)
            .ok_or_else(|| BillingError::LineItemNotFound(id.to_string()))?;
        line.void(reason)?;

        self.record(AuditAction::LineItemVoided, actor, Some(reason));
        self.reconcile(actor)
    }

    /// Records a payment against the bill
    ///
    /// # Errors
    ///
    /// - `BillClosed` for cancelled or adjusted bills
    /// - `Validation` for a negative amount
    pub fn record_payment(
        &mut self,
        amount_tendered: Money,
        mode: PaymentMode,
        actor: Actor,
    ) -> Result<PaymentId, BillingError> {
        self.ensure_open()?;
        let payment = Payment::new(self.id, amount_tendered, mode)?;
        let id = payment.id;

        info!(bill_id = %self.id, payment_id = %id, amount = %amount_tendered, "Payment recorded");
        self.payments.push(payment);
        self.record(AuditAction::PaymentRecorded, actor, None);
        self.reconcile(actor)?;
        Ok(id)
    }

    /// Voids a payment; it stays on the bill but stops counting
    pub fn void_payment(&mut self, id: PaymentId, reason: &str, actor: Actor) -> Result<(), BillingError> {
        self.ensure_open()?;
        let payment = self
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BillingError::PaymentNotFound(id.to_string()))?;
        payment.void(reason)?;

        self.record(AuditAction::PaymentVoided, actor, Some(reason));
        self.reconcile(actor)
    }

    // Discount workflow

    /// Requests a discount, which stays without effect until approved
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` when the bill is paid or a discount is
    ///   already pending or approved
    /// - `Validation` for a negative value, a percentage over 100, or a fixed
    ///   amount over the line items total
    pub fn initiate_discount(
        &mut self,
        discount_type: DiscountType,
        value: Decimal,
        reason: &str,
        actor: Actor,
    ) -> Result<(), BillingError> {
        self.ensure_open()?;
        if self.status == BillStatus::Paid {
            return Err(BillingError::invalid_transition(self.status, "discount PENDING"));
        }
        if let Some(existing) = self.discount.as_ref().filter(|d| d.is_active()) {
            return Err(BillingError::invalid_transition(
                format!("discount {}", existing.status),
                "discount PENDING",
            ));
        }

        let discount = Discount::request(discount_type, value, reason, self.line_items_total()?)?;
        self.discount = Some(discount);

        info!(bill_id = %self.id, ?discount_type, %value, "Discount initiated");
        self.record(AuditAction::DiscountInitiated, actor, Some(reason));
        self.reconcile(actor)
    }

    /// Approves the pending discount and reconciles
    pub fn approve_discount(&mut self, actor: Actor) -> Result<(), BillingError> {
        self.decide_discount(DiscountStatus::Approved, AuditAction::DiscountApproved, actor)
    }

    /// Rejects the pending discount; the total reverts to the full amount
    pub fn reject_discount(&mut self, actor: Actor) -> Result<(), BillingError> {
        self.decide_discount(DiscountStatus::Rejected, AuditAction::DiscountRejected, actor)
    }

    fn decide_discount(
        &mut self,
        status: DiscountStatus,
        action: AuditAction,
        actor: Actor,
    ) -> Result<(), BillingError> {
        self.ensure_open()?;
        let discount = self
            .discount
            .as_mut()
            .ok_or_else(|| BillingError::validation("bill has no discount"))?;
        discount.decide(status)?;

        info!(bill_id = %self.id, status = %status, "Discount decided");
        self.record(action, actor, None);
        self.reconcile(actor)
    }

    // Closing

    /// Cancels a bill that has received no payment
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank reason
    /// - `InvalidStateTransition` when a non-voided payment exists
    pub fn cancel(&mut self, reason: &str, actor: Actor) -> Result<(), BillingError> {
        self.ensure_open()?;
        require_reason(reason)?;
        if self.payments.iter().any(|p| !p.voided) {
            return Err(BillingError::invalid_transition(self.status, BillStatus::Cancelled));
        }

        self.close(BillStatus::Cancelled, AuditAction::Cancelled, reason, actor);
        Ok(())
    }

    /// Closes a posted or paid bill and opens the corrective bill that
    /// replaces it
    ///
    /// The corrective bill carries copies of the non-voided line items and
    /// references this bill through `adjusts()`.
    pub fn adjust(&mut self, reason: &str, actor: Actor) -> Result<Bill, BillingError> {
        self.ensure_open()?;
        require_reason(reason)?;
        if !matches!(self.status, BillStatus::Posted | BillStatus::Paid) {
            return Err(BillingError::invalid_transition(self.status, BillStatus::Adjusted));
        }

        let mut corrective = Bill::new(self.patient_id, self.cashier_id, self.cash_point_id);
        corrective.adjusts = Some(self.id);
        for line in self.line_items.iter().filter(|l| !l.is_voided()) {
            corrective.add_line_item(line.carry_over(), actor)?;
        }

        self.close(BillStatus::Adjusted, AuditAction::Adjusted, reason, actor);
        info!(bill_id = %self.id, corrective_bill_id = %corrective.id, "Bill adjusted");
        Ok(corrective)
    }

    fn close(&mut self, status: BillStatus, action: AuditAction, reason: &str, actor: Actor) {
        info!(bill_id = %self.id, from = %self.status, to = %status, "Bill closed");
        self.status = status;
        self.closing_reason = Some(reason.trim().to_string());
        self.record(action, actor, Some(reason));
    }

    // Reconciliation

    /// Recomputes totals and status
    ///
    /// Idempotent: a second call with no intervening mutation changes
    /// nothing and records nothing. Closed bills are left untouched.
    pub fn synchronize_status(&mut self) -> Result<(), BillingError> {
        self.reconcile(Actor::System)
    }

    fn reconcile(&mut self, actor: Actor) -> Result<(), BillingError> {
        if self.status.is_terminal() {
            return Ok(());
        }

        let total = self.total()?;
        let paid = self.total_payments();
        let mut active = self.line_items.iter().filter(|l| !l.is_voided()).peekable();
        let has_active = active.peek().is_some();
        let all_exempted = has_active && active.all(BillLineItem::is_exempted);

        let next = if all_exempted {
            BillStatus::Exempted
        } else if paid >= total && (total.is_positive() || has_active) {
            BillStatus::Paid
        } else if paid.is_positive() {
            BillStatus::Posted
        } else {
            BillStatus::Pending
        };

        let line_status = if next == BillStatus::Paid {
            BillStatus::Paid
        } else {
            BillStatus::Pending
        };
        for line in self
            .line_items
            .iter_mut()
            .filter(|l| !l.is_voided() && !l.is_exempted())
        {
            line.set_payment_status(line_status);
        }

        if next != self.status {
            let from = self.status;
            self.status = next;
            debug!(bill_id = %self.id, %from, to = %next, %total, %paid, "Bill status changed");
            self.record(AuditAction::StatusChanged { from, to: next }, actor, None);
        }

        Ok(())
    }

    fn ensure_open(&self) -> Result<(), BillingError> {
        if self.status.is_terminal() {
            warn!(bill_id = %self.id, status = %self.status, "Mutation rejected on closed bill");
            return Err(BillingError::BillClosed(self.id.to_string()));
        }
        Ok(())
    }

    fn record(&mut self, action: AuditAction, actor: Actor, reason: Option<&str>) {
        let mut entry = BillAudit::new(self.id, action, actor);
        if let Some(reason) = reason {
            entry = entry.with_reason(reason.trim());
        }
        self.audit_entries.push(entry);
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

fn require_reason(reason: &str) -> Result<(), BillingError> {
    if reason.trim().is_empty() {
        return Err(BillingError::validation("a reason is required"));
    }
    Ok(())
}

/// Generates a receipt number from the bill date and id
fn generate_receipt_number(id: &BillId, at: DateTime<Utc>) -> String {
    let simple = id.as_uuid().simple().to_string();
    let suffix = &simple[simple.len() - 8..];
    format!("RCPT-{}-{}", at.format("%Y%m%d"), suffix.to_uppercase())
}
