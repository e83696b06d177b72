//! Bill audit ledger
//!
//! Every bill creation and every bill-affecting mutation leaves one
//! immutable `BillAudit` entry. Entries reference their bill by id only.
//!
//! # Invariants
//!
//! - Entries are appended only for bills registered with the ledger
//! - Normal operation never rewrites or removes an entry
//! - History is returned newest first

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use core_kernel::{AuditEntryId, BillId, ProviderId};

use crate::error::BillingError;
use crate::status::BillStatus;

/// Who performed an audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// Automatic processing such as order interception
    System,
    /// A cashier or clinician
    Provider(ProviderId),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Provider(id) => write!(f, "{}", id),
        }
    }
}

/// What happened to the bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    LineItemAdded,
    LineItemVoided,
    PaymentRecorded,
    PaymentVoided,
    StatusChanged { from: BillStatus, to: BillStatus },
    DiscountInitiated,
    DiscountApproved,
    DiscountRejected,
    Cancelled,
    Adjusted,
}

impl AuditAction {
    /// Stable tag for reports and filters
    pub fn tag(&self) -> &'static str {
        match self {
            AuditAction::Created => "CREATED",
            AuditAction::LineItemAdded => "LINE_ITEM_ADDED",
            AuditAction::LineItemVoided => "LINE_ITEM_VOIDED",
            AuditAction::PaymentRecorded => "PAYMENT_RECORDED",
            AuditAction::PaymentVoided => "PAYMENT_VOIDED",
            AuditAction::StatusChanged { .. } => "STATUS_CHANGED",
            AuditAction::DiscountInitiated => "DISCOUNT_INITIATED",
            AuditAction::DiscountApproved => "DISCOUNT_APPROVED",
            AuditAction::DiscountRejected => "DISCOUNT_REJECTED",
            AuditAction::Cancelled => "CANCELLED",
            AuditAction::Adjusted => "ADJUSTED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::StatusChanged { from, to } => write!(f, "{} {} -> {}", self.tag(), from, to),
            other => f.write_str(other.tag()),
        }
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillAudit {
    pub id: AuditEntryId,
    pub bill_id: BillId,
    pub action: AuditAction,
    pub reason: Option<String>,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

impl BillAudit {
    pub fn new(bill_id: BillId, action: AuditAction, actor: Actor) -> Self {
        Self {
            id: AuditEntryId::new_v7(),
            bill_id,
            action,
            reason: None,
            actor,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Append-only store of audit entries
#[derive(Debug, Default)]
pub struct AuditLedger {
    /// Bills that may receive entries
    bills: HashSet<BillId>,
    /// Entries in append order
    entries: Vec<BillAudit>,
}

impl AuditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a bill known to the ledger; registering twice is harmless
    pub fn register_bill(&mut self, bill_id: BillId) {
        self.bills.insert(bill_id);
    }

    pub fn is_registered(&self, bill_id: &BillId) -> bool {
        self.bills.contains(bill_id)
    }

    /// Appends one entry
    ///
    /// # Errors
    ///
    /// Returns `BillingError::BillNotFound` if the entry's bill was never
    /// registered.
    pub fn append(&mut self, entry: BillAudit) -> Result<AuditEntryId, BillingError> {
        if !self.bills.contains(&entry.bill_id) {
            return Err(BillingError::BillNotFound(entry.bill_id.to_string()));
        }

        debug!(bill_id = %entry.bill_id, action = %entry.action, actor = %entry.actor, "Audit entry appended");
        let id = entry.id;
        self.entries.push(entry);
        Ok(id)
    }

    /// Appends a batch of entries, all or nothing
    pub fn append_all(&mut self, entries: Vec<BillAudit>) -> Result<usize, BillingError> {
        if let Some(unknown) = entries.iter().find(|e| !self.bills.contains(&e.bill_id)) {
            return Err(BillingError::BillNotFound(unknown.bill_id.to_string()));
        }

        let count = entries.len();
        for entry in entries {
            self.append(entry)?;
        }
        Ok(count)
    }

    /// Entries for a bill, newest first
    ///
    /// Entries sharing a timestamp keep reverse append order. An unknown bill
    /// has an empty history.
    pub fn history(&self, bill_id: &BillId) -> Vec<BillAudit> {
        let mut history: Vec<BillAudit> = self
            .entries
            .iter()
            .rev()
            .filter(|e| &e.bill_id == bill_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        history
    }

    /// Total number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Administrative retention purge: drops entries recorded before `cutoff`
    ///
    /// Returns the number of entries removed.
    pub fn purge_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.recorded_at >= cutoff);
        let removed = before - self.entries.len();
        info!(removed, %cutoff, "Audit entries purged");
        removed
    }
}
