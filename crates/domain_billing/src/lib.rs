//! Billing Domain - Clinical Bills
//!
//! This crate implements patient bills for a clinic cash point: line items
//! for dispensed commodities and services, payments, discounts, and the
//! audit trail of every change.
//!
//! # Bill Lifecycle
//!
//! ```text
//! PENDING -> POSTED -> PAID
//!    \-> EXEMPTED        \
//!    \-> CANCELLED        \-> ADJUSTED
//! ```
//!
//! Status is never set directly: every mutation reconciles the bill, which
//! derives the status from the line items total, the approved discount and
//! the non-voided payments.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{Actor, Bill, BillLineItem, ChargeRef, PaymentMode};
//!
//! let mut bill = Bill::new(patient_id, cashier_id, cash_point_id);
//! bill.add_line_item(BillLineItem::new(ChargeRef::Service(service_id), price, 1)?, actor)?;
//! bill.record_payment(price, PaymentMode::Cash, actor)?;
//!
//! assert_eq!(bill.status(), BillStatus::Paid);
//! audit_ledger.append_all(bill.take_audit_entries())?;
//! ```

pub mod audit;
pub mod bill;
pub mod discount;
pub mod error;
pub mod line_item;
pub mod payment;
pub mod ports;
pub mod status;

pub use audit::{Actor, AuditAction, AuditLedger, BillAudit};
pub use bill::Bill;
pub use discount::{Discount, DiscountStatus, DiscountType};
pub use error::BillingError;
pub use line_item::{BillLineItem, ChargeRef};
pub use payment::{Payment, PaymentMode};
pub use ports::{AuditRepository, BillRepository, PriceLookup};
pub use status::BillStatus;
