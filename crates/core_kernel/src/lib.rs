//! Core Kernel - Foundational types and utilities for the billing system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Age calculations for exemption scopes
//! - Common identifiers and value objects
//! - Port error types shared by every adapter

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, MoneyError, Rate};
pub use temporal::{age_in_years, BirthDate, TemporalError};
pub use identifiers::{
    BillId, LineItemId, PaymentId, AuditEntryId,
    PatientId, ProviderId, CashPointId,
    StockItemId, BillableServiceId, OrderId,
    ExemptionId, ExemptionRuleId, ConceptId,
};
pub use ports::{DomainPort, PortError};
