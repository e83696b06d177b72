//! Billing Application Layer
//!
//! Wires the exemption and billing domains together:
//!
//! - [`BillingService`]: order interception, price lookup with a zero
//!   fallback, and the cashier workflow
//! - [`BillStore`]: one lock per bill around mutate, reconcile and audit
//! - [`adapters`]: in-memory and file-backed implementations of the ports
//! - [`config`] and [`telemetry`]: settings and log subscriber setup for the
//!   `billing-cli` binary
//!
//! # Example
//!
//! ```rust,ignore
//! let service = BillingService::new(resolver, table, prices, bills, audit);
//! let bill_id = service.open_bill(patient_id, cashier_id, cash_point_id)?;
//! service.on_order_created(bill_id, ChargeRef::Service(service_id), &request, Actor::System)?;
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod telemetry;

pub use config::{BillingSettings, LogFormat};
pub use error::ServiceError;
pub use service::{BillingService, ChargeQuote};
pub use store::BillStore;
pub use telemetry::init_tracing;
