//! Exemption Domain
//!
//! Decides whether a chargeable item is exempt from payment for a patient.
//!
//! # Mechanisms
//!
//! Exemptions are authored two ways and answered through one resolver:
//! - **Static scopes**: a configuration document maps scope keys (`all`,
//!   `program:<name>`, `age<5`, `age:60-120`, ...) to exempt concept ids per
//!   category. The table is an immutable snapshot swapped wholesale on reload.
//! - **Rule scripts**: `BillExemption` records carry boolean scripts run in a
//!   sandboxed expression interpreter; any matching rule grants the exemption.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_exemption::{ChargeRequest, ExemptionResolver, StaticScopeSource};
//!
//! let resolver = ExemptionResolver::new().with_source(StaticScopeSource::new(handle));
//! let decision = resolver.resolve(&request)?;
//! if decision.exempt {
//!     // bill the line at zero
//! }
//! ```

pub mod age_condition;
pub mod engine;
pub mod error;
pub mod exemption;
pub mod ports;
pub mod resolver;
pub mod sandbox;
pub mod script;
pub mod table;

pub use age_condition::{matches_age_condition, AgeCondition};
pub use engine::ExemptionRuleEngine;
pub use error::ExemptionError;
pub use exemption::{BillExemption, BillExemptionRule};
pub use ports::{ExemptionConfigSource, ExemptionRecordSource};
pub use resolver::{
    ChargeRequest, ExemptionDecision, ExemptionGrant, ExemptionResolver, ExemptionSource,
    OrderRef, PatientSnapshot, RuleBasedSource, StaticScopeSource,
};
pub use sandbox::{SandboxLimits, SandboxedExpressionEvaluator};
pub use script::{Bindings, ScriptEvaluator, ScriptKind};
pub use table::{
    program_scope, ExemptionCategory, ExemptionDocument, ExemptionTableHandle,
    StaticExemptionTable, GLOBAL_SCOPE,
};
