//! Exemption Domain Ports
//!
//! Port interfaces for the data the exemption domain reads but does not own:
//! the static scope configuration document and the script-authored exemption
//! records.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_exemption::ports::ExemptionRecordSource;
//! use std::sync::Arc;
//!
//! pub struct RuleBasedSource {
//!     records: Arc<dyn ExemptionRecordSource>,
//! }
//! ```
//!
//! Adapters are chosen at application startup: a file-backed configuration
//! source and an in-memory record store ship with `app_billing`.

use core_kernel::{ConceptId, DomainPort, PortError};

use crate::exemption::BillExemption;
use crate::table::{ExemptionCategory, ExemptionDocument};

/// Source of the static exemption configuration document
pub trait ExemptionConfigSource: DomainPort {
    /// Loads the current configuration document
    ///
    /// # Returns
    ///
    /// The parsed document, or `PortError::Transformation` if the stored
    /// document is malformed
    fn load_document(&self) -> Result<ExemptionDocument, PortError>;
}

/// Source of script-authored exemption records
pub trait ExemptionRecordSource: DomainPort {
    /// Returns the exemptions targeting a concept in a category
    ///
    /// An empty vector means no exemption is authored for the concept.
    /// Voided records may be included; callers skip them.
    fn exemptions_for(
        &self,
        category: ExemptionCategory,
        concept: ConceptId,
    ) -> Result<Vec<BillExemption>, PortError>;
}
