//! Billing Domain Ports
//!
//! Port interfaces for bill persistence, audit persistence and price lookup.
//! `app_billing` ships in-memory adapters for all of them; a database-backed
//! adapter implements the same traits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::ports::{BillRepository, PriceLookup};
//! use std::sync::Arc;
//!
//! pub struct BillingService {
//!     bills: Arc<dyn BillRepository>,
//!     prices: Arc<dyn PriceLookup>,
//! }
//! ```

use chrono::{DateTime, Utc};
use tracing::warn;

use core_kernel::{BillId, ConceptId, DomainPort, Money, PatientId, PortError};

use crate::audit::BillAudit;
use crate::bill::Bill;

/// Persistence for bills
pub trait BillRepository: DomainPort {
    /// Retrieves a bill by ID
    ///
    /// # Returns
    ///
    /// The bill if found, or `PortError::NotFound`
    fn get(&self, id: BillId) -> Result<Bill, PortError>;

    /// Stores a bill
    ///
    /// # Returns
    ///
    /// `PortError::Conflict` if a newer version of the bill is already stored
    fn save(&self, bill: &Bill) -> Result<(), PortError>;

    /// Bills for a patient, oldest first; empty when none exist
    fn find_by_patient(&self, patient_id: PatientId) -> Result<Vec<Bill>, PortError>;
}

/// Persistence for audit entries
pub trait AuditRepository: DomainPort {
    /// Makes a bill known so its entries can be appended
    fn register_bill(&self, bill_id: BillId) -> Result<(), PortError>;

    /// Appends entries atomically
    ///
    /// # Returns
    ///
    /// `PortError::NotFound` if any entry references an unregistered bill
    fn append(&self, entries: Vec<BillAudit>) -> Result<(), PortError>;

    /// History of a bill, newest first
    fn history(&self, bill_id: BillId) -> Result<Vec<BillAudit>, PortError>;

    /// Administrative retention purge; returns the number of entries removed
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PortError>;
}

/// Unit price lookup for chargeable concepts
pub trait PriceLookup: DomainPort {
    /// Unit price of a concept, `None` when it is not priced
    fn unit_price(&self, concept: ConceptId) -> Result<Option<Money>, PortError>;

    /// Unit price, falling back to zero when the concept is not priced
    fn price_or_zero(&self, concept: ConceptId) -> Result<Money, PortError> {
        match self.unit_price(concept)? {
            Some(price) => Ok(price),
            None => {
                warn!(concept_id = %concept, "No price for concept, billing at zero");
                Ok(Money::zero())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct OnePrice;

    impl DomainPort for OnePrice {}

    impl PriceLookup for OnePrice {
        fn unit_price(&self, concept: ConceptId) -> Result<Option<Money>, PortError> {
            Ok((concept == ConceptId::new(1)).then(|| Money::new(dec!(12.50))))
        }
    }

    #[test]
    fn test_price_or_zero() {
        assert_eq!(OnePrice.price_or_zero(ConceptId::new(1)).unwrap(), Money::new(dec!(12.50)));
        assert_eq!(OnePrice.price_or_zero(ConceptId::new(2)).unwrap(), Money::zero());
    }
}
