//! Application errors

use thiserror::Error;

use core_kernel::PortError;
use domain_billing::BillingError;
use domain_exemption::ExemptionError;

/// Errors surfaced by the billing service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Exemption(#[from] ExemptionError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

impl ServiceError {
    /// Returns true if the error reports a missing bill, line item or payment
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Billing(e) => e.is_not_found(),
            ServiceError::Port(e) => e.is_not_found(),
            _ => false,
        }
    }
}
