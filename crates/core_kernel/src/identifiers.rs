//! Strongly-typed identifiers for domain entities
//!
//! Using newtype wrappers around UUIDs provides type safety and prevents
//! accidental mixing of different identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Billing domain identifiers
define_id!(BillId, "BILL");
define_id!(LineItemId, "BLI");
define_id!(PaymentId, "PAY");
define_id!(AuditEntryId, "AUD");

// Party and location identifiers
define_id!(PatientId, "PAT");
define_id!(ProviderId, "PRV");
define_id!(CashPointId, "CSH");

// Chargeable item identifiers
define_id!(StockItemId, "STK");
define_id!(BillableServiceId, "SVC");
define_id!(OrderId, "ORD");

// Exemption domain identifiers
define_id!(ExemptionId, "EXM");
define_id!(ExemptionRuleId, "EXR");

/// Identifier of a coded concept in the host clinical dictionary
///
/// Concepts are numbered by the host system, so unlike the UUID-backed
/// identifiers above this wraps the integer id as supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(i64);

impl ConceptId {
    /// Wraps a host concept id
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw concept id
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPT-{}", self.0)
    }
}

impl FromStr for ConceptId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("CPT-").unwrap_or(s);
        Ok(Self(raw.trim().parse()?))
    }
}

impl From<i64> for ConceptId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
