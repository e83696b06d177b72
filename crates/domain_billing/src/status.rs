//! Bill and line item payment status

use std::fmt;

use serde::{Deserialize, Serialize};

/// Payment status of a bill or of one of its line items
///
/// ```text
/// PENDING -> POSTED -> PAID
///    \-> EXEMPTED
///    \-> CANCELLED
/// POSTED | PAID -> ADJUSTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    /// Nothing paid yet
    Pending,
    /// Partially paid
    Posted,
    /// Fully paid
    Paid,
    /// Waived by an exemption
    Exempted,
    /// Withdrawn before any payment
    Cancelled,
    /// Superseded by a corrective bill
    Adjusted,
}

impl BillStatus {
    /// Returns true for statuses that accept no further changes
    pub fn is_terminal(&self) -> bool {
        matches!(self, BillStatus::Cancelled | BillStatus::Adjusted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "PENDING",
            BillStatus::Posted => "POSTED",
            BillStatus::Paid => "PAID",
            BillStatus::Exempted => "EXEMPTED",
            BillStatus::Cancelled => "CANCELLED",
            BillStatus::Adjusted => "ADJUSTED",
        }
    }
}

impl Default for BillStatus {
    fn default() -> Self {
        BillStatus::Pending
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(BillStatus::Cancelled.is_terminal());
        assert!(BillStatus::Adjusted.is_terminal());
        assert!(!BillStatus::Paid.is_terminal());
        assert!(!BillStatus::Exempted.is_terminal());
    }

    #[test]
    fn test_serde_uses_upper_case() {
        assert_eq!(serde_json::to_string(&BillStatus::Exempted).unwrap(), "\"EXEMPTED\"");
        let status: BillStatus = serde_json::from_str("\"POSTED\"").unwrap();
        assert_eq!(status, BillStatus::Posted);
    }
}
