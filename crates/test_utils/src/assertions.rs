//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_billing::{AuditAction, Bill, BillAudit, BillStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts the bill status, printing the totals on failure
pub fn assert_bill_status(bill: &Bill, expected: BillStatus) {
    assert_eq!(
        bill.status(),
        expected,
        "Bill {} has status {} (total={:?}, paid={}), expected {}",
        bill.id(),
        bill.status(),
        bill.total().map(|t| t.to_string()),
        bill.total_payments(),
        expected
    );
}

/// Asserts that every active, non-exempted line carries the given status
pub fn assert_active_lines_status(bill: &Bill, expected: BillStatus) {
    for line in bill
        .line_items()
        .iter()
        .filter(|l| !l.is_voided() && !l.is_exempted())
    {
        assert_eq!(
            line.payment_status(),
            expected,
            "Line {} has status {}, expected {}",
            line.id(),
            line.payment_status(),
            expected
        );
    }
}

/// Asserts the action tags of an audit history, in the order given
pub fn assert_audit_tags(history: &[BillAudit], expected: &[&str]) {
    let actual: Vec<&str> = history.iter().map(|e| e.action.tag()).collect();
    assert_eq!(actual, expected, "Unexpected audit trail");
}

/// Counts the entries of a history with the given action tag
pub fn count_audit_action(history: &[BillAudit], action: &AuditAction) -> usize {
    history.iter().filter(|e| e.action.tag() == action.tag()).count()
}
