//! Comprehensive tests for domain_billing
//!
//! Tests cover totals, reconciliation, the discount workflow, voiding,
//! closing bills, and the audit trail.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BillableServiceId, CashPointId, Money, PatientId, ProviderId, StockItemId};

use domain_billing::{
    Actor, AuditAction, AuditLedger, Bill, BillLineItem, BillStatus, BillingError, ChargeRef,
    DiscountStatus, DiscountType, PaymentMode,
};

/// Helper to open a bill for a fresh patient
fn create_test_bill() -> Bill {
    Bill::new(PatientId::new(), ProviderId::new(), CashPointId::new())
}

fn cashier() -> Actor {
    Actor::Provider(ProviderId::new())
}

fn service_line(price: Decimal, quantity: u32) -> BillLineItem {
    BillLineItem::new(
        ChargeRef::Service(BillableServiceId::new()),
        Money::new(price),
        quantity,
    )
    .unwrap()
}

fn stock_line(price: Decimal, quantity: u32) -> BillLineItem {
    BillLineItem::new(ChargeRef::Stock(StockItemId::new()), Money::new(price), quantity).unwrap()
}

fn tags(bill: &mut Bill) -> Vec<&'static str> {
    bill.take_audit_entries().iter().map(|e| e.action.tag()).collect()
}

// ============================================================================
// Totals
// ============================================================================

mod totals {
    use super::*;

    #[test]
    fn test_voided_line_excluded_from_total() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(100), 2), Actor::System).unwrap();
        bill.add_line_item(stock_line(dec!(50), 1), Actor::System).unwrap();
        let voided = bill.add_line_item(stock_line(dec!(75), 3), Actor::System).unwrap();
        bill.void_line_item(voided, "wrong drug", Actor::System).unwrap();

        assert_eq!(bill.line_items_total().unwrap(), Money::new(dec!(250)));
        assert_eq!(bill.line_items().len(), 3);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut bill = create_test_bill();
        let first = bill.add_line_item(service_line(dec!(1), 1), Actor::System).unwrap();
        let second = bill.add_line_item(stock_line(dec!(2), 1), Actor::System).unwrap();
        let third = bill.add_line_item(service_line(dec!(3), 1), Actor::System).unwrap();

        let ids: Vec<_> = bill.line_items().iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn test_unpriced_line_rejected() {
        let mut bill = create_test_bill();
        let draft = BillLineItem::draft(ChargeRef::Service(BillableServiceId::new()));

        let result = bill.add_line_item(draft, Actor::System);
        assert!(matches!(result, Err(BillingError::MissingPrice(_))));
        assert!(bill.line_items().is_empty());
    }

    #[test]
    fn test_balance_and_change_due() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(80), 1), Actor::System).unwrap();

        bill.record_payment(Money::new(dec!(30)), PaymentMode::Cash, Actor::System).unwrap();
        assert_eq!(bill.balance_due().unwrap(), Money::new(dec!(50)));
        assert!(bill.change_due().unwrap().is_zero());

        bill.record_payment(Money::new(dec!(60)), PaymentMode::Cash, Actor::System).unwrap();
        assert!(bill.balance_due().unwrap().is_zero());
        assert_eq!(bill.change_due().unwrap(), Money::new(dec!(10)));
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

mod reconciliation {
    use super::*;

    #[test]
    fn test_partial_payment_posts_without_paying_lines() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(100), 1), Actor::System).unwrap();
        bill.record_payment(Money::new(dec!(50)), PaymentMode::Cash, Actor::System).unwrap();

        assert_eq!(bill.status(), BillStatus::Posted);
        assert!(bill
            .line_items()
            .iter()
            .all(|l| l.payment_status() == BillStatus::Pending));
    }

    #[test]
    fn test_full_payment_pays_every_active_line() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(60), 1), Actor::System).unwrap();
        bill.add_line_item(stock_line(dec!(40), 1), Actor::System).unwrap();
        let voided = bill.add_line_item(stock_line(dec!(10), 1), Actor::System).unwrap();
        bill.void_line_item(voided, "returned", Actor::System).unwrap();

        bill.record_payment(Money::new(dec!(100)), PaymentMode::MobileMoney, Actor::System).unwrap();

        assert_eq!(bill.status(), BillStatus::Paid);
        for line in bill.line_items() {
            if line.is_voided() {
                assert_eq!(line.payment_status(), BillStatus::Pending);
            } else {
                assert_eq!(line.payment_status(), BillStatus::Paid);
            }
        }
    }

    #[test]
    fn test_voided_payment_reopens_bill() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(20), 1), Actor::System).unwrap();
        let payment = bill.record_payment(Money::new(dec!(20)), PaymentMode::Cash, Actor::System).unwrap();
        assert_eq!(bill.status(), BillStatus::Paid);

        bill.void_payment(payment, "counterfeit note", Actor::System).unwrap();

        assert_eq!(bill.status(), BillStatus::Pending);
        assert!(bill.total_payments().is_zero());
        assert!(bill
            .line_items()
            .iter()
            .all(|l| l.payment_status() == BillStatus::Pending));
    }

    #[test]
    fn test_empty_bill_stays_pending() {
        let mut bill = create_test_bill();
        bill.synchronize_status().unwrap();
        assert_eq!(bill.status(), BillStatus::Pending);
    }

    #[test]
    fn test_all_exempted_lines_exempt_the_bill() {
        let mut bill = create_test_bill();
        let exempted = BillLineItem::exempted(ChargeRef::Stock(StockItemId::new()), 2).unwrap();
        bill.add_line_item(exempted, Actor::System).unwrap();

        assert_eq!(bill.status(), BillStatus::Exempted);
        assert!(bill.total().unwrap().is_zero());
    }

    #[test]
    fn test_exempted_line_not_overwritten_when_paid() {
        let mut bill = create_test_bill();
        bill.add_line_item(
            BillLineItem::exempted(ChargeRef::Stock(StockItemId::new()), 1).unwrap(),
            Actor::System,
        )
        .unwrap();
        bill.add_line_item(service_line(dec!(15), 1), Actor::System).unwrap();
        assert_eq!(bill.status(), BillStatus::Pending);

        bill.record_payment(Money::new(dec!(15)), PaymentMode::Cash, Actor::System).unwrap();

        assert_eq!(bill.status(), BillStatus::Paid);
        assert_eq!(bill.line_items()[0].payment_status(), BillStatus::Exempted);
        assert_eq!(bill.line_items()[1].payment_status(), BillStatus::Paid);
    }

    #[test]
    fn test_unknown_ids_not_found() {
        let mut bill = create_test_bill();
        let other = {
            let mut other = create_test_bill();
            other.add_line_item(service_line(dec!(1), 1), Actor::System).unwrap()
        };

        let result = bill.void_line_item(other, "nope", Actor::System);
        assert!(matches!(result, Err(BillingError::LineItemNotFound(_))));
    }

    #[test]
    fn test_negative_payment_rejected() {
        let mut bill = create_test_bill();
        let result = bill.record_payment(Money::new(dec!(-1)), PaymentMode::Cash, Actor::System);
        assert!(matches!(result, Err(BillingError::Validation(_))));
        assert!(bill.payments().is_empty());
    }
}

// ============================================================================
// Discount workflow
// ============================================================================

mod discounts {
    use super::*;

    fn hundred_bill() -> Bill {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(100), 1), Actor::System).unwrap();
        bill
    }

    #[test]
    fn test_approved_discount_reduces_total() {
        let mut bill = hundred_bill();
        bill.initiate_discount(DiscountType::FixedAmount, dec!(30), "hardship", cashier()).unwrap();
        assert_eq!(bill.total().unwrap(), Money::new(dec!(100)));

        bill.approve_discount(cashier()).unwrap();
        assert_eq!(bill.total().unwrap(), Money::new(dec!(70)));

        bill.record_payment(Money::new(dec!(70)), PaymentMode::Cash, Actor::System).unwrap();
        assert_eq!(bill.status(), BillStatus::Paid);
        assert!(bill
            .line_items()
            .iter()
            .all(|l| l.payment_status() == BillStatus::Paid));
    }

    #[test]
    fn test_approval_settles_covered_bill() {
        let mut bill = hundred_bill();
        bill.record_payment(Money::new(dec!(90)), PaymentMode::Cash, Actor::System).unwrap();
        assert_eq!(bill.status(), BillStatus::Posted);

        bill.initiate_discount(DiscountType::Percentage, dec!(10), "staff", cashier()).unwrap();
        bill.approve_discount(cashier()).unwrap();

        assert_eq!(bill.total().unwrap(), Money::new(dec!(90)));
        assert_eq!(bill.status(), BillStatus::Paid);
    }

    #[test]
    fn test_rejected_discount_has_no_effect() {
        let mut bill = hundred_bill();
        bill.initiate_discount(DiscountType::FixedAmount, dec!(30), "hardship", cashier()).unwrap();
        bill.reject_discount(cashier()).unwrap();

        assert_eq!(bill.discount().unwrap().status, DiscountStatus::Rejected);
        assert_eq!(bill.total().unwrap(), Money::new(dec!(100)));
    }

    #[test]
    fn test_second_discount_blocked_while_active() {
        let mut bill = hundred_bill();
        bill.initiate_discount(DiscountType::FixedAmount, dec!(10), "first", cashier()).unwrap();

        let result = bill.initiate_discount(DiscountType::FixedAmount, dec!(5), "second", cashier());
        assert!(matches!(result, Err(BillingError::InvalidStateTransition { .. })));

        bill.approve_discount(cashier()).unwrap();
        let result = bill.initiate_discount(DiscountType::FixedAmount, dec!(5), "third", cashier());
        assert!(matches!(result, Err(BillingError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_discount_after_rejection_allowed() {
        let mut bill = hundred_bill();
        bill.initiate_discount(DiscountType::FixedAmount, dec!(10), "first", cashier()).unwrap();
        bill.reject_discount(cashier()).unwrap();

        bill.initiate_discount(DiscountType::Percentage, dec!(5), "second", cashier()).unwrap();
        assert_eq!(bill.discount().unwrap().status, DiscountStatus::Pending);
    }

    #[test]
    fn test_discount_guards() {
        let mut bill = hundred_bill();

        let result = bill.initiate_discount(DiscountType::Percentage, dec!(101), "too much", cashier());
        assert!(matches!(result, Err(BillingError::Validation(_))));

        let result = bill.initiate_discount(DiscountType::FixedAmount, dec!(100.01), "too much", cashier());
        assert!(matches!(result, Err(BillingError::Validation(_))));

        bill.record_payment(Money::new(dec!(100)), PaymentMode::Cash, Actor::System).unwrap();
        let result = bill.initiate_discount(DiscountType::FixedAmount, dec!(1), "late", cashier());
        assert!(matches!(result, Err(BillingError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_reject_only_from_pending() {
        let mut bill = hundred_bill();
        assert!(matches!(bill.reject_discount(cashier()), Err(BillingError::Validation(_))));

        bill.initiate_discount(DiscountType::FixedAmount, dec!(10), "hardship", cashier()).unwrap();
        bill.approve_discount(cashier()).unwrap();

        let result = bill.reject_discount(cashier());
        assert!(matches!(result, Err(BillingError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_total_floored_after_void() {
        let mut bill = create_test_bill();
        let big = bill.add_line_item(service_line(dec!(100), 1), Actor::System).unwrap();
        bill.add_line_item(service_line(dec!(20), 1), Actor::System).unwrap();
        bill.initiate_discount(DiscountType::FixedAmount, dec!(110), "waiver", cashier()).unwrap();
        bill.approve_discount(cashier()).unwrap();

        bill.void_line_item(big, "not performed", Actor::System).unwrap();

        assert!(bill.total().unwrap().is_zero());
        assert_eq!(bill.status(), BillStatus::Paid);
    }
}

// ============================================================================
// Closing
// ============================================================================

mod closing {
    use super::*;

    #[test]
    fn test_cancel_requires_no_payment() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(10), 1), Actor::System).unwrap();
        let payment = bill.record_payment(Money::new(dec!(5)), PaymentMode::Cash, Actor::System).unwrap();

        let result = bill.cancel("patient left", cashier());
        assert!(matches!(result, Err(BillingError::InvalidStateTransition { .. })));

        bill.void_payment(payment, "refunded", cashier()).unwrap();
        bill.cancel("patient left", cashier()).unwrap();
        assert_eq!(bill.status(), BillStatus::Cancelled);
        assert_eq!(bill.closing_reason(), Some("patient left"));
    }

    #[test]
    fn test_cancelled_bill_is_frozen() {
        let mut bill = create_test_bill();
        bill.cancel("opened by mistake", cashier()).unwrap();

        assert!(matches!(
            bill.record_payment(Money::new(dec!(1)), PaymentMode::Cash, Actor::System),
            Err(BillingError::BillClosed(_))
        ));
        assert!(matches!(
            bill.initiate_discount(DiscountType::FixedAmount, dec!(0), "x", cashier()),
            Err(BillingError::BillClosed(_))
        ));
        assert!(matches!(bill.cancel("again", cashier()), Err(BillingError::BillClosed(_))));
    }

    #[test]
    fn test_adjust_opens_corrective_bill() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(40), 1), Actor::System).unwrap();
        let voided = bill.add_line_item(stock_line(dec!(5), 2), Actor::System).unwrap();
        bill.void_line_item(voided, "not dispensed", Actor::System).unwrap();
        bill.record_payment(Money::new(dec!(40)), PaymentMode::Cash, Actor::System).unwrap();

        let corrective = bill.adjust("wrong price list", cashier()).unwrap();

        assert_eq!(bill.status(), BillStatus::Adjusted);
        assert_eq!(corrective.adjusts(), Some(bill.id()));
        assert_eq!(corrective.status(), BillStatus::Pending);
        assert_eq!(corrective.line_items().len(), 1);
        assert_eq!(corrective.line_items_total().unwrap(), Money::new(dec!(40)));
        assert_eq!(corrective.patient_id(), bill.patient_id());
    }

    #[test]
    fn test_adjust_requires_posted_or_paid() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(40), 1), Actor::System).unwrap();

        let result = bill.adjust("nothing paid", cashier());
        assert!(matches!(result, Err(BillingError::InvalidStateTransition { .. })));
        assert!(bill.is_open());
    }
}

// ============================================================================
// Audit trail
// ============================================================================

mod audit_trail {
    use super::*;

    #[test]
    fn test_creation_and_discount_transitions_audited_once() {
        let mut bill = create_test_bill();
        assert_eq!(tags(&mut bill), vec!["CREATED"]);

        bill.add_line_item(service_line(dec!(100), 1), Actor::System).unwrap();
        assert_eq!(tags(&mut bill), vec!["LINE_ITEM_ADDED"]);

        bill.initiate_discount(DiscountType::FixedAmount, dec!(10), "hardship", cashier()).unwrap();
        assert_eq!(tags(&mut bill), vec!["DISCOUNT_INITIATED"]);

        bill.reject_discount(cashier()).unwrap();
        assert_eq!(tags(&mut bill), vec!["DISCOUNT_REJECTED"]);

        bill.initiate_discount(DiscountType::FixedAmount, dec!(10), "retry", cashier()).unwrap();
        bill.approve_discount(cashier()).unwrap();
        assert_eq!(tags(&mut bill), vec!["DISCOUNT_INITIATED", "DISCOUNT_APPROVED"]);
    }

    #[test]
    fn test_status_change_recorded_with_transition() {
        let mut bill = create_test_bill();
        bill.add_line_item(service_line(dec!(10), 1), Actor::System).unwrap();
        bill.take_audit_entries();

        bill.record_payment(Money::new(dec!(10)), PaymentMode::Cash, Actor::System).unwrap();
        let entries = bill.take_audit_entries();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::PaymentRecorded);
        assert_eq!(
            entries[1].action,
            AuditAction::StatusChanged {
                from: BillStatus::Pending,
                to: BillStatus::Paid
            }
        );
    }

    #[test]
    fn test_void_reason_recorded() {
        let mut bill = create_test_bill();
        let line = bill.add_line_item(service_line(dec!(10), 1), Actor::System).unwrap();
        bill.take_audit_entries();

        bill.void_line_item(line, "  duplicate  ", cashier()).unwrap();
        let entries = bill.take_audit_entries();
        assert_eq!(entries[0].reason.as_deref(), Some("duplicate"));
    }

    #[test]
    fn test_ledger_history_for_bill() {
        let mut ledger = AuditLedger::new();
        let mut bill = create_test_bill();
        ledger.register_bill(bill.id());

        bill.add_line_item(service_line(dec!(10), 1), Actor::System).unwrap();
        bill.record_payment(Money::new(dec!(10)), PaymentMode::Cash, Actor::System).unwrap();
        let appended = ledger.append_all(bill.take_audit_entries()).unwrap();

        let history = ledger.history(&bill.id());
        assert_eq!(history.len(), appended);
        assert!(history.windows(2).all(|w| w[0].recorded_at >= w[1].recorded_at));
        assert_eq!(ledger.purge_before(Utc::now() - chrono::Duration::days(1)), 0);
    }
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_lines() -> impl Strategy<Value = Vec<(i64, u32, bool)>> {
        proptest::collection::vec((0i64..100_000, 1u32..20, any::<bool>()), 0..12)
    }

    proptest! {
        #[test]
        fn line_total_is_price_times_quantity(cents in 0i64..10_000_000, quantity in 1u32..1_000) {
            let line = BillLineItem::new(
                ChargeRef::Service(BillableServiceId::new()),
                Money::from_minor(cents),
                quantity,
            ).unwrap();
            prop_assert_eq!(line.total().unwrap(), Money::from_minor(cents * i64::from(quantity)));
        }

        #[test]
        fn voided_lines_never_count(lines in arb_lines()) {
            let mut bill = create_test_bill();
            let mut expected = Money::zero();

            for (cents, quantity, void) in lines {
                let line = BillLineItem::new(
                    ChargeRef::Stock(StockItemId::new()),
                    Money::from_minor(cents),
                    quantity,
                ).unwrap();
                let id = bill.add_line_item(line, Actor::System).unwrap();
                if void {
                    bill.void_line_item(id, "void", Actor::System).unwrap();
                } else {
                    expected = expected + Money::from_minor(cents * i64::from(quantity));
                }
            }

            prop_assert_eq!(bill.line_items_total().unwrap(), expected);
            prop_assert!(!bill.total().unwrap().is_negative());
        }

        #[test]
        fn reconciliation_is_idempotent(
            lines in arb_lines(),
            payments in proptest::collection::vec((0i64..200_000, any::<bool>()), 0..6)
        ) {
            let mut bill = create_test_bill();
            for (cents, quantity, _) in lines {
                bill.add_line_item(
                    BillLineItem::new(ChargeRef::Stock(StockItemId::new()), Money::from_minor(cents), quantity).unwrap(),
                    Actor::System,
                ).unwrap();
            }
            for (cents, void) in payments {
                let id = bill.record_payment(Money::from_minor(cents), PaymentMode::Cash, Actor::System).unwrap();
                if void {
                    bill.void_payment(id, "void", Actor::System).unwrap();
                }
            }
            bill.take_audit_entries();

            let status = bill.status();
            let line_statuses: Vec<_> = bill.line_items().iter().map(|l| l.payment_status()).collect();

            bill.synchronize_status().unwrap();
            bill.synchronize_status().unwrap();

            prop_assert_eq!(bill.status(), status);
            let after: Vec<_> = bill.line_items().iter().map(|l| l.payment_status()).collect();
            prop_assert_eq!(after, line_statuses);
            prop_assert!(bill.take_audit_entries().is_empty());
        }
    }
}
