//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the billing and exemption domains.
//! These fixtures are consistent and predictable for unit tests.

use chrono::NaiveDate;
use core_kernel::{
    BillableServiceId, BirthDate, CashPointId, ConceptId, Money, OrderId, PatientId, ProviderId,
    StockItemId,
};
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Standard consultation fee
    pub fn consultation_fee() -> Money {
        Money::new(dec!(100.00))
    }

    /// Price of a commodity dispensed in units
    pub fn tablet_price() -> Money {
        Money::new(dec!(2.50))
    }

    /// Laboratory test fee
    pub fn lab_fee() -> Money {
        Money::new(dec!(75.00))
    }

    pub fn zero() -> Money {
        Money::zero()
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Reference "today" used for age computation (Jun 15, 2024)
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    /// Birth date of a four-year-old on `today()`
    pub fn child_birth_date() -> BirthDate {
        BirthDate::exact(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap())
    }

    /// Birth date of a 35-year-old on `today()`
    pub fn adult_birth_date() -> BirthDate {
        BirthDate::exact(NaiveDate::from_ymd_opt(1989, 1, 20).unwrap())
    }

    /// Birth date of a 70-year-old on `today()`
    pub fn elder_birth_date() -> BirthDate {
        BirthDate::estimated(NaiveDate::from_ymd_opt(1954, 1, 1).unwrap())
    }
}

/// Fixture for concept identifiers used across exemption tests
pub struct ConceptFixtures;

impl ConceptFixtures {
    /// Listed under the global services scope
    pub fn free_consultation() -> ConceptId {
        ConceptId::new(1001)
    }

    /// Listed under the HIV program scope
    pub fn viral_load_test() -> ConceptId {
        ConceptId::new(2001)
    }

    /// Listed under the under-five age scope
    pub fn child_vaccination() -> ConceptId {
        ConceptId::new(3001)
    }

    /// Listed under the elder age scope
    pub fn elder_screening() -> ConceptId {
        ConceptId::new(3002)
    }

    /// Listed under the global commodities scope
    pub fn free_commodity() -> ConceptId {
        ConceptId::new(5001)
    }

    /// Not listed anywhere
    pub fn paid_service() -> ConceptId {
        ConceptId::new(9001)
    }
}

/// Fixture for exemption configuration documents
pub struct ExemptionFixtures;

impl ExemptionFixtures {
    /// Exemption document matching `ConceptFixtures`
    pub fn table_json() -> &'static str {
        r#"{
            "services": {
                "all": [1001],
                "program:HIV": [2001],
                "age<5": [3001],
                "age>=60": [3002]
            },
            "commodities": {
                "all": [5001]
            }
        }"#
    }

    /// A document listing nothing
    pub fn empty_table_json() -> &'static str {
        r#"{ "services": {}, "commodities": {} }"#
    }

    /// Exemption document that also lists the paid service globally
    pub fn expanded_table_json() -> &'static str {
        r#"{
            "services": {
                "all": [1001, 9001]
            },
            "commodities": {}
        }"#
    }

    /// Price list JSON matching `ConceptFixtures`
    pub fn price_list_json() -> &'static str {
        r#"{
            "1001": "100.00",
            "2001": "75.00",
            "3001": "40.00",
            "9001": "100.00",
            "5001": "2.50"
        }"#
    }
}

/// Fixture for ID generation
pub struct IdFixtures;

impl IdFixtures {
    pub fn patient_id() -> PatientId {
        PatientId::new_v7()
    }

    pub fn cashier_id() -> ProviderId {
        ProviderId::new_v7()
    }

    pub fn cash_point_id() -> CashPointId {
        CashPointId::new_v7()
    }

    pub fn order_id() -> OrderId {
        OrderId::new_v7()
    }

    pub fn service_id() -> BillableServiceId {
        BillableServiceId::new_v7()
    }

    pub fn stock_item_id() -> StockItemId {
        StockItemId::new_v7()
    }
}
