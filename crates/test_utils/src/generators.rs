//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{ConceptId, Money};
use domain_exemption::{ExemptionCategory, PatientSnapshot};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::IdFixtures;

/// Strategy for non-negative amounts in minor units
pub fn price_minor_strategy() -> impl Strategy<Value = i64> {
    0i64..10_000_000i64
}

/// Strategy for unit prices, zero included
pub fn price_strategy() -> impl Strategy<Value = Money> {
    price_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for strictly positive payments
pub fn payment_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(Money::from_minor)
}

/// Strategy for line item quantities
pub fn quantity_strategy() -> impl Strategy<Value = u32> {
    1u32..500u32
}

/// Strategy for (price, quantity) line specifications
pub fn line_spec_strategy() -> impl Strategy<Value = (Money, u32)> {
    (price_strategy(), quantity_strategy())
}

/// Strategy for discount percentages (0% to 100%)
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10000u32).prop_map(|n| Decimal::new(n as i64, 2))
}

/// Strategy for patient ages, including infants and the very old
pub fn age_strategy() -> impl Strategy<Value = i64> {
    0i64..120i64
}

/// Strategy for concept identifiers
pub fn concept_id_strategy() -> impl Strategy<Value = ConceptId> {
    (1i64..100_000i64).prop_map(ConceptId::new)
}

pub fn category_strategy() -> impl Strategy<Value = ExemptionCategory> {
    prop_oneof![Just(ExemptionCategory::Service), Just(ExemptionCategory::Commodity)]
}

/// Strategy for health program names
pub fn program_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("HIV".to_string()),
        Just("TB".to_string()),
        Just("MALARIA".to_string()),
        Just("MATERNAL".to_string()),
    ]
}

/// Strategy for patients with an optional age and up to three programs
pub fn patient_strategy() -> impl Strategy<Value = PatientSnapshot> {
    (
        proptest::option::of(age_strategy()),
        proptest::collection::vec(program_strategy(), 0..3),
    )
        .prop_map(|(age, programs)| {
            let mut patient = PatientSnapshot::new(IdFixtures::patient_id());
            patient.age = age;
            patient.active_programs = programs;
            patient
        })
}

/// Strategy for age scope bounds `(low, high)` with `low <= high`
pub fn age_range_strategy() -> impl Strategy<Value = (i64, i64)> {
    (0i64..120i64, 0i64..60i64).prop_map(|(low, span)| (low, low + span))
}
