//! Integration tests for the exemption domain
//!
//! Tests cover age bracket matching, the sandboxed rule engine, the
//! three-tier static resolver, rule-based resolution, and table reloads.

use std::sync::Arc;
use std::thread;

use core_kernel::{ConceptId, DomainPort, OrderId, PatientId, PortError};
use domain_exemption::{
    matches_age_condition, BillExemption, BillExemptionRule, Bindings, ChargeRequest,
    ExemptionCategory, ExemptionConfigSource, ExemptionDecision, ExemptionDocument, ExemptionError,
    ExemptionGrant, ExemptionRecordSource, ExemptionResolver, ExemptionRuleEngine, ExemptionSource,
    ExemptionTableHandle, OrderRef, PatientSnapshot, RuleBasedSource, SandboxLimits,
    StaticExemptionTable, StaticScopeSource,
};

const TABLE_JSON: &str = r#"{
    "services": {
        "all": [1001],
        "program:HIV": [2001],
        "age<5": [3001],
        "age>=65": [3001, 3002]
    },
    "commodities": {
        "program:TB": [4001]
    }
}"#;

/// In-memory record source for rule-based tests
#[derive(Default)]
struct StubRecords {
    exemptions: Vec<BillExemption>,
}

impl DomainPort for StubRecords {}

impl ExemptionRecordSource for StubRecords {
    fn exemptions_for(
        &self,
        category: ExemptionCategory,
        concept: ConceptId,
    ) -> Result<Vec<BillExemption>, PortError> {
        Ok(self
            .exemptions
            .iter()
            .filter(|e| e.category == category && e.concept == concept)
            .cloned()
            .collect())
    }
}

/// Config source that always serves the same document
struct StubConfig {
    json: &'static str,
}

impl DomainPort for StubConfig {}

impl ExemptionConfigSource for StubConfig {
    fn load_document(&self) -> Result<ExemptionDocument, PortError> {
        ExemptionDocument::from_json_str(self.json)
            .map_err(|e| PortError::transformation(e.to_string()))
    }
}

fn table_handle() -> ExemptionTableHandle {
    ExemptionTableHandle::new(StaticExemptionTable::from_json_str(TABLE_JSON).unwrap())
}

fn request(category: ExemptionCategory, concept: i64, patient: PatientSnapshot) -> ChargeRequest {
    ChargeRequest::new(
        category,
        ConceptId::new(concept),
        patient,
        OrderRef::new(OrderId::new_v7(), 2),
    )
}

fn patient() -> PatientSnapshot {
    PatientSnapshot::new(PatientId::new_v7())
}

// ============================================================================
// Age condition matching
// ============================================================================

mod age_matching {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inclusive_range() {
        assert!(matches_age_condition(Some(4), "age:0-10"));
        assert!(matches_age_condition(Some(0), "age:0-10"));
        assert!(matches_age_condition(Some(10), "age:0-10"));
        assert!(!matches_age_condition(Some(11), "age:0-10"));
    }

    #[test]
    fn test_comparisons() {
        assert!(matches_age_condition(Some(4), "age<5"));
        assert!(!matches_age_condition(Some(5), "age<5"));
        assert!(matches_age_condition(Some(5), "age<=5"));
        assert!(matches_age_condition(Some(65), "age >= 65"));
        assert!(!matches_age_condition(Some(65), "age>65"));
        assert!(matches_age_condition(Some(7), "age==7"));
        assert!(matches_age_condition(Some(7), "age=7"));
    }

    #[test]
    fn test_malformed_never_matches() {
        assert!(!matches_age_condition(None, "age<5"));
        assert!(!matches_age_condition(Some(4), ""));
        assert!(!matches_age_condition(Some(4), "Age<5"));
        assert!(!matches_age_condition(Some(4), "age<five"));
        assert!(!matches_age_condition(Some(4), "age:0-"));
        assert!(!matches_age_condition(Some(4), "age:a-10"));
        assert!(!matches_age_condition(Some(4), "program:HIV"));
    }

    proptest! {
        #[test]
        fn range_matches_interval_semantics(
            age in -10i64..150,
            min in 0i64..100,
            span in 0i64..50
        ) {
            let max = min + span;
            let key = format!("age:{}-{}", min, max);
            prop_assert_eq!(matches_age_condition(Some(age), &key), age >= min && age <= max);
        }

        #[test]
        fn comparisons_match_integer_semantics(age in 0i64..150, bound in 0i64..150) {
            prop_assert_eq!(matches_age_condition(Some(age), &format!("age<{}", bound)), age < bound);
            prop_assert_eq!(matches_age_condition(Some(age), &format!("age<={}", bound)), age <= bound);
            prop_assert_eq!(matches_age_condition(Some(age), &format!("age>{}", bound)), age > bound);
            prop_assert_eq!(matches_age_condition(Some(age), &format!("age>={}", bound)), age >= bound);
            prop_assert_eq!(matches_age_condition(Some(age), &format!("age=={}", bound)), age == bound);
        }

        #[test]
        fn arbitrary_keys_never_panic(key in ".{0,24}", age in proptest::option::of(-5i64..200)) {
            let _ = matches_age_condition(age, &key);
        }
    }
}

// ============================================================================
// Rule engine
// ============================================================================

mod rule_engine {
    use super::*;

    fn engine() -> ExemptionRuleEngine {
        ExemptionRuleEngine::with_sandbox(SandboxLimits::default())
    }

    fn under_eighteen() -> BillExemption {
        BillExemption::new("Under 18", ConceptId::new(9001), ExemptionCategory::Service)
            .with_rule(BillExemptionRule::expression("age < 18"))
    }

    #[test]
    fn test_age_rule() {
        let engine = engine();
        assert!(engine
            .is_exemption_applicable(&under_eighteen(), &Bindings::new().with("age", 10))
            .unwrap());
        assert!(!engine
            .is_exemption_applicable(&under_eighteen(), &Bindings::new().with("age", 25))
            .unwrap());
    }

    #[test]
    fn test_vars_style_rule() {
        let exemption = BillExemption::new("Maternity", ConceptId::new(1), ExemptionCategory::Service)
            .with_rule(BillExemptionRule::expression("vars.ward == 'maternity'"));
        assert!(engine()
            .is_exemption_applicable(&exemption, &Bindings::new().with("ward", "maternity"))
            .unwrap());
    }

    #[test]
    fn test_unsupported_kind_is_reported() {
        let exemption = BillExemption::new("Legacy", ConceptId::new(1), ExemptionCategory::Service)
            .with_rule(BillExemptionRule::new("javascript".into(), "age < 18"));

        let result = engine().is_exemption_applicable(&exemption, &Bindings::new().with("age", 1));
        assert!(matches!(result, Err(ExemptionError::UnsupportedScriptKind(_))));
    }

    #[test]
    fn test_script_error_is_not_swallowed() {
        let exemption = BillExemption::new("Broken", ConceptId::new(1), ExemptionCategory::Service)
            .with_rule(BillExemptionRule::expression("age < )"));

        let result = engine().is_exemption_applicable(&exemption, &Bindings::new().with("age", 1));
        assert!(result.unwrap_err().is_script_failure());
    }
}

// ============================================================================
// Static scope resolution
// ============================================================================

mod static_resolution {
    use super::*;

    fn resolver() -> ExemptionResolver {
        ExemptionResolver::new().with_source(StaticScopeSource::new(table_handle()))
    }

    #[test]
    fn test_global_scope_first() {
        let decision = resolver()
            .resolve(&request(ExemptionCategory::Service, 1001, patient().with_program("HIV")))
            .unwrap();
        assert_eq!(decision, ExemptionDecision::granted(ExemptionGrant::GlobalScope));
    }

    #[test]
    fn test_program_scope() {
        let decision = resolver()
            .resolve(&request(ExemptionCategory::Commodity, 4001, patient().with_program("TB")))
            .unwrap();
        assert_eq!(
            decision.granted_by,
            Some(ExemptionGrant::ProgramScope { program: "TB".to_string() })
        );
    }

    #[test]
    fn test_age_scope_both_brackets() {
        let resolver = resolver();
        assert!(resolver
            .is_exempt(&request(ExemptionCategory::Service, 3001, patient().with_age(2)))
            .unwrap());
        assert!(resolver
            .is_exempt(&request(ExemptionCategory::Service, 3001, patient().with_age(70)))
            .unwrap());
        assert!(!resolver
            .is_exempt(&request(ExemptionCategory::Service, 3001, patient().with_age(30)))
            .unwrap());
    }

    #[test]
    fn test_unlisted_concept_not_exempt() {
        let decision = resolver()
            .resolve(&request(ExemptionCategory::Service, 7777, patient().with_age(2).with_program("HIV")))
            .unwrap();
        assert_eq!(decision, ExemptionDecision::not_exempt());
    }
}

// ============================================================================
// Composed resolution
// ============================================================================

mod composed_resolution {
    use super::*;

    fn resolver(records: StubRecords) -> ExemptionResolver {
        ExemptionResolver::standard(
            table_handle(),
            Arc::new(ExemptionRuleEngine::with_sandbox(SandboxLimits::default())),
            Arc::new(records),
        )
    }

    #[test]
    fn test_rule_source_answers_when_table_does_not() {
        let records = StubRecords {
            exemptions: vec![BillExemption::new("Bulk dispense", ConceptId::new(5001), ExemptionCategory::Commodity)
                .with_rule(BillExemptionRule::expression("quantity >= 2 and 'HIV' in programs"))],
        };

        let decision = resolver(records)
            .resolve(&request(ExemptionCategory::Commodity, 5001, patient().with_program("HIV")))
            .unwrap();

        assert!(decision.exempt);
        assert!(matches!(decision.granted_by, Some(ExemptionGrant::Rule { ref name, .. }) if name == "Bulk dispense"));
    }

    #[test]
    fn test_static_source_wins_before_rules_run() {
        let records = StubRecords {
            exemptions: vec![BillExemption::new("Broken", ConceptId::new(1001), ExemptionCategory::Service)
                .with_rule(BillExemptionRule::expression("age < )"))],
        };

        let decision = resolver(records)
            .resolve(&request(ExemptionCategory::Service, 1001, patient()))
            .unwrap();
        assert_eq!(decision.granted_by, Some(ExemptionGrant::GlobalScope));
    }

    #[test]
    fn test_rule_error_propagates() {
        let records = StubRecords {
            exemptions: vec![BillExemption::new("Broken", ConceptId::new(42), ExemptionCategory::Service)
                .with_rule(BillExemptionRule::expression("age < )"))],
        };

        let result = resolver(records).resolve(&request(ExemptionCategory::Service, 42, patient().with_age(3)));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_age_fails_age_rule() {
        let records = StubRecords {
            exemptions: vec![BillExemption::new("Under 18", ConceptId::new(42), ExemptionCategory::Service)
                .with_rule(BillExemptionRule::expression("age < 18"))],
        };

        let result = resolver(records).resolve(&request(ExemptionCategory::Service, 42, patient()));
        assert!(result.unwrap_err().is_script_failure());
    }

    #[test]
    fn test_voided_exemption_ignored() {
        let mut exemption = BillExemption::new("Retired", ConceptId::new(42), ExemptionCategory::Service)
            .with_rule(BillExemptionRule::expression("true"));
        exemption.void();

        let source = RuleBasedSource::new(
            Arc::new(ExemptionRuleEngine::with_sandbox(SandboxLimits::default())),
            Arc::new(StubRecords { exemptions: vec![exemption] }),
        );
        let resolver = ExemptionResolver::new().with_source(source);
        assert!(!resolver.is_exempt(&request(ExemptionCategory::Service, 42, patient())).unwrap());
    }
}

// ============================================================================
// Table reload
// ============================================================================

mod table_reload {
    use super::*;

    #[test]
    fn test_reload_replaces_table() {
        let handle = ExemptionTableHandle::default();
        let source = StaticScopeSource::new(handle.clone());
        let charge = request(ExemptionCategory::Service, 1001, patient());

        assert!(!source.is_exempt(&charge).unwrap());

        handle.reload_from(&StubConfig { json: TABLE_JSON }).unwrap();
        assert!(source.is_exempt(&charge).unwrap());
    }

    #[test]
    fn test_failed_reload_keeps_current_table() {
        let handle = table_handle();
        let result = handle.reload_from(&StubConfig { json: r#"{ "services": { "": [1] } }"# });

        assert!(matches!(result, Err(ExemptionError::Configuration(_))));
        assert!(handle
            .snapshot()
            .is_listed(ExemptionCategory::Service, "all", ConceptId::new(1001)));
    }

    #[test]
    fn test_readers_see_whole_tables_during_reload() {
        let handle = table_handle();
        let alternate = r#"{ "services": { "all": [1001], "age<5": [3001] } }"#;

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let table = handle.snapshot();
                        let count = table.scope_count();
                        assert!(count == 5 || count == 2, "saw partial table with {} scopes", count);
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let json = if i % 2 == 0 { alternate } else { TABLE_JSON };
            handle.replace(StaticExemptionTable::from_json_str(json).unwrap());
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
