//! Script-authored exemptions
//!
//! A `BillExemption` waives payment for one concept when any of its rules
//! holds. Rules are independent boolean predicates: their order carries no
//! meaning.

use serde::{Deserialize, Serialize};

use core_kernel::{ConceptId, ExemptionId, ExemptionRuleId};

use crate::script::ScriptKind;
use crate::table::ExemptionCategory;

/// One predicate of an exemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillExemptionRule {
    pub id: ExemptionRuleId,
    /// Language of `script`
    pub script_kind: ScriptKind,
    pub script: String,
    pub description: Option<String>,
    #[serde(default)]
    pub voided: bool,
}

impl BillExemptionRule {
    pub fn new(script_kind: ScriptKind, script: impl Into<String>) -> Self {
        Self {
            id: ExemptionRuleId::new_v7(),
            script_kind,
            script: script.into(),
            description: None,
            voided: false,
        }
    }

    /// Creates a rule in the sandboxed expression language
    pub fn expression(script: impl Into<String>) -> Self {
        Self::new(ScriptKind::expression(), script)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn void(&mut self) {
        self.voided = true;
    }
}

/// A named exemption for a concept, granted when any active rule matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillExemption {
    pub id: ExemptionId,
    pub name: String,
    pub concept: ConceptId,
    pub category: ExemptionCategory,
    #[serde(default)]
    pub rules: Vec<BillExemptionRule>,
    #[serde(default)]
    pub voided: bool,
}

impl BillExemption {
    pub fn new(name: impl Into<String>, concept: ConceptId, category: ExemptionCategory) -> Self {
        Self {
            id: ExemptionId::new_v7(),
            name: name.into(),
            concept,
            category,
            rules: Vec::new(),
            voided: false,
        }
    }

    pub fn with_rule(mut self, rule: BillExemptionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rule(&mut self, rule: BillExemptionRule) {
        self.rules.push(rule);
    }

    /// Rules that take part in evaluation
    pub fn active_rules(&self) -> impl Iterator<Item = &BillExemptionRule> {
        self.rules.iter().filter(|rule| !rule.voided)
    }

    /// Returns true if the exemption targets the given charge
    pub fn covers(&self, category: ExemptionCategory, concept: ConceptId) -> bool {
        !self.voided && self.category == category && self.concept == concept
    }

    pub fn void(&mut self) {
        self.voided = true;
    }
}
