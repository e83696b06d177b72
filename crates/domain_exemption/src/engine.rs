//! Exemption rule engine
//!
//! Dispatches each rule to the evaluator registered for its script kind and
//! folds an exemption's rules with "any rule matches" semantics.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_exemption::{BillExemption, BillExemptionRule, Bindings, ExemptionRuleEngine};
//!
//! let engine = ExemptionRuleEngine::with_sandbox(SandboxLimits::default());
//! let exemption = BillExemption::new("Under 18", concept, ExemptionCategory::Service)
//!     .with_rule(BillExemptionRule::expression("age < 18"));
//!
//! let applies = engine.is_exemption_applicable(&exemption, &Bindings::new().with("age", 10))?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ExemptionError;
use crate::exemption::{BillExemption, BillExemptionRule};
use crate::sandbox::{SandboxLimits, SandboxedExpressionEvaluator};
use crate::script::{Bindings, ScriptEvaluator, ScriptKind};

/// Registry of script evaluators keyed by kind
pub struct ExemptionRuleEngine {
    evaluators: HashMap<ScriptKind, Arc<dyn ScriptEvaluator>>,
}

impl ExemptionRuleEngine {
    /// Builds the engine from every available evaluator
    ///
    /// # Errors
    ///
    /// Returns `ExemptionError::Configuration` if two evaluators claim the same
    /// kind.
    pub fn new(evaluators: Vec<Arc<dyn ScriptEvaluator>>) -> Result<Self, ExemptionError> {
        let mut registry: HashMap<ScriptKind, Arc<dyn ScriptEvaluator>> = HashMap::new();

        for evaluator in evaluators {
            let kind = evaluator.kind();
            if registry.contains_key(&kind) {
                return Err(ExemptionError::Configuration(format!(
                    "more than one evaluator registered for script kind {}",
                    kind
                )));
            }
            registry.insert(kind, evaluator);
        }

        Ok(Self { evaluators: registry })
    }

    /// Builds an engine with only the sandboxed expression evaluator
    pub fn with_sandbox(limits: SandboxLimits) -> Self {
        let evaluator: Arc<dyn ScriptEvaluator> = Arc::new(SandboxedExpressionEvaluator::new(limits));
        let mut evaluators = HashMap::new();
        evaluators.insert(evaluator.kind(), evaluator);
        Self { evaluators }
    }

    /// Returns true if an evaluator is registered for the kind
    pub fn supports(&self, kind: &ScriptKind) -> bool {
        self.evaluators.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<ScriptKind> {
        let mut kinds: Vec<ScriptKind> = self.evaluators.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Evaluates a single rule
    ///
    /// # Errors
    ///
    /// - `UnsupportedScriptKind` when no evaluator handles the rule's kind
    /// - any error the evaluator reports for the script
    pub fn evaluate_rule(
        &self,
        rule: &BillExemptionRule,
        bindings: &Bindings,
    ) -> Result<bool, ExemptionError> {
        let evaluator = self
            .evaluators
            .get(&rule.script_kind)
            .ok_or_else(|| ExemptionError::UnsupportedScriptKind(rule.script_kind.to_string()))?;

        evaluator.evaluate(&rule.script, bindings).map_err(|e| {
            warn!(rule_id = %rule.id, kind = %rule.script_kind, error = %e, "Exemption rule failed");
            e
        })
    }

    /// Returns true if any active rule of the exemption holds
    ///
    /// Exemptions without rules, voided exemptions, and exemptions whose rules
    /// are all voided never apply. Evaluation stops at the first match.
    pub fn is_exemption_applicable(
        &self,
        exemption: &BillExemption,
        bindings: &Bindings,
    ) -> Result<bool, ExemptionError> {
        if exemption.voided {
            return Ok(false);
        }

        for rule in exemption.active_rules() {
            if self.evaluate_rule(rule, bindings)? {
                debug!(exemption = %exemption.name, rule_id = %rule.id, "Exemption rule matched");
                return Ok(true);
            }
        }

        Ok(false)
    }
}

impl std::fmt::Debug for ExemptionRuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExemptionRuleEngine")
            .field("kinds", &self.kinds())
            .finish()
    }
}
