//! Exemption resolution for a single charge
//!
//! A charge is exempt when any registered [`ExemptionSource`] grants it. Two
//! sources ship with the crate:
//!
//! - [`StaticScopeSource`] walks the static scope table in three tiers:
//!   the global scope, then one scope per enrolled program, then every
//!   age-bracket scope.
//! - [`RuleBasedSource`] evaluates the script-authored exemptions recorded for
//!   the charge's concept.
//!
//! Callers only see an [`ExemptionDecision`], whichever mechanism produced it.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use core_kernel::{BirthDate, ConceptId, ExemptionId, OrderId, PatientId};

use crate::age_condition::matches_age_condition;
use crate::engine::ExemptionRuleEngine;
use crate::error::ExemptionError;
use crate::ports::ExemptionRecordSource;
use crate::script::Bindings;
use crate::table::{program_scope, ExemptionCategory, ExemptionTableHandle, GLOBAL_SCOPE};

/// What the resolver needs to know about the patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub id: PatientId,
    /// Age in completed years, `None` when unknown
    pub age: Option<i64>,
    /// Names of the programs the patient is actively enrolled in
    #[serde(default)]
    pub active_programs: Vec<String>,
}

impl PatientSnapshot {
    pub fn new(id: PatientId) -> Self {
        Self {
            id,
            age: None,
            active_programs: Vec::new(),
        }
    }

    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    /// Derives the age from a birth date; a birth date after `on` leaves the
    /// age unknown
    pub fn with_birth_date(mut self, birth_date: BirthDate, on: NaiveDate) -> Self {
        self.age = birth_date.age_on(on).ok();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.active_programs.push(program.into());
        self
    }
}

/// The order that produced the charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub id: OrderId,
    pub quantity: u32,
}

impl OrderRef {
    pub fn new(id: OrderId, quantity: u32) -> Self {
        Self { id, quantity }
    }
}

/// A chargeable item awaiting an exemption decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub category: ExemptionCategory,
    pub concept: ConceptId,
    pub patient: PatientSnapshot,
    pub order: OrderRef,
    /// Extra variables exposed to rule scripts
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ChargeRequest {
    pub fn new(
        category: ExemptionCategory,
        concept: ConceptId,
        patient: PatientSnapshot,
        order: OrderRef,
    ) -> Self {
        Self {
            category,
            concept,
            patient,
            order,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Variables handed to rule scripts
    ///
    /// Extra attributes never override the standard names. An unknown age is
    /// bound as `null`, and a rule comparing `age` then fails with a script
    /// error rather than evaluating to false.
    pub fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::from(self.attributes.clone());
        bindings.insert("age", json!(self.patient.age));
        bindings.insert("concept_id", self.concept.value());
        bindings.insert("category", self.category.to_string());
        bindings.insert("programs", json!(self.patient.active_programs));
        bindings.insert("quantity", self.order.quantity);
        bindings.insert("patient_id", self.patient.id.to_string());
        bindings.insert("order_id", self.order.id.to_string());
        bindings
    }
}

/// Which mechanism granted an exemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mechanism", rename_all = "snake_case")]
pub enum ExemptionGrant {
    GlobalScope,
    ProgramScope { program: String },
    AgeScope { scope: String },
    Rule { exemption_id: ExemptionId, name: String },
}

impl fmt::Display for ExemptionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExemptionGrant::GlobalScope => write!(f, "scope {}", GLOBAL_SCOPE),
            ExemptionGrant::ProgramScope { program } => write!(f, "scope {}", program_scope(program)),
            ExemptionGrant::AgeScope { scope } => write!(f, "scope {}", scope),
            ExemptionGrant::Rule { name, .. } => write!(f, "rule {}", name),
        }
    }
}

/// Outcome of resolving a charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionDecision {
    pub exempt: bool,
    pub granted_by: Option<ExemptionGrant>,
}

impl ExemptionDecision {
    pub fn granted(grant: ExemptionGrant) -> Self {
        Self {
            exempt: true,
            granted_by: Some(grant),
        }
    }

    pub fn not_exempt() -> Self {
        Self {
            exempt: false,
            granted_by: None,
        }
    }
}

/// A mechanism able to grant exemptions
pub trait ExemptionSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the grant if this source exempts the charge
    fn grant(&self, request: &ChargeRequest) -> Result<Option<ExemptionGrant>, ExemptionError>;

    fn is_exempt(&self, request: &ChargeRequest) -> Result<bool, ExemptionError> {
        Ok(self.grant(request)?.is_some())
    }
}

/// Three-tier walk over the static scope table
#[derive(Debug, Clone)]
pub struct StaticScopeSource {
    table: ExemptionTableHandle,
}

impl StaticScopeSource {
    pub fn new(table: ExemptionTableHandle) -> Self {
        Self { table }
    }
}

impl ExemptionSource for StaticScopeSource {
    fn name(&self) -> &'static str {
        "static_scope"
    }

    fn grant(&self, request: &ChargeRequest) -> Result<Option<ExemptionGrant>, ExemptionError> {
        // One snapshot for the whole walk, so a concurrent reload cannot mix tables.
        let table = self.table.snapshot();
        let (category, concept) = (request.category, request.concept);

        if table.is_listed(category, GLOBAL_SCOPE, concept) {
            return Ok(Some(ExemptionGrant::GlobalScope));
        }

        for program in &request.patient.active_programs {
            if table.is_listed(category, &program_scope(program), concept) {
                return Ok(Some(ExemptionGrant::ProgramScope {
                    program: program.clone(),
                }));
            }
        }

        for (scope, concepts) in table.age_scopes(category) {
            if concepts.contains(&concept) && matches_age_condition(request.patient.age, scope) {
                return Ok(Some(ExemptionGrant::AgeScope {
                    scope: scope.to_string(),
                }));
            }
        }

        Ok(None)
    }
}

/// Script-authored exemptions evaluated by the rule engine
pub struct RuleBasedSource {
    engine: Arc<ExemptionRuleEngine>,
    records: Arc<dyn ExemptionRecordSource>,
}

impl RuleBasedSource {
    pub fn new(engine: Arc<ExemptionRuleEngine>, records: Arc<dyn ExemptionRecordSource>) -> Self {
        Self { engine, records }
    }
}

impl ExemptionSource for RuleBasedSource {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn grant(&self, request: &ChargeRequest) -> Result<Option<ExemptionGrant>, ExemptionError> {
        let exemptions = self.records.exemptions_for(request.category, request.concept)?;
        if exemptions.is_empty() {
            return Ok(None);
        }

        let bindings = request.bindings();
        for exemption in exemptions
            .iter()
            .filter(|e| e.covers(request.category, request.concept))
        {
            if self.engine.is_exemption_applicable(exemption, &bindings)? {
                return Ok(Some(ExemptionGrant::Rule {
                    exemption_id: exemption.id,
                    name: exemption.name.clone(),
                }));
            }
        }

        Ok(None)
    }
}

/// Asks each source in registration order until one grants the exemption
#[derive(Clone, Default)]
pub struct ExemptionResolver {
    sources: Vec<Arc<dyn ExemptionSource>>,
}

impl ExemptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over the static table followed by the rule-based records
    pub fn standard(
        table: ExemptionTableHandle,
        engine: Arc<ExemptionRuleEngine>,
        records: Arc<dyn ExemptionRecordSource>,
    ) -> Self {
        Self::new()
            .with_source(StaticScopeSource::new(table))
            .with_source(RuleBasedSource::new(engine, records))
    }

    pub fn with_source(mut self, source: impl ExemptionSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Decides whether the charge is exempt
    ///
    /// # Errors
    ///
    /// The first error raised by a source is returned; later sources are not
    /// consulted.
    pub fn resolve(&self, request: &ChargeRequest) -> Result<ExemptionDecision, ExemptionError> {
        for source in &self.sources {
            if let Some(grant) = source.grant(request)? {
                info!(
                    concept_id = %request.concept,
                    category = %request.category,
                    patient_id = %request.patient.id,
                    source = source.name(),
                    grant = %grant,
                    "Charge exempted"
                );
                return Ok(ExemptionDecision::granted(grant));
            }
        }

        debug!(concept_id = %request.concept, category = %request.category, "Charge not exempt");
        Ok(ExemptionDecision::not_exempt())
    }

    pub fn is_exempt(&self, request: &ChargeRequest) -> Result<bool, ExemptionError> {
        Ok(self.resolve(request)?.exempt)
    }
}

impl fmt::Debug for ExemptionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExemptionResolver")
            .field("sources", &self.source_names())
            .finish()
    }
}
