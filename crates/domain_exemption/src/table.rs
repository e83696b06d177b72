//! Static exemption table
//!
//! Maps (category, scope key) to the set of concepts exempt within that
//! scope. The table is built once from a configuration document and is never
//! mutated afterwards; reloading builds a fresh table and swaps it into the
//! shared [`ExemptionTableHandle`] in one step, so resolutions in flight keep
//! reading the snapshot they started with.
//!
//! # Configuration format
//!
//! ```json
//! {
//!   "services":    { "all": [1001], "program:HIV": [2001, 2002], "age<5": [3001] },
//!   "commodities": { "age:0-10": [4001] }
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use core_kernel::ConceptId;

use crate::age_condition::is_age_scope;
use crate::error::ExemptionError;
use crate::ports::ExemptionConfigSource;

/// Scope key listing concepts exempt for every patient
pub const GLOBAL_SCOPE: &str = "all";

/// Prefix of program-membership scope keys (`program:<name>`)
pub const PROGRAM_SCOPE_PREFIX: &str = "program:";

/// Builds the scope key for a program enrollment
pub fn program_scope(program_name: &str) -> String {
    format!("{}{}", PROGRAM_SCOPE_PREFIX, program_name)
}

/// Kind of chargeable item an exemption applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionCategory {
    /// Billable services (consultations, lab tests, procedures)
    Service,
    /// Stock items (drugs, consumables)
    Commodity,
}

impl ExemptionCategory {
    /// Name of the category's section in the configuration document
    pub fn document_key(&self) -> &'static str {
        match self {
            ExemptionCategory::Service => "services",
            ExemptionCategory::Commodity => "commodities",
        }
    }
}

impl fmt::Display for ExemptionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExemptionCategory::Service => write!(f, "SERVICE"),
            ExemptionCategory::Commodity => write!(f, "COMMODITY"),
        }
    }
}

/// Raw configuration document as loaded from file or database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionDocument {
    #[serde(default)]
    pub services: BTreeMap<String, Vec<ConceptId>>,
    #[serde(default)]
    pub commodities: BTreeMap<String, Vec<ConceptId>>,
}

impl ExemptionDocument {
    /// Parses a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ExemptionError> {
        serde_json::from_str(json).map_err(|e| ExemptionError::Parse(e.to_string()))
    }

    fn section(&self, category: ExemptionCategory) -> &BTreeMap<String, Vec<ConceptId>> {
        match category {
            ExemptionCategory::Service => &self.services,
            ExemptionCategory::Commodity => &self.commodities,
        }
    }
}

/// Immutable exemption lookup table
#[derive(Debug, Clone, Default)]
pub struct StaticExemptionTable {
    scopes: HashMap<ExemptionCategory, BTreeMap<String, HashSet<ConceptId>>>,
}

impl StaticExemptionTable {
    /// Creates a table with no exemptions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from a configuration document
    ///
    /// # Errors
    ///
    /// Returns `ExemptionError::Configuration` if a scope key is blank.
    pub fn from_document(document: &ExemptionDocument) -> Result<Self, ExemptionError> {
        let mut scopes = HashMap::new();

        for category in [ExemptionCategory::Service, ExemptionCategory::Commodity] {
            let mut by_scope: BTreeMap<String, HashSet<ConceptId>> = BTreeMap::new();
            for (key, concepts) in document.section(category) {
                let key = key.trim();
                if key.is_empty() {
                    return Err(ExemptionError::Configuration(format!(
                        "blank scope key in '{}' section",
                        category.document_key()
                    )));
                }
                by_scope
                    .entry(key.to_string())
                    .or_default()
                    .extend(concepts.iter().copied());
            }
            scopes.insert(category, by_scope);
        }

        Ok(Self { scopes })
    }

    /// Parses and builds a table from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ExemptionError> {
        Self::from_document(&ExemptionDocument::from_json_str(json)?)
    }

    /// Reads and builds a table from a JSON file
    pub fn from_path(path: &Path) -> Result<Self, ExemptionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Concepts listed under a scope, if the scope exists
    pub fn concepts(&self, category: ExemptionCategory, scope: &str) -> Option<&HashSet<ConceptId>> {
        self.scopes.get(&category)?.get(scope)
    }

    /// Returns true if the concept is listed under the scope
    pub fn is_listed(&self, category: ExemptionCategory, scope: &str, concept: ConceptId) -> bool {
        self.concepts(category, scope)
            .map(|set| set.contains(&concept))
            .unwrap_or(false)
    }

    /// Iterates over all scopes of a category in key order
    pub fn scopes(
        &self,
        category: ExemptionCategory,
    ) -> impl Iterator<Item = (&str, &HashSet<ConceptId>)> {
        self.scopes
            .get(&category)
            .into_iter()
            .flat_map(|by_scope| by_scope.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Iterates over the age-bracket scopes of a category
    pub fn age_scopes(
        &self,
        category: ExemptionCategory,
    ) -> impl Iterator<Item = (&str, &HashSet<ConceptId>)> {
        self.scopes(category).filter(|(key, _)| is_age_scope(key))
    }

    /// Number of scopes across all categories
    pub fn scope_count(&self) -> usize {
        self.scopes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scope_count() == 0
    }
}

/// Shared, atomically replaceable reference to the current table
///
/// Cloning the handle shares the same underlying slot.
#[derive(Debug, Clone, Default)]
pub struct ExemptionTableHandle {
    current: Arc<RwLock<Arc<StaticExemptionTable>>>,
}

impl ExemptionTableHandle {
    pub fn new(table: StaticExemptionTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Returns the table as it is right now
    ///
    /// The snapshot stays valid even if the table is reloaded afterwards.
    pub fn snapshot(&self) -> Arc<StaticExemptionTable> {
        Arc::clone(&self.current.read())
    }

    /// Publishes a new table, returning the one it replaced
    pub fn replace(&self, table: StaticExemptionTable) -> Arc<StaticExemptionTable> {
        let next = Arc::new(table);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        debug!(scopes = self.snapshot().scope_count(), "Exemption table replaced");
        previous
    }

    /// Loads a fresh document from the source and publishes it
    ///
    /// The current table is left in place if loading or validation fails.
    pub fn reload_from(&self, source: &dyn ExemptionConfigSource) -> Result<(), ExemptionError> {
        let document = source.load_document()?;
        let table = StaticExemptionTable::from_document(&document)?;
        let scopes = table.scope_count();
        self.replace(table);
        info!(scopes, "Exemption table reloaded");
        Ok(())
    }
}
