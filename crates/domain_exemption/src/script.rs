//! Script evaluation contract
//!
//! Exemption rules are authored as small boolean scripts. Each script carries
//! a kind tag; an evaluator declares the one kind it understands and the rule
//! engine dispatches on that tag. Adding a new scripting backend means adding
//! a new [`ScriptEvaluator`] implementation and registering it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExemptionError;

/// Name of the nested object that mirrors every binding
pub const VARS_OBJECT: &str = "vars";

/// Tag naming the language a rule script is written in
///
/// Tags are case-insensitive and stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScriptKind(String);

impl ScriptKind {
    /// Tag for the sandboxed expression language
    pub const EXPRESSION: &'static str = "EXPRESSION";

    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_ascii_uppercase())
    }

    pub fn expression() -> Self {
        Self::new(Self::EXPRESSION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ScriptKind {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl From<&str> for ScriptKind {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<ScriptKind> for String {
    fn from(kind: ScriptKind) -> String {
        kind.0
    }
}

/// Variables made available to a rule script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings(Map<String, Value>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, replacing any previous value under the same name
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds the evaluation context handed to a script
    ///
    /// Every binding appears as a top-level variable and again under the
    /// `vars` object, so `age < 18` and `vars.age < 18` are equivalent. A
    /// binding literally named `vars` is shadowed by the mirror object.
    pub fn to_context(&self) -> Value {
        let mut context = self.0.clone();
        context.insert(VARS_OBJECT.to_string(), Value::Object(self.0.clone()));
        Value::Object(context)
    }
}

impl From<Map<String, Value>> for Bindings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A backend able to evaluate boolean rule scripts of one kind
pub trait ScriptEvaluator: Send + Sync {
    /// The script kind this evaluator handles
    fn kind(&self) -> ScriptKind;

    /// Evaluates a script against the bindings
    ///
    /// # Errors
    ///
    /// Parse and runtime failures must be reported, never mapped to `false`.
    fn evaluate(&self, script: &str, bindings: &Bindings) -> Result<bool, ExemptionError>;
}

/// Parses a script's string result as a boolean
///
/// Only `"true"` (ignoring case and surrounding whitespace) is true.
pub fn parse_bool_text(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}
