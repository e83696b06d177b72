//! Age condition matching for age-bracket exemption scopes
//!
//! Scope keys such as `age<5`, `age>=60` or `age:0-10` describe the patients a
//! scope applies to. Matching never fails: anything that cannot be parsed
//! simply does not match.
//!
//! Supported forms (prefix `age` is case-sensitive, whitespace is tolerated
//! around operators and numbers):
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `age<N` / `age>N` | strict comparison |
//! | `age<=N` / `age>=N` | inclusive comparison |
//! | `age==N` / `age=N` | equality |
//! | `age:MIN-MAX` | inclusive range |

use std::fmt;

const AGE_PREFIX: &str = "age";

/// A parsed age condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeCondition {
    LessThan(i64),
    GreaterThan(i64),
    AtMost(i64),
    AtLeast(i64),
    Equal(i64),
    /// Inclusive on both ends
    Between { min: i64, max: i64 },
}

impl AgeCondition {
    /// Parses a scope key into a condition
    ///
    /// The range form is tried first whenever the key contains both `:` and
    /// `-`; a range that does not split into exactly two numbers falls through
    /// to the comparison forms, which are tried in the order
    /// `<=`, `>=`, `<`, `>`, `==`, `=`.
    pub fn parse(expression: &str) -> Option<Self> {
        let rest = expression.trim().strip_prefix(AGE_PREFIX)?;

        if rest.contains(':') && rest.contains('-') {
            if let Some(range) = parse_range(rest) {
                return Some(range);
            }
        }

        parse_comparison(rest.trim_start())
    }

    /// Checks whether an age satisfies this condition
    pub fn matches(&self, age: i64) -> bool {
        match *self {
            AgeCondition::LessThan(n) => age < n,
            AgeCondition::GreaterThan(n) => age > n,
            AgeCondition::AtMost(n) => age <= n,
            AgeCondition::AtLeast(n) => age >= n,
            AgeCondition::Equal(n) => age == n,
            AgeCondition::Between { min, max } => age >= min && age <= max,
        }
    }
}

impl fmt::Display for AgeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeCondition::LessThan(n) => write!(f, "age<{}", n),
            AgeCondition::GreaterThan(n) => write!(f, "age>{}", n),
            AgeCondition::AtMost(n) => write!(f, "age<={}", n),
            AgeCondition::AtLeast(n) => write!(f, "age>={}", n),
            AgeCondition::Equal(n) => write!(f, "age=={}", n),
            AgeCondition::Between { min, max } => write!(f, "age:{}-{}", min, max),
        }
    }
}

/// Evaluates an age scope key against a patient's age
///
/// Returns false when the age is unknown, the expression is empty or does not
/// start with `age`, or any number fails to parse.
///
/// # Example
///
/// ```rust
/// use domain_exemption::age_condition::matches_age_condition;
///
/// assert!(matches_age_condition(Some(4), "age:0-10"));
/// assert!(!matches_age_condition(Some(11), "age:0-10"));
/// assert!(!matches_age_condition(None, "age<5"));
/// ```
pub fn matches_age_condition(age: Option<i64>, expression: &str) -> bool {
    let Some(age) = age else {
        return false;
    };

    AgeCondition::parse(expression)
        .map(|condition| condition.matches(age))
        .unwrap_or(false)
}

/// Returns true if the scope key belongs to the age family
pub fn is_age_scope(scope_key: &str) -> bool {
    scope_key.trim_start().starts_with(AGE_PREFIX)
}

fn parse_range(rest: &str) -> Option<AgeCondition> {
    let (_, bounds) = rest.split_once(':')?;
    let parts: Vec<&str> = bounds.split('-').collect();
    if parts.len() != 2 {
        return None;
    }

    let min = parse_number(parts[0])?;
    let max = parse_number(parts[1])?;
    Some(AgeCondition::Between { min, max })
}

fn parse_comparison(rest: &str) -> Option<AgeCondition> {
    // Longer operators first so `<=` is never read as `<`.
    const OPERATORS: [(&str, fn(i64) -> AgeCondition); 6] = [
        ("<=", AgeCondition::AtMost),
        (">=", AgeCondition::AtLeast),
        ("<", AgeCondition::LessThan),
        (">", AgeCondition::GreaterThan),
        ("==", AgeCondition::Equal),
        ("=", AgeCondition::Equal),
    ];

    OPERATORS.iter().find_map(|(operator, build)| {
        rest.strip_prefix(operator)
            .and_then(parse_number)
            .map(build)
    })
}

fn parse_number(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}
