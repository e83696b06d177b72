//! Temporal helpers
//!
//! Age calculations used by exemption scopes. Ages are whole years, computed
//! the way a clinic registers them: a birthday counts on the day it occurs.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Birth date {birth_date} is after reference date {on}")]
    BirthDateInFuture { birth_date: NaiveDate, on: NaiveDate },
}

/// Returns the age in completed years on the given date
///
/// # Errors
///
/// Returns `TemporalError::BirthDateInFuture` when `birth_date` is after `on`.
pub fn age_in_years(birth_date: NaiveDate, on: NaiveDate) -> Result<i64, TemporalError> {
    if birth_date > on {
        return Err(TemporalError::BirthDateInFuture { birth_date, on });
    }

    let mut years = i64::from(on.year() - birth_date.year());
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    Ok(years)
}

/// A patient's date of birth, possibly estimated by the registering clerk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthDate {
    pub date: NaiveDate,
    pub estimated: bool,
}

impl BirthDate {
    pub fn exact(date: NaiveDate) -> Self {
        Self {
            date,
            estimated: false,
        }
    }

    pub fn estimated(date: NaiveDate) -> Self {
        Self {
            date,
            estimated: true,
        }
    }

    /// Age in completed years as of today (UTC)
    pub fn current_age(&self) -> Result<i64, TemporalError> {
        self.age_on(Utc::now().date_naive())
    }

    pub fn age_on(&self, on: NaiveDate) -> Result<i64, TemporalError> {
        age_in_years(self.date, on)
    }
}
