//! Filter Engine for the report screens.
//!
//! Filtering is synchronous and borrows the source collection; records are
//! never cloned or mutated. A missing field is matched as the empty string.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::{School, Student};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter field: {0}")]
    UnknownField(String),
    #[error("filter value for {0} must be a string")]
    NotAString(String),
    #[error("filters must be an object")]
    NotAnObject,
    #[error("filter field {0} given more than once")]
    DuplicateField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    Name,
    Address,
    Email,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [FilterField::Name, FilterField::Address, FilterField::Email];

    pub fn key(self) -> &'static str {
        match self {
            FilterField::Name => "name",
            FilterField::Address => "address",
            FilterField::Email => "email",
        }
    }

    /// Accepts the IPC keys and the console's Spanish form names.
    pub fn parse(raw: &str) -> Option<FilterField> {
        match raw.trim() {
            "name" | "nombre" => Some(FilterField::Name),
            "address" | "direccion" => Some(FilterField::Address),
            "email" => Some(FilterField::Email),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPolicy {
    /// Field equals the constraint; used with dropdowns of observed values.
    Exact,
    /// Case-insensitive containment; used with free-text inputs.
    Substring,
}

impl MatchPolicy {
    pub fn matches(self, value: &str, constraint: &str) -> bool {
        match self {
            MatchPolicy::Exact => value == constraint,
            MatchPolicy::Substring => value.to_lowercase().contains(&constraint.to_lowercase()),
        }
    }
}

pub trait Filterable {
    /// Stable identifier used as the row key.
    fn row_key(&self) -> &str;
    fn field(&self, field: FilterField) -> Option<&str>;
}

impl Filterable for School {
    fn row_key(&self) -> &str {
        &self.id
    }

    fn field(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Name => self.name.as_deref(),
            FilterField::Address => self.address.as_deref(),
            FilterField::Email => self.email.as_deref(),
        }
    }
}

impl Filterable for Student {
    fn row_key(&self) -> &str {
        &self.id
    }

    fn field(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Name => self.full_name.as_deref(),
            FilterField::Address => self.address.as_deref(),
            FilterField::Email => self.email.as_deref(),
        }
    }
}

/// Field -> constraint. Empty constraints are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    constraints: BTreeMap<FilterField, String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Setting an empty value (the dropdown's "all" option) clears the field.
    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.constraints.remove(&field);
        } else {
            self.constraints.insert(field, value);
        }
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.constraints.get(&field).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Active constraints in field order.
    pub fn active(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.constraints.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Conjunction of two criteria; on a shared field `other` wins.
    #[cfg(test)]
    pub fn and(&self, other: &FilterCriteria) -> FilterCriteria {
        let mut merged = self.clone();
        for (f, v) in other.active() {
            merged.set(f, v);
        }
        merged
    }

    #[cfg(test)]
    pub fn from_json(raw: Option<&Value>) -> Result<Self, FilterError> {
        let mut criteria = FilterCriteria::new();
        if let Some(raw) = raw {
            criteria.patch(raw)?;
        }
        Ok(criteria)
    }

    /// Applies the fields present in `raw`; fields not named are kept, and a
    /// null or empty value clears its field. Nothing changes on error.
    pub fn patch(&mut self, raw: &Value) -> Result<(), FilterError> {
        if raw.is_null() {
            return Ok(());
        }
        let obj = raw.as_object().ok_or(FilterError::NotAnObject)?;
        let mut next = self.clone();
        let mut seen = BTreeSet::new();
        for (k, v) in obj {
            let field = FilterField::parse(k).ok_or_else(|| FilterError::UnknownField(k.clone()))?;
            // `name` and `nombre` are the same field.
            if !seen.insert(field) {
                return Err(FilterError::DuplicateField(field.key()));
            }
            match v {
                Value::Null => next.set(field, ""),
                Value::String(s) => next.set(field, s.as_str()),
                _ => return Err(FilterError::NotAString(k.clone())),
            }
        }
        *self = next;
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for f in FilterField::ALL {
            obj.insert(
                f.key().to_string(),
                Value::String(self.get(f).unwrap_or_default().to_string()),
            );
        }
        Value::Object(obj)
    }
}

pub fn matches<R: Filterable + ?Sized>(
    record: &R,
    criteria: &FilterCriteria,
    policy: MatchPolicy,
) -> bool {
    criteria
        .active()
        .all(|(field, constraint)| policy.matches(record.field(field).unwrap_or(""), constraint))
}

/// Keeps the records matching every active constraint, in source order.
pub fn apply<'a, R, I>(records: I, criteria: &FilterCriteria, policy: MatchPolicy) -> Vec<&'a R>
where
    R: Filterable + 'a,
    I: IntoIterator<Item = &'a R>,
{
    records
        .into_iter()
        .filter(|r| matches(*r, criteria, policy))
        .collect()
}

/// Sorted distinct values per field, for exact-match dropdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistinctValues {
    pub name: Vec<String>,
    pub address: Vec<String>,
    pub email: Vec<String>,
}

impl DistinctValues {
    pub fn get(&self, field: FilterField) -> &[String] {
        match field {
            FilterField::Name => &self.name,
            FilterField::Address => &self.address,
            FilterField::Email => &self.email,
        }
    }
}

pub fn distinct_values<R: Filterable>(records: &[R]) -> DistinctValues {
    let collect = |field: FilterField| -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.field(field))
            .filter(|v| !v.trim().is_empty())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    DistinctValues {
        name: collect(FilterField::Name),
        address: collect(FilterField::Address),
        email: collect(FilterField::Email),
    }
}
