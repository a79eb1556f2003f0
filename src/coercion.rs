//! Decides which raw text columns become categorical, and reconciles appends.
//!
//! A [`CoercionPolicy`] is an explicit value handed to ingestion. Nothing in
//! this crate consults process-wide state. Column kinds are inferred in the
//! order Numeric → Boolean → Categorical/Text. The Categorical/Text split is
//! governed by [`CoercionPolicy::auto_categorize`] and optional cardinality
//! bounds. Per-column overrides come first.
//!
//! # Example
//!
//! ```
//! use u_factor::coercion::CoercionPolicy;
//! use u_factor::dataframe::DataType;
//!
//! let raw = [Some("Large"), Some("Small"), None, Some("Large")];
//!
//! let plain = CoercionPolicy::default();
//! assert_eq!(plain.decide("size", &raw), DataType::Text);
//!
//! let policy = CoercionPolicy::default()
//!     .auto_categorize(true)
//!     .level_order("size", ["Small", "Large"]);
//! let column = policy.coerce("size", &raw).unwrap();
//! let size = column.as_categorical().unwrap();
//! assert_eq!(size.levels().as_slice(), ["Small", "Large"]);
//! assert_eq!(size.missing_count(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dataframe::{Column, DataType};
use crate::error::{FactorError, Result};
use crate::factor::{CategoricalColumn, MissingPolicy};
use crate::levels::LevelSet;
use crate::validity::ValidityBitmap;

/// Unique-value ratio below which [`CoercionPolicy::low_cardinality`]
/// treats text as categorical.
pub const LOW_CARDINALITY_RATIO: f64 = 0.5;

/// Largest level count [`CoercionPolicy::low_cardinality`] accepts.
pub const LOW_CARDINALITY_MAX_LEVELS: usize = 1000;

/// Ingestion policy for turning raw text columns into typed columns.
///
/// Loadable from JSON; every field is optional:
///
/// ```
/// use u_factor::coercion::CoercionPolicy;
///
/// let policy = CoercionPolicy::from_json(r#"{
///     "auto_categorize": true,
///     "text_columns": ["comment"],
///     "level_orders": { "size": ["Small", "Medium", "Large"] }
/// }"#).unwrap();
/// assert!(policy.auto_categorize);
/// assert!(policy.text_columns.contains("comment"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoercionPolicy {
    /// Turn non-numeric, non-boolean text columns into categorical columns.
    pub auto_categorize: bool,
    /// Only categorize when distinct/present is strictly below this ratio.
    pub max_unique_ratio: Option<f64>,
    /// Only categorize when the distinct count is at most this.
    pub max_levels: Option<usize>,
    /// Columns that are always categorical with inferred, sorted levels.
    pub categorical_columns: BTreeSet<String>,
    /// Columns that always stay text.
    pub text_columns: BTreeSet<String>,
    /// Columns that are always categorical with this closed level order.
    pub level_orders: BTreeMap<String, Vec<String>>,
    /// What to do with labels outside a closed level order.
    pub missing_policy: MissingPolicy,
}

impl CoercionPolicy {
    /// Policy that keeps text as text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that categorizes every text column.
    pub fn categorize() -> Self {
        Self::new().auto_categorize(true)
    }

    /// Policy that categorizes only low-cardinality text columns.
    pub fn low_cardinality() -> Self {
        Self {
            auto_categorize: true,
            max_unique_ratio: Some(LOW_CARDINALITY_RATIO),
            max_levels: Some(LOW_CARDINALITY_MAX_LEVELS),
            ..Self::default()
        }
    }

    /// Parses a policy from JSON and validates it.
    pub fn from_json(input: &str) -> Result<Self> {
        let policy: Self =
            serde_json::from_str(input).map_err(|e| FactorError::InvalidPolicy(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Sets whether text columns become categorical.
    pub fn auto_categorize(mut self, on: bool) -> Self {
        self.auto_categorize = on;
        self
    }

    /// Forces `name` to be categorical with inferred levels.
    pub fn categorical_column(mut self, name: impl Into<String>) -> Self {
        self.categorical_columns.insert(name.into());
        self
    }

    /// Forces `name` to stay text.
    pub fn text_column(mut self, name: impl Into<String>) -> Self {
        self.text_columns.insert(name.into());
        self
    }

    /// Fixes the level order of `name`.
    pub fn level_order<I, S>(mut self, name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.level_orders
            .insert(name.into(), levels.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the policy for labels outside a fixed level order.
    pub fn missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    /// Checks that overrides agree with each other.
    pub fn validate(&self) -> Result<()> {
        if let Some(ratio) = self.max_unique_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(FactorError::InvalidPolicy(format!(
                    "max_unique_ratio must be in (0, 1], got {ratio}"
                )));
            }
        }
        for name in &self.text_columns {
            if self.categorical_columns.contains(name) || self.level_orders.contains_key(name) {
                return Err(FactorError::InvalidPolicy(format!(
                    "column '{name}' is both text and categorical"
                )));
            }
        }
        for (name, levels) in &self.level_orders {
            LevelSet::new(levels.iter().map(String::as_str)).map_err(|e| {
                FactorError::InvalidPolicy(format!("level order for '{name}': {e}"))
            })?;
        }
        Ok(())
    }

    /// Columns the policy names explicitly.
    pub fn named_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.categorical_columns
            .iter()
            .chain(&self.text_columns)
            .chain(self.level_orders.keys())
            .map(String::as_str)
    }

    /// Chooses the column type for raw values of column `name`.
    pub fn decide<S: AsRef<str>>(&self, name: &str, values: &[Option<S>]) -> DataType {
        if self.level_orders.contains_key(name) || self.categorical_columns.contains(name) {
            return DataType::Categorical;
        }
        if self.text_columns.contains(name) {
            return DataType::Text;
        }

        let present: Vec<&str> = values.iter().flatten().map(|s| s.as_ref().trim()).collect();
        if present.is_empty() {
            return DataType::Numeric;
        }
        if present.iter().all(|s| s.parse::<f64>().is_ok()) {
            return DataType::Numeric;
        }
        if present.iter().all(|s| is_boolean_str(s)) {
            return DataType::Boolean;
        }
        if self.auto_categorize && self.within_cardinality(&present) {
            DataType::Categorical
        } else {
            DataType::Text
        }
    }

    fn within_cardinality(&self, present: &[&str]) -> bool {
        if self.max_unique_ratio.is_none() && self.max_levels.is_none() {
            return true;
        }
        let distinct: HashSet<&str> = present.iter().copied().collect();
        let ratio = distinct.len() as f64 / present.len() as f64;
        let ratio_ok = self.max_unique_ratio.is_none_or(|max| ratio < max);
        let levels_ok = self.max_levels.is_none_or(|max| distinct.len() <= max);
        ratio_ok && levels_ok
    }

    /// Builds a typed column from raw values of column `name`.
    ///
    /// `None` entries are missing. A column with a fixed level order fails
    /// with [`FactorError::LevelMismatch`] on a label outside it unless the
    /// missing policy says otherwise.
    pub fn coerce<S: AsRef<str>>(&self, name: &str, values: &[Option<S>]) -> Result<Column> {
        let kind = self.decide(name, values);
        trace!(column = name, %kind, rows = values.len(), "coercing raw column");
        let trimmed: Vec<Option<&str>> = values
            .iter()
            .map(|v| v.as_ref().map(|s| s.as_ref().trim()))
            .collect();

        let column = match kind {
            DataType::Numeric => {
                let (values, validity) = parse_numeric(name, &trimmed)?;
                Column::numeric(values, validity)
            }
            DataType::Boolean => {
                let (values, validity) = parse_boolean(name, &trimmed)?;
                Column::boolean(values, validity)
            }
            DataType::Text => {
                let (values, validity) = collect_text(&trimmed);
                Column::text(values, validity)
            }
            DataType::Categorical => {
                let levels = match self.level_orders.get(name) {
                    Some(order) => Some(LevelSet::new(order.iter().map(String::as_str))?),
                    None => None,
                };
                Column::Categorical(CategoricalColumn::create(
                    &trimmed,
                    levels,
                    self.missing_policy,
                )?)
            }
        };
        Ok(column)
    }
}

/// Appends raw values to an existing column, keeping its type.
///
/// Categorical columns extend their level set: existing levels keep their
/// order and unseen labels are appended in order of first appearance.
/// Numeric and boolean columns fail with [`FactorError::ColumnTypeMismatch`]
/// on a value that does not parse.
pub fn reconcile_column<S: AsRef<str>>(
    name: &str,
    existing: &Column,
    values: &[Option<S>],
) -> Result<Column> {
    let trimmed: Vec<Option<&str>> = values
        .iter()
        .map(|v| v.as_ref().map(|s| s.as_ref().trim()))
        .collect();
    debug!(column = name, rows = trimmed.len(), kind = %existing.data_type(), "appending rows to column");

    let appended = match existing {
        Column::Categorical(col) => Column::Categorical(col.append_labels(&trimmed)),
        Column::Numeric { values, validity } => {
            let (more, more_validity) = parse_numeric(name, &trimmed)?;
            Column::numeric(
                values.iter().copied().chain(more).collect(),
                joined(validity, &more_validity),
            )
        }
        Column::Boolean { values, validity } => {
            let (more, more_validity) = parse_boolean(name, &trimmed)?;
            Column::boolean(
                values.iter().copied().chain(more).collect(),
                joined(validity, &more_validity),
            )
        }
        Column::Text { values, validity } => {
            let (more, more_validity) = collect_text(&trimmed);
            Column::text(
                values.iter().cloned().chain(more).collect(),
                joined(validity, &more_validity),
            )
        }
    };
    Ok(appended)
}

fn joined(left: &ValidityBitmap, right: &ValidityBitmap) -> ValidityBitmap {
    let mut validity = left.clone();
    validity.extend_from(right);
    validity
}

// ── Helper functions ──────────────────────────────────────────────────

fn parse_numeric(name: &str, values: &[Option<&str>]) -> Result<(Vec<f64>, ValidityBitmap)> {
    let mut nums = Vec::with_capacity(values.len());
    let mut validity = ValidityBitmap::empty();
    for value in values {
        match value {
            Some(v) => {
                let parsed = v.parse::<f64>().map_err(|_| FactorError::ColumnTypeMismatch {
                    column: name.to_string(),
                    expected: DataType::Numeric,
                    value: v.to_string(),
                })?;
                nums.push(parsed);
                validity.push(true);
            }
            None => {
                nums.push(0.0);
                validity.push(false);
            }
        }
    }
    Ok((nums, validity))
}

fn parse_boolean(name: &str, values: &[Option<&str>]) -> Result<(Vec<bool>, ValidityBitmap)> {
    let mut bools = Vec::with_capacity(values.len());
    let mut validity = ValidityBitmap::empty();
    for value in values {
        match value {
            Some(v) => {
                let parsed = parse_boolean_str(v).ok_or_else(|| FactorError::ColumnTypeMismatch {
                    column: name.to_string(),
                    expected: DataType::Boolean,
                    value: v.to_string(),
                })?;
                bools.push(parsed);
                validity.push(true);
            }
            None => {
                bools.push(false);
                validity.push(false);
            }
        }
    }
    Ok((bools, validity))
}

fn collect_text(values: &[Option<&str>]) -> (Vec<String>, ValidityBitmap) {
    let texts = values
        .iter()
        .map(|v| v.map(str::to_string).unwrap_or_default())
        .collect();
    let validity = values.iter().map(Option::is_some).collect();
    (texts, validity)
}

/// Checks if a string represents a boolean value.
pub(crate) fn is_boolean_str(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "t" | "f" | "y" | "n"
    )
}

/// Parses a boolean string, or `None` if it is not one.
pub(crate) fn parse_boolean_str(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "t" | "y" => Some(true),
        "false" | "no" | "f" | "n" => Some(false),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
