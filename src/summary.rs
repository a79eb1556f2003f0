//! Column-level summaries for reporting.
//!
//! A categorical summary reports every level in level order, unused ones
//! included, so the same column always summarizes the same way. Missing
//! values are counted and never reported as a level.
//!
//! # Example
//!
//! ```
//! use u_factor::csv_parser::CsvParser;
//! use u_factor::summary::summarize_dataframe;
//!
//! let csv = "grade,score\nB,1.0\nA,2.0\nNA,3.0\nB,NA\n";
//! let df = CsvParser::new()
//!     .level_order("grade", ["A", "B", "C"])
//!     .parse_str(csv)
//!     .unwrap();
//! let summaries = summarize_dataframe(&df);
//!
//! let grade = summaries[0].categorical.as_ref().unwrap();
//! assert_eq!(grade.unused_levels, ["C"]);
//! assert_eq!(grade.missing, 1);
//! assert_eq!(grade.mode.as_ref().map(|(l, _)| l.as_str()), Some("B"));
//!
//! let json = serde_json::to_string(&grade.tally).unwrap();
//! assert_eq!(json, r#"{"A":1,"B":2,"C":0}"#);
//! ```

use std::collections::HashSet;

use serde::Serialize;

use crate::dataframe::{Column, DataFrame, DataType};
use crate::factor::CategoricalColumn;
use crate::tally::{count_1d, Tally};
use crate::validity::ValidityBitmap;

// ── Categorical Summary ───────────────────────────────────────────────

/// Level-ordered report for a categorical column.
#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    /// Counts per level, in level order, zeros included.
    pub tally: Tally,
    /// Number of levels in the level set.
    pub n_levels: usize,
    /// Levels with no observations, in level order.
    pub unused_levels: Vec<String>,
    /// Number of missing observations.
    pub missing: usize,
    /// Most frequent level; ties go to the earlier level.
    pub mode: Option<(String, usize)>,
    /// Whether the level order is also a magnitude order.
    pub is_ordered: bool,
    /// Lowest observed level of an ordered column.
    pub min_level: Option<String>,
    /// Highest observed level of an ordered column.
    pub max_level: Option<String>,
}

// ── Numeric Summary ───────────────────────────────────────────────────

/// Descriptive statistics over the valid values of a numeric column.
///
/// Statistics are `NaN` when there are no valid values.
#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub valid_count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub distinct_count: usize,
}

// ── Boolean Summary ───────────────────────────────────────────────────

/// Counts for a boolean column.
#[derive(Debug, Clone, Serialize)]
pub struct BooleanSummary {
    pub valid_count: usize,
    pub true_count: usize,
    pub false_count: usize,
}

// ── Text Summary ──────────────────────────────────────────────────────

/// Statistics for a free-form text column.
#[derive(Debug, Clone, Serialize)]
pub struct TextSummary {
    pub valid_count: usize,
    pub distinct_count: usize,
    pub min_length: usize,
    pub max_length: usize,
}

// ── Column Summary ────────────────────────────────────────────────────

/// Summary for a single column. Exactly one of the per-type fields is set.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: DataType,
    /// Total number of rows.
    pub row_count: usize,
    /// Number of missing values.
    pub null_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean: Option<BooleanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextSummary>,
}

// ── Summary functions ─────────────────────────────────────────────────

/// Summarizes every column of `df`, in column order.
pub fn summarize_dataframe(df: &DataFrame) -> Vec<ColumnSummary> {
    df.iter()
        .map(|(name, col)| summarize_column(name, col))
        .collect()
}

/// Summarizes a single column.
pub fn summarize_column(name: &str, col: &Column) -> ColumnSummary {
    let mut summary = ColumnSummary {
        name: name.to_string(),
        data_type: col.data_type(),
        row_count: col.len(),
        null_count: col.null_count(),
        numeric: None,
        boolean: None,
        categorical: None,
        text: None,
    };
    match col {
        Column::Numeric { values, validity } => {
            summary.numeric = Some(summarize_numeric(values, validity));
        }
        Column::Boolean { values, validity } => {
            summary.boolean = Some(summarize_boolean(values, validity));
        }
        Column::Categorical(factor) => {
            summary.categorical = Some(summarize_categorical(factor));
        }
        Column::Text { values, validity } => {
            summary.text = Some(summarize_text(values, validity));
        }
    }
    summary
}

/// Level-ordered summary of a categorical column.
pub fn summarize_categorical(column: &CategoricalColumn) -> CategoricalSummary {
    let tally = count_1d(column);
    let unused_levels = tally
        .iter()
        .filter(|&(_, count)| count == 0)
        .map(|(label, _)| label.to_string())
        .collect();
    let mode = tally.mode().map(|(label, count)| (label.to_string(), count));

    CategoricalSummary {
        n_levels: column.n_levels(),
        unused_levels,
        missing: tally.missing(),
        mode,
        is_ordered: column.is_ordered(),
        min_level: column.min_level().map(str::to_string),
        max_level: column.max_level().map(str::to_string),
        tally,
    }
}

// ── Internal helpers ──────────────────────────────────────────────────

fn summarize_numeric(values: &[f64], validity: &ValidityBitmap) -> NumericSummary {
    let mut valid: Vec<f64> = validity.valid_indices().map(|i| values[i]).collect();
    let valid_count = valid.len();
    if valid_count == 0 {
        return NumericSummary {
            valid_count: 0,
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            median: f64::NAN,
            distinct_count: 0,
        };
    }

    valid.sort_by(f64::total_cmp);
    let mean = valid.iter().sum::<f64>() / valid_count as f64;
    let mid = valid_count / 2;
    let median = if valid_count % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    };
    let distinct_count = valid
        .iter()
        .map(|v| v.to_bits())
        .collect::<HashSet<u64>>()
        .len();

    NumericSummary {
        valid_count,
        min: valid[0],
        max: valid[valid_count - 1],
        mean,
        median,
        distinct_count,
    }
}

fn summarize_boolean(values: &[bool], validity: &ValidityBitmap) -> BooleanSummary {
    let true_count = validity.valid_indices().filter(|&i| values[i]).count();
    let valid_count = validity.valid_count();
    BooleanSummary {
        valid_count,
        true_count,
        false_count: valid_count - true_count,
    }
}

fn summarize_text(values: &[String], validity: &ValidityBitmap) -> TextSummary {
    let valid: Vec<&str> = validity
        .valid_indices()
        .map(|i| values[i].as_str())
        .collect();
    let lengths = valid.iter().map(|s| s.chars().count());
    TextSummary {
        valid_count: valid.len(),
        distinct_count: valid.iter().collect::<HashSet<_>>().len(),
        min_length: lengths.clone().min().unwrap_or(0),
        max_length: lengths.max().unwrap_or(0),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::LevelSet;

    fn sizes() -> CategoricalColumn {
        let levels = LevelSet::new(["Small", "Medium", "Large"]).unwrap();
        CategoricalColumn::create(
            &[Some("Large"), None, Some("Small"), Some("Large")],
            Some(levels),
            Default::default(),
        )
        .unwrap()
    }

    // ── Categorical ──────────────────────────────────────────────

    #[test]
    fn categorical_reports_every_level_in_order() {
        let summary = summarize_categorical(&sizes());
        let pairs: Vec<(&str, usize)> = summary.tally.iter().collect();
        assert_eq!(pairs, vec![("Small", 1), ("Medium", 0), ("Large", 2)]);
        assert_eq!(summary.n_levels, 3);
        assert_eq!(summary.unused_levels, vec!["Medium".to_string()]);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.mode, Some(("Large".to_string(), 2)));
        assert!(!summary.is_ordered);
        assert_eq!(summary.min_level, None);
    }

    #[test]
    fn ordered_summary_has_extremes() {
        let summary = summarize_categorical(&sizes().into_ordered());
        assert!(summary.is_ordered);
        assert_eq!(summary.min_level.as_deref(), Some("Small"));
        assert_eq!(summary.max_level.as_deref(), Some("Large"));
    }

    #[test]
    fn categorical_all_missing() {
        let column = CategoricalColumn::create(
            &[None::<&str>, None],
            Some(LevelSet::new(["only"]).unwrap()),
            Default::default(),
        )
        .unwrap();
        let summary = summarize_categorical(&column);
        assert_eq!(summary.mode, None);
        assert_eq!(summary.missing, 2);
        assert_eq!(summary.unused_levels, vec!["only".to_string()]);
    }

    #[test]
    fn categorical_summary_json_is_level_ordered() {
        let col = Column::categorical(sizes());
        let summary = summarize_column("size", &col);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["data_type"], "categorical");
        assert_eq!(json["null_count"], 1);
        assert!(json.get("numeric").is_none());
        let text = serde_json::to_string(&summary.categorical.unwrap().tally).unwrap();
        assert_eq!(text, r#"{"Small":1,"Medium":0,"Large":2}"#);
    }

    // ── Numeric / Boolean / Text ─────────────────────────────────

    #[test]
    fn numeric_basic_stats() {
        let mut validity = ValidityBitmap::all_valid(5);
        validity.set_invalid(4);
        let col = Column::numeric(vec![4.0, 1.0, 3.0, 1.0, 0.0], validity);
        let summary = summarize_column("x", &col).numeric.unwrap();
        assert_eq!(summary.valid_count, 4);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert!((summary.mean - 2.25).abs() < 1e-12);
        assert!((summary.median - 2.0).abs() < 1e-12);
        assert_eq!(summary.distinct_count, 3);
    }

    #[test]
    fn numeric_all_null() {
        let col = Column::numeric(vec![0.0; 2], ValidityBitmap::all_invalid(2));
        let summary = summarize_column("x", &col).numeric.unwrap();
        assert_eq!(summary.valid_count, 0);
        assert!(summary.mean.is_nan());
    }

    #[test]
    fn boolean_counts() {
        let mut validity = ValidityBitmap::all_valid(4);
        validity.set_invalid(1);
        let col = Column::boolean(vec![true, true, false, true], validity);
        let summary = summarize_column("b", &col).boolean.unwrap();
        assert_eq!(summary.valid_count, 3);
        assert_eq!(summary.true_count, 2);
        assert_eq!(summary.false_count, 1);
    }

    #[test]
    fn text_lengths() {
        let col = Column::text(
            vec!["héllo".into(), "hi".into(), "hi".into()],
            ValidityBitmap::all_valid(3),
        );
        let summary = summarize_column("t", &col).text.unwrap();
        assert_eq!(summary.distinct_count, 2);
        assert_eq!(summary.min_length, 2);
        assert_eq!(summary.max_length, 5);
    }

    #[test]
    fn dataframe_summary_in_column_order() {
        let df = DataFrame::from_raw_columns(
            vec!["a".into(), "b".into()],
            vec![vec![Some("1"), Some("2")], vec![Some("x"), None]],
            &crate::coercion::CoercionPolicy::categorize(),
        )
        .unwrap();
        let summaries = summarize_dataframe(&df);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "a");
        assert_eq!(summaries[1].data_type, DataType::Categorical);
        assert_eq!(summaries[1].null_count, 1);
    }
}
