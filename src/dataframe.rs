//! Column-major DataFrame for tabular data.
//!
//! The [`DataFrame`] stores named, typed columns of equal length. Categorical
//! columns are full [`CategoricalColumn`] values, so a table never holds a
//! code outside its column's level set.
//!
//! # Column Types
//!
//! | Type | Storage | Use case |
//! |------|---------|----------|
//! | [`Numeric`](Column::Numeric) | `Vec<f64>` + bitmap | Continuous/integer values |
//! | [`Boolean`](Column::Boolean) | `Vec<bool>` + bitmap | True/false values |
//! | [`Categorical`](Column::Categorical) | [`CategoricalColumn`] | Closed label vocabularies |
//! | [`Text`](Column::Text) | `Vec<String>` + bitmap | Free-form strings |
//!
//! # Example
//!
//! ```
//! use u_factor::coercion::CoercionPolicy;
//! use u_factor::dataframe::DataFrame;
//!
//! let mut df = DataFrame::from_raw_columns(
//!     vec!["size".into(), "weight".into()],
//!     vec![
//!         vec![Some("Small"), Some("Large")],
//!         vec![Some("1.5"), Some("7.25")],
//!     ],
//!     &CoercionPolicy::default().level_order("size", ["Small", "Large"]),
//! )
//! .unwrap();
//!
//! df.append_rows(&[vec![Some("Medium"), None]]).unwrap();
//! assert_eq!(df.row_count(), 3);
//!
//! let size = df.column_by_name("size").unwrap().as_categorical().unwrap();
//! // New labels are appended; existing order is kept.
//! assert_eq!(size.levels().as_slice(), ["Small", "Large", "Medium"]);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coercion::{reconcile_column, CoercionPolicy};
use crate::error::{FactorError, Result};
use crate::factor::CategoricalColumn;
use crate::validity::ValidityBitmap;

// ── DataType ──────────────────────────────────────────────────────────

/// Semantic data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Continuous or integer numeric values (stored as `f64`).
    Numeric,
    /// Boolean (true/false) values.
    Boolean,
    /// Integer-coded labels over a fixed level set.
    Categorical,
    /// Free-form text.
    Text,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "Numeric"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Categorical => write!(f, "Categorical"),
            Self::Text => write!(f, "Text"),
        }
    }
}

// ── Column ────────────────────────────────────────────────────────────

/// A typed column with missing-value tracking.
///
/// Dense variants hold a placeholder (0.0, false, or empty string) at
/// missing positions; it should be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Dense `f64` values. Missing positions hold `0.0`.
    Numeric {
        values: Vec<f64>,
        validity: ValidityBitmap,
    },
    /// Boolean values. Missing positions hold `false`.
    Boolean {
        values: Vec<bool>,
        validity: ValidityBitmap,
    },
    /// Categorical column with its own level set.
    Categorical(CategoricalColumn),
    /// Free-form text. Missing positions hold an empty string.
    Text {
        values: Vec<String>,
        validity: ValidityBitmap,
    },
}

impl Column {
    /// Creates a numeric column.
    pub fn numeric(values: Vec<f64>, validity: ValidityBitmap) -> Self {
        Self::Numeric { values, validity }
    }

    /// Creates a boolean column.
    pub fn boolean(values: Vec<bool>, validity: ValidityBitmap) -> Self {
        Self::Boolean { values, validity }
    }

    /// Wraps a categorical column.
    pub fn categorical(column: CategoricalColumn) -> Self {
        Self::Categorical(column)
    }

    /// Creates a text column.
    pub fn text(values: Vec<String>, validity: ValidityBitmap) -> Self {
        Self::Text { values, validity }
    }

    /// Returns the data type of this column.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Numeric { .. } => DataType::Numeric,
            Self::Boolean { .. } => DataType::Boolean,
            Self::Categorical(_) => DataType::Categorical,
            Self::Text { .. } => DataType::Text,
        }
    }

    /// Returns the number of rows in this column.
    pub fn len(&self) -> usize {
        self.validity().len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the validity bitmap.
    pub fn validity(&self) -> &ValidityBitmap {
        match self {
            Self::Numeric { validity, .. }
            | Self::Boolean { validity, .. }
            | Self::Text { validity, .. } => validity,
            Self::Categorical(col) => col.validity(),
        }
    }

    /// Returns the number of missing values.
    pub fn null_count(&self) -> usize {
        self.validity().null_count()
    }

    /// Returns `true` if the value at `idx` is present.
    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity().is_valid(idx)
    }

    /// Returns the numeric values, or `None` if not a numeric column.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Returns the boolean values, or `None` if not a boolean column.
    pub fn as_boolean(&self) -> Option<&[bool]> {
        match self {
            Self::Boolean { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Returns the categorical column, or `None` if not categorical.
    pub fn as_categorical(&self) -> Option<&CategoricalColumn> {
        match self {
            Self::Categorical(col) => Some(col),
            _ => None,
        }
    }

    /// Returns the label at row `idx` of a categorical column.
    pub fn category_at(&self, idx: usize) -> Option<&str> {
        self.as_categorical().and_then(|col| col.get(idx))
    }

    /// Returns the text value at row `idx` of a text column.
    pub fn text_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Text { values, validity } if validity.is_valid(idx) => Some(&values[idx]),
            _ => None,
        }
    }

    /// Renders row `idx` back to the raw text it would be ingested from.
    pub fn raw_at(&self, idx: usize) -> Option<String> {
        if !self.is_valid(idx) {
            return None;
        }
        match self {
            Self::Numeric { values, .. } => Some(values[idx].to_string()),
            Self::Boolean { values, .. } => Some(values[idx].to_string()),
            Self::Categorical(col) => col.get(idx).map(str::to_string),
            Self::Text { values, .. } => Some(values[idx].clone()),
        }
    }
}

// ── DataFrame ─────────────────────────────────────────────────────────

/// Column-major tabular data structure.
///
/// Stores named columns of typed data. All columns have the same number
/// of rows. Row appends keep each column's type and extend categorical
/// level sets without reordering them.
#[derive(Debug, Clone, Default)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl DataFrame {
    /// Creates an empty DataFrame with no columns or rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a DataFrame from raw column-major text, typed by `policy`.
    pub fn from_raw_columns<S: AsRef<str>>(
        names: Vec<String>,
        columns: Vec<Vec<Option<S>>>,
        policy: &CoercionPolicy,
    ) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(FactorError::DimensionMismatch {
                expected: names.len(),
                actual: columns.len(),
            });
        }
        let mut df = Self::new();
        for (name, raw) in names.into_iter().zip(columns) {
            let column = policy.coerce(&name, &raw)?;
            df.add_column(name, column)?;
        }
        Ok(df)
    }

    /// Adds a named column to the DataFrame.
    ///
    /// Returns an error if the name is taken or the column length doesn't
    /// match the existing row count (unless this is the first column).
    pub fn add_column(&mut self, name: String, column: Column) -> Result<()> {
        if self.column_index(&name).is_some() {
            return Err(FactorError::DuplicateColumn { name });
        }
        let col_len = column.len();
        if self.columns.is_empty() {
            self.row_count = col_len;
        } else if col_len != self.row_count {
            return Err(FactorError::DimensionMismatch {
                expected: self.row_count,
                actual: col_len,
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Replaces the column called `name`, returning the old one.
    ///
    /// This is how a rebuilt categorical column (after
    /// [`set_levels`](CategoricalColumn::set_levels) or
    /// [`recode`](CategoricalColumn::recode)) goes back into the table.
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<Column> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| FactorError::ColumnNotFound {
                name: name.to_string(),
            })?;
        if column.len() != self.row_count {
            return Err(FactorError::DimensionMismatch {
                expected: self.row_count,
                actual: column.len(),
            });
        }
        Ok(std::mem::replace(&mut self.columns[idx], column))
    }

    /// Appends raw row-major values, one entry per column in column order.
    ///
    /// Categorical columns extend their level sets: existing levels keep
    /// their order and new labels are appended. On any error the frame is
    /// left unchanged.
    pub fn append_rows<S: AsRef<str>>(&mut self, rows: &[Vec<Option<S>>]) -> Result<()> {
        let width = self.column_count();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(FactorError::DimensionMismatch {
                expected: width,
                actual: bad.len(),
            });
        }
        if rows.is_empty() || width == 0 {
            return Ok(());
        }

        let mut rebuilt = Vec::with_capacity(width);
        for (col_idx, (name, column)) in self.names.iter().zip(&self.columns).enumerate() {
            let raw: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row[col_idx].as_ref().map(|s| s.as_ref()))
                .collect();
            rebuilt.push(reconcile_column(name, column, &raw)?);
        }

        debug!(rows = rows.len(), columns = width, "appended rows");
        self.columns = rebuilt;
        self.row_count += rows.len();
        Ok(())
    }

    /// Appends every row of `other`, matching columns by name.
    ///
    /// Both frames must have the same column names. Values are reconciled as
    /// in [`append_rows`](Self::append_rows).
    pub fn append_frame(&mut self, other: &DataFrame) -> Result<()> {
        if other.column_count() != self.column_count() {
            return Err(FactorError::DimensionMismatch {
                expected: self.column_count(),
                actual: other.column_count(),
            });
        }
        let sources = self
            .names
            .iter()
            .map(|name| {
                other
                    .column_by_name(name)
                    .ok_or_else(|| FactorError::ColumnNotFound { name: name.clone() })
            })
            .collect::<Result<Vec<&Column>>>()?;

        let rows: Vec<Vec<Option<String>>> = (0..other.row_count())
            .map(|row| sources.iter().map(|col| col.raw_at(row)).collect())
            .collect();
        self.append_rows(&rows)
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the DataFrame has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns column names.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns a reference to the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns a reference to the column with the given `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Returns the categorical column with the given `name`.
    pub fn categorical(&self, name: &str) -> Result<&CategoricalColumn> {
        let column = self
            .column_by_name(name)
            .ok_or_else(|| FactorError::ColumnNotFound {
                name: name.to_string(),
            })?;
        column
            .as_categorical()
            .ok_or_else(|| FactorError::ColumnTypeMismatch {
                column: name.to_string(),
                expected: DataType::Categorical,
                value: column.data_type().to_string(),
            })
    }

    /// Returns the index of the column with the given `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns an iterator over (name, column) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(|s| s.as_str()).zip(self.columns.iter())
    }

    /// Returns a summary of column data types.
    pub fn schema(&self) -> Vec<(&str, DataType)> {
        self.iter()
            .map(|(name, col)| (name, col.data_type()))
            .collect()
    }

    /// Returns the total number of missing values across all columns.
    pub fn total_null_count(&self) -> usize {
        self.columns.iter().map(|c| c.null_count()).sum()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
