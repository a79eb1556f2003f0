//! CSV ingestion through a [`CoercionPolicy`].
//!
//! Parses delimited text into a [`DataFrame`]. Each column's type is chosen
//! by the parser's policy: Numeric → Boolean → Categorical/Text, with
//! per-column overrides first. By default text stays text; opt in with
//! [`CsvParser::auto_categorize`] or a full [`CsvParser::policy`].
//!
//! # Features
//!
//! - RFC 4180 quoting (quoted fields, escaped quotes, delimiters and newlines in fields)
//! - UTF-8 BOM and CRLF / CR line endings
//! - Standard null markers recognized: empty, `NA`, `N/A`, `null`, `NULL`, `None`, `.`
//! - Configurable delimiter and null markers
//! - [`append_str`](CsvParser::append_str) adds rows to an existing frame,
//!   extending categorical level sets without reordering them
//!
//! # Example
//!
//! ```
//! use u_factor::csv_parser::CsvParser;
//! use u_factor::dataframe::DataType;
//!
//! let csv = "size,weight,fragile\nSmall,1.5,true\nLarge,2.3,false\n";
//! let df = CsvParser::new()
//!     .level_order("size", ["Small", "Medium", "Large"])
//!     .parse_str(csv)
//!     .unwrap();
//! assert_eq!(df.row_count(), 2);
//! assert_eq!(df.column(0).unwrap().data_type(), DataType::Categorical);
//! assert_eq!(df.column(1).unwrap().data_type(), DataType::Numeric);
//! assert_eq!(df.column(2).unwrap().data_type(), DataType::Boolean);
//!
//! let size = df.categorical("size").unwrap();
//! assert_eq!(size.levels().as_slice(), ["Small", "Medium", "Large"]);
//! ```

use tracing::{debug, warn};

use crate::coercion::CoercionPolicy;
use crate::dataframe::DataFrame;
use crate::error::{FactorError, Result};
use crate::factor::MissingPolicy;

/// Standard null value markers recognized during parsing.
const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "null", "NULL", "None", "none", ".",
    "NaN", "nan", "NAN", "#N/A", "#NA",
];

/// CSV parser configuration and entry point.
///
/// ```
/// use u_factor::csv_parser::CsvParser;
///
/// let csv = "a,b\n1,2\n3,4\n";
/// let df = CsvParser::new().parse_str(csv).unwrap();
/// assert_eq!(df.row_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CsvParser {
    delimiter: u8,
    has_header: bool,
    null_markers: Vec<String>,
    policy: CoercionPolicy,
}

/// One parsed record and the physical line it starts on.
struct RawRecord {
    line: usize,
    fields: Vec<String>,
}

/// Header plus data rows, nulls already resolved.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl CsvParser {
    /// Creates a parser with default settings (comma delimiter, header row,
    /// standard null markers, text kept as text).
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            null_markers: DEFAULT_NULL_MARKERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            policy: CoercionPolicy::default(),
        }
    }

    /// Sets the field delimiter (default: comma).
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Sets whether the first row is a header (default: true).
    pub fn has_header(mut self, header: bool) -> Self {
        self.has_header = header;
        self
    }

    /// Sets custom null markers (replaces defaults).
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.null_markers = markers;
        self
    }

    /// Replaces the coercion policy.
    pub fn policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Turns non-numeric, non-boolean text columns into categorical columns.
    pub fn auto_categorize(mut self, on: bool) -> Self {
        self.policy = self.policy.auto_categorize(on);
        self
    }

    /// Fixes the level order of column `name`.
    pub fn level_order<I, S>(mut self, name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy = self.policy.level_order(name, levels);
        self
    }

    /// Sets what happens to labels outside a fixed level order.
    pub fn missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.policy = self.policy.missing_policy(policy);
        self
    }

    /// Returns the active coercion policy.
    pub fn coercion_policy(&self) -> &CoercionPolicy {
        &self.policy
    }

    /// Parses a CSV string into a DataFrame.
    pub fn parse_str(&self, input: &str) -> Result<DataFrame> {
        self.policy.validate()?;
        let Some(table) = self.read_table(input)? else {
            return Ok(DataFrame::new());
        };
        if table.rows.is_empty() {
            return Ok(DataFrame::new());
        }

        for name in self.policy.named_columns() {
            if !table.headers.iter().any(|h| h == name) {
                warn!(column = name, "coercion policy names a column absent from the input");
            }
        }

        let n_cols = table.headers.len();
        let mut raw_columns: Vec<Vec<Option<String>>> =
            vec![Vec::with_capacity(table.rows.len()); n_cols];
        for row in table.rows {
            for (col_idx, field) in row.into_iter().enumerate() {
                raw_columns[col_idx].push(field);
            }
        }

        let df = DataFrame::from_raw_columns(table.headers, raw_columns, &self.policy)?;
        debug!(
            rows = df.row_count(),
            columns = df.column_count(),
            "parsed CSV"
        );
        Ok(df)
    }

    /// Parses a CSV file from disk into a DataFrame.
    pub fn parse_file(&self, path: &str) -> Result<DataFrame> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    /// Appends the rows of a CSV string to `df`.
    ///
    /// With a header row, fields are matched to columns by name and every
    /// column of `df` must be present. Without one, fields are positional.
    /// Categorical columns extend their level sets; on any error `df` is
    /// left unchanged.
    pub fn append_str(&self, df: &mut DataFrame, input: &str) -> Result<()> {
        let Some(table) = self.read_table(input)? else {
            return Ok(());
        };
        if df.is_empty() {
            if table.rows.is_empty() {
                return Ok(());
            }
            *df = self.parse_str(input)?;
            return Ok(());
        }
        if table.headers.len() != df.column_count() {
            return Err(FactorError::DimensionMismatch {
                expected: df.column_count(),
                actual: table.headers.len(),
            });
        }

        let positions = if self.has_header {
            df.column_names()
                .iter()
                .map(|name| {
                    table
                        .headers
                        .iter()
                        .position(|h| h == name)
                        .ok_or_else(|| FactorError::ColumnNotFound { name: name.clone() })
                })
                .collect::<Result<Vec<usize>>>()?
        } else {
            (0..df.column_count()).collect()
        };

        let rows: Vec<Vec<Option<String>>> = table
            .rows
            .into_iter()
            .map(|mut row| positions.iter().map(|&p| row[p].take()).collect())
            .collect();
        df.append_rows(&rows)
    }

    /// Appends the rows of a CSV file to `df`.
    pub fn append_file(&self, df: &mut DataFrame, path: &str) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.append_str(df, &content)
    }

    // ── Internal parsing ─────────────────────────────────────────

    /// Splits input into a header and width-checked rows with nulls resolved.
    /// Returns `None` for input with no rows at all.
    fn read_table(&self, input: &str) -> Result<Option<RawTable>> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let mut records = self.parse_raw(input).into_iter();

        let Some(first) = records.next() else {
            return Ok(None);
        };
        let (headers, pending): (Vec<String>, _) = if self.has_header {
            (first.fields, None)
        } else {
            let headers = (0..first.fields.len()).map(|i| format!("col_{i}")).collect();
            (headers, Some(first))
        };

        let n_cols = headers.len();
        let mut rows = Vec::new();
        for record in pending.into_iter().chain(records) {
            if record.fields.len() != n_cols {
                return Err(FactorError::CsvParse {
                    line: record.line,
                    message: format!("expected {n_cols} fields, got {}", record.fields.len()),
                });
            }
            rows.push(
                record
                    .fields
                    .into_iter()
                    .map(|field| (!self.is_null(&field)).then_some(field))
                    .collect(),
            );
        }
        Ok(Some(RawTable { headers, rows }))
    }

    /// Parses raw CSV text into records of string fields.
    fn parse_raw(&self, input: &str) -> Vec<RawRecord> {
        let delim = self.delimiter as char;
        let mut records: Vec<RawRecord> = Vec::new();
        let mut current_row: Vec<String> = Vec::new();
        let mut current_field = String::new();
        let mut in_quotes = false;
        let mut chars = input.chars().peekable();
        let mut line = 1usize;
        let mut record_start = 1usize;

        while let Some(c) = chars.next() {
            let ends_line = c == '\n' || (c == '\r' && chars.peek() != Some(&'\n'));
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        current_field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    if ends_line {
                        line += 1;
                    }
                    current_field.push(c);
                }
            } else if c == '"' && current_field.is_empty() {
                in_quotes = true;
            } else if c == delim {
                current_row.push(std::mem::take(&mut current_field));
            } else if ends_line {
                current_row.push(std::mem::take(&mut current_field));
                let blank = current_row.iter().all(|f| f.is_empty());
                if !blank || !records.is_empty() {
                    records.push(RawRecord {
                        line: record_start,
                        fields: std::mem::take(&mut current_row),
                    });
                } else {
                    current_row.clear();
                }
                line += 1;
                record_start = line;
            } else if c != '\r' {
                current_field.push(c);
            }
        }

        // Last record without a trailing newline
        if !current_field.is_empty() || !current_row.is_empty() {
            current_row.push(current_field);
            records.push(RawRecord {
                line: record_start,
                fields: current_row,
            });
        }

        while records
            .last()
            .is_some_and(|r| r.fields.iter().all(|f| f.is_empty()))
        {
            records.pop();
        }
        records
    }

    /// Checks if a trimmed value is a null marker.
    fn is_null(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.null_markers.iter().any(|m| m == trimmed)
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
