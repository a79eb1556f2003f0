//! Error types for u-factor.

use thiserror::Error;

use crate::dataframe::DataType;

/// All errors produced by u-factor operations.
///
/// Every fallible operation either returns a complete new value or one of
/// these errors; inputs are never left half-updated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    /// A label is not part of a closed level set and no missing policy applies.
    #[error("label '{label}' is not in the level set")]
    LevelMismatch { label: String },

    /// A rename or rebuild would produce two identical level labels.
    #[error("duplicate level '{label}'")]
    DuplicateLevel { label: String },

    /// Numeric interpretation was requested but a level label is not numeric text.
    #[error("level '{label}' is not numeric")]
    NonNumericLevel { label: String },

    /// A code references a level that does not exist.
    #[error("code {code} is out of range for {level_count} levels")]
    IndexOutOfRange { code: u32, level_count: usize },

    /// A level slot index passed to a rename is past the end of the level set.
    #[error("level slot {index} is out of range for {level_count} levels")]
    LevelSlotOutOfRange { index: usize, level_count: usize },

    /// A label named as an existing level is not present.
    #[error("unknown level '{label}'")]
    UnknownLevel { label: String },

    /// A row index is past the end of a column.
    #[error("row {index} is out of range for length {len}")]
    RowOutOfRange { index: usize, len: usize },

    /// CSV parsing failed.
    #[error("CSV parse error at line {line}: {message}")]
    CsvParse { line: usize, message: String },

    /// Column not found in DataFrame.
    #[error("column '{name}' not found")]
    ColumnNotFound { name: String },

    /// A column with this name already exists.
    #[error("column '{name}' already exists")]
    DuplicateColumn { name: String },

    /// Dimension mismatch.
    #[error("expected {expected} elements, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Insufficient input for the requested operation.
    #[error("need at least {min_required} inputs, got {actual}")]
    InsufficientData { min_required: usize, actual: usize },

    /// A cross-tabulation has more cells than can be addressed.
    #[error("cross-tabulation of shape {shape:?} has too many cells")]
    TableTooLarge { shape: Vec<usize> },

    /// A raw value cannot be stored in an existing typed column.
    #[error("column '{column}' is {expected}, cannot store '{value}'")]
    ColumnTypeMismatch {
        column: String,
        expected: DataType,
        value: String,
    },

    /// A coercion policy is malformed.
    #[error("invalid coercion policy: {0}")]
    InvalidPolicy(String),

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FactorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type for u-factor operations.
pub type Result<T> = std::result::Result<T, FactorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = FactorError::LevelMismatch {
            label: "Huge".into(),
        };
        assert_eq!(e.to_string(), "label 'Huge' is not in the level set");

        let e = FactorError::IndexOutOfRange {
            code: 7,
            level_count: 3,
        };
        assert_eq!(e.to_string(), "code 7 is out of range for 3 levels");

        let e = FactorError::ColumnTypeMismatch {
            column: "x".into(),
            expected: DataType::Numeric,
            value: "abc".into(),
        };
        assert_eq!(e.to_string(), "column 'x' is Numeric, cannot store 'abc'");
    }

    #[test]
    fn io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: FactorError = io.into();
        assert!(matches!(e, FactorError::Io(ref m) if m.contains("gone")));
    }
}
