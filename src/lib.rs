//! # u-factor
//!
//! Categorical columns with fixed level sets, level-ordered tallies, and
//! table ingestion.
//!
//! A categorical column stores one integer code per observation plus a
//! closed, ordered level set. Level order is a first-class property: it
//! drives every report, and it is never
//! inferred from the order in which labels happen to be observed.
//!
//! ## Modules
//!
//! - [`levels`]: Ordered, duplicate-free level sets
//! - [`factor`]: `CategoricalColumn` and its level rebuilds
//! - [`tally`]: Level-ordered one-way tallies and N-way cross-tabulations
//! - [`coercion`]: Policy deciding which raw text columns become categorical
//! - [`dataframe`]: Column-major table with row appends that extend level sets
//! - [`csv_parser`]: CSV ingestion through a coercion policy
//! - [`summary`]: Per-column summaries for reporting
//! - [`validity`]: Missing-value bitmap
//! - [`error`]: Error types
//!
//! ## Quick Start
//!
//! ```
//! use u_factor::csv_parser::CsvParser;
//! use u_factor::factor::LevelOrder;
//! use u_factor::tally::{count_1d, count_2d};
//!
//! let csv = "size,color\nLarge,red\nSmall,blue\nLarge,red\nNA,blue\n";
//! let df = CsvParser::new()
//!     .auto_categorize(true)
//!     .level_order("size", ["Small", "Medium", "Large"])
//!     .parse_str(csv)
//!     .unwrap();
//!
//! let size = df.categorical("size").unwrap();
//! let tally = count_1d(size);
//! let pairs: Vec<(&str, usize)> = tally.iter().collect();
//! assert_eq!(pairs, vec![("Small", 1), ("Medium", 0), ("Large", 2)]);
//! assert_eq!(tally.missing(), 1);
//!
//! // Merge two levels by label.
//! let merged = size
//!     .replace(&[("Medium", "Large")], LevelOrder::Extend)
//!     .unwrap()
//!     .drop_unused_levels();
//! assert_eq!(merged.levels().as_slice(), ["Small", "Large"]);
//!
//! let table = count_2d(size, df.categorical("color").unwrap()).unwrap();
//! assert_eq!(table.get(&["Large", "red"]), Some(2));
//! assert_eq!(table.get(&["Medium", "blue"]), Some(0));
//! ```

pub mod coercion;
pub mod csv_parser;
pub mod dataframe;
pub mod error;
pub mod factor;
pub mod levels;
pub mod summary;
pub mod tally;
pub mod validity;

pub use coercion::CoercionPolicy;
pub use dataframe::{Column, DataFrame, DataType};
pub use error::{FactorError, Result};
pub use factor::{CategoricalColumn, LevelOrder, MissingPolicy};
pub use levels::LevelSet;
pub use tally::{count_1d, count_2d, count_nd, CrossTab, Tally, TallyNode};
