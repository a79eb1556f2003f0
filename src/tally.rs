//! Level-ordered tallies and cross-tabulations.
//!
//! Counts are always reported in level order, zero counts included. The
//! order never depends on which labels happen to be observed first.
//! Reordering a column's levels permutes the report and leaves every count
//! unchanged.
//!
//! # Example
//!
//! ```
//! use u_factor::factor::CategoricalColumn;
//! use u_factor::levels::LevelSet;
//! use u_factor::tally::{count_1d, count_nd};
//!
//! let levels = LevelSet::new(["Large", "Medium", "Small"]).unwrap();
//! let size = CategoricalColumn::with_levels(&["Medium", "Small", "Large", "Medium"], levels).unwrap();
//!
//! let tally = count_1d(&size);
//! let pairs: Vec<(&str, usize)> = tally.iter().collect();
//! assert_eq!(pairs, vec![("Large", 1), ("Medium", 2), ("Small", 1)]);
//!
//! let color = CategoricalColumn::from_labels(&["red", "red", "blue", "red"]);
//! let table = count_nd(&[&size, &color]).unwrap();
//! assert_eq!(table.shape(), vec![3, 2]);
//! assert_eq!(table.get(&["Medium", "red"]), Some(2));
//! assert_eq!(table.get(&["Small", "red"]), Some(1));
//! assert_eq!(table.get(&["Large", "blue"]), Some(1));
//! assert_eq!(table.get(&["Small", "blue"]), Some(0));
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::trace;

use crate::error::{FactorError, Result};
use crate::factor::CategoricalColumn;
use crate::levels::LevelSet;

// ── One-dimensional tally ─────────────────────────────────────────────

/// Occurrence counts per level, in level order.
///
/// Serializes as a JSON object whose keys follow level order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    levels: LevelSet,
    counts: Vec<usize>,
    missing: usize,
}

impl Tally {
    /// Iterates `(label, count)` pairs in level order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, usize)> + '_ {
        self.levels.iter().zip(self.counts.iter().copied())
    }

    /// Count for `label`, or `None` if it is not a level.
    pub fn get(&self, label: &str) -> Option<usize> {
        self.levels
            .position(label)
            .map(|code| self.counts[code as usize])
    }

    /// The level set the tally is reported over.
    pub fn levels(&self) -> &LevelSet {
        &self.levels
    }

    /// Counts in level order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Number of levels reported.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if no levels are reported.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of observations counted under some level.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Number of observations left out because they were missing.
    pub fn missing(&self) -> usize {
        self.missing
    }

    /// Level with the highest count; ties go to the earlier level.
    pub fn mode(&self) -> Option<(&str, usize)> {
        self.iter()
            .filter(|&(_, count)| count > 0)
            .fold(None, |best, (label, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((label, count)),
            })
    }

    /// Share of each level among counted observations, in level order.
    ///
    /// All shares are `0.0` when nothing was counted.
    pub fn proportions(&self) -> Vec<(&str, f64)> {
        let total = self.total();
        self.iter()
            .map(|(label, count)| {
                let share = if total > 0 {
                    count as f64 / total as f64
                } else {
                    0.0
                };
                (label, share)
            })
            .collect()
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

/// Counts a column's observations per level, in level order.
///
/// Levels with no occurrences are reported with count `0`. Missing
/// observations are counted in [`Tally::missing`].
pub fn count_1d(column: &CategoricalColumn) -> Tally {
    let mut counts = vec![0usize; column.n_levels()];
    let mut missing = 0usize;
    for code in column.code_iter() {
        match code {
            Some(code) => counts[code as usize] += 1,
            None => missing += 1,
        }
    }
    Tally {
        levels: column.levels().clone(),
        counts,
        missing,
    }
}

// ── Cross-tabulation ──────────────────────────────────────────────────

/// Nested ordered mapping produced by [`CrossTab::nested`].
///
/// Serializes as nested JSON objects whose keys follow level order, with
/// counts at the leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyNode {
    /// Count of one cell.
    Count(usize),
    /// One entry per level of the next dimension, in level order.
    Levels(Vec<(String, TallyNode)>),
}

impl TallyNode {
    /// Follows `path` through nested levels.
    pub fn at(&self, path: &[&str]) -> Option<&TallyNode> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => match self {
                Self::Count(_) => None,
                Self::Levels(entries) => entries
                    .iter()
                    .find(|(label, _)| label.as_str() == *head)
                    .and_then(|(_, node)| node.at(rest)),
            },
        }
    }

    /// The count at a leaf node.
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Count(count) => Some(*count),
            Self::Levels(_) => None,
        }
    }
}

impl Serialize for TallyNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Count(count) => serializer.serialize_u64(*count as u64),
            Self::Levels(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (label, node) in entries {
                    map.serialize_entry(label, node)?;
                }
                map.end()
            }
        }
    }
}

/// Co-occurrence counts over the Cartesian product of several level sets.
///
/// Cells are stored row-major: the last dimension varies fastest. Rows with
/// a missing value in any dimension are left out of every cell and counted
/// in [`CrossTab::missing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossTab {
    axes: Vec<LevelSet>,
    strides: Vec<usize>,
    counts: Vec<usize>,
    missing: usize,
}

impl CrossTab {
    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Number of levels per dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(LevelSet::len).collect()
    }

    /// Level set of dimension `axis`.
    pub fn levels(&self, axis: usize) -> Option<&LevelSet> {
        self.axes.get(axis)
    }

    /// Cell counts in row-major order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Rows counted into some cell.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Rows left out because a dimension was missing.
    pub fn missing(&self) -> usize {
        self.missing
    }

    /// Count of the cell at one level slot per dimension.
    pub fn get_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.ndim() {
            return None;
        }
        let mut flat = 0usize;
        for ((&i, axis), &stride) in index.iter().zip(&self.axes).zip(&self.strides) {
            if i >= axis.len() {
                return None;
            }
            flat += i * stride;
        }
        self.counts.get(flat).copied()
    }

    /// Count of the cell at one level label per dimension.
    pub fn get(&self, labels: &[&str]) -> Option<usize> {
        if labels.len() != self.ndim() {
            return None;
        }
        let index = labels
            .iter()
            .zip(&self.axes)
            .map(|(label, axis)| axis.position(label).map(|code| code as usize))
            .collect::<Option<Vec<usize>>>()?;
        self.get_index(&index)
    }

    /// Iterates cells in report order as `(labels, count)`.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<&str>, usize)> + '_ {
        self.counts.iter().enumerate().map(move |(flat, &count)| {
            let labels = self
                .axes
                .iter()
                .zip(&self.strides)
                .map(|(axis, &stride)| {
                    let slot = (flat / stride) % axis.len();
                    axis.get(slot as u32).unwrap_or_default()
                })
                .collect();
            (labels, count)
        })
    }

    /// Sums out every dimension except `axis`.
    ///
    /// The result counts only rows present in all dimensions, so it can
    /// differ from [`count_1d`] on the same column when other dimensions
    /// have missing values.
    pub fn margin(&self, axis: usize) -> Option<Tally> {
        let levels = self.axes.get(axis)?;
        let stride = self.strides[axis];
        let mut counts = vec![0usize; levels.len()];
        for (flat, &count) in self.counts.iter().enumerate() {
            counts[(flat / stride) % levels.len()] += count;
        }
        Some(Tally {
            levels: levels.clone(),
            counts,
            missing: self.missing,
        })
    }

    /// Converts to a nested ordered mapping, outermost dimension first.
    pub fn nested(&self) -> TallyNode {
        self.nest(0, 0)
    }

    fn nest(&self, axis: usize, offset: usize) -> TallyNode {
        let Some(levels) = self.axes.get(axis) else {
            return TallyNode::Count(self.counts[offset]);
        };
        let stride = self.strides[axis];
        TallyNode::Levels(
            levels
                .iter()
                .enumerate()
                .map(|(slot, label)| (label.to_string(), self.nest(axis + 1, offset + slot * stride)))
                .collect(),
        )
    }
}

impl Serialize for CrossTab {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.nested().serialize(serializer)
    }
}

/// Cross-tabulates columns over the product of their level sets.
///
/// Every combination of levels gets a cell, zero-filled when unobserved.
/// Dimensions and report order come only from the columns' level sets.
///
/// Fails with [`FactorError::InsufficientData`] for an empty column list
/// and [`FactorError::DimensionMismatch`] when column lengths differ.
/// A level product too large to address fails with
/// [`FactorError::TableTooLarge`].
pub fn count_nd(columns: &[&CategoricalColumn]) -> Result<CrossTab> {
    let Some(first) = columns.first() else {
        return Err(FactorError::InsufficientData {
            min_required: 1,
            actual: 0,
        });
    };
    let rows = first.len();
    if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
        return Err(FactorError::DimensionMismatch {
            expected: rows,
            actual: bad.len(),
        });
    }

    let axes: Vec<LevelSet> = columns.iter().map(|c| c.levels().clone()).collect();
    let shape: Vec<usize> = axes.iter().map(LevelSet::len).collect();
    let cells = shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| FactorError::TableTooLarge {
            shape: shape.clone(),
        })?;
    // Every stride divides `cells` unless some axis is empty, and then no
    // row ever reaches a cell.
    let mut strides = vec![1usize; axes.len()];
    for axis in (0..axes.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1].saturating_mul(shape[axis + 1]);
    }
    let mut counts = vec![0usize; cells];
    let mut missing = 0usize;

    let mut iters: Vec<_> = columns.iter().map(|c| c.code_iter()).collect();
    for _ in 0..rows {
        let mut flat = Some(0usize);
        for (iter, &stride) in iters.iter_mut().zip(&strides) {
            let code = iter.next().flatten();
            flat = match (flat, code) {
                (Some(acc), Some(code)) => Some(acc + code as usize * stride),
                _ => None,
            };
        }
        match flat {
            Some(flat) => counts[flat] += 1,
            None => missing += 1,
        }
    }

    trace!(dims = axes.len(), cells, rows, missing, "cross-tabulated columns");
    Ok(CrossTab {
        axes,
        strides,
        counts,
        missing,
    })
}

/// Two-way table: `rows` levels down, `cols` levels across.
pub fn count_2d(rows: &CategoricalColumn, cols: &CategoricalColumn) -> Result<CrossTab> {
    count_nd(&[rows, cols])
}

// ── Tests ─────────────────────────────────────────────────────────────
