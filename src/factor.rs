//! Categorical columns: a fixed level set plus integer-coded observations.
//!
//! A [`CategoricalColumn`] stores one `u32` code per observation and a
//! [`ValidityBitmap`] marking missing observations. Codes index into the
//! column's [`LevelSet`]. Every present code is in range, and levels may
//! have zero occurrences.
//!
//! Columns are immutable values. Each operation that changes levels or
//! observations returns a new column:
//!
//! | Operation | Levels | Codes |
//! |-----------|--------|-------|
//! | [`rename_level`](CategoricalColumn::rename_level) | one slot relabeled | untouched |
//! | [`set_levels`](CategoricalColumn::set_levels) | replaced | recomputed from labels |
//! | [`recode`](CategoricalColumn::recode) | rebuilt per [`LevelOrder`] | recomputed from mapped labels |
//! | [`concatenate`](CategoricalColumn::concatenate) | reconciled per [`LevelOrder`] | recomputed from labels |
//! | [`drop_unused_levels`](CategoricalColumn::drop_unused_levels) | restricted | remapped |
//!
//! # Example
//!
//! ```
//! use u_factor::factor::CategoricalColumn;
//! use u_factor::levels::LevelSet;
//!
//! let levels = LevelSet::new(["Large", "Medium", "Small"]).unwrap();
//! let sizes = CategoricalColumn::with_levels(&["Medium", "Small", "Large", "Medium"], levels).unwrap();
//!
//! // Reordering levels keeps every observation's label.
//! let reordered = sizes
//!     .set_levels(LevelSet::new(["Small", "Medium", "Large"]).unwrap())
//!     .unwrap();
//! assert_eq!(reordered.decode(), sizes.decode());
//!
//! // Renaming a slot relabels every observation under it.
//! let renamed = sizes.rename_level(1, "Mid").unwrap();
//! assert_eq!(renamed.get(0), Some("Mid"));
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{FactorError, Result};
use crate::levels::LevelSet;
use crate::validity::ValidityBitmap;

/// What to do with a label that is not part of a closed level set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Fail with [`FactorError::LevelMismatch`].
    #[default]
    Reject,
    /// Store the observation as missing.
    AsMissing,
}

/// How a rebuild chooses the level order of its result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LevelOrder {
    /// Sorted union of the carried-over levels and every observed label.
    #[default]
    Sorted,
    /// Observed labels in order of first appearance. Zero-count levels are dropped.
    Appearance,
    /// Carried-over levels in their current order, then unseen labels in
    /// order of first appearance.
    Extend,
    /// A caller-supplied closed level set.
    Explicit(LevelSet),
}

/// Integer-coded categorical column with a fixed, ordered level set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CategoricalParts", into = "CategoricalParts")]
pub struct CategoricalColumn {
    levels: LevelSet,
    /// Missing positions hold `0`, which is never read.
    codes: Vec<u32>,
    validity: ValidityBitmap,
    ordered: bool,
}

/// Raw constituents of a [`CategoricalColumn`].
///
/// This is the serialized form. Converting back into a column validates
/// every code against the level set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalParts {
    pub levels: LevelSet,
    pub codes: Vec<Option<u32>>,
    #[serde(default)]
    pub ordered: bool,
}

impl CategoricalColumn {
    // ── Construction ─────────────────────────────────────────────

    /// Creates a column with no observations and no levels.
    pub fn empty() -> Self {
        Self {
            levels: LevelSet::empty(),
            codes: Vec::new(),
            validity: ValidityBitmap::empty(),
            ordered: false,
        }
    }

    /// Creates a column from possibly-missing labels.
    ///
    /// With `levels == None` the level set is the sorted set of distinct
    /// labels. Otherwise the supplied order is used verbatim, and labels
    /// outside it are handled by `policy`.
    ///
    /// ```
    /// use u_factor::factor::{CategoricalColumn, MissingPolicy};
    /// use u_factor::levels::LevelSet;
    ///
    /// let col = CategoricalColumn::create(&[Some("b"), None, Some("a")], None, MissingPolicy::Reject).unwrap();
    /// assert_eq!(col.levels().as_slice(), ["a", "b"]);
    /// assert_eq!(col.decode(), vec![Some("b"), None, Some("a")]);
    ///
    /// let closed = LevelSet::new(["a"]).unwrap();
    /// assert!(CategoricalColumn::create(&[Some("b")], Some(closed.clone()), MissingPolicy::Reject).is_err());
    /// let lenient = CategoricalColumn::create(&[Some("b")], Some(closed), MissingPolicy::AsMissing).unwrap();
    /// assert_eq!(lenient.missing_count(), 1);
    /// ```
    pub fn create<S: AsRef<str>>(
        labels: &[Option<S>],
        levels: Option<LevelSet>,
        policy: MissingPolicy,
    ) -> Result<Self> {
        let labels = labels.iter().map(|l| l.as_ref().map(|s| s.as_ref()));
        match levels {
            Some(levels) => Self::encode(labels, levels, policy),
            None => Ok(Self::empty().append_label_iter(labels).sort_levels()),
        }
    }

    /// Creates a column from labels with inferred, sorted levels.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self::empty()
            .append_label_iter(labels.iter().map(|s| Some(s.as_ref())))
            .sort_levels()
    }

    /// Creates a column against a closed level set, rejecting unknown labels.
    pub fn with_levels<S: AsRef<str>>(labels: &[S], levels: LevelSet) -> Result<Self> {
        Self::encode(
            labels.iter().map(|s| Some(s.as_ref())),
            levels,
            MissingPolicy::Reject,
        )
    }

    /// Creates a column from raw codes, validating each against `levels`.
    ///
    /// Fails with [`FactorError::IndexOutOfRange`] on a code past the last level.
    pub fn from_codes(levels: LevelSet, codes: &[Option<u32>]) -> Result<Self> {
        let mut dense = Vec::with_capacity(codes.len());
        let mut validity = ValidityBitmap::empty();
        for &code in codes {
            match code {
                Some(code) if (code as usize) < levels.len() => {
                    dense.push(code);
                    validity.push(true);
                }
                Some(code) => {
                    return Err(FactorError::IndexOutOfRange {
                        code,
                        level_count: levels.len(),
                    })
                }
                None => {
                    dense.push(0);
                    validity.push(false);
                }
            }
        }
        Ok(Self {
            levels,
            codes: dense,
            validity,
            ordered: false,
        })
    }

    fn encode<'a, I>(labels: I, levels: LevelSet, policy: MissingPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let labels = labels.into_iter();
        let mut codes = Vec::with_capacity(labels.size_hint().0);
        let mut validity = ValidityBitmap::empty();

        for label in labels {
            let code = match label {
                Some(label) => match (levels.position(label), policy) {
                    (Some(code), _) => Some(code),
                    (None, MissingPolicy::AsMissing) => None,
                    (None, MissingPolicy::Reject) => {
                        return Err(FactorError::LevelMismatch {
                            label: label.to_string(),
                        })
                    }
                },
                None => None,
            };
            codes.push(code.unwrap_or(0));
            validity.push(code.is_some());
        }

        trace!(rows = codes.len(), levels = levels.len(), "encoded categorical column");
        Ok(Self {
            levels,
            codes,
            validity,
            ordered: false,
        })
    }

    fn append_label_iter<'a, I>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        for label in labels {
            match label {
                Some(label) => {
                    let code = self.levels.intern(label);
                    self.codes.push(code);
                    self.validity.push(true);
                }
                None => {
                    self.codes.push(0);
                    self.validity.push(false);
                }
            }
        }
        self
    }

    /// Rebuilds from decoded labels, choosing levels per `order`.
    ///
    /// `carried` holds levels kept regardless of occurrence by
    /// [`LevelOrder::Sorted`] and [`LevelOrder::Extend`].
    fn rebuild(
        labels: &[Option<&str>],
        order: LevelOrder,
        carried: &LevelSet,
        policy: MissingPolicy,
    ) -> Result<Self> {
        let observed = labels.iter().flatten().copied();
        let levels = match order {
            LevelOrder::Sorted => LevelSet::sorted(carried.iter().chain(observed)),
            LevelOrder::Appearance => LevelSet::from_appearance(observed),
            LevelOrder::Extend => carried.extended(observed),
            LevelOrder::Explicit(levels) => levels,
        };
        Self::encode(labels.iter().copied(), levels, policy)
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Number of observations, including missing ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if there are no observations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// The level set.
    #[inline]
    pub fn levels(&self) -> &LevelSet {
        &self.levels
    }

    /// Number of levels, including unused ones.
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Whether the level order is a magnitude order.
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Marks the level order as a magnitude order.
    pub fn into_ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// The validity bitmap; a cleared bit is a missing observation.
    pub fn validity(&self) -> &ValidityBitmap {
        &self.validity
    }

    /// Number of missing observations.
    pub fn missing_count(&self) -> usize {
        self.validity.null_count()
    }

    /// Label of row `idx`, or `None` if missing or out of bounds.
    pub fn get(&self, idx: usize) -> Option<&str> {
        if idx >= self.len() || !self.validity.is_valid(idx) {
            return None;
        }
        self.levels.get(self.codes[idx])
    }

    /// Iterates decoded labels.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Option<&str>> + '_ {
        self.code_iter()
            .map(|code| code.and_then(|c| self.levels.get(c)))
    }

    pub(crate) fn code_iter(&self) -> impl ExactSizeIterator<Item = Option<u32>> + '_ {
        self.codes
            .iter()
            .enumerate()
            .map(|(i, &code)| self.validity.is_valid(i).then_some(code))
    }

    /// Decodes every observation to its label.
    pub fn decode(&self) -> Vec<Option<&str>> {
        self.iter().collect()
    }

    /// The integer codes, with `None` for missing observations.
    ///
    /// Codes are level slots, not magnitudes. Use
    /// [`as_numeric`](Self::as_numeric) for the numbers the labels spell.
    pub fn raw_codes(&self) -> Vec<Option<u32>> {
        self.code_iter().collect()
    }

    /// Parses level labels as numbers and returns them per observation.
    ///
    /// Fails with [`FactorError::NonNumericLevel`] unless every level,
    /// used or not, parses as a number.
    ///
    /// ```
    /// use u_factor::factor::CategoricalColumn;
    ///
    /// let col = CategoricalColumn::from_labels(&["1", "4", "8", "10", "1"]);
    /// // Sorted as text: "1", "10", "4", "8".
    /// assert_eq!(col.raw_codes(), vec![Some(0), Some(2), Some(3), Some(1), Some(0)]);
    /// assert_eq!(
    ///     col.as_numeric().unwrap(),
    ///     vec![Some(1.0), Some(4.0), Some(8.0), Some(10.0), Some(1.0)]
    /// );
    /// ```
    pub fn as_numeric(&self) -> Result<Vec<Option<f64>>> {
        let values = self
            .levels
            .iter()
            .map(|label| {
                label
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| FactorError::NonNumericLevel {
                        label: label.to_string(),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(self
            .code_iter()
            .map(|code| code.map(|c| values[c as usize]))
            .collect())
    }

    /// Lowest level observed, for ordered columns.
    ///
    /// Returns `None` for unordered columns or when every observation is missing.
    pub fn min_level(&self) -> Option<&str> {
        self.extreme_level(Ordering::Less)
    }

    /// Highest level observed, for ordered columns.
    pub fn max_level(&self) -> Option<&str> {
        self.extreme_level(Ordering::Greater)
    }

    fn extreme_level(&self, want: Ordering) -> Option<&str> {
        if !self.ordered {
            return None;
        }
        let codes = self.code_iter().flatten();
        let code = match want {
            Ordering::Less => codes.min(),
            _ => codes.max(),
        }?;
        self.levels.get(code)
    }

    // ── Level operations ─────────────────────────────────────────

    /// Relabels level slot `old_index`; codes are untouched.
    ///
    /// Every observation under that slot now decodes to `new_label`.
    /// Fails with [`FactorError::DuplicateLevel`] if another slot already
    /// holds `new_label`.
    pub fn rename_level(&self, old_index: usize, new_label: impl Into<String>) -> Result<Self> {
        let levels = self.levels.with_renamed(old_index, new_label)?;
        Ok(Self {
            levels,
            codes: self.codes.clone(),
            validity: self.validity.clone(),
            ordered: self.ordered,
        })
    }

    /// Re-resolves every observation against `new_levels`.
    ///
    /// Codes are recomputed from decoded labels, so each observation keeps
    /// its label. Fails with [`FactorError::LevelMismatch`] if an observed
    /// label is not in `new_levels`.
    pub fn set_levels(&self, new_levels: LevelSet) -> Result<Self> {
        self.set_levels_with_policy(new_levels, MissingPolicy::Reject)
    }

    /// Like [`set_levels`](Self::set_levels), with a policy for labels
    /// absent from `new_levels`.
    pub fn set_levels_with_policy(
        &self,
        new_levels: LevelSet,
        policy: MissingPolicy,
    ) -> Result<Self> {
        debug!(
            from = self.levels.len(),
            to = new_levels.len(),
            rows = self.len(),
            "re-resolving categorical levels"
        );
        let mut rebuilt = Self::encode(self.iter(), new_levels, policy)?;
        rebuilt.ordered = self.ordered;
        Ok(rebuilt)
    }

    /// Moves `reference` to the first level slot.
    pub fn relevel(&self, reference: &str) -> Result<Self> {
        self.set_levels(self.levels.with_front(reference)?)
    }

    /// Sorts levels lexicographically, remapping codes.
    pub fn sort_levels(&self) -> Self {
        let (levels, mapping) = self.levels.sorted_with_mapping();
        self.remapped(levels, &mapping)
    }

    /// Restricts levels to those with at least one occurrence.
    ///
    /// Retained levels keep their relative order. Idempotent.
    pub fn drop_unused_levels(&self) -> Self {
        let mut used = vec![false; self.levels.len()];
        for code in self.code_iter().flatten() {
            used[code as usize] = true;
        }

        let mut mapping = vec![0u32; used.len()];
        let mut next = 0u32;
        for (old, &keep) in used.iter().enumerate() {
            if keep {
                mapping[old] = next;
                next += 1;
            }
        }

        let levels = self.levels.retained(|code| used[code as usize]);
        debug!(
            dropped = self.levels.len() - levels.len(),
            "dropped unused levels"
        );
        self.remapped(levels, &mapping)
    }

    fn remapped(&self, levels: LevelSet, mapping: &[u32]) -> Self {
        let codes = self
            .code_iter()
            .map(|code| code.map_or(0, |c| mapping[c as usize]))
            .collect();
        Self {
            levels,
            codes,
            validity: self.validity.clone(),
            ordered: self.ordered,
        }
    }

    // ── Observation rebuilds ─────────────────────────────────────

    /// Maps each present observation through `f` and rebuilds the column.
    ///
    /// `f` receives the row index and current label and returns the new
    /// label, or `None` to mark the row missing. Missing rows stay missing.
    /// [`LevelOrder::Extend`] keeps the current levels and appends new
    /// labels. [`LevelOrder::Sorted`] and [`LevelOrder::Appearance`]
    /// re-infer levels from the mapped labels alone.
    ///
    /// ```
    /// use u_factor::factor::{CategoricalColumn, LevelOrder};
    ///
    /// let col = CategoricalColumn::from_labels(&["ctrl", "trt", "ctrl", "trt"]);
    /// // Only the third observation changes.
    /// let fixed = col
    ///     .recode(|row, label| Some(if row == 2 { "placebo".into() } else { label.into() }), LevelOrder::Extend)
    ///     .unwrap();
    /// assert_eq!(fixed.decode(), vec![Some("ctrl"), Some("trt"), Some("placebo"), Some("trt")]);
    /// assert_eq!(fixed.levels().as_slice(), ["ctrl", "trt", "placebo"]);
    /// ```
    pub fn recode<F>(&self, f: F, order: LevelOrder) -> Result<Self>
    where
        F: FnMut(usize, &str) -> Option<String>,
    {
        self.recode_with_policy(f, order, MissingPolicy::Reject)
    }

    /// Like [`recode`](Self::recode), with a policy for mapped labels
    /// outside a [`LevelOrder::Explicit`] set.
    pub fn recode_with_policy<F>(
        &self,
        mut f: F,
        order: LevelOrder,
        policy: MissingPolicy,
    ) -> Result<Self>
    where
        F: FnMut(usize, &str) -> Option<String>,
    {
        let mapped: Vec<Option<String>> = self
            .iter()
            .enumerate()
            .map(|(row, label)| label.and_then(|l| f(row, l)))
            .collect();
        let labels: Vec<Option<&str>> = mapped.iter().map(Option::as_deref).collect();

        let carried = match order {
            LevelOrder::Extend => self.levels.clone(),
            _ => LevelSet::empty(),
        };
        let keeps_order = matches!(order, LevelOrder::Explicit(_));
        debug!(rows = self.len(), ?order, "recoding categorical column");

        let mut rebuilt = Self::rebuild(&labels, order, &carried, policy)?;
        rebuilt.ordered = self.ordered && keeps_order;
        Ok(rebuilt)
    }

    /// Replaces labels per `mapping`; unmapped labels pass through.
    pub fn replace(&self, mapping: &[(&str, &str)], order: LevelOrder) -> Result<Self> {
        self.recode(
            |_, label| {
                let to = mapping
                    .iter()
                    .find(|(from, _)| *from == label)
                    .map_or(label, |(_, to)| *to);
                Some(to.to_string())
            },
            order,
        )
    }

    /// Concatenates two columns by label, never by raw code.
    ///
    /// Both columns are decoded and re-encoded against a reconciled level
    /// set. [`LevelOrder::Sorted`] is the sorted union of both level sets.
    /// [`LevelOrder::Extend`] keeps `self`'s order and appends the other
    /// column's unseen levels in its own order. [`LevelOrder::Explicit`]
    /// must cover every observed label.
    ///
    /// ```
    /// use u_factor::factor::{CategoricalColumn, LevelOrder};
    /// use u_factor::levels::LevelSet;
    ///
    /// let a = CategoricalColumn::with_levels(&["Joe", "Ted"], LevelSet::new(["Joe", "Ted"]).unwrap()).unwrap();
    /// let b = CategoricalColumn::with_levels(&["Anne"], LevelSet::new(["Anne"]).unwrap()).unwrap();
    /// let both = a.concatenate(&b, LevelOrder::Sorted).unwrap();
    /// assert_eq!(both.decode(), vec![Some("Joe"), Some("Ted"), Some("Anne")]);
    /// assert_eq!(both.levels().as_slice(), ["Anne", "Joe", "Ted"]);
    /// ```
    pub fn concatenate(&self, other: &CategoricalColumn, order: LevelOrder) -> Result<Self> {
        self.concatenate_with_policy(other, order, MissingPolicy::Reject)
    }

    /// Like [`concatenate`](Self::concatenate), with a policy for labels
    /// outside a [`LevelOrder::Explicit`] set.
    pub fn concatenate_with_policy(
        &self,
        other: &CategoricalColumn,
        order: LevelOrder,
        policy: MissingPolicy,
    ) -> Result<Self> {
        let labels: Vec<Option<&str>> = self.iter().chain(other.iter()).collect();
        let carried = match order {
            LevelOrder::Sorted => self.levels.union_sorted(&other.levels),
            _ => self.levels.extended(other.levels.iter()),
        };
        let keeps_order = matches!(order, LevelOrder::Explicit(_));
        debug!(
            left = self.len(),
            right = other.len(),
            ?order,
            "concatenating categorical columns"
        );

        let mut rebuilt = Self::rebuild(&labels, order, &carried, policy)?;
        rebuilt.ordered = self.ordered && keeps_order;
        Ok(rebuilt)
    }

    /// Appends labels, extending the level set with unseen labels.
    ///
    /// Existing levels keep their slots and order. New labels are appended
    /// in order of first appearance. `None` appends a missing observation.
    pub fn append_labels<S: AsRef<str>>(&self, labels: &[Option<S>]) -> Self {
        let before = self.levels.len();
        let extended = self
            .clone()
            .append_label_iter(labels.iter().map(|l| l.as_ref().map(|s| s.as_ref())));
        if extended.levels.len() > before {
            debug!(
                added = extended.levels.len() - before,
                "extended level set on append"
            );
        }
        extended
    }

    /// Selects rows by index, keeping every level.
    ///
    /// Levels whose observations are all left out remain with zero count.
    pub fn take(&self, rows: &[usize]) -> Result<Self> {
        let mut codes = Vec::with_capacity(rows.len());
        let mut validity = ValidityBitmap::empty();
        for &row in rows {
            if row >= self.len() {
                return Err(FactorError::RowOutOfRange {
                    index: row,
                    len: self.len(),
                });
            }
            codes.push(self.codes[row]);
            validity.push(self.validity.is_valid(row));
        }
        Ok(Self {
            levels: self.levels.clone(),
            codes,
            validity,
            ordered: self.ordered,
        })
    }

    /// Splits the column into its raw constituents.
    pub fn into_parts(self) -> CategoricalParts {
        CategoricalParts {
            codes: self.code_iter().collect(),
            ordered: self.ordered,
            levels: self.levels,
        }
    }
}

impl Default for CategoricalColumn {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<CategoricalParts> for CategoricalColumn {
    type Error = FactorError;

    fn try_from(parts: CategoricalParts) -> Result<Self> {
        let mut column = Self::from_codes(parts.levels, &parts.codes)?;
        column.ordered = parts.ordered;
        Ok(column)
    }
}

impl From<CategoricalColumn> for CategoricalParts {
    fn from(column: CategoricalColumn) -> Self {
        column.into_parts()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn levels(labels: &[&str]) -> LevelSet {
        LevelSet::new(labels.iter().copied()).unwrap()
    }

    fn sizes() -> CategoricalColumn {
        CategoricalColumn::with_levels(
            &["Medium", "Small", "Large", "Medium"],
            levels(&["Large", "Medium", "Small"]),
        )
        .unwrap()
    }

    // ── Construction ─────────────────────────────────────────────

    #[test]
    fn inferred_levels_are_sorted() {
        let col = CategoricalColumn::from_labels(&["Medium", "Small", "Large", "Medium"]);
        assert_eq!(col.levels().as_slice(), ["Large", "Medium", "Small"]);
        assert_eq!(col.raw_codes(), vec![Some(1), Some(2), Some(0), Some(1)]);
    }

    #[test]
    fn explicit_levels_used_verbatim() {
        let col = CategoricalColumn::with_levels(
            &["lo", "hi"],
            levels(&["hi", "mid", "lo"]),
        )
        .unwrap();
        assert_eq!(col.levels().as_slice(), ["hi", "mid", "lo"]);
        assert_eq!(col.raw_codes(), vec![Some(2), Some(0)]);
    }

    #[test]
    fn label_outside_closed_set() {
        let err = CategoricalColumn::with_levels(&["a", "z"], levels(&["a", "b"])).unwrap_err();
        assert_eq!(err, FactorError::LevelMismatch { label: "z".into() });

        let col = CategoricalColumn::create(
            &[Some("a"), Some("z")],
            Some(levels(&["a", "b"])),
            MissingPolicy::AsMissing,
        )
        .unwrap();
        assert_eq!(col.decode(), vec![Some("a"), None]);
        assert_eq!(col.n_levels(), 2);
    }

    #[test]
    fn empty_input_gives_empty_column() {
        let col = CategoricalColumn::from_labels::<&str>(&[]);
        assert!(col.is_empty());
        assert!(col.levels().is_empty());
        assert_eq!(col, CategoricalColumn::empty());
    }

    #[test]
    fn single_level_all_missing_is_valid() {
        let col = CategoricalColumn::create::<&str>(
            &[None, None, None],
            Some(levels(&["only"])),
            MissingPolicy::Reject,
        )
        .unwrap();
        assert_eq!(col.len(), 3);
        assert_eq!(col.missing_count(), 3);
        assert_eq!(col.n_levels(), 1);
        assert_eq!(col.decode(), vec![None, None, None]);
    }

    #[test]
    fn from_codes_checks_range() {
        let col = CategoricalColumn::from_codes(levels(&["a", "b"]), &[Some(1), None, Some(0)]).unwrap();
        assert_eq!(col.decode(), vec![Some("b"), None, Some("a")]);

        let err = CategoricalColumn::from_codes(levels(&["a", "b"]), &[Some(2)]).unwrap_err();
        assert_eq!(
            err,
            FactorError::IndexOutOfRange {
                code: 2,
                level_count: 2
            }
        );
    }

    #[test]
    fn get_out_of_bounds_is_none() {
        let col = sizes();
        assert_eq!(col.get(0), Some("Medium"));
        assert_eq!(col.get(4), None);
    }

    // ── Level operations ─────────────────────────────────────────

    #[test]
    fn rename_changes_only_that_level() {
        let col = sizes();
        let renamed = col.rename_level(1, "Mid").unwrap();
        assert_eq!(
            renamed.decode(),
            vec![Some("Mid"), Some("Small"), Some("Large"), Some("Mid")]
        );
        assert_eq!(renamed.raw_codes(), col.raw_codes());
        assert_eq!(renamed.levels().as_slice(), ["Large", "Mid", "Small"]);
    }

    #[test]
    fn rename_rejects_collision() {
        let err = sizes().rename_level(0, "Small").unwrap_err();
        assert_eq!(err, FactorError::DuplicateLevel { label: "Small".into() });
    }

    #[test]
    fn set_levels_recomputes_codes() {
        let col = sizes();
        let reordered = col.set_levels(levels(&["Small", "Medium", "Large", "Huge"])).unwrap();
        assert_eq!(reordered.decode(), col.decode());
        assert_eq!(reordered.raw_codes(), vec![Some(1), Some(0), Some(2), Some(1)]);
        assert_eq!(reordered.n_levels(), 4);
    }

    #[test]
    fn set_levels_missing_label_fails_or_maps_to_missing() {
        let col = sizes();
        let err = col.set_levels(levels(&["Small", "Medium"])).unwrap_err();
        assert_eq!(err, FactorError::LevelMismatch { label: "Large".into() });

        let narrowed = col
            .set_levels_with_policy(levels(&["Small", "Medium"]), MissingPolicy::AsMissing)
            .unwrap();
        assert_eq!(
            narrowed.decode(),
            vec![Some("Medium"), Some("Small"), None, Some("Medium")]
        );
    }

    #[test]
    fn relevel_moves_reference_first() {
        let col = sizes().relevel("Small").unwrap();
        assert_eq!(col.levels().as_slice(), ["Small", "Large", "Medium"]);
        assert_eq!(col.decode(), sizes().decode());
        assert!(matches!(
            sizes().relevel("Tiny"),
            Err(FactorError::UnknownLevel { .. })
        ));
    }

    #[test]
    fn sort_levels_is_explicit() {
        let col = CategoricalColumn::with_levels(&["b", "c", "a"], levels(&["c", "b", "a"])).unwrap();
        assert_eq!(col.levels().as_slice(), ["c", "b", "a"]);
        let sorted = col.sort_levels();
        assert_eq!(sorted.levels().as_slice(), ["a", "b", "c"]);
        assert_eq!(sorted.decode(), col.decode());
    }

    #[test]
    fn drop_unused_keeps_relative_order() {
        let col = CategoricalColumn::create(
            &[Some("d"), None, Some("b"), Some("d")],
            Some(levels(&["d", "c", "b", "a"])),
            MissingPolicy::Reject,
        )
        .unwrap();
        let dropped = col.drop_unused_levels();
        assert_eq!(dropped.levels().as_slice(), ["d", "b"]);
        assert_eq!(dropped.decode(), col.decode());
        assert_eq!(dropped.drop_unused_levels(), dropped);
    }

    // ── Rebuilds ─────────────────────────────────────────────────

    #[test]
    fn concatenate_decodes_never_reinterprets_codes() {
        let a = CategoricalColumn::with_levels(
            &["Joe", "Ted", "Fred", "Joe"],
            levels(&["Joe", "Ted", "Fred"]),
        )
        .unwrap();
        let b = CategoricalColumn::with_levels(
            &["Anne", "Louise", "Louise", "Lucy", "Louise"],
            levels(&["Anne", "Louise", "Lucy"]),
        )
        .unwrap();

        let both = a.concatenate(&b, LevelOrder::Sorted).unwrap();
        let expected: Vec<Option<&str>> = a.decode().into_iter().chain(b.decode()).collect();
        assert_eq!(both.len(), 9);
        assert_eq!(both.decode(), expected);
        assert_eq!(
            both.levels().as_slice(),
            ["Anne", "Fred", "Joe", "Louise", "Lucy", "Ted"]
        );

        let extended = a.concatenate(&b, LevelOrder::Extend).unwrap();
        assert_eq!(extended.decode(), expected);
        assert_eq!(
            extended.levels().as_slice(),
            ["Joe", "Ted", "Fred", "Anne", "Louise", "Lucy"]
        );
    }

    #[test]
    fn concatenate_keeps_zero_count_levels_in_union() {
        let a = CategoricalColumn::with_levels(&["x"], levels(&["x", "unused"])).unwrap();
        let b = CategoricalColumn::from_labels(&["y"]);
        let both = a.concatenate(&b, LevelOrder::Sorted).unwrap();
        assert_eq!(both.levels().as_slice(), ["unused", "x", "y"]);

        let seen = a.concatenate(&b, LevelOrder::Appearance).unwrap();
        assert_eq!(seen.levels().as_slice(), ["x", "y"]);
    }

    #[test]
    fn concatenate_explicit_must_cover() {
        let a = CategoricalColumn::from_labels(&["x"]);
        let b = CategoricalColumn::from_labels(&["y"]);
        let err = a
            .concatenate(&b, LevelOrder::Explicit(levels(&["x"])))
            .unwrap_err();
        assert_eq!(err, FactorError::LevelMismatch { label: "y".into() });

        let ok = a
            .concatenate(&b, LevelOrder::Explicit(levels(&["y", "x"])))
            .unwrap();
        assert_eq!(ok.raw_codes(), vec![Some(1), Some(0)]);

        let lenient = a
            .concatenate_with_policy(
                &b,
                LevelOrder::Explicit(levels(&["x"])),
                MissingPolicy::AsMissing,
            )
            .unwrap();
        assert_eq!(lenient.decode(), vec![Some("x"), None]);
        assert_eq!(lenient.levels().as_slice(), ["x"]);
    }

    #[test]
    fn recode_into_closed_set_follows_policy() {
        let col = CategoricalColumn::from_labels(&["lo", "mid", "hi"]);
        let squash = |_: usize, label: &str| Some(label.to_uppercase());
        let closed = || LevelOrder::Explicit(levels(&["HI", "LO"]));

        let err = col.recode(squash, closed()).unwrap_err();
        assert_eq!(err, FactorError::LevelMismatch { label: "MID".into() });

        let lenient = col
            .recode_with_policy(squash, closed(), MissingPolicy::AsMissing)
            .unwrap();
        assert_eq!(lenient.decode(), vec![Some("LO"), None, Some("HI")]);
        assert_eq!(lenient.missing_count(), 1);
    }

    #[test]
    fn recode_partial_and_missing() {
        let col = sizes();
        let recoded = col
            .recode(
                |row, label| match (row, label) {
                    (3, _) => None,
                    (_, "Small") => Some("Tiny".into()),
                    (_, other) => Some(other.into()),
                },
                LevelOrder::Sorted,
            )
            .unwrap();
        assert_eq!(
            recoded.decode(),
            vec![Some("Medium"), Some("Tiny"), Some("Large"), None]
        );
        assert_eq!(recoded.levels().as_slice(), ["Large", "Medium", "Tiny"]);
    }

    #[test]
    fn replace_merges_levels() {
        let col = CategoricalColumn::from_labels(&["Fred", "Ted", "Joe"]);
        let merged = col
            .replace(&[("Fred", "Joe"), ("Ted", "Joe")], LevelOrder::Appearance)
            .unwrap();
        assert_eq!(merged.levels().as_slice(), ["Joe"]);
        assert_eq!(merged.decode(), vec![Some("Joe"); 3]);

        let sticky = col.replace(&[("Fred", "Joe")], LevelOrder::Extend).unwrap();
        assert_eq!(sticky.levels().as_slice(), ["Fred", "Joe", "Ted"]);
    }

    #[test]
    fn append_labels_extends_in_place_order() {
        let col = CategoricalColumn::with_levels(&["b"], levels(&["b", "a"])).unwrap();
        let appended = col.append_labels(&[Some("c"), None, Some("a"), Some("d"), Some("c")]);
        assert_eq!(appended.levels().as_slice(), ["b", "a", "c", "d"]);
        assert_eq!(
            appended.decode(),
            vec![Some("b"), Some("c"), None, Some("a"), Some("d"), Some("c")]
        );
    }

    #[test]
    fn take_keeps_levels_sticky() {
        let col = sizes();
        let subset = col.take(&[0, 3]).unwrap();
        assert_eq!(subset.decode(), vec![Some("Medium"), Some("Medium")]);
        assert_eq!(subset.levels(), col.levels());
        assert!(matches!(
            col.take(&[4]),
            Err(FactorError::RowOutOfRange { index: 4, len: 4 })
        ));
    }

    // ── Numeric interpretation ───────────────────────────────────

    #[test]
    fn as_numeric_returns_label_values() {
        let labels = ["1", "4", "8", "10", "1", "8", "8", "8", "10"];
        let col = CategoricalColumn::from_labels(&labels);
        let values: Vec<f64> = col.as_numeric().unwrap().into_iter().flatten().collect();
        assert_eq!(values, vec![1.0, 4.0, 8.0, 10.0, 1.0, 8.0, 8.0, 8.0, 10.0]);

        let codes: Vec<u32> = col.raw_codes().into_iter().flatten().collect();
        assert_eq!(codes, vec![0, 2, 3, 1, 0, 3, 3, 3, 1]);
    }

    #[test]
    fn as_numeric_rejects_text_levels() {
        let col = CategoricalColumn::with_levels(&["1"], levels(&["1", "two"])).unwrap();
        let err = col.as_numeric().unwrap_err();
        assert_eq!(err, FactorError::NonNumericLevel { label: "two".into() });
    }

    #[test]
    fn as_numeric_keeps_missing() {
        let col = CategoricalColumn::create(&[Some("2.5"), None], None, MissingPolicy::Reject).unwrap();
        assert_eq!(col.as_numeric().unwrap(), vec![Some(2.5), None]);
    }

    // ── Ordered columns ──────────────────────────────────────────

    #[test]
    fn ordered_min_max_follow_level_order() {
        let col = CategoricalColumn::with_levels(
            &["mid", "high", "mid"],
            levels(&["low", "mid", "high"]),
        )
        .unwrap();
        assert_eq!(col.max_level(), None);

        let ordered = col.into_ordered();
        assert_eq!(ordered.min_level(), Some("mid"));
        assert_eq!(ordered.max_level(), Some("high"));
        assert!(ordered.rename_level(0, "lowest").unwrap().is_ordered());
        assert!(!ordered.recode(|_, l| Some(l.into()), LevelOrder::Sorted).unwrap().is_ordered());
    }

    // ── Serde ────────────────────────────────────────────────────

    #[test]
    fn serde_round_trip_and_validation() {
        let col = CategoricalColumn::create(&[Some("b"), None, Some("a")], None, MissingPolicy::Reject)
            .unwrap()
            .into_ordered();
        let json = serde_json::to_string(&col).unwrap();
        assert_eq!(json, r#"{"levels":["a","b"],"codes":[1,null,0],"ordered":true}"#);
        let back: CategoricalColumn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, col);

        let bad = r#"{"levels":["a"],"codes":[3]}"#;
        assert!(serde_json::from_str::<CategoricalColumn>(bad).is_err());
    }

    // ── Properties ───────────────────────────────────────────────

    const ALPHABET: &[&str] = &["ant", "bee", "cat", "dog", "eel", "fox"];

    fn arb_labels() -> impl Strategy<Value = Vec<Option<&'static str>>> {
        prop::collection::vec(
            prop::option::weighted(0.85, prop::sample::select(ALPHABET)),
            0..40,
        )
    }

    fn arb_column() -> impl Strategy<Value = CategoricalColumn> {
        (arb_labels(), prop::sample::subsequence(ALPHABET, 0..=ALPHABET.len()))
            .prop_flat_map(|(labels, extra)| {
                let base = CategoricalColumn::create(&labels, None, MissingPolicy::Reject)
                    .unwrap();
                let all: Vec<String> = base
                    .levels()
                    .iter()
                    .chain(extra.iter().copied())
                    .collect::<std::collections::BTreeSet<_>>()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                Just(all).prop_shuffle().prop_map(move |order| {
                    base.set_levels(LevelSet::new(order).unwrap()).unwrap()
                })
            })
    }

    proptest! {
        #[test]
        fn prop_decode_create_round_trip(col in arb_column()) {
            let again = CategoricalColumn::create(
                &col.decode(),
                Some(col.levels().clone()),
                MissingPolicy::Reject,
            ).unwrap();
            prop_assert_eq!(again.raw_codes(), col.raw_codes());
        }

        #[test]
        fn prop_drop_unused_idempotent(col in arb_column()) {
            let once = col.drop_unused_levels();
            prop_assert_eq!(once.drop_unused_levels(), once.clone());
            prop_assert_eq!(once.decode(), col.decode());
        }

        #[test]
        fn prop_set_levels_superset_preserves_labels(
            col in arb_column(),
            order in Just(ALPHABET.to_vec()).prop_shuffle(),
        ) {
            let rebuilt = col.set_levels(LevelSet::new(order).unwrap()).unwrap();
            prop_assert_eq!(rebuilt.decode(), col.decode());
        }

        #[test]
        fn prop_rename_touches_only_target(col in arb_column(), slot in 0usize..6) {
            prop_assume!(slot < col.n_levels());
            let target = col.levels().get(slot as u32).unwrap().to_string();
            let renamed = col.rename_level(slot, "zzz").unwrap();
            for (before, after) in col.decode().into_iter().zip(renamed.decode()) {
                if before == Some(target.as_str()) {
                    prop_assert_eq!(after, Some("zzz"));
                } else {
                    prop_assert_eq!(after, before);
                }
            }
        }

        #[test]
        fn prop_concatenate_is_label_concatenation(a in arb_column(), b in arb_column()) {
            let both = a.concatenate(&b, LevelOrder::Sorted).unwrap();
            let expected: Vec<Option<&str>> = a.decode().into_iter().chain(b.decode()).collect();
            prop_assert_eq!(both.decode(), expected);
        }
    }
}
