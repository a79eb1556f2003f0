//! Ordered, deduplicated level vocabularies.
//!
//! A [`LevelSet`] is the closed vocabulary of a categorical column. Its
//! order is both the code assignment (slot `i` is code `i`) and the report
//! order used by tallies and summaries. Construction never sorts unless the
//! caller asks for it through [`LevelSet::sorted`].
//!
//! ```
//! use u_factor::levels::LevelSet;
//!
//! let sizes = LevelSet::new(["Large", "Medium", "Small"]).unwrap();
//! assert_eq!(sizes.position("Medium"), Some(1));
//! assert_eq!(sizes.get(2), Some("Small"));
//!
//! assert!(LevelSet::new(["a", "b", "a"]).is_err());
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{FactorError, Result};

/// Ordered set of unique level labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LevelSet {
    labels: Vec<String>,
    index: HashMap<String, u32>,
}

impl LevelSet {
    /// Builds a level set in the given order.
    ///
    /// Fails with [`FactorError::DuplicateLevel`] if a label repeats.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::empty();
        for label in labels {
            let label = label.into();
            if set.index.contains_key(&label) {
                return Err(FactorError::DuplicateLevel { label });
            }
            set.push_unchecked(label);
        }
        Ok(set)
    }

    /// Creates a level set with no levels.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the sorted set of distinct labels.
    pub fn sorted<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = labels.into_iter().collect();
        let mut set = Self::empty();
        for label in distinct {
            set.push_unchecked(label.to_string());
        }
        set
    }

    /// Builds the set of distinct labels in order of first appearance.
    pub fn from_appearance<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::empty().extended(labels)
    }

    fn push_unchecked(&mut self, label: String) -> u32 {
        let code = self.labels.len() as u32;
        self.index.insert(label.clone(), code);
        self.labels.push(label);
        code
    }

    /// Returns the slot of `label`, appending it first if unseen.
    pub(crate) fn intern(&mut self, label: &str) -> u32 {
        match self.position(label) {
            Some(code) => code,
            None => self.push_unchecked(label.to_string()),
        }
    }

    /// Sorts the labels, returning the new set and an old-slot to new-slot map.
    pub(crate) fn sorted_with_mapping(&self) -> (LevelSet, Vec<u32>) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.labels[a].cmp(&self.labels[b]));

        let mut mapping = vec![0u32; self.len()];
        let mut set = Self::empty();
        for old in order {
            mapping[old] = set.push_unchecked(self.labels[old].clone());
        }
        (set, mapping)
    }

    /// Number of levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if there are no levels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label stored at slot `code`.
    #[inline]
    pub fn get(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    /// Slot holding `label`.
    #[inline]
    pub fn position(&self, label: &str) -> Option<u32> {
        self.index.get(label).copied()
    }

    /// Returns `true` if `label` is one of the levels.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Iterates labels in level order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.labels.iter().map(String::as_str)
    }

    /// Labels in level order.
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// Returns a copy with slot `index` relabeled.
    ///
    /// Renaming a slot to its current label is a no-op.
    pub fn with_renamed(&self, index: usize, new_label: impl Into<String>) -> Result<Self> {
        let new_label = new_label.into();
        let Some(old_label) = self.labels.get(index) else {
            return Err(FactorError::LevelSlotOutOfRange {
                index,
                level_count: self.len(),
            });
        };
        match self.position(&new_label) {
            Some(slot) if slot as usize == index => return Ok(self.clone()),
            Some(_) => return Err(FactorError::DuplicateLevel { label: new_label }),
            None => {}
        }

        let mut renamed = self.clone();
        renamed.index.remove(old_label);
        renamed.index.insert(new_label.clone(), index as u32);
        renamed.labels[index] = new_label;
        Ok(renamed)
    }

    /// Returns a copy with every unseen label appended in first-appearance order.
    ///
    /// Existing levels keep their slots.
    pub fn extended<'a, I>(&self, labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = self.clone();
        for label in labels {
            if !set.contains(label) {
                set.push_unchecked(label.to_string());
            }
        }
        set
    }

    /// Sorted union of two level sets.
    pub fn union_sorted(&self, other: &LevelSet) -> Self {
        Self::sorted(self.iter().chain(other.iter()))
    }

    /// Keeps the levels whose slot satisfies `keep`, preserving relative order.
    pub fn retained(&self, mut keep: impl FnMut(u32) -> bool) -> Self {
        let mut set = Self::empty();
        for (code, label) in self.labels.iter().enumerate() {
            if keep(code as u32) {
                set.push_unchecked(label.clone());
            }
        }
        set
    }

    /// Returns a copy with `label` moved to slot 0.
    pub fn with_front(&self, label: &str) -> Result<Self> {
        if !self.contains(label) {
            return Err(FactorError::UnknownLevel {
                label: label.to_string(),
            });
        }
        let mut set = Self::empty();
        set.push_unchecked(label.to_string());
        Ok(set.extended(self.iter()))
    }
}

impl TryFrom<Vec<String>> for LevelSet {
    type Error = FactorError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LevelSet> for Vec<String> {
    fn from(set: LevelSet) -> Self {
        set.labels
    }
}
