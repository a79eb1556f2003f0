//! Out-of-band missing-value tracking.
//!
//! Every column in this crate pairs its dense storage with a
//! [`ValidityBitmap`]. A cleared bit marks the observation as missing; the
//! dense slot behind it holds a placeholder that is never read. For
//! categorical columns this keeps "missing" separate from every level,
//! including levels with zero occurrences.

/// Bit-packed validity bitmap using `Vec<u64>`, one bit per row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidityBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl ValidityBitmap {
    /// Creates a bitmap where all `len` positions are valid.
    pub fn all_valid(len: usize) -> Self {
        let n_words = len.div_ceil(64);
        let mut bits = vec![u64::MAX; n_words];
        let trailing = len % 64;
        if trailing != 0 && n_words > 0 {
            bits[n_words - 1] = (1u64 << trailing) - 1;
        }
        Self { bits, len }
    }

    /// Creates a bitmap where all `len` positions are missing.
    pub fn all_invalid(len: usize) -> Self {
        Self {
            bits: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    /// Creates an empty bitmap with no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the value at `idx` is present.
    ///
    /// Positions past the end are reported as missing.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (word, bit) = (idx / 64, idx % 64);
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Marks position `idx` as missing.
    #[inline]
    pub fn set_invalid(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        let (word, bit) = (idx / 64, idx % 64);
        self.bits[word] &= !(1u64 << bit);
    }

    /// Appends a new position.
    pub fn push(&mut self, valid: bool) {
        let idx = self.len;
        self.len += 1;
        let (word, bit) = (idx / 64, idx % 64);
        if word >= self.bits.len() {
            self.bits.push(0);
        }
        if valid {
            self.bits[word] |= 1u64 << bit;
        }
    }

    /// Appends every position of `other` after the positions of `self`.
    pub fn extend_from(&mut self, other: &ValidityBitmap) {
        for idx in 0..other.len {
            self.push(other.is_valid(idx));
        }
    }

    /// Returns the total number of tracked positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bitmap tracks zero positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counts the number of missing positions.
    pub fn null_count(&self) -> usize {
        let valid_count: usize = self.bits.iter().map(|w| w.count_ones() as usize).sum();
        self.len - valid_count
    }

    /// Counts the number of present positions.
    pub fn valid_count(&self) -> usize {
        self.len - self.null_count()
    }

    /// Returns an iterator over indices of present positions.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.is_valid(i))
    }
}

impl FromIterator<bool> for ValidityBitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bitmap = Self::empty();
        for valid in iter {
            bitmap.push(valid);
        }
        bitmap
    }
}
