use std::ops::Index;

/// One boolean per row of a sheet; `true` keeps the row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowMask {
    bits: Vec<bool>,
}

impl RowMask {
    /// Mask selecting every row
    #[must_use]
    pub fn all(len: usize) -> Self {
        RowMask {
            bits: vec![true; len],
        }
    }

    /// Mask selecting no row
    #[must_use]
    pub fn none(len: usize) -> Self {
        RowMask {
            bits: vec![false; len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// True when at least one row is selected
    #[must_use]
    pub fn any(&self) -> bool {
        self.bits.iter().any(|b| *b)
    }

    /// Number of selected rows
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    /// Element-wise AND. Both masks must describe the same sheet.
    #[must_use]
    pub fn and(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a && b)
    }

    /// Element-wise OR.
    #[must_use]
    pub fn or(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a || b)
    }

    /// Element-wise `self AND NOT other`.
    #[must_use]
    pub fn and_not(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a && !b)
    }

    /// Element-wise NOT.
    #[must_use]
    pub fn invert(&self) -> RowMask {
        RowMask {
            bits: self.bits.iter().map(|b| !b).collect(),
        }
    }

    fn zip_with<F>(&self, other: &RowMask, f: F) -> RowMask
    where
        F: Fn(bool, bool) -> bool,
    {
        debug_assert_eq!(self.len(), other.len());
        RowMask {
            bits: self
                .bits
                .iter()
                .zip(other.bits.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        }
    }
}

impl From<Vec<bool>> for RowMask {
    fn from(bits: Vec<bool>) -> Self {
        RowMask { bits }
    }
}

impl FromIterator<bool> for RowMask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        RowMask {
            bits: iter.into_iter().collect(),
        }
    }
}

impl Index<usize> for RowMask {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        &self.bits[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinators() {
        let a = RowMask::from(vec![true, true, false, false]);
        let b = RowMask::from(vec![true, false, true, false]);

        assert_eq!(a.and(&b), RowMask::from(vec![true, false, false, false]));
        assert_eq!(a.or(&b), RowMask::from(vec![true, true, true, false]));
        assert_eq!(a.and_not(&b), RowMask::from(vec![false, true, false, false]));
        assert_eq!(a.invert().count(), 2);
    }

    #[test]
    fn test_all_none() {
        assert_eq!(RowMask::all(3).count(), 3);
        assert!(!RowMask::none(3).any());
        assert!(!RowMask::none(0).any());
    }
}
