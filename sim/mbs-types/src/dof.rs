//! Degree-of-freedom bookkeeping.

use std::ops::Range;

use nalgebra::{DVector, DVectorView};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Contiguous range of global indices owned by one subsystem or element.
///
/// Used for generalized coordinates (`qDOF`), generalized velocities
/// (`uDOF`) and multiplier blocks alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DofRange {
    /// First global index.
    pub start: usize,
    /// Number of indices.
    pub len: usize,
}

impl DofRange {
    /// Create a range of `len` indices starting at `start`.
    #[must_use]
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// One past the last index.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    /// Number of indices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the range is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Global indices as a `Range`.
    #[must_use]
    pub const fn indices(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// Global indices collected into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<usize> {
        self.indices().collect()
    }

    /// View of the entries of a global vector owned by this range.
    #[must_use]
    pub fn slice<'a>(&self, v: &'a DVector<f64>) -> DVectorView<'a, f64> {
        v.rows(self.start, self.len)
    }

    /// Copy of the entries of a global vector owned by this range.
    #[must_use]
    pub fn gather(&self, v: &DVector<f64>) -> DVector<f64> {
        self.slice(v).into_owned()
    }

    /// Write a local vector into its slot of a global vector.
    pub fn scatter(&self, local: &DVector<f64>, global: &mut DVector<f64>) {
        global.rows_mut(self.start, self.len).copy_from(local);
    }

    /// Add a local vector into its slot of a global vector.
    pub fn scatter_add(&self, local: &DVector<f64>, global: &mut DVector<f64>) {
        let mut rows = global.rows_mut(self.start, self.len);
        rows += local;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_range_indices() {
        let r = DofRange::new(2, 3);
        assert_eq!(r.end(), 5);
        assert_eq!(r.to_vec(), vec![2, 3, 4]);
        assert!(!r.is_empty());
        assert!(DofRange::new(4, 0).is_empty());
    }

    #[test]
    fn test_gather_scatter() {
        let r = DofRange::new(1, 2);
        let mut global = DVector::from_vec(vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(r.gather(&global), DVector::from_vec(vec![1.0, 2.0]));

        r.scatter(&DVector::from_vec(vec![5.0, 6.0]), &mut global);
        assert_eq!(global, DVector::from_vec(vec![0.0, 5.0, 6.0, 3.0]));

        r.scatter_add(&DVector::from_vec(vec![1.0, 1.0]), &mut global);
        assert_eq!(global, DVector::from_vec(vec![0.0, 6.0, 7.0, 3.0]));
    }
}
