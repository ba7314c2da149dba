//! Core tensor data structures.
//!
//! # Core Tensor Utilities
//!
//! This module defines how tensors are represented while operators run over them.
//!
//! It supports:
//! - N-dimensional [`Shape`]s with element counts and a compact `(a,b,c)` display
//! - Row-major [`Tensor`]s whose data length is checked against their shape
//! - Seeded random fills used for operator inputs and output gradients
//! - The `tensor!` macro for literal tensors in tests and docs
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting, slicing, or views
//!
//! ## Example
//!
//! ```rust
//! use briny_opbench::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape.dims(), &[2, 3]);
//! assert_eq!(t.shape.to_string(), "(2,3)");
//! ```

use core::fmt;

use rand::Rng;

use crate::TensorFloat;
use crate::error::{OpError, Result};

/// Dimension sizes of a tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Creates a shape from its dimensions.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements; a 0-d shape holds one.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// The dimension sizes.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Views the shape as a matrix of `(first axis, everything else)`.
    ///
    /// A 0-d shape is viewed as `(1, 1)`.
    #[must_use]
    pub fn flat_2d(&self) -> (usize, usize) {
        match self.0.split_first() {
            Some((&rows, rest)) => (rows, rest.iter().product()),
            None => (1, 1),
        }
    }

    /// Views the shape as a matrix of `(everything else, last axis)`.
    ///
    /// A 0-d shape is viewed as `(1, 1)`.
    #[must_use]
    pub fn flat_last(&self) -> (usize, usize) {
        match self.0.split_last() {
            Some((&cols, rest)) => (rest.iter().product(), cols),
            None => (1, 1),
        }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str(")")
    }
}

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `(2,3)` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Shape,
    pub data: Vec<T>,
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Shape>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.size(),
            data.len(),
            "shape {} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Fallible version of [`Tensor::new`].
    ///
    /// # Errors
    /// [`OpError::InvalidShape`] if the data length does not match the shape.
    pub fn try_new(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        if shape.size() != data.len() {
            return Err(OpError::InvalidShape {
                shape: shape.to_string(),
                reason: format!("holds {} elements, data has {}", shape.size(), data.len()),
            });
        }
        Ok(Self { shape, data })
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Same data under a different shape with the same element count.
    ///
    /// # Panics
    /// Panics if the element counts differ.
    #[must_use]
    pub fn reshaped(self, shape: impl Into<Shape>) -> Self {
        Self::new(shape, self.data)
    }
}

impl<T: Clone + Default> Tensor<T> {
    /// A tensor of the given shape filled with `T::default()`.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let data = vec![T::default(); shape.size()];
        Self { shape, data }
    }
}

impl Tensor<TensorFloat> {
    /// A tensor filled with uniform samples from `[-1, 1)`.
    pub fn random<R: Rng + ?Sized>(shape: impl Into<Shape>, rng: &mut R) -> Self {
        let shape = shape.into();
        let data = (0..shape.size()).map(|_| rng.random_range(-1.0..1.0)).collect();
        Self { shape, data }
    }

    /// Overwrites every element with a fresh uniform sample from `[-1, 1)`.
    pub fn fill_random<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for x in &mut self.data {
            *x = rng.random_range(-1.0..1.0);
        }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use briny_opbench::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape.dims(), &[2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( [ $($row:tt)* ] ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!([ $($row)* ]) ),+ ];
        let first_shape = children[0].shape.clone();
        assert!(children.iter().all(|c| c.shape == first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape.dims());
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    ([ $( $x:expr ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn shape_display_and_size() {
        let s = Shape::from([20, 3, 128, 128]);
        assert_eq!(s.to_string(), "(20,3,128,128)");
        assert_eq!(s.size(), 20 * 3 * 128 * 128);
        assert_eq!(s.flat_2d(), (20, 3 * 128 * 128));
        assert_eq!(s.flat_last(), (20 * 3 * 128, 128));
        assert_eq!(Shape::default().size(), 1);
        assert_eq!(Shape::default().to_string(), "()");
    }

    #[test]
    #[should_panic(expected = "incompatible")]
    fn new_panics_on_mismatch() {
        let _ = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn try_new_reports_mismatch() {
        let err = Tensor::try_new(vec![2, 2], vec![1.0f32; 3]).unwrap_err();
        assert!(matches!(err, OpError::InvalidShape { .. }));
    }

    #[test]
    fn random_is_seeded_and_bounded() {
        let a = Tensor::random([4, 4], &mut StdRng::seed_from_u64(7));
        let b = Tensor::random([4, 4], &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.data.iter().all(|x| (-1.0..1.0).contains(x)));
    }

    #[test]
    fn tensor_macro_builds_nested_shapes() {
        let t = tensor!([[[1.0, 2.0]], [[3.0, 4.0]]]);
        assert_eq!(t.shape.dims(), &[2, 1, 2]);
        assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn tensor_macro_accepts_negative_elements() {
        let row = tensor!([-1.0, 2.0, -0.5]);
        assert_eq!(row.shape.dims(), &[3]);
        assert_eq!(row.data, vec![-1.0, 2.0, -0.5]);

        let m = tensor!([[-1.0, 2.0], [3.0, -4.0],]);
        assert_eq!(m.shape.dims(), &[2, 2]);
        assert_eq!(m.data, vec![-1.0, 2.0, 3.0, -4.0]);

        let s = tensor!(-2.5);
        assert!(s.shape.dims().is_empty());
        assert_eq!(s.data, vec![-2.5]);
    }
}
