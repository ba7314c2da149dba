//! Utilities to approximate equality of floating point values.
//!
//! Differences are measured relative to the larger magnitude once it exceeds one,
//! so large activations and weights are compared as fairly as small ones.

/// The max epsilon accepted on `f32`s.
pub const F32_MAX_ERROR: f32 = 1e-3;

/// The expected minimum epsilon accepted on `f32`s.
pub const F32_AVG_ERROR: f32 = 1e-5;

/// The best expected epsilon accepted on `f32`s.
pub const F32_MIN_ERROR: f32 = 1e-6;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted on `f64`s.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-13;

/// The approximated equality enumerated.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// Checks the relative distance based off epsilon.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Enumerates the equality of `self`
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

macro_rules! impl_relative_eq {
    ($t:ty, $min:expr, $avg:expr, $max:expr) => {
        impl RelativeEq<Self> for $t {
            fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
                let scale = self.abs().max(rhs.abs()).max(1.0);
                let dif = (self - rhs).abs() / scale;

                if dif < $min {
                    ApproxEquality::Precise
                } else if dif < $avg {
                    ApproxEquality::Partial
                } else if dif < $max {
                    ApproxEquality::Relative
                } else {
                    // NaN lands here too
                    ApproxEquality::Scarce
                }
            }
        }
    };
}

impl_relative_eq!(f32, F32_MIN_ERROR, F32_AVG_ERROR, F32_MAX_ERROR);
impl_relative_eq!(f64, F64_MIN_ERROR, F64_AVG_ERROR, F64_MAX_ERROR);

impl<T: RelativeEq<U>, U> RelativeEq<[U]> for [T] {
    /// The worst rating over all element pairs; length mismatch is [`ApproxEquality::Scarce`].
    fn approx_eq(&self, rhs: &[U]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut eq = ApproxEquality::Precise;
        for (t_val, u_val) in self.iter().zip(rhs) {
            eq = eq.max(t_val.approx_eq(u_val));
            if eq == ApproxEquality::Scarce {
                break;
            }
        }
        eq
    }
}

/// Approximates equality based off the relative difference.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) == ApproxEquality::Precise
}

/// Like [`approx_eq`], accepting anything up to `tolerance`.
pub fn approx_within<A: RelativeEq<B> + ?Sized, B: ?Sized>(
    a: &A,
    b: &B,
    tolerance: ApproxEquality,
) -> bool {
    a.approx_eq(b) <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_with_magnitude() {
        assert!(approx_eq(&29.7f32, &(30.0f32 - 0.3)));
        assert!(approx_eq(&1.0e6f32, &(1.0e6f32 + 0.5)));
        assert!(!approx_eq(&0.0f32, &1e-3));
    }

    #[test]
    fn slices_take_the_worst_rating() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [1.0f32, 2.000_01, 3.0];
        assert_eq!(a[..].approx_eq(&b[..]), ApproxEquality::Partial);
        assert!(approx_within(&a[..], &b[..], ApproxEquality::Partial));
        assert!(!approx_eq(&a[..], &b[..2]));
    }

    #[test]
    fn nan_is_never_equal() {
        assert_eq!(f64::NAN.approx_eq(&f64::NAN), ApproxEquality::Scarce);
    }
}
