use rayon::prelude::*;

use crate::TensorFloat;
use crate::ops::SgdParams;
use crate::tensors::Tensor;

/// Performs one fused momentum SGD step in place.
///
/// # Formula
///
/// ```text
/// g   = clip(rescale_grad * grad, clip_gradient)
/// mom = momentum * mom - lr * wd * weight - lr * g
/// w   = w + mom
/// ```
///
/// # Panics
/// Panics if the three tensors differ in shape.
pub fn sgd_mom_update(
    weight: &mut Tensor<TensorFloat>,
    grad: &Tensor<TensorFloat>,
    mom: &mut Tensor<TensorFloat>,
    p: &SgdParams,
) {
    assert_eq!(weight.shape, grad.shape, "sgd_mom_update shape mismatch");
    assert_eq!(weight.shape, mom.shape, "sgd_mom_update shape mismatch");

    weight
        .data
        .par_iter_mut()
        .zip(mom.data.par_iter_mut())
        .zip(grad.data.par_iter())
        .for_each(|((w, m), &g)| {
            *m = p.momentum * *m - p.lr * p.wd * *w - p.lr * p.scaled_grad(g);
            *w += *m;
        });
}

/// Performs one plain SGD step in place.
///
/// # Formula
///
/// ```text
/// w = w - lr * (clip(rescale_grad * grad, clip_gradient) + wd * w)
/// ```
///
/// # Panics
/// Panics if `weight` and `grad` differ in shape.
pub fn sgd_update(weight: &mut Tensor<TensorFloat>, grad: &Tensor<TensorFloat>, p: &SgdParams) {
    assert_eq!(weight.shape, grad.shape, "sgd_update shape mismatch");

    weight
        .data
        .par_iter_mut()
        .zip(grad.data.par_iter())
        .for_each(|(w, &g)| {
            *w -= p.lr * (p.scaled_grad(g) + p.wd * *w);
        });
}
