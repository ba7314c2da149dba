//! Operation Dispatch Layer
//!
//! This module selects the backend for each kernel call from the executor's
//! [`Backend`].
//!
//! Each function tries the GPU implementation first when `Backend::Wgpu` is
//! selected and the `wgpu` feature is compiled, and falls back to the CPU
//! kernel whenever the GPU declines the call.
//!
//! # Design Highlights
//! - **Pluggable**: Backends are optional and modular
//! - **Minimal overhead**: Function returns immediately upon match
//! - **Fallback logic**: Safe and deterministic fallback to CPU

use crate::TensorFloat;
use crate::backend::Backend;
use crate::ops::{ActType, SgdParams};
use crate::tensors::Tensor;

/// Element-wise activation forward pass.
#[must_use]
pub fn activation(
    backend: Backend,
    act: ActType,
    input: &Tensor<TensorFloat>,
) -> Tensor<TensorFloat> {
    match backend {
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                if let Some(out) = super::wgpu::wgpu_activation(act, input) {
                    return out;
                }
            }
        }
        Backend::Cpu => {}
    }

    super::cpu::activation(act, input)
}

/// Fused momentum SGD step, updating `weight` and `mom` in place.
pub fn sgd_mom_update(
    backend: Backend,
    weight: &mut Tensor<TensorFloat>,
    grad: &Tensor<TensorFloat>,
    mom: &mut Tensor<TensorFloat>,
    params: &SgdParams,
) {
    match backend {
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                if super::wgpu::wgpu_sgd_mom_update(weight, grad, mom, params) {
                    return;
                }
            }
        }
        Backend::Cpu => {}
    }

    super::cpu::sgd_mom_update(weight, grad, mom, params);
}

/// Plain SGD step, updating `weight` in place. CPU only.
pub fn sgd_update(
    _backend: Backend,
    weight: &mut Tensor<TensorFloat>,
    grad: &Tensor<TensorFloat>,
    params: &SgdParams,
) {
    super::cpu::sgd_update(weight, grad, params);
}

/// `x · Wᵀ (+ b)` over an `m×k` data matrix and an `n×k` weight. CPU only.
#[must_use]
pub fn fully_connected(
    _backend: Backend,
    data: &[TensorFloat],
    weight: &[TensorFloat],
    bias: Option<&[TensorFloat]>,
    m: usize,
    k: usize,
    n: usize,
) -> Vec<TensorFloat> {
    let mut out = super::cpu::matmul_nt(data, weight, m, k, n);
    if let Some(bias) = bias {
        assert_eq!(bias.len(), n, "bias length mismatch");
        if n > 0 {
            for row in out.chunks_mut(n) {
                row.iter_mut().zip(bias).for_each(|(y, b)| *y += b);
            }
        }
    }
    out
}
