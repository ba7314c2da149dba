use rayon::prelude::*;

use crate::TensorFloat;
use crate::ops::ActType;
use crate::tensors::Tensor;

/// Inputs above this make `e^x` dominate `ln(1 + e^x)` in single precision.
const SOFTRELU_LINEAR_CUTOFF: TensorFloat = 20.0;

#[inline]
fn forward_one(act: ActType, x: TensorFloat) -> TensorFloat {
    match act {
        ActType::Relu => x.max(0.0),
        ActType::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        ActType::Tanh => x.tanh(),
        ActType::SoftRelu => {
            if x > SOFTRELU_LINEAR_CUTOFF {
                x
            } else {
                x.exp().ln_1p()
            }
        }
        ActType::Softsign => x / (1.0 + x.abs()),
    }
}

/// Derivative at one element; `saved` is the output, or the input for
/// activations where [`ActType::grad_uses_input`] holds.
#[inline]
fn grad_one(act: ActType, saved: TensorFloat) -> TensorFloat {
    match act {
        ActType::Relu => {
            if saved > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        ActType::Sigmoid => saved * (1.0 - saved),
        ActType::Tanh => 1.0 - saved * saved,
        ActType::SoftRelu => -(-saved).exp_m1(),
        ActType::Softsign => {
            let d = 1.0 + saved.abs();
            1.0 / (d * d)
        }
    }
}

/// Applies an activation function element-wise.
///
/// # Optimizations
///
/// - Uses `rayon` to parallelize over elements
pub fn activation(act: ActType, input: &Tensor<TensorFloat>) -> Tensor<TensorFloat> {
    let data = input
        .data
        .par_iter()
        .map(|&x| forward_one(act, x))
        .collect();
    Tensor::new(input.shape.clone(), data)
}

/// Propagates `grad_output` back through an activation.
///
/// # Panics
/// Panics if `grad_output` and the saved tensors differ in shape.
pub fn activation_backward(
    act: ActType,
    input: &Tensor<TensorFloat>,
    output: &Tensor<TensorFloat>,
    grad_output: &Tensor<TensorFloat>,
) -> Tensor<TensorFloat> {
    assert_eq!(grad_output.shape, output.shape, "activation grad shape mismatch");
    let saved = if act.grad_uses_input() { input } else { output };
    assert_eq!(saved.shape, grad_output.shape, "activation grad shape mismatch");

    let data = grad_output
        .data
        .par_iter()
        .zip(saved.data.par_iter())
        .map(|(&dy, &s)| dy * grad_one(act, s))
        .collect();
    Tensor::new(grad_output.shape.clone(), data)
}
