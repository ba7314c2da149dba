use super::{
    BackwardFn, Forward, InferredShapes, Operator, check_grads, check_input_count, check_known,
};
use crate::TensorFloat;
use crate::backend::Backend;
use crate::error::Result;
use crate::kwargs::Kwargs;
use crate::ops::{ActType, cpu, dispatch};
use crate::tensors::{Shape, Tensor};

const NAME: &str = "Activation";
const INPUTS: &[&str] = &["data"];

/// Element-wise activation, `y = f(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub act: ActType,
}

impl Activation {
    /// Reads `act_type`.
    ///
    /// # Errors
    /// Missing or unknown `act_type`, or any undeclared argument.
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self> {
        kwargs.ensure_known(NAME, &["act_type"])?;
        Ok(Self {
            act: kwargs.require(NAME, "act_type")?,
        })
    }
}

impl Operator for Activation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn input_names(&self) -> &'static [&'static str] {
        INPUTS
    }

    fn backward_name(&self) -> Option<&'static str> {
        Some("_backward_Activation")
    }

    fn infer_shapes(&self, known: &[Shape]) -> Result<InferredShapes> {
        check_known(NAME, INPUTS, known)?;
        Ok(InferredShapes {
            inputs: vec![known[0].clone()],
            outputs: vec![known[0].clone()],
        })
    }

    fn forward(
        &self,
        backend: Backend,
        inputs: &mut [Tensor<TensorFloat>],
        want_backward: bool,
    ) -> Result<Forward> {
        check_input_count(NAME, INPUTS.len(), inputs.len())?;
        let input = &inputs[0];
        let output = dispatch::activation(backend, self.act, input);

        let backward = want_backward.then(|| {
            let act = self.act;
            let input = input.clone();
            let output = output.clone();
            let back: BackwardFn = Box::new(
                move |grads: &[Tensor<TensorFloat>]| -> Result<Vec<Tensor<TensorFloat>>> {
                    check_grads(NAME, grads, &[&output.shape])?;
                    Ok(vec![cpu::activation_backward(act, &input, &output, &grads[0])])
                },
            );
            back
        });

        Ok(Forward {
            outputs: vec![output],
            backward,
        })
    }
}
