//! Optimizer update operators.
//!
//! Both operators mutate their state inputs (`weight`, and `mom` for the
//! momentum variant) in place, so repeated executions keep training the same
//! parameters. The output is a copy of the updated weight.

use super::{
    Forward, InferredShapes, Operator, check_known, check_shape, check_supplied, input_count_error,
};
use crate::TensorFloat;
use crate::backend::Backend;
use crate::error::{OpError, Result};
use crate::kwargs::Kwargs;
use crate::ops::{SgdParams, dispatch};
use crate::tensors::{Shape, Tensor};

const MOM_NAME: &str = "sgd_mom_update";
const MOM_INPUTS: &[&str] = &["weight", "grad", "mom"];

const NAME: &str = "sgd_update";
const INPUTS: &[&str] = &["weight", "grad"];

/// Fused momentum SGD:
/// `mom = momentum·mom − lr·wd·weight − lr·clip(rescale_grad·grad)`, then `weight += mom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdMomUpdate {
    pub params: SgdParams,
}

impl SgdMomUpdate {
    /// Reads `lr` (required), `momentum`, `wd`, `rescale_grad`, `clip_gradient` and `lazy_update`.
    ///
    /// `lazy_update` only affects sparse storage and is otherwise ignored.
    ///
    /// # Errors
    /// Missing `lr`, unparsable values, or any undeclared argument.
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self> {
        kwargs.ensure_known(
            MOM_NAME,
            &["lr", "momentum", "wd", "rescale_grad", "clip_gradient", "lazy_update"],
        )?;
        kwargs.flag_or(MOM_NAME, "lazy_update", true)?;
        Ok(Self {
            params: read_params(MOM_NAME, kwargs, true)?,
        })
    }
}

/// Plain SGD: `weight = weight − lr·(clip(rescale_grad·grad) + wd·weight)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdUpdate {
    pub params: SgdParams,
}

impl SgdUpdate {
    /// Reads `lr` (required), `wd`, `rescale_grad`, `clip_gradient` and `lazy_update`.
    ///
    /// # Errors
    /// Missing `lr`, unparsable values, or any undeclared argument.
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self> {
        kwargs.ensure_known(NAME, &["lr", "wd", "rescale_grad", "clip_gradient", "lazy_update"])?;
        kwargs.flag_or(NAME, "lazy_update", true)?;
        Ok(Self {
            params: read_params(NAME, kwargs, false)?,
        })
    }
}

fn read_params(op: &str, kwargs: &Kwargs, with_momentum: bool) -> Result<SgdParams> {
    let defaults = SgdParams::default();
    let params = SgdParams {
        lr: kwargs.require(op, "lr")?,
        momentum: if with_momentum {
            kwargs.parse_or(op, "momentum", defaults.momentum)?
        } else {
            defaults.momentum
        },
        wd: kwargs.parse_or(op, "wd", defaults.wd)?,
        rescale_grad: kwargs.parse_or(op, "rescale_grad", defaults.rescale_grad)?,
        clip_gradient: kwargs.parse_or(op, "clip_gradient", defaults.clip_gradient)?,
    };
    if !params.lr.is_finite() {
        return Err(OpError::InvalidArgument {
            op: op.to_owned(),
            key: "lr".to_owned(),
            value: params.lr.to_string(),
            reason: "must be finite".to_owned(),
        });
    }
    Ok(params)
}

/// Every input shares the weight's shape.
fn infer_same_shape(op: &str, names: &[&str], known: &[Shape]) -> Result<InferredShapes> {
    check_known(op, names, known)?;
    let shape = known[0].clone();
    let inputs = vec![shape.clone(); names.len()];
    check_supplied(op, names, &inputs, known)?;
    Ok(InferredShapes {
        inputs,
        outputs: vec![shape],
    })
}

impl Operator for SgdMomUpdate {
    fn name(&self) -> &'static str {
        MOM_NAME
    }

    fn input_names(&self) -> &'static [&'static str] {
        MOM_INPUTS
    }

    fn infer_shapes(&self, known: &[Shape]) -> Result<InferredShapes> {
        infer_same_shape(MOM_NAME, MOM_INPUTS, known)
    }

    fn forward(
        &self,
        backend: Backend,
        inputs: &mut [Tensor<TensorFloat>],
        _want_backward: bool,
    ) -> Result<Forward> {
        let found = inputs.len();
        let [weight, grad, mom] = inputs else {
            return Err(input_count_error(MOM_NAME, MOM_INPUTS.len(), found));
        };
        check_shape(MOM_NAME, "grad", &weight.shape, &grad.shape)?;
        check_shape(MOM_NAME, "mom", &weight.shape, &mom.shape)?;

        dispatch::sgd_mom_update(backend, weight, grad, mom, &self.params);
        Ok(Forward {
            outputs: vec![weight.clone()],
            backward: None,
        })
    }
}

impl Operator for SgdUpdate {
    fn name(&self) -> &'static str {
        NAME
    }

    fn input_names(&self) -> &'static [&'static str] {
        INPUTS
    }

    fn infer_shapes(&self, known: &[Shape]) -> Result<InferredShapes> {
        infer_same_shape(NAME, INPUTS, known)
    }

    fn forward(
        &self,
        backend: Backend,
        inputs: &mut [Tensor<TensorFloat>],
        _want_backward: bool,
    ) -> Result<Forward> {
        let found = inputs.len();
        let [weight, grad] = inputs else {
            return Err(input_count_error(NAME, INPUTS.len(), found));
        };
        check_shape(NAME, "grad", &weight.shape, &grad.shape)?;

        dispatch::sgd_update(backend, weight, grad, &self.params);
        Ok(Forward {
            outputs: vec![weight.clone()],
            backward: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::approx_eq;
    use crate::tensor;

    fn mom_op(pairs: &[(&str, &str)]) -> SgdMomUpdate {
        SgdMomUpdate::from_kwargs(&pairs.iter().copied().collect()).unwrap()
    }

    #[test]
    fn reads_arguments_with_defaults() {
        let op = mom_op(&[("lr", "0.01"), ("clip_gradient", "1")]);
        assert!(approx_eq(&op.params.lr, &0.01));
        assert_eq!(op.params.momentum, 0.0);
        assert_eq!(op.params.rescale_grad, 1.0);
        assert_eq!(op.params.clip_gradient, 1.0);
        assert!(op.backward_name().is_none());
    }

    #[test]
    fn lr_is_required_and_momentum_is_momentum_only() {
        assert!(matches!(
            SgdMomUpdate::from_kwargs(&Kwargs::from([("momentum", "0.9")])),
            Err(OpError::MissingArgument { .. })
        ));
        assert!(matches!(
            SgdUpdate::from_kwargs(&Kwargs::from([("lr", "0.1"), ("momentum", "0.9")])),
            Err(OpError::UnknownArgument { .. })
        ));
        assert!(matches!(
            SgdUpdate::from_kwargs(&Kwargs::from([("lr", "inf")])),
            Err(OpError::InvalidArgument { .. })
        ));
        let plain = Kwargs::from([("lr", "0.1"), ("lazy_update", "false")]);
        assert!(SgdUpdate::from_kwargs(&plain).is_ok());
    }

    #[test]
    fn infers_state_shapes_from_weight() {
        let op = mom_op(&[("lr", "0.01")]);
        let shapes = op.infer_shapes(&[Shape::from([5, 5])]).unwrap();
        assert_eq!(shapes.inputs.len(), 3);
        assert!(shapes.inputs.iter().all(|s| s.dims() == [5, 5]));
        assert_eq!(shapes.outputs, vec![Shape::from([5, 5])]);

        let err = op
            .infer_shapes(&[Shape::from([5, 5]), Shape::from([5, 4])])
            .unwrap_err();
        assert!(matches!(err, OpError::ShapeMismatch { ref input, .. } if input == "grad"));
    }

    #[test]
    fn momentum_state_persists_across_calls() {
        let op = mom_op(&[("lr", "0.1"), ("momentum", "0.5")]);
        let mut inputs = vec![tensor!([1.0, 1.0]), tensor!([1.0, -1.0]), tensor!([0.0, 0.0])];

        let first = op.forward(Backend::Cpu, &mut inputs, false).unwrap();
        assert!(approx_eq(&first.outputs[0].data[..], &[0.9, 1.1][..]));
        assert!(first.backward.is_none());

        // mom = 0.5 * -0.1 - 0.1 = -0.15
        let second = op.forward(Backend::Cpu, &mut inputs, false).unwrap();
        assert!(approx_eq(&inputs[2].data[..], &[-0.15, 0.15][..]));
        assert!(approx_eq(&second.outputs[0].data[..], &[0.75, 1.25][..]));
        assert_eq!(second.outputs[0], inputs[0]);
    }

    #[test]
    fn clipping_bounds_the_step() {
        let op = mom_op(&[("lr", "1"), ("clip_gradient", "0.5")]);
        let mut inputs = vec![tensor!([0.0, 0.0]), tensor!([3.0, -0.25]), tensor!([0.0, 0.0])];
        let out = op.forward(Backend::Cpu, &mut inputs, false).unwrap();
        assert!(approx_eq(&out.outputs[0].data[..], &[-0.5, 0.25][..]));
    }

    #[test]
    fn plain_sgd_applies_weight_decay() {
        let op = SgdUpdate::from_kwargs(&Kwargs::from([("lr", "0.5"), ("wd", "0.1")])).unwrap();
        let mut inputs = vec![tensor!([2.0]), tensor!([1.0])];
        let out = op.forward(Backend::Cpu, &mut inputs, false).unwrap();
        // 2 - 0.5 * (1 + 0.2)
        assert!(approx_eq(&out.outputs[0].data[..], &[1.4][..]));
    }

    #[test]
    fn forward_checks_inputs() {
        let op = mom_op(&[("lr", "0.1")]);
        let mut two = vec![tensor!([1.0]), tensor!([1.0])];
        assert!(matches!(
            op.forward(Backend::Cpu, &mut two, false),
            Err(OpError::InputCount { expected: 3, found: 2, .. })
        ));
        let mut ragged = vec![tensor!([1.0]), tensor!([1.0, 2.0]), tensor!([1.0])];
        assert!(matches!(
            op.forward(Backend::Cpu, &mut ragged, false),
            Err(OpError::ShapeMismatch { .. })
        ));
    }
}
