//! Single-operator execution.
//!
//! A [`CoreOpExecutor`] owns one configured operator together with every tensor
//! it reads or writes: forward inputs and outputs, and, when the backward pass
//! is enabled, the output gradients fed to it (`bwd_inputs`) and the input
//! gradients it produces (`bwd_outputs`).
//!
//! Inputs and output gradients are filled with seeded uniform samples from
//! `[-1, 1)`, so two executors built from the same [`RunConfig`] see identical data.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::TensorFloat;
use crate::backend::Backend;
use crate::config::RunConfig;
use crate::error::{OpError, Result};
use crate::kwargs::{self, BWD_OP_NAME_NONE, BackwardOp, FWD_OP_NAME_KEY, Kwargs};
use crate::operator::{self, BackwardFn, Operator};
use crate::tensors::{Shape, Tensor};

/// Elements printed per tensor by [`CoreOpExecutor::log_tensors`].
const LOG_PREVIEW: usize = 32;

/// One operator instance and the tensors it runs over.
pub struct CoreOpExecutor {
    backend: Backend,
    shapes: Vec<Shape>,
    verbose: bool,
    rng: StdRng,
    op: Option<Box<dyn Operator>>,
    backward_enabled: bool,
    backward: Option<BackwardFn>,
    inputs: Vec<Tensor<TensorFloat>>,
    outputs: Vec<Tensor<TensorFloat>>,
    bwd_inputs: Vec<Tensor<TensorFloat>>,
    bwd_outputs: Vec<Tensor<TensorFloat>>,
}

impl CoreOpExecutor {
    /// Creates an executor for the given input shape prefix, configured from the environment.
    #[must_use]
    pub fn new(is_gpu: bool, shapes: Vec<Shape>) -> Self {
        Self::with_config(is_gpu, shapes, &RunConfig::from_env())
    }

    /// Creates an executor with an explicit configuration.
    #[must_use]
    pub fn with_config(is_gpu: bool, shapes: Vec<Shape>, config: &RunConfig) -> Self {
        Self {
            backend: Backend::from_gpu_flag(is_gpu),
            shapes,
            verbose: config.verbose,
            rng: StdRng::seed_from_u64(config.seed),
            op: None,
            backward_enabled: false,
            backward: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            bwd_inputs: Vec::new(),
            bwd_outputs: Vec::new(),
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Copies `kwargs` and records the forward and backward operator names.
    ///
    /// See [`kwargs::args_with_op_name`].
    #[must_use]
    pub fn args_with_op_name(kwargs: &Kwargs, op_name: &str, backward_op_name: &str) -> Kwargs {
        kwargs::args_with_op_name(kwargs, op_name, backward_op_name)
    }

    /// Builds the operator named in `kwargs` and allocates its tensors.
    ///
    /// # Errors
    /// - [`OpError::MissingArgument`] when `kwargs` names no operator
    /// - [`OpError::BackwardMismatch`] when the requested backward operator is not the
    ///   operator's own
    /// - any construction or shape inference error from the operator
    pub fn init(&mut self, kwargs: &Kwargs) -> Result<()> {
        let name = kwargs.op_name().ok_or_else(|| OpError::MissingArgument {
            op: "executor".to_owned(),
            key: FWD_OP_NAME_KEY.to_owned(),
        })?;
        let op = operator::create(name, kwargs)?;
        let backward_enabled = resolve_backward(op.as_ref(), kwargs.backward_op())?;
        let shapes = op.infer_shapes(&self.shapes)?;

        self.inputs = self.random_tensors(&shapes.inputs);
        self.outputs = shapes.outputs.iter().map(|s| Tensor::zeros(s.clone())).collect();
        if backward_enabled {
            self.bwd_inputs = self.random_tensors(&shapes.outputs);
            self.bwd_outputs = shapes.inputs.iter().map(|s| Tensor::zeros(s.clone())).collect();
        } else {
            self.bwd_inputs.clear();
            self.bwd_outputs.clear();
        }

        debug!(
            "initialized {} on {} with {} (backward {}), input shapes {:?}",
            op.name(),
            self.backend,
            kwargs.without_reserved(),
            if backward_enabled { "on" } else { "off" },
            shapes.inputs.iter().map(ToString::to_string).collect::<Vec<_>>()
        );

        self.op = Some(op);
        self.backward_enabled = backward_enabled;
        self.backward = None;
        Ok(())
    }

    /// Runs the forward pass.
    ///
    /// # Errors
    /// [`OpError::NotInitialized`] before [`Self::init`], or an error from the operator.
    pub fn execute(&mut self) -> Result<()> {
        let op = self.op.as_ref().ok_or(OpError::NotInitialized)?;
        let forward = op.forward(self.backend, &mut self.inputs, self.backward_enabled)?;
        self.outputs = forward.outputs;
        self.backward = forward.backward;
        Ok(())
    }

    /// Whether [`Self::execute_backward`] can run once a forward pass has happened.
    #[must_use]
    pub fn has_backward(&self) -> bool {
        self.op.is_some() && self.backward_enabled
    }

    /// Runs the backward pass of the latest forward pass.
    ///
    /// # Errors
    /// - [`OpError::NotInitialized`] before [`Self::init`]
    /// - [`OpError::NoBackward`] when the backward pass is disabled or the operator has none
    /// - [`OpError::NotExecuted`] before the first [`Self::execute`]
    pub fn execute_backward(&mut self) -> Result<()> {
        let op = self.op.as_ref().ok_or(OpError::NotInitialized)?;
        if !self.backward_enabled {
            return Err(OpError::NoBackward(op.name().to_owned()));
        }
        let backward = self.backward.as_ref().ok_or(OpError::NotExecuted)?;
        self.bwd_outputs = backward(&self.bwd_inputs)?;
        Ok(())
    }

    /// Refills every forward input with fresh random samples.
    pub fn randomize_inputs(&mut self) {
        for input in &mut self.inputs {
            input.fill_random(&mut self.rng);
        }
    }

    /// Logs `tensors` at `debug` level when verbose.
    pub fn log_tensors(&self, label: &str, tensors: &[Tensor<TensorFloat>]) {
        if !self.verbose {
            return;
        }
        for (i, t) in tensors.iter().enumerate() {
            let shown = t.len().min(LOG_PREVIEW);
            let more = if t.len() > shown { ", ..." } else { "" };
            debug!("{label}[{i}] {}: {:?}{more}", t.shape, &t.data[..shown]);
        }
    }

    #[must_use]
    pub fn inputs(&self) -> &[Tensor<TensorFloat>] {
        &self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &[Tensor<TensorFloat>] {
        &self.outputs
    }

    /// Output gradients fed to the backward pass.
    #[must_use]
    pub fn bwd_inputs(&self) -> &[Tensor<TensorFloat>] {
        &self.bwd_inputs
    }

    /// Input gradients produced by the backward pass.
    #[must_use]
    pub fn bwd_outputs(&self) -> &[Tensor<TensorFloat>] {
        &self.bwd_outputs
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Name of the initialized operator.
    #[must_use]
    pub fn operator_name(&self) -> Option<&'static str> {
        self.op.as_ref().map(|op| op.name())
    }

    fn random_tensors(&mut self, shapes: &[Shape]) -> Vec<Tensor<TensorFloat>> {
        shapes
            .iter()
            .map(|s| Tensor::random(s.clone(), &mut self.rng))
            .collect()
    }
}

/// Decides whether the backward pass runs.
fn resolve_backward(op: &dyn Operator, requested: BackwardOp) -> Result<bool> {
    match requested {
        BackwardOp::Disabled => Ok(false),
        BackwardOp::Inferred => Ok(op.backward_name().is_some()),
        BackwardOp::Named(name) => match op.backward_name() {
            Some(own) if own == name => Ok(true),
            own => Err(OpError::BackwardMismatch {
                op: op.name().to_owned(),
                expected: own.unwrap_or(BWD_OP_NAME_NONE).to_owned(),
                requested: name,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::{ApproxEquality, approx_within};

    fn executor(shapes: Vec<Shape>) -> CoreOpExecutor {
        CoreOpExecutor::with_config(false, shapes, &RunConfig::default())
    }

    fn act_kwargs(bwd: &str) -> Kwargs {
        CoreOpExecutor::args_with_op_name(&Kwargs::from([("act_type", "tanh")]), "Activation", bwd)
    }

    #[test]
    fn forward_only_activation() {
        let mut op = executor(vec![Shape::from([5, 5])]);
        op.init(&act_kwargs(BWD_OP_NAME_NONE)).unwrap();
        assert!(!op.has_backward());
        assert!(op.bwd_inputs().is_empty());
        op.execute().unwrap();
        for (y, x) in op.outputs()[0].data.iter().zip(&op.inputs()[0].data) {
            assert_eq!(*y, x.tanh());
        }
        assert_eq!(
            op.execute_backward(),
            Err(OpError::NoBackward("Activation".into()))
        );
    }

    #[test]
    fn inferred_backward_allocates_gradients() {
        let mut op = executor(vec![Shape::from([4, 3])]);
        op.init(&act_kwargs("")).unwrap();
        assert!(op.has_backward());
        assert_eq!(op.bwd_inputs()[0].shape, Shape::from([4, 3]));
        assert!(op.bwd_outputs()[0].data.iter().all(|&g| g == 0.0));

        assert_eq!(op.execute_backward(), Err(OpError::NotExecuted));
        op.execute().unwrap();
        op.execute_backward().unwrap();
        assert!(op.bwd_outputs()[0].data.iter().any(|&g| g != 0.0));
    }

    #[test]
    fn named_backward_must_match() {
        let mut op = executor(vec![Shape::from([2])]);
        op.init(&act_kwargs("_backward_Activation")).unwrap();
        assert!(op.has_backward());

        let err = op.init(&act_kwargs("_backward_FullyConnected")).unwrap_err();
        assert!(matches!(
            err,
            OpError::BackwardMismatch { ref expected, .. } if expected == "_backward_Activation"
        ));

        let sgd = CoreOpExecutor::args_with_op_name(
            &Kwargs::from([("lr", "0.01")]),
            "sgd_mom_update",
            "_backward_sgd_mom_update",
        );
        assert!(matches!(
            op.init(&sgd),
            Err(OpError::BackwardMismatch { ref expected, .. }) if expected == BWD_OP_NAME_NONE
        ));
    }

    #[test]
    fn uninitialized_and_unnamed() {
        let mut op = executor(vec![Shape::from([2])]);
        assert_eq!(op.execute(), Err(OpError::NotInitialized));
        assert_eq!(op.execute_backward(), Err(OpError::NotInitialized));
        assert!(matches!(
            op.init(&Kwargs::from([("act_type", "relu")])),
            Err(OpError::MissingArgument { .. })
        ));
        assert_eq!(op.operator_name(), None);
    }

    #[test]
    fn sgd_mom_updates_weight_in_place() {
        let kwargs = CoreOpExecutor::args_with_op_name(
            &Kwargs::from([("lr", "0.01"), ("clip_gradient", "1")]),
            "sgd_mom_update",
            BWD_OP_NAME_NONE,
        );
        let mut op = executor(vec![Shape::from([5, 5])]);
        op.init(&kwargs).unwrap();
        assert_eq!(op.inputs().len(), 3);
        assert_eq!(op.operator_name(), Some("sgd_mom_update"));

        let before = op.inputs()[0].clone();
        op.execute().unwrap();
        assert_ne!(op.inputs()[0], before);
        assert_eq!(op.outputs()[0], op.inputs()[0]);
    }

    #[test]
    fn seeded_inputs_repeat_and_randomize_changes_them() {
        let mut a = executor(vec![Shape::from([8])]);
        let mut b = executor(vec![Shape::from([8])]);
        a.init(&act_kwargs(BWD_OP_NAME_NONE)).unwrap();
        b.init(&act_kwargs(BWD_OP_NAME_NONE)).unwrap();
        assert_eq!(a.inputs(), b.inputs());

        let before = a.inputs()[0].clone();
        a.randomize_inputs();
        assert_ne!(a.inputs()[0], before);
    }

    #[test]
    fn gpu_flag_runs_both_passes() {
        let shapes = vec![Shape::from([3, 3])];
        let mut gpu = CoreOpExecutor::with_config(true, shapes.clone(), &RunConfig::default());
        let mut cpu = executor(shapes);
        assert_eq!(gpu.backend(), Backend::Wgpu);

        for op in [&mut gpu, &mut cpu] {
            op.init(&act_kwargs("")).unwrap();
            op.execute().unwrap();
            op.execute_backward().unwrap();
        }
        assert_eq!(gpu.inputs(), cpu.inputs());

        let tol = ApproxEquality::Partial;
        assert!(approx_within(&gpu.outputs()[0].data[..], &cpu.outputs()[0].data[..], tol));
        assert!(approx_within(&gpu.bwd_outputs()[0].data[..], &cpu.bwd_outputs()[0].data[..], tol));
    }
}
