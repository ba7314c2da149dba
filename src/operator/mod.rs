//! Operators and their registry.
//!
//! # Operator Layer
//!
//! An [`Operator`] is a named, parametrised tensor computation built from
//! [`Kwargs`]. It knows its input names, infers the shapes of inputs the caller
//! did not supply, and runs a forward pass through [`crate::ops::dispatch`].
//!
//! ## Backward Pattern
//!
//! Every forward pass returns its outputs together with an optional boxed
//! closure. The closure captures exactly the tensors the gradient needs and maps
//! output gradients to input gradients, one per input:
//!
//! ```rust
//! use briny_opbench::backend::Backend;
//! use briny_opbench::kwargs::Kwargs;
//! use briny_opbench::operator;
//! use briny_opbench::tensor;
//!
//! let op = operator::create("Activation", &Kwargs::from([("act_type", "relu")])).unwrap();
//! let mut inputs = vec![tensor!([-1.0, 2.0])];
//! let fwd = op.forward(Backend::Cpu, &mut inputs, true).unwrap();
//! assert_eq!(fwd.outputs[0].data, vec![0.0, 2.0]);
//!
//! let back = fwd.backward.unwrap();
//! let grads = back(&[tensor!([1.0, 1.0])]).unwrap();
//! assert_eq!(grads[0].data, vec![0.0, 1.0]);
//! ```
//!
//! ## Registered Operators
//!
//! | name | inputs | backward |
//! |---|---|---|
//! | `Activation` | `data` | `_backward_Activation` |
//! | `FullyConnected` | `data`, `weight`, `bias` | `_backward_FullyConnected` |
//! | `sgd_mom_update` | `weight`, `grad`, `mom` | none |
//! | `sgd_update` | `weight`, `grad` | none |

use core::fmt;

use crate::TensorFloat;
use crate::backend::Backend;
use crate::error::{OpError, Result};
use crate::kwargs::Kwargs;
use crate::tensors::{Shape, Tensor};

mod activation;
pub use self::activation::Activation;

mod fully_connected;
pub use self::fully_connected::FullyConnected;

mod sgd;
pub use self::sgd::{SgdMomUpdate, SgdUpdate};

/// Maps output gradients to input gradients.
pub type BackwardFn =
    Box<dyn Fn(&[Tensor<TensorFloat>]) -> Result<Vec<Tensor<TensorFloat>>> + Send + Sync>;

/// Result of a forward pass.
pub struct Forward {
    pub outputs: Vec<Tensor<TensorFloat>>,
    /// Present when the pass was run with `want_backward` and the operator has a gradient.
    pub backward: Option<BackwardFn>,
}

impl fmt::Debug for Forward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forward")
            .field("outputs", &self.outputs)
            .field("backward", &self.backward.is_some())
            .finish()
    }
}

/// Shapes of every input and output of an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredShapes {
    pub inputs: Vec<Shape>,
    pub outputs: Vec<Shape>,
}

/// A configured tensor operator.
pub trait Operator: fmt::Debug + Send + Sync {
    /// Registry name of the operator.
    fn name(&self) -> &'static str;

    /// Names of the inputs, in order.
    fn input_names(&self) -> &'static [&'static str];

    /// Name of the matching backward operator, if the operator is differentiable.
    fn backward_name(&self) -> Option<&'static str> {
        None
    }

    /// Completes the input shapes from the supplied prefix and derives the outputs.
    ///
    /// # Errors
    /// [`OpError::InputCount`] when more shapes than inputs are supplied (or none
    /// at all), [`OpError::ShapeMismatch`] when a supplied shape disagrees with
    /// the inferred one.
    fn infer_shapes(&self, known: &[Shape]) -> Result<InferredShapes>;

    /// Runs the forward pass. Optimizer operators update their state inputs in place.
    ///
    /// # Errors
    /// [`OpError::InputCount`] or [`OpError::ShapeMismatch`] for inputs that do
    /// not fit the operator.
    fn forward(
        &self,
        backend: Backend,
        inputs: &mut [Tensor<TensorFloat>],
        want_backward: bool,
    ) -> Result<Forward>;
}

type Constructor = fn(&Kwargs) -> Result<Box<dyn Operator>>;

const REGISTRY: &[(&str, Constructor)] = &[
    ("Activation", new_activation),
    ("FullyConnected", new_fully_connected),
    ("sgd_mom_update", new_sgd_mom_update),
    ("sgd_update", new_sgd_update),
];

fn new_activation(kwargs: &Kwargs) -> Result<Box<dyn Operator>> {
    Ok(Box::new(Activation::from_kwargs(kwargs)?))
}

fn new_fully_connected(kwargs: &Kwargs) -> Result<Box<dyn Operator>> {
    Ok(Box::new(FullyConnected::from_kwargs(kwargs)?))
}

fn new_sgd_mom_update(kwargs: &Kwargs) -> Result<Box<dyn Operator>> {
    Ok(Box::new(SgdMomUpdate::from_kwargs(kwargs)?))
}

fn new_sgd_update(kwargs: &Kwargs) -> Result<Box<dyn Operator>> {
    Ok(Box::new(SgdUpdate::from_kwargs(kwargs)?))
}

/// Builds the operator registered under `name`.
///
/// The reserved operator-name keys are stripped before the operator sees `kwargs`.
///
/// # Errors
/// [`OpError::UnknownOperator`] for an unregistered name, or any argument error
/// from the operator's constructor.
pub fn create(name: &str, kwargs: &Kwargs) -> Result<Box<dyn Operator>> {
    let (_, constructor) = REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .ok_or_else(|| OpError::UnknownOperator(name.to_owned()))?;
    constructor(&kwargs.without_reserved())
}

/// Every registered operator name.
#[must_use]
pub fn registered_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

fn input_count_error(op: &str, expected: usize, found: usize) -> OpError {
    OpError::InputCount {
        op: op.to_owned(),
        expected,
        found,
    }
}

fn check_input_count(op: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(input_count_error(op, expected, found))
    }
}

/// Rejects empty or overlong shape prefixes.
fn check_known(op: &str, inputs: &[&str], known: &[Shape]) -> Result<()> {
    if known.is_empty() || known.len() > inputs.len() {
        return Err(input_count_error(op, inputs.len(), known.len()));
    }
    Ok(())
}

fn check_shape(op: &str, input: &str, expected: &Shape, found: &Shape) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(OpError::ShapeMismatch {
            op: op.to_owned(),
            input: input.to_owned(),
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}

/// Checks every supplied shape against the fully inferred input list.
fn check_supplied(op: &str, names: &[&str], inferred: &[Shape], known: &[Shape]) -> Result<()> {
    for ((name, expected), found) in names.iter().zip(inferred).zip(known) {
        check_shape(op, name, expected, found)?;
    }
    Ok(())
}

/// Checks a gradient list against the shapes a backward closure expects.
fn check_grads(op: &str, grads: &[Tensor<TensorFloat>], expected: &[&Shape]) -> Result<()> {
    check_input_count(op, expected.len(), grads.len())?;
    for (grad, shape) in grads.iter().zip(expected) {
        check_shape(op, "output gradient", shape, &grad.shape)?;
    }
    Ok(())
}
