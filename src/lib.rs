//! briny_opbench: operator-level forward/backward timing over a minimal tensor engine.
//!
//! Drives a handful of tensor operators (an activation function, a fused momentum
//! SGD update and a fully-connected layer) through forward and backward passes
//! across fixed shape lists, and records per-pass timing statistics.
//!
//! # Modules
//!
//! - [`tensors`]: shapes, row-major tensors and the `tensor!` macro.
//! - [`kwargs`]: ordered string keyword arguments for operators.
//! - [`operator`]: the operator registry and the operators themselves.
//! - [`ops`]: CPU (rayon) and optional WGPU kernels plus backend dispatch.
//! - [`executor`]: one configured operator instance with its tensors.
//! - [`runner`]: bidirectional and timed runs over an executor.
//! - [`timing`]: accumulating named timers and printable reports.
//! - [`perf`]: the three driver routines and their shape tables.
//!
//! # Example
//!
//! ```rust
//! use briny_opbench::executor::CoreOpExecutor;
//! use briny_opbench::kwargs::{Kwargs, BWD_OP_NAME_NONE};
//! use briny_opbench::tensors::Shape;
//!
//! let kwargs = CoreOpExecutor::args_with_op_name(
//!     &Kwargs::from([("act_type", "tanh")]),
//!     "Activation",
//!     BWD_OP_NAME_NONE,
//! );
//! let mut op = CoreOpExecutor::new(false, vec![Shape::from([5, 5])]);
//! op.init(&kwargs).unwrap();
//! op.execute().unwrap();
//! assert_eq!(op.outputs()[0].shape.dims(), &[5, 5]);
//! ```

pub mod approx;
pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod kwargs;
pub mod operator;
pub mod ops;
pub mod perf;
pub mod runner;
pub mod tensors;
pub mod timing;

pub use error::{OpError, Result};

#[cfg(not(feature = "f64"))]
type TensorFloatInner = f32;
#[cfg(feature = "f64")]
type TensorFloatInner = f64;

/// The float used in tensors (`f32`, or `f64` with the `f64` feature).
pub type TensorFloat = TensorFloatInner;
