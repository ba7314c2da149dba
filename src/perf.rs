//! Operator performance drivers.
//!
//! Three routines cover every operator test: a small bidirectional sanity run,
//! a timing test over the shared shape table, and a timing test for operators
//! whose second input (a weight) must be paired with each data shape.
//!
//! Each timing routine first primes code and caches with one untimed CPU run on
//! the largest shape, then prints one [`TimingReport`] per shape. Setting
//! `OPBENCH_PERF` switches to the long shape lists.

use crate::backend::Backend;
use crate::config::RunConfig;
use crate::error::Result;
use crate::executor::CoreOpExecutor;
use crate::kwargs::{Kwargs, args_with_op_name};
use crate::runner::CoreOperatorRunner;
use crate::tensors::Shape;
use crate::timing::TimingReport;

/// Shape of the bidirectional sanity run.
pub const BIDIRECTIONAL_SHAPE: [usize; 2] = [5, 5];

/// Priming shape of [`run_core_op_timing_test`].
pub const PRIME_SHAPE: [usize; 4] = [20, 3, 128, 128];

/// Priming data and weight shapes of [`run_fc_timing_test`].
pub const FC_PRIME_SHAPES: ([usize; 4], [usize; 2]) = ([1, 2, 64, 64], [250, 8192]);

/// Dimensions of generated shapes in timing tests.
const TIMING_DIM: usize = 2;

/// Timed passes per shape.
const TIMING_COUNT: usize = 10;

/// Data shapes timed by every timing test.
#[must_use]
pub fn timing_shapes(performance_run: bool) -> Vec<Shape> {
    let dims: &[[usize; 4]] = if performance_run {
        &[
            [1, 1, 28, 28],
            [1, 3, 28, 28],
            [50, 1, 18, 32],
            [50, 3, 18, 32],
            [20, 3, 128, 128],
        ]
    } else {
        &[[1, 1, 28, 28], [50, 3, 18, 32]]
    };
    dims.iter().map(|d| Shape::from(*d)).collect()
}

/// `(data, weight)` shape pairs for fully-connected timing.
///
/// Each weight has 250 rows and one column per flattened data element.
#[must_use]
pub fn fc_timing_shapes(performance_run: bool) -> Vec<(Shape, Shape)> {
    let weights: &[[usize; 2]] = if performance_run {
        &[[250, 784], [250, 2352], [250, 576], [250, 1728], [250, 49152]]
    } else {
        &[[250, 784], [250, 1728]]
    };
    timing_shapes(performance_run)
        .into_iter()
        .zip(weights.iter().map(|w| Shape::from(*w)))
        .collect()
}

fn timing_label(op_name: &str, is_gpu: bool) -> String {
    format!("{op_name} Operator {}", Backend::from_gpu_flag(is_gpu).label())
}

/// Runs one forward pass on a `(5,5)` input, then the backward pass if enabled.
///
/// Tensors are logged before and after each pass when `OPBENCH_VERBOSE` is set.
///
/// # Errors
/// Any initialization or execution error.
pub fn run_core_op_bidirectional(
    is_gpu: bool,
    kwargs: &Kwargs,
    op_name: &str,
    backward_op_name: &str,
) -> Result<CoreOpExecutor> {
    let config = RunConfig::from_env();
    let mut op =
        CoreOpExecutor::with_config(is_gpu, vec![Shape::from(BIDIRECTIONAL_SHAPE)], &config);
    op.set_verbose(config.verbose);

    op.init(&CoreOpExecutor::args_with_op_name(kwargs, op_name, backward_op_name))?;

    op.log_tensors("inputs", op.inputs());
    op.log_tensors("outputs", op.outputs());
    op.execute()?;
    op.log_tensors("outputs", op.outputs());
    if op.has_backward() {
        op.log_tensors("bwd_inputs", op.bwd_inputs());
        op.log_tensors("bwd_outputs", op.bwd_outputs());
        op.execute_backward()?;
        op.log_tensors("bwd_outputs", op.bwd_outputs());
    }
    Ok(op)
}

/// Primes on `(20,3,128,128)`, then times every shape of [`timing_shapes`].
///
/// # Errors
/// Any initialization or execution error.
pub fn run_core_op_timing_test(
    is_gpu: bool,
    kwargs: &Kwargs,
    op_name: &str,
    backward_op_name: &str,
) -> Result<Vec<TimingReport>> {
    let kwargs = args_with_op_name(kwargs, op_name, backward_op_name);

    let mut runner = CoreOperatorRunner::new();
    runner.run_bidirectional(false, &[Shape::from(PRIME_SHAPE)], &kwargs, 1)?;

    let label = timing_label(op_name, is_gpu);
    let mut reports = Vec::new();
    for shape in timing_shapes(runner.config().performance_run) {
        let report = runner.timing_test(
            &label,
            is_gpu,
            false,
            &kwargs,
            TIMING_DIM,
            TIMING_COUNT,
            &[shape],
        )?;
        println!("{report}");
        reports.push(report);
    }
    Ok(reports)
}

/// Primes on `(1,2,64,64)` data with a `(250,8192)` weight, then times every
/// pair of [`fc_timing_shapes`].
///
/// # Errors
/// Any initialization or execution error.
pub fn run_fc_timing_test(
    is_gpu: bool,
    kwargs: &Kwargs,
    op_name: &str,
    backward_op_name: &str,
) -> Result<Vec<TimingReport>> {
    let kwargs = args_with_op_name(kwargs, op_name, backward_op_name);

    let mut runner = CoreOperatorRunner::new();
    let (data, weight) = FC_PRIME_SHAPES;
    runner.run_bidirectional(false, &[Shape::from(data), Shape::from(weight)], &kwargs, 1)?;

    let label = timing_label(op_name, is_gpu);
    let mut reports = Vec::new();
    for (data, weight) in fc_timing_shapes(runner.config().performance_run) {
        let report = runner.timing_test(
            &label,
            is_gpu,
            false,
            &kwargs,
            TIMING_DIM,
            TIMING_COUNT,
            &[data, weight],
        )?;
        println!("{report}");
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_tables() {
        assert_eq!(timing_shapes(false).len(), 2);
        assert_eq!(timing_shapes(true).len(), 5);
        assert_eq!(timing_shapes(true)[4], Shape::from(PRIME_SHAPE));
    }

    #[test]
    fn fc_weights_match_flattened_data() {
        for run in [false, true] {
            for (data, weight) in fc_timing_shapes(run) {
                let (_, k) = data.flat_2d();
                assert_eq!(weight.dims(), &[250, k]);
            }
        }
        let (data, weight) = FC_PRIME_SHAPES;
        assert_eq!(Shape::from(data).flat_2d().1, weight[1]);
    }

    #[test]
    fn labels_name_the_processing_unit() {
        assert_eq!(timing_label("Activation", false), "Activation Operator CPU");
        assert_eq!(timing_label("FullyConnected", true), "FullyConnected Operator GPU");
    }
}
