//! Repeated and timed operator runs.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RunConfig;
use crate::error::Result;
use crate::executor::CoreOpExecutor;
use crate::kwargs::Kwargs;
use crate::tensors::Shape;
use crate::timing::{TimingInstrument, TimingReport};

/// Largest extent of a generated dimension.
const MAX_RANDOM_DIM: usize = 32;

/// Timer id of forward passes.
pub const FORWARD: &str = "Forward";

/// Timer id of backward passes.
pub const BACKWARD: &str = "Backward";

/// Drives executors through bidirectional runs and timing tests.
#[derive(Debug)]
pub struct CoreOperatorRunner {
    config: RunConfig,
    rng: StdRng,
}

impl Default for CoreOperatorRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreOperatorRunner {
    /// A runner configured from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RunConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RunConfig) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Initializes an executor and runs forward, then backward when enabled, `count` times.
    ///
    /// # Errors
    /// Any initialization or execution error of the executor.
    pub fn run_bidirectional(
        &self,
        is_gpu: bool,
        shapes: &[Shape],
        kwargs: &Kwargs,
        count: usize,
    ) -> Result<CoreOpExecutor> {
        let mut op = CoreOpExecutor::with_config(is_gpu, shapes.to_vec(), &self.config);
        op.init(kwargs)?;
        for _ in 0..count {
            op.execute()?;
            if op.has_backward() {
                op.execute_backward()?;
            }
        }
        Ok(op)
    }

    /// Times `count` forward (and backward, when enabled) passes.
    ///
    /// With no `shapes`, a random shape of `dim` dimensions is generated. When
    /// `stochastic`, inputs are refilled before every pass after the first.
    /// The report is logged at `info` level and returned.
    ///
    /// # Errors
    /// Any initialization or execution error of the executor.
    #[allow(clippy::too_many_arguments)]
    pub fn timing_test(
        &mut self,
        label: &str,
        is_gpu: bool,
        stochastic: bool,
        kwargs: &Kwargs,
        dim: usize,
        count: usize,
        shapes: &[Shape],
    ) -> Result<TimingReport> {
        let shapes = if shapes.is_empty() {
            vec![self.random_shape(dim)]
        } else {
            shapes.to_vec()
        };

        let mut op = CoreOpExecutor::with_config(is_gpu, shapes.clone(), &self.config);
        op.init(kwargs)?;

        let mut timing = TimingInstrument::new();
        for i in 0..count {
            if stochastic && i > 0 {
                op.randomize_inputs();
            }
            timing.time(FORWARD, || op.execute())?;
            if op.has_backward() {
                timing.time(BACKWARD, || op.execute_backward())?;
            }
        }

        let report = timing.report(label, &shapes);
        info!("{report}");
        Ok(report)
    }

    /// A shape of `dim` dimensions, each in `1..=32`.
    pub fn random_shape(&mut self, dim: usize) -> Shape {
        (0..dim)
            .map(|_| self.rng.random_range(1..=MAX_RANDOM_DIM))
            .collect::<Vec<_>>()
            .into()
    }
}
