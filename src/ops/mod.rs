//! # Operation Dispatch Layer
//!
//! This module defines tensor kernels and dispatches them across compute backends.
//!
//! ## Submodules
//!
//! - [`cpu`]: Multi-threaded CPU kernels (default fallback backend)
//! - [`wgpu`] *(opt-in)*: GPU compute shader pipelines using `wgpu`
//! - [`dispatch`]: Backend switching and unified kernel interfaces
//!
//! ## Extending the Backend
//!
//! To add a new kernel:
//!
//! 1. Implement it in one or more backends (e.g. `cpu::my_op`, `wgpu::wgpu_my_op`)
//! 2. Add it to the `dispatch` module for unified access
//! 3. Validate shapes in the operator layer, before dispatch
//!
//! ## Notes
//!
//! - GPU acceleration is only used when the feature flag is enabled
//! - A GPU kernel that cannot run returns `None` and the CPU kernel runs instead
//! - Backward passes always run on the CPU

use core::fmt;
use core::str::FromStr;

use crate::TensorFloat;

pub mod cpu;
pub mod dispatch;

#[cfg(feature = "wgpu")]
pub mod wgpu;

/// Elementwise activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActType {
    /// `max(0, x)`
    Relu,
    /// `1 / (1 + e^-x)`
    Sigmoid,
    /// `tanh(x)`
    Tanh,
    /// `ln(1 + e^x)`
    SoftRelu,
    /// `x / (1 + |x|)`
    Softsign,
}

impl ActType {
    pub const ALL: [Self; 5] = [
        Self::Relu,
        Self::Sigmoid,
        Self::Tanh,
        Self::SoftRelu,
        Self::Softsign,
    ];

    /// Argument spelling of this activation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::SoftRelu => "softrelu",
            Self::Softsign => "softsign",
        }
    }

    /// Selector understood by the activation shader.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Relu => 0,
            Self::Sigmoid => 1,
            Self::Tanh => 2,
            Self::SoftRelu => 3,
            Self::Softsign => 4,
        }
    }

    /// Whether the gradient is computed from the input rather than the output.
    #[must_use]
    pub const fn grad_uses_input(self) -> bool {
        matches!(self, Self::Softsign)
    }
}

impl FromStr for ActType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|act| act.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|a| a.as_str()).collect();
                format!("expected one of {}", names.join(", "))
            })
    }
}

impl fmt::Display for ActType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyper-parameters of the SGD update kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdParams {
    pub lr: TensorFloat,
    /// Ignored by plain SGD.
    pub momentum: TensorFloat,
    pub wd: TensorFloat,
    pub rescale_grad: TensorFloat,
    /// Clip threshold; negative disables clipping.
    pub clip_gradient: TensorFloat,
}

impl SgdParams {
    /// Rescales and, when enabled, clips a raw gradient element.
    #[inline]
    #[must_use]
    pub fn scaled_grad(&self, g: TensorFloat) -> TensorFloat {
        let g = self.rescale_grad * g;
        if self.clip_gradient >= 0.0 {
            g.clamp(-self.clip_gradient, self.clip_gradient)
        } else {
            g
        }
    }
}

impl Default for SgdParams {
    fn default() -> Self {
        Self {
            lr: 0.01,
            momentum: 0.0,
            wd: 0.0,
            rescale_grad: 1.0,
            clip_gradient: -1.0,
        }
    }
}
