//! Backend selection.
//!
//! This module defines the computation backends an executor can target.
//!
//! # Supported Backends
//!
//! - `Cpu`: Pure Rust kernels parallelised with `rayon` (default).
//! - `Wgpu`: GPU compute shaders through `wgpu` (with the `wgpu` feature).
//!
//! Selecting `Wgpu` never fails: kernels without a GPU implementation, or a
//! machine without a usable adapter, run on the CPU instead.

use core::fmt;

/// Enumeration of supported computation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Backend {
    /// Pure CPU-based backend (default).
    #[default]
    Cpu = 0,
    /// GPU-accelerated backend using `wgpu`.
    Wgpu,
}

impl Backend {
    /// Maps the harness' `is_gpu` flag onto a backend.
    #[must_use]
    pub const fn from_gpu_flag(is_gpu: bool) -> Self {
        if is_gpu { Self::Wgpu } else { Self::Cpu }
    }

    /// Processing-unit tag used in timing labels.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Wgpu => "GPU",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_flag_and_labels() {
        assert_eq!(Backend::from_gpu_flag(false), Backend::Cpu);
        assert_eq!(Backend::from_gpu_flag(true), Backend::Wgpu);
        assert_eq!(Backend::Cpu.to_string(), "CPU");
        assert_eq!(Backend::Wgpu.label(), "GPU");
    }
}
