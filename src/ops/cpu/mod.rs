//! Parallel CPU backend tensor kernels
//!
//! # CPU Backend
//!
//! This module provides the CPU implementations of every kernel the operators use.
//! It is what `dispatch::xyz` runs when the GPU backend is not selected, not compiled,
//! or cannot take the call.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Pure Rust, no `unsafe`
//!
//! ## Implemented Kernels
//!
//! - `activation` / `activation_backward`: relu, sigmoid, tanh, softrelu, softsign
//! - `sgd_mom_update`: fused momentum SGD step, in place
//! - `sgd_update`: plain SGD step, in place
//! - `matmul_nt` / `matmul_nn` / `matmul_tn` / `sum_rows`: fully-connected building blocks
//!
//! ## Design Goals
//!
//! - Deterministic results (given deterministic input and scheduling)
//! - Modular: CPU functions are separate from backend dispatching

mod activation;
pub use self::activation::{activation, activation_backward};

mod matmul;
pub use self::matmul::{matmul_nn, matmul_nt, matmul_tn, sum_rows};

mod sgd;
pub use self::sgd::{sgd_mom_update, sgd_update};
