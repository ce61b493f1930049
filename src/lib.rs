//! requant-kernels: fixed-point requantization kernels with cross-backend
//! conformance checking.
//!
//! The crate centers on one operator — the rounding, saturating fixed-point
//! multiply used to requantize int32 accumulators — and the machinery to
//! trust its implementations:
//! - **Kernels**: scalar and per-channel fixed-point multiply, plus the
//!   scale → `(multiplier, shift)` factorization.
//! - **Compilation**: single-op graphs lowered per target; requantize nodes
//!   decompose to fixed-point multiplies when both zero points are 0 and the
//!   dtype is unchanged.
//! - **Conformance**: compile the same graph on two backends, run both on
//!   the same input, demand bit-exact agreement.
//! - **Codegen presence**: structurally scan a backend's listing for the
//!   fused vector multiply pair, ignoring register allocation.
//!
//! # Quick Start
//!
//! ```
//! use requant_kernels::backend::{HvxBackend, ScalarBackend};
//! use requant_kernels::conformance::compare;
//! use requant_kernels::{OpGraph, Tensor, TensorSpec};
//!
//! let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[6, 32]), 1_395_864_320, 1);
//! let input = Tensor::from_fn(&[6, 32], |i| i as i32 - 96);
//! let result = compare(&graph, &ScalarBackend, &HvxBackend, &input).unwrap();
//! assert!(result.pass);
//! ```

pub mod asm_scan;
pub mod backend;
pub mod conformance;
pub mod error;
pub mod graph;
pub mod lower;
pub mod ops;
pub mod types;

pub use backend::{AnyBackend, AnyExecutable, Backend, Executable};
pub use error::{CompileError, CompileResult, KernelError, KernelResult};
pub use graph::{OpGraph, OpNode};
pub use lower::{lower, Lowering};
pub use ops::{fixed_point_multiply, per_channel_multiply, quantize_scale};
pub use types::{DType, FixedPointParams, PerChannelParams, Tensor, TensorSpec};
