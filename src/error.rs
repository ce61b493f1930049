//! Error types shared across kernels, lowering, and backends.

use crate::types::DType;
use thiserror::Error;

/// Validation and execution errors for the requantization kernels.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    #[error("per-channel params length {got} does not match extent {expected} along axis {axis}")]
    ShapeMismatch {
        axis: usize,
        expected: usize,
        got: usize,
    },
    #[error("axis {axis} out of range for rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },
    #[error("input tensor shape {got:?} does not match compiled shape {expected:?}")]
    InputShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("tensor data length {got} does not match shape volume {expected}")]
    DataLength { expected: usize, got: usize },
    #[error("expected {expected:?} tensor, got {got:?}")]
    DTypeMismatch { expected: DType, got: DType },
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Per-target compilation errors. A compile failure is terminal for the
/// comparison that requested it; execution is never attempted afterwards.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("target `{target}`: unsupported op `{op}`")]
    UnsupportedOp { target: &'static str, op: String },
    #[error("target `{target}`: unsupported dtype {dtype:?} (int32 only)")]
    UnsupportedDType { target: &'static str, dtype: DType },
    #[error(
        "target `{target}`: requantize with nonzero zero point or dtype change \
         is not lowerable to fixed-point multiply"
    )]
    AffineRequantize { target: &'static str },
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type CompileResult<T> = Result<T, CompileError>;
