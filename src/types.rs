//! Tensor and parameter types for the fixed-point requantization pipeline.
//!
//! Tensors are dense, row-major, int32 (the canonical accumulator type of
//! quantized matmul/conv outputs). `TensorSpec` carries the static metadata a
//! backend compiles against; `Tensor` carries the runtime payload.

use crate::error::{KernelError, KernelResult};

// ── Element types ──────────────────────────────────────────────────

/// Fixed-width signed integer element types understood by the pipeline.
///
/// Only `Int32` tensors are executable; the narrower types exist so a
/// `Requantize` node can declare a dtype change, which makes it non-lowerable
/// to fixed-point multiply (see `lower`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Int8,
    Int16,
    Int32,
}

impl DType {
    pub fn bits(self) -> usize {
        match self {
            DType::Int8 => 8,
            DType::Int16 => 16,
            DType::Int32 => 32,
        }
    }
}

// ── Tensor metadata ────────────────────────────────────────────────

/// Shape and element type of a tensor, without its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl TensorSpec {
    pub fn new(shape: &[usize], dtype: DType) -> Self {
        TensorSpec {
            shape: shape.to_vec(),
            dtype,
        }
    }

    /// Convenience constructor for the canonical int32 case.
    pub fn int32(shape: &[usize]) -> Self {
        Self::new(shape, DType::Int32)
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn volume(&self) -> usize {
        self.shape.iter().product()
    }

    /// Extent along `axis`, or an error when the axis is out of range.
    pub fn extent(&self, axis: usize) -> KernelResult<usize> {
        self.shape
            .get(axis)
            .copied()
            .ok_or(KernelError::AxisOutOfRange {
                axis,
                rank: self.rank(),
            })
    }

    /// Product of the dimensions after `axis` (row-major inner stride of the
    /// channel dimension).
    pub fn inner_size(&self, axis: usize) -> usize {
        self.shape[axis + 1..].iter().product()
    }
}

// ── Tensor ─────────────────────────────────────────────────────────

/// A dense row-major int32 tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<i32>,
}

impl Tensor {
    /// Build a tensor from a shape and flat row-major data.
    pub fn from_vec(shape: &[usize], data: Vec<i32>) -> KernelResult<Self> {
        let volume: usize = shape.iter().product();
        if data.len() != volume {
            return Err(KernelError::DataLength {
                expected: volume,
                got: data.len(),
            });
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            data,
        })
    }

    /// Row-major tensor filled by `f(flat_index)`.
    pub fn from_fn(shape: &[usize], f: impl FnMut(usize) -> i32) -> Self {
        let volume: usize = shape.iter().product();
        Tensor {
            shape: shape.to_vec(),
            data: (0..volume).map(f).collect(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn spec(&self) -> TensorSpec {
        TensorSpec::int32(&self.shape)
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Fixed-point parameters ─────────────────────────────────────────

/// A fractional scale in Q31 form: `effective_scale = multiplier * 2^(shift - 31)`.
///
/// A well-formed multiplier is a normalized Q31 mantissa in `[2^30, 2^31)`,
/// i.e. a fraction in `[0.5, 1.0)`. `shift` is the power-of-two exponent and
/// may be negative, zero, or positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointParams {
    pub multiplier: i32,
    pub shift: i32,
}

impl FixedPointParams {
    pub fn new(multiplier: i32, shift: i32) -> Self {
        FixedPointParams { multiplier, shift }
    }

    /// True when the multiplier is a normalized Q31 mantissa (or the exact
    /// zero produced by factoring a zero scale).
    pub fn is_normalized(&self) -> bool {
        self.multiplier == 0 || self.multiplier >= (1 << 30)
    }

    /// The real-valued scale this pair approximates.
    pub fn effective_scale(&self) -> f64 {
        f64::from(self.multiplier) * f64::from(self.shift - 31).exp2()
    }
}

/// One `FixedPointParams` per index along a designated tensor axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerChannelParams(pub Vec<FixedPointParams>);

impl PerChannelParams {
    pub fn new(params: Vec<FixedPointParams>) -> Self {
        PerChannelParams(params)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, channel: usize) -> FixedPointParams {
        self.0[channel]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FixedPointParams> {
        self.0.iter()
    }
}
