//! Single-op graphs consumed by the backends.
//!
//! A graph is one typed input and one tagged operator node — the unit the
//! conformance harness compiles per target. Nodes are plain data; any caller
//! can construct them with struct literals or the named builders below.

use std::fmt;

use crate::types::{DType, FixedPointParams, PerChannelParams, TensorSpec};

// ── Operator nodes ─────────────────────────────────────────────────

/// The operators the pipeline can compile.
#[derive(Debug, Clone, PartialEq)]
pub enum OpNode {
    /// One `(multiplier, shift)` pair applied to every element.
    ScalarFixedPointMultiply { params: FixedPointParams },
    /// One pair per index along `axis`.
    PerChannelFixedPointMultiply {
        params: PerChannelParams,
        axis: usize,
    },
    /// Affine requantization. Lowers to a fixed-point multiply node exactly
    /// when both zero points are 0 and the dtype does not change; otherwise
    /// it stays a distinct affine op the in-tree backends reject.
    Requantize {
        in_scale: Vec<f64>,
        in_zero_point: i32,
        out_scale: f64,
        out_zero_point: i32,
        axis: usize,
        out_dtype: DType,
    },
}

impl OpNode {
    pub fn name(&self) -> &'static str {
        match self {
            OpNode::ScalarFixedPointMultiply { .. } => "fixed_point_multiply",
            OpNode::PerChannelFixedPointMultiply { .. } => "per_channel_fixed_point_multiply",
            OpNode::Requantize { .. } => "requantize",
        }
    }
}

// ── Graph ──────────────────────────────────────────────────────────

/// One operator over one input tensor: the unit of compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct OpGraph {
    pub input: TensorSpec,
    pub node: OpNode,
}

impl OpGraph {
    /// Scalar fixed-point multiply over `input`.
    pub fn fixed_point_multiply(input: TensorSpec, multiplier: i32, shift: i32) -> Self {
        OpGraph {
            input,
            node: OpNode::ScalarFixedPointMultiply {
                params: FixedPointParams::new(multiplier, shift),
            },
        }
    }

    /// Per-channel fixed-point multiply along `axis`.
    pub fn per_channel_fixed_point_multiply(
        input: TensorSpec,
        params: PerChannelParams,
        axis: usize,
    ) -> Self {
        OpGraph {
            input,
            node: OpNode::PerChannelFixedPointMultiply { params, axis },
        }
    }

    /// Affine requantize node with the wire attributes the compiler consumes.
    #[allow(clippy::too_many_arguments)]
    pub fn requantize(
        input: TensorSpec,
        in_scale: Vec<f64>,
        in_zero_point: i32,
        out_scale: f64,
        out_zero_point: i32,
        axis: usize,
        out_dtype: DType,
    ) -> Self {
        OpGraph {
            input,
            node: OpNode::Requantize {
                in_scale,
                in_zero_point,
                out_scale,
                out_zero_point,
                axis,
                out_dtype,
            },
        }
    }
}

impl fmt::Display for OpGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:?} {:?})",
            self.node.name(),
            self.input.dtype,
            self.input.shape
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_tag_the_right_variant() {
        let g = OpGraph::fixed_point_multiply(TensorSpec::int32(&[6, 32]), 1_395_864_320, 1);
        assert_eq!(g.node.name(), "fixed_point_multiply");

        let g = OpGraph::requantize(
            TensorSpec::int32(&[1, 128]),
            vec![1.7, 0.6],
            0,
            1.0,
            0,
            1,
            DType::Int32,
        );
        assert_eq!(g.node.name(), "requantize");
        assert_eq!(g.to_string(), "requantize(Int32 [1, 128])");
    }
}
