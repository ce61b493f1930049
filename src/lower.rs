//! Lowering: route an `OpNode` to the kernel a backend will execute.
//!
//! The interesting decision is the requantize decomposition. An affine
//! requantization with both zero points at 0 and an unchanged dtype is
//! numerically identical to a fixed-point multiply by
//! `in_scale[c] / out_scale`; everything else keeps its affine form and must
//! not be routed through the fixed-point path.

use log::debug;

use crate::error::{KernelError, KernelResult};
use crate::graph::{OpGraph, OpNode};
use crate::ops::fixed_point::quantize_scale;
use crate::types::{FixedPointParams, PerChannelParams, TensorSpec};

/// The kernel a graph lowers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowering {
    Scalar(FixedPointParams),
    PerChannel(PerChannelParams, usize),
    /// Zero-point-aware affine requantize. A routing decision, not an error:
    /// backends without an affine path reject it at compile time.
    Affine,
}

/// Lower a graph's node against its input spec.
///
/// Shape preconditions (per-channel parameter count vs. axis extent) are
/// checked here, before any backend work.
pub fn lower(graph: &OpGraph) -> KernelResult<Lowering> {
    match &graph.node {
        OpNode::ScalarFixedPointMultiply { params } => Ok(Lowering::Scalar(*params)),
        OpNode::PerChannelFixedPointMultiply { params, axis } => {
            check_channel_count(&graph.input, params.len(), *axis)?;
            Ok(Lowering::PerChannel(params.clone(), *axis))
        }
        OpNode::Requantize {
            in_scale,
            in_zero_point,
            out_scale,
            out_zero_point,
            axis,
            out_dtype,
        } => {
            if *in_zero_point != 0 || *out_zero_point != 0 || *out_dtype != graph.input.dtype {
                debug!(
                    "requantize not decomposable (zp {}→{}, dtype {:?}→{:?})",
                    in_zero_point, out_zero_point, graph.input.dtype, out_dtype
                );
                return Ok(Lowering::Affine);
            }
            if in_scale.len() == 1 {
                let params = quantize_scale(in_scale[0] / out_scale);
                debug!("requantize → scalar fixed_point_multiply {params:?}");
                Ok(Lowering::Scalar(params))
            } else {
                check_channel_count(&graph.input, in_scale.len(), *axis)?;
                let params = PerChannelParams::new(
                    in_scale
                        .iter()
                        .map(|s| quantize_scale(s / out_scale))
                        .collect(),
                );
                debug!(
                    "requantize → per-channel fixed_point_multiply ({} channels, axis {})",
                    params.len(),
                    axis
                );
                Ok(Lowering::PerChannel(params, *axis))
            }
        }
    }
}

fn check_channel_count(input: &TensorSpec, got: usize, axis: usize) -> KernelResult<()> {
    let extent = input.extent(axis)?;
    if got != extent {
        return Err(KernelError::ShapeMismatch {
            axis,
            expected: extent,
            got,
        });
    }
    Ok(())
}
