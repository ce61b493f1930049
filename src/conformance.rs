//! Cross-backend conformance: compile one graph on two targets, run both on
//! the same input, and demand bit-exact agreement.
//!
//! The harness is generic over any two `Backend` implementations. Failures
//! are structured: a compile failure names the target that rejected the
//! graph, and a numeric mismatch reports the first diverging index and the
//! worst absolute difference so a regression is diagnosable from the test
//! output alone.

use log::{debug, warn};
use thiserror::Error;

use crate::backend::{Backend, Executable};
use crate::error::{CompileError, KernelError};
use crate::graph::OpGraph;
use crate::types::Tensor;

/// Why a conformance run could not produce a comparison.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConformanceError {
    #[error("target `{target}` failed to compile: {source}")]
    BackendCompile {
        target: &'static str,
        source: CompileError,
    },
    #[error("target `{target}` failed to execute: {source}")]
    BackendExecute {
        target: &'static str,
        source: KernelError,
    },
}

/// Outcome of comparing two backends on one graph and input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub pass: bool,
    pub elements: usize,
    /// Worst `|a - b|` over all elements.
    pub max_abs_diff: u32,
    /// Index of the first diverging element, if any.
    pub first_mismatch: Option<usize>,
}

impl ComparisonResult {
    fn from_outputs(a: &Tensor, b: &Tensor) -> ComparisonResult {
        let mut max_abs_diff = 0u32;
        let mut first_mismatch = None;
        for (i, (&x, &y)) in a.data().iter().zip(b.data()).enumerate() {
            let diff = x.abs_diff(y);
            if diff > 0 && first_mismatch.is_none() {
                first_mismatch = Some(i);
            }
            max_abs_diff = max_abs_diff.max(diff);
        }
        ComparisonResult {
            pass: first_mismatch.is_none(),
            elements: a.len(),
            max_abs_diff,
            first_mismatch,
        }
    }
}

/// Compile `graph` on both backends, run both on `input`, compare outputs.
pub fn compare<A: Backend, B: Backend>(
    graph: &OpGraph,
    a: &A,
    b: &B,
    input: &Tensor,
) -> Result<ComparisonResult, ConformanceError> {
    let exe_a = a
        .compile(graph)
        .map_err(|source| ConformanceError::BackendCompile {
            target: a.target(),
            source,
        })?;
    let exe_b = b
        .compile(graph)
        .map_err(|source| ConformanceError::BackendCompile {
            target: b.target(),
            source,
        })?;

    let out_a = exe_a
        .run(input)
        .map_err(|source| ConformanceError::BackendExecute {
            target: a.target(),
            source,
        })?;
    let out_b = exe_b
        .run(input)
        .map_err(|source| ConformanceError::BackendExecute {
            target: b.target(),
            source,
        })?;

    let result = ComparisonResult::from_outputs(&out_a, &out_b);
    if result.pass {
        debug!(
            "{graph}: {} vs {} agree on {} elements",
            a.target(),
            b.target(),
            result.elements
        );
    } else {
        warn!(
            "{graph}: {} vs {} diverge (first at {:?}, max |diff| {})",
            a.target(),
            b.target(),
            result.first_mismatch,
            result.max_abs_diff
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HvxBackend, ScalarBackend};
    use crate::types::TensorSpec;

    #[test]
    fn identical_backends_always_agree() {
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[3, 5]), 1_395_864_320, 1);
        let input = Tensor::from_fn(&[3, 5], |i| i as i32 * 9 - 60);
        let r = compare(&graph, &ScalarBackend, &ScalarBackend, &input).unwrap();
        assert!(r.pass);
        assert_eq!(r.elements, 15);
        assert_eq!(r.max_abs_diff, 0);
        assert_eq!(r.first_mismatch, None);
    }

    #[test]
    fn compile_failure_names_the_target() {
        let graph = OpGraph::requantize(
            TensorSpec::int32(&[4]),
            vec![1.3],
            5,
            1.0,
            0,
            0,
            crate::types::DType::Int32,
        );
        let input = Tensor::from_vec(&[4], vec![0; 4]).unwrap();
        let err = compare(&graph, &ScalarBackend, &HvxBackend, &input).unwrap_err();
        assert_eq!(
            err,
            ConformanceError::BackendCompile {
                target: "scalar",
                source: CompileError::AffineRequantize { target: "scalar" },
            }
        );
    }

    #[test]
    fn execute_failure_names_the_target() {
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[2, 4]), 1 << 30, 1);
        let input = Tensor::from_vec(&[8], vec![0; 8]).unwrap();
        let err = compare(&graph, &ScalarBackend, &HvxBackend, &input).unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::BackendExecute {
                target: "scalar",
                ..
            }
        ));
    }

    #[test]
    fn mismatch_reports_first_index_and_magnitude() {
        let a = Tensor::from_vec(&[4], vec![1, 2, 3, 4]).unwrap();
        let b = Tensor::from_vec(&[4], vec![1, 5, 3, -6]).unwrap();
        let r = ComparisonResult::from_outputs(&a, &b);
        assert!(!r.pass);
        assert_eq!(r.first_mismatch, Some(1));
        assert_eq!(r.max_abs_diff, 10);
    }
}
