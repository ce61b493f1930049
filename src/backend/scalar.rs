//! Reference backend: element-wise evaluation of the lowered kernel.
//!
//! This is the semantic ground truth the vector backend is compared against.
//! Compilation validates and lowers the graph; execution walks the tensor
//! with the scalar `fixed_point_multiply` core (delegating per-channel work
//! to the per-channel applier). The listing is a plain scalar loop with no
//! fused vector forms — the presence checker's negative case.

use std::fmt::Write as _;

use log::debug;

use crate::backend::{check_input, Backend, Executable};
use crate::error::{CompileError, CompileResult, KernelResult};
use crate::graph::OpGraph;
use crate::lower::{lower, Lowering};
use crate::ops::fixed_point;
use crate::ops::per_channel::per_channel_multiply;
use crate::types::{DType, FixedPointParams, PerChannelParams, Tensor, TensorSpec};

pub const TARGET: &str = "scalar";

/// The reference scalar target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

#[derive(Debug, Clone)]
enum Kernel {
    Scalar(FixedPointParams),
    PerChannel(PerChannelParams, usize),
}

#[derive(Debug)]
pub struct ScalarExecutable {
    input: TensorSpec,
    kernel: Kernel,
    name: &'static str,
}

impl Backend for ScalarBackend {
    type Artifact = ScalarExecutable;

    fn target(&self) -> &'static str {
        TARGET
    }

    fn compile(&self, graph: &OpGraph) -> CompileResult<ScalarExecutable> {
        if graph.input.dtype != DType::Int32 {
            return Err(CompileError::UnsupportedDType {
                target: TARGET,
                dtype: graph.input.dtype,
            });
        }
        let kernel = match lower(graph)? {
            Lowering::Scalar(params) => Kernel::Scalar(params),
            Lowering::PerChannel(params, axis) => Kernel::PerChannel(params, axis),
            Lowering::Affine => {
                return Err(CompileError::AffineRequantize { target: TARGET });
            }
        };
        debug!("target {TARGET}: compiled {graph}");
        Ok(ScalarExecutable {
            input: graph.input.clone(),
            kernel,
            name: graph.node.name(),
        })
    }
}

impl Executable for ScalarExecutable {
    fn run(&self, input: &Tensor) -> KernelResult<Tensor> {
        check_input(&self.input, input)?;
        match &self.kernel {
            Kernel::Scalar(p) => {
                let data = input
                    .data()
                    .iter()
                    .map(|&v| fixed_point::fixed_point_multiply(v, p.multiplier, p.shift))
                    .collect();
                Tensor::from_vec(input.shape(), data)
            }
            Kernel::PerChannel(params, axis) => per_channel_multiply(input, params, *axis),
        }
    }

    fn disassemble(&self) -> String {
        // Scalar loop: widening multiply, bias add, arithmetic shift,
        // saturate. Deliberately free of fused vector mnemonics.
        let mut s = String::new();
        let _ = writeln!(s, "// target {TARGET}");
        let _ = writeln!(s, "{}:", self.name);
        if matches!(self.kernel, Kernel::PerChannel(..)) {
            let _ = writeln!(s, "    r3 = memw(r8++#4)");
            let _ = writeln!(s, "    r7 = memw(r9++#4)");
        }
        let _ = writeln!(s, ".L0:");
        let _ = writeln!(s, "    r2 = memw(r0++#4)");
        let _ = writeln!(s, "    r5:4 = mpy(r2,r3)");
        let _ = writeln!(s, "    r5:4 = add(r5:4,r6)");
        let _ = writeln!(s, "    r5:4 = asr(r5:4,r7)");
        let _ = writeln!(s, "    r2 = sat(r5:4)");
        let _ = writeln!(s, "    memw(r1++#4) = r2");
        let _ = writeln!(s, "    jump .L0");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use crate::graph::OpGraph;

    #[test]
    fn scalar_kernel_matches_core() {
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[2, 4]), 1_395_864_320, 1);
        let exe = ScalarBackend.compile(&graph).unwrap();

        let input = Tensor::from_fn(&[2, 4], |i| i as i32 * 11 - 40);
        let out = exe.run(&input).unwrap();
        for (&got, &v) in out.data().iter().zip(input.data()) {
            assert_eq!(got, fixed_point::fixed_point_multiply(v, 1_395_864_320, 1));
        }
    }

    #[test]
    fn rejects_non_int32() {
        let graph = OpGraph::fixed_point_multiply(
            TensorSpec::new(&[4], DType::Int8),
            1 << 30,
            0,
        );
        assert!(matches!(
            ScalarBackend.compile(&graph),
            Err(CompileError::UnsupportedDType { .. })
        ));
    }

    #[test]
    fn rejects_affine_requantize() {
        let graph = OpGraph::requantize(
            TensorSpec::int32(&[4]),
            vec![1.3],
            7,
            1.0,
            0,
            0,
            DType::Int32,
        );
        assert_eq!(
            ScalarBackend.compile(&graph).unwrap_err(),
            CompileError::AffineRequantize { target: TARGET }
        );
    }

    #[test]
    fn run_rejects_wrong_shape() {
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[2, 4]), 1 << 30, 1);
        let exe = ScalarBackend.compile(&graph).unwrap();
        let input = Tensor::from_vec(&[4, 2], vec![0; 8]).unwrap();
        assert!(matches!(
            exe.run(&input),
            Err(KernelError::InputShape { .. })
        ));
    }

    #[test]
    fn listing_has_no_vector_forms() {
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[1, 128]), 1_395_864_320, 1);
        let asm = ScalarBackend.compile(&graph).unwrap().disassemble();
        assert!(asm.contains("mpy("));
        assert!(!asm.contains("vmpye"));
        assert!(!asm.contains("vmpyo"));
    }
}
