//! Backend contract: `compile(graph) → executable`, `run(input) → tensor`,
//! `disassemble() → text`.
//!
//! Target identifiers are opaque strings. Two in-tree implementations exist:
//! `"scalar"` (the element-wise reference interpreter) and `"hvx"` (vector
//! instruction selection + block interpreter). The conformance harness is
//! generic over any two implementations of `Backend`; `AnyBackend` adds
//! enum dispatch for callers that only hold a target string.

pub mod hvx;
pub mod scalar;

pub use hvx::HvxBackend;
pub use scalar::ScalarBackend;

use crate::error::{CompileResult, KernelError, KernelResult};
use crate::graph::OpGraph;
use crate::types::{Tensor, TensorSpec};

/// Compiles graphs for one target.
pub trait Backend {
    type Artifact: Executable;

    /// Opaque target identifier (stable per backend).
    fn target(&self) -> &'static str;

    /// Compile a graph. Validation happens here — shape and routing errors
    /// are compile failures, never wrong answers at execution time.
    fn compile(&self, graph: &OpGraph) -> CompileResult<Self::Artifact>;
}

/// A compiled artifact: executable, possibly many times, and inspectable.
pub trait Executable {
    fn run(&self, input: &Tensor) -> KernelResult<Tensor>;

    /// Instruction listing of the compiled kernel, consumed by the
    /// codegen-presence checker.
    fn disassemble(&self) -> String;
}

/// Reject inputs whose shape differs from the compiled spec.
pub(crate) fn check_input(spec: &TensorSpec, input: &Tensor) -> KernelResult<()> {
    if input.shape() != spec.shape.as_slice() {
        return Err(KernelError::InputShape {
            expected: spec.shape.clone(),
            got: input.shape().to_vec(),
        });
    }
    Ok(())
}

// ── Enum dispatch over the in-tree targets ─────────────────────────

/// All in-tree backends behind one type, resolved from a target string.
#[derive(Debug, Clone, Copy)]
pub enum AnyBackend {
    Scalar(ScalarBackend),
    Hvx(HvxBackend),
}

impl AnyBackend {
    /// Resolve a target identifier, or `None` for unknown targets.
    pub fn for_target(target: &str) -> Option<AnyBackend> {
        match target {
            scalar::TARGET => Some(AnyBackend::Scalar(ScalarBackend)),
            hvx::TARGET => Some(AnyBackend::Hvx(HvxBackend)),
            _ => None,
        }
    }
}

impl Backend for AnyBackend {
    type Artifact = AnyExecutable;

    fn target(&self) -> &'static str {
        match self {
            AnyBackend::Scalar(b) => b.target(),
            AnyBackend::Hvx(b) => b.target(),
        }
    }

    fn compile(&self, graph: &OpGraph) -> CompileResult<AnyExecutable> {
        match self {
            AnyBackend::Scalar(b) => b.compile(graph).map(AnyExecutable::Scalar),
            AnyBackend::Hvx(b) => b.compile(graph).map(AnyExecutable::Hvx),
        }
    }
}

pub enum AnyExecutable {
    Scalar(scalar::ScalarExecutable),
    Hvx(hvx::HvxExecutable),
}

impl Executable for AnyExecutable {
    fn run(&self, input: &Tensor) -> KernelResult<Tensor> {
        match self {
            AnyExecutable::Scalar(e) => e.run(input),
            AnyExecutable::Hvx(e) => e.run(input),
        }
    }

    fn disassemble(&self) -> String {
        match self {
            AnyExecutable::Scalar(e) => e.disassemble(),
            AnyExecutable::Hvx(e) => e.disassemble(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_lookup() {
        assert!(matches!(
            AnyBackend::for_target("scalar"),
            Some(AnyBackend::Scalar(_))
        ));
        assert!(matches!(
            AnyBackend::for_target("hvx"),
            Some(AnyBackend::Hvx(_))
        ));
        assert!(AnyBackend::for_target("cuda").is_none());
    }

    #[test]
    fn input_shape_guard() {
        let spec = TensorSpec::int32(&[2, 3]);
        let ok = Tensor::from_vec(&[2, 3], vec![0; 6]).unwrap();
        let bad = Tensor::from_vec(&[3, 2], vec![0; 6]).unwrap();
        assert!(check_input(&spec, &ok).is_ok());
        assert!(matches!(
            check_input(&spec, &bad),
            Err(KernelError::InputShape { .. })
        ));
    }
}
