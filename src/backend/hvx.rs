//! HVX-flavored vector backend: instruction selection over 32-lane int32
//! blocks, a block interpreter, and a packet-style listing.
//!
//! Instruction selection maps the fixed-point multiply to the fused widening
//! pair: an even-lane `vmpye` contributing `value * lo16(multiplier)`
//! (unsigned low halfword) and an accumulating odd-lane `vmpyo` with
//! `<<1:rnd:sat:shift` modifiers contributing `(value * hi16(multiplier))
//! << 16` plus the fused rounding/saturating shift. The halfword split is
//! exact, so the composition reproduces the reference semantics bit-for-bit
//! through a genuinely different decomposition of the arithmetic.

use std::fmt::Write as _;

use log::debug;

use crate::backend::{check_input, Backend, Executable};
use crate::error::{CompileError, CompileResult, KernelResult};
use crate::graph::OpGraph;
use crate::lower::{lower, Lowering};
use crate::types::{DType, PerChannelParams, Tensor, TensorSpec};

pub const TARGET: &str = "hvx";

/// One 128-byte vector register holds 32 int32 lanes.
pub const LANES: usize = 32;

// ── Vector ISA ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VReg(u8);

/// Scalar register slots: 0 = multiplier, 1 = shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SReg(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemRef {
    Input,
    Output,
    Multipliers,
    Shifts,
}

impl MemRef {
    fn base_reg(self) -> &'static str {
        match self {
            MemRef::Input => "r0",
            MemRef::Output => "r1",
            MemRef::Multipliers => "r2",
            MemRef::Shifts => "r3",
        }
    }
}

/// The selected vector instructions. Lanes are modeled as 64-bit inside the
/// interpreter so the widening products stay exact between the two multiply
/// steps.
#[derive(Debug, Clone, PartialEq)]
enum VInstr {
    /// `vN = vmem(base++#1)` — load the current block.
    VMemLoad { dst: VReg, src: MemRef },
    /// `vN = vsplat(rM)` — broadcast a scalar register.
    VSplat { dst: VReg, src: SReg },
    /// `vN.w = vmpye(vS.w,vM.uh)` — even widening multiply by the unsigned
    /// low halfword of the multiplier lane.
    VMpyE { dst: VReg, src: VReg, mult: VReg },
    /// `vN.w += vmpyo(vS.w,vM.h):<<1:rnd:sat:shift` — odd widening multiply
    /// by the signed high halfword, accumulated at halfword offset, then the
    /// fused rounding/saturating shift using the per-lane shift register.
    VMpyOAcc {
        dst: VReg,
        src: VReg,
        mult: VReg,
        shift: VReg,
    },
    /// `vmem(base++#1) = vN` — store the current block.
    VMemStore { src: VReg, dst: MemRef },
}

impl VInstr {
    fn format(&self) -> String {
        match *self {
            VInstr::VMemLoad { dst, src } => {
                format!("v{} = vmem({}++#1)", dst.0, src.base_reg())
            }
            VInstr::VSplat { dst, src } => format!("v{} = vsplat(r{})", dst.0, 4 + src.0),
            VInstr::VMpyE { dst, src, mult } => {
                format!("v{}.w = vmpye(v{}.w,v{}.uh)", dst.0, src.0, mult.0)
            }
            VInstr::VMpyOAcc { dst, src, mult, .. } => format!(
                "v{}.w += vmpyo(v{}.w,v{}.h):<<1:rnd:sat:shift",
                dst.0, src.0, mult.0
            ),
            VInstr::VMemStore { src, dst } => {
                format!("vmem({}++#1) = v{}", dst.base_reg(), src.0)
            }
        }
    }
}

struct RegAlloc {
    next: u8,
}

impl RegAlloc {
    fn new() -> Self {
        RegAlloc { next: 0 }
    }

    fn vreg(&mut self) -> VReg {
        let r = VReg(self.next);
        self.next += 1;
        r
    }
}

// ── Backend ────────────────────────────────────────────────────────

/// The vectorized target.
#[derive(Debug, Clone, Copy, Default)]
pub struct HvxBackend;

/// Per-channel parameter plan: lane → channel resolution happens here
/// instead of materializing a full per-lane parameter plane.
#[derive(Debug)]
struct ChannelPlan {
    params: PerChannelParams,
    extent: usize,
    inner: usize,
}

#[derive(Debug)]
pub struct HvxExecutable {
    input: TensorSpec,
    body: Vec<VInstr>,
    num_vregs: usize,
    /// Scalar register file: [multiplier, shift] for the splat forms.
    scalars: [i32; 2],
    channels: Option<ChannelPlan>,
    name: &'static str,
}

impl Backend for HvxBackend {
    type Artifact = HvxExecutable;

    fn target(&self) -> &'static str {
        TARGET
    }

    fn compile(&self, graph: &OpGraph) -> CompileResult<HvxExecutable> {
        if graph.input.dtype != DType::Int32 {
            return Err(CompileError::UnsupportedDType {
                target: TARGET,
                dtype: graph.input.dtype,
            });
        }

        let lowered = lower(graph)?;
        let mut ra = RegAlloc::new();
        let mut body = Vec::new();

        let v_in = ra.vreg();
        let v_mult = ra.vreg();
        let v_shift = ra.vreg();
        let v_acc = ra.vreg();

        body.push(VInstr::VMemLoad {
            dst: v_in,
            src: MemRef::Input,
        });

        let (scalars, channels) = match lowered {
            Lowering::Scalar(p) => {
                body.push(VInstr::VSplat {
                    dst: v_mult,
                    src: SReg(0),
                });
                body.push(VInstr::VSplat {
                    dst: v_shift,
                    src: SReg(1),
                });
                ([p.multiplier, p.shift], None)
            }
            Lowering::PerChannel(params, axis) => {
                body.push(VInstr::VMemLoad {
                    dst: v_mult,
                    src: MemRef::Multipliers,
                });
                body.push(VInstr::VMemLoad {
                    dst: v_shift,
                    src: MemRef::Shifts,
                });
                let extent = graph.input.extent(axis)?;
                let inner = graph.input.inner_size(axis);
                (
                    [0, 0],
                    Some(ChannelPlan {
                        params,
                        extent,
                        inner,
                    }),
                )
            }
            Lowering::Affine => {
                return Err(CompileError::AffineRequantize { target: TARGET });
            }
        };

        body.push(VInstr::VMpyE {
            dst: v_acc,
            src: v_in,
            mult: v_mult,
        });
        body.push(VInstr::VMpyOAcc {
            dst: v_acc,
            src: v_in,
            mult: v_mult,
            shift: v_shift,
        });
        body.push(VInstr::VMemStore {
            src: v_acc,
            dst: MemRef::Output,
        });

        debug!(
            "target {TARGET}: selected {} vector instructions for {graph}",
            body.len()
        );

        Ok(HvxExecutable {
            input: graph.input.clone(),
            body,
            num_vregs: ra.next as usize,
            scalars,
            channels,
            name: graph.node.name(),
        })
    }
}

impl HvxExecutable {
    /// Multiplier/shift for a lane of block `block`, honoring padding lanes.
    fn lane_param(&self, block: usize, lane: usize, valid: usize, shifts: bool) -> i64 {
        if lane >= valid {
            return 0;
        }
        match &self.channels {
            None => i64::from(self.scalars[usize::from(shifts)]),
            Some(plan) => {
                let flat = block * LANES + lane;
                let channel = (flat / plan.inner) % plan.extent;
                let p = plan.params.get(channel);
                i64::from(if shifts { p.shift } else { p.multiplier })
            }
        }
    }
}

impl Executable for HvxExecutable {
    fn run(&self, input: &Tensor) -> KernelResult<Tensor> {
        check_input(&self.input, input)?;

        let n = input.len();
        let num_blocks = n.div_ceil(LANES);
        let mut out = vec![0i32; n];
        let mut regs = vec![[0i64; LANES]; self.num_vregs];

        for block in 0..num_blocks {
            let base = block * LANES;
            let valid = (n - base).min(LANES);

            for instr in &self.body {
                match *instr {
                    VInstr::VMemLoad { dst, src } => {
                        let reg = &mut regs[dst.0 as usize];
                        for (lane, slot) in reg.iter_mut().enumerate() {
                            *slot = match src {
                                MemRef::Input => {
                                    if lane < valid {
                                        i64::from(input.data()[base + lane])
                                    } else {
                                        0
                                    }
                                }
                                MemRef::Multipliers => {
                                    self.lane_param(block, lane, valid, false)
                                }
                                MemRef::Shifts => self.lane_param(block, lane, valid, true),
                                MemRef::Output => 0,
                            };
                        }
                    }
                    VInstr::VSplat { dst, src } => {
                        regs[dst.0 as usize] = [i64::from(self.scalars[src.0 as usize]); LANES];
                    }
                    VInstr::VMpyE { dst, src, mult } => {
                        for lane in 0..LANES {
                            let x = regs[src.0 as usize][lane];
                            let lo = (regs[mult.0 as usize][lane] as u64 & 0xFFFF) as i64;
                            regs[dst.0 as usize][lane] = x * lo;
                        }
                    }
                    VInstr::VMpyOAcc {
                        dst,
                        src,
                        mult,
                        shift,
                    } => {
                        for lane in 0..LANES {
                            let x = regs[src.0 as usize][lane];
                            let hi = i64::from((regs[mult.0 as usize][lane] as i32) >> 16);
                            let acc = regs[dst.0 as usize][lane] + ((x * hi) << 16);
                            let s = regs[shift.0 as usize][lane];
                            regs[dst.0 as usize][lane] = round_sat(acc, s);
                        }
                    }
                    VInstr::VMemStore { src, dst: _ } => {
                        for lane in 0..valid {
                            out[base + lane] = regs[src.0 as usize][lane] as i32;
                        }
                    }
                }
            }
        }

        Tensor::from_vec(input.shape(), out)
    }

    fn disassemble(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "// target {TARGET}");
        let _ = writeln!(s, "{}:", self.name);
        let _ = writeln!(s, ".L0:");
        for instr in &self.body {
            let _ = writeln!(s, "    {{ {} }}", instr.format());
        }
        let _ = writeln!(s, "    {{ jump .L0 }}");
        s
    }
}

/// Fused rounding/saturating shift of an exact 64-bit product:
/// `total_shift = 31 - shift`, add-bias rounding on right shifts, saturating
/// left shifts, final clamp to int32.
fn round_sat(acc: i64, shift: i64) -> i64 {
    let total_shift = 31 - shift;
    let v = if total_shift > 0 {
        if total_shift >= 63 {
            0
        } else {
            (acc + (1i64 << (total_shift - 1))) >> total_shift
        }
    } else if total_shift == 0 {
        acc
    } else {
        let left = -total_shift;
        if acc == 0 {
            0
        } else if left >= 63 {
            if acc > 0 {
                i64::MAX
            } else {
                i64::MIN
            }
        } else {
            let shifted = acc << left;
            if (shifted >> left) != acc {
                if acc > 0 {
                    i64::MAX
                } else {
                    i64::MIN
                }
            } else {
                shifted
            }
        }
    };
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::OpGraph;
    use crate::ops::fixed_point::fixed_point_multiply;
    use crate::types::{FixedPointParams, PerChannelParams};

    fn reference(input: &Tensor, multiplier: i32, shift: i32) -> Vec<i32> {
        input
            .data()
            .iter()
            .map(|&v| fixed_point_multiply(v, multiplier, shift))
            .collect()
    }

    #[test]
    fn halfword_split_matches_reference() {
        // Odd multiplier exercises both halves of the split.
        let (m, s) = (1_395_864_321, 1);
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[6, 32]), m, s);
        let exe = HvxBackend.compile(&graph).unwrap();

        let input = Tensor::from_fn(&[6, 32], |i| i as i32 - 96);
        let out = exe.run(&input).unwrap();
        assert_eq!(out.data(), reference(&input, m, s).as_slice());
    }

    #[test]
    fn saturating_values_match_reference() {
        let (m, s) = (i32::MAX, 4);
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[8]), m, s);
        let exe = HvxBackend.compile(&graph).unwrap();

        let input = Tensor::from_vec(
            &[8],
            vec![i32::MIN, -1_000_000, -1, 0, 1, 1_000_000, i32::MAX, 7],
        )
        .unwrap();
        let out = exe.run(&input).unwrap();
        assert_eq!(out.data(), reference(&input, m, s).as_slice());
    }

    #[test]
    fn tail_block_is_masked() {
        // 40 elements: one full block plus a tail of 8.
        let (m, s) = (1_288_490_189, -2);
        let graph = OpGraph::fixed_point_multiply(TensorSpec::int32(&[5, 8]), m, s);
        let exe = HvxBackend.compile(&graph).unwrap();

        let input = Tensor::from_fn(&[5, 8], |i| i as i32 * 37 - 700);
        let out = exe.run(&input).unwrap();
        assert_eq!(out.data(), reference(&input, m, s).as_slice());
    }

    #[test]
    fn per_channel_lanes_resolve_channels() {
        // Inner size 3 is not a multiple of the lane count, so channels
        // change inside a block.
        let params = PerChannelParams::new(vec![
            FixedPointParams::new(1 << 30, 1),
            FixedPointParams::new(1_395_864_320, 1),
            FixedPointParams::new(1_288_490_189, 0),
            FixedPointParams::new(1 << 30, 2),
        ]);
        let graph = OpGraph::per_channel_fixed_point_multiply(
            TensorSpec::int32(&[2, 4, 3]),
            params.clone(),
            1,
        );
        let exe = HvxBackend.compile(&graph).unwrap();

        let input = Tensor::from_fn(&[2, 4, 3], |i| i as i32 * 13 - 150);
        let out = exe.run(&input).unwrap();
        for (i, (&got, &v)) in out.data().iter().zip(input.data()).enumerate() {
            let channel = (i / 3) % 4;
            let p = params.get(channel);
            assert_eq!(
                got,
                fixed_point_multiply(v, p.multiplier, p.shift),
                "index {i}"
            );
        }
    }

    #[test]
    fn listing_contains_fused_pair() {
        let graph =
            OpGraph::fixed_point_multiply(TensorSpec::int32(&[1, 128]), 1_395_864_320, 1);
        let asm = HvxBackend.compile(&graph).unwrap().disassemble();
        assert!(asm.contains(".w = vmpye("));
        assert!(asm.contains(".w += vmpyo("));
        assert!(asm.contains(":<<1:rnd:sat:shift"));
    }

    #[test]
    fn rejects_affine_requantize() {
        let graph = OpGraph::requantize(
            TensorSpec::int32(&[4]),
            vec![1.3],
            0,
            1.0,
            2,
            0,
            DType::Int32,
        );
        assert_eq!(
            HvxBackend.compile(&graph).unwrap_err(),
            CompileError::AffineRequantize { target: TARGET }
        );
    }

    #[test]
    fn round_sat_mirrors_core_semantics() {
        for &(value, mult, shift) in &[
            (3i32, 1 << 30, 0i32),
            (-3, 1 << 30, 0),
            (95, 1_395_864_320, 1),
            (i32::MAX, i32::MAX, 2),
            (i32::MIN, i32::MAX, 2),
            (i32::MAX, i32::MAX, -40),
        ] {
            let product = i64::from(value) * i64::from(mult);
            assert_eq!(
                round_sat(product, i64::from(shift)) as i32,
                fixed_point_multiply(value, mult, shift),
                "value {value} mult {mult} shift {shift}"
            );
        }
    }
}
