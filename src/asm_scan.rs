//! Structural scan of instruction listings.
//!
//! The conformance harness proves two backends agree numerically; this module
//! proves the vector backend actually *selected* the fused instructions
//! rather than falling back to a scalar loop that happens to produce the same
//! numbers. Matching is structural, not textual: a line is tokenized into
//! mnemonic, destination class, accumulate flag, operand classes, and
//! modifier list, and register numbers are deliberately ignored so the check
//! survives any register allocation.

use thiserror::Error;

// ── Operand classification ─────────────────────────────────────────

/// Register-number-blind operand shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandClass {
    /// `vN.w`
    VectorWord,
    /// `vN.h`
    VectorHalf,
    /// `vN.uh`
    VectorUHalf,
    /// `vN` with no lane suffix
    Vector,
    /// `rN` (or `rN:M` pairs)
    Scalar,
    /// `vmem(...)` / `memw(...)` style operand
    Memory,
    /// Anything else (labels, immediates)
    Other,
}

impl OperandClass {
    fn of(token: &str) -> OperandClass {
        let token = token.trim();
        if token.starts_with("vmem(") || token.starts_with("memw(") {
            return OperandClass::Memory;
        }
        if let Some(rest) = token.strip_prefix('v') {
            let (reg, suffix) = match rest.split_once('.') {
                Some((reg, suffix)) => (reg, Some(suffix)),
                None => (rest, None),
            };
            if !reg.is_empty() && reg.bytes().all(|b| b.is_ascii_digit()) {
                return match suffix {
                    Some("w") => OperandClass::VectorWord,
                    Some("h") => OperandClass::VectorHalf,
                    Some("uh") => OperandClass::VectorUHalf,
                    None => OperandClass::Vector,
                    Some(_) => OperandClass::Other,
                };
            }
        }
        if let Some(rest) = token.strip_prefix('r') {
            if rest
                .bytes()
                .all(|b| b.is_ascii_digit() || b == b':')
                && !rest.is_empty()
            {
                return OperandClass::Scalar;
            }
        }
        OperandClass::Other
    }
}

// ── Line parsing ───────────────────────────────────────────────────

/// One parsed instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstr {
    pub mnemonic: String,
    pub dst: OperandClass,
    pub accumulate: bool,
    pub srcs: Vec<OperandClass>,
    pub modifiers: Vec<String>,
}

/// Parse one listing line into its structural form. Lines that are not
/// `dst = mnemonic(args)` / `dst += mnemonic(args)` shapes (labels, comments,
/// loads, stores, jumps) return `None`.
pub fn parse_line(line: &str) -> Option<ParsedInstr> {
    let line = line.trim();
    let line = line
        .strip_prefix('{')
        .and_then(|l| l.strip_suffix('}'))
        .unwrap_or(line)
        .trim();
    if line.is_empty() || line.starts_with("//") || line.ends_with(':') {
        return None;
    }

    let (lhs, rhs, accumulate) = if let Some((l, r)) = line.split_once("+=") {
        (l, r, true)
    } else if let Some((l, r)) = line.split_once('=') {
        (l, r, false)
    } else {
        return None;
    };

    let dst = OperandClass::of(lhs.trim());
    let rhs = rhs.trim();

    let open = rhs.find('(')?;
    let close = rhs.rfind(')')?;
    if close < open {
        return None;
    }
    let mnemonic = rhs[..open].trim().to_string();
    if mnemonic.is_empty() || !mnemonic.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let srcs = rhs[open + 1..close]
        .split(',')
        .map(OperandClass::of)
        .collect();
    let modifiers = rhs[close + 1..]
        .split(':')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();

    Some(ParsedInstr {
        mnemonic,
        dst,
        accumulate,
        srcs,
        modifiers,
    })
}

// ── Patterns ───────────────────────────────────────────────────────

/// A required instruction shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrPattern {
    pub mnemonic: &'static str,
    pub dst: OperandClass,
    pub accumulate: bool,
    pub srcs: Vec<OperandClass>,
    pub modifiers: Vec<&'static str>,
}

impl InstrPattern {
    pub fn matches(&self, instr: &ParsedInstr) -> bool {
        instr.mnemonic == self.mnemonic
            && instr.dst == self.dst
            && instr.accumulate == self.accumulate
            && instr.srcs == self.srcs
            && instr.modifiers.len() == self.modifiers.len()
            && instr
                .modifiers
                .iter()
                .zip(&self.modifiers)
                .all(|(a, b)| a == b)
    }
}

/// The fused pair a lowered fixed-point multiply must select: the even
/// widening multiply against the unsigned low halfword and the accumulating
/// odd multiply with the fused round/saturate/shift modifiers.
pub fn fused_fixed_point_patterns() -> Vec<InstrPattern> {
    vec![
        InstrPattern {
            mnemonic: "vmpye",
            dst: OperandClass::VectorWord,
            accumulate: false,
            srcs: vec![OperandClass::VectorWord, OperandClass::VectorUHalf],
            modifiers: vec![],
        },
        InstrPattern {
            mnemonic: "vmpyo",
            dst: OperandClass::VectorWord,
            accumulate: true,
            srcs: vec![OperandClass::VectorWord, OperandClass::VectorHalf],
            modifiers: vec!["<<1", "rnd", "sat", "shift"],
        },
    ]
}

/// A required pattern did not appear in the listing. Carries the full
/// listing so a failing test shows what was actually emitted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("pattern `{pattern}` absent from listing:\n{listing}")]
pub struct PatternAbsent {
    pub pattern: String,
    pub listing: String,
}

/// Check that every required pattern matches at least one line.
pub fn check_presence(listing: &str, required: &[InstrPattern]) -> Result<(), PatternAbsent> {
    let parsed: Vec<ParsedInstr> = listing.lines().filter_map(parse_line).collect();
    for pattern in required {
        if !parsed.iter().any(|i| pattern.matches(i)) {
            return Err(PatternAbsent {
                pattern: format!("{pattern:?}"),
                listing: listing.to_string(),
            });
        }
    }
    Ok(())
}
