//! Scalar fixed-point multiply: the rounding/saturating integer core.
//!
//! `fixed_point_multiply(value, multiplier, shift)` approximates
//! `value * multiplier * 2^(shift - 31)` where `multiplier` is a normalized
//! Q31 mantissa. The product is computed in widened arithmetic, a rounding
//! arithmetic right shift (add-bias-then-shift, i.e. round-half-up with ties
//! toward positive infinity — the convention of the fused `rnd` hardware
//! forms) or an exact left shift is applied, and the result saturates to the
//! int32 range. This is the reference semantics every backend must reproduce
//! bit-for-bit.

use crate::types::FixedPointParams;

/// Rounding/saturating fixed-point multiply-shift of a single int32 value.
///
/// Saturation is defined output behavior, never an error: results outside
/// `[i32::MIN, i32::MAX]` clamp instead of wrapping.
#[inline]
pub fn fixed_point_multiply(value: i32, multiplier: i32, shift: i32) -> i32 {
    let product = i64::from(value) * i64::from(multiplier);
    let total_shift = 31i64 - i64::from(shift);

    let wide: i128 = if total_shift > 0 {
        if total_shift >= 63 {
            // |product| < 2^62, so the rounded quotient at 2^63 or beyond is 0.
            0
        } else {
            let bias = 1i64 << (total_shift - 1);
            i128::from((product + bias) >> total_shift)
        }
    } else if total_shift == 0 {
        i128::from(product)
    } else {
        // Left shift is exact; overflow saturates below.
        let left = -total_shift;
        if product == 0 {
            0
        } else if left >= 64 {
            if product > 0 {
                i128::MAX
            } else {
                i128::MIN
            }
        } else {
            i128::from(product) << left
        }
    };

    wide.clamp(i128::from(i32::MIN), i128::from(i32::MAX)) as i32
}

/// Apply a parameter pair to a single value.
#[inline]
pub fn apply(value: i32, params: FixedPointParams) -> i32 {
    fixed_point_multiply(value, params.multiplier, params.shift)
}

/// Factor a real-valued scale into a normalized Q31 `(multiplier, shift)` pair.
///
/// Normalizes `scale` into `frac * 2^exp` with `frac ∈ [0.5, 1.0)`, rounds
/// `frac * 2^31` to the nearest integer, and when rounding overflows the
/// mantissa to `2^31` halves it and increments the exponent. Deterministic:
/// the same scale always factors to the same pair. A zero scale factors to
/// `(0, 0)`.
pub fn quantize_scale(scale: f64) -> FixedPointParams {
    if scale == 0.0 {
        return FixedPointParams::new(0, 0);
    }

    let negative = scale < 0.0;
    let (frac, exp) = frexp(scale.abs());

    let mut mantissa = (frac * (1i64 << 31) as f64).round() as i64;
    let mut shift = exp;
    if mantissa == 1i64 << 31 {
        mantissa /= 2;
        shift += 1;
    }
    if negative {
        mantissa = -mantissa;
    }
    FixedPointParams::new(mantissa as i32, shift)
}

/// Decompose a positive finite f64 into `frac ∈ [0.5, 1.0)` and exponent.
fn frexp(x: f64) -> (f64, i32) {
    debug_assert!(x > 0.0 && x.is_finite());
    let mut frac = x;
    let mut exp = 0i32;
    while frac >= 1.0 {
        frac /= 2.0;
        exp += 1;
    }
    while frac < 0.5 {
        frac *= 2.0;
        exp -= 1;
    }
    (frac, exp)
}
