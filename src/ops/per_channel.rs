//! Axis-wise fixed-point multiply with per-channel parameters.
//!
//! Every element selects the `FixedPointParams` of its index along the
//! designated axis. Channels are independent and the per-element map is
//! order-independent, so the row-major inner runs are farmed out to rayon;
//! any partitioning yields the same result as sequential evaluation.

use rayon::prelude::*;

use crate::error::{KernelError, KernelResult};
use crate::ops::fixed_point::fixed_point_multiply;
use crate::types::{PerChannelParams, Tensor};

/// Apply per-channel `(multiplier, shift)` pairs along `axis`.
///
/// Fails fast with `ShapeMismatch` before any element work when
/// `params.len() != shape[axis]`.
pub fn per_channel_multiply(
    input: &Tensor,
    params: &PerChannelParams,
    axis: usize,
) -> KernelResult<Tensor> {
    let rank = input.shape().len();
    if axis >= rank {
        return Err(KernelError::AxisOutOfRange { axis, rank });
    }
    let extent = input.shape()[axis];
    if params.len() != extent {
        return Err(KernelError::ShapeMismatch {
            axis,
            expected: extent,
            got: params.len(),
        });
    }

    if input.is_empty() {
        return Tensor::from_vec(input.shape(), Vec::new());
    }

    // Row-major: elements of one channel form runs of `inner` contiguous
    // values, repeating every `extent` runs.
    let inner: usize = input.shape()[axis + 1..].iter().product();
    let mut out = vec![0i32; input.len()];

    out.par_chunks_mut(inner)
        .zip(input.data().par_chunks(inner))
        .enumerate()
        .for_each(|(run, (dst, src))| {
            let p = params.get(run % extent);
            for (d, &v) in dst.iter_mut().zip(src) {
                *d = fixed_point_multiply(v, p.multiplier, p.shift);
            }
        });

    Tensor::from_vec(input.shape(), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixedPointParams;

    const HALF: FixedPointParams = FixedPointParams {
        multiplier: 1 << 30,
        shift: 1, // exact identity
    };
    const DOUBLE: FixedPointParams = FixedPointParams {
        multiplier: 1 << 30,
        shift: 2, // exact doubling
    };

    #[test]
    fn selects_params_by_channel() {
        // Shape (2, 3): axis 0 → rows, axis 1 → columns.
        let t = Tensor::from_vec(&[2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();

        let rows = per_channel_multiply(&t, &PerChannelParams::new(vec![HALF, DOUBLE]), 0).unwrap();
        assert_eq!(rows.data(), &[1, 2, 3, 8, 10, 12]);

        let cols =
            per_channel_multiply(&t, &PerChannelParams::new(vec![HALF, DOUBLE, HALF]), 1).unwrap();
        assert_eq!(cols.data(), &[1, 4, 3, 4, 10, 6]);
    }

    #[test]
    fn matches_scalar_kernel_per_slice() {
        let t = Tensor::from_fn(&[2, 4, 3], |i| i as i32 * 7 - 40);
        let params = PerChannelParams::new(
            (0..4)
                .map(|c| FixedPointParams::new((1 << 30) + (c << 20) as i32, (c as i32 % 3) - 1))
                .collect(),
        );
        let out = per_channel_multiply(&t, &params, 1).unwrap();

        for (i, (&got, &v)) in out.data().iter().zip(t.data()).enumerate() {
            let channel = (i / 3) % 4;
            let p = params.get(channel);
            assert_eq!(got, fixed_point_multiply(v, p.multiplier, p.shift), "index {i}");
        }
    }

    #[test]
    fn shape_mismatch_fails_fast() {
        let t = Tensor::from_vec(&[2, 3], vec![0; 6]).unwrap();
        let err = per_channel_multiply(&t, &PerChannelParams::new(vec![HALF]), 1).unwrap_err();
        assert_eq!(
            err,
            KernelError::ShapeMismatch {
                axis: 1,
                expected: 3,
                got: 1
            }
        );

        let err = per_channel_multiply(&t, &PerChannelParams::new(vec![HALF]), 2).unwrap_err();
        assert_eq!(err, KernelError::AxisOutOfRange { axis: 2, rank: 2 });
    }

    #[test]
    fn last_axis_runs_of_one() {
        let t = Tensor::from_vec(&[3, 2], vec![10, 20, 30, 40, 50, 60]).unwrap();
        let out =
            per_channel_multiply(&t, &PerChannelParams::new(vec![DOUBLE, HALF]), 1).unwrap();
        assert_eq!(out.data(), &[20, 20, 60, 40, 100, 60]);
    }
}
