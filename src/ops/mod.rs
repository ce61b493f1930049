//! Pure integer kernels: the arithmetic every backend must agree on.

pub mod fixed_point;
pub mod per_channel;

pub use fixed_point::{fixed_point_multiply, quantize_scale};
pub use per_channel::per_channel_multiply;
