//! The scaling kernel: filter weights, colorspace row traffic, the 1-D and
//! fused 2-D render passes, block halving, and row convolution.

pub mod convert;
pub mod convolution;
pub mod halving;
pub mod render1d;
pub mod scale2d;
pub mod weights;
