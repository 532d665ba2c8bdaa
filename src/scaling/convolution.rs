//! Symmetric row convolution, the 3-tap sharpen, and the box-chain
//! Gaussian approximation.

use crate::bitmaps::BitmapFloat;
use crate::err;
use crate::error::{Result, StatusCode};

#[derive(Clone, Debug)]
pub struct ConvolutionKernel {
    /// Full kernel, width `2 * radius + 1`.
    pub kernel: Vec<f32>,
    pub radius: u32,
    /// When either threshold is nonzero, pixels whose convolved change
    /// falls outside `[min, max]` keep their original value.
    pub threshold_min_change: f32,
    pub threshold_max_change: f32,
}

impl ConvolutionKernel {
    pub fn new(kernel: Vec<f32>) -> Result<ConvolutionKernel> {
        if kernel.is_empty() || kernel.len() % 2 == 0 {
            return Err(err!(
                StatusCode::InvalidArgument,
                "kernel width must be odd, got {}",
                kernel.len()
            ));
        }
        let radius = (kernel.len() / 2) as u32;
        Ok(ConvolutionKernel {
            kernel,
            radius,
            threshold_min_change: 0.0,
            threshold_max_change: 0.0,
        })
    }

    pub fn gaussian(std_dev: f64, radius: u32) -> ConvolutionKernel {
        let width = radius * 2 + 1;
        let mut kernel = Vec::with_capacity(width as usize);
        for i in 0..width {
            let offset = i as f64 - radius as f64;
            kernel.push(gaussian_sample(offset, std_dev) as f32);
        }
        ConvolutionKernel {
            kernel,
            radius,
            threshold_min_change: 0.0,
            threshold_max_change: 0.0,
        }
    }

    /// Gaussian scaled so the weights sum to one.
    pub fn gaussian_normalized(std_dev: f64, radius: u32) -> ConvolutionKernel {
        let mut k = ConvolutionKernel::gaussian(std_dev, radius);
        let sum: f32 = k.kernel.iter().sum();
        if sum != 0.0 {
            for v in k.kernel.iter_mut() {
                *v /= sum;
            }
        }
        k
    }

    /// Unsharp mask: `2·identity - gaussian`, sums to one.
    pub fn gaussian_sharpen(std_dev: f64, radius: u32) -> ConvolutionKernel {
        let mut k = ConvolutionKernel::gaussian_normalized(std_dev, radius);
        for v in k.kernel.iter_mut() {
            *v = -*v;
        }
        k.kernel[radius as usize] += 2.0;
        k
    }

    pub fn sum(&self) -> f32 {
        self.kernel.iter().sum()
    }
}

fn gaussian_sample(offset: f64, std_dev: f64) -> f64 {
    (-(offset * offset) / (2.0 * std_dev * std_dev)).exp()
        / ((2.0 * ::std::f64::consts::PI).sqrt() * std_dev)
}

#[inline]
fn reflect(ix: isize, len: isize) -> usize {
    let mut ix = ix;
    loop {
        if ix < 0 {
            ix = -1 - ix;
        } else if ix >= len {
            ix = 2 * len - 1 - ix;
        } else {
            return ix as usize;
        }
    }
}

/// Convolves `convolve_channels` of each pixel over a row range, reflecting
/// at the edges. The remaining channels (alpha, typically) pass through.
pub fn convolve_rows(
    buf: &mut BitmapFloat,
    kernel: &ConvolutionKernel,
    convolve_channels: u32,
    from_row: u32,
    row_count: u32,
) -> Result<()> {
    let channels = buf.channels as usize;
    let convolve_channels = (convolve_channels as usize).min(channels);
    let w = buf.w as isize;
    if from_row + row_count > buf.h {
        return Err(err!(StatusCode::InvalidArgument));
    }
    if kernel.kernel.len() as isize > 2 * w {
        return Err(err!(
            StatusCode::InvalidArgument,
            "kernel wider than twice the row"
        ));
    }
    let use_threshold = kernel.threshold_min_change != 0.0 || kernel.threshold_max_change != 0.0;

    for y in from_row..from_row + row_count {
        let original = buf.row(y).to_vec();
        let row = buf.row_mut(y);
        for x in 0..w {
            let mut acc = [0f32; 4];
            for (k, weight) in kernel.kernel.iter().enumerate() {
                let sx = reflect(x - kernel.radius as isize + k as isize, w);
                for c in 0..convolve_channels {
                    acc[c] += weight * original[sx * channels + c];
                }
            }
            let base = x as usize * channels;
            if use_threshold {
                let mut change = 0f32;
                for c in 0..convolve_channels {
                    change += (acc[c] - original[base + c]).abs();
                }
                if change < kernel.threshold_min_change || change > kernel.threshold_max_change {
                    continue;
                }
            }
            for c in 0..convolve_channels {
                row[base + c] = acc[c];
            }
        }
    }
    Ok(())
}

/// 3-tap horizontal blur-and-difference. `pct` of 100 subtracts a full
/// neighbor blur; 0 is the identity. Row ends are left untouched.
pub fn sharpen_rows(buf: &mut BitmapFloat, from_row: u32, row_count: u32, pct: f64) -> Result<()> {
    if from_row + row_count > buf.h {
        return Err(err!(StatusCode::InvalidArgument));
    }
    if pct == 0.0 || buf.w < 3 {
        return Ok(());
    }
    let n = -pct / (pct - 200.0);
    let c_o = (-n) as f32;
    let c_i = (n * 2.0 + 1.0) as f32;
    let channels = buf.channels as usize;
    let w = buf.w as usize;

    for y in from_row..from_row + row_count {
        let original = buf.row(y).to_vec();
        let row = buf.row_mut(y);
        for x in 1..w - 1 {
            for c in 0..channels {
                let left = original[(x - 1) * channels + c];
                let cur = original[x * channels + c];
                let right = original[(x + 1) * channels + c];
                row[x * channels + c] = left * c_o + cur * c_i + right * c_o;
            }
        }
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------

/// Box-chain approximation of a Gaussian blur.

/// Picks the three box widths whose chained variance best matches `sigma`.
fn boxes_for_gauss(sigma: f64) -> [usize; 3] {
    let n = 3.0;
    let w_ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();
    let mut wl = w_ideal.floor() as i64;
    if wl % 2 == 0 {
        wl -= 1;
    }
    if wl < 1 {
        wl = 1;
    }
    let wu = wl + 2;
    let m_ideal = (12.0 * sigma * sigma - n * (wl * wl) as f64 - 4.0 * n * wl as f64 - 3.0 * n)
        / (-4.0 * wl as f64 - 4.0);
    let m = m_ideal.round().max(0.0).min(3.0) as usize;
    let mut widths = [0usize; 3];
    for (i, w) in widths.iter_mut().enumerate() {
        *w = if i < m { wl as usize } else { wu as usize };
    }
    widths
}

fn box_blur_row(original: &[f32], row: &mut [f32], channels: usize, w: usize, radius: usize) {
    let iw = w as isize;
    let weight = 1.0 / (2 * radius + 1) as f32;
    for c in 0..channels {
        // Prime the accumulator over the reflected leading window.
        let mut acc = 0f32;
        for i in -(radius as isize)..=(radius as isize) {
            acc += original[reflect(i, iw) * channels + c];
        }
        row[c] = acc * weight;
        for x in 1..w {
            let leaving = reflect(x as isize - 1 - radius as isize, iw);
            let entering = reflect(x as isize + radius as isize, iw);
            acc += original[entering * channels + c] - original[leaving * channels + c];
            row[x * channels + c] = acc * weight;
        }
    }
}

/// Approximates a Gaussian of the given sigma with three successive box
/// blurs per row.
pub fn approx_gaussian_blur_rows(
    buf: &mut BitmapFloat,
    sigma: f32,
    from_row: u32,
    row_count: u32,
) -> Result<()> {
    if from_row + row_count > buf.h {
        return Err(err!(StatusCode::InvalidArgument));
    }
    let widths = boxes_for_gauss(sigma as f64);
    let channels = buf.channels as usize;
    let w = buf.w as usize;
    for y in from_row..from_row + row_count {
        for width in widths.iter() {
            let radius = (width - 1) / 2;
            if radius == 0 {
                continue;
            }
            let original = buf.row(y).to_vec();
            box_blur_row(&original, buf.row_mut(y), channels, w, radius);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth_test_row(w: u32, channels: u32) -> BitmapFloat {
        let mut buf = BitmapFloat::create(w, 1, channels).unwrap();
        for x in 0..w as usize {
            let v = 0.5 + 0.45 * ((x as f32) * 0.13).sin();
            for c in 0..channels as usize {
                buf.pixels[x * channels as usize + c] = v * (1.0 - 0.1 * c as f32);
            }
        }
        buf
    }

    #[test]
    fn test_normalized_gaussian_sums_to_one() {
        let k = ConvolutionKernel::gaussian_normalized(1.4, 5);
        assert!((k.sum() - 1.0).abs() < 1e-5);
        let sharpen = ConvolutionKernel::gaussian_sharpen(1.4, 5);
        assert!((sharpen.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_convolve_constant_row_is_identity() {
        let mut buf = BitmapFloat::create(64, 1, 4).unwrap();
        for v in buf.pixels.iter_mut() {
            *v = 0.42;
        }
        let k = ConvolutionKernel::gaussian_normalized(2.0, 4);
        convolve_rows(&mut buf, &k, 4, 0, 1).unwrap();
        for v in buf.pixels.iter() {
            assert!((v - 0.42).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sharpen_zero_percent_is_identity() {
        let mut buf = smooth_test_row(40, 3);
        let reference = buf.pixels.clone();
        sharpen_rows(&mut buf, 0, 1, 0.0).unwrap();
        assert_eq!(buf.pixels, reference);
    }

    #[test]
    fn test_sharpen_increases_local_contrast() {
        let mut buf = BitmapFloat::create(5, 1, 1).unwrap();
        buf.pixels.copy_from_slice(&[0.2, 0.2, 0.8, 0.2, 0.2]);
        sharpen_rows(&mut buf, 0, 1, 100.0).unwrap();
        // Center spike grows, neighbors drop.
        assert!(buf.pixels[2] > 0.8);
        assert!(buf.pixels[1] < 0.2);
        // Row ends untouched.
        assert_eq!(buf.pixels[0], 0.2);
        assert_eq!(buf.pixels[4], 0.2);
    }

    #[test]
    fn test_threshold_band_skips_small_changes() {
        let mut buf = smooth_test_row(64, 1);
        let reference = buf.pixels.clone();
        let mut k = ConvolutionKernel::gaussian_normalized(2.0, 4);
        k.threshold_min_change = 10.0; // nothing changes this much
        k.threshold_max_change = 100.0;
        convolve_rows(&mut buf, &k, 1, 0, 1).unwrap();
        assert_eq!(buf.pixels, reference);
    }

    #[test]
    fn test_gaussian_approximation_matches_explicit_kernel() {
        let sigma = 2.0f32;
        let w = 300u32;
        let approx = {
            let mut buf = smooth_test_row(w, 3);
            approx_gaussian_blur_rows(&mut buf, sigma, 0, 1).unwrap();
            buf
        };
        let exact = {
            let mut buf = smooth_test_row(w, 3);
            let radius = (sigma * 3.1151 - 0.5).ceil() as u32;
            let k = ConvolutionKernel::gaussian_normalized(sigma as f64, radius);
            convolve_rows(&mut buf, &k, 3, 0, 1).unwrap();
            buf
        };
        let mut max_delta = 0f32;
        let mut total = 0f64;
        for (a, b) in approx.pixels.iter().zip(exact.pixels.iter()) {
            let delta = (a - b).abs();
            max_delta = max_delta.max(delta);
            total += delta as f64;
        }
        let avg = total / approx.pixels.len() as f64;
        assert!(max_delta < 0.12, "max_delta {}", max_delta);
        assert!(avg < 0.03, "avg_delta {}", avg);
    }
}
