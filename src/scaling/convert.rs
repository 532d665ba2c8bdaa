//! Row traffic between `BitmapBgra` (sRGB bytes) and `BitmapFloat`
//! (premultiplied linear floats), plus the weighted 1-D row scaler.

use super::weights::PixelContributions;
use crate::bitmaps::{BitmapBgra, BitmapCompositingMode, BitmapFloat, PixelFormat};
use crate::color::ColorContext;
use crate::err;
use crate::error::{Result, StatusCode};

/// Converts `row_count` source rows to floatspace starting at
/// `dest.row(dest_row)`. Alpha (when carried) is scaled to [0,1]; if the
/// destination is premultiplied, color channels are multiplied through.
pub fn convert_srgb_to_linear(
    cc: &ColorContext,
    src: &BitmapBgra,
    from_row: u32,
    dest: &mut BitmapFloat,
    dest_row: u32,
    row_count: u32,
) -> Result<()> {
    if src.w != dest.w
        || from_row + row_count > src.h
        || dest_row + row_count > dest.h
    {
        return Err(err!(StatusCode::InvalidInternalState));
    }
    let from_step = src.fmt.bytes_per_pixel();
    let to_step = dest.channels as usize;
    if (from_step != 3 && from_step != 4) || (to_step != 3 && to_step != 4) {
        return Err(err!(
            StatusCode::UnsupportedPixelFormat,
            "cannot convert {} -> {} channels",
            from_step,
            to_step
        ));
    }
    let premultiply = dest.alpha_premultiplied && to_step == 4;
    let w = src.w as usize;
    let src_stride = src.stride as usize;
    let dest_stride = dest.float_stride as usize;

    src.pixels(|px| {
        for row in 0..row_count as usize {
            let src_start = (from_row as usize + row) * src_stride;
            let dst_start = (dest_row as usize + row) * dest_stride;
            for x in 0..w {
                let s = &px[src_start + x * from_step..src_start + (x + 1) * from_step];
                let d = dst_start + x * to_step;
                let out = &mut dest.pixels[d..d + to_step];
                out[0] = cc.srgb_to_floatspace(s[0]);
                out[1] = cc.srgb_to_floatspace(s[1]);
                out[2] = cc.srgb_to_floatspace(s[2]);
                if to_step == 4 {
                    let alpha = if from_step == 4 {
                        s[3] as f32 / 255.0
                    } else {
                        1.0
                    };
                    out[3] = alpha;
                    if premultiply {
                        out[0] *= alpha;
                        out[1] *= alpha;
                        out[2] *= alpha;
                    }
                }
            }
        }
    });
    Ok(())
}

#[inline]
fn clamp01(v: f32) -> f32 {
    if v < 0.0 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

struct ResolvedPixel {
    b: f32,
    g: f32,
    r: f32,
    a: f32,
}

/// Clamps, demultiplies, and composites one premultiplied linear source
/// pixel per the destination's compositing mode.
#[inline]
fn resolve_pixel(
    cc: &ColorContext,
    src: &[f32],
    channels: usize,
    premultiplied: bool,
    mode: BitmapCompositingMode,
    matte: &[f32; 4],
    dest_bytes: Option<&[u8]>,
    dest_has_alpha: bool,
) -> ResolvedPixel {
    let (mut b, mut g, mut r) = (src[0], src[1], src[2]);
    let sa = if channels == 4 { clamp01(src[3]) } else { 1.0 };

    if channels == 4 && mode != BitmapCompositingMode::ReplaceSelf {
        // Keep premultiplied while compositing.
        let (pb, pg, pr) = if premultiplied {
            (b, g, r)
        } else {
            (b * sa, g * sa, r * sa)
        };
        let (ub, ug, ur, ua) = match mode {
            BitmapCompositingMode::BlendWithMatte => {
                let ma = matte[3];
                (
                    pb + matte[0] * ma * (1.0 - sa),
                    pg + matte[1] * ma * (1.0 - sa),
                    pr + matte[2] * ma * (1.0 - sa),
                    sa + ma * (1.0 - sa),
                )
            }
            _ => {
                // Blend with whatever the canvas holds.
                let d = dest_bytes.expect("canvas bytes required for blending");
                let da = if dest_has_alpha {
                    d[3] as f32 / 255.0
                } else {
                    1.0
                };
                (
                    pb + cc.srgb_to_floatspace(d[0]) * da * (1.0 - sa),
                    pg + cc.srgb_to_floatspace(d[1]) * da * (1.0 - sa),
                    pr + cc.srgb_to_floatspace(d[2]) * da * (1.0 - sa),
                    sa + da * (1.0 - sa),
                )
            }
        };
        let demult = if ua > 0.0 { 1.0 / ua } else { 0.0 };
        return ResolvedPixel {
            b: clamp01(ub * demult),
            g: clamp01(ug * demult),
            r: clamp01(ur * demult),
            a: ua,
        };
    }

    // Overwrite path: just undo premultiplication.
    if channels == 4 && premultiplied && sa > 0.0 {
        let demult = 1.0 / sa;
        b *= demult;
        g *= demult;
        r *= demult;
    }
    ResolvedPixel {
        b: clamp01(b),
        g: clamp01(g),
        r: clamp01(r),
        a: sa,
    }
}

fn composite_rows(
    cc: &ColorContext,
    src: &BitmapFloat,
    from_row: u32,
    dest: &mut BitmapBgra,
    dest_row: u32,
    row_count: u32,
    from_col: u32,
    col_count: u32,
    transpose: bool,
) -> Result<()> {
    let dest_bpp = dest.fmt.bytes_per_pixel();
    if dest_bpp != 3 && dest_bpp != 4 {
        return Err(err!(StatusCode::UnsupportedPixelFormat));
    }
    let expected_w = from_col + col_count;
    if expected_w > src.w
        || (!transpose && (dest_row + row_count > dest.h || expected_w > dest.w))
        || (transpose && (dest_row + row_count > dest.w || expected_w > dest.h))
    {
        return Err(err!(StatusCode::InvalidInternalState));
    }

    let channels = src.channels as usize;
    let premultiplied = src.alpha_premultiplied;
    let dest_has_alpha = dest.fmt == PixelFormat::Bgra32;
    let mode = if channels == 4 {
        dest.compositing_mode
    } else {
        BitmapCompositingMode::ReplaceSelf
    };
    let matte = {
        let m = dest.matte_color;
        let ma = m[3] as f32 / 255.0;
        [
            cc.srgb_to_floatspace(m[0]),
            cc.srgb_to_floatspace(m[1]),
            cc.srgb_to_floatspace(m[2]),
            ma,
        ]
    };
    let dest_stride = dest.stride as usize;

    for row in 0..row_count as usize {
        let src_row = src.row(from_row + row as u32);
        for col in 0..col_count as usize {
            let sp = (from_col as usize + col) * channels;
            // (row, col) in the float buffer lands at (dest_row + row, col)
            // straight, or at (col, dest_row + row) when pivoting.
            let byte_offset = if transpose {
                (from_col as usize + col) * dest_stride + (dest_row as usize + row) * dest_bpp
            } else {
                (dest_row as usize + row) * dest_stride + (from_col as usize + col) * dest_bpp
            };
            let resolved = {
                let spx = &src_row[sp..sp + channels];
                if mode == BitmapCompositingMode::BlendWithSelf && channels == 4 {
                    let existing =
                        dest.pixels(|px| [px[byte_offset], px[byte_offset + 1], px[byte_offset + 2], if dest_bpp == 4 { px[byte_offset + 3] } else { 255 }]);
                    resolve_pixel(
                        cc,
                        spx,
                        channels,
                        premultiplied,
                        mode,
                        &matte,
                        Some(&existing[..]),
                        dest_has_alpha,
                    )
                } else {
                    resolve_pixel(cc, spx, channels, premultiplied, mode, &matte, None, dest_has_alpha)
                }
            };
            dest.pixels_mut(|px| {
                px[byte_offset] = cc.floatspace_to_srgb(resolved.b);
                px[byte_offset + 1] = cc.floatspace_to_srgb(resolved.g);
                px[byte_offset + 2] = cc.floatspace_to_srgb(resolved.r);
                if dest_bpp == 4 {
                    px[byte_offset + 3] = if channels == 4 {
                        (clamp01(resolved.a) * 255.0 + 0.5) as u8
                    } else {
                        0xFF
                    };
                }
            });
        }
    }
    Ok(())
}

/// The inverse of `convert_srgb_to_linear`, with optional transposition:
/// float row `r` lands in destination row `dest_row + r`, or in column
/// `dest_row + r` when `transpose` is set.
pub fn pivoting_composite_linear_over_srgb(
    cc: &ColorContext,
    src: &BitmapFloat,
    from_row: u32,
    dest: &mut BitmapBgra,
    dest_row: u32,
    row_count: u32,
    transpose: bool,
) -> Result<()> {
    composite_rows(cc, src, from_row, dest, dest_row, row_count, 0, src.w, transpose)
}

/// Column-windowed overwrite used by the fused 2-D pass.
pub fn copy_linear_over_srgb(
    cc: &ColorContext,
    src: &BitmapFloat,
    from_row: u32,
    dest: &mut BitmapBgra,
    dest_row: u32,
    row_count: u32,
    from_col: u32,
    col_count: u32,
    transpose: bool,
) -> Result<()> {
    composite_rows(
        cc, src, from_row, dest, dest_row, row_count, from_col, col_count, transpose,
    )
}

/// Removes premultiplication in place over a row range.
pub fn demultiply_alpha(src: &mut BitmapFloat, from_row: u32, row_count: u32) -> Result<()> {
    if src.channels != 4 {
        return Err(err!(StatusCode::InvalidArgument));
    }
    for y in from_row..from_row + row_count {
        let row = src.row_mut(y);
        for px in row.chunks_mut(4) {
            let a = px[3];
            if a > 0.0 {
                px[0] /= a;
                px[1] /= a;
                px[2] /= a;
            }
        }
    }
    src.alpha_premultiplied = false;
    Ok(())
}

//--------------------------------------------------------------------------------------------------

/// Applies one contribution row to one float row.
pub fn scale_row(
    source: &[f32],
    from_step: usize,
    dest: &mut [f32],
    to_step: usize,
    weights: &[PixelContributions],
) {
    let min_channels = from_step.min(to_step);
    for (ndx, contrib) in weights.iter().enumerate() {
        let mut avg = [0f32; 4];
        for (i, weight) in contrib.weights.iter().enumerate() {
            let base = (contrib.left as usize + i) * from_step;
            for j in 0..min_channels {
                avg[j] += weight * source[base + j];
            }
        }
        let out = &mut dest[ndx * to_step..ndx * to_step + min_channels];
        out.copy_from_slice(&avg[..min_channels]);
    }
}

/// Scales `row_count` rows of `from` horizontally into `to` using the
/// precomputed weights.
pub fn scale_rows(
    from: &BitmapFloat,
    from_row: u32,
    to: &mut BitmapFloat,
    to_row: u32,
    row_count: u32,
    weights: &[PixelContributions],
) -> Result<()> {
    let from_step = from.channels as usize;
    let to_step = to.channels as usize;
    if from_step.min(to_step) > 4 {
        return Err(err!(StatusCode::InvalidInternalState));
    }
    for row in 0..row_count {
        let src_start = ((from_row + row) * from.float_stride) as usize;
        let src_end = src_start + (from.w as usize) * from_step;
        let dst_start = ((to_row + row) * to.float_stride) as usize;
        let dst_end = dst_start + (to.w as usize) * to_step;
        // Split borrows: rows never overlap because `from` and `to` are
        // distinct buffers.
        let source = &from.pixels[src_start..src_end];
        let dest = &mut to.pixels[dst_start..dst_end];
        scale_row(source, from_step, dest, to_step, weights);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::AllocationLedger;
    use crate::color::WorkingFloatspace;
    use crate::scaling::weights::{Filter, InterpolationDetails, LineContributions};

    #[test]
    fn test_convert_roundtrip_preserves_bytes() {
        let ledger = AllocationLedger::new();
        let cc = ColorContext::new(WorkingFloatspace::Linear, 2.2);
        let mut src = BitmapBgra::create(&ledger, 4, 2, PixelFormat::Bgra32).unwrap();
        let stride = src.stride as usize;
        src.pixels_mut(|px| {
            for (i, v) in px.iter_mut().enumerate() {
                *v = ((i * 31) % 256) as u8;
            }
            // keep alpha opaque so premultiplication is lossless
            for y in 0..2 {
                for x in 0..4 {
                    px[y * stride + x * 4 + 3] = 255;
                }
            }
        });
        let mut float = BitmapFloat::create(4, 2, 4).unwrap();
        convert_srgb_to_linear(&cc, &src, 0, &mut float, 0, 2).unwrap();

        let mut dest = BitmapBgra::create(&ledger, 4, 2, PixelFormat::Bgra32).unwrap();
        dest.compositing_mode = BitmapCompositingMode::ReplaceSelf;
        pivoting_composite_linear_over_srgb(&cc, &float, 0, &mut dest, 0, 2, false).unwrap();
        assert!(BitmapBgra::compare(&src, &dest));
    }

    #[test]
    fn test_transpose_write() {
        let ledger = AllocationLedger::new();
        let cc = ColorContext::new(WorkingFloatspace::Linear, 2.2);
        let mut src = BitmapBgra::create(&ledger, 3, 2, PixelFormat::Bgra32).unwrap();
        src.fill_rect(0, 0, 3, 1, 0xFF0000FF).unwrap(); // row 0 blue
        src.fill_rect(0, 1, 3, 2, 0xFFFF0000).unwrap(); // row 1 red

        let mut float = BitmapFloat::create(3, 2, 4).unwrap();
        convert_srgb_to_linear(&cc, &src, 0, &mut float, 0, 2).unwrap();

        let mut dest = BitmapBgra::create(&ledger, 2, 3, PixelFormat::Bgra32).unwrap();
        dest.compositing_mode = BitmapCompositingMode::ReplaceSelf;
        pivoting_composite_linear_over_srgb(&cc, &float, 0, &mut dest, 0, 2, true).unwrap();

        // Source row 0 becomes destination column 0.
        assert_eq!(dest.get_pixel(0, 0), vec![0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(dest.get_pixel(0, 2), vec![0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(dest.get_pixel(1, 1), vec![0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_scale_rows_averages_in_linear_space() {
        // A 2px row of equal values halves to the same value.
        let mut from = BitmapFloat::create(2, 1, 4).unwrap();
        from.pixels.copy_from_slice(&[0.25, 0.5, 0.75, 1.0, 0.25, 0.5, 0.75, 1.0]);
        let mut to = BitmapFloat::create(1, 1, 4).unwrap();
        let details = InterpolationDetails::from_filter(Filter::Box);
        let contrib = LineContributions::create(1, 2, &details).unwrap();
        scale_rows(&from, 0, &mut to, 0, 1, &contrib.rows).unwrap();
        for (out, expected) in to.pixels.iter().zip(&[0.25f32, 0.5, 0.75, 1.0]) {
            assert!((out - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_blend_with_matte_fills_transparent_source() {
        let ledger = AllocationLedger::new();
        let cc = ColorContext::new(WorkingFloatspace::Linear, 2.2);
        // Fully transparent source pixel over an opaque green matte.
        let mut float = BitmapFloat::create(1, 1, 4).unwrap();
        float.pixels.copy_from_slice(&[0.0, 0.0, 0.0, 0.0]);

        let mut dest = BitmapBgra::create(&ledger, 1, 1, PixelFormat::Bgra32).unwrap();
        dest.compositing_mode = BitmapCompositingMode::BlendWithMatte;
        dest.matte_color = [0x00, 0xFF, 0x00, 0xFF]; // sRGBA green
        pivoting_composite_linear_over_srgb(&cc, &float, 0, &mut dest, 0, 1, false).unwrap();
        let px = dest.get_pixel(0, 0);
        assert_eq!(px[0], 0x00);
        assert_eq!(px[1], 0xFF);
        assert_eq!(px[2], 0x00);
        assert_eq!(px[3], 0xFF);
    }
}
