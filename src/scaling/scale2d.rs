//! The fused 2-D pass: vertical scaling through a small ring of linear
//! float rows, then a horizontal pass over the accumulator, one output row
//! at a time. Avoids the full transposed intermediate of the two-pass path.

use super::convert::{convert_srgb_to_linear, copy_linear_over_srgb, scale_row};
use super::weights::{Filter, InterpolationDetails, LineContributions};
use crate::bitmaps::{BitmapBgra, BitmapCompositingMode, BitmapFloat, PixelFormat};
use crate::color::{ColorContext, WorkingFloatspace};
use crate::err;
use crate::error::{Result, StatusCode};

#[derive(Clone, Debug)]
pub struct Scale2dParams {
    pub scale_to_width: u32,
    pub scale_to_height: u32,
    pub interpolation_filter: Filter,
    pub scale_in_colorspace: WorkingFloatspace,
    pub sharpen_percent_goal: f32,
}

/// Vertical weights below this magnitude contribute nothing visible and
/// are skipped entirely.
const NEGLIGIBLE_WEIGHT: f32 = 0.002;

pub fn scale2d_render_to_canvas_1d(
    input: &BitmapBgra,
    canvas: &mut BitmapBgra,
    info: &Scale2dParams,
) -> Result<()> {
    if info.scale_to_height != canvas.h || info.scale_to_width != canvas.w {
        // Would require cropping the target canvas.
        return Err(err!(StatusCode::NotImplemented));
    }
    if input.fmt != PixelFormat::Bgra32 || canvas.fmt != PixelFormat::Bgra32 {
        return Err(err!(StatusCode::NotImplemented));
    }
    let details = InterpolationDetails::from_filter(info.interpolation_filter);
    let cc = ColorContext::new(info.scale_in_colorspace, 2.2);

    let contrib_v = LineContributions::create(info.scale_to_height, input.h, &details)?;
    let contrib_h = LineContributions::create(info.scale_to_width, input.w, &details)?;

    let max_input_rows = contrib_v.max_input_span() as usize;
    let row_floats = 4 * input.w as usize;

    // Ring of vertically-weighted source rows plus one accumulator.
    let mut rows: Vec<Vec<f32>> = (0..max_input_rows).map(|_| vec![0f32; row_floats]).collect();
    let mut row_coefficients = vec![1f32; max_input_rows];
    let mut row_indexes = vec![-1i64; max_input_rows];
    let mut accumulator = vec![0f32; row_floats];

    let mut loader = BitmapFloat::create(input.w, 1, 4)?;
    loader.alpha_meaningful = input.alpha_meaningful;
    loader.alpha_premultiplied = true;

    let mut dest_buf = BitmapFloat::create(info.scale_to_width, 1, 4)?;
    dest_buf.alpha_meaningful = loader.alpha_meaningful;
    dest_buf.alpha_premultiplied = loader.alpha_premultiplied;

    canvas.compositing_mode = BitmapCompositingMode::ReplaceSelf;

    for out_row in 0..canvas.h {
        let contrib = &contrib_v.rows[out_row as usize];
        for v in accumulator.iter_mut() {
            *v = 0.0;
        }

        for input_row in contrib.left..=contrib.right {
            // Reuse the row if some earlier output row already loaded it.
            let mut active = row_indexes
                .iter()
                .position(|&ix| ix == input_row as i64);
            let mut loaded = active.is_some();
            if !loaded {
                // Evict a slot no remaining output row can need.
                active = row_indexes.iter().position(|&ix| ix < contrib.left as i64);
            }
            let active = match active {
                Some(ix) => ix,
                None => {
                    // max_input_rows was computed wrong.
                    return Err(err!(StatusCode::InvalidInternalState, "row ring too small"));
                }
            };
            if !loaded {
                convert_srgb_to_linear(&cc, input, input_row, &mut loader, 0, 1)?;
                rows[active].copy_from_slice(&loader.pixels);
                row_coefficients[active] = 1.0;
                row_indexes[active] = input_row as i64;
                loaded = true;
            }
            debug_assert!(loaded);

            let weight = contrib.weights[(input_row - contrib.left) as usize];
            if weight.abs() > NEGLIGIBLE_WEIGHT {
                // Rows stay scaled by their last weight; only the delta is
                // applied on reuse.
                let delta_coefficient = weight / row_coefficients[active];
                for v in rows[active].iter_mut() {
                    *v *= delta_coefficient;
                }
                row_coefficients[active] = weight;

                for (acc, v) in accumulator.iter_mut().zip(rows[active].iter()) {
                    *acc += v;
                }
            }
        }

        // The accumulator now holds the vertically-scaled row.
        scale_row(&accumulator, 4, &mut dest_buf.pixels, 4, &contrib_h.rows);
        copy_linear_over_srgb(
            &cc,
            &dest_buf,
            0,
            canvas,
            out_row,
            1,
            0,
            info.scale_to_width,
            false,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::AllocationLedger;
    use crate::scaling::render1d::{render_to_canvas_1d, Render1dParams};

    fn params(w: u32, h: u32, filter: Filter) -> Scale2dParams {
        Scale2dParams {
            scale_to_width: w,
            scale_to_height: h,
            interpolation_filter: filter,
            scale_in_colorspace: WorkingFloatspace::Linear,
            sharpen_percent_goal: 0.0,
        }
    }

    #[test]
    fn test_constant_color_survives_2d_scale() {
        let ledger = AllocationLedger::new();
        let mut input = BitmapBgra::create(&ledger, 23, 17, PixelFormat::Bgra32).unwrap();
        input.fill_rect(0, 0, 23, 17, 0xFF47A3C9).unwrap();
        let mut canvas = BitmapBgra::create(&ledger, 9, 5, PixelFormat::Bgra32).unwrap();
        scale2d_render_to_canvas_1d(&input, &mut canvas, &params(9, 5, Filter::Robidoux)).unwrap();
        for y in 0..5 {
            for x in 0..9 {
                let px = canvas.get_pixel(x, y);
                assert!((px[0] as i32 - 0xC9).abs() <= 1, "{:?}", px);
                assert!((px[1] as i32 - 0xA3).abs() <= 1);
                assert!((px[2] as i32 - 0x47).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let ledger = AllocationLedger::new();
        let input = BitmapBgra::create(&ledger, 8, 8, PixelFormat::Bgra32).unwrap();
        let mut canvas = BitmapBgra::create(&ledger, 4, 4, PixelFormat::Bgra32).unwrap();
        assert!(scale2d_render_to_canvas_1d(&input, &mut canvas, &params(4, 5, Filter::Robidoux))
            .is_err());
    }

    #[test]
    fn test_matches_two_pass_render_within_rounding() {
        let ledger = AllocationLedger::new();
        let mut input = BitmapBgra::create(&ledger, 16, 12, PixelFormat::Bgra32).unwrap();
        // Horizontal gradient with opaque alpha.
        let stride = input.stride as usize;
        input.pixels_mut(|px| {
            for y in 0..12usize {
                for x in 0..16usize {
                    px[y * stride + x * 4] = (x * 16) as u8;
                    px[y * stride + x * 4 + 1] = (y * 20) as u8;
                    px[y * stride + x * 4 + 2] = 0x80;
                    px[y * stride + x * 4 + 3] = 0xFF;
                }
            }
        });

        let mut fused = BitmapBgra::create(&ledger, 8, 6, PixelFormat::Bgra32).unwrap();
        scale2d_render_to_canvas_1d(&input, &mut fused, &params(8, 6, Filter::Triangle)).unwrap();

        // Two transposing 1-D passes, like the Scale node lowers to.
        let mut transposed = BitmapBgra::create(&ledger, 12, 8, PixelFormat::Bgra32).unwrap();
        render_to_canvas_1d(
            &input,
            &mut transposed,
            &Render1dParams::simple(8, true, Filter::Triangle),
        )
        .unwrap();
        let mut two_pass = BitmapBgra::create(&ledger, 8, 6, PixelFormat::Bgra32).unwrap();
        render_to_canvas_1d(
            &transposed,
            &mut two_pass,
            &Render1dParams::simple(6, true, Filter::Triangle),
        )
        .unwrap();

        for y in 0..6 {
            for x in 0..8 {
                let a = fused.get_pixel(x, y);
                let b = two_pass.get_pixel(x, y);
                for c in 0..4 {
                    assert!(
                        (a[c] as i32 - b[c] as i32).abs() <= 2,
                        "({}, {}) {:?} vs {:?}",
                        x,
                        y,
                        a,
                        b
                    );
                }
            }
        }
    }
}
