//! Interpolation filters and per-line contribution tables.
//!
//! Each output pixel gets the set of source indices that feed it plus
//! normalized weights; negative lobes can be scaled up to meet a sharpening
//! goal before normalization.

use crate::err;
use crate::error::{Result, StatusCode};
use smallvec::SmallVec;
use std::f64::consts::PI;

/// Weight epsilon used when sizing and clamping contribution windows.
const TONY: f64 = 0.00001;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    RobidouxFast = 1,
    Robidoux,
    RobidouxSharp,
    Ginseng,
    GinsengSharp,
    Lanczos,
    LanczosSharp,
    Lanczos2,
    Lanczos2Sharp,
    CubicFast,
    Cubic,
    CubicSharp,
    CatmullRom,
    Mitchell,
    CubicBSpline,
    Hermite,
    Jinc,
    RawLanczos3,
    RawLanczos3Sharp,
    RawLanczos2,
    RawLanczos2Sharp,
    Triangle,
    Linear,
    Box,
    CatmullRomFast,
    CatmullRomFastSharp,
    Fastest,
    MitchellFast,
}

impl Filter {
    pub const ALL: [Filter; 28] = [
        Filter::RobidouxFast,
        Filter::Robidoux,
        Filter::RobidouxSharp,
        Filter::Ginseng,
        Filter::GinsengSharp,
        Filter::Lanczos,
        Filter::LanczosSharp,
        Filter::Lanczos2,
        Filter::Lanczos2Sharp,
        Filter::CubicFast,
        Filter::Cubic,
        Filter::CubicSharp,
        Filter::CatmullRom,
        Filter::Mitchell,
        Filter::CubicBSpline,
        Filter::Hermite,
        Filter::Jinc,
        Filter::RawLanczos3,
        Filter::RawLanczos3Sharp,
        Filter::RawLanczos2,
        Filter::RawLanczos2Sharp,
        Filter::Triangle,
        Filter::Linear,
        Filter::Box,
        Filter::CatmullRomFast,
        Filter::CatmullRomFastSharp,
        Filter::Fastest,
        Filter::MitchellFast,
    ];
}

pub type FilterFn = fn(&InterpolationDetails, f64) -> f64;

pub struct InterpolationDetails {
    /// Support radius in source pixels (before downscale widening).
    pub window: f64,
    // Coefficients for the flex cubic
    pub p1: f64,
    pub p2: f64,
    pub p3: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
    /// Dividing by `blur` stretches the filter; under 1 sharpens it.
    pub blur: f64,
    filter: FilterFn,
    /// Percent (0..100) of negative-lobe area to aim for via lobe scaling.
    pub sharpen_percent_goal: f32,
}

fn derive_cubic_coefficients(b: f64, c: f64, out: &mut InterpolationDetails) {
    let bx2 = b + b;
    out.p1 = 1.0 - (1.0 / 3.0) * b;
    out.p2 = -3.0 + bx2 + c;
    out.p3 = 2.0 - 1.5 * b - c;
    out.q1 = (4.0 / 3.0) * b + 4.0 * c;
    out.q2 = -8.0 * c - bx2;
    out.q3 = b + 5.0 * c;
    out.q4 = (-1.0 / 6.0) * b - c;
}

fn filter_flex_cubic(d: &InterpolationDetails, x: f64) -> f64 {
    let t = x.abs() / d.blur;
    if t < 1.0 {
        d.p1 + t * (t * (d.p2 + t * d.p3))
    } else if t < 2.0 {
        d.q1 + t * (d.q2 + t * (d.q3 + t * d.q4))
    } else {
        0.0
    }
}

fn filter_bicubic_fast(d: &InterpolationDetails, t: f64) -> f64 {
    let abs_t = t.abs() / d.blur;
    let abs_t_sq = abs_t * abs_t;
    if abs_t < 1.0 {
        1.0 - 2.0 * abs_t_sq + abs_t_sq * abs_t
    } else if abs_t < 2.0 {
        4.0 - 8.0 * abs_t + 5.0 * abs_t_sq - abs_t_sq * abs_t
    } else {
        0.0
    }
}

fn filter_sinc(d: &InterpolationDetails, t: f64) -> f64 {
    let abs_t = t.abs() / d.blur;
    if abs_t == 0.0 {
        return 1.0; // avoid division by zero
    }
    if abs_t > d.window {
        return 0.0;
    }
    let a = abs_t * PI;
    a.sin() / a
}

fn filter_box(d: &InterpolationDetails, t: f64) -> f64 {
    let x = t / d.blur;
    if x >= -d.window && x < d.window {
        1.0
    } else {
        0.0
    }
}

fn filter_triangle(d: &InterpolationDetails, t: f64) -> f64 {
    let x = t.abs() / d.blur;
    if x < 1.0 {
        1.0 - x
    } else {
        0.0
    }
}

fn filter_sinc_windowed(d: &InterpolationDetails, t: f64) -> f64 {
    let x = t / d.blur;
    let abs_t = x.abs();
    if abs_t == 0.0 {
        return 1.0;
    }
    if abs_t > d.window {
        return 0.0;
    }
    d.window * (PI * x / d.window).sin() * (x * PI).sin() / (PI * PI * x * x)
}

fn filter_jinc(d: &InterpolationDetails, t: f64) -> f64 {
    let x = t.abs() / d.blur;
    if x == 0.0 {
        0.5 * PI
    } else {
        bessel_j1(PI * x) / x
    }
}

fn filter_ginseng(d: &InterpolationDetails, t: f64) -> f64 {
    // Sinc windowed by jinc
    let abs_t = t.abs() / d.blur;
    let t_pi = abs_t * PI;
    if abs_t == 0.0 {
        return 1.0;
    }
    if abs_t > 3.0 {
        return 0.0;
    }
    let jinc_input = 1.2196698912665045 * t_pi / d.window;
    let jinc_output = bessel_j1(jinc_input) / (jinc_input * 0.5);
    jinc_output * t_pi.sin() / t_pi
}

/// Bessel function of the first kind, order one. Rational approximation
/// (the platform `j1` is not reachable from stable Rust).
fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        let num = x
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1
                        + y * (-2972611.439 + y * (15704.48260 + y * -30.16036606)))));
        let den = 144725228442.0
            + y * (2300535178.0
                + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y))));
        num / den
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let p1 = 1.0
            + y * (0.183105e-2
                + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * -0.240337019e-6)));
        let p2 = 0.04687499995
            + y * (-0.2002690873e-3
                + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        let xx = ax - 2.356194491;
        let ans = (0.636619772 / ax).sqrt() * (xx.cos() * p1 - z * xx.sin() * p2);
        if x < 0.0 {
            -ans
        } else {
            ans
        }
    }
}

impl InterpolationDetails {
    fn defaults() -> InterpolationDetails {
        InterpolationDetails {
            window: 2.0,
            p1: 0.0,
            p2: 1.0,
            p3: 1.0,
            q1: 0.0,
            q2: 1.0,
            q3: 1.0,
            q4: 1.0,
            blur: 1.0,
            filter: filter_flex_cubic,
            sharpen_percent_goal: 0.0,
        }
    }

    pub fn create_custom(window: f64, blur: f64, filter: FilterFn) -> InterpolationDetails {
        let mut d = InterpolationDetails::defaults();
        d.blur = blur;
        d.window = window;
        d.filter = filter;
        d
    }

    pub fn create_bicubic_custom(window: f64, blur: f64, b: f64, c: f64) -> InterpolationDetails {
        let mut d = InterpolationDetails::defaults();
        d.blur = blur;
        d.window = window;
        derive_cubic_coefficients(b, c, &mut d);
        d.filter = filter_flex_cubic;
        d
    }

    pub fn from_filter(filter: Filter) -> InterpolationDetails {
        use self::Filter::*;
        match filter {
            Linear | Triangle => InterpolationDetails::create_custom(1.0, 1.0, filter_triangle),
            RawLanczos2 => InterpolationDetails::create_custom(2.0, 1.0, filter_sinc),
            RawLanczos3 => InterpolationDetails::create_custom(3.0, 1.0, filter_sinc),
            RawLanczos2Sharp => {
                InterpolationDetails::create_custom(2.0, 0.9549963639785485, filter_sinc)
            }
            RawLanczos3Sharp => {
                InterpolationDetails::create_custom(3.0, 0.9812505644269356, filter_sinc)
            }
            CubicBSpline => InterpolationDetails::create_bicubic_custom(2.0, 1.0, 1.0, 0.0),
            Lanczos2 => InterpolationDetails::create_custom(2.0, 1.0, filter_sinc_windowed),
            Lanczos => InterpolationDetails::create_custom(3.0, 1.0, filter_sinc_windowed),
            Lanczos2Sharp => {
                InterpolationDetails::create_custom(2.0, 0.9549963639785485, filter_sinc_windowed)
            }
            LanczosSharp => {
                InterpolationDetails::create_custom(3.0, 0.9812505644269356, filter_sinc_windowed)
            }
            CubicFast => InterpolationDetails::create_custom(1.0, 1.0, filter_bicubic_fast),
            Cubic => InterpolationDetails::create_bicubic_custom(2.0, 1.0, 0.0, 1.0),
            CubicSharp => {
                InterpolationDetails::create_bicubic_custom(2.0, 0.9549963639785485, 0.0, 1.0)
            }
            CatmullRom => InterpolationDetails::create_bicubic_custom(2.0, 1.0, 0.0, 0.5),
            CatmullRomFast => InterpolationDetails::create_bicubic_custom(1.0, 1.0, 0.0, 0.5),
            CatmullRomFastSharp => {
                InterpolationDetails::create_bicubic_custom(1.0, 13.0 / 16.0, 0.0, 0.5)
            }
            Mitchell => {
                InterpolationDetails::create_bicubic_custom(2.0, 7.0 / 8.0, 1.0 / 3.0, 1.0 / 3.0)
            }
            MitchellFast => {
                InterpolationDetails::create_bicubic_custom(1.0, 7.0 / 8.0, 1.0 / 3.0, 1.0 / 3.0)
            }
            Robidoux => InterpolationDetails::create_bicubic_custom(
                2.0,
                1.0 / 1.1685777620836932,
                0.37821575509399867,
                0.31089212245300067,
            ),
            Fastest => InterpolationDetails::create_bicubic_custom(
                0.74,
                0.74,
                0.37821575509399867,
                0.31089212245300067,
            ),
            RobidouxFast => InterpolationDetails::create_bicubic_custom(
                1.05,
                1.0 / 1.1685777620836932,
                0.37821575509399867,
                0.31089212245300067,
            ),
            RobidouxSharp => InterpolationDetails::create_bicubic_custom(
                2.0,
                1.0 / 1.105822933719019,
                0.2620145123990142,
                0.3689927438004929,
            ),
            Hermite => InterpolationDetails::create_bicubic_custom(1.0, 1.0, 0.0, 0.0),
            Box => InterpolationDetails::create_custom(0.5, 1.0, filter_box),
            Ginseng => InterpolationDetails::create_custom(3.0, 1.0, filter_ginseng),
            GinsengSharp => {
                InterpolationDetails::create_custom(3.0, 0.9812505644269356, filter_ginseng)
            }
            Jinc => InterpolationDetails::create_custom(3.0, 1.0 / 1.2196698912665045, filter_jinc),
        }
    }

    #[inline]
    pub fn evaluate(&self, t: f64) -> f64 {
        (self.filter)(self, t)
    }

    /// Ratio of negative to positive area under the filter, sampled with
    /// the trapezoid rule over the support window.
    pub fn percent_negative_weight(&self) -> f64 {
        let samples = 50;
        let step = self.window / samples as f64;
        let mut last_height = self.evaluate(-step);
        let mut positive_area = 0f64;
        let mut negative_area = 0f64;
        for i in 0..=(samples + 2) {
            let height = self.evaluate(i as f64 * step);
            let area = (height + last_height) / 2.0 * step;
            last_height = height;
            if area > 0.0 {
                positive_area += area;
            } else {
                negative_area -= area;
            }
        }
        negative_area / positive_area
    }
}

//--------------------------------------------------------------------------------------------------

/// Source span and normalized weights for one output pixel.
#[derive(Clone, Debug)]
pub struct PixelContributions {
    pub left: u32,
    pub right: u32,
    pub weights: SmallVec<[f32; 8]>,
}

/// Contribution rows for a whole output line.
pub struct LineContributions {
    pub window_size: u32,
    pub line_length: u32,
    /// Negative/positive weight ratio across all rows, for diagnostics.
    pub percent_negative: f64,
    pub rows: Vec<PixelContributions>,
}

impl LineContributions {
    pub fn create(
        output_line_size: u32,
        input_line_size: u32,
        details: &InterpolationDetails,
    ) -> Result<LineContributions> {
        let sharpen_ratio = details.percent_negative_weight();
        let desired_sharpen_ratio = details.sharpen_percent_goal as f64 / 100.0;
        let extra_negative_weight = if sharpen_ratio > 0.0 && desired_sharpen_ratio > 0.0 {
            (desired_sharpen_ratio + sharpen_ratio) / sharpen_ratio
        } else {
            0.0
        };

        let scale_factor = output_line_size as f64 / input_line_size as f64;
        let downscale_factor = scale_factor.min(1.0);
        let half_source_window = details.window * 0.5 / downscale_factor;
        let allocated_window_size = (2.0 * (half_source_window - TONY)).ceil() as u32 + 1;

        let mut contrib = LineContributions {
            window_size: allocated_window_size,
            line_length: output_line_size,
            percent_negative: 0.0,
            rows: Vec::with_capacity(output_line_size as usize),
        };

        let mut negative_area = 0f64;
        let mut positive_area = 0f64;

        for u in 0..output_line_size {
            let center_src_pixel = (u as f64 + 0.5) / scale_factor - 0.5;

            let left_edge = (center_src_pixel - half_source_window - 0.5 + TONY).ceil() as i32;
            let right_edge = (center_src_pixel + half_source_window + 0.5 - TONY).floor() as i32;

            let left_src_pixel = left_edge.max(0) as u32;
            let right_src_pixel = right_edge.min(input_line_size as i32 - 1) as u32;

            let source_pixel_count = right_src_pixel - left_src_pixel + 1;
            if source_pixel_count > allocated_window_size {
                return Err(err!(
                    StatusCode::InvalidInternalState,
                    "contribution span {} exceeds window {}",
                    source_pixel_count,
                    allocated_window_size
                ));
            }

            let mut weights: SmallVec<[f32; 8]> = SmallVec::new();
            let mut total_weight = 0f64;
            for ix in left_src_pixel..=right_src_pixel {
                let mut add =
                    details.evaluate(downscale_factor * (ix as f64 - center_src_pixel));
                if add < 0.0 && extra_negative_weight != 0.0 {
                    add *= extra_negative_weight;
                }
                weights.push(add as f32);
                total_weight += add;
            }

            if total_weight <= TONY {
                return Err(err!(
                    StatusCode::InvalidInternalState,
                    "degenerate contribution row at output pixel {}",
                    u
                ));
            }

            let total_factor = (1.0 / total_weight) as f32;
            for w in weights.iter_mut() {
                *w *= total_factor;
                if *w < 0.0 {
                    negative_area -= *w as f64;
                } else {
                    positive_area += *w as f64;
                }
            }

            contrib.rows.push(PixelContributions {
                left: left_src_pixel,
                right: right_src_pixel,
                weights,
            });
        }
        contrib.percent_negative = negative_area / positive_area;
        Ok(contrib)
    }

    /// Largest per-row source span. The 2-D pass sizes its row cache with
    /// this.
    pub fn max_input_span(&self) -> u32 {
        self.rows
            .iter()
            .map(|r| r.right - r.left + 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The scaling grid the original weighting regression used.
    const SCALINGS: [(u32, u32); 22] = [
        (1, 1),
        (2, 1),
        (3, 1),
        (4, 1),
        (5, 1),
        (6, 1),
        (7, 1),
        (17, 1),
        (2, 3),
        (2, 4),
        (2, 5),
        (2, 17),
        (11, 7),
        (7, 3),
        (8, 8),
        (8, 7),
        (8, 6),
        (8, 5),
        (8, 4),
        (8, 3),
        (8, 2),
        (8, 1),
    ];

    /// One line per filter/scaling pair: every output pixel's normalized
    /// weights to six decimal places.
    fn format_weights_dump() -> String {
        let mut out = String::from("filter, from_width, to_width, weights");
        for filter in Filter::ALL.iter() {
            for &(from_width, to_width) in SCALINGS.iter() {
                let details = InterpolationDetails::from_filter(*filter);
                let lct = LineContributions::create(to_width, from_width, &details).unwrap();
                out.push_str(&format!(
                    "\nfilter_{:02} ({}px to {}px):",
                    *filter as i32, from_width, to_width
                ));
                for (u, row) in lct.rows.iter().enumerate() {
                    out.push_str(&format!(" x={} from (", u));
                    for (i, w) in row.weights.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                        }
                        out.push_str(&format!("{:.6}", w));
                    }
                    out.push_str("),");
                }
            }
        }
        out.push('\n');
        out
    }

    /// Whitespace-insensitive comparison against the committed table, so
    /// any drift in the weight pipeline shows up as a diff.
    #[test]
    fn test_weight_table_matches_reference() {
        let reference = include_str!("../../tests/reference_weights.txt");
        let current = format_weights_dump();

        let current_tokens: Vec<&str> = current.split_whitespace().collect();
        let reference_tokens: Vec<&str> = reference.split_whitespace().collect();
        if current_tokens != reference_tokens {
            let divergence = current_tokens
                .iter()
                .zip(reference_tokens.iter())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| current_tokens.len().min(reference_tokens.len()));
            let context_from = divergence.saturating_sub(4);
            let dump_path = ::std::env::temp_dir().join("rastergraph_weights.txt");
            let _ = ::std::fs::write(&dump_path, &current);
            panic!(
                "weight table diverged from tests/reference_weights.txt near token {}:\n  \
                 current:   {:?}\n  reference: {:?}\nfull dump written to {:?}",
                divergence,
                &current_tokens[context_from..(divergence + 1).min(current_tokens.len())],
                &reference_tokens[context_from..(divergence + 1).min(reference_tokens.len())],
                dump_path
            );
        }
    }

    #[test]
    fn test_weights_are_symmetric_and_bounded() {
        for filter in Filter::ALL.iter() {
            for &(from_width, to_width) in SCALINGS.iter() {
                let details = InterpolationDetails::from_filter(*filter);
                let lct = LineContributions::create(to_width, from_width, &details).unwrap();

                for output_pixel in 0..(lct.line_length / 2) as usize {
                    let opposite = lct.line_length as usize - 1 - output_pixel;
                    let current = &lct.rows[output_pixel];
                    let mirror = &lct.rows[opposite];

                    assert_eq!(
                        from_width - 1 - mirror.right,
                        current.left,
                        "outer bounds must be symmetrical: {:?} {}->{}",
                        filter,
                        from_width,
                        to_width
                    );
                    assert_eq!(from_width - 1 - current.right, mirror.left);

                    for ix in current.left..=current.right {
                        let a = current.weights[(ix - current.left) as usize];
                        let b = mirror.weights[(current.right - ix) as usize];
                        assert!(
                            (a - b).abs() < 0.00001,
                            "weights must mirror: {:?} {}->{} {} vs {}",
                            filter,
                            from_width,
                            to_width,
                            a,
                            b
                        );
                        assert!(a.abs() < 5.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_weight_rows_are_normalized() {
        for filter in Filter::ALL.iter() {
            for &(from_width, to_width) in SCALINGS.iter() {
                let details = InterpolationDetails::from_filter(*filter);
                let lct = LineContributions::create(to_width, from_width, &details).unwrap();
                for row in &lct.rows {
                    let sum: f32 = row.weights.iter().sum();
                    assert!(
                        (sum - 1.0).abs() < 1e-4,
                        "{:?} {}->{} row sums to {}",
                        filter,
                        from_width,
                        to_width,
                        sum
                    );
                }
            }
        }
    }

    #[test]
    fn test_identity_scaling_yields_unit_weight() {
        for filter in Filter::ALL.iter() {
            let details = InterpolationDetails::from_filter(*filter);
            let lct = LineContributions::create(1, 1, &details).unwrap();
            assert_eq!(lct.rows[0].left, 0);
            assert_eq!(lct.rows[0].right, 0);
            assert!((lct.rows[0].weights[0] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_box_downscale_two_to_one() {
        let details = InterpolationDetails::from_filter(Filter::Box);
        let lct = LineContributions::create(1, 2, &details).unwrap();
        assert_eq!(lct.rows[0].left, 0);
        assert_eq!(lct.rows[0].right, 1);
        assert!((lct.rows[0].weights[0] - 0.5).abs() < 1e-6);
        assert!((lct.rows[0].weights[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_filters_have_no_negative_weights() {
        for filter in &[
            Filter::Box,
            Filter::Triangle,
            Filter::Hermite,
            Filter::CubicBSpline,
        ] {
            for &(from_width, to_width) in SCALINGS.iter() {
                let details = InterpolationDetails::from_filter(*filter);
                let lct = LineContributions::create(to_width, from_width, &details).unwrap();
                for row in &lct.rows {
                    for w in row.weights.iter() {
                        assert!(
                            *w >= -1e-7,
                            "{:?} produced negative weight {}",
                            filter,
                            w
                        );
                    }
                }
            }
        }
    }

    /// Checks where the filter first crosses zero (in blurred input units),
    /// and that it vanishes beyond its support. A zero `expected_first_crossing`
    /// marks a smoothing filter, which must stay non-negative everywhere.
    fn check_filter(filter: Filter, expected_first_crossing: f64, support_end: f64) {
        let details = InterpolationDetails::from_filter(filter);
        let step = 0.0005;

        // Beyond the end of support everything must be (nearly) zero.
        let mut x = support_end + 0.06;
        while x < support_end + 2.0 {
            let v = details.evaluate(x);
            assert!(
                v.abs() < 0.0001,
                "{:?} has significant value {} at {} beyond its support {}",
                filter,
                v,
                x,
                support_end
            );
            x += 0.05;
        }

        if expected_first_crossing > 0.0 {
            // Scan for the first sign change from positive territory.
            let mut x = step;
            let mut crossing = None;
            while x < support_end {
                if details.evaluate(x) < 0.0 {
                    crossing = Some(x);
                    break;
                }
                x += step;
            }
            let crossing = crossing.unwrap_or_else(|| {
                panic!("{:?} never crossed zero before {}", filter, support_end)
            });
            assert!(
                (crossing - expected_first_crossing).abs() < 0.05,
                "{:?} first crossing at {} (expected {})",
                filter,
                crossing,
                expected_first_crossing
            );
        } else {
            // Smoothing filter: never negative within support.
            let mut x = 0.0;
            while x < support_end {
                assert!(details.evaluate(x) >= -1e-9);
                x += step;
            }
        }
    }

    #[test]
    fn test_filter_crossings() {
        // Support ends are window * blur; sharpened variants pick their blur
        // so the first crossing lands exactly on 1.0.
        check_filter(Filter::Hermite, 0.0, 1.0);
        check_filter(Filter::Triangle, 0.0, 1.0);
        check_filter(Filter::Box, 0.0, 0.51);
        check_filter(Filter::CubicBSpline, 0.0, 2.0);
        check_filter(Filter::CatmullRom, 1.0, 2.0);
        check_filter(Filter::CubicFast, 1.0, 2.0);
        check_filter(Filter::Cubic, 1.0, 2.0);
        check_filter(Filter::Mitchell, 1.0, 1.75);
        check_filter(Filter::Robidoux, 1.0, 1.7115);
        check_filter(Filter::RobidouxSharp, 1.0, 1.8087);
        check_filter(Filter::RawLanczos2, 1.0, 2.0);
        check_filter(Filter::RawLanczos2Sharp, 0.955, 1.91);
        check_filter(Filter::RawLanczos3, 1.0, 3.0);
        check_filter(Filter::RawLanczos3Sharp, 0.9813, 2.944);
        check_filter(Filter::Lanczos2, 1.0, 2.0);
        check_filter(Filter::Lanczos2Sharp, 0.955, 1.91);
        check_filter(Filter::Lanczos, 1.0, 3.0);
        check_filter(Filter::LanczosSharp, 0.9813, 2.944);
    }

    #[test]
    fn test_sharpen_goal_scales_negative_lobes() {
        let mut sharpened = InterpolationDetails::from_filter(Filter::CatmullRom);
        sharpened.sharpen_percent_goal = 30.0;
        let plain = InterpolationDetails::from_filter(Filter::CatmullRom);

        let with = LineContributions::create(4, 8, &sharpened).unwrap();
        let without = LineContributions::create(4, 8, &plain).unwrap();
        assert!(with.percent_negative > without.percent_negative);
    }
}
