//! Working floatspace configuration and sRGB transfer functions.
//!
//! The 256-entry forward LUT is rebuilt whenever the floatspace changes;
//! the reverse direction uses the analytic transfer function.

/// The space scaling and filtering arithmetic happens in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkingFloatspace {
    /// No conversion; bytes map linearly onto [0,1].
    AsIs,
    /// Standard piecewise sRGB <-> linear-light.
    Linear,
    /// Power curve with a caller-chosen exponent.
    Gamma,
}

pub fn srgb_to_linear(s: f32) -> f32 {
    if s <= 0.04045 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(clamped_linear: f32) -> f32 {
    if clamped_linear <= 0.0031308 {
        12.92 * clamped_linear * 255.0
    } else {
        1.055 * 255.0 * clamped_linear.powf(0.41666666) - 14.025
    }
}

fn uchar_clamp_ff(f: f32) -> u8 {
    let rounded = (f + 0.5).floor();
    if rounded < 0.0 {
        0
    } else if rounded > 255.0 {
        255
    } else {
        rounded as u8
    }
}

//--------------------------------------------------------------------------------------------------

/// Per-context colorspace state: the forward LUT plus the gamma pair.
pub struct ColorContext {
    floatspace: WorkingFloatspace,
    byte_to_float: [f32; 256],
    gamma: f32,
    gamma_inverse: f32,
}

impl ColorContext {
    pub fn new(floatspace: WorkingFloatspace, gamma: f32) -> ColorContext {
        let mut cc = ColorContext {
            floatspace,
            byte_to_float: [0f32; 256],
            gamma,
            gamma_inverse: if gamma != 0.0 { 1.0 / gamma } else { 0.0 },
        };
        for n in 0..256 {
            let s = n as f32 / 255.0;
            cc.byte_to_float[n] = match floatspace {
                WorkingFloatspace::AsIs => s,
                WorkingFloatspace::Linear => srgb_to_linear(s),
                WorkingFloatspace::Gamma => s.powf(cc.gamma),
            };
        }
        cc
    }

    pub fn floatspace(&self) -> WorkingFloatspace {
        self.floatspace
    }

    #[inline]
    pub fn srgb_to_floatspace(&self, b: u8) -> f32 {
        self.byte_to_float[b as usize]
    }

    #[inline]
    pub fn floatspace_to_srgb(&self, v: f32) -> u8 {
        let clamped = if v < 0.0 {
            0.0
        } else if v > 1.0 {
            1.0
        } else {
            v
        };
        match self.floatspace {
            WorkingFloatspace::AsIs => uchar_clamp_ff(clamped * 255.0),
            WorkingFloatspace::Linear => uchar_clamp_ff(linear_to_srgb(clamped)),
            WorkingFloatspace::Gamma => uchar_clamp_ff(clamped.powf(self.gamma_inverse) * 255.0),
        }
    }
}

impl Default for ColorContext {
    fn default() -> ColorContext {
        ColorContext::new(WorkingFloatspace::Linear, 2.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip_is_identity() {
        for space in &[
            WorkingFloatspace::AsIs,
            WorkingFloatspace::Linear,
            WorkingFloatspace::Gamma,
        ] {
            let cc = ColorContext::new(*space, 2.2);
            for b in 0..=255u8 {
                let f = cc.srgb_to_floatspace(b);
                assert_eq!(
                    cc.floatspace_to_srgb(f),
                    b,
                    "roundtrip failed for byte {} in {:?}",
                    b,
                    space
                );
            }
        }
    }

    #[test]
    fn test_gray_roundtrip_close() {
        for i in 0..=1000 {
            let x = i as f32 / 1000.0;
            let rt = srgb_to_linear(linear_to_srgb(srgb_to_linear(x)) / 255.0);
            let direct = srgb_to_linear(x);
            assert!(
                (rt - direct).abs() < 1e-5,
                "x={} roundtrip={} direct={}",
                x,
                rt,
                direct
            );
        }
    }

    #[test]
    fn test_transfer_function_pivot() {
        // The piecewise segments meet near s = 0.04045.
        let low = srgb_to_linear(0.04045);
        let high = srgb_to_linear(0.040451);
        assert!((low - high).abs() < 1e-5);
    }
}
