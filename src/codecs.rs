//! The abstract codec contract and the per-context registry with
//! magic-byte probing. Concrete image formats plug in from outside; the
//! engine only drives this interface.

use crate::bitmaps::{BitmapBgra, PixelFormat};
use crate::err;
use crate::error::{Result, StatusCode};
use crate::io::{IoDirection, IoProxy};
use fxhash::FxHashMap;

#[derive(Clone, Debug)]
pub struct DecoderInfo {
    pub codec_id: i64,
    pub preferred_mime_type: &'static str,
    pub preferred_extension: &'static str,
    pub frame_count: usize,
    pub current_frame_index: i64,
    pub frame0_width: u32,
    pub frame0_height: u32,
    pub frame0_post_decode_format: PixelFormat,
}

#[derive(Copy, Clone, Debug)]
pub struct FrameInfo {
    pub w: u32,
    pub h: u32,
    pub format: PixelFormat,
}

#[derive(Copy, Clone, Debug)]
pub struct DecoderDownscaleHints {
    pub downscale_if_wider_than: i64,
    pub or_if_taller_than: i64,
    pub downscaled_min_width: i64,
    pub downscaled_min_height: i64,
    pub gamma_correct_for_srgb_during_spatial_luma_scaling: bool,
    pub scale_luma_spatially: bool,
}

impl Default for DecoderDownscaleHints {
    fn default() -> DecoderDownscaleHints {
        DecoderDownscaleHints {
            downscale_if_wider_than: -1,
            or_if_taller_than: -1,
            downscaled_min_width: -1,
            downscaled_min_height: -1,
            gamma_correct_for_srgb_during_spatial_luma_scaling: false,
            scale_luma_spatially: false,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct EncoderHints {
    pub jpeg_encode_quality: i32,
}

impl Default for EncoderHints {
    fn default() -> EncoderHints {
        EncoderHints {
            jpeg_encode_quality: 90,
        }
    }
}

/// Hooks a codec may implement. Anything left at the default reports
/// `Not_implemented`, matching an absent function pointer.
pub trait Codec {
    fn initialize(&mut self, _io: &mut IoProxy) -> Result<()> {
        Ok(())
    }

    fn get_info(&mut self, _io: &mut IoProxy) -> Result<DecoderInfo> {
        Err(err!(StatusCode::NotImplemented))
    }

    fn get_frame_info(&mut self, _io: &mut IoProxy) -> Result<FrameInfo> {
        Err(err!(StatusCode::NotImplemented))
    }

    fn switch_frame(&mut self, _io: &mut IoProxy, _frame_index: usize) -> Result<()> {
        Err(err!(StatusCode::NotImplemented))
    }

    fn set_downscale_hints(&mut self, _hints: &DecoderDownscaleHints) -> Result<()> {
        Ok(())
    }

    /// Fills `canvas`, which arrives pre-allocated at the frame's reported
    /// dimensions and format.
    fn read_frame(&mut self, _io: &mut IoProxy, _canvas: &mut BitmapBgra) -> Result<()> {
        Err(err!(StatusCode::NotImplemented))
    }

    fn write_frame(
        &mut self,
        _io: &mut IoProxy,
        _frame: &BitmapBgra,
        _hints: &EncoderHints,
    ) -> Result<()> {
        Err(err!(StatusCode::NotImplemented))
    }

    fn stringify(&self) -> Option<String> {
        None
    }
}

/// A registered codec: identity, probing patterns, and the factory the
/// engine calls when a stream matches.
pub struct CodecDefinition {
    pub codec_id: i64,
    pub name: &'static str,
    pub preferred_mime_type: &'static str,
    pub preferred_extension: &'static str,
    /// Prefix patterns that select this codec for decoding.
    pub magic_byte_sets: Vec<Vec<u8>>,
    pub factory: fn() -> Box<dyn Codec>,
}

/// Longest magic-byte prefix any registered codec wants to inspect.
pub const MAGIC_BYTE_PROBE_LENGTH: usize = 8;

#[derive(Default)]
pub struct CodecRegistry {
    defs: Vec<CodecDefinition>,
    by_id: FxHashMap<i64, usize>,
}

impl CodecRegistry {
    pub fn new() -> CodecRegistry {
        CodecRegistry::default()
    }

    pub fn register(&mut self, def: CodecDefinition) {
        self.by_id.insert(def.codec_id, self.defs.len());
        self.defs.push(def);
    }

    pub fn get(&self, codec_id: i64) -> Result<&CodecDefinition> {
        self.by_id
            .get(&codec_id)
            .map(|&ix| &self.defs[ix])
            .ok_or_else(|| err!(StatusCode::NotImplemented, "no codec with id {}", codec_id))
    }

    /// First registered decoder whose magic bytes prefix-match wins.
    pub fn select_decoder(&self, leading_bytes: &[u8]) -> Option<i64> {
        for def in &self.defs {
            for magic in &def.magic_byte_sets {
                if leading_bytes.len() >= magic.len() && &leading_bytes[..magic.len()] == &magic[..]
                {
                    return Some(def.codec_id);
                }
            }
        }
        None
    }
}

/// A codec bound to one placeholder of one job.
pub struct CodecInstance {
    pub placeholder_id: i32,
    pub codec_id: i64,
    pub direction: IoDirection,
    pub io: IoProxy,
    pub codec: Option<Box<dyn Codec>>,
}

impl CodecInstance {
    pub fn new(placeholder_id: i32, direction: IoDirection, io: IoProxy) -> CodecInstance {
        CodecInstance {
            placeholder_id,
            codec_id: 0,
            direction,
            io,
            codec: None,
        }
    }

    /// Reads the stream's first bytes and rewinds, for decoder selection.
    pub fn probe_magic_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; MAGIC_BYTE_PROBE_LENGTH];
        let count = self.io.read(&mut buf)?;
        self.io.seek(0)?;
        Ok(buf[..count].to_vec())
    }
}
