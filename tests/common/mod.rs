//! Shared test support: a raw bitmap codec that exercises the codec and
//! I/O contracts without pulling a real image format into the engine.

use byteorder::{ByteOrder, LittleEndian};
use rastergraph::codecs::{
    Codec, CodecDefinition, DecoderInfo, EncoderHints, FrameInfo,
};
use rastergraph::error::{Result, StatusCode};
use rastergraph::{err, BitmapBgra, Context, IoProxy, PixelFormat};

/// "RBM1" as a codec id.
pub const RAW_CODEC_ID: i64 = 0x5242_4D31;

pub const RAW_MAGIC: [u8; 4] = [0x52, 0x42, 0x4D, 0x31];

const HEADER_LEN: usize = 4 + 4 + 4 + 1;

/// Header: magic, width u32le, height u32le, bytes-per-pixel.
pub struct RawBitmapCodec;

fn read_header(io: &mut IoProxy) -> Result<FrameInfo> {
    io.seek(0)?;
    let mut header = [0u8; HEADER_LEN];
    io.read_exact(&mut header)?;
    if header[..4] != RAW_MAGIC {
        return Err(err!(StatusCode::ImageDecodingFailed, "bad signature"));
    }
    let w = LittleEndian::read_u32(&header[4..8]);
    let h = LittleEndian::read_u32(&header[8..12]);
    let format = match header[12] {
        3 => PixelFormat::Bgr24,
        4 => PixelFormat::Bgra32,
        other => {
            return Err(err!(
                StatusCode::ImageDecodingFailed,
                "unsupported bytes-per-pixel {}",
                other
            ));
        }
    };
    if w == 0 || h == 0 {
        return Err(err!(StatusCode::ImageDecodingFailed, "empty frame"));
    }
    Ok(FrameInfo { w, h, format })
}

impl Codec for RawBitmapCodec {
    fn get_info(&mut self, io: &mut IoProxy) -> Result<DecoderInfo> {
        let frame = read_header(io)?;
        Ok(DecoderInfo {
            codec_id: RAW_CODEC_ID,
            preferred_mime_type: "application/x-raw-bitmap",
            preferred_extension: "rbm",
            frame_count: 1,
            current_frame_index: 0,
            frame0_width: frame.w,
            frame0_height: frame.h,
            frame0_post_decode_format: frame.format,
        })
    }

    fn get_frame_info(&mut self, io: &mut IoProxy) -> Result<FrameInfo> {
        read_header(io)
    }

    fn read_frame(&mut self, io: &mut IoProxy, canvas: &mut BitmapBgra) -> Result<()> {
        let frame = read_header(io)?;
        if frame.w != canvas.w || frame.h != canvas.h || frame.format != canvas.fmt {
            return Err(err!(StatusCode::ImageDecodingFailed, "canvas mismatch"));
        }
        let row_bytes = canvas.row_bytes();
        let stride = canvas.stride as usize;
        let mut rows = vec![0u8; row_bytes * frame.h as usize];
        io.read_exact(&mut rows)?;
        canvas.pixels_mut(|px| {
            for y in 0..frame.h as usize {
                px[y * stride..y * stride + row_bytes]
                    .copy_from_slice(&rows[y * row_bytes..(y + 1) * row_bytes]);
            }
        });
        Ok(())
    }

    fn write_frame(
        &mut self,
        io: &mut IoProxy,
        frame: &BitmapBgra,
        _hints: &EncoderHints,
    ) -> Result<()> {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&RAW_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], frame.w);
        LittleEndian::write_u32(&mut header[8..12], frame.h);
        header[12] = frame.fmt.bytes_per_pixel() as u8;
        io.write_all(&header)?;
        let row_bytes = frame.row_bytes();
        let stride = frame.stride as usize;
        let rows = frame.pixels(|px| {
            let mut out = Vec::with_capacity(row_bytes * frame.h as usize);
            for y in 0..frame.h as usize {
                out.extend_from_slice(&px[y * stride..y * stride + row_bytes]);
            }
            out
        });
        io.write_all(&rows)
    }
}

pub fn register_raw_codec(ctx: &Context) {
    ctx.register_codec(CodecDefinition {
        codec_id: RAW_CODEC_ID,
        name: "raw bitmap",
        preferred_mime_type: "application/x-raw-bitmap",
        preferred_extension: "rbm",
        magic_byte_sets: vec![RAW_MAGIC.to_vec()],
        factory: || Box::new(RawBitmapCodec),
    });
}

/// Serializes pixel bytes (tightly packed rows) into the raw wire format.
pub fn raw_file(w: u32, h: u32, format: PixelFormat, pixels: &[u8]) -> Vec<u8> {
    let bpp = format.bytes_per_pixel();
    assert_eq!(pixels.len(), w as usize * h as usize * bpp);
    let mut out = Vec::with_capacity(HEADER_LEN + pixels.len());
    out.extend_from_slice(&RAW_MAGIC);
    let mut dims = [0u8; 8];
    LittleEndian::write_u32(&mut dims[..4], w);
    LittleEndian::write_u32(&mut dims[4..], h);
    out.extend_from_slice(&dims);
    out.push(bpp as u8);
    out.extend_from_slice(pixels);
    out
}

/// Parses the dimensions back out of an encoded raw file.
pub fn raw_file_dimensions(bytes: &[u8]) -> (u32, u32, u8) {
    assert!(bytes.len() >= HEADER_LEN);
    assert_eq!(&bytes[..4], &RAW_MAGIC);
    (
        LittleEndian::read_u32(&bytes[4..8]),
        LittleEndian::read_u32(&bytes[8..12]),
        bytes[12],
    )
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}
