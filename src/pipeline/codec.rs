//! Codec stage: decode bytes, draw onto a fresh canvas, encode.
//!
//! The re-encode operation is deliberately a canvas round-trip rather than
//! a container rewrite: the source is decoded to pixels, drawn 1:1 onto a
//! fresh surface of identical dimensions, and encoded from there. That
//! keeps the operation total — whatever container the source bytes were in,
//! the output is a clean encode of the pixel grid, with no metadata or
//! ancillary chunks carried over.
//!
//! Quality only reaches the JPEG encoder. PNG and WebP are written
//! losslessly; the fraction is accepted and ignored so callers don't need
//! to special-case formats.

use crate::config::OutputFormat;
use crate::error::CutoutError;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Decode encoded image bytes into a raster.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, CutoutError> {
    image::load_from_memory(bytes).map_err(|e| CutoutError::Decode {
        detail: e.to_string(),
    })
}

/// Draw the full decoded image onto a fresh canvas sized exactly to the
/// source's pixel dimensions. No scaling, no cropping.
pub fn draw_to_canvas(img: &DynamicImage) -> RgbaImage {
    let mut canvas = RgbaImage::new(img.width(), img.height());
    imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
    canvas
}

/// Encode a canvas to `format` at the given quality fraction in `[0, 1]`.
///
/// JPEG has no alpha channel, so the canvas is flattened to RGB first;
/// PNG and WebP keep the full RGBA surface.
pub fn encode(
    canvas: RgbaImage,
    format: OutputFormat,
    quality: f32,
) -> Result<Vec<u8>, CutoutError> {
    let (width, height) = canvas.dimensions();
    let mut buf = Vec::new();

    let result = match format {
        OutputFormat::Jpeg => {
            let q = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
            let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
            let mut cursor = Cursor::new(&mut buf);
            let encoder = JpegEncoder::new_with_quality(&mut cursor, q);
            DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        }
        OutputFormat::WebP => {
            DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)
        }
    };

    result.map_err(|e| CutoutError::Encode {
        format: format.extension().to_string(),
        detail: e.to_string(),
    })?;

    debug!(
        "encoded {width}x{height} canvas → {} bytes of {format}",
        buf.len()
    );
    Ok(buf)
}

/// The full re-encode transformation: decode → draw → encode.
///
/// CPU-bound; the session runs this inside `spawn_blocking` so a large
/// image doesn't stall the async executor.
pub fn reencode_bytes(
    bytes: &[u8],
    format: OutputFormat,
    quality: f32,
) -> Result<Vec<u8>, CutoutError> {
    let img = decode(bytes)?;
    let canvas = draw_to_canvas(&img);
    encode(canvas, format, quality)
}
