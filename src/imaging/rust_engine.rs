//! Pure Rust pixel engine.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image::ImageReader` with content sniffing |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality) |
//! | Encode → progressive JPEG | `jpeg_encoder::Encoder` (quality, interlace) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (compression level) |
//! | Encode → WebP, lossy | `webp::Encoder` (quality) |
//! | Encode → WebP, no quality | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Pixel primitives | [`ImageHandle`] methods in [`pixel`](super::pixel) |
//!
//! No Rust PNG encoder writes Adam7, so interlace is ignored for PNG.

use super::engine::{EngineError, ImageEngine};
use super::handle::{AccessMode, BandFormat, ImageHandle, Interpretation};
use super::params::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_QUALITY, EncodingOptions};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageBuffer, ImageReader};
use std::path::Path;

/// Extensions [`RustEngine::encode`] can produce.
const WRITABLE: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Pixel engine backed by the `image` crate.
///
/// The whole image is decoded up front regardless of [`AccessMode`]; the mode
/// is recorded on the handle.
pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a decoded image into a handle, keeping 16-bit depth.
pub(crate) fn from_dynamic(img: DynamicImage) -> ImageHandle {
    let (width, height) = (img.width(), img.height());
    let (bands, interpretation, data): (usize, Interpretation, Vec<f32>) = match img {
        DynamicImage::ImageLuma8(buf) => (1, Interpretation::BW, widen(buf.into_raw())),
        DynamicImage::ImageLumaA8(buf) => (2, Interpretation::BW, widen(buf.into_raw())),
        DynamicImage::ImageRgb8(buf) => (3, Interpretation::Srgb, widen(buf.into_raw())),
        DynamicImage::ImageRgba8(buf) => (4, Interpretation::Srgb, widen(buf.into_raw())),
        DynamicImage::ImageLuma16(buf) => (1, Interpretation::Grey16, widen16(buf.into_raw())),
        DynamicImage::ImageLumaA16(buf) => (2, Interpretation::Grey16, widen16(buf.into_raw())),
        DynamicImage::ImageRgb16(buf) => (3, Interpretation::Rgb16, widen16(buf.into_raw())),
        DynamicImage::ImageRgba16(buf) => (4, Interpretation::Rgb16, widen16(buf.into_raw())),
        other if other.color().has_alpha() => {
            (4, Interpretation::Rgb16, widen16(other.to_rgba16().into_raw()))
        }
        other => (3, Interpretation::Rgb16, widen16(other.to_rgb16().into_raw())),
    };
    let format = interpretation.natural_format();
    ImageHandle::new(width, height, bands, interpretation, format, data)
}

fn widen(raw: Vec<u8>) -> Vec<f32> {
    raw.into_iter().map(f32::from).collect()
}

fn widen16(raw: Vec<u16>) -> Vec<f32> {
    raw.into_iter().map(f32::from).collect()
}

/// Convert a handle back into a `DynamicImage` the encoders accept.
///
/// Lab is converted to sRGB first; float samples are rounded into the
/// interpretation's integer range.
pub(crate) fn to_dynamic(image: &ImageHandle) -> Result<DynamicImage, EngineError> {
    let image = match image.interpretation() {
        Interpretation::Lab => image.clone().colourspace(Interpretation::Srgb),
        _ => image.clone(),
    };
    let interpretation = image.interpretation();
    let (width, height) = image.dimensions();
    let colour = interpretation.colour_bands();
    // Drop extra bands beyond a single alpha
    let keep = if image.has_alpha() { colour + 1 } else { colour };
    let bands = image.bands();

    let samples = image
        .samples()
        .chunks_exact(bands)
        .flat_map(|px| px[..keep].iter().copied());

    let layout_error = || EngineError::Encode(format!("sample buffer does not match {width}x{height}"));

    if interpretation.is_16_bit() {
        let raw: Vec<u16> = samples
            .map(|v| BandFormat::U16.quantize(v) as u16)
            .collect();
        Ok(match keep {
            1 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
            2 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
            3 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
            _ => DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
        })
    } else {
        let raw: Vec<u8> = samples.map(|v| BandFormat::U8.quantize(v) as u8).collect();
        Ok(match keep {
            1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
            2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
            3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
            _ => DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, raw).ok_or_else(layout_error)?),
        })
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_jpeg(img: DynamicImage, quality: u8, progressive: bool) -> Result<Vec<u8>, EngineError> {
    // JPEG has no alpha and no 16-bit mode
    let img = if img.color().has_color() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(img.to_luma8())
    };
    let quality = quality.clamp(1, 100);
    if progressive {
        return encode_progressive_jpeg(&img, quality);
    }
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| EngineError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_progressive_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EngineError> {
    let (width, height) = (
        u16::try_from(img.width()),
        u16::try_from(img.height()),
    );
    let (Ok(width), Ok(height)) = (width, height) else {
        return Err(EngineError::Encode(format!(
            "JPEG encode failed: {}x{} exceeds 65535",
            img.width(),
            img.height()
        )));
    };
    let color = if img.color().has_color() {
        jpeg_encoder::ColorType::Rgb
    } else {
        jpeg_encoder::ColorType::Luma
    };

    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, quality);
    encoder.set_progressive(true);
    encoder
        .encode(img.as_bytes(), width, height, color)
        .map_err(|e| EngineError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_png(img: DynamicImage, level: u8) -> Result<Vec<u8>, EngineError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, png_compression(level), FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| EngineError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(img: DynamicImage, quality: Option<u8>) -> Result<Vec<u8>, EngineError> {
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    if let Some(quality) = quality {
        let encoder = webp::Encoder::from_image(&img)
            .map_err(|e| EngineError::Encode(format!("WebP encode failed: {e}")))?;
        return Ok(encoder.encode(f32::from(quality.min(100))).to_vec());
    }
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut buf);
    img.write_with_encoder(encoder)
        .map_err(|e| EngineError::Encode(format!("WebP encode failed: {e}")))?;
    Ok(buf)
}

impl ImageEngine for RustEngine {
    fn load(&self, path: &Path, access: AccessMode) -> Result<ImageHandle, EngineError> {
        let img = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| EngineError::Decode(format!("{}: {e}", path.display())))?;
        Ok(from_dynamic(img).with_access(access))
    }

    fn encode(
        &self,
        image: &ImageHandle,
        extension: &str,
        options: &EncodingOptions,
    ) -> Result<Vec<u8>, EngineError> {
        let img = to_dynamic(image)?;
        match extension {
            "jpg" | "jpeg" => encode_jpeg(
                img,
                options.quality.unwrap_or(DEFAULT_QUALITY),
                options.interlace.unwrap_or(false),
            ),
            "png" => encode_png(
                img,
                options.compression.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
            ),
            "webp" => encode_webp(img, options.quality),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }

    fn can_write(&self, extension: &str) -> bool {
        WRITABLE.contains(&extension)
    }
}
