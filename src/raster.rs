//! GIF output through a secondary raster library.
//!
//! The pixel engine cannot write GIF. When a client asks for one, the
//! pipeline re-decodes the engine's primary output into a [`RasterHandle`]
//! and lets a [`RasterShim`] write the GIF. GIF has 1-bit transparency, so
//! translucent pixels become either fully transparent or fully opaque.
//!
//! [`GifRaster`] is the shim built on the `image` decoders and the `gif`
//! encoder.

use crate::imaging::Color;
use gif::{Encoder, Frame, Repeat};
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShimError {
    #[error("Raster decode failed: {0}")]
    Decode(String),
    #[error("GIF encode failed: {0}")]
    Encode(String),
    #[error("Image too large for GIF: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
}

/// Pixels below this alpha are written as the transparent colour.
const ALPHA_CUTOFF: u8 = 128;

/// Quantizer speed passed to the `gif` crate (1 = best, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

/// A decoded raster plus the output flags a GIF writer honours.
#[derive(Debug, Clone)]
pub struct RasterHandle {
    image: RgbaImage,
    interlace: bool,
    transparent: Option<Color>,
    alpha_blending: bool,
    save_alpha: bool,
}

impl RasterHandle {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            interlace: false,
            transparent: None,
            alpha_blending: true,
            save_alpha: false,
        }
    }

    pub fn set_interlace(&mut self, interlace: bool) {
        self.interlace = interlace;
    }

    /// Colour written for transparent pixels. Its alpha is ignored.
    pub fn set_transparency(&mut self, color: Color) {
        self.transparent = Some(color);
    }

    pub fn set_alpha_blending(&mut self, blending: bool) {
        self.alpha_blending = blending;
    }

    pub fn set_save_alpha(&mut self, save: bool) {
        self.save_alpha = save;
    }

    pub fn interlace(&self) -> bool {
        self.interlace
    }

    pub fn transparency(&self) -> Option<Color> {
        self.transparent
    }

    /// Transparency survives only with a transparent colour set, alpha
    /// saving on and blending off.
    pub fn keeps_alpha(&self) -> bool {
        self.transparent.is_some() && self.save_alpha && !self.alpha_blending
    }
}

/// Secondary raster library used for GIF output.
pub trait RasterShim: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RasterHandle, ShimError>;

    fn encode_gif(&self, raster: &RasterHandle) -> Result<Vec<u8>, ShimError>;
}

/// [`RasterShim`] backed by the `image` decoders and the `gif` encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct GifRaster;

impl GifRaster {
    pub fn new() -> Self {
        Self
    }
}

impl RasterShim for GifRaster {
    fn decode(&self, bytes: &[u8]) -> Result<RasterHandle, ShimError> {
        let img = image::load_from_memory(bytes).map_err(|e| ShimError::Decode(e.to_string()))?;
        Ok(RasterHandle::new(img.to_rgba8()))
    }

    fn encode_gif(&self, raster: &RasterHandle) -> Result<Vec<u8>, ShimError> {
        let (width, height) = raster.image.dimensions();
        let too_large = || ShimError::TooLarge { width, height };
        let w = u16::try_from(width).map_err(|_| too_large())?;
        let h = u16::try_from(height).map_err(|_| too_large())?;

        let keep_alpha = raster.keeps_alpha();
        let key = raster.transparency().unwrap_or(Color::TRANSPARENT);
        let mut pixels: Vec<u8> = raster
            .image
            .pixels()
            .flat_map(|p| {
                let [r, g, b, a] = p.0;
                if keep_alpha && a < ALPHA_CUTOFF {
                    [key.r, key.g, key.b, 0]
                } else {
                    [r, g, b, 255]
                }
            })
            .collect();

        let mut frame = Frame::from_rgba_speed(w, h, &mut pixels, QUANTIZE_SPEED);
        frame.interlaced = raster.interlace();
        frame.delay = 0;

        let mut output = Vec::new();
        {
            let mut encoder = Encoder::new(&mut output, w, h, &[])
                .map_err(|e| ShimError::Encode(format!("encoder creation failed: {e}")))?;
            encoder
                .set_repeat(Repeat::Finite(0))
                .map_err(|e| ShimError::Encode(format!("repeat setting failed: {e}")))?;
            encoder
                .write_frame(&frame)
                .map_err(|e| ShimError::Encode(format!("frame write failed: {e}")))?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(img: RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn decode_gif(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Gif)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(GifRaster.decode(b"jpg:2x2"), Err(ShimError::Decode(_))));
    }

    #[test]
    fn opaque_round_trip() {
        let shim = GifRaster::new();
        let raster = shim
            .decode(&png_bytes(RgbaImage::from_pixel(6, 4, Rgba([255, 0, 0, 255]))))
            .unwrap();
        let gif = shim.encode_gif(&raster).unwrap();
        assert_eq!(&gif[..6], b"GIF89a");

        let back = decode_gif(&gif);
        assert_eq!(back.dimensions(), (6, 4));
        assert_eq!(back.get_pixel(3, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn transparency_needs_save_alpha_without_blending() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 255, 10]));
        let shim = GifRaster::new();
        let mut raster = shim.decode(&png_bytes(img)).unwrap();

        raster.set_transparency(Color::rgba(0, 0, 0, 127));
        assert!(!raster.keeps_alpha());
        let flat = decode_gif(&shim.encode_gif(&raster).unwrap());
        assert_eq!(flat.get_pixel(0, 0).0[3], 255);

        raster.set_alpha_blending(false);
        raster.set_save_alpha(true);
        assert!(raster.keeps_alpha());
        let keyed = decode_gif(&shim.encode_gif(&raster).unwrap());
        assert_eq!(keyed.get_pixel(0, 0).0[3], 0);
        assert_eq!(keyed.get_pixel(1, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn interlace_flag_is_written() {
        let shim = GifRaster::new();
        let mut raster = RasterHandle::new(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])));
        raster.set_interlace(true);
        assert!(raster.interlace());
        let gif = shim.encode_gif(&raster).unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(gif)).unwrap();
        let frame = decoder.read_next_frame().unwrap().unwrap();
        assert!(frame.interlaced);
    }

    #[test]
    fn oversized_images_are_rejected() {
        let raster = RasterHandle::new(RgbaImage::new(70_000, 1));
        assert!(matches!(
            GifRaster.encode_gif(&raster),
            Err(ShimError::TooLarge { width: 70_000, height: 1 })
        ));
    }
}
