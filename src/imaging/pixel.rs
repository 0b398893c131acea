//! Pixel primitives on [`ImageHandle`].
//!
//! These are the engine-level building blocks the manipulators orchestrate:
//! region extraction, padding, separable resampling, convolution, band
//! recombination, casting and alpha premultiplication. Every primitive
//! consumes its input and returns a new handle.

use super::handle::{BandFormat, ImageHandle, Interpretation};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};

/// A 3x3 convolution mask. Weights are normalised by their sum, so the
/// mask never changes the mean of a flat region.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    coeffs: [f32; 9],
}

impl Kernel {
    pub fn new(rows: [[f32; 3]; 3]) -> Self {
        let sum: f32 = rows.iter().flatten().sum();
        let sum = if sum == 0.0 { 1.0 } else { sum };
        let mut coeffs = [0.0; 9];
        for (c, &v) in coeffs.iter_mut().zip(rows.iter().flatten()) {
            *c = v / sum;
        }
        Self { coeffs }
    }
}

/// Quarter-turn rotation angle, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Angle {
    D90,
    D180,
    D270,
}

/// An operation delegated to `image::imageops` on a float buffer.
trait BufferOp {
    /// Whether samples are scaled into `0..=1` first. The `image` crate
    /// clamps float filter output to that range.
    const NORMALISE: bool = true;

    fn run<P>(&self, buffer: &ImageBuffer<P, Vec<f32>>) -> ImageBuffer<P, Vec<f32>>
    where
        P: Pixel<Subpixel = f32> + 'static;
}

struct Resize {
    width: u32,
    height: u32,
}

impl BufferOp for Resize {
    fn run<P>(&self, buffer: &ImageBuffer<P, Vec<f32>>) -> ImageBuffer<P, Vec<f32>>
    where
        P: Pixel<Subpixel = f32> + 'static,
    {
        imageops::resize(buffer, self.width, self.height, FilterType::Lanczos3)
    }
}

struct GaussianBlur(f32);

impl BufferOp for GaussianBlur {
    fn run<P>(&self, buffer: &ImageBuffer<P, Vec<f32>>) -> ImageBuffer<P, Vec<f32>>
    where
        P: Pixel<Subpixel = f32> + 'static,
    {
        imageops::blur(buffer, self.0)
    }
}

struct Convolve<'a>(&'a Kernel);

impl BufferOp for Convolve<'_> {
    fn run<P>(&self, buffer: &ImageBuffer<P, Vec<f32>>) -> ImageBuffer<P, Vec<f32>>
    where
        P: Pixel<Subpixel = f32> + 'static,
    {
        // Pad by one pixel with edge copies so the border gets a full mask
        let (width, height) = buffer.dimensions();
        let padded = ImageBuffer::from_fn(width + 2, height + 2, |x, y| {
            *buffer.get_pixel(
                x.saturating_sub(1).min(width - 1),
                y.saturating_sub(1).min(height - 1),
            )
        });
        let filtered = imageops::filter3x3(&padded, &self.0.coeffs);
        imageops::crop_imm(&filtered, 1, 1, width, height).to_image()
    }
}

struct Rotate(Angle);

impl BufferOp for Rotate {
    const NORMALISE: bool = false;

    fn run<P>(&self, buffer: &ImageBuffer<P, Vec<f32>>) -> ImageBuffer<P, Vec<f32>>
    where
        P: Pixel<Subpixel = f32> + 'static,
    {
        match self.0 {
            Angle::D90 => imageops::rotate90(buffer),
            Angle::D180 => imageops::rotate180(buffer),
            Angle::D270 => imageops::rotate270(buffer),
        }
    }
}

fn run_as<P, O>(width: u32, height: u32, data: Vec<f32>, op: &O) -> Option<(u32, u32, Vec<f32>)>
where
    P: Pixel<Subpixel = f32> + 'static,
    O: BufferOp,
{
    let buffer = ImageBuffer::<P, Vec<f32>>::from_raw(width, height, data)?;
    let out = op.run(&buffer);
    Some((out.width(), out.height(), out.into_raw()))
}

impl ImageHandle {
    /// Hand the samples to `op` as an `image` buffer with the matching
    /// channel layout. Integer formats are re-quantized afterwards.
    fn through_imageops<O: BufferOp>(self, op: &O) -> Self {
        let (width, height) = self.dimensions();
        let range = if O::NORMALISE {
            self.interpretation().max_alpha()
        } else {
            1.0
        };
        let data: Vec<f32> = self.samples().iter().map(|v| v / range).collect();
        let result = match self.bands() {
            1 => run_as::<Luma<f32>, O>(width, height, data, op),
            2 => run_as::<LumaA<f32>, O>(width, height, data, op),
            3 => run_as::<Rgb<f32>, O>(width, height, data, op),
            4 => run_as::<Rgba<f32>, O>(width, height, data, op),
            _ => None,
        };
        let Some((out_w, out_h, data)) = result else {
            log::warn!("No buffer layout for {} bands, image left unchanged", self.bands());
            return self;
        };

        let format = self.format();
        let data = data.into_iter().map(|v| format.quantize(v * range)).collect();
        self.rebuild(out_w, out_h, self.bands(), self.interpretation(), format, data)
    }
}

impl ImageHandle {
    /// Crop to the rectangle, clamped to the image bounds. A rectangle that
    /// falls entirely outside leaves the image unchanged.
    pub fn extract_area(self, left: u32, top: u32, width: u32, height: u32) -> Self {
        let left = left.min(self.width().saturating_sub(1));
        let top = top.min(self.height().saturating_sub(1));
        let width = width.min(self.width() - left);
        let height = height.min(self.height() - top);
        if width == 0 || height == 0 || (width, height) == self.dimensions() {
            return self;
        }

        let bands = self.bands();
        let mut data = Vec::with_capacity(width as usize * height as usize * bands);
        for y in top..top + height {
            for x in left..left + width {
                data.extend_from_slice(self.pixel(x, y));
            }
        }
        self.rebuild(width, height, bands, self.interpretation(), self.format(), data)
    }

    /// Place the image at (`left`, `top`) on a `width` x `height` canvas
    /// filled with `background` (one value per band).
    pub fn embed(self, left: u32, top: u32, width: u32, height: u32, background: &[f32]) -> Self {
        debug_assert_eq!(background.len(), self.bands());
        let mut canvas = ImageHandle::filled(
            width,
            height,
            background,
            self.interpretation(),
            self.format(),
        )
        .with_access(self.access());
        for y in 0..self.height() {
            let ty = top + y;
            if ty >= height {
                break;
            }
            for x in 0..self.width() {
                let tx = left + x;
                if tx >= width {
                    break;
                }
                canvas.pixel_mut(tx, ty).copy_from_slice(self.pixel(x, y));
            }
        }
        canvas
    }

    /// Resample to exactly `width` x `height` with Lanczos3.
    pub fn resize(self, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == self.dimensions() {
            return self;
        }
        self.through_imageops(&Resize { width, height })
    }

    /// Convolve every band with a 3x3 `kernel`, extending edges.
    pub fn conv(self, kernel: &Kernel) -> Self {
        self.through_imageops(&Convolve(kernel))
    }

    /// Gaussian blur of every band.
    pub fn gaussblur(self, sigma: f32) -> Self {
        self.through_imageops(&GaussianBlur(sigma))
    }

    /// Multiply the first three bands by `matrix`; further bands pass through.
    /// Output is float.
    pub fn recomb(self, matrix: &[[f32; 3]; 3]) -> Self {
        let (width, height) = self.dimensions();
        let bands = self.bands();
        debug_assert!(bands >= 3);
        let mut data = Vec::with_capacity(self.samples().len());
        for px in self.pixels() {
            for row in matrix {
                data.push(row[0] * px[0] + row[1] * px[1] + row[2] * px[2]);
            }
            data.extend_from_slice(&px[3..]);
        }
        self.rebuild(width, height, bands, self.interpretation(), BandFormat::F32, data)
    }

    /// Apply `f` to every colour sample, leaving alpha untouched.
    pub fn map_colour(mut self, f: impl Fn(f32) -> f32) -> Self {
        let colour = self.interpretation().colour_bands();
        for px in self.pixels_mut() {
            for v in px[..colour].iter_mut() {
                *v = f(*v);
            }
        }
        self.with_format(BandFormat::F32)
    }

    /// Clamp and round samples into `format`.
    pub fn cast(mut self, format: BandFormat) -> Self {
        if format != BandFormat::F32 {
            for px in self.pixels_mut() {
                for v in px.iter_mut() {
                    *v = format.quantize(*v);
                }
            }
        }
        self.with_format(format)
    }

    /// Scale colour bands by alpha. No-op without an alpha band.
    pub fn premultiply(mut self) -> Self {
        let Some(alpha) = self.alpha_band() else {
            return self;
        };
        let max = self.interpretation().max_alpha();
        for px in self.pixels_mut() {
            let factor = px[alpha] / max;
            for v in px[..alpha].iter_mut() {
                *v *= factor;
            }
        }
        self.with_format(BandFormat::F32)
    }

    /// Divide colour bands by alpha. Fully transparent pixels become zero.
    pub fn unpremultiply(mut self) -> Self {
        let Some(alpha) = self.alpha_band() else {
            return self;
        };
        let max = self.interpretation().max_alpha();
        for px in self.pixels_mut() {
            let a = px[alpha];
            for v in px[..alpha].iter_mut() {
                *v = if a > 0.0 { *v * max / a } else { 0.0 };
            }
        }
        self.with_format(BandFormat::F32)
    }

    /// Append an alpha band filled with `value`. No-op if one exists.
    pub fn add_alpha(self, value: f32) -> Self {
        if self.has_alpha() {
            return self;
        }
        let (width, height) = self.dimensions();
        let bands = self.bands();
        let mut data = Vec::with_capacity(width as usize * height as usize * (bands + 1));
        for px in self.pixels() {
            data.extend_from_slice(px);
            data.push(value);
        }
        self.rebuild(width, height, bands + 1, self.interpretation(), self.format(), data)
    }

    /// Drop the alpha band, keeping colour bands as they are.
    pub fn remove_alpha(self) -> Self {
        let Some(alpha) = self.alpha_band() else {
            return self;
        };
        let (width, height) = self.dimensions();
        let data = self
            .pixels()
            .flat_map(|px| px[..alpha].iter().copied())
            .collect();
        self.rebuild(width, height, alpha, self.interpretation(), self.format(), data)
    }

    /// Rotate clockwise by a quarter-turn multiple.
    pub fn rotate(self, angle: Angle) -> Self {
        self.through_imageops(&Rotate(angle))
    }

    /// Convenience for [`colourspace::convert`](super::colourspace::convert).
    pub fn colourspace(self, target: Interpretation) -> Self {
        super::colourspace::convert(self, target)
    }
}
