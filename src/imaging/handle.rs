//! Decoded pixel buffers.
//!
//! [`ImageHandle`] is the unit every manipulator consumes and returns. Samples
//! are stored interleaved as `f32` in the value range of the image's
//! [`Interpretation`] (0–255 for 8-bit colourspaces, 0–65535 for 16-bit ones,
//! 0–100 for Lab lightness). The [`BandFormat`] records which integer type the
//! samples represent so encoders know how to round them.

/// How the source was decoded.
///
/// Sequential decoding reads the image once, top to bottom. Operations that
/// look around in the pixel stream (trim, quarter-turn rotations, blur,
/// sharpen) need random access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Sequential,
    Random,
}

/// Colourspace tag of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// 8-bit greyscale.
    BW,
    /// 16-bit greyscale.
    Grey16,
    /// Generic RGB with no declared transfer curve.
    Rgb,
    /// Standard RGB.
    Srgb,
    /// 16-bit standard RGB.
    Rgb16,
    /// CIE Lab, D65.
    Lab,
}

impl Interpretation {
    pub fn is_16_bit(self) -> bool {
        matches!(self, Interpretation::Grey16 | Interpretation::Rgb16)
    }

    /// Number of colour (non-alpha) bands.
    pub fn colour_bands(self) -> usize {
        match self {
            Interpretation::BW | Interpretation::Grey16 => 1,
            Interpretation::Rgb | Interpretation::Srgb | Interpretation::Rgb16 | Interpretation::Lab => 3,
        }
    }

    /// Value of a fully opaque alpha sample.
    pub fn max_alpha(self) -> f32 {
        if self.is_16_bit() { 65535.0 } else { 255.0 }
    }

    /// Integer band format an encoder expects for this colourspace.
    pub fn natural_format(self) -> BandFormat {
        match self {
            Interpretation::Grey16 | Interpretation::Rgb16 => BandFormat::U16,
            Interpretation::Lab => BandFormat::F32,
            _ => BandFormat::U8,
        }
    }
}

/// Numeric type the samples stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandFormat {
    U8,
    U16,
    F32,
}

impl BandFormat {
    /// Clamp and round a sample into this format's range. Float passes through.
    pub fn quantize(self, value: f32) -> f32 {
        match self {
            BandFormat::U8 => value.round().clamp(0.0, 255.0),
            BandFormat::U16 => value.round().clamp(0.0, 65535.0),
            BandFormat::F32 => value,
        }
    }
}

/// Decoded image owned by whichever stage currently holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    width: u32,
    height: u32,
    bands: usize,
    interpretation: Interpretation,
    format: BandFormat,
    access: AccessMode,
    data: Vec<f32>,
}

impl ImageHandle {
    /// Wrap an interleaved sample buffer.
    ///
    /// # Panics
    /// If `data.len()` is not `width * height * bands`.
    pub fn new(
        width: u32,
        height: u32,
        bands: usize,
        interpretation: Interpretation,
        format: BandFormat,
        data: Vec<f32>,
    ) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * bands,
            "sample buffer does not match {width}x{height}x{bands}"
        );
        Self {
            width,
            height,
            bands,
            interpretation,
            format,
            access: AccessMode::Random,
            data,
        }
    }

    /// An image where every pixel is `pixel`.
    pub fn filled(
        width: u32,
        height: u32,
        pixel: &[f32],
        interpretation: Interpretation,
        format: BandFormat,
    ) -> Self {
        let count = width as usize * height as usize;
        let data = pixel.iter().copied().cycle().take(count * pixel.len()).collect();
        Self::new(width, height, pixel.len(), interpretation, format, data)
    }

    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn interpretation(&self) -> Interpretation {
        self.interpretation
    }

    pub fn format(&self) -> BandFormat {
        self.format
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Whether the band layout carries an alpha channel.
    ///
    /// Greyscale with two bands, colour with four bands, or anything wider.
    pub fn has_alpha(&self) -> bool {
        let colour = self.interpretation.colour_bands();
        self.bands > colour && (self.bands == colour + 1 || self.bands > 4)
    }

    /// Index of the alpha band, if any.
    pub fn alpha_band(&self) -> Option<usize> {
        self.has_alpha().then(|| self.interpretation.colour_bands())
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.bands;
        &self.data[start..start + self.bands]
    }

    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.bands;
        &mut self.data[start..start + self.bands]
    }

    pub(crate) fn pixels_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        self.data.chunks_exact_mut(self.bands)
    }

    pub(crate) fn pixels(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.bands)
    }

    /// Same geometry and tags, new samples and band count.
    pub(crate) fn rebuild(
        &self,
        width: u32,
        height: u32,
        bands: usize,
        interpretation: Interpretation,
        format: BandFormat,
        data: Vec<f32>,
    ) -> Self {
        Self::new(width, height, bands, interpretation, format, data).with_access(self.access)
    }

    pub(crate) fn with_format(mut self, format: BandFormat) -> Self {
        self.format = format;
        self
    }
}
