//! `filt`: named colour filters.
//!
//! `greyscale` wins over `sepia`, which wins over `negate`; any other value
//! leaves the image alone.

use super::{Applied, PipelineState};
use crate::imaging::{BandFormat, ImageHandle, Interpretation, ManipulationRequest};

const SEPIA: [[f32; 3]; 3] = [
    [0.3588, 0.7044, 0.1368],
    [0.2990, 0.5870, 0.1140],
    [0.2392, 0.4696, 0.0912],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Greyscale,
    Sepia,
    Negate,
}

impl Filter {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "greyscale" => Some(Filter::Greyscale),
            "sepia" => Some(Filter::Sepia),
            "negate" => Some(Filter::Negate),
            _ => None,
        }
    }
}

/// Collapse colour bands to one grey band, keeping alpha.
pub fn greyscale(image: ImageHandle) -> ImageHandle {
    let target = if image.interpretation().is_16_bit() {
        Interpretation::Grey16
    } else {
        Interpretation::BW
    };
    image.colourspace(target)
}

/// Recombine colour bands through the sepia matrix, keeping alpha.
pub fn sepia(image: ImageHandle) -> ImageHandle {
    let image = match image.interpretation() {
        Interpretation::BW => image.colourspace(Interpretation::Srgb),
        Interpretation::Grey16 => image.colourspace(Interpretation::Rgb16),
        _ => image,
    };
    image.recomb(&SEPIA)
}

/// Invert colour bands. Premultiplied samples are inverted against their
/// own alpha so transparent pixels stay black.
pub fn negate(mut image: ImageHandle, premultiplied: bool) -> ImageHandle {
    let max = image.interpretation().max_alpha();
    let colour = image.interpretation().colour_bands();
    let alpha = image.alpha_band();
    for px in image.pixels_mut() {
        let cover = match alpha {
            Some(a) if premultiplied => px[a],
            _ => max,
        };
        for v in px[..colour].iter_mut() {
            *v = cover - *v;
        }
    }
    image.with_format(BandFormat::F32)
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let image = match Filter::parse(request.get("filt")) {
        Some(Filter::Greyscale) => greyscale(image),
        Some(Filter::Sepia) => sepia(image),
        Some(Filter::Negate) => negate(image, state.is_premultiplied),
        None => image,
    };
    Applied::unchanged(image, state)
}
