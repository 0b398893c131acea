//! Tone adjustments: `bri`, `con` and `gam`. Alpha bands are never touched.
//!
//! None of the curves is linear in alpha, so premultiplied images are
//! adjusted on their straight colour and premultiplied again afterwards.

use super::{Applied, PipelineState};
use crate::imaging::params::numeric_in;
use crate::imaging::{ImageHandle, ManipulationRequest};

pub const DEFAULT_GAMMA: f64 = 2.2;

/// Brightness offset in `[-100, 100]`; zero means no change.
pub fn resolve_brightness(raw: Option<&str>) -> Option<f32> {
    numeric_in(raw, -100.0, 100.0)
        .map(|v| v.trunc() as f32)
        .filter(|v| *v != 0.0)
}

/// Contrast in `[-100, 100]`; zero means no change.
pub fn resolve_contrast(raw: Option<&str>) -> Option<f32> {
    numeric_in(raw, -100.0, 100.0)
        .map(|v| v.trunc() as f32)
        .filter(|v| *v != 0.0)
}

/// Gamma exponent in `[1, 3]`, 2.2 when the value is present but invalid.
pub fn resolve_gamma(raw: Option<&str>) -> Option<f32> {
    raw.map(|_| numeric_in(raw, 1.0, 3.0).unwrap_or(DEFAULT_GAMMA) as f32)
}

/// Apply `curve` to every colour sample of straight (unassociated) colour.
fn tone(image: ImageHandle, state: &PipelineState, curve: impl Fn(f32) -> f32) -> ImageHandle {
    if state.is_premultiplied && image.has_alpha() {
        image.unpremultiply().map_colour(curve).premultiply()
    } else {
        image.map_colour(curve)
    }
}

pub fn brightness(
    image: ImageHandle,
    request: &ManipulationRequest,
    state: &PipelineState,
) -> Applied {
    let Some(amount) = resolve_brightness(request.get("bri")) else {
        return Applied::unchanged(image, state);
    };
    let offset = amount * image.interpretation().max_alpha() / 100.0;
    Applied::unchanged(tone(image, state, |v| v + offset), state)
}

pub fn contrast(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(amount) = resolve_contrast(request.get("con")) else {
        return Applied::unchanged(image, state);
    };
    let mid = image.interpretation().max_alpha() / 2.0;
    let factor = 1.0 + amount / 100.0;
    Applied::unchanged(tone(image, state, |v| (v - mid) * factor + mid), state)
}

pub fn gamma(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(exponent) = resolve_gamma(request.get("gam")) else {
        return Applied::unchanged(image, state);
    };
    let max = image.interpretation().max_alpha();
    Applied::unchanged(
        tone(image, state, |v| (v.max(0.0) / max).powf(1.0 / exponent) * max),
        state,
    )
}
