//! `sharp=flat,jagged,sigma`: sharpening.
//!
//! Without a sigma the fast path convolves with a fixed 3x3 mask in the
//! image's own colourspace. With a sigma, an unsharp mask is applied to the
//! lightness channel in Lab, with separate gains for flat and jagged areas.

use super::{Applied, PipelineState, premultiplied};
use crate::imaging::params::{SharpenSettings, resolve_sharpen};
use crate::imaging::{BandFormat, ImageHandle, Interpretation, Kernel, ManipulationRequest};

/// Detail (in L units) up to which the flat gain applies.
const FLAT_THRESHOLD: f32 = 2.0;
/// Largest lightening step.
const MAX_BRIGHTEN: f32 = 10.0;
/// Largest darkening step.
const MAX_DARKEN: f32 = 20.0;

fn fast_kernel() -> Kernel {
    Kernel::new([
        [-1.0, -1.0, -1.0],
        [-1.0, 32.0, -1.0],
        [-1.0, -1.0, -1.0],
    ])
}

/// Correction for a detail value `d` (L minus blurred L).
fn correction(d: f32, flat: f32, jagged: f32) -> f32 {
    let magnitude = d.abs();
    let step = if magnitude <= FLAT_THRESHOLD {
        flat * magnitude
    } else {
        flat * FLAT_THRESHOLD + jagged * (magnitude - FLAT_THRESHOLD)
    };
    (step * d.signum()).clamp(-MAX_DARKEN, MAX_BRIGHTEN)
}

/// Unsharp mask on Lab lightness; returns the image in its original
/// colourspace (generic RGB comes back as sRGB).
pub fn sharpen_accurate(image: ImageHandle, settings: &SharpenSettings) -> ImageHandle {
    let target = match image.interpretation() {
        Interpretation::Rgb => Interpretation::Srgb,
        other => other,
    };
    let mut lab = image.colourspace(Interpretation::Lab);
    let (width, height) = lab.dimensions();

    let lightness: Vec<f32> = lab.pixels().map(|px| px[0]).collect();
    let blurred = ImageHandle::new(width, height, 1, Interpretation::BW, BandFormat::F32, lightness)
        .gaussblur(settings.sigma as f32);

    let (flat, jagged) = (settings.flat as f32, settings.jagged as f32);
    for (px, &smooth) in lab.pixels_mut().zip(blurred.samples()) {
        px[0] += correction(px[0] - smooth, flat, jagged);
    }
    lab.colourspace(target)
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(raw) = request.get("sharp") else {
        return Applied::unchanged(image, state);
    };
    let settings = resolve_sharpen(Some(raw));
    let image = premultiplied(image, state);

    let image = if settings.is_fast() {
        image.conv(&fast_kernel())
    } else {
        sharpen_accurate(image, &settings)
    };

    Applied {
        image,
        has_alpha: state.has_alpha,
        is_premultiplied: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::tests::{request, rgb, rgba, state_for};

    fn edge() -> ImageHandle {
        // Left half dark, right half light
        let data = (0..8 * 8)
            .flat_map(|i| {
                let v = if i % 8 < 4 { 60.0 } else { 180.0 };
                [v, v, v]
            })
            .collect();
        ImageHandle::new(8, 8, 3, Interpretation::Srgb, BandFormat::U8, data)
    }

    #[test]
    fn correction_curve() {
        assert_eq!(correction(0.0, 1.0, 2.0), 0.0);
        assert_eq!(correction(1.5, 1.0, 2.0), 1.5);
        assert_eq!(correction(-1.5, 3.0, 2.0), -4.5);
        assert_eq!(correction(4.0, 1.0, 2.0), 6.0);
        assert_eq!(correction(100.0, 1.0, 2.0), MAX_BRIGHTEN);
        assert_eq!(correction(-100.0, 1.0, 2.0), -MAX_DARKEN);
    }

    #[test]
    fn absent_is_noop() {
        let img = edge();
        let state = state_for(&img);
        let out = apply(img.clone(), &request(&[]), &state);
        assert_eq!(out.image, img);
        assert!(!out.is_premultiplied);
    }

    #[test]
    fn fast_sharpen_keeps_flat_regions_and_boosts_edges() {
        let img = edge();
        let state = state_for(&img);
        let out = apply(img, &request(&[("sharp", "")]), &state);
        assert!(out.is_premultiplied);
        assert_eq!(out.image.pixel(0, 0), &[60.0, 60.0, 60.0]);
        assert!(out.image.pixel(3, 4)[0] < 60.0);
        assert!(out.image.pixel(4, 4)[0] > 180.0);
    }

    #[test]
    fn accurate_sharpen_restores_colourspace() {
        let img = edge();
        let state = state_for(&img);
        let out = apply(img, &request(&[("sharp", "1,2,1.5")]), &state);
        assert_eq!(out.image.interpretation(), Interpretation::Srgb);
        assert_eq!(out.image.bands(), 3);
        assert!(out.image.pixel(3, 4)[0] < 60.0);
        assert!(out.image.pixel(4, 4)[0] > 180.0);
        // far from the edge nothing changes
        assert!((out.image.pixel(0, 0)[0] - 60.0).abs() <= 3.0);
    }

    #[test]
    fn generic_rgb_comes_back_as_srgb() {
        let img = ImageHandle::filled(4, 4, &[10.0, 20.0, 30.0], Interpretation::Rgb, BandFormat::U8);
        let out = sharpen_accurate(img, &SharpenSettings { flat: 1, jagged: 2, sigma: 1.0 });
        assert_eq!(out.interpretation(), Interpretation::Srgb);
    }

    #[test]
    fn alpha_is_premultiplied_first() {
        let img = rgba(4, 4, [200.0, 100.0, 50.0, 127.5]);
        let state = state_for(&img);
        let out = apply(img, &request(&[("sharp", "")]), &state);
        assert!(out.is_premultiplied);
        assert!(out.has_alpha);
        assert_eq!(out.image.pixel(1, 1), &[100.0, 50.0, 25.0, 127.5]);
    }

    #[test]
    fn already_premultiplied_is_not_multiplied_twice() {
        let img = rgba(4, 4, [200.0, 100.0, 50.0, 127.5]).premultiply();
        let mut state = state_for(&img);
        state.is_premultiplied = true;
        let out = apply(img, &request(&[("sharp", "")]), &state);
        assert_eq!(out.image.pixel(1, 1)[0], 100.0);
    }

    #[test]
    fn grey_images_stay_grey() {
        let img = rgb(2, 2, [0.0, 0.0, 0.0]).colourspace(Interpretation::BW);
        let state = state_for(&img);
        let out = apply(img, &request(&[("sharp", "1,2,0.5")]), &state);
        assert_eq!(out.image.interpretation(), Interpretation::BW);
        assert_eq!(out.image.bands(), 1);
    }
}
