//! `bg`: composite a translucent image over a colour.
//!
//! Runs only when the image has alpha and the colour is not fully
//! transparent. Compositing happens in premultiplied space; an opaque colour
//! leaves every pixel opaque, so the alpha band is dropped.

use super::{Applied, PipelineState, colour_samples, premultiplied};
use crate::imaging::color::Color;
use crate::imaging::{ImageHandle, ManipulationRequest};

/// Source-over `image` onto `color`. `image` must be premultiplied.
fn composite_over(mut image: ImageHandle, color: Color) -> ImageHandle {
    let Some(alpha) = image.alpha_band() else {
        return image;
    };
    let max = image.interpretation().max_alpha();
    let background = colour_samples(color, &image);
    let bg_alpha = background[alpha] / max;

    for px in image.pixels_mut() {
        let uncovered = 1.0 - px[alpha] / max;
        for (v, bg) in px[..alpha].iter_mut().zip(&background) {
            *v += bg * bg_alpha * uncovered;
        }
        px[alpha] += background[alpha] * uncovered;
    }

    if color.is_opaque() {
        image.remove_alpha()
    } else {
        image
    }
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    if !state.has_alpha || !image.has_alpha() {
        return Applied::unchanged(image, state);
    }
    let color = Color::parse(request.get("bg"));
    if color.a == 0 {
        return Applied::unchanged(image, state);
    }

    let image = composite_over(premultiplied(image, state), color);
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

    fn run(img: ImageHandle, bg: &str) -> Applied {
        let state = state_for(&img);
        apply(img, &request(&[("bg", bg)]), &state)
    }

    #[test]
    fn opaque_colour_flattens() {
        let out = run(rgba(2, 2, [0.0, 0.0, 0.0, 0.0]), "red");
        assert!(out.is_premultiplied);
        assert_eq!(out.image.bands(), 3);
        assert_eq!(out.image.pixel(0, 0), &[255.0, 0.0, 0.0]);
    }

    #[test]
    fn half_covered_pixel_blends() {
        let out = run(rgba(1, 1, [0.0, 0.0, 255.0, 127.5]), "fff");
        let px = out.image.pixel(0, 0);
        assert!((px[0] - 127.5).abs() < 0.01);
        assert!((px[2] - 255.0).abs() < 0.01);
    }

    #[test]
    fn translucent_colour_keeps_alpha() {
        let out = run(rgba(1, 1, [0.0, 0.0, 0.0, 0.0]), "80ff0000");
        assert!(out.image.has_alpha());
        let px = out.image.pixel(0, 0);
        assert_eq!(px[3], 128.0);
        // premultiplied red at alpha 128
        assert!((px[0] - 128.0).abs() < 0.01);
    }

    #[test]
    fn skipped_without_alpha_or_colour() {
        let opaque = rgb(2, 2, [1.0, 2.0, 3.0]);
        let out = run(opaque.clone(), "red");
        assert_eq!(out.image, opaque);
        assert!(!out.is_premultiplied);

        let img = rgba(2, 2, [1.0, 2.0, 3.0, 4.0]);
        let out = run(img.clone(), "nonsense");
        assert_eq!(out.image, img);
        assert!(!out.is_premultiplied);

        let state = state_for(&img);
        let out = apply(img.clone(), &request(&[]), &state);
        assert_eq!(out.image, img);
    }
}
