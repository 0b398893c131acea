//! `blur`: Gaussian blur, or a mild box blur for tiny or invalid sigmas.

use super::{Applied, PipelineState, premultiplied};
use crate::imaging::params::resolve_blur;
use crate::imaging::{ImageHandle, Kernel, ManipulationRequest};

/// Below this sigma a Gaussian mask degenerates; use the box blur instead.
const MIN_GAUSSIAN_SIGMA: f64 = 0.3;

fn box_kernel() -> Kernel {
    Kernel::new([[1.0; 3]; 3])
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    if !request.contains("blur") {
        return Applied::unchanged(image, state);
    }
    let sigma = resolve_blur(request.get("blur"));
    let image = premultiplied(image, state);

    let image = if sigma < MIN_GAUSSIAN_SIGMA {
        image.conv(&box_kernel())
    } else {
        image.gaussblur(sigma as f32)
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
    use crate::imaging::{BandFormat, Interpretation};
    use crate::manipulators::tests::{request, rgb, rgba, state_for};

    fn dot() -> ImageHandle {
        let mut data = vec![0.0; 9 * 9];
        data[4 * 9 + 4] = 255.0;
        ImageHandle::new(9, 9, 1, Interpretation::BW, BandFormat::U8, data)
    }

    #[test]
    fn absent_is_noop() {
        let img = dot();
        let state = state_for(&img);
        let out = apply(img.clone(), &request(&[]), &state);
        assert_eq!(out.image, img);
        assert!(!out.is_premultiplied);
    }

    #[test]
    fn invalid_sigma_uses_box_blur() {
        let img = dot();
        let state = state_for(&img);
        let out = apply(img, &request(&[("blur", "a")]), &state);
        assert!(out.is_premultiplied);
        assert_eq!(out.image.pixel(4, 4), &[28.0]);
        assert_eq!(out.image.pixel(3, 3), &[28.0]);
        assert_eq!(out.image.pixel(2, 2), &[0.0]);
    }

    #[test]
    fn gaussian_spreads_further_than_box() {
        let img = dot();
        let state = state_for(&img);
        let out = apply(img, &request(&[("blur", "2")]), &state);
        assert!(out.image.pixel(4, 4)[0] < 255.0);
        assert!(out.image.pixel(2, 4)[0] > 0.0);
        assert_eq!(out.image.format(), BandFormat::U8);
    }

    #[test]
    fn alpha_images_are_premultiplied() {
        let img = rgba(5, 5, [100.0, 100.0, 100.0, 51.0]);
        let state = state_for(&img);
        let out = apply(img, &request(&[("blur", "1")]), &state);
        assert!(out.is_premultiplied);
        assert!(out.has_alpha);
        assert!((out.image.pixel(2, 2)[0] - 20.0).abs() < 0.01);
    }

    #[test]
    fn opaque_images_report_premultiplied() {
        let img = rgb(3, 3, [5.0, 5.0, 5.0]);
        let state = state_for(&img);
        let out = apply(img, &request(&[("blur", "0.1")]), &state);
        assert!(out.is_premultiplied);
        assert_eq!(out.image.pixel(1, 1), &[5.0, 5.0, 5.0]);
    }
}
