//! `trim`: cut away borders that match the top-left pixel.

use super::{Applied, PipelineState};
use crate::imaging::params::numeric_in;
use crate::imaging::{ImageHandle, ManipulationRequest};

pub const DEFAULT_THRESHOLD: f32 = 10.0;

/// Threshold in 8-bit units, `None` when trimming was not requested.
pub fn resolve_trim(request: &ManipulationRequest) -> Option<f32> {
    if !request.contains("trim") {
        return None;
    }
    Some(numeric_in(request.get("trim"), 1.0, 254.0).map_or(DEFAULT_THRESHOLD, |t| t as f32))
}

/// Bounding box `(left, top, width, height)` of pixels that differ from the
/// top-left pixel by more than `threshold` on any band.
fn find_trim(image: &ImageHandle, threshold: f32) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = image.dimensions();
    let reference = image.pixel(0, 0).to_vec();
    let threshold = threshold * image.interpretation().max_alpha() / 255.0;

    let mut left = width;
    let mut top = height;
    let mut right = 0;
    let mut bottom = 0;
    let mut found = false;
    for y in 0..height {
        for x in 0..width {
            let differs = image
                .pixel(x, y)
                .iter()
                .zip(&reference)
                .any(|(v, r)| (v - r).abs() > threshold);
            if differs {
                found = true;
                left = left.min(x);
                right = right.max(x);
                top = top.min(y);
                bottom = bottom.max(y);
            }
        }
    }
    found.then(|| (left, top, right - left + 1, bottom - top + 1))
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(threshold) = resolve_trim(request) else {
        return Applied::unchanged(image, state);
    };
    let image = match find_trim(&image, threshold) {
        Some((left, top, width, height)) => image.extract_area(left, top, width, height),
        None => {
            log::debug!("trim: uniform image, nothing to cut");
            image
        }
    };
    Applied::unchanged(image, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BandFormat, Interpretation};
    use crate::manipulators::tests::{request, rgb, state_for};

    fn framed() -> ImageHandle {
        // 6x5 white with a 2x2 dark block at (2, 1)
        let mut data = Vec::new();
        for y in 0..5 {
            for x in 0..6 {
                let v = if (2..4).contains(&x) && (1..3).contains(&y) { 0.0 } else { 255.0 };
                data.push(v);
            }
        }
        ImageHandle::new(6, 5, 1, Interpretation::BW, BandFormat::U8, data)
    }

    #[test]
    fn threshold_defaults_and_range() {
        assert_eq!(resolve_trim(&request(&[])), None);
        assert_eq!(resolve_trim(&request(&[("trim", "")])), Some(10.0));
        assert_eq!(resolve_trim(&request(&[("trim", "50")])), Some(50.0));
        assert_eq!(resolve_trim(&request(&[("trim", "0")])), Some(10.0));
        assert_eq!(resolve_trim(&request(&[("trim", "255")])), Some(10.0));
    }

    #[test]
    fn trims_to_content() {
        let img = framed();
        let state = state_for(&img);
        let out = apply(img, &request(&[("trim", "")]), &state);
        assert_eq!(out.image.dimensions(), (2, 2));
        assert!(out.image.samples().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn differences_within_threshold_are_background() {
        let img = framed();
        let state = state_for(&img);
        // The block differs by 255, so even the maximum threshold keeps it
        let out = apply(img, &request(&[("trim", "254")]), &state);
        assert_eq!(out.image.dimensions(), (2, 2));

        let faint = ImageHandle::filled(4, 4, &[100.0], Interpretation::BW, BandFormat::U8);
        let state = state_for(&faint);
        let out = apply(faint, &request(&[("trim", "")]), &state);
        assert_eq!(out.image.dimensions(), (4, 4));
    }

    #[test]
    fn absent_is_noop() {
        let img = rgb(3, 3, [1.0, 2.0, 3.0]);
        let state = state_for(&img);
        let out = apply(img.clone(), &request(&[]), &state);
        assert_eq!(out.image, img);
    }
}
