//! `w`, `h`, `dpr`, `t`, `a`: resize.
//!
//! Fit types:
//!
//! - `fit` (default): fit inside `w`x`h`, never enlarge
//! - `fitup`: fit inside `w`x`h`, enlarging if needed
//! - `square`: cover `w`x`h`, then crop to it at the `a` alignment
//! - `squaredown`: `square`, but never enlarge
//! - `absolute`: stretch to exactly `w`x`h`
//! - `letterbox`: `fit`, then pad to exactly `w`x`h` with `bg`
//!
//! A missing edge is derived from the source aspect ratio.

use super::{Applied, PipelineState, colour_samples, premultiplied};
use crate::imaging::calculations::{
    Position, calculate_fill_dimensions, calculate_fit_dimensions, calculate_offset,
    is_enlargement, resolve_target,
};
use crate::imaging::color::Color;
use crate::imaging::params::numeric_in;
use crate::imaging::{ImageHandle, ManipulationRequest};

/// Largest edge the pipeline will produce.
pub const MAX_DIMENSION: u32 = 71_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    #[default]
    Fit,
    FitUp,
    Square,
    SquareDown,
    Absolute,
    Letterbox,
}

impl FitMode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("fitup") => FitMode::FitUp,
            Some("square") => FitMode::Square,
            Some("squaredown") => FitMode::SquareDown,
            Some("absolute") => FitMode::Absolute,
            Some("letterbox") => FitMode::Letterbox,
            _ => FitMode::Fit,
        }
    }
}

/// Horizontal and vertical placement from `a`.
pub fn resolve_alignment(raw: Option<&str>) -> (Position, Position) {
    use Position::*;
    match raw.map(str::trim) {
        Some("top") | Some("t") => (Centre, Start),
        Some("bottom") | Some("b") => (Centre, End),
        Some("left") | Some("l") => (Start, Centre),
        Some("right") | Some("r") => (End, Centre),
        Some("top-left") | Some("tl") => (Start, Start),
        Some("top-right") | Some("tr") => (End, Start),
        Some("bottom-left") | Some("bl") => (Start, End),
        Some("bottom-right") | Some("br") => (End, End),
        _ => (Centre, Centre),
    }
}

/// Device pixel ratio in `[1, 8]`, default 1.
pub fn resolve_dpr(raw: Option<&str>) -> f64 {
    numeric_in(raw, 1.0, 8.0).unwrap_or(1.0)
}

/// A positive edge length scaled by `dpr` and capped at [`MAX_DIMENSION`].
pub fn resolve_dimension(raw: Option<&str>, dpr: f64) -> Option<u32> {
    numeric_in(raw, 1.0, MAX_DIMENSION as f64)
        .map(|v| ((v.trunc() * dpr).round() as u32).min(MAX_DIMENSION))
}

/// Resolved resize request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub alignment: (Position, Position),
}

pub fn resolve_size(request: &ManipulationRequest) -> Option<SizeRequest> {
    let dpr = resolve_dpr(request.get("dpr"));
    let width = resolve_dimension(request.get("w"), dpr);
    let height = resolve_dimension(request.get("h"), dpr);
    if width.is_none() && height.is_none() {
        return None;
    }
    Some(SizeRequest {
        width,
        height,
        fit: FitMode::parse(request.get("t")),
        alignment: resolve_alignment(request.get("a")),
    })
}

/// Crop `image` down to `target` at `alignment`.
fn crop_to(image: ImageHandle, target: (u32, u32), alignment: (Position, Position)) -> ImageHandle {
    let (w, h) = image.dimensions();
    let left = calculate_offset(w, target.0, alignment.0);
    let top = calculate_offset(h, target.1, alignment.1);
    image.extract_area(left, top, target.0, target.1)
}

/// Pad `image` to exactly `target`, centred, with `color`.
fn letterbox(image: ImageHandle, target: (u32, u32), color: Color) -> ImageHandle {
    let image = if color.is_opaque() {
        image
    } else {
        let opaque = image.interpretation().max_alpha();
        image.add_alpha(opaque)
    };
    let mut background = colour_samples(color, &image);
    // Image samples are premultiplied at this point
    if let Some(alpha) = image.alpha_band() {
        let factor = background[alpha] / image.interpretation().max_alpha();
        background[..alpha].iter_mut().for_each(|v| *v *= factor);
    }

    let (w, h) = image.dimensions();
    let left = calculate_offset(target.0, w, Position::Centre);
    let top = calculate_offset(target.1, h, Position::Centre);
    image.embed(left, top, target.0, target.1, &background)
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(size) = resolve_size(request) else {
        return Applied::unchanged(image, state);
    };
    let source = image.dimensions();
    let Some(target) = resolve_target(source, size.width, size.height) else {
        return Applied::unchanged(image, state);
    };

    let image = premultiplied(image, state);
    let image = match size.fit {
        FitMode::Fit => {
            let dims = calculate_fit_dimensions(source, target);
            if is_enlargement(source, dims) {
                image
            } else {
                image.resize(dims.0, dims.1)
            }
        }
        FitMode::FitUp => {
            let dims = calculate_fit_dimensions(source, target);
            image.resize(dims.0, dims.1)
        }
        FitMode::Absolute => image.resize(target.0, target.1),
        FitMode::Square => {
            let fill = calculate_fill_dimensions(source, target);
            crop_to(image.resize(fill.0, fill.1), target, size.alignment)
        }
        FitMode::SquareDown => {
            let fill = calculate_fill_dimensions(source, target);
            if is_enlargement(source, fill) {
                crop_to(image, target, size.alignment)
            } else {
                crop_to(image.resize(fill.0, fill.1), target, size.alignment)
            }
        }
        FitMode::Letterbox => {
            let dims = calculate_fit_dimensions(source, target);
            let fitted = if is_enlargement(source, dims) {
                image
            } else {
                image.resize(dims.0, dims.1)
            };
            letterbox(fitted, target, Color::parse(request.get("bg")))
        }
    };
    log::debug!(
        "size: {}x{} -> {}x{} ({:?})",
        source.0,
        source.1,
        image.width(),
        image.height(),
        size.fit
    );

    Applied {
        has_alpha: image.has_alpha(),
        is_premultiplied: true,
        image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::tests::{request, rgb, rgba, state_for};

    fn run(img: ImageHandle, pairs: &[(&str, &str)]) -> Applied {
        let state = state_for(&img);
        apply(img, &request(pairs), &state)
    }

    #[test]
    fn dimension_resolution() {
        assert_eq!(resolve_dimension(Some("300"), 1.0), Some(300));
        assert_eq!(resolve_dimension(Some("300"), 2.0), Some(600));
        assert_eq!(resolve_dimension(Some("0"), 1.0), None);
        assert_eq!(resolve_dimension(Some("71001"), 1.0), None);
        assert_eq!(resolve_dimension(Some("70000"), 8.0), Some(MAX_DIMENSION));
        assert_eq!(resolve_dpr(Some("9")), 1.0);
        assert_eq!(resolve_dpr(Some("2")), 2.0);
    }

    #[test]
    fn fit_type_and_alignment_parsing() {
        assert_eq!(FitMode::parse(Some("letterbox")), FitMode::Letterbox);
        assert_eq!(FitMode::parse(Some("bogus")), FitMode::Fit);
        assert_eq!(FitMode::parse(None), FitMode::Fit);
        assert_eq!(resolve_alignment(Some("bottom-right")), (Position::End, Position::End));
        assert_eq!(resolve_alignment(Some("t")), (Position::Centre, Position::Start));
        assert_eq!(resolve_alignment(None), (Position::Centre, Position::Centre));
    }

    #[test]
    fn absent_size_passes_state_through() {
        let img = rgba(4, 4, [0.0, 0.0, 0.0, 255.0]);
        let out = run(img.clone(), &[]);
        assert_eq!(out.image, img);
        assert!(out.has_alpha);
        assert!(!out.is_premultiplied);
    }

    #[test]
    fn fit_keeps_aspect_and_never_enlarges() {
        let out = run(rgb(800, 600, [1.0, 1.0, 1.0]), &[("w", "400"), ("h", "400")]);
        assert_eq!(out.image.dimensions(), (400, 300));

        let out = run(rgb(80, 60, [1.0, 1.0, 1.0]), &[("w", "400")]);
        assert_eq!(out.image.dimensions(), (80, 60));
    }

    #[test]
    fn fitup_enlarges() {
        let out = run(rgb(80, 60, [1.0, 1.0, 1.0]), &[("w", "160"), ("t", "fitup")]);
        assert_eq!(out.image.dimensions(), (160, 120));
    }

    #[test]
    fn square_covers_and_crops() {
        let out = run(rgb(80, 40, [1.0, 1.0, 1.0]), &[("w", "20"), ("h", "20"), ("t", "square")]);
        assert_eq!(out.image.dimensions(), (20, 20));
    }

    #[test]
    fn squaredown_does_not_enlarge() {
        let out = run(
            rgb(30, 10, [1.0, 1.0, 1.0]),
            &[("w", "20"), ("h", "20"), ("t", "squaredown")],
        );
        assert_eq!(out.image.dimensions(), (20, 10));
    }

    #[test]
    fn absolute_stretches() {
        let out = run(rgb(80, 40, [1.0, 1.0, 1.0]), &[("w", "10"), ("h", "30"), ("t", "absolute")]);
        assert_eq!(out.image.dimensions(), (10, 30));
    }

    #[test]
    fn letterbox_pads_with_transparency_by_default() {
        let out = run(rgb(40, 20, [9.0, 9.0, 9.0]), &[("w", "20"), ("h", "20"), ("t", "letterbox")]);
        assert_eq!(out.image.dimensions(), (20, 20));
        assert!(out.has_alpha);
        assert_eq!(out.image.pixel(0, 0)[3], 0.0);
        assert_eq!(out.image.pixel(10, 10)[3], 255.0);
    }

    #[test]
    fn letterbox_with_opaque_colour_stays_opaque() {
        let out = run(
            rgb(40, 20, [9.0, 9.0, 9.0]),
            &[("w", "20"), ("h", "20"), ("t", "letterbox"), ("bg", "red")],
        );
        assert!(!out.has_alpha);
        assert_eq!(out.image.pixel(0, 0), &[255.0, 0.0, 0.0]);
    }

    #[test]
    fn dpr_multiplies_target() {
        let out = run(rgb(800, 600, [1.0, 1.0, 1.0]), &[("w", "100"), ("dpr", "2")]);
        assert_eq!(out.image.dimensions(), (200, 150));
    }

    #[test]
    fn active_resize_premultiplies_alpha() {
        let out = run(rgba(10, 10, [200.0, 100.0, 50.0, 127.5]), &[("w", "5")]);
        assert!(out.is_premultiplied);
        assert!(out.has_alpha);
        let expected = [100.0, 50.0, 25.0, 127.5];
        for (got, want) in out.image.pixel(0, 0).iter().zip(expected) {
            assert!((got - want).abs() < 0.01, "{got} vs {want}");
        }
    }
}
