//! The operator chain.
//!
//! Every operator reads its own parameters from the [`ManipulationRequest`],
//! transforms the image (or passes it through when its parameters are absent)
//! and reports what it now knows about alpha and premultiplication. The
//! orchestrator only trusts the reports an operator is authoritative for:
//!
//! | Operator | `has_alpha` | `is_premultiplied` |
//! |---|---|---|
//! | Size | yes | yes |
//! | Shape | yes | |
//! | Sharpen, Blur, Background | | yes |
//!
//! Chain order is fixed; see [`Manipulator::CHAIN`].

mod adjust;
mod background;
mod blur;
mod crop;
mod filter;
mod orientation;
mod shape;
mod sharpen;
mod size;
mod trim;

use crate::imaging::color::Color;
use crate::imaging::colourspace::{linear_rgb_to_lab, srgb_to_linear};
use crate::imaging::{AccessMode, ImageHandle, Interpretation, ManipulationRequest};

/// Transformation state threaded through the chain for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineState {
    pub has_alpha: bool,
    pub is_16_bit: bool,
    pub is_premultiplied: bool,
    pub access: AccessMode,
}

impl PipelineState {
    /// Initial state for a freshly decoded image.
    pub fn for_image(image: &ImageHandle) -> Self {
        Self {
            has_alpha: image.has_alpha(),
            is_16_bit: image.interpretation().is_16_bit(),
            is_premultiplied: false,
            access: image.access(),
        }
    }

    /// Fold an operator's report into the state, keeping only the fields
    /// `manipulator` is authoritative for.
    pub fn absorb(&mut self, manipulator: Manipulator, applied: &Applied) {
        if manipulator.reports_alpha() {
            self.has_alpha = applied.has_alpha;
        }
        if manipulator.reports_premultiplication() {
            self.is_premultiplied = applied.is_premultiplied;
        }
    }
}

/// What an operator hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub image: ImageHandle,
    pub has_alpha: bool,
    pub is_premultiplied: bool,
}

impl Applied {
    /// Image changed (or not); state untouched.
    pub fn unchanged(image: ImageHandle, state: &PipelineState) -> Self {
        Self {
            image,
            has_alpha: state.has_alpha,
            is_premultiplied: state.is_premultiplied,
        }
    }
}

/// A single stage of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manipulator {
    Trim,
    Orientation,
    Crop,
    Size,
    Shape,
    Brightness,
    Contrast,
    Gamma,
    Filter,
    Sharpen,
    Blur,
    Background,
}

impl Manipulator {
    /// The fixed execution order.
    pub const CHAIN: [Manipulator; 12] = [
        Manipulator::Trim,
        Manipulator::Orientation,
        Manipulator::Crop,
        Manipulator::Size,
        Manipulator::Shape,
        Manipulator::Brightness,
        Manipulator::Contrast,
        Manipulator::Gamma,
        Manipulator::Filter,
        Manipulator::Sharpen,
        Manipulator::Blur,
        Manipulator::Background,
    ];

    pub fn apply(
        self,
        image: ImageHandle,
        request: &ManipulationRequest,
        state: &PipelineState,
    ) -> Applied {
        match self {
            Manipulator::Trim => trim::apply(image, request, state),
            Manipulator::Orientation => orientation::apply(image, request, state),
            Manipulator::Crop => crop::apply(image, request, state),
            Manipulator::Size => size::apply(image, request, state),
            Manipulator::Shape => shape::apply(image, request, state),
            Manipulator::Brightness => adjust::brightness(image, request, state),
            Manipulator::Contrast => adjust::contrast(image, request, state),
            Manipulator::Gamma => adjust::gamma(image, request, state),
            Manipulator::Filter => filter::apply(image, request, state),
            Manipulator::Sharpen => sharpen::apply(image, request, state),
            Manipulator::Blur => blur::apply(image, request, state),
            Manipulator::Background => background::apply(image, request, state),
        }
    }

    /// Whether this operator's `has_alpha` report overrides the state.
    pub fn reports_alpha(self) -> bool {
        match self {
            Manipulator::Size | Manipulator::Shape => true,
            Manipulator::Trim
            | Manipulator::Orientation
            | Manipulator::Crop
            | Manipulator::Brightness
            | Manipulator::Contrast
            | Manipulator::Gamma
            | Manipulator::Filter
            | Manipulator::Sharpen
            | Manipulator::Blur
            | Manipulator::Background => false,
        }
    }

    /// Whether this operator's `is_premultiplied` report overrides the state.
    pub fn reports_premultiplication(self) -> bool {
        match self {
            Manipulator::Size
            | Manipulator::Sharpen
            | Manipulator::Blur
            | Manipulator::Background => true,
            Manipulator::Trim
            | Manipulator::Orientation
            | Manipulator::Crop
            | Manipulator::Shape
            | Manipulator::Brightness
            | Manipulator::Contrast
            | Manipulator::Gamma
            | Manipulator::Filter => false,
        }
    }

    /// Whether the request asks for something that reads pixels out of order.
    pub fn needs_random_access(request: &ManipulationRequest) -> bool {
        request.contains("trim")
            || matches!(request.get("or"), Some("90" | "270"))
            || request.contains("blur")
            || request.contains("sharp")
    }
}

/// Premultiply an alpha image unless that already happened upstream.
pub(crate) fn premultiplied(image: ImageHandle, state: &PipelineState) -> ImageHandle {
    if image.has_alpha() && !state.is_premultiplied {
        image.premultiply()
    } else {
        image
    }
}

/// Per-band sample values of `color` for an image laid out like `image`.
///
/// Colour bands follow the image's interpretation; an alpha band, when
/// present, receives the colour's alpha scaled to the image's range.
pub(crate) fn colour_samples(color: Color, image: &ImageHandle) -> Vec<f32> {
    let interpretation = image.interpretation();
    let max = interpretation.max_alpha();
    let scale = max / 255.0;
    let [r, g, b, a] = color.to_rgba().map(f32::from);

    let mut samples = match interpretation {
        Interpretation::BW | Interpretation::Grey16 => {
            vec![(0.2126 * r + 0.7152 * g + 0.0722 * b) * scale]
        }
        Interpretation::Rgb | Interpretation::Srgb | Interpretation::Rgb16 => {
            vec![r * scale, g * scale, b * scale]
        }
        Interpretation::Lab => linear_rgb_to_lab([
            srgb_to_linear(r / 255.0),
            srgb_to_linear(g / 255.0),
            srgb_to_linear(b / 255.0),
        ])
        .to_vec(),
    };
    if image.has_alpha() {
        samples.push(a * scale);
    }
    samples.resize(image.bands(), 0.0);
    samples
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::imaging::BandFormat;

    pub fn rgb(width: u32, height: u32, pixel: [f32; 3]) -> ImageHandle {
        ImageHandle::filled(width, height, &pixel, Interpretation::Srgb, BandFormat::U8)
    }

    pub fn rgba(width: u32, height: u32, pixel: [f32; 4]) -> ImageHandle {
        ImageHandle::filled(width, height, &pixel, Interpretation::Srgb, BandFormat::U8)
    }

    pub fn state_for(image: &ImageHandle) -> PipelineState {
        PipelineState::for_image(image)
    }

    pub fn request(pairs: &[(&str, &str)]) -> ManipulationRequest {
        pairs.iter().copied().collect()
    }

    #[test]
    fn chain_order_is_fixed() {
        assert_eq!(Manipulator::CHAIN.first(), Some(&Manipulator::Trim));
        assert_eq!(Manipulator::CHAIN.last(), Some(&Manipulator::Background));
        let sharpen = Manipulator::CHAIN.iter().position(|m| *m == Manipulator::Sharpen);
        let filter = Manipulator::CHAIN.iter().position(|m| *m == Manipulator::Filter);
        assert!(filter < sharpen);
    }

    #[test]
    fn authority_table() {
        let alpha: Vec<_> = Manipulator::CHAIN.into_iter().filter(|m| m.reports_alpha()).collect();
        assert_eq!(alpha, vec![Manipulator::Size, Manipulator::Shape]);

        let premultiplied: Vec<_> = Manipulator::CHAIN
            .into_iter()
            .filter(|m| m.reports_premultiplication())
            .collect();
        assert_eq!(
            premultiplied,
            vec![
                Manipulator::Size,
                Manipulator::Sharpen,
                Manipulator::Blur,
                Manipulator::Background
            ]
        );
    }

    #[test]
    fn absorb_ignores_non_authoritative_reports() {
        let img = rgb(2, 2, [0.0, 0.0, 0.0]);
        let mut state = state_for(&img);
        let applied = Applied {
            image: img,
            has_alpha: true,
            is_premultiplied: true,
        };

        state.absorb(Manipulator::Filter, &applied);
        assert!(!state.has_alpha);
        assert!(!state.is_premultiplied);

        state.absorb(Manipulator::Shape, &applied);
        assert!(state.has_alpha);
        assert!(!state.is_premultiplied);

        state.absorb(Manipulator::Blur, &applied);
        assert!(state.is_premultiplied);
    }

    #[test]
    fn random_access_triggers() {
        assert!(Manipulator::needs_random_access(&request(&[("trim", "")])));
        assert!(Manipulator::needs_random_access(&request(&[("or", "90")])));
        assert!(Manipulator::needs_random_access(&request(&[("or", "270")])));
        assert!(Manipulator::needs_random_access(&request(&[("blur", "5")])));
        assert!(Manipulator::needs_random_access(&request(&[("sharp", "")])));
        assert!(!Manipulator::needs_random_access(&request(&[("or", "180")])));
        assert!(!Manipulator::needs_random_access(&request(&[("w", "100")])));
    }

    #[test]
    fn initial_state_reflects_decode() {
        let deep = ImageHandle::filled(
            1,
            1,
            &[0.0, 0.0, 0.0, 65535.0],
            Interpretation::Rgb16,
            BandFormat::U16,
        );
        let state = state_for(&deep);
        assert!(state.has_alpha);
        assert!(state.is_16_bit);
        assert!(!state.is_premultiplied);
    }

    #[test]
    fn colour_samples_follow_layout() {
        let red = Color::rgba(255, 0, 0, 128);
        assert_eq!(colour_samples(red, &rgba(1, 1, [0.0; 4])), vec![255.0, 0.0, 0.0, 128.0]);
        assert_eq!(colour_samples(red, &rgb(1, 1, [0.0; 3])), vec![255.0, 0.0, 0.0]);

        let deep = ImageHandle::filled(1, 1, &[0.0, 0.0], Interpretation::Grey16, BandFormat::U16);
        let white = colour_samples(Color::rgb(255, 255, 255), &deep);
        assert!((white[0] - 65535.0).abs() < 1.0);
        assert_eq!(white[1], 65535.0);
    }
}
