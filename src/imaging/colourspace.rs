//! Colourspace conversion between [`Interpretation`]s.
//!
//! Every conversion pivots through linear-light RGB in `[0, 1]`: the source
//! pixel is decoded to linear RGB, then encoded into the target space. Alpha
//! bands are carried along and rescaled between 8- and 16-bit ranges.

use super::handle::{ImageHandle, Interpretation};

// sRGB primaries, D65 white
const RGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

const XYZ_TO_RGB: [[f32; 3]; 3] = [
    [3.240479, -1.537150, -0.498535],
    [-0.969256, 1.875991, 0.041556],
    [0.055648, -0.204043, 1.057311],
];

const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;

// (6/29)^3
const EPSILON: f32 = 0.008856;
const KAPPA_INV: f32 = 7.787;

/// Relative luminance weights for linear RGB.
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

#[inline]
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.04045 / 12.92 {
        v * 12.92
    } else {
        1.055 * v.max(0.0).powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        KAPPA_INV * t + 16.0 / 116.0
    }
}

#[inline]
fn lab_f_inv(t: f32) -> f32 {
    if t > 0.206893 {
        t * t * t
    } else {
        (t - 16.0 / 116.0) / KAPPA_INV
    }
}

/// Linear RGB → Lab (L in 0–100).
pub fn linear_rgb_to_lab([r, g, b]: [f32; 3]) -> [f32; 3] {
    let x = (RGB_TO_XYZ[0][0] * r + RGB_TO_XYZ[0][1] * g + RGB_TO_XYZ[0][2] * b) / WHITE_X;
    let y = RGB_TO_XYZ[1][0] * r + RGB_TO_XYZ[1][1] * g + RGB_TO_XYZ[1][2] * b;
    let z = (RGB_TO_XYZ[2][0] * r + RGB_TO_XYZ[2][1] * g + RGB_TO_XYZ[2][2] * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Lab → linear RGB.
pub fn lab_to_linear_rgb([l, a, b]: [f32; 3]) -> [f32; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = a / 500.0 + fy;
    let fz = fy - b / 200.0;

    let x = lab_f_inv(fx) * WHITE_X;
    let y = lab_f_inv(fy);
    let z = lab_f_inv(fz) * WHITE_Z;

    [
        XYZ_TO_RGB[0][0] * x + XYZ_TO_RGB[0][1] * y + XYZ_TO_RGB[0][2] * z,
        XYZ_TO_RGB[1][0] * x + XYZ_TO_RGB[1][1] * y + XYZ_TO_RGB[1][2] * z,
        XYZ_TO_RGB[2][0] * x + XYZ_TO_RGB[2][1] * y + XYZ_TO_RGB[2][2] * z,
    ]
}

fn decode(interpretation: Interpretation, colour: &[f32]) -> [f32; 3] {
    match interpretation {
        Interpretation::BW | Interpretation::Grey16 => {
            let v = srgb_to_linear(colour[0] / interpretation.max_alpha());
            [v, v, v]
        }
        Interpretation::Rgb | Interpretation::Srgb | Interpretation::Rgb16 => {
            let max = interpretation.max_alpha();
            [
                srgb_to_linear(colour[0] / max),
                srgb_to_linear(colour[1] / max),
                srgb_to_linear(colour[2] / max),
            ]
        }
        Interpretation::Lab => lab_to_linear_rgb([colour[0], colour[1], colour[2]]),
    }
}

fn encode(interpretation: Interpretation, linear: [f32; 3], out: &mut Vec<f32>) {
    match interpretation {
        Interpretation::BW | Interpretation::Grey16 => {
            let y = LUMA[0] * linear[0] + LUMA[1] * linear[1] + LUMA[2] * linear[2];
            out.push(linear_to_srgb(y.clamp(0.0, 1.0)) * interpretation.max_alpha());
        }
        Interpretation::Rgb | Interpretation::Srgb | Interpretation::Rgb16 => {
            let max = interpretation.max_alpha();
            out.extend(linear.iter().map(|&c| linear_to_srgb(c.clamp(0.0, 1.0)) * max));
        }
        Interpretation::Lab => out.extend(linear_rgb_to_lab(linear)),
    }
}

/// 8-bit ↔ 16-bit within the same family is a pure rescale; no transfer
/// curve is touched.
fn is_rescale_only(from: Interpretation, to: Interpretation) -> bool {
    use Interpretation::*;
    matches!(
        (from, to),
        (Rgb | Srgb | Rgb16, Rgb | Srgb | Rgb16) | (BW | Grey16, BW | Grey16)
    )
}

/// Convert `image` into `target`. Output samples are quantized to the
/// target's natural band format.
pub fn convert(image: ImageHandle, target: Interpretation) -> ImageHandle {
    let source = image.interpretation();
    if source == target {
        return image;
    }

    let src_colour = source.colour_bands();
    let dst_colour = target.colour_bands();
    let extra = image.bands() - src_colour;
    let range_scale = target.max_alpha() / source.max_alpha();
    let format = target.natural_format();
    let rescale = is_rescale_only(source, target);

    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * (dst_colour + extra));
    for px in image.pixels() {
        if rescale {
            data.extend(px[..src_colour].iter().map(|&v| v * range_scale));
        } else {
            encode(target, decode(source, &px[..src_colour]), &mut data);
        }
        data.extend(px[src_colour..].iter().map(|&a| a * range_scale));
    }
    for v in data.iter_mut() {
        *v = format.quantize(*v);
    }

    image.rebuild(width, height, dst_colour + extra, target, format, data)
}
