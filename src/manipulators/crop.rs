//! `crop=w,h,x,y`: extract a rectangle.

use super::{Applied, PipelineState};
use crate::imaging::params::numeric;
use crate::imaging::{ImageHandle, ManipulationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// All four fields must be non-negative numbers and the size non-zero.
pub fn resolve_crop(request: &ManipulationRequest) -> Option<CropRect> {
    let fields: Vec<u32> = request
        .get("crop")?
        .split(',')
        .map(|f| numeric(Some(f)).filter(|v| *v >= 0.0 && *v <= u32::MAX as f64).map(|v| v as u32))
        .collect::<Option<_>>()?;
    match *fields.as_slice() {
        [width, height, x, y] if width > 0 && height > 0 => Some(CropRect { width, height, x, y }),
        _ => None,
    }
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(rect) = resolve_crop(request) else {
        return Applied::unchanged(image, state);
    };
    let (width, height) = image.dimensions();
    if rect.x >= width || rect.y >= height {
        log::debug!("crop: origin {},{} outside {width}x{height}", rect.x, rect.y);
        return Applied::unchanged(image, state);
    }
    let image = image.extract_area(rect.x, rect.y, rect.width, rect.height);
    Applied::unchanged(image, state)
}
