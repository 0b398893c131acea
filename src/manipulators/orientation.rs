//! `or`: clockwise quarter-turn rotation.

use super::{Applied, PipelineState};
use crate::imaging::{Angle, ImageHandle, ManipulationRequest};

pub fn resolve_orientation(request: &ManipulationRequest) -> Option<Angle> {
    match request.get("or")?.trim() {
        "90" => Some(Angle::D90),
        "180" => Some(Angle::D180),
        "270" => Some(Angle::D270),
        _ => None,
    }
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let image = match resolve_orientation(request) {
        Some(angle) => image.rotate(angle),
        None => image,
    };
    Applied::unchanged(image, state)
}
