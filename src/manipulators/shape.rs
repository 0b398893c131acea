//! `shape`: mask everything outside a centred shape to transparent.

use super::{Applied, PipelineState};
use crate::imaging::{ImageHandle, ManipulationRequest};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Circle,
    Ellipse,
    Triangle,
    Triangle180,
    Pentagon,
    Pentagon180,
    Hexagon,
    Square,
    Star,
    Heart,
}

impl Shape {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        Some(match raw?.trim() {
            "circle" => Shape::Circle,
            "ellipse" => Shape::Ellipse,
            "triangle" => Shape::Triangle,
            "triangle-180" => Shape::Triangle180,
            "pentagon" => Shape::Pentagon,
            "pentagon-180" => Shape::Pentagon180,
            "hexagon" => Shape::Hexagon,
            "square" => Shape::Square,
            "star" => Shape::Star,
            "heart" => Shape::Heart,
            _ => return None,
        })
    }
}

/// Vertices of a regular polygon around (`cx`, `cy`), first vertex at
/// `start` radians (0 = right, clockwise in image space).
fn regular_polygon(cx: f32, cy: f32, radius: f32, sides: usize, start: f32) -> Vec<(f32, f32)> {
    (0..sides)
        .map(|i| {
            let theta = start + 2.0 * PI * i as f32 / sides as f32;
            (cx + radius * theta.cos(), cy + radius * theta.sin())
        })
        .collect()
}

fn star(cx: f32, cy: f32, radius: f32) -> Vec<(f32, f32)> {
    let inner = radius * 0.382;
    (0..10)
        .map(|i| {
            let theta = -PI / 2.0 + PI * i as f32 / 5.0;
            let r = if i % 2 == 0 { radius } else { inner };
            (cx + r * theta.cos(), cy + r * theta.sin())
        })
        .collect()
}

/// Even-odd ray casting.
fn inside_polygon(polygon: &[(f32, f32)], x: f32, y: f32) -> bool {
    if polygon.is_empty() {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether the pixel centre (`x`, `y`) lies inside `shape` drawn on a
/// `width` x `height` canvas.
fn contains(shape: Shape, width: f32, height: f32) -> impl Fn(f32, f32) -> bool {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let radius = width.min(height) / 2.0;
    let polygon = match shape {
        Shape::Triangle => regular_polygon(cx, cy, radius, 3, -PI / 2.0),
        Shape::Triangle180 => regular_polygon(cx, cy, radius, 3, PI / 2.0),
        Shape::Pentagon => regular_polygon(cx, cy, radius, 5, -PI / 2.0),
        Shape::Pentagon180 => regular_polygon(cx, cy, radius, 5, PI / 2.0),
        Shape::Hexagon => regular_polygon(cx, cy, radius, 6, 0.0),
        Shape::Star => star(cx, cy, radius),
        _ => Vec::new(),
    };

    move |x, y| {
        let (dx, dy) = (x - cx, y - cy);
        match shape {
            Shape::Circle => dx * dx + dy * dy <= radius * radius,
            Shape::Ellipse => (dx / cx).powi(2) + (dy / cy).powi(2) <= 1.0,
            Shape::Square => dx.abs() <= radius && dy.abs() <= radius,
            Shape::Heart => {
                // (x² + y² - 1)³ - x²y³ <= 0, y up, fitted to the radius
                let hx = dx / radius * 1.2;
                let hy = -dy / radius * 1.2 + 0.15;
                let base = hx * hx + hy * hy - 1.0;
                base * base * base - hx * hx * hy * hy * hy <= 0.0
            }
            _ => inside_polygon(&polygon, x, y),
        }
    }
}

pub fn apply(image: ImageHandle, request: &ManipulationRequest, state: &PipelineState) -> Applied {
    let Some(shape) = Shape::parse(request.get("shape")) else {
        return Applied::unchanged(image, state);
    };

    let opaque = image.interpretation().max_alpha();
    let mut image = image.add_alpha(opaque);
    let (width, height) = image.dimensions();
    let inside = contains(shape, width as f32, height as f32);
    for y in 0..height {
        for x in 0..width {
            if !inside(x as f32 + 0.5, y as f32 + 0.5) {
                image.pixel_mut(x, y).iter_mut().for_each(|v| *v = 0.0);
            }
        }
    }

    Applied {
        image,
        has_alpha: true,
        is_premultiplied: state.is_premultiplied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::tests::{request, rgb, state_for};

    fn masked(shape: &str, width: u32, height: u32) -> Applied {
        let img = rgb(width, height, [200.0, 200.0, 200.0]);
        let state = state_for(&img);
        apply(img, &request(&[("shape", shape)]), &state)
    }

    fn alpha_at(applied: &Applied, x: u32, y: u32) -> f32 {
        applied.image.pixel(x, y)[3]
    }

    #[test]
    fn parses_every_shape() {
        for name in [
            "circle",
            "ellipse",
            "triangle",
            "triangle-180",
            "pentagon",
            "pentagon-180",
            "hexagon",
            "square",
            "star",
            "heart",
        ] {
            assert!(Shape::parse(Some(name)).is_some(), "{name}");
        }
        assert_eq!(Shape::parse(Some("blob")), None);
        assert_eq!(Shape::parse(None), None);
    }

    #[test]
    fn circle_masks_corners_and_keeps_centre() {
        let out = masked("circle", 20, 20);
        assert!(out.has_alpha);
        assert_eq!(out.image.dimensions(), (20, 20));
        assert_eq!(alpha_at(&out, 0, 0), 0.0);
        assert_eq!(alpha_at(&out, 10, 10), 255.0);
        assert_eq!(out.image.pixel(0, 0), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn triangles_point_opposite_ways() {
        let up = masked("triangle", 40, 40);
        let down = masked("triangle-180", 40, 40);
        // near the top centre only the upward triangle is solid
        assert_eq!(alpha_at(&up, 20, 2), 255.0);
        assert_eq!(alpha_at(&down, 20, 2), 0.0);
        assert_eq!(alpha_at(&up, 1, 1), 0.0);
    }

    #[test]
    fn every_shape_keeps_the_centre() {
        for name in [
            "ellipse",
            "pentagon",
            "pentagon-180",
            "hexagon",
            "star",
            "heart",
        ] {
            let out = masked(name, 30, 30);
            assert_eq!(alpha_at(&out, 15, 15), 255.0, "{name}");
            assert_eq!(alpha_at(&out, 0, 29), 0.0, "{name}");
        }
    }

    #[test]
    fn square_uses_shorter_edge() {
        let out = masked("square", 40, 20);
        assert_eq!(alpha_at(&out, 5, 10), 0.0);
        assert_eq!(alpha_at(&out, 20, 10), 255.0);
    }

    #[test]
    fn unknown_shape_is_noop() {
        let img = rgb(4, 4, [1.0, 1.0, 1.0]);
        let state = state_for(&img);
        let out = apply(img.clone(), &request(&[("shape", "blob")]), &state);
        assert_eq!(out.image, img);
        assert!(!out.has_alpha);
    }
}
