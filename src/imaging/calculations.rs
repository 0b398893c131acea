//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Where an inner box sits along one axis of a larger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    Start,
    #[default]
    Centre,
    End,
}

/// Fill in a missing target edge from the source aspect ratio.
///
/// Returns `None` when neither edge is given.
///
/// # Examples
/// ```
/// # use imgchain::imaging::calculations::resolve_target;
/// assert_eq!(resolve_target((800, 600), Some(400), None), Some((400, 300)));
/// assert_eq!(resolve_target((800, 600), None, Some(300)), Some((400, 300)));
/// assert_eq!(resolve_target((800, 600), None, None), None);
/// ```
pub fn resolve_target(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let aspect = src_w as f64 / src_h as f64;
    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => Some((w, ((w as f64 / aspect).round() as u32).max(1))),
        (None, Some(h)) => Some((((h as f64 * aspect).round() as u32).max(1), h)),
        (None, None) => None,
    }
}

/// Largest size with the source aspect ratio that fits inside `target`.
///
/// One edge matches the target exactly, the other is equal or smaller.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);
    (
        ((src_w as f64 * scale).round() as u32).clamp(1, tgt_w.max(1)),
        ((src_h as f64 * scale).round() as u32).clamp(1, tgt_h.max(1)),
    )
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Offset of an `inner` box inside `outer` along one axis.
pub fn calculate_offset(outer: u32, inner: u32, position: Position) -> u32 {
    let free = outer.saturating_sub(inner);
    match position {
        Position::Start => 0,
        Position::Centre => free / 2,
        Position::End => free,
    }
}

/// Whether `target` would enlarge `source` on either axis.
pub fn is_enlargement(source: (u32, u32), target: (u32, u32)) -> bool {
    target.0 > source.0 || target.1 > source.1
}
