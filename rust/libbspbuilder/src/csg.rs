use std::collections::VecDeque;

use bsp::contents::Contents;
use log::{debug, warn};

use crate::brush::{CompileBrush, CompileSide};
use crate::planes::PlaneSet;
use crate::winding::{Winding, CLIP_EPSILON};

/// Distance a brush must reach past a plane before it counts as split.
const SPLIT_TOLERANCE: f64 = 0.1;
/// Fragments smaller than this are thrown away.
const MIN_BRUSH_VOLUME: f64 = 1.0;
/// Give up on a pair when both subtractions shatter into more pieces.
const MAX_FRAGMENTS: usize = 4;

fn finish_fragment(sides: Vec<CompileSide>, template: &CompileBrush) -> Option<CompileBrush> {
    if sides.len() < 3 {
        return None;
    }
    let mut brush = CompileBrush {
        original: template.original,
        contents: template.contents,
        sides,
        bounds: template.bounds,
    };
    brush.update_bounds();
    if !brush.has_valid_bounds() {
        return None;
    }
    Some(brush)
}

// Whichever side holds the larger part of a brush that barely touches a plane.
fn mostly_on_front(brush: &CompileBrush, plane_set: &PlaneSet, plane_num: usize) -> bool {
    let plane = plane_set.get(plane_num);
    let mut max = 0.0f64;
    for side in &brush.sides {
        if let Some(w) = &side.winding {
            for p in &w.points {
                let d = plane.distance_to(p);
                if d.abs() > max.abs() {
                    max = d;
                }
            }
        }
    }
    max > 0.0
}

/// Split a brush by a plane into (front, back). A brush that only touches
/// the plane comes back whole on one side.
pub fn split_brush(
    brush: &CompileBrush,
    plane_num: usize,
    plane_set: &PlaneSet,
) -> (Option<CompileBrush>, Option<CompileBrush>) {
    let plane = plane_set.get(plane_num);

    let mut d_front = 0.0f64;
    let mut d_back = 0.0f64;
    for side in &brush.sides {
        if let Some(w) = &side.winding {
            for p in &w.points {
                let d = plane.distance_to(p);
                if d > 0.0 && d > d_front {
                    d_front = d;
                }
                if d < 0.0 && d < d_back {
                    d_back = d;
                }
            }
        }
    }

    if d_front < SPLIT_TOLERANCE {
        return (None, Some(brush.clone()));
    }
    if d_back > -SPLIT_TOLERANCE {
        return (Some(brush.clone()), None);
    }

    // The new face shared by both halves
    let mut mid = Some(Winding::base_for_plane(plane.normal, plane.dist));
    for side in &brush.sides {
        let clip = plane_set.get(side.plane_num ^ 1);
        mid = match mid {
            Some(w) => w.clip(clip.normal, clip.dist, 0.0, true),
            None => break,
        };
    }

    let mid = match mid {
        Some(w) if !w.is_tiny() => w,
        _ => {
            return if mostly_on_front(brush, plane_set, plane_num) {
                (Some(brush.clone()), None)
            } else {
                (None, Some(brush.clone()))
            };
        }
    };

    let mut front_sides = vec![];
    let mut back_sides = vec![];
    for side in &brush.sides {
        let w = match &side.winding {
            Some(w) => w,
            None => continue,
        };
        let (front, back) = w.split(plane.normal, plane.dist, 0.0);
        if let Some(front) = front {
            front_sides.push(CompileSide {
                winding: Some(front),
                ..side.clone()
            });
        }
        if let Some(back) = back {
            back_sides.push(CompileSide {
                winding: Some(back),
                ..side.clone()
            });
        }
    }

    let mut front = finish_fragment(front_sides, brush);
    let mut back = finish_fragment(back_sides, brush);

    if front.is_none() || back.is_none() {
        if front.is_none() && back.is_none() {
            warn!("Split removed brush {}", brush.original);
        } else {
            debug!("Split of brush {} not on both sides", brush.original);
        }
        return (front.map(|_| brush.clone()), back.map(|_| brush.clone()));
    }

    if let Some(b) = front.as_mut() {
        b.sides.push(CompileSide {
            plane_num: plane_num ^ 1,
            tex_info: None,
            winding: Some(mid.reversed()),
            visible: false,
            bevel: false,
        });
        b.update_bounds();
    }
    if let Some(b) = back.as_mut() {
        b.sides.push(CompileSide {
            plane_num,
            tex_info: None,
            winding: Some(mid),
            visible: false,
            bevel: false,
        });
        b.update_bounds();
    }

    let front = front.filter(|b| b.volume(plane_set) >= MIN_BRUSH_VOLUME);
    let back = back.filter(|b| b.volume(plane_set) >= MIN_BRUSH_VOLUME);
    (front, back)
}

// None when the brushes don't intersect, so `a` survives untouched.
fn try_subtract(a: &CompileBrush, b: &CompileBrush, plane_set: &PlaneSet) -> Option<Vec<CompileBrush>> {
    let mut outside = vec![];
    let mut inside = a.clone();
    for side in &b.sides {
        let (front, back) = split_brush(&inside, side.plane_num, plane_set);
        if let Some(front) = front {
            outside.push(front);
        }
        inside = back?;
    }
    Some(outside)
}

/// The parts of `a` that lie outside `b`. Empty when `a` is swallowed.
pub fn subtract_brush(a: &CompileBrush, b: &CompileBrush, plane_set: &PlaneSet) -> Vec<CompileBrush> {
    try_subtract(a, b, plane_set).unwrap_or_else(|| vec![a.clone()])
}

/// Whether `b1` may carve `b2`.
pub fn brush_ge(b1: &CompileBrush, b2: &CompileBrush, preserve_detail: bool) -> bool {
    if preserve_detail && b1.contents.is_detail() && !b2.contents.is_detail() {
        return false;
    }
    b1.contents.is_solid()
}

pub fn brushes_disjoint(a: &CompileBrush, b: &CompileBrush) -> bool {
    if !a.bounds.intersects(&b.bounds, CLIP_EPSILON) {
        return true;
    }
    // Touching faces on a shared plane
    a.sides
        .iter()
        .any(|sa| b.sides.iter().any(|sb| sa.plane_num == sb.plane_num ^ 1))
}

/// Remove overlap between brushes so every point of space belongs to at
/// most one of them. The stronger brush keeps its volume, and of two equal
/// brushes the one that breaks into fewer pieces gets carved.
pub fn process_csg(
    brushes: Vec<CompileBrush>,
    plane_set: &PlaneSet,
    preserve_detail: bool,
) -> Vec<CompileBrush> {
    let input = brushes.len();
    let mut keep = vec![];
    let mut work: VecDeque<CompileBrush> = brushes.into();

    'newlist: while let Some(b1) = work.pop_front() {
        let mut j = 0;
        while j < work.len() {
            let b2 = &work[j];
            if brushes_disjoint(&b1, b2) {
                j += 1;
                continue;
            }

            let mut sub = None;
            let mut sub2 = None;
            let mut c1 = usize::MAX;
            let mut c2 = usize::MAX;

            if brush_ge(b2, &b1, preserve_detail) {
                match try_subtract(&b1, b2, plane_set) {
                    Some(pieces) => {
                        c1 = pieces.len();
                        sub = Some(pieces);
                    }
                    None => {
                        j += 1;
                        continue;
                    }
                }
            }
            if brush_ge(&b1, b2, preserve_detail) {
                match try_subtract(b2, &b1, plane_set) {
                    Some(pieces) => {
                        c2 = pieces.len();
                        sub2 = Some(pieces);
                    }
                    None => {
                        j += 1;
                        continue;
                    }
                }
            }

            if sub.is_none() && sub2.is_none() {
                j += 1;
                continue;
            }
            if c1 > MAX_FRAGMENTS && c2 > MAX_FRAGMENTS {
                debug!(
                    "Overlap of brushes {} and {} left alone",
                    b1.original, b2.original
                );
                j += 1;
                continue;
            }

            if c2 < c1 {
                work.remove(j);
                work.extend(sub2.unwrap_or_default());
                work.push_front(b1);
            } else {
                work.extend(sub.unwrap_or_default());
            }
            continue 'newlist;
        }
        keep.push(b1);
    }

    debug!("CSG: {} brushes in, {} fragments out", input, keep.len());
    keep
}

/// Contents of a region covered by both `a` and `b`.
pub fn combine_contents(a: Contents, b: Contents) -> Contents {
    let all = a | b;
    if all.is_solid() {
        return Contents::SOLID;
    }
    all.lowest_visible() | (all - Contents::visible_mask())
}
