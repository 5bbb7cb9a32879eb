use bsp::contents::Contents;
use bsp::types::Vec3;

use crate::defs::{BrushDef, PlaneDef, SideDef, TextureDef};

fn axial_side(normal: Vec3, dist: f64, texture: &TextureDef) -> SideDef {
    SideDef {
        plane: PlaneDef::Equation { normal, dist },
        texture: texture.clone(),
    }
}

/// An axis aligned box centred on `origin`. Sides come out as top, bottom,
/// north, south, east, west.
pub fn box_brush(origin: Vec3, size: Vec3, texture: &TextureDef, contents: Contents) -> BrushDef {
    let half = size * 0.5;
    let mins = origin - half;
    let maxs = origin + half;

    BrushDef {
        sides: vec![
            axial_side(Vec3::new(0.0, 0.0, 1.0), maxs.z, texture),
            axial_side(Vec3::new(0.0, 0.0, -1.0), -mins.z, texture),
            axial_side(Vec3::new(0.0, 1.0, 0.0), maxs.y, texture),
            axial_side(Vec3::new(0.0, -1.0, 0.0), -mins.y, texture),
            axial_side(Vec3::new(1.0, 0.0, 0.0), maxs.x, texture),
            axial_side(Vec3::new(-1.0, 0.0, 0.0), -mins.x, texture),
        ],
        contents,
    }
}

fn box_from_bounds(mins: Vec3, maxs: Vec3, texture: &TextureDef, contents: Contents) -> BrushDef {
    let size = maxs - mins;
    box_brush(mins + size * 0.5, size, texture, contents)
}

/// A closed room of six overlapping wall brushes, `wall_thickness` thick,
/// whose outside matches the box at `origin` with `size`.
pub fn hollow_box(
    origin: Vec3,
    size: Vec3,
    wall_thickness: f64,
    texture: &TextureDef,
    contents: Contents,
) -> Vec<BrushDef> {
    let half = size * 0.5;
    let mins = origin - half;
    let maxs = origin + half;
    let t = wall_thickness;

    vec![
        // top
        box_from_bounds(Vec3::new(mins.x, mins.y, maxs.z - t), maxs, texture, contents),
        // bottom
        box_from_bounds(mins, Vec3::new(maxs.x, maxs.y, mins.z + t), texture, contents),
        // north
        box_from_bounds(Vec3::new(mins.x, maxs.y - t, mins.z), maxs, texture, contents),
        // south
        box_from_bounds(mins, Vec3::new(maxs.x, mins.y + t, maxs.z), texture, contents),
        // east
        box_from_bounds(Vec3::new(maxs.x - t, mins.y, mins.z), maxs, texture, contents),
        // west
        box_from_bounds(mins, Vec3::new(mins.x + t, maxs.y, maxs.z), texture, contents),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_planes_face_outward() {
        let b = box_brush(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(64.0, 32.0, 16.0),
            &TextureDef::default(),
            Contents::SOLID,
        );
        assert_eq!(b.sides.len(), 6);
        match &b.sides[0].plane {
            PlaneDef::Equation { normal, dist } => {
                assert_eq!(*normal, Vec3::new(0.0, 0.0, 1.0));
                assert_eq!(*dist, 8.0);
            }
            _ => panic!("expected plane equation"),
        }
        match &b.sides[5].plane {
            PlaneDef::Equation { normal, dist } => {
                assert_eq!(*normal, Vec3::new(-1.0, 0.0, 0.0));
                assert_eq!(*dist, 32.0);
            }
            _ => panic!("expected plane equation"),
        }
    }

    #[test]
    fn hollow_box_has_six_walls() {
        let walls = hollow_box(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(256.0, 256.0, 128.0),
            16.0,
            &TextureDef::default(),
            Contents::SOLID,
        );
        assert_eq!(walls.len(), 6);
        // The floor spans the full footprint and is 16 units thick
        match (&walls[1].sides[0].plane, &walls[1].sides[1].plane) {
            (PlaneDef::Equation { dist: top, .. }, PlaneDef::Equation { dist: bottom, .. }) => {
                assert_eq!(*top, -48.0);
                assert_eq!(*bottom, 64.0);
            }
            _ => panic!("expected plane equations"),
        }
    }
}
