use bsp::bsp::TexInfoIndex;
use bsp::contents::Contents;
use bsp::types::{BoxF, Vec3};
use cgmath::InnerSpace;
use log::{debug, warn};

use crate::defs::{BrushDef, PlaneDef};
use crate::planes::{plane_from_points, PlaneSet};
use crate::texinfo::TexInfoManager;
use crate::winding::{Winding, CLIP_EPSILON, MAX_WORLD_COORD};

#[derive(Debug, Clone, PartialEq)]
pub struct CompileSide {
    pub plane_num: usize,
    /// None for bevels and the internal sides created by splitting.
    pub tex_info: Option<TexInfoIndex>,
    pub winding: Option<Winding>,
    pub visible: bool,
    pub bevel: bool,
}

/// A convex volume. Fragments produced by CSG and tree building remember
/// which prepared brush they came from through `original`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileBrush {
    pub original: usize,
    pub contents: Contents,
    pub sides: Vec<CompileSide>,
    pub bounds: BoxF,
}

impl CompileBrush {
    pub fn update_bounds(&mut self) {
        let mut bounds = BoxF::empty();
        for side in &self.sides {
            if let Some(w) = &side.winding {
                for p in &w.points {
                    bounds = bounds.union_point(p);
                }
            }
        }
        self.bounds = bounds;
    }

    /// Bounds must exist and stay inside the world.
    pub fn has_valid_bounds(&self) -> bool {
        if self.bounds.is_empty() {
            return false;
        }
        for i in 0..3 {
            if self.bounds.min[i] <= -MAX_WORLD_COORD || self.bounds.max[i] >= MAX_WORLD_COORD {
                return false;
            }
        }
        true
    }

    pub fn volume(&self, plane_set: &PlaneSet) -> f64 {
        let corner = match self
            .sides
            .iter()
            .find_map(|s| s.winding.as_ref().and_then(|w| w.points.first()))
        {
            Some(p) => *p,
            None => return 0.0,
        };

        let mut volume = 0.0;
        for side in &self.sides {
            if let Some(w) = &side.winding {
                let plane = plane_set.get(side.plane_num);
                let d = -(corner.dot(plane.normal) - plane.dist);
                volume += d * w.area();
            }
        }
        volume / 3.0
    }

    pub fn has_plane(&self, plane_num: usize) -> bool {
        self.sides.iter().any(|s| s.plane_num == plane_num)
    }
}

/// Rebuild every side winding by chopping the plane's base winding with the
/// other sides. Sides that vanish stay, without a winding.
pub fn create_brush_windings(brush: &mut CompileBrush, plane_set: &PlaneSet) {
    for i in 0..brush.sides.len() {
        let plane = plane_set.get(brush.sides[i].plane_num);
        let mut w = Some(Winding::base_for_plane(plane.normal, plane.dist));
        for (j, other) in brush.sides.iter().enumerate() {
            if i == j || other.bevel {
                continue;
            }
            let clip = plane_set.get(other.plane_num);
            w = match w {
                Some(w) => w.clip(clip.normal, clip.dist, CLIP_EPSILON, false),
                None => break,
            };
        }
        let side = &mut brush.sides[i];
        side.visible = side.visible && w.is_some();
        side.winding = w;
    }
    brush.update_bounds();
}

/// Add the missing axial planes so every brush has a full bounding box of
/// sides. Bevels never produce faces.
pub fn add_box_bevels(brush: &mut CompileBrush, plane_set: &mut PlaneSet) {
    for axis in 0..3 {
        for &dir in [-1.0f64, 1.0].iter() {
            let exists = brush.sides.iter().any(|s| {
                let normal = plane_set.get(s.plane_num).normal;
                normal[axis] == dir
            });
            if exists {
                continue;
            }

            let mut normal = Vec3::new(0.0, 0.0, 0.0);
            normal[axis] = dir;
            let dist = if dir > 0.0 {
                brush.bounds.max[axis]
            } else {
                -brush.bounds.min[axis]
            };
            if let Some(plane_num) = plane_set.find_or_add(normal, dist) {
                brush.sides.push(CompileSide {
                    plane_num,
                    tex_info: None,
                    winding: None,
                    visible: false,
                    bevel: true,
                });
            }
        }
    }
}

fn side_plane(def: &PlaneDef) -> Option<(Vec3, f64)> {
    match def {
        PlaneDef::Equation { normal, dist } => Some((*normal, *dist)),
        PlaneDef::Points([a, b, c]) => plane_from_points(*a, *b, *c),
    }
}

/// Turn input brushes into compile brushes: planes and texinfos are
/// registered, side windings and bounds computed, bevels added. Brushes that
/// don't enclose a finite volume are dropped.
pub fn prepare_brushes(
    defs: &[BrushDef],
    plane_set: &mut PlaneSet,
    tex_infos: &mut TexInfoManager,
) -> Vec<CompileBrush> {
    let mut brushes = vec![];

    'brushes: for (num, def) in defs.iter().enumerate() {
        let mut sides: Vec<CompileSide> = vec![];
        for side_def in &def.sides {
            let plane_num = match side_plane(&side_def.plane)
                .and_then(|(normal, dist)| plane_set.find_or_add(normal, dist))
            {
                Some(plane_num) => plane_num,
                None => {
                    warn!("Brush {}: side with degenerate plane dropped", num);
                    continue;
                }
            };

            if sides.iter().any(|s| s.plane_num == plane_num) {
                debug!("Brush {}: duplicate plane {} dropped", num, plane_num);
                continue;
            }
            if sides.iter().any(|s| s.plane_num == plane_num ^ 1) {
                warn!("Brush {}: mirrored plane {}, brush dropped", num, plane_num);
                continue 'brushes;
            }

            sides.push(CompileSide {
                plane_num,
                tex_info: Some(tex_infos.find_or_add(&side_def.texture)),
                winding: None,
                visible: true,
                bevel: false,
            });
        }

        let mut brush = CompileBrush {
            original: brushes.len(),
            contents: def.contents,
            sides,
            bounds: BoxF::empty(),
        };
        create_brush_windings(&mut brush, plane_set);

        let real_sides = brush.sides.iter().filter(|s| s.winding.is_some()).count();
        if real_sides < 4 || !brush.has_valid_bounds() {
            warn!(
                "Brush {}: {} usable sides, bounds {:?}, brush dropped",
                num, real_sides, brush.bounds
            );
            continue;
        }

        add_box_bevels(&mut brush, plane_set);
        brushes.push(brush);
    }

    brushes
}
