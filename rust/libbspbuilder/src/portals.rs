use bsp::types::{BoxF, BspError, BspResult, Plane, Vec3};
use cgmath::InnerSpace;
use itertools::Itertools;
use log::{debug, error};

use crate::planes::PlaneSet;
use crate::tree::{BspTree, TreeElement};
use crate::winding::{Side, Winding, CLIP_EPSILON, ON_EPSILON};

/// Extra room between the world bounds and the outside portals.
pub const SIDESPACE: f64 = 8.0;
const MIN_PORTAL_AREA: f64 = 0.1;
const MIN_EDGE_LENGTH: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortalSide {
    /// A tree leaf, by element index.
    Leaf(usize),
    /// The void past the world box.
    Outside,
}

impl PortalSide {
    pub fn leaf(&self) -> Option<usize> {
        match self {
            PortalSide::Leaf(l) => Some(*l),
            PortalSide::Outside => None,
        }
    }
}

/// An opening between two leaves. `sides[0]` is in front of the winding's
/// plane, `sides[1]` behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Portal {
    pub winding: Winding,
    pub plane_num: Option<usize>,
    pub on_node: Option<usize>,
    pub sides: [PortalSide; 2],
}

/// The six outward facing planes of a box.
pub fn box_planes(bounds: &BoxF) -> Vec<Plane> {
    let mut planes = Vec::with_capacity(6);
    for axis in 0..3 {
        let mut normal = Vec3::new(0.0, 0.0, 0.0);
        normal[axis] = 1.0;
        planes.push(Plane::new(normal, bounds.max[axis]));
        planes.push(Plane::new(-normal, -bounds.min[axis]));
    }
    planes
}

fn usable(w: &Winding) -> bool {
    !w.is_tiny() && w.area() > MIN_PORTAL_AREA
}

/// Push a winding down from `start` and return the leaf pieces it breaks
/// into, as (leaf element, fragment).
pub fn clip_portal_to_tree(
    winding: Winding,
    start: usize,
    tree: &BspTree,
    plane_set: &PlaneSet,
) -> Vec<(usize, Winding)> {
    let mut out = vec![];
    let mut stack = vec![(start, winding)];
    while let Some((index, w)) = stack.pop() {
        let node = match &tree.elements[index] {
            TreeElement::Leaf(_) => {
                out.push((index, w));
                continue;
            }
            TreeElement::Node(node) => node,
        };
        let plane = plane_set.get(node.plane_num);
        if w.on_plane_side(plane.normal, plane.dist, ON_EPSILON) == Side::On {
            stack.push((node.children[0], w));
            continue;
        }
        let (front, back) = w.split(plane.normal, plane.dist, ON_EPSILON);
        if let Some(back) = back {
            stack.push((node.children[1], back));
        }
        if let Some(front) = front {
            stack.push((node.children[0], front));
        }
    }
    out
}

/// Keep the part of `w` inside the edges of `bounds`, a coplanar winding.
fn intersect_coplanar(w: &Winding, bounds: &Winding, normal: Vec3) -> Option<Winding> {
    let mut result = w.clone();
    for (p1, p2) in bounds.points.iter().circular_tuple_windows() {
        let edge_normal = (*p2 - *p1).cross(normal);
        let len = edge_normal.magnitude();
        if len <= MIN_EDGE_LENGTH {
            continue;
        }
        let edge_normal = edge_normal / len;
        result = result.clip(edge_normal, p1.dot(edge_normal), CLIP_EPSILON, true)?;
    }
    Some(result)
}

fn headnode_portals(
    tree: &BspTree,
    plane_set: &PlaneSet,
    world: &BoxF,
    portals: &mut Vec<Portal>,
) {
    let planes = box_planes(world);
    for (i, plane) in planes.iter().enumerate() {
        let others = planes
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, p)| p);
        let w = match Winding::base_for_plane(plane.normal, plane.dist).chop_by_planes(others, CLIP_EPSILON) {
            Some(w) => w,
            None => continue,
        };
        for (leaf, piece) in clip_portal_to_tree(w, tree.root, tree, plane_set) {
            if !usable(&piece) {
                continue;
            }
            portals.push(Portal {
                winding: piece,
                plane_num: None,
                on_node: None,
                sides: [PortalSide::Outside, PortalSide::Leaf(leaf)],
            });
        }
    }
}

fn node_portals(
    tree: &BspTree,
    plane_set: &PlaneSet,
    world: &BoxF,
    index: usize,
    portals: &mut Vec<Portal>,
) {
    let node = match tree.node(index) {
        Some(node) => node,
        None => return,
    };
    let plane = plane_set.get(node.plane_num);

    let mut w = match Winding::base_for_plane(plane.normal, plane.dist)
        .chop_by_planes(box_planes(world).iter(), CLIP_EPSILON)
    {
        Some(w) => w,
        None => return,
    };

    // Restrict to this node's cell by walking up the parents
    let mut child = index;
    let mut current = node.parent;
    while let Some(parent_index) = current {
        let parent = match tree.node(parent_index) {
            Some(parent) => parent,
            None => break,
        };
        let p = plane_set.get(parent.plane_num);
        let keep_front = parent.children[0] == child;
        w = match w.clip(p.normal, p.dist, CLIP_EPSILON, keep_front) {
            Some(w) => w,
            None => return,
        };
        child = parent_index;
        current = parent.parent;
    }
    if !usable(&w) {
        return;
    }

    let front = clip_portal_to_tree(w.clone(), node.children[0], tree, plane_set);
    let back = clip_portal_to_tree(w, node.children[1], tree, plane_set);
    for (front_leaf, front_piece) in &front {
        for (back_leaf, back_piece) in &back {
            let piece = match intersect_coplanar(front_piece, back_piece, plane.normal) {
                Some(piece) if usable(&piece) => piece,
                _ => continue,
            };
            portals.push(Portal {
                winding: piece,
                plane_num: Some(node.plane_num),
                on_node: Some(index),
                sides: [PortalSide::Leaf(*front_leaf), PortalSide::Leaf(*back_leaf)],
            });
        }
    }
}

/// Find the openings between neighbouring leaves, plus the ones between
/// leaves and the void around `world`.
pub fn generate_portals(tree: &BspTree, plane_set: &PlaneSet, world: &BoxF) -> BspResult<Vec<Portal>> {
    let world = world.expand(SIDESPACE);
    let mut portals = vec![];

    headnode_portals(tree, plane_set, &world, &mut portals);
    for index in tree.pre_order() {
        node_portals(tree, plane_set, &world, index, &mut portals);
    }

    if let Some(bad) = portals
        .iter()
        .position(|p| p.sides[0] == PortalSide::Outside && p.sides[1] == PortalSide::Outside)
    {
        error!("Portal {} has the void on both sides", bad);
        return Err(BspError::from("Portal with no leaf on either side"));
    }

    debug!("Generated {} portals", portals.len());
    Ok(portals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::tests::{cube, prepare};
    use crate::config::CompilerOptions;
    use crate::tree::build_tree;
    use std::collections::HashSet;

    fn portals_for(origins: &[Vec3]) -> (BspTree, Vec<Portal>) {
        let defs = origins.iter().map(|o| cube(*o, 64.0)).collect::<Vec<_>>();
        let (brushes, plane_set) = prepare(&defs);
        let world = brushes
            .iter()
            .fold(BoxF::empty(), |b, brush| b.union(&brush.bounds))
            .expand(64.0);
        let tree = build_tree(brushes, &plane_set, &HashSet::new(), &CompilerOptions::default());
        let portals = generate_portals(&tree, &plane_set, &world).unwrap();
        (tree, portals)
    }

    #[test]
    fn empty_world_has_only_outside_portals() {
        let tree = build_tree(vec![], &PlaneSet::new(), &HashSet::new(), &CompilerOptions::default());
        let world = BoxF::new(Vec3::new(-64.0, -64.0, -64.0), Vec3::new(64.0, 64.0, 64.0));
        let portals = generate_portals(&tree, &PlaneSet::new(), &world).unwrap();
        assert_eq!(portals.len(), 6);
        for p in &portals {
            assert_eq!(p.sides, [PortalSide::Outside, PortalSide::Leaf(tree.root)]);
            assert!((p.winding.area() - 144.0 * 144.0).abs() < 1.0);
        }
    }

    #[test]
    fn portals_join_distinct_leaves() {
        let (tree, portals) = portals_for(&[Vec3::new(0.0, 0.0, 0.0)]);
        let node_portals = portals.iter().filter(|p| p.on_node.is_some()).collect::<Vec<_>>();
        assert!(!node_portals.is_empty());
        for p in &node_portals {
            let a = p.sides[0].leaf().unwrap();
            let b = p.sides[1].leaf().unwrap();
            assert_ne!(a, b);
            assert!(tree.is_leaf(a) && tree.is_leaf(b));
            assert!(p.winding.area() > MIN_PORTAL_AREA);
        }
        // Each face of the cube separates it from the open leaf in front
        let solid_portals = node_portals
            .iter()
            .filter(|p| {
                p.sides
                    .iter()
                    .any(|s| tree.leaf(s.leaf().unwrap()).unwrap().contents.is_solid())
            })
            .count();
        assert!(solid_portals >= 6);
    }

    #[test]
    fn separated_boxes_share_open_space() {
        let (tree, portals) = portals_for(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(192.0, 0.0, 0.0)]);
        // Some portal joins two open leaves
        assert!(portals.iter().any(|p| {
            p.sides.iter().all(|s| match s.leaf() {
                Some(l) => !tree.leaf(l).unwrap().contents.is_solid(),
                None => false,
            })
        }));
    }

    #[test]
    fn coplanar_intersection_keeps_overlap() {
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let a = crate::faces::tests::quad(0.0, 0.0, 64.0, 64.0);
        let b = crate::faces::tests::quad(32.0, 0.0, 96.0, 64.0);
        let c = intersect_coplanar(&a, &b, normal).unwrap();
        assert!((c.area() - 32.0 * 64.0).abs() < 1e-6);
        let far = crate::faces::tests::quad(128.0, 0.0, 196.0, 64.0);
        assert!(intersect_coplanar(&a, &far, normal).is_none());
    }
}
