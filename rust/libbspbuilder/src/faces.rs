use std::collections::{BTreeMap, HashMap};

use bsp::bsp::TexInfoIndex;
use bsp::contents::Contents;
use bsp::types::Vec3;
use cgmath::InnerSpace;
use itertools::Itertools;
use log::debug;

use crate::brush::CompileBrush;
use crate::planes::PlaneSet;
use crate::tree::{BspTree, TreeElement};
use crate::winding::{Side, Winding, ON_EPSILON};

/// Vertices closer than this are the same point when merging.
const EQUAL_EPSILON: f64 = 0.01;
/// Allowed bend, as a sine, at a merged polygon's corners.
const CONTINUOUS_EPSILON: f64 = 0.005;

#[derive(Debug, Clone, PartialEq)]
pub struct CompileFace {
    pub winding: Winding,
    pub plane_num: usize,
    pub tex_info: TexInfoIndex,
    pub contents: Contents,
    /// Prepared brush this face was cut from.
    pub original: usize,
}

/// Faces attached to tree elements, keyed by element index.
pub type FaceMap = BTreeMap<usize, Vec<CompileFace>>;

/// Cut every visible brush side down the tree and keep the pieces that end
/// up in open space.
pub fn extract_faces(tree: &BspTree, brushes: &[CompileBrush], plane_set: &PlaneSet) -> Vec<CompileFace> {
    let mut faces = vec![];
    let mut dropped = 0;

    for brush in brushes {
        for side in &brush.sides {
            let (winding, tex_info) = match (&side.winding, side.tex_info) {
                (Some(w), Some(t)) if side.visible && !side.bevel => (w, t),
                _ => continue,
            };
            let face_normal = plane_set.get(side.plane_num).normal;

            let mut stack = vec![(tree.root, winding.clone())];
            while let Some((index, w)) = stack.pop() {
                match &tree.elements[index] {
                    TreeElement::Node(node) => {
                        let plane = plane_set.get(node.plane_num);
                        if w.on_plane_side(plane.normal, plane.dist, ON_EPSILON) == Side::On {
                            let child = if face_normal.dot(plane.normal) > 0.0 {
                                node.children[0]
                            } else {
                                node.children[1]
                            };
                            stack.push((child, w));
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
                    TreeElement::Leaf(leaf) => {
                        let hidden = leaf.contents.is_solid()
                            || (!leaf.contents.is_empty() && leaf.contents == brush.contents);
                        if hidden || w.is_tiny() {
                            dropped += 1;
                            continue;
                        }
                        faces.push(CompileFace {
                            winding: w,
                            plane_num: side.plane_num,
                            tex_info,
                            contents: brush.contents,
                            original: brush.original,
                        });
                    }
                }
            }
        }
    }

    debug!("Extracted {} faces, {} fragments hidden", faces.len(), dropped);
    faces
}

fn points_equal(a: &Vec3, b: &Vec3) -> bool {
    (a.x - b.x).abs() < EQUAL_EPSILON
        && (a.y - b.y).abs() < EQUAL_EPSILON
        && (a.z - b.z).abs() < EQUAL_EPSILON
}

fn is_convex(w: &Winding, normal: Vec3) -> bool {
    if w.len() < 3 {
        return false;
    }
    w.points
        .iter()
        .circular_tuple_windows::<(_, _, _)>()
        .all(|(prev, cur, next)| {
            let e1 = *cur - *prev;
            let e2 = *next - *cur;
            if e1.magnitude() < 1e-9 || e2.magnitude() < 1e-9 {
                return false;
            }
            e2.normalize().cross(e1.normalize()).dot(normal) >= -CONTINUOUS_EPSILON
        })
}

/// Join two coplanar polygons that share an edge, as long as the result
/// stays convex.
pub fn try_merge_winding(w1: &Winding, w2: &Winding, normal: Vec3) -> Option<Winding> {
    let n1 = w1.len();
    let n2 = w2.len();
    if n1 < 3 || n2 < 3 {
        return None;
    }

    let (start1, start2) = (0..n1)
        .cartesian_product(0..n2)
        .find(|&(i, j)| {
            let p1 = &w1.points[i];
            let p2 = &w1.points[(i + 1) % n1];
            let p3 = &w2.points[j];
            let p4 = &w2.points[(j + 1) % n2];
            points_equal(p1, p4) && points_equal(p2, p3)
        })?;

    let mut points = Vec::with_capacity(n1 + n2 - 2);
    for k in 0..n1 {
        points.push(w1.points[(start1 + 1 + k) % n1]);
    }
    for k in 0..n2 - 2 {
        points.push(w2.points[(start2 + 2 + k) % n2]);
    }

    let merged = Winding::new(points).remove_colinear_points();
    if is_convex(&merged, normal) {
        Some(merged)
    } else {
        None
    }
}

/// Merge faces sharing plane, texture and contents into larger convex
/// polygons. Groups keep the order their first face appeared in.
pub fn merge_coplanar_faces(faces: Vec<CompileFace>, plane_set: &PlaneSet) -> Vec<CompileFace> {
    let before = faces.len();
    let mut groups: Vec<Vec<CompileFace>> = vec![];
    let mut lookup: HashMap<(usize, TexInfoIndex, u32), usize> = HashMap::new();
    for face in faces {
        let key = (face.plane_num, face.tex_info, face.contents.bits());
        let group = *lookup.entry(key).or_insert_with(|| {
            groups.push(vec![]);
            groups.len() - 1
        });
        groups[group].push(face);
    }

    let mut merged = vec![];
    for mut group in groups {
        'restart: loop {
            for i in 0..group.len() {
                for j in i + 1..group.len() {
                    let normal = plane_set.get(group[i].plane_num).normal;
                    if let Some(w) = try_merge_winding(&group[i].winding, &group[j].winding, normal) {
                        group[i].winding = w;
                        group.remove(j);
                        continue 'restart;
                    }
                }
            }
            break;
        }
        merged.extend(group);
    }

    debug!("Merged {} faces into {}", before, merged.len());
    merged
}

/// Hang faces on the node whose plane they lie on, or on the leaf they fall
/// into. Faces crossing a node plane are cut.
pub fn assign_faces_to_nodes(faces: Vec<CompileFace>, tree: &BspTree, plane_set: &PlaneSet) -> FaceMap {
    let mut map = FaceMap::new();
    for face in faces {
        let mut stack = vec![(tree.root, face)];
        while let Some((index, face)) = stack.pop() {
            let node = match &tree.elements[index] {
                TreeElement::Node(node) => node,
                TreeElement::Leaf(_) => {
                    map.entry(index).or_insert_with(Vec::new).push(face);
                    continue;
                }
            };
            let plane = plane_set.get(node.plane_num);
            match face.winding.on_plane_side(plane.normal, plane.dist, ON_EPSILON) {
                Side::On => map.entry(index).or_insert_with(Vec::new).push(face),
                Side::Front => stack.push((node.children[0], face)),
                Side::Back => stack.push((node.children[1], face)),
                Side::Cross => {
                    let (front, back) = face.winding.split(plane.normal, plane.dist, ON_EPSILON);
                    if let Some(w) = back {
                        stack.push((
                            node.children[1],
                            CompileFace {
                                winding: w,
                                ..face.clone()
                            },
                        ));
                    }
                    if let Some(w) = front {
                        stack.push((node.children[0], CompileFace { winding: w, ..face }));
                    }
                }
            }
        }
    }
    map
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::brush::tests::{cube, prepare};
    use crate::config::CompilerOptions;
    use crate::defs::BrushDef;
    use crate::tree::build_tree;
    use crate::winding::tests::approx_eq;
    use std::collections::HashSet;

    // Clockwise from above
    pub fn quad(x0: f64, y0: f64, x1: f64, y1: f64) -> Winding {
        Winding::new(vec![
            Vec3::new(x1, y1, 0.0),
            Vec3::new(x1, y0, 0.0),
            Vec3::new(x0, y0, 0.0),
            Vec3::new(x0, y1, 0.0),
        ])
    }

    pub fn face(winding: Winding, plane_num: usize) -> CompileFace {
        CompileFace {
            winding,
            plane_num,
            tex_info: TexInfoIndex::new(0),
            contents: Contents::SOLID,
            original: 0,
        }
    }

    fn up() -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }

    #[test]
    fn adjacent_squares_merge() {
        let merged = try_merge_winding(&quad(0.0, 0.0, 1.0, 1.0), &quad(1.0, 0.0, 2.0, 1.0), up()).unwrap();
        assert_eq!(merged.len(), 4);
        assert!(approx_eq(merged.area(), 2.0));
    }

    #[test]
    fn t_junction_does_not_merge() {
        let rect = quad(0.0, 0.0, 2.0, 1.0);
        let square = quad(0.0, 1.0, 1.0, 2.0);
        assert!(try_merge_winding(&rect, &square, up()).is_none());
    }

    #[test]
    fn concave_result_is_rejected() {
        let square = quad(0.0, 0.0, 1.0, 1.0);
        let spike = Winding::new(vec![
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(2.0, 1.5, 0.0),
        ]);
        assert!(try_merge_winding(&square, &spike, up()).is_none());

        let rect = quad(0.0, 0.0, 2.0, 1.0);
        let roof = Winding::new(vec![
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
        ]);
        let merged = try_merge_winding(&rect, &roof, up()).unwrap();
        assert_eq!(merged.len(), 4);
        assert!(approx_eq(merged.area(), 4.0));
    }

    #[test]
    fn grid_merges_to_one_face() {
        let mut plane_set = PlaneSet::new();
        let plane = plane_set.find_or_add(up(), 0.0).unwrap();
        let faces = vec![
            face(quad(0.0, 0.0, 1.0, 1.0), plane),
            face(quad(1.0, 0.0, 2.0, 1.0), plane),
            face(quad(0.0, 1.0, 1.0, 2.0), plane),
            face(quad(1.0, 1.0, 2.0, 2.0), plane),
        ];
        let merged = merge_coplanar_faces(faces, &plane_set);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].winding.len(), 4);
        assert!(approx_eq(merged[0].winding.area(), 4.0));
    }

    #[test]
    fn different_textures_stay_apart() {
        let mut plane_set = PlaneSet::new();
        let plane = plane_set.find_or_add(up(), 0.0).unwrap();
        let mut other = face(quad(1.0, 0.0, 2.0, 1.0), plane);
        other.tex_info = TexInfoIndex::new(1);
        let merged = merge_coplanar_faces(vec![face(quad(0.0, 0.0, 1.0, 1.0), plane), other], &plane_set);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].tex_info, TexInfoIndex::new(1));
    }

    fn cube_tree(defs: &[BrushDef]) -> (BspTree, Vec<CompileBrush>, PlaneSet) {
        let (brushes, plane_set) = prepare(defs);
        let tree = build_tree(brushes.clone(), &plane_set, &HashSet::new(), &CompilerOptions::default());
        (tree, brushes, plane_set)
    }

    #[test]
    fn cube_faces_survive() {
        let (tree, brushes, plane_set) = cube_tree(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)]);
        let faces = extract_faces(&tree, &brushes, &plane_set);
        assert_eq!(faces.len(), 6);
        let area: f64 = faces.iter().map(|f| f.winding.area()).sum();
        assert!(approx_eq(area, 6.0 * 64.0 * 64.0));
    }

    #[test]
    fn touching_faces_are_hidden() {
        let (tree, brushes, plane_set) = cube_tree(&[
            cube(Vec3::new(0.0, 0.0, 0.0), 64.0),
            cube(Vec3::new(64.0, 0.0, 0.0), 64.0),
        ]);
        let faces = extract_faces(&tree, &brushes, &plane_set);
        // Nothing at x = 32 is visible
        assert!(faces
            .iter()
            .all(|f| !f.winding.points.iter().all(|p| approx_eq(p.x, 32.0))));
        let area: f64 = faces.iter().map(|f| f.winding.area()).sum();
        assert!(approx_eq(area, 2.0 * 128.0 * 64.0 * 2.0 + 2.0 * 64.0 * 64.0));
    }

    #[test]
    fn faces_hang_on_their_planes() {
        let (tree, brushes, plane_set) = cube_tree(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)]);
        let faces = extract_faces(&tree, &brushes, &plane_set);
        let map = assign_faces_to_nodes(faces, &tree, &plane_set);
        let total: usize = map.values().map(|v| v.len()).sum();
        assert_eq!(total, 6);
        for (index, faces) in &map {
            let node = tree.node(*index).unwrap();
            for f in faces {
                assert_eq!(f.plane_num >> 1, node.plane_num >> 1);
            }
        }
    }
}
