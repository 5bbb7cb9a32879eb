use std::collections::HashSet;

use bsp::contents::Contents;
use bsp::types::BoxF;
use log::{debug, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::brush::CompileBrush;
use crate::config::{CompilerOptions, SplitMethod};
use crate::csg::{combine_contents, split_brush};
use crate::planes::PlaneSet;
use crate::winding::ON_EPSILON;

pub const MAX_TREE_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub plane_num: usize,
    /// Front, back.
    pub children: [usize; 2],
    pub bounds: BoxF,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeLeaf {
    pub contents: Contents,
    pub brushes: Vec<CompileBrush>,
    pub bounds: BoxF,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeElement {
    Node(TreeNode),
    Leaf(TreeLeaf),
}

/// Nodes and leaves live in one arena and refer to each other by index.
#[derive(Debug, Clone, PartialEq)]
pub struct BspTree {
    pub elements: Vec<TreeElement>,
    pub root: usize,
}

impl BspTree {
    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        match &self.elements[index] {
            TreeElement::Node(n) => Some(n),
            TreeElement::Leaf(_) => None,
        }
    }

    pub fn leaf(&self, index: usize) -> Option<&TreeLeaf> {
        match &self.elements[index] {
            TreeElement::Leaf(l) => Some(l),
            TreeElement::Node(_) => None,
        }
    }

    pub fn is_leaf(&self, index: usize) -> bool {
        self.leaf(index).is_some()
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        match &self.elements[index] {
            TreeElement::Node(n) => n.parent,
            TreeElement::Leaf(l) => l.parent,
        }
    }

    /// Elements in pre-order, front child before back child.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.elements.len());
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            order.push(index);
            if let TreeElement::Node(n) = &self.elements[index] {
                stack.push(n.children[1]);
                stack.push(n.children[0]);
            }
        }
        order
    }

    pub fn node_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, TreeElement::Node(_)))
            .count()
    }

    pub fn leaf_count(&self) -> usize {
        self.elements.len() - self.node_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushSide {
    Front,
    Back,
    On,
    Both,
}

/// Where a brush lies relative to a plane, judged by its side windings.
pub fn classify_brush(brush: &CompileBrush, plane_num: usize, plane_set: &PlaneSet) -> BrushSide {
    let plane = plane_set.get(plane_num);
    let mut front = false;
    let mut back = false;
    for side in &brush.sides {
        if let Some(w) = &side.winding {
            for p in &w.points {
                let d = plane.distance_to(p);
                if d > ON_EPSILON {
                    front = true;
                } else if d < -ON_EPSILON {
                    back = true;
                }
            }
        }
    }
    match (front, back) {
        (true, true) => BrushSide::Both,
        (true, false) => BrushSide::Front,
        (false, true) => BrushSide::Back,
        (false, false) => BrushSide::On,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCandidate {
    pub plane_num: usize,
    pub score: i64,
    pub front: usize,
    pub back: usize,
    pub splits: usize,
}

fn rate_plane(brushes: &[CompileBrush], plane_num: usize, plane_set: &PlaneSet) -> SplitCandidate {
    let mut front = 0;
    let mut back = 0;
    let mut splits = 0;
    for brush in brushes {
        match classify_brush(brush, plane_num, plane_set) {
            BrushSide::Front | BrushSide::On => front += 1,
            BrushSide::Back => back += 1,
            BrushSide::Both => {
                splits += 1;
                front += 1;
                back += 1;
            }
        }
    }

    let mut score = -(splits as i64 * 4) - (front as i64 - back as i64).abs();
    if plane_set.get(plane_num).is_axial() {
        score += 5;
    }
    SplitCandidate {
        plane_num,
        score,
        front,
        back,
        splits,
    }
}

/// Pick the best unused plane from the brushes' visible faces, or None when
/// every plane has been used.
pub fn select_split_plane(
    brushes: &[CompileBrush],
    plane_set: &PlaneSet,
    used_planes: &HashSet<usize>,
    options: &CompilerOptions,
) -> Option<SplitCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = vec![];
    for brush in brushes {
        for side in &brush.sides {
            if side.bevel || side.winding.is_none() || used_planes.contains(&side.plane_num) {
                continue;
            }
            // A plane and its flip partition the same way
            if seen.insert(side.plane_num >> 1) {
                candidates.push(side.plane_num);
            }
        }
    }

    if options.split_method == SplitMethod::Fast && candidates.len() > options.max_split_candidates {
        let mut rng = StdRng::seed_from_u64(42);
        candidates = candidates
            .choose_multiple(&mut rng, options.max_split_candidates)
            .cloned()
            .collect();
    }

    let mut best: Option<SplitCandidate> = None;
    for plane_num in candidates {
        let rating = rate_plane(brushes, plane_num, plane_set);
        if best.map_or(true, |b| rating.score > b.score) {
            best = Some(rating);
        }
    }
    best
}

/// Sort brushes to the two sides of a plane, cutting the ones that span it.
/// Brushes lying on the plane go to the front.
pub fn partition_brushes(
    brushes: Vec<CompileBrush>,
    plane_num: usize,
    plane_set: &PlaneSet,
) -> (Vec<CompileBrush>, Vec<CompileBrush>) {
    let mut front = vec![];
    let mut back = vec![];
    for brush in brushes {
        match classify_brush(&brush, plane_num, plane_set) {
            BrushSide::Front | BrushSide::On => front.push(brush),
            BrushSide::Back => back.push(brush),
            BrushSide::Both => {
                let (f, b) = split_brush(&brush, plane_num, plane_set);
                front.extend(f);
                back.extend(b);
            }
        }
    }
    (front, back)
}

fn brush_bounds(brushes: &[CompileBrush]) -> BoxF {
    brushes
        .iter()
        .fold(BoxF::empty(), |b, brush| b.union(&brush.bounds))
}

fn make_leaf(brushes: Vec<CompileBrush>, parent: Option<usize>, parent_bounds: BoxF) -> TreeLeaf {
    let contents = brushes
        .iter()
        .fold(Contents::empty(), |c, b| combine_contents(c, b.contents));
    let bounds = if brushes.is_empty() {
        parent_bounds
    } else {
        brush_bounds(&brushes)
    };
    TreeLeaf {
        contents,
        brushes,
        bounds,
        parent,
    }
}

struct BuildItem {
    slot: usize,
    parent: Option<usize>,
    parent_bounds: BoxF,
    brushes: Vec<CompileBrush>,
    used_planes: HashSet<usize>,
    depth: usize,
}

/// Build the tree by recursive partitioning, driven by an explicit work
/// stack so deep trees can't overflow the call stack.
pub fn build_tree(
    brushes: Vec<CompileBrush>,
    plane_set: &PlaneSet,
    used_planes: &HashSet<usize>,
    options: &CompilerOptions,
) -> BspTree {
    let placeholder = || {
        TreeElement::Leaf(TreeLeaf {
            contents: Contents::empty(),
            brushes: vec![],
            bounds: BoxF::empty(),
            parent: None,
        })
    };

    let mut elements = vec![placeholder()];
    let mut stack = vec![BuildItem {
        slot: 0,
        parent: None,
        parent_bounds: BoxF::empty(),
        brushes,
        used_planes: used_planes.clone(),
        depth: 0,
    }];

    while let Some(item) = stack.pop() {
        let split = if item.depth >= MAX_TREE_DEPTH {
            warn!("Tree depth limit reached with {} brushes", item.brushes.len());
            None
        } else {
            select_split_plane(&item.brushes, plane_set, &item.used_planes, options)
        };

        let split = match split {
            Some(split) => split,
            None => {
                elements[item.slot] = TreeElement::Leaf(make_leaf(
                    item.brushes,
                    item.parent,
                    item.parent_bounds,
                ));
                continue;
            }
        };

        let bounds = brush_bounds(&item.brushes);
        let (front, back) = partition_brushes(item.brushes, split.plane_num, plane_set);

        let mut used = item.used_planes;
        used.insert(split.plane_num);
        used.insert(split.plane_num ^ 1);

        let front_slot = elements.len();
        let back_slot = front_slot + 1;
        elements.push(placeholder());
        elements.push(placeholder());
        elements[item.slot] = TreeElement::Node(TreeNode {
            plane_num: split.plane_num,
            children: [front_slot, back_slot],
            bounds,
            parent: item.parent,
        });

        stack.push(BuildItem {
            slot: back_slot,
            parent: Some(item.slot),
            parent_bounds: bounds,
            brushes: back,
            used_planes: used.clone(),
            depth: item.depth + 1,
        });
        stack.push(BuildItem {
            slot: front_slot,
            parent: Some(item.slot),
            parent_bounds: bounds,
            brushes: front,
            used_planes: used,
            depth: item.depth + 1,
        });
    }

    let tree = BspTree { elements, root: 0 };
    debug!(
        "Tree: {} nodes, {} leaves",
        tree.node_count(),
        tree.leaf_count()
    );
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::tests::{cube, prepare};
    use bsp::types::Vec3;

    fn build(brushes: Vec<CompileBrush>, plane_set: &PlaneSet) -> BspTree {
        build_tree(brushes, plane_set, &HashSet::new(), &CompilerOptions::default())
    }

    #[test]
    fn empty_input_is_one_empty_leaf() {
        let tree = build(vec![], &PlaneSet::new());
        assert_eq!(tree.elements.len(), 1);
        let leaf = tree.leaf(tree.root).unwrap();
        assert!(leaf.contents.is_empty());
        assert!(leaf.brushes.is_empty());
    }

    #[test]
    fn single_box_is_enclosed() {
        let (brushes, plane_set) = prepare(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)]);
        let tree = build(brushes, &plane_set);
        assert_eq!(tree.node_count(), 6);
        assert_eq!(tree.leaf_count(), 7);

        let solid = tree
            .elements
            .iter()
            .filter_map(|e| match e {
                TreeElement::Leaf(l) if l.contents.is_solid() => Some(l),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(solid.len(), 1);
        assert_eq!(solid[0].bounds.min, Vec3::new(-32.0, -32.0, -32.0));

        // Every node plane is used once along any path
        for index in tree.pre_order() {
            let mut planes = HashSet::new();
            let mut cur = tree.parent(index);
            while let Some(p) = cur {
                let plane = tree.node(p).unwrap().plane_num >> 1;
                assert!(planes.insert(plane));
                cur = tree.parent(p);
            }
        }
    }

    #[test]
    fn axial_balanced_plane_wins() {
        let (brushes, plane_set) = prepare(&[
            cube(Vec3::new(-64.0, 0.0, 0.0), 32.0),
            cube(Vec3::new(64.0, 0.0, 0.0), 32.0),
        ]);
        let best = select_split_plane(&brushes, &plane_set, &HashSet::new(), &CompilerOptions::default())
            .unwrap();
        assert_eq!(best.splits, 0);
        assert_eq!(best.front, 1);
        assert_eq!(best.back, 1);
        assert_eq!(best.score, 5);
        assert!(plane_set.get(best.plane_num).normal.x.abs() == 1.0);
    }

    #[test]
    fn used_planes_are_skipped() {
        let (brushes, plane_set) = prepare(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)]);
        let used = (0..plane_set.len()).collect::<HashSet<_>>();
        assert!(select_split_plane(&brushes, &plane_set, &used, &CompilerOptions::default()).is_none());
    }

    #[test]
    fn fast_split_is_deterministic() {
        let defs = (0..12)
            .map(|i| cube(Vec3::new(i as f64 * 48.0, (i % 3) as f64 * 40.0, 0.0), 32.0))
            .collect::<Vec<_>>();
        let (brushes, plane_set) = prepare(&defs);
        let options = CompilerOptions {
            split_method: SplitMethod::Fast,
            max_split_candidates: 4,
            ..CompilerOptions::default()
        };
        let a = build_tree(brushes.clone(), &plane_set, &HashSet::new(), &options);
        let b = build_tree(brushes, &plane_set, &HashSet::new(), &options);
        assert_eq!(a, b);
        let solid = a
            .elements
            .iter()
            .filter(|e| matches!(e, TreeElement::Leaf(l) if l.contents.is_solid()))
            .count();
        assert!(solid >= 12);
    }

    #[test]
    fn spanning_brush_is_split() {
        let (brushes, mut plane_set) = prepare(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)]);
        let plane = plane_set.find_or_add(Vec3::new(0.0, 1.0, 0.0), 0.0).unwrap();
        let (front, back) = partition_brushes(brushes, plane, &plane_set);
        assert_eq!(front.len(), 1);
        assert_eq!(back.len(), 1);
        assert_eq!(front[0].bounds.min.y, 0.0);
        assert_eq!(back[0].bounds.max.y, 0.0);
    }
}
