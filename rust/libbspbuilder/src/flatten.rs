use bsp::bsp::{BrushIndex, BspLeaf, BspNode, FaceIndex, LeafBrushIndex, LeafFaceIndex, PlaneIndex};
use bsp::contents::Contents;
use bsp::types::BoxF;
use itertools::Itertools;
use log::debug;

use crate::faces::{CompileFace, FaceMap};
use crate::tree::{BspTree, TreeElement};

/// The tree laid out as output arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTree {
    pub nodes: Vec<BspNode>,
    pub leafs: Vec<BspLeaf>,
    pub leaf_faces: Vec<FaceIndex>,
    pub leaf_brushes: Vec<BrushIndex>,
    /// Faces in output order. Each node's faces are contiguous.
    pub faces: Vec<CompileFace>,
    /// Cluster of each tree element, -1 for nodes and solid leaves.
    pub element_clusters: Vec<i32>,
    /// Output leaf index of each tree element.
    pub element_leafs: Vec<Option<usize>>,
    pub num_clusters: usize,
}

/// Whole units enclosing the box, or zeros for an empty one.
pub fn int_bounds(bounds: &BoxF) -> ([i32; 3], [i32; 3]) {
    if bounds.is_empty() {
        return ([0; 3], [0; 3]);
    }
    let clamp = |v: f64| v.max(i32::MIN as f64).min(i32::MAX as f64) as i32;
    (
        [
            clamp(bounds.min.x.floor()),
            clamp(bounds.min.y.floor()),
            clamp(bounds.min.z.floor()),
        ],
        [
            clamp(bounds.max.x.ceil()),
            clamp(bounds.max.y.ceil()),
            clamp(bounds.max.z.ceil()),
        ],
    )
}

/// Child reference as stored in a node: node index, or -(leaf + 1).
pub fn leaf_child(leaf: usize) -> i32 {
    -(leaf as i32 + 1)
}

/// Walk the tree in pre-order, front first, numbering nodes and leaves and
/// giving every non-solid leaf its own cluster.
pub fn flatten_tree(tree: &BspTree, face_map: &FaceMap) -> FlatTree {
    let mut flat = FlatTree {
        nodes: vec![],
        leafs: vec![],
        leaf_faces: vec![],
        leaf_brushes: vec![],
        faces: vec![],
        element_clusters: vec![-1; tree.elements.len()],
        element_leafs: vec![None; tree.elements.len()],
        num_clusters: 0,
    };

    // (element, parent node, child slot)
    let mut stack: Vec<(usize, Option<(usize, usize)>)> = vec![(tree.root, None)];
    while let Some((index, parent)) = stack.pop() {
        let attached = face_map.get(&index).map(|v| v.as_slice()).unwrap_or(&[]);

        let child_ref = match &tree.elements[index] {
            TreeElement::Node(node) => {
                let node_index = flat.nodes.len();
                let (mins, maxs) = int_bounds(&node.bounds);
                flat.nodes.push(BspNode {
                    plane_num: PlaneIndex::new(node.plane_num as u32),
                    children: [0, 0],
                    mins,
                    maxs,
                    first_face: FaceIndex::new(flat.faces.len() as u32),
                    num_faces: attached.len() as u32,
                });
                flat.faces.extend(attached.iter().cloned());

                stack.push((node.children[1], Some((node_index, 1))));
                stack.push((node.children[0], Some((node_index, 0))));
                node_index as i32
            }
            TreeElement::Leaf(leaf) => {
                let leaf_index = flat.leafs.len();
                let cluster = if leaf.contents.contains(Contents::SOLID) {
                    -1
                } else {
                    flat.num_clusters += 1;
                    flat.num_clusters as i32 - 1
                };

                let first_leaf_face = flat.leaf_faces.len();
                for face in attached {
                    flat.leaf_faces.push(FaceIndex::new(flat.faces.len() as u32));
                    flat.faces.push(face.clone());
                }

                let first_leaf_brush = flat.leaf_brushes.len();
                flat.leaf_brushes.extend(
                    leaf.brushes
                        .iter()
                        .map(|b| b.original)
                        .unique()
                        .map(|b| BrushIndex::new(b as u32)),
                );

                let (mins, maxs) = int_bounds(&leaf.bounds);
                flat.leafs.push(BspLeaf {
                    contents: leaf.contents,
                    cluster,
                    area: 0,
                    mins,
                    maxs,
                    first_leaf_face: LeafFaceIndex::new(first_leaf_face as u32),
                    num_leaf_faces: (flat.leaf_faces.len() - first_leaf_face) as u32,
                    first_leaf_brush: LeafBrushIndex::new(first_leaf_brush as u32),
                    num_leaf_brushes: (flat.leaf_brushes.len() - first_leaf_brush) as u32,
                });
                flat.element_clusters[index] = cluster;
                flat.element_leafs[index] = Some(leaf_index);
                leaf_child(leaf_index)
            }
        };

        if let Some((node_index, slot)) = parent {
            flat.nodes[node_index].children[slot] = child_ref;
        }
    }

    debug!(
        "Flattened {} nodes, {} leafs, {} clusters",
        flat.nodes.len(),
        flat.leafs.len(),
        flat.num_clusters
    );
    flat
}
