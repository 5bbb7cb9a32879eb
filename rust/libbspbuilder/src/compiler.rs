use std::collections::HashSet;

use bsp::bsp::{
    BrushSideIndex, BspBrush, BspBrushSide, BspData, BspFace, BspModel, BspPlane, Entities, FaceIndex,
    PlaneIndex, SurfEdgeIndex,
};
use bsp::types::{to_point3f, BoxF, BspResult, Point3F, Vec3};
use log::{debug, info, warn};

use crate::brush::{prepare_brushes, CompileBrush};
use crate::config::CompilerOptions;
use crate::csg::process_csg;
use crate::defs::{BrushDef, EntityDef};
use crate::edges::{build_edges_reserved, EdgeData};
use crate::entities::serialize_entities;
use crate::faces::{assign_faces_to_nodes, extract_faces, merge_coplanar_faces};
use crate::flatten::{flatten_tree, int_bounds, FlatTree};
use crate::planes::PlaneSet;
use crate::portals::generate_portals;
use crate::texinfo::TexInfoManager;
use crate::tree::build_tree;
use crate::vis::{compute_visibility, generate_trivial_vis};

pub trait ProgressEventListener {
    fn progress(&mut self, current: u32, total: u32, status: String, finish_status: String);
}

/// Listener for callers that don't care.
pub struct NullProgressListener;

impl ProgressEventListener for NullProgressListener {
    fn progress(&mut self, _current: u32, _total: u32, _status: String, _finish_status: String) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub planes: usize,
    pub nodes: usize,
    pub leafs: usize,
    pub faces: usize,
    pub brushes: usize,
    pub edges: usize,
    pub vertices: usize,
    pub portals: usize,
    pub clusters: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    pub bsp: BspData,
    pub stats: CompileStats,
}

const STAGES: u32 = 12;

/// Runs the whole pipeline. Each compile starts from empty plane and texinfo
/// tables, so a compiler can be reused.
pub struct BspCompiler {
    options: CompilerOptions,
}

impl BspCompiler {
    pub fn new(options: CompilerOptions) -> BspCompiler {
        BspCompiler { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn compile(&self, brushes: &[BrushDef], entities: &[EntityDef]) -> BspResult<CompileResult> {
        self.compile_with_progress(brushes, entities, &mut NullProgressListener)
    }

    fn stage(&self, listener: &mut dyn ProgressEventListener, current: u32, status: &str, finish_status: &str) {
        if self.options.verbose {
            info!("{}", status);
        }
        listener.progress(current, STAGES, status.to_string(), finish_status.to_string());
    }

    pub fn compile_with_progress(
        &self,
        brush_defs: &[BrushDef],
        entities: &[EntityDef],
        listener: &mut dyn ProgressEventListener,
    ) -> BspResult<CompileResult> {
        let mut plane_set = PlaneSet::new();
        let mut tex_infos = TexInfoManager::new();

        self.stage(listener, 1, "Preparing brushes", "Prepared brushes");
        let brushes = prepare_brushes(brush_defs, &mut plane_set, &mut tex_infos);
        if brushes.len() < brush_defs.len() {
            warn!("{} of {} brushes were unusable", brush_defs.len() - brushes.len(), brush_defs.len());
        }

        self.stage(listener, 2, "Processing CSG", "Processed CSG");
        let fragments = process_csg(brushes.clone(), &plane_set, self.options.preserve_detail);

        self.stage(listener, 3, "Building BSP tree", "Built BSP tree");
        let tree = build_tree(fragments.clone(), &plane_set, &HashSet::new(), &self.options);

        self.stage(listener, 4, "Extracting faces", "Extracted faces");
        let mut faces = extract_faces(&tree, &fragments, &plane_set);

        self.stage(listener, 5, "Merging faces", "Merged faces");
        if self.options.merge_faces {
            faces = merge_coplanar_faces(faces, &plane_set);
        }

        self.stage(listener, 6, "Assigning faces", "Assigned faces");
        let face_map = assign_faces_to_nodes(faces, &tree, &plane_set);

        self.stage(listener, 7, "Flattening tree", "Flattened tree");
        let flat = flatten_tree(&tree, &face_map);

        self.stage(listener, 8, "Building edges", "Built edges");
        let edge_data = build_edges_reserved(&flat.faces)?;

        self.stage(listener, 9, "Generating portals", "Generated portals");
        let world = world_bounds(&brushes, self.options.world_margin);
        let portals = generate_portals(&tree, &plane_set, &world)?;

        self.stage(listener, 10, "Computing visibility", "Computed visibility");
        let visibility = if self.options.no_vis {
            generate_trivial_vis(flat.num_clusters)
        } else {
            compute_visibility(&portals, &flat.element_clusters, flat.num_clusters)
        };

        self.stage(listener, 11, "Writing entities", "Wrote entities");
        let entities = Entities {
            raw: serialize_entities(entities),
        };

        self.stage(listener, 12, "Assembling BSP", "Assembled BSP");
        let mut bsp = BspData::new();
        bsp.entities = entities;
        bsp.planes = plane_set
            .planes()
            .iter()
            .map(|p| BspPlane {
                normal: to_point3f(&p.normal),
                dist: p.dist as f32,
                plane_type: p.plane_type,
            })
            .collect();
        bsp.tex_infos = tex_infos.into_tex_infos();
        bsp.visibility = visibility;
        write_geometry(&mut bsp, flat, edge_data);
        write_brushes(&mut bsp, &brushes);

        let stats = CompileStats {
            planes: bsp.planes.len(),
            nodes: bsp.nodes.len(),
            leafs: bsp.leafs.len(),
            faces: bsp.faces.len(),
            brushes: bsp.brushes.len(),
            edges: bsp.edges.len(),
            vertices: bsp.vertices.len(),
            portals: portals.len(),
            clusters: bsp.visibility.num_clusters as usize,
        };
        if self.options.verbose {
            info!("Compiled: {:?}", stats);
        } else {
            debug!("Compiled: {:?}", stats);
        }

        Ok(CompileResult { bsp, stats })
    }
}

/// Brush bounds plus a margin, or a margin sized box at the origin when
/// there is no geometry.
pub fn world_bounds(brushes: &[CompileBrush], margin: f64) -> BoxF {
    let bounds = brushes
        .iter()
        .fold(BoxF::empty(), |b, brush| b.union(&brush.bounds));
    if bounds.is_empty() {
        let origin = Vec3::new(0.0, 0.0, 0.0);
        return BoxF::new(origin, origin).expand(margin);
    }
    bounds.expand(margin)
}

fn write_geometry(bsp: &mut BspData, flat: FlatTree, edge_data: EdgeData) {
    bsp.faces = flat
        .faces
        .iter()
        .zip(&edge_data.face_ranges)
        .map(|(face, &(first, count))| BspFace {
            plane_num: PlaneIndex::new((face.plane_num & !1) as u32),
            side: (face.plane_num & 1) as u32,
            first_edge: SurfEdgeIndex::new(first),
            num_edges: count,
            tex_info: face.tex_info,
            styles: [0, 255, 255, 255],
            light_offset: -1,
        })
        .collect();
    bsp.vertices = edge_data.vertices.iter().map(to_point3f).collect();
    bsp.edges = edge_data.edges;
    bsp.surf_edges = edge_data.surf_edges;

    let (mins, maxs) = match flat.nodes.first() {
        Some(root) => (root.mins, root.maxs),
        None => flat
            .leafs
            .first()
            .map(|l| (l.mins, l.maxs))
            .unwrap_or(([0; 3], [0; 3])),
    };
    let to_point = |v: [i32; 3]| Point3F::new(v[0] as f32, v[1] as f32, v[2] as f32);
    bsp.models = vec![BspModel {
        mins: to_point(mins),
        maxs: to_point(maxs),
        origin: Point3F::new(0.0, 0.0, 0.0),
        head_node: if flat.nodes.is_empty() { -1 } else { 0 },
        first_face: FaceIndex::new(0),
        num_faces: bsp.faces.len() as u32,
    }];

    bsp.nodes = flat.nodes;
    bsp.leafs = flat.leafs;
    bsp.leaf_faces = flat.leaf_faces;
    bsp.leaf_brushes = flat.leaf_brushes;
    bsp.light_maps = vec![];
}

fn write_brushes(bsp: &mut BspData, brushes: &[CompileBrush]) {
    for brush in brushes {
        let first_side = bsp.brush_sides.len();
        bsp.brush_sides.extend(brush.sides.iter().map(|side| BspBrushSide {
            plane_num: PlaneIndex::new(side.plane_num as u32),
            tex_info: side.tex_info.map_or(-1, |t| t.into_inner() as i32),
        }));
        bsp.brushes.push(BspBrush {
            first_side: BrushSideIndex::new(first_side as u32),
            num_sides: brush.sides.len() as u32,
            contents: brush.contents,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::tests::cube;

    struct Recorder(Vec<(u32, u32, String)>);

    impl ProgressEventListener for Recorder {
        fn progress(&mut self, current: u32, total: u32, status: String, _finish_status: String) {
            self.0.push((current, total, status));
        }
    }

    #[test]
    fn stages_are_reported_in_order() {
        let compiler = BspCompiler::new(CompilerOptions::default());
        let mut recorder = Recorder(vec![]);
        compiler
            .compile_with_progress(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)], &[], &mut recorder)
            .unwrap();
        assert_eq!(recorder.0.len(), STAGES as usize);
        assert!(recorder.0.iter().enumerate().all(|(i, r)| r.0 == i as u32 + 1 && r.1 == STAGES));
        assert_eq!(recorder.0[2].2, "Building BSP tree");
    }

    #[test]
    fn face_planes_are_even_with_side_flag() {
        let compiler = BspCompiler::new(CompilerOptions::default());
        let result = compiler.compile(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)], &[]).unwrap();
        let bsp = &result.bsp;
        assert_eq!(bsp.faces.len(), 6);
        let flipped = bsp.faces.iter().filter(|f| f.side == 1).count();
        assert_eq!(flipped, 3);
        for f in &bsp.faces {
            assert_eq!(f.plane_num.into_inner() % 2, 0);
            assert_eq!(f.num_edges, 4);
            assert_eq!(f.light_offset, -1);
        }
        // Bevel-free box: six sides, all textured
        assert_eq!(bsp.brush_sides.len(), 6);
        assert!(bsp.brush_sides.iter().all(|s| s.tex_info == 0));
        assert_eq!(bsp.models[0].mins, Point3F::new(-32.0, -32.0, -32.0));
    }

    #[test]
    fn no_vis_marks_everything_visible() {
        let options = CompilerOptions {
            no_vis: true,
            ..CompilerOptions::default()
        };
        let result = BspCompiler::new(options)
            .compile(&[cube(Vec3::new(0.0, 0.0, 0.0), 64.0)], &[])
            .unwrap();
        let clusters = result.stats.clusters;
        assert!(clusters > 1);
        let first_row = result.bsp.visibility.offsets[0];
        assert!(result.bsp.visibility.offsets.iter().all(|o| *o == first_row));
    }

    #[test]
    fn world_box_without_brushes() {
        let b = world_bounds(&[], 64.0);
        assert_eq!(b.min, Vec3::new(-64.0, -64.0, -64.0));
        assert_eq!(b.max, Vec3::new(64.0, 64.0, 64.0));
    }
}
