use std::collections::HashMap;

use bsp::bsp::{AsIndex, BspEdge, VertexIndex};
use bsp::types::{BspError, BspResult, Vec3};
use itertools::Itertools;
use log::error;

use crate::faces::CompileFace;

/// Vertices within this distance on every axis are welded.
pub const VERTEX_EPSILON: f64 = 0.01;
const GRID_SCALE: f64 = 100.0;

type GridKey = (i64, i64, i64);

fn grid_key(v: &Vec3) -> GridKey {
    (
        (v.x * GRID_SCALE).round() as i64,
        (v.y * GRID_SCALE).round() as i64,
        (v.z * GRID_SCALE).round() as i64,
    )
}

/// Welded vertex list with a spatial hash for lookups.
#[derive(Debug, Default)]
pub struct VertexTable {
    vertices: Vec<Vec3>,
    grid: HashMap<GridKey, Vec<usize>>,
}

impl VertexTable {
    pub fn new() -> VertexTable {
        VertexTable::default()
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    fn find(&self, v: &Vec3) -> Option<usize> {
        let (kx, ky, kz) = grid_key(v);
        let mut best: Option<usize> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let bucket = match self.grid.get(&(kx + dx, ky + dy, kz + dz)) {
                        Some(bucket) => bucket,
                        None => continue,
                    };
                    for &index in bucket {
                        let p = &self.vertices[index];
                        if (p.x - v.x).abs() <= VERTEX_EPSILON
                            && (p.y - v.y).abs() <= VERTEX_EPSILON
                            && (p.z - v.z).abs() <= VERTEX_EPSILON
                            && best.map_or(true, |b| index < b)
                        {
                            best = Some(index);
                        }
                    }
                }
            }
        }
        best
    }

    pub fn find_or_add(&mut self, v: Vec3) -> usize {
        if let Some(index) = self.find(&v) {
            return index;
        }
        let index = self.vertices.len();
        self.vertices.push(v);
        self.grid.entry(grid_key(&v)).or_insert_with(Vec::new).push(index);
        index
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub vertices: Vec<Vec3>,
    pub edges: Vec<BspEdge>,
    /// Positive for an edge used in its stored direction, negative reversed.
    pub surf_edges: Vec<i32>,
    /// (first surfedge, count) for each face.
    pub face_ranges: Vec<(u32, u32)>,
}

fn edge(v1: usize, v2: usize) -> BspEdge {
    BspEdge {
        vertices: [VertexIndex::new(v1 as u32), VertexIndex::new(v2 as u32)],
    }
}

fn build(faces: &[CompileFace], reserve_null_edge: bool) -> BspResult<EdgeData> {
    let mut vertices = VertexTable::new();
    let mut edges = vec![];
    let mut lookup: HashMap<(usize, usize), usize> = HashMap::new();
    let mut surf_edges = vec![];
    let mut face_ranges = Vec::with_capacity(faces.len());

    if reserve_null_edge {
        edges.push(edge(0, 0));
    }

    for (face_index, face) in faces.iter().enumerate() {
        let first = surf_edges.len();
        let indices = face
            .winding
            .points
            .iter()
            .map(|p| vertices.find_or_add(*p))
            .collect::<Vec<_>>();

        for (&v1, &v2) in indices.iter().circular_tuple_windows() {
            if v1 == v2 {
                continue;
            }
            let key = (v1.min(v2), v1.max(v2));
            match lookup.get(&key) {
                Some(&index) => {
                    let stored = &edges[index];
                    if stored.vertices[0].index() == v1 {
                        surf_edges.push(index as i32);
                    } else if index == 0 {
                        error!("Face {} needs edge 0 reversed", face_index);
                        return Err(BspError::from("Edge 0 can't be used reversed"));
                    } else {
                        surf_edges.push(-(index as i32));
                    }
                }
                None => {
                    let index = edges.len();
                    edges.push(edge(v1, v2));
                    lookup.insert(key, index);
                    surf_edges.push(index as i32);
                }
            }
        }

        let count = surf_edges.len() - first;
        if count < 3 {
            error!("Face {} collapsed to {} edges", face_index, count);
            return Err(BspError::from(format!("Face {} is degenerate after welding", face_index)));
        }
        face_ranges.push((first as u32, count as u32));
    }

    Ok(EdgeData {
        vertices: vertices.vertices,
        edges,
        surf_edges,
        face_ranges,
    })
}

/// Weld vertices and share edges between faces. Edge 0 is an ordinary edge.
pub fn build_edges(faces: &[CompileFace]) -> BspResult<EdgeData> {
    build(faces, false)
}

/// As `build_edges`, but edge 0 is a placeholder so every real edge can be
/// referenced with either sign.
pub fn build_edges_reserved(faces: &[CompileFace]) -> BspResult<EdgeData> {
    build(faces, true)
}
