use crate::contents::{Contents, SurfaceFlags};
use crate::io::*;
use crate::types::*;
use bsp_derive::{Readable, Writable};
use bytes::{Buf, BufMut};
pub use typed_ints::AsIndex;
use typed_ints::TypedInt;

typed_int!(PlaneIndex, _PlaneIndex, u32);
typed_int!(VertexIndex, _VertexIndex, u32);
typed_int!(EdgeIndex, _EdgeIndex, u32);
typed_int!(SurfEdgeIndex, _SurfEdgeIndex, u32);
typed_int!(FaceIndex, _FaceIndex, u32);
typed_int!(LeafIndex, _LeafIndex, u32);
typed_int!(LeafFaceIndex, _LeafFaceIndex, u32);
typed_int!(LeafBrushIndex, _LeafBrushIndex, u32);
typed_int!(TexInfoIndex, _TexInfoIndex, u32);
typed_int!(BrushIndex, _BrushIndex, u32);
typed_int!(BrushSideIndex, _BrushSideIndex, u32);

pub const IDBSPHEADER: u32 = (b'P' as u32) << 24 | (b'S' as u32) << 16 | (b'B' as u32) << 8 | b'I' as u32;

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct Header {
    pub ident: u32,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspPlane {
    pub normal: Point3F,
    pub dist: f32,
    pub plane_type: u32,
}

/// Children are node indices when non-negative, otherwise `-(leaf + 1)`.
#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspNode {
    pub plane_num: PlaneIndex,
    pub children: [i32; 2],
    pub mins: [i32; 3],
    pub maxs: [i32; 3],
    pub first_face: FaceIndex,
    pub num_faces: u32,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspLeaf {
    pub contents: Contents,
    pub cluster: i32,
    pub area: i32,
    pub mins: [i32; 3],
    pub maxs: [i32; 3],
    pub first_leaf_face: LeafFaceIndex,
    pub num_leaf_faces: u32,
    pub first_leaf_brush: LeafBrushIndex,
    pub num_leaf_brushes: u32,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspFace {
    pub plane_num: PlaneIndex,
    pub side: u32,
    pub first_edge: SurfEdgeIndex,
    pub num_edges: u32,
    pub tex_info: TexInfoIndex,
    pub styles: [u8; 4],
    pub light_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspEdge {
    pub vertices: [VertexIndex; 2],
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspTexInfo {
    pub s: Point3F,
    pub s_offset: f32,
    pub t: Point3F,
    pub t_offset: f32,
    pub flags: SurfaceFlags,
    pub value: i32,
    pub texture: String,
    pub next_tex_info: i32,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspBrush {
    pub first_side: BrushSideIndex,
    pub num_sides: u32,
    pub contents: Contents,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspBrushSide {
    pub plane_num: PlaneIndex,
    pub tex_info: i32,
}

#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub struct BspModel {
    pub mins: Point3F,
    pub maxs: Point3F,
    pub origin: Point3F,
    pub head_node: i32,
    pub first_face: FaceIndex,
    pub num_faces: u32,
}

/// Cluster visibility. `offsets[c]` holds the byte offsets of cluster `c`'s
/// compressed PVS and PHS rows, measured from the start of the lump.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Visibility {
    pub num_clusters: u32,
    pub offsets: Vec<[u32; 2]>,
    pub data: Vec<u8>,
}

pub const VIS_PVS: usize = 0;
pub const VIS_PHS: usize = 1;

impl Visibility {
    /// Size of the cluster count and offset table that precede the row data.
    pub fn table_size(num_clusters: usize) -> usize {
        4 + num_clusters * 8
    }
}

impl Readable<Visibility> for Visibility {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Self> {
        let num_clusters = u32::read(from, version)?;
        let mut offsets = Vec::with_capacity(num_clusters as usize);
        for _ in 0..num_clusters {
            offsets.push(<[u32; 2]>::read(from, version)?);
        }
        let data = read_records::<u8>(from, version)?;
        Ok(Visibility {
            num_clusters,
            offsets,
            data,
        })
    }
}

impl Writable<Visibility> for Visibility {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        if self.offsets.len() != self.num_clusters as usize {
            return Err(BspError::from(format!(
                "Visibility has {} clusters but {} offset pairs",
                self.num_clusters,
                self.offsets.len()
            )));
        }
        self.num_clusters.write(to, version)?;
        write_records(&self.offsets, to, version)?;
        write_records(&self.data, to, version)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entities {
    pub raw: String,
}

impl Writable<Entities> for Entities {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        write_records(self.raw.as_bytes(), to, version)?;
        0u8.write(to, version)
    }
}

impl Readable<Entities> for Entities {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Self> {
        let mut bytes = read_records::<u8>(from, version)?;
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(Entities {
            raw: String::from_utf8(bytes)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LumpKind {
    Entities,
    Planes,
    Vertices,
    Visibility,
    Nodes,
    TexInfo,
    Faces,
    Lighting,
    Leafs,
    LeafFaces,
    LeafBrushes,
    Edges,
    SurfEdges,
    Models,
    Brushes,
    BrushSides,
    Pop,
    Areas,
    AreaPortals,
}

impl LumpKind {
    pub fn all() -> [LumpKind; 19] {
        [
            LumpKind::Entities,
            LumpKind::Planes,
            LumpKind::Vertices,
            LumpKind::Visibility,
            LumpKind::Nodes,
            LumpKind::TexInfo,
            LumpKind::Faces,
            LumpKind::Lighting,
            LumpKind::Leafs,
            LumpKind::LeafFaces,
            LumpKind::LeafBrushes,
            LumpKind::Edges,
            LumpKind::SurfEdges,
            LumpKind::Models,
            LumpKind::Brushes,
            LumpKind::BrushSides,
            LumpKind::Pop,
            LumpKind::Areas,
            LumpKind::AreaPortals,
        ]
    }
}

/// The compiled level.
#[derive(Debug, Clone, PartialEq)]
pub struct BspData {
    pub header: Header,
    pub entities: Entities,
    pub planes: Vec<BspPlane>,
    pub vertices: Vec<Point3F>,
    pub visibility: Visibility,
    pub nodes: Vec<BspNode>,
    pub tex_infos: Vec<BspTexInfo>,
    pub faces: Vec<BspFace>,
    pub light_maps: Vec<u8>,
    pub leafs: Vec<BspLeaf>,
    pub leaf_faces: Vec<FaceIndex>,
    pub leaf_brushes: Vec<BrushIndex>,
    pub edges: Vec<BspEdge>,
    pub surf_edges: Vec<i32>,
    pub models: Vec<BspModel>,
    pub brushes: Vec<BspBrush>,
    pub brush_sides: Vec<BspBrushSide>,
}

impl BspData {
    pub fn new() -> BspData {
        BspData {
            header: Header {
                ident: IDBSPHEADER,
                version: BSP_VERSION,
            },
            entities: Entities::default(),
            planes: vec![],
            vertices: vec![],
            visibility: Visibility::default(),
            nodes: vec![],
            tex_infos: vec![],
            faces: vec![],
            light_maps: vec![],
            leafs: vec![],
            leaf_faces: vec![],
            leaf_brushes: vec![],
            edges: vec![],
            surf_edges: vec![],
            models: vec![],
            brushes: vec![],
            brush_sides: vec![],
        }
    }

    /// Encode every lump payload in directory order. File header and lump
    /// directory framing are left to the caller.
    pub fn encode_lumps(&self) -> BspResult<Vec<(LumpKind, Vec<u8>)>> {
        let version = Version {
            bsp: self.header.version,
        };
        let mut lumps = vec![];
        for kind in LumpKind::all().iter() {
            let payload = match kind {
                LumpKind::Entities => {
                    let mut buf: Vec<u8> = vec![];
                    self.entities.write(&mut buf, &version)?;
                    buf
                }
                LumpKind::Planes => records_to_bytes(&self.planes, &version)?,
                LumpKind::Vertices => records_to_bytes(&self.vertices, &version)?,
                LumpKind::Visibility => {
                    let mut buf: Vec<u8> = vec![];
                    self.visibility.write(&mut buf, &version)?;
                    buf
                }
                LumpKind::Nodes => records_to_bytes(&self.nodes, &version)?,
                LumpKind::TexInfo => records_to_bytes(&self.tex_infos, &version)?,
                LumpKind::Faces => records_to_bytes(&self.faces, &version)?,
                LumpKind::Lighting => self.light_maps.clone(),
                LumpKind::Leafs => records_to_bytes(&self.leafs, &version)?,
                LumpKind::LeafFaces => records_to_bytes(&self.leaf_faces, &version)?,
                LumpKind::LeafBrushes => records_to_bytes(&self.leaf_brushes, &version)?,
                LumpKind::Edges => records_to_bytes(&self.edges, &version)?,
                LumpKind::SurfEdges => records_to_bytes(&self.surf_edges, &version)?,
                LumpKind::Models => records_to_bytes(&self.models, &version)?,
                LumpKind::Brushes => records_to_bytes(&self.brushes, &version)?,
                LumpKind::BrushSides => records_to_bytes(&self.brush_sides, &version)?,
                LumpKind::Pop | LumpKind::Areas | LumpKind::AreaPortals => vec![],
            };
            lumps.push((*kind, payload));
        }
        Ok(lumps)
    }
}

impl Default for BspData {
    fn default() -> Self {
        BspData::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_ident_spells_ibsp() {
        assert_eq!(IDBSPHEADER.to_le_bytes(), *b"IBSP");
        let data = BspData::new();
        assert_eq!(data.header.version, 38);
    }

    #[test]
    fn face_record_layout() {
        let face = BspFace {
            plane_num: PlaneIndex::new(4),
            side: 1,
            first_edge: SurfEdgeIndex::new(12),
            num_edges: 4,
            tex_info: TexInfoIndex::new(0),
            styles: [0, 255, 255, 255],
            light_offset: -1,
        };
        let mut buf: Vec<u8> = vec![];
        face.write(&mut buf, &Version::new()).unwrap();
        assert_eq!(buf.len(), 28);

        let mut cursor = Cursor::new(buf);
        let read = BspFace::read(&mut cursor, &mut Version::new()).unwrap();
        assert_eq!(read, face);
    }

    #[test]
    fn visibility_lump_layout() {
        let vis = Visibility {
            num_clusters: 2,
            offsets: vec![[20, 21], [22, 23]],
            data: vec![0x03, 0x03, 0x03, 0x03],
        };
        let mut buf: Vec<u8> = vec![];
        vis.write(&mut buf, &Version::new()).unwrap();
        assert_eq!(buf.len(), Visibility::table_size(2) + 4);
        assert_eq!(&buf[0..4], &[2, 0, 0, 0]);

        let mut cursor = Cursor::new(buf);
        assert_eq!(Visibility::read(&mut cursor, &mut Version::new()).unwrap(), vis);

        let broken = Visibility {
            num_clusters: 3,
            offsets: vec![],
            data: vec![],
        };
        let mut buf: Vec<u8> = vec![];
        assert!(broken.write(&mut buf, &Version::new()).is_err());
    }

    #[test]
    fn lumps_come_out_in_directory_order() {
        let mut data = BspData::new();
        data.entities.raw = "{\n\"classname\" \"worldspawn\"\n}\n".to_string();
        data.surf_edges = vec![1, -1];
        let lumps = data.encode_lumps().unwrap();
        assert_eq!(lumps.len(), 19);
        assert_eq!(lumps[0].0, LumpKind::Entities);
        assert_eq!(lumps[0].1.len(), data.entities.raw.len() + 1);
        assert_eq!(lumps[12].0, LumpKind::SurfEdges);
        assert_eq!(lumps[12].1, vec![1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
    }
}
