use std::collections::HashMap;

use bsp::bsp::{AsIndex, BspTexInfo, TexInfoIndex};
use bsp::contents::SurfaceFlags;
use bsp::types::Point3F;

use crate::defs::TextureDef;

// Float fields compared bit for bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TexInfoKey {
    name: String,
    offset_x: u64,
    offset_y: u64,
    rotation: u64,
    scale_x: u64,
    scale_y: u64,
}

impl From<&TextureDef> for TexInfoKey {
    fn from(texture: &TextureDef) -> Self {
        TexInfoKey {
            name: texture.name.clone(),
            offset_x: texture.offset_x.to_bits(),
            offset_y: texture.offset_y.to_bits(),
            rotation: texture.rotation.to_bits(),
            scale_x: texture.scale_x.to_bits(),
            scale_y: texture.scale_y.to_bits(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TexInfoManager {
    tex_infos: Vec<BspTexInfo>,
    lookup: HashMap<TexInfoKey, usize>,
}

impl TexInfoManager {
    pub fn new() -> TexInfoManager {
        TexInfoManager {
            tex_infos: vec![],
            lookup: HashMap::new(),
        }
    }

    pub fn tex_infos(&self) -> &[BspTexInfo] {
        &self.tex_infos
    }

    pub fn into_tex_infos(self) -> Vec<BspTexInfo> {
        self.tex_infos
    }

    pub fn find_or_add(&mut self, texture: &TextureDef) -> TexInfoIndex {
        let key = TexInfoKey::from(texture);
        if let Some(&index) = self.lookup.get(&key) {
            return TexInfoIndex::new(index as u32);
        }

        let scale_x = if texture.scale_x == 0.0 {
            1.0
        } else {
            texture.scale_x
        };
        let scale_y = if texture.scale_y == 0.0 {
            1.0
        } else {
            texture.scale_y
        };

        let index = self.tex_infos.len();
        self.tex_infos.push(BspTexInfo {
            s: Point3F::new((1.0 / scale_x) as f32, 0.0, 0.0),
            s_offset: texture.offset_x as f32,
            t: Point3F::new(0.0, (-1.0 / scale_y) as f32, 0.0),
            t_offset: texture.offset_y as f32,
            flags: SurfaceFlags::empty(),
            value: 0,
            texture: texture.name.clone(),
            next_tex_info: -1,
        });
        self.lookup.insert(key, index);
        TexInfoIndex::new(index as u32)
    }
}
