use std::collections::BTreeMap;

use bsp::contents::Contents;
use bsp::types::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDef {
    pub name: String,
    pub offset_x: f64,
    pub offset_y: f64,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl TextureDef {
    pub fn new(name: &str) -> TextureDef {
        TextureDef {
            name: name.to_string(),
            offset_x: 0.0,
            offset_y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl Default for TextureDef {
    fn default() -> Self {
        TextureDef::new("base/default")
    }
}

/// How a brush side's plane is given.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaneDef {
    /// Outward facing normal and distance.
    Equation { normal: Vec3, dist: f64 },
    /// Three points, clockwise when viewed from outside the brush.
    Points([Vec3; 3]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SideDef {
    pub plane: PlaneDef,
    pub texture: TextureDef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrushDef {
    pub sides: Vec<SideDef>,
    pub contents: Contents,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDef {
    pub classname: String,
    pub properties: BTreeMap<String, String>,
}

impl EntityDef {
    pub fn new(classname: &str) -> EntityDef {
        EntityDef {
            classname: classname.to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> EntityDef {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}
