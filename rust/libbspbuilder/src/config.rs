use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bsp::types::{BspError, BspResult};
use quick_xml::de::Deserializer;
use serde::de::Error as _;
use serde::{Deserialize, Serialize, Serializer};

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum SplitMethod {
    /// Score every candidate plane.
    Exhaustive,
    /// Score a seeded random sample of the candidates.
    Fast,
}

impl Display for SplitMethod {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SplitMethod::Exhaustive => write!(f, "Exhaustive"),
            SplitMethod::Fast => write!(f, "Fast"),
        }
    }
}

impl FromStr for SplitMethod {
    type Err = BspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(SplitMethod::Exhaustive),
            "fast" => Ok(SplitMethod::Fast),
            other => Err(BspError::from(format!("Unknown split method \"{}\"", other))),
        }
    }
}

impl Serialize for SplitMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SplitMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|e: BspError| D::Error::custom(e.message))
    }
}

/// Knobs for a single compile. Passed by value, nothing here is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub verbose: bool,
    pub no_vis: bool,
    /// Keep detail brushes from biting structural ones during CSG.
    pub preserve_detail: bool,
    pub merge_faces: bool,
    pub split_method: SplitMethod,
    pub max_split_candidates: usize,
    /// Padding around the brush bounds for the portal world box.
    pub world_margin: f64,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            verbose: false,
            no_vis: false,
            preserve_detail: true,
            merge_faces: true,
            split_method: SplitMethod::Exhaustive,
            max_split_candidates: 32,
            world_margin: 64.0,
        }
    }
}

impl CompilerOptions {
    /// Read options from an XML fragment such as
    /// `<options><no_vis>true</no_vis><split_method>Fast</split_method></options>`.
    /// Missing elements keep their defaults.
    pub fn from_xml(xml: &str) -> BspResult<CompilerOptions> {
        let mut des = Deserializer::from_str(xml);
        CompilerOptions::deserialize(&mut des)
            .map_err(|e| BspError::from(format!("Invalid compiler options: {}", e)))
    }
}
