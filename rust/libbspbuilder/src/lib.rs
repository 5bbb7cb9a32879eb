pub mod brush;
pub mod compiler;
pub mod config;
pub mod csg;
pub mod defs;
pub mod edges;
pub mod entities;
pub mod faces;
pub mod flatten;
pub mod planes;
pub mod portals;
pub mod primitives;
pub mod texinfo;
pub mod tree;
pub mod vis;
pub mod winding;

pub use compiler::{BspCompiler, CompileResult, CompileStats, NullProgressListener, ProgressEventListener};
pub use config::{CompilerOptions, SplitMethod};
pub use defs::{BrushDef, EntityDef, PlaneDef, SideDef, TextureDef};

use bsp::types::BspResult;

/// Compile with options given as XML, see `CompilerOptions::from_xml`.
pub fn compile_with_xml_options(
    options_xml: &str,
    brushes: &[BrushDef],
    entities: &[EntityDef],
    progress: &mut dyn ProgressEventListener,
) -> BspResult<CompileResult> {
    let options = CompilerOptions::from_xml(options_xml)?;
    BspCompiler::new(options).compile_with_progress(brushes, entities, progress)
}
