//! g3d-export library
//!
//! Converts an extracted scene description into a G3D runtime model. Used by the
//! `g3d-export` binary and by tooling that wants the model in memory.

pub mod animation;
pub mod assembler;
pub mod error;
pub mod export;
pub mod material;
pub mod mesh;
pub mod options;
pub mod scene;
pub mod skeleton;
pub mod texture;

pub use error::{ExportError, LimitKind, Result};
pub use options::{CopyTextureStrategy, ExportOptions, PrimitiveChoice};
pub use scene::Scene;

// Re-export the export pipeline
pub use assembler::{assemble_scene, SceneAssembler};
pub use export::{
    build_model, encode_model, export_scene, write_atomic, write_model, ModelFormat, ModelSummary,
};

// Re-export the model graph so callers need only one dependency
pub use g3d_common::{Model, Node};
