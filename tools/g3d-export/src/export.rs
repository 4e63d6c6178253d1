//! Export driver
//!
//! Builds a model from a scene, copies textures when asked to, encodes the model
//! and writes it in one step. The output file is only replaced once the encoded
//! model is complete.

use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use g3d_common::formats::{BINARY_EXTENSION, TEXT_EXTENSION};
use g3d_common::{encode_binary, encode_text, Model};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::assembler::assemble_scene;
use crate::error::{ExportError, Result};
use crate::options::ExportOptions;
use crate::scene::Scene;
use crate::texture::copy_textures;

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// `.g3dj`
    #[default]
    Text,
    /// `.g3db`
    Binary,
}

impl ModelFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            TEXT_EXTENSION => Some(ModelFormat::Text),
            BINARY_EXTENSION => Some(ModelFormat::Binary),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Text => TEXT_EXTENSION,
            ModelFormat::Binary => BINARY_EXTENSION,
        }
    }
}

/// Validate options and assemble the model
pub fn build_model(scene: &Scene, options: &ExportOptions) -> Result<Model> {
    options.validate()?;
    assemble_scene(scene, options)
}

pub fn encode_model(model: &Model, format: ModelFormat) -> Result<Vec<u8>> {
    Ok(match format {
        ModelFormat::Text => encode_text(model).into_bytes(),
        ModelFormat::Binary => encode_binary(model)?,
    })
}

/// Write `bytes` to `path` through a temporary file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Copy textures (when enabled), encode and write the model
pub fn write_model(
    model: &mut Model,
    output: &Path,
    format: ModelFormat,
    options: &ExportOptions,
) -> Result<()> {
    if options.copy_textures {
        let dir = output.parent().unwrap_or(Path::new(""));
        copy_textures(model, dir, options.copy_texture_strategy)?;
    }

    let bytes = encode_model(model, format)?;
    write_atomic(output, &bytes)?;
    info!("Wrote {:?} ({} bytes)", output, bytes.len());
    Ok(())
}

/// Load, build and write in one call
pub fn export_scene(
    scene_path: &Path,
    output: &Path,
    format: ModelFormat,
    options: &ExportOptions,
) -> Result<ModelSummary> {
    let scene = Scene::load(scene_path)?;
    let mut model = build_model(&scene, options)?;
    write_model(&mut model, output, format, options)?;
    Ok(ModelSummary::new(&model, format))
}

// ============================================================================
// Summary
// ============================================================================

/// Human-readable counts of an exported model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub format: ModelFormat,
    pub meshes: usize,
    pub vertices: usize,
    pub mesh_parts: usize,
    pub indices: usize,
    pub materials: usize,
    pub textures: usize,
    pub nodes: usize,
    pub node_parts: usize,
    pub animations: usize,
    pub keyframes: usize,
}

impl ModelSummary {
    pub fn new(model: &Model, format: ModelFormat) -> Self {
        let mut node_parts = 0;
        let mut stack: Vec<_> = model.nodes.iter().collect();
        while let Some(node) = stack.pop() {
            node_parts += node.parts.len();
            stack.extend(node.children.iter());
        }

        let parts = || model.meshes.iter().flat_map(|mesh| mesh.parts.iter());
        Self {
            id: model.id.clone(),
            format,
            meshes: model.meshes.len(),
            vertices: model.meshes.iter().map(|m| m.vertex_count()).sum(),
            mesh_parts: parts().count(),
            indices: parts().map(|p| p.indices.len()).sum(),
            materials: model.materials.len(),
            textures: model.textures().count(),
            nodes: model.node_count(),
            node_parts,
            animations: model.animations.len(),
            keyframes: model
                .animations
                .iter()
                .flat_map(|a| a.bones.iter())
                .map(|b| b.keyframes.len())
                .sum(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(ExportError::Summary)
    }

    /// Summary file path for a model: `model.g3dj` -> `model.summary.toml`
    pub fn path_for(output: &Path) -> std::path::PathBuf {
        output.with_extension("summary.toml")
    }

    pub fn write(&self, output: &Path) -> Result<()> {
        write_atomic(&Self::path_for(output), self.to_toml()?.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3d_common::{MeshBuffer, MeshPart, Node, NodePart, PrimitiveType, VertexFlag};
    use std::path::PathBuf;

    fn model() -> Model {
        let mut mesh = MeshBuffer::new(vec![VertexFlag::position()]);
        mesh.vertices = vec![0.0; 9];
        let mut part = MeshPart::new("tri_part0", PrimitiveType::Triangles);
        part.indices = vec![0, 1, 2];
        mesh.parts.push(part);

        let mut node = Node::new("Tri");
        node.parts.push(NodePart::new("Mat", "tri_part0"));
        node.children.push(Node::new("Child"));

        Model {
            id: "scene".to_string(),
            meshes: vec![mesh],
            nodes: vec![node],
            ..Default::default()
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ModelFormat::from_path(Path::new("a.g3dj")), Some(ModelFormat::Text));
        assert_eq!(ModelFormat::from_path(Path::new("a.G3DB")), Some(ModelFormat::Binary));
        assert_eq!(ModelFormat::from_path(Path::new("a.obj")), None);
        assert_eq!(ModelFormat::from_path(Path::new("a")), None);
    }

    #[test]
    fn test_summary_counts() {
        let summary = ModelSummary::new(&model(), ModelFormat::Text);
        assert_eq!(summary.meshes, 1);
        assert_eq!(summary.vertices, 3);
        assert_eq!(summary.mesh_parts, 1);
        assert_eq!(summary.indices, 3);
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.node_parts, 1);

        let text = summary.to_toml().unwrap();
        assert!(text.contains("format = \"text\""));
        assert!(text.contains("vertices = 3"));
    }

    #[test]
    fn test_summary_path() {
        assert_eq!(
            ModelSummary::path_for(Path::new("out/model.g3dj")),
            PathBuf::from("out/model.summary.toml")
        );
    }

    #[test]
    fn test_write_model_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.g3db");
        std::fs::write(&output, b"stale").unwrap();

        let mut model = model();
        write_model(&mut model, &output, ModelFormat::Binary, &ExportOptions::default()).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(bytes, encode_binary(&model).unwrap());
        assert_eq!(bytes[0], b'{');
    }
}
