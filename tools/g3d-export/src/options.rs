//! Export options
//!
//! Every field has a default, so an options file only needs the values it changes:
//!
//! ```toml
//! selected_only = true
//! bones_per_vertex = 2
//! max_bones_per_nodepart = 6
//! primitive_type = "auto"
//! copy_textures = true
//! copy_texture_strategy = "overwrite"
//! ```

use std::path::Path;

use clap::ValueEnum;
use g3d_common::PrimitiveType;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Primitive type for every mesh part, or chosen per object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveChoice {
    /// Wireframe-displayed objects export line strips, everything else triangles
    #[default]
    Auto,
    Triangles,
    Lines,
    Points,
    TriangleStrip,
    LineStrip,
}

impl PrimitiveChoice {
    pub fn resolve(self, wireframe: bool) -> PrimitiveType {
        match self {
            PrimitiveChoice::Auto if wireframe => PrimitiveType::LineStrip,
            PrimitiveChoice::Auto => PrimitiveType::Triangles,
            PrimitiveChoice::Triangles => PrimitiveType::Triangles,
            PrimitiveChoice::Lines => PrimitiveType::Lines,
            PrimitiveChoice::Points => PrimitiveType::Points,
            PrimitiveChoice::TriangleStrip => PrimitiveType::TriangleStrip,
            PrimitiveChoice::LineStrip => PrimitiveType::LineStrip,
        }
    }
}

/// What to do when a copied texture already exists at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CopyTextureStrategy {
    /// Keep the existing file
    #[default]
    Respect,
    /// Always write the texture
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub selected_only: bool,
    /// Rotate root nodes from Z-up to Y-up
    pub y_up: bool,
    /// Use the modifier-evaluated mesh when the scene provides one
    pub apply_modifiers: bool,

    pub use_normal: bool,
    pub use_color: bool,
    /// One packed float per vertex color instead of four
    pub packed_color: bool,
    pub use_uv: bool,
    /// Write `1 - v` instead of `v`
    pub flip_uv: bool,
    pub use_tangent: bool,
    pub use_binormal: bool,

    pub use_armature: bool,
    pub deform_bones_only: bool,
    pub bones_per_vertex: usize,
    pub max_bones_per_nodepart: usize,
    pub max_vertices_per_mesh: usize,
    pub max_indices_per_meshpart: usize,

    pub use_actions: bool,
    /// Append an `<bone>_end` node to leaf bones
    pub add_bone_tip: bool,
    /// Sampling rate for animations; the scene's rate when unset
    pub fps: Option<f32>,

    pub primitive_type: PrimitiveChoice,
    pub use_material: bool,
    pub copy_textures: bool,
    pub copy_texture_strategy: CopyTextureStrategy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            selected_only: false,
            y_up: true,
            apply_modifiers: true,
            use_normal: true,
            use_color: true,
            packed_color: true,
            use_uv: true,
            flip_uv: true,
            use_tangent: true,
            use_binormal: true,
            use_armature: true,
            deform_bones_only: false,
            bones_per_vertex: 4,
            max_bones_per_nodepart: 12,
            max_vertices_per_mesh: 32767,
            max_indices_per_meshpart: 32767,
            use_actions: true,
            add_bone_tip: true,
            fps: None,
            primitive_type: PrimitiveChoice::Auto,
            use_material: true,
            copy_textures: false,
            copy_texture_strategy: CopyTextureStrategy::Respect,
        }
    }
}

impl ExportOptions {
    /// Load options from a TOML file, filling unspecified fields with defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: ExportOptions =
            toml::from_str(&text).map_err(|source| ExportError::OptionsParse {
                path: path.to_path_buf(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject option combinations the partitioner cannot satisfy
    pub fn validate(&self) -> Result<()> {
        if self.max_vertices_per_mesh == 0 {
            return Err(invalid("max_vertices_per_mesh", "must be at least 1"));
        }
        if self.max_indices_per_meshpart == 0 {
            return Err(invalid("max_indices_per_meshpart", "must be at least 1"));
        }
        if self.use_armature && self.bones_per_vertex > 0 {
            if self.max_bones_per_nodepart < self.bones_per_vertex {
                return Err(invalid(
                    "max_bones_per_nodepart",
                    format!(
                        "{} is below bones_per_vertex ({}); a single vertex could never fit",
                        self.max_bones_per_nodepart, self.bones_per_vertex
                    ),
                ));
            }
        }
        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(invalid("fps", format!("{fps} is not a positive frame rate")));
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ExportError {
    ExportError::InvalidOption {
        name,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_use_defaults() {
        let options: ExportOptions = toml::from_str(
            r#"
            selected_only = true
            bones_per_vertex = 2
            primitive_type = "line_strip"
            copy_texture_strategy = "overwrite"
            "#,
        )
        .unwrap();

        assert!(options.selected_only);
        assert_eq!(options.bones_per_vertex, 2);
        assert_eq!(options.primitive_type, PrimitiveChoice::LineStrip);
        assert_eq!(options.copy_texture_strategy, CopyTextureStrategy::Overwrite);
        // Untouched fields keep their defaults
        assert!(options.y_up);
        assert_eq!(options.max_bones_per_nodepart, 12);
        assert_eq!(options.max_vertices_per_mesh, 32767);
        assert_eq!(options.fps, None);
    }

    #[test]
    fn test_validate_rejects_impossible_bone_budget() {
        let options = ExportOptions {
            bones_per_vertex: 4,
            max_bones_per_nodepart: 3,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ExportError::InvalidOption {
                name: "max_bones_per_nodepart",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_fps() {
        let options = ExportOptions {
            fps: Some(0.0),
            ..Default::default()
        };
        assert!(options.validate().is_err());
        assert!(ExportOptions::default().validate().is_ok());
    }

    #[test]
    fn test_primitive_choice_auto() {
        assert_eq!(PrimitiveChoice::Auto.resolve(true), PrimitiveType::LineStrip);
        assert_eq!(PrimitiveChoice::Auto.resolve(false), PrimitiveType::Triangles);
        assert_eq!(PrimitiveChoice::Points.resolve(true), PrimitiveType::Points);
    }
}
