//! g3d-export - G3D model export tool
//!
//! Converts an extracted scene description (JSON) into a G3D runtime model
//! (.g3dj text or .g3db binary)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use g3d_export::{
    build_model, export_scene, CopyTextureStrategy, ExportOptions, ModelFormat, ModelSummary,
    PrimitiveChoice, Scene,
};

#[derive(Parser)]
#[command(name = "g3d-export")]
#[command(about = "G3D model export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene to a .g3dj/.g3db model
    Export {
        /// Input scene description (JSON)
        scene: PathBuf,

        /// Output model file (default: scene path with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (default: from the output extension, else text)
        #[arg(short, long, value_enum)]
        format: Option<ModelFormat>,

        /// Export options file (TOML)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Also write <output>.summary.toml
        #[arg(long)]
        summary: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        #[command(flatten)]
        overrides: OptionOverrides,
    },

    /// Build the model without writing it and report its contents
    Check {
        /// Input scene description (JSON)
        scene: PathBuf,

        /// Export options file (TOML)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        #[command(flatten)]
        overrides: OptionOverrides,
    },
}

/// Per-option overrides, applied on top of the options file
#[derive(Args, Default)]
struct OptionOverrides {
    #[arg(long)]
    selected_only: Option<bool>,
    #[arg(long)]
    y_up: Option<bool>,
    #[arg(long)]
    apply_modifiers: Option<bool>,
    #[arg(long)]
    use_normal: Option<bool>,
    #[arg(long)]
    use_color: Option<bool>,
    #[arg(long)]
    packed_color: Option<bool>,
    #[arg(long)]
    use_uv: Option<bool>,
    #[arg(long)]
    flip_uv: Option<bool>,
    #[arg(long)]
    use_tangent: Option<bool>,
    #[arg(long)]
    use_binormal: Option<bool>,
    #[arg(long)]
    use_armature: Option<bool>,
    #[arg(long)]
    deform_bones_only: Option<bool>,
    #[arg(long)]
    bones_per_vertex: Option<usize>,
    #[arg(long)]
    max_bones_per_nodepart: Option<usize>,
    #[arg(long)]
    max_vertices_per_mesh: Option<usize>,
    #[arg(long)]
    max_indices_per_meshpart: Option<usize>,
    #[arg(long)]
    use_actions: Option<bool>,
    #[arg(long)]
    add_bone_tip: Option<bool>,
    /// Animation sampling rate (default: the scene's)
    #[arg(long)]
    fps: Option<f32>,
    #[arg(long, value_enum)]
    primitive_type: Option<PrimitiveChoice>,
    #[arg(long)]
    use_material: Option<bool>,
    #[arg(long)]
    copy_textures: Option<bool>,
    #[arg(long, value_enum)]
    copy_texture_strategy: Option<CopyTextureStrategy>,
}

impl OptionOverrides {
    fn apply(self, options: &mut ExportOptions) {
        macro_rules! set {
            ($from:expr => $to:expr; $($field:ident),* $(,)?) => {
                $(if let Some(value) = $from.$field {
                    $to.$field = value;
                })*
            };
        }
        set!(self => options;
            selected_only,
            y_up,
            apply_modifiers,
            use_normal,
            use_color,
            packed_color,
            use_uv,
            flip_uv,
            use_tangent,
            use_binormal,
            use_armature,
            deform_bones_only,
            bones_per_vertex,
            max_bones_per_nodepart,
            max_vertices_per_mesh,
            max_indices_per_meshpart,
            use_actions,
            add_bone_tip,
            primitive_type,
            use_material,
            copy_textures,
            copy_texture_strategy,
        );
        if self.fps.is_some() {
            options.fps = self.fps;
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn load_options(path: Option<&Path>, overrides: OptionOverrides) -> Result<ExportOptions> {
    let mut options = match path {
        Some(path) => ExportOptions::load(path)
            .with_context(|| format!("Failed to load options {:?}", path))?,
        None => ExportOptions::default(),
    };
    overrides.apply(&mut options);
    Ok(options)
}

/// Explicit format, else the output extension, else text
fn resolve_output(
    scene: &Path,
    output: Option<PathBuf>,
    format: Option<ModelFormat>,
) -> Result<(PathBuf, ModelFormat)> {
    match (output, format) {
        (Some(output), Some(format)) => Ok((output, format)),
        (Some(output), None) => match ModelFormat::from_path(&output) {
            Some(format) => Ok((output, format)),
            None => anyhow::bail!(
                "Unknown model format for {:?} (use .g3dj or .g3db, or pass --format)",
                output
            ),
        },
        (None, format) => {
            let format = format.unwrap_or_default();
            Ok((scene.with_extension(format.extension()), format))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            format,
            options,
            summary,
            verbose,
            overrides,
        } => {
            init_logging(verbose);
            let options = load_options(options.as_deref(), overrides)?;
            let (output, format) = resolve_output(&scene, output, format)?;

            tracing::info!("Converting {:?} -> {:?}", scene, output);
            let report = export_scene(&scene, &output, format, &options)
                .with_context(|| format!("Failed to export {:?}", scene))?;

            if summary {
                report
                    .write(&output)
                    .with_context(|| format!("Failed to write summary for {:?}", output))?;
            }
            tracing::info!(
                "Done! {} meshes, {} vertices, {} nodes, {} animations",
                report.meshes,
                report.vertices,
                report.nodes,
                report.animations
            );
        }

        Commands::Check {
            scene,
            options,
            verbose,
            overrides,
        } => {
            init_logging(verbose);
            let options = load_options(options.as_deref(), overrides)?;

            tracing::info!("Checking scene {:?}", scene);
            let loaded =
                Scene::load(&scene).with_context(|| format!("Failed to load scene {:?}", scene))?;
            let model = build_model(&loaded, &options)
                .with_context(|| format!("Failed to build model from {:?}", scene))?;

            let report = ModelSummary::new(&model, ModelFormat::default());
            print!("{}", report.to_toml()?);
            tracing::info!("Scene is valid!");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output() {
        let scene = Path::new("assets/scene.json");

        let (path, format) = resolve_output(scene, None, None).unwrap();
        assert_eq!(path, PathBuf::from("assets/scene.g3dj"));
        assert_eq!(format, ModelFormat::Text);

        let (path, _) = resolve_output(scene, None, Some(ModelFormat::Binary)).unwrap();
        assert_eq!(path, PathBuf::from("assets/scene.g3db"));

        let (_, format) = resolve_output(scene, Some("out.g3db".into()), None).unwrap();
        assert_eq!(format, ModelFormat::Binary);

        assert!(resolve_output(scene, Some("out.bin".into()), None).is_err());
    }

    #[test]
    fn test_overrides_apply_over_defaults() {
        let mut options = ExportOptions::default();
        OptionOverrides {
            bones_per_vertex: Some(2),
            y_up: Some(false),
            fps: Some(60.0),
            primitive_type: Some(PrimitiveChoice::Lines),
            ..Default::default()
        }
        .apply(&mut options);

        assert_eq!(options.bones_per_vertex, 2);
        assert!(!options.y_up);
        assert_eq!(options.fps, Some(60.0));
        assert_eq!(options.primitive_type, PrimitiveChoice::Lines);
        assert!(options.use_normal);
    }

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "g3d-export",
            "export",
            "scene.json",
            "--format",
            "binary",
            "--bones-per-vertex",
            "2",
            "--copy-texture-strategy",
            "overwrite",
        ])
        .unwrap();

        match cli.command {
            Commands::Export {
                format, overrides, ..
            } => {
                assert_eq!(format, Some(ModelFormat::Binary));
                assert_eq!(overrides.bones_per_vertex, Some(2));
                assert_eq!(
                    overrides.copy_texture_strategy,
                    Some(CopyTextureStrategy::Overwrite)
                );
            }
            Commands::Check { .. } => panic!("expected export"),
        }
    }
}
