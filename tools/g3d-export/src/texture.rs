//! Texture copying
//!
//! Places every texture image in a `textures/` directory next to the exported
//! model and points the texture's filename at the copy.

use std::fs;
use std::path::{Path, PathBuf};

use g3d_common::{Model, Texture};
use hashbrown::HashSet;
use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::options::CopyTextureStrategy;

/// Directory, relative to the model, that copied textures are written to
pub const TEXTURE_DIR: &str = "textures";

enum CopySource<'m> {
    Packed(&'m [u8]),
    File(&'m Path),
}

struct PendingCopy<'m> {
    dest: PathBuf,
    source: CopySource<'m>,
}

/// Copy the textures of `model` into `<out_dir>/textures`.
///
/// Every source is resolved before the first file is written, so a missing
/// image leaves the output directory untouched. Returns how many files were
/// written.
pub fn copy_textures(
    model: &mut Model,
    out_dir: &Path,
    strategy: CopyTextureStrategy,
) -> Result<usize> {
    let texture_dir = out_dir.join(TEXTURE_DIR);

    let written = {
        let mut handled = HashSet::new();
        let pending = model
            .textures()
            .filter(|texture| handled.insert(texture.filename.as_str()))
            .filter_map(|texture| plan_copy(texture, &texture_dir, strategy).transpose())
            .collect::<Result<Vec<_>>>()?;

        if !pending.is_empty() {
            fs::create_dir_all(&texture_dir)?;
        }
        for copy in &pending {
            match copy.source {
                CopySource::Packed(bytes) => {
                    debug!("Writing packed texture -> {:?}", copy.dest);
                    fs::write(&copy.dest, bytes)?;
                }
                CopySource::File(source) => {
                    debug!("Copying texture {:?} -> {:?}", source, copy.dest);
                    fs::copy(source, &copy.dest)?;
                }
            }
        }
        pending.len()
    };

    for texture in model.materials.iter_mut().flat_map(|m| m.textures.iter_mut()) {
        texture.filename = format!("{TEXTURE_DIR}/{}", texture.filename);
    }

    if written > 0 {
        info!("Copied {} textures to {:?}", written, texture_dir);
    }
    Ok(written)
}

/// `None` when an existing destination is kept
fn plan_copy<'m>(
    texture: &'m Texture,
    texture_dir: &Path,
    strategy: CopyTextureStrategy,
) -> Result<Option<PendingCopy<'m>>> {
    let dest = texture_dir.join(&texture.filename);
    if strategy == CopyTextureStrategy::Respect && dest.exists() {
        debug!("Keeping existing texture {:?}", dest);
        return Ok(None);
    }

    let source = match (&texture.source.packed, &texture.source.path) {
        (Some(bytes), _) => CopySource::Packed(bytes),
        (None, Some(path)) if path.is_file() => CopySource::File(path),
        (None, path) => {
            return Err(ExportError::TextureNotFound {
                texture: texture.id.clone(),
                path: path.clone().unwrap_or_else(|| texture.filename.clone().into()),
            })
        }
    };
    Ok(Some(PendingCopy { dest, source }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3d_common::{Material, TextureSource, TextureType};

    fn model_with(source: TextureSource) -> Model {
        let mut material = Material::new("Mat");
        material.textures.push(Texture {
            id: "wood_DIFFUSE".to_string(),
            texture_type: TextureType::Diffuse,
            filename: "wood.png".to_string(),
            source,
        });
        Model {
            materials: vec![material],
            ..Default::default()
        }
    }

    #[test]
    fn test_copy_rewrites_filename() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("wood.png");
        fs::write(&image, b"png").unwrap();
        let out = dir.path().join("out");

        let mut model = model_with(TextureSource {
            path: Some(image),
            packed: None,
        });
        let written = copy_textures(&mut model, &out, CopyTextureStrategy::Respect).unwrap();

        assert_eq!(written, 1);
        assert_eq!(model.materials[0].textures[0].filename, "textures/wood.png");
        assert_eq!(fs::read(out.join("textures/wood.png")).unwrap(), b"png");
    }

    #[test]
    fn test_respect_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("textures")).unwrap();
        fs::write(dir.path().join("textures/wood.png"), b"old").unwrap();

        let packed = TextureSource {
            path: None,
            packed: Some(b"new".to_vec()),
        };

        let mut model = model_with(packed.clone());
        let written = copy_textures(&mut model, dir.path(), CopyTextureStrategy::Respect).unwrap();
        assert_eq!(written, 0);
        assert_eq!(fs::read(dir.path().join("textures/wood.png")).unwrap(), b"old");

        let mut model = model_with(packed);
        copy_textures(&mut model, dir.path(), CopyTextureStrategy::Overwrite).unwrap();
        assert_eq!(fs::read(dir.path().join("textures/wood.png")).unwrap(), b"new");
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(TextureSource {
            path: Some(PathBuf::from("/nonexistent/wood.png")),
            packed: None,
        });

        let err =
            copy_textures(&mut model, dir.path(), CopyTextureStrategy::Overwrite).unwrap_err();
        assert!(matches!(
            err,
            ExportError::TextureNotFound { ref texture, .. } if texture == "wood_DIFFUSE"
        ));
    }

    #[test]
    fn test_missing_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(TextureSource {
            path: None,
            packed: Some(b"png".to_vec()),
        });
        model.materials[0].textures.push(Texture {
            id: "stone_DIFFUSE".to_string(),
            texture_type: TextureType::Diffuse,
            filename: "stone.png".to_string(),
            source: TextureSource {
                path: Some(dir.path().join("missing/stone.png")),
                packed: None,
            },
        });

        let out = dir.path().join("out");
        let err = copy_textures(&mut model, &out, CopyTextureStrategy::Overwrite).unwrap_err();
        assert!(matches!(err, ExportError::TextureNotFound { .. }));
        assert!(!out.join(TEXTURE_DIR).exists());
        assert_eq!(model.materials[0].textures[0].filename, "wood.png");
    }
}
