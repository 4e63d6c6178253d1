//! Material catalog
//!
//! Converts principled shader descriptions into runtime materials, memoized by
//! material name for the whole export. Each shader slot becomes either a texture
//! (when a file-backed image is connected) or a plain attribute value.

use std::path::Path;

use g3d_common::{Material, Texture, TextureSource, TextureType};
use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::scene::{ImageRef, ImageSourceKind, MaterialSource, Principled, World};

/// Materials built so far, in first-use order
#[derive(Debug, Default)]
pub struct MaterialCatalog {
    materials: Vec<Material>,
    by_name: HashMap<String, usize>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Material id for `source`, building the material on first use
    pub fn get_or_build(
        &mut self,
        source: &MaterialSource,
        world: &World,
        use_material: bool,
    ) -> &Material {
        let index = match self.by_name.get(&source.name) {
            Some(&index) => index,
            None => {
                let material = build_material(source, world, use_material);
                self.materials.push(material);
                self.by_name
                    .insert(source.name.clone(), self.materials.len() - 1);
                self.materials.len() - 1
            }
        };
        &self.materials[index]
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn into_materials(self) -> Vec<Material> {
        self.materials
    }
}

/// Build a material without memoization
pub fn build_material(source: &MaterialSource, world: &World, use_material: bool) -> Material {
    let mut material = Material::new(&source.name);
    if !use_material {
        return material;
    }

    if !source.use_nodes {
        warn!("Material has no nodes: {}", source.name);
        return material;
    }

    match &source.principled {
        Some(principled) => setup_principled(&mut material, principled, world),
        None => debug!("No principled shader in material {}", source.name),
    }
    material
}

fn setup_principled(material: &mut Material, bsdf: &Principled, world: &World) {
    let mut textures = TextureSet::default();
    let attrs = &mut material.attributes;

    if !textures.add(TextureType::Transparency, bsdf.alpha_texture.as_ref()) {
        attrs.opacity = Some(bsdf.alpha);
    }
    if !textures.add(TextureType::Diffuse, bsdf.base_color_texture.as_ref()) {
        attrs.diffuse = Some(bsdf.base_color);
    }
    if !textures.add(TextureType::Emissive, bsdf.emission_color_texture.as_ref()) {
        attrs.emissive = Some(bsdf.emission_color);
    }
    if !textures.add(TextureType::Shininess, bsdf.roughness_texture.as_ref()) {
        attrs.shininess = Some(1.0 - bsdf.roughness);
    }
    if !textures.add(TextureType::Specular, bsdf.specular_texture.as_ref()) {
        attrs.specular = Some([bsdf.specular; 3]);
    }
    if !textures.add(TextureType::Reflection, bsdf.metallic_texture.as_ref()) {
        attrs.reflection = Some([bsdf.metallic; 3]);
    }
    textures.add(TextureType::Normal, bsdf.normalmap_texture.as_ref());

    if !world.use_nodes {
        attrs.ambient = Some(world.color);
    }

    material.textures = textures.textures;
}

/// Textures of one material, unique by id
#[derive(Default)]
struct TextureSet {
    textures: Vec<Texture>,
}

impl TextureSet {
    /// Returns whether the slot is texture-driven
    fn add(&mut self, texture_type: TextureType, image: Option<&ImageRef>) -> bool {
        let Some(image) = image.filter(|image| image.source == ImageSourceKind::File) else {
            return false;
        };

        let texture = build_texture(image, texture_type);
        match self.textures.iter_mut().find(|t| t.id == texture.id) {
            Some(existing) => *existing = texture,
            None => self.textures.push(texture),
        }
        true
    }
}

/// Texture id is `<image>_<TYPE>`, filename the image's basename
pub fn build_texture(image: &ImageRef, texture_type: TextureType) -> Texture {
    let filename = image
        .filepath
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.name.clone());

    Texture {
        id: format!("{}_{}", image.name, texture_type.as_str()),
        texture_type,
        filename,
        source: TextureSource {
            path: image.filepath.clone(),
            packed: image.packed.clone(),
        },
    }
}
