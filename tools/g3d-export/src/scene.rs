//! Extracted scene description
//!
//! The exporter never talks to a live 3D application. A host-side extractor dumps
//! the scene as JSON: collections, objects with world matrices, evaluated and
//! triangulated meshes, principled materials, armatures and keyframe actions.
//! Everything is referenced by name.

use std::path::{Path, PathBuf};

use glam::Mat4;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

fn default_true() -> bool {
    true
}

fn default_fps() -> f32 {
    24.0
}

fn identity() -> [f32; 16] {
    Mat4::IDENTITY.to_cols_array()
}

// ============================================================================
// Scene
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub world: World,
    /// Name of the root (scene) collection
    pub collection: String,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub meshes: Vec<MeshData>,
    #[serde(default)]
    pub materials: Vec<MaterialSource>,
    #[serde(default)]
    pub armatures: Vec<ArmatureData>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Scene {
    /// Load a scene from JSON, resolving relative image paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut scene: Scene =
            serde_json::from_str(&text).map_err(|source| ExportError::SceneParse {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(dir) = path.parent() {
            scene.resolve_image_paths(dir);
        }
        Ok(scene)
    }

    pub fn resolve_image_paths(&mut self, base: &Path) {
        for material in &mut self.materials {
            let Some(principled) = material.principled.as_mut() else {
                continue;
            };
            for image in principled.images_mut() {
                if let Some(filepath) = image.filepath.as_mut() {
                    if filepath.is_relative() {
                        *filepath = base.join(&*filepath);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct World {
    /// Node-based world shading; a flat color only provides ambient light when false
    pub use_nodes: bool,
    pub color: [f32; 3],
}

impl Default for World {
    fn default() -> Self {
        Self {
            use_nodes: true,
            color: [0.05, 0.05, 0.05],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    /// Excluded from the view layer
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub hide_viewport: bool,
    /// Object names, in scene order
    #[serde(default)]
    pub objects: Vec<String>,
    /// Child collection names
    #[serde(default)]
    pub children: Vec<String>,
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayType {
    Bounds,
    Wire,
    Solid,
    #[default]
    Textured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Column-major world matrix
    #[serde(default = "identity")]
    pub matrix_world: [f32; 16],
    #[serde(default)]
    pub hide_viewport: bool,
    #[serde(default = "default_true")]
    pub selected: bool,
    #[serde(default)]
    pub display_type: DisplayType,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.matrix_world)
    }
}

/// Object type, with the data each type carries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Mesh(MeshObject),
    Armature(ArmatureObject),
    Empty(EmptyObject),
    /// Cameras, lights, curves, ...
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshObject {
    /// Mesh datablock name
    pub mesh: String,
    /// Mesh with modifiers applied, when the object has any
    #[serde(default)]
    pub evaluated_mesh: Option<String>,
    /// Material name per slot; `None` for an empty slot
    #[serde(default)]
    pub material_slots: Vec<Option<String>>,
    /// Vertex group names, indexed by `GroupWeight::group`
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    /// Armature object deforming this mesh
    #[serde(default)]
    pub armature: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmatureObject {
    /// Armature datablock name
    pub armature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyObject {
    #[serde(default)]
    pub instance_collection: Option<String>,
}

// ============================================================================
// Meshes
// ============================================================================

/// Evaluated, triangulated mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshData {
    pub name: String,
    #[serde(default)]
    pub vertices: Vec<MeshVertex>,
    #[serde(default)]
    pub loops: Vec<MeshLoop>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub uv_layers: Vec<UvLayer>,
    #[serde(default)]
    pub color_layers: Vec<ColorLayer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshVertex {
    pub co: [f32; 3],
    #[serde(default)]
    pub normal: [f32; 3],
    #[serde(default)]
    pub groups: Vec<GroupWeight>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GroupWeight {
    /// Index into the object's vertex groups
    pub group: usize,
    pub weight: f32,
}

/// Face corner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshLoop {
    pub vertex: usize,
    #[serde(default)]
    pub tangent: [f32; 3],
    #[serde(default)]
    pub bitangent: [f32; 3],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub loop_start: usize,
    pub loop_total: usize,
    #[serde(default)]
    pub material_index: usize,
}

impl Polygon {
    pub fn loops(&self) -> std::ops::Range<usize> {
        self.loop_start..self.loop_start + self.loop_total
    }
}

/// Per-loop texture coordinates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UvLayer {
    pub name: String,
    #[serde(default)]
    pub active_render: bool,
    pub data: Vec<[f32; 2]>,
}

/// Per-loop RGBA colors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorLayer {
    pub name: String,
    #[serde(default)]
    pub active_render: bool,
    pub data: Vec<[f32; 4]>,
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageSourceKind {
    #[default]
    File,
    Sequence,
    Movie,
    Generated,
    Viewer,
    Tiled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub name: String,
    #[serde(default)]
    pub filepath: Option<PathBuf>,
    #[serde(default)]
    pub source: ImageSourceKind,
    /// Image bytes embedded in the scene
    #[serde(default)]
    pub packed: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSource {
    pub name: String,
    #[serde(default = "default_true")]
    pub use_nodes: bool,
    /// Principled BSDF inputs; absent when the shader graph has none
    #[serde(default)]
    pub principled: Option<Principled>,
}

/// Fixed set of principled shader slots, each a value plus an optional image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Principled {
    pub base_color: [f32; 3],
    pub base_color_texture: Option<ImageRef>,
    pub alpha: f32,
    pub alpha_texture: Option<ImageRef>,
    pub emission_color: [f32; 3],
    pub emission_color_texture: Option<ImageRef>,
    pub roughness: f32,
    pub roughness_texture: Option<ImageRef>,
    pub specular: f32,
    pub specular_texture: Option<ImageRef>,
    pub metallic: f32,
    pub metallic_texture: Option<ImageRef>,
    pub normalmap_texture: Option<ImageRef>,
}

impl Default for Principled {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8],
            base_color_texture: None,
            alpha: 1.0,
            alpha_texture: None,
            emission_color: [0.0, 0.0, 0.0],
            emission_color_texture: None,
            roughness: 0.5,
            roughness_texture: None,
            specular: 0.5,
            specular_texture: None,
            metallic: 0.0,
            metallic_texture: None,
            normalmap_texture: None,
        }
    }
}

impl Principled {
    fn images_mut(&mut self) -> impl Iterator<Item = &mut ImageRef> + '_ {
        [
            &mut self.base_color_texture,
            &mut self.alpha_texture,
            &mut self.emission_color_texture,
            &mut self.roughness_texture,
            &mut self.specular_texture,
            &mut self.metallic_texture,
            &mut self.normalmap_texture,
        ]
        .into_iter()
        .filter_map(Option::as_mut)
    }
}

// ============================================================================
// Armatures and actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationMode {
    #[default]
    Quaternion,
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
    AxisAngle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoneData {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Column-major rest matrix in armature space
    #[serde(default = "identity")]
    pub matrix_local: [f32; 16],
    #[serde(default)]
    pub length: f32,
    #[serde(default = "default_true")]
    pub deform: bool,
    /// Rotation mode of the pose bone
    #[serde(default)]
    pub rotation_mode: RotationMode,
}

impl BoneData {
    pub fn rest_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.matrix_local)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmatureData {
    pub name: String,
    /// Bones in armature order (parents before children)
    #[serde(default)]
    pub bones: Vec<BoneData>,
}

impl ArmatureData {
    pub fn bone(&self, name: &str) -> Option<&BoneData> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    Constant,
    Linear,
    #[default]
    Bezier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframePoint {
    /// (frame, value)
    pub co: [f32; 2],
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub handle_left: Option<[f32; 2]>,
    #[serde(default)]
    pub handle_right: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FCurve {
    /// e.g. `pose.bones["Bone"].location`
    pub data_path: String,
    #[serde(default)]
    pub array_index: usize,
    #[serde(default)]
    pub keyframes: Vec<KeyframePoint>,
}

/// Curves of one bone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionGroup {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<FCurve>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default = "default_users")]
    pub users: u32,
    #[serde(default)]
    pub groups: Vec<ActionGroup>,
}

fn default_users() -> u32 {
    1
}

// ============================================================================
// Lookup
// ============================================================================

/// Name lookups over a scene, built once per export
pub struct SceneIndex<'a> {
    objects: HashMap<&'a str, &'a SceneObject>,
    children: HashMap<&'a str, Vec<&'a SceneObject>>,
    collections: HashMap<&'a str, &'a Collection>,
    meshes: HashMap<&'a str, &'a MeshData>,
    materials: HashMap<&'a str, &'a MaterialSource>,
    armatures: HashMap<&'a str, &'a ArmatureData>,
}

impl<'a> SceneIndex<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        let mut children: HashMap<&str, Vec<&SceneObject>> = HashMap::new();
        for object in &scene.objects {
            if let Some(parent) = object.parent.as_deref() {
                children.entry(parent).or_default().push(object);
            }
        }

        Self {
            objects: scene.objects.iter().map(|o| (o.name.as_str(), o)).collect(),
            children,
            collections: scene
                .collections
                .iter()
                .map(|c| (c.name.as_str(), c))
                .collect(),
            meshes: scene.meshes.iter().map(|m| (m.name.as_str(), m)).collect(),
            materials: scene
                .materials
                .iter()
                .map(|m| (m.name.as_str(), m))
                .collect(),
            armatures: scene
                .armatures
                .iter()
                .map(|a| (a.name.as_str(), a))
                .collect(),
        }
    }

    pub fn object(&self, name: &str, owner: &str) -> Result<&'a SceneObject> {
        self.objects
            .get(name)
            .copied()
            .ok_or_else(|| ExportError::missing("object", name, owner))
    }

    /// Direct children of an object, in scene order
    pub fn children(&self, name: &str) -> &[&'a SceneObject] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collection(&self, name: &str, owner: &str) -> Result<&'a Collection> {
        self.collections
            .get(name)
            .copied()
            .ok_or_else(|| ExportError::missing("collection", name, owner))
    }

    pub fn mesh(&self, name: &str, owner: &str) -> Result<&'a MeshData> {
        self.meshes
            .get(name)
            .copied()
            .ok_or_else(|| ExportError::missing("mesh", name, owner))
    }

    pub fn material(&self, name: &str, owner: &str) -> Result<&'a MaterialSource> {
        self.materials
            .get(name)
            .copied()
            .ok_or_else(|| ExportError::missing("material", name, owner))
    }

    pub fn armature(&self, name: &str, owner: &str) -> Result<&'a ArmatureData> {
        self.armatures
            .get(name)
            .copied()
            .ok_or_else(|| ExportError::missing("armature", name, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_scene() {
        let scene: Scene = serde_json::from_str(
            r#"{
                "collection": "Scene Collection",
                "collections": [{ "name": "Scene Collection", "objects": ["Cube", "Lamp"] }],
                "objects": [
                    {
                        "name": "Cube",
                        "kind": { "type": "MESH", "mesh": "Cube", "materialSlots": ["Mat", null] }
                    },
                    { "name": "Lamp", "kind": { "type": "LIGHT" } },
                    { "name": "Rig", "kind": { "type": "ARMATURE", "armature": "RigData" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scene.fps, 24.0);
        assert!(scene.world.use_nodes);
        let cube = &scene.objects[0];
        assert!(cube.selected);
        assert_eq!(cube.world_matrix(), Mat4::IDENTITY);
        match &cube.kind {
            ObjectKind::Mesh(mesh) => {
                assert_eq!(mesh.material_slots, vec![Some("Mat".to_string()), None]);
                assert!(mesh.evaluated_mesh.is_none());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(matches!(scene.objects[1].kind, ObjectKind::Unsupported));
        assert!(matches!(scene.objects[2].kind, ObjectKind::Armature(_)));
    }

    #[test]
    fn test_resolve_relative_image_paths() {
        let mut scene = Scene {
            materials: vec![MaterialSource {
                name: "Mat".to_string(),
                use_nodes: true,
                principled: Some(Principled {
                    base_color_texture: Some(ImageRef {
                        name: "wood".to_string(),
                        filepath: Some(PathBuf::from("textures/wood.png")),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            }],
            ..Default::default()
        };

        scene.resolve_image_paths(Path::new("/assets"));

        let image = scene.materials[0]
            .principled
            .as_ref()
            .and_then(|p| p.base_color_texture.as_ref())
            .unwrap();
        assert_eq!(
            image.filepath.as_deref(),
            Some(Path::new("/assets/textures/wood.png"))
        );
    }

    #[test]
    fn test_index_reports_missing_reference() {
        let scene = Scene::default();
        let index = SceneIndex::new(&scene);
        let err = index.mesh("Cube", "CubeObject").unwrap_err();
        assert_eq!(
            err.to_string(),
            "mesh 'Cube' referenced by 'CubeObject' does not exist"
        );
    }
}
