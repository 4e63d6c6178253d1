//! G3D model graph
//!
//! The in-memory form of a runtime model: deduplicated mesh buffers split into
//! parts, materials with optional textures, a node hierarchy whose node parts bind
//! mesh parts to materials (and bones), and baked skeletal animations.
//!
//! Everything here is plain owned data. The export tool builds it, the encoders in
//! [`crate::formats`] serialize it.

use std::path::PathBuf;

use glam::{Mat4, Quat, Vec3};

/// Model format version written into every document
pub const MODEL_VERSION: [u16; 2] = [0, 1];

// ============================================================================
// Vertex Layout
// ============================================================================

/// One vertex attribute: its runtime name and float component count
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFlag {
    pub name: String,
    pub component_count: usize,
}

impl VertexFlag {
    pub fn new(name: impl Into<String>, component_count: usize) -> Self {
        Self {
            name: name.into(),
            component_count,
        }
    }

    pub fn position() -> Self {
        Self::new("POSITION", 3)
    }

    pub fn normal() -> Self {
        Self::new("NORMAL", 3)
    }

    pub fn tangent() -> Self {
        Self::new("TANGENT", 3)
    }

    pub fn binormal() -> Self {
        Self::new("BINORMAL", 3)
    }

    pub fn color() -> Self {
        Self::new("COLOR", 4)
    }

    pub fn color_packed() -> Self {
        Self::new("COLORPACKED", 1)
    }

    pub fn texcoord(layer: usize) -> Self {
        Self::new(format!("TEXCOORD{layer}"), 2)
    }

    /// Bone index + weight pair for influence slot `slot`
    pub fn blend_weight(slot: usize) -> Self {
        Self::new(format!("BLENDWEIGHT{slot}"), 2)
    }
}

/// Floats per vertex for a layout
pub fn vertex_size(flags: &[VertexFlag]) -> usize {
    flags.iter().map(|flag| flag.component_count).sum()
}

/// How a mesh part's indices are assembled into primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Triangles,
    Lines,
    Points,
    TriangleStrip,
    LineStrip,
}

impl PrimitiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::Triangles => "TRIANGLES",
            PrimitiveType::Lines => "LINES",
            PrimitiveType::Points => "POINTS",
            PrimitiveType::TriangleStrip => "TRIANGLE_STRIP",
            PrimitiveType::LineStrip => "LINE_STRIP",
        }
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// A contiguous range of indices into a [`MeshBuffer`]
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    pub id: String,
    pub primitive: PrimitiveType,
    pub indices: Vec<u32>,
}

impl MeshPart {
    pub fn new(id: impl Into<String>, primitive: PrimitiveType) -> Self {
        Self {
            id: id.into(),
            primitive,
            indices: Vec::new(),
        }
    }
}

/// Interleaved vertex data sharing one attribute layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshBuffer {
    pub attributes: Vec<VertexFlag>,
    pub vertices: Vec<f32>,
    pub parts: Vec<MeshPart>,
}

impl MeshBuffer {
    pub fn new(attributes: Vec<VertexFlag>) -> Self {
        Self {
            attributes,
            vertices: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn vertex_size(&self) -> usize {
        vertex_size(&self.attributes)
    }

    pub fn vertex_count(&self) -> usize {
        match self.vertex_size() {
            0 => 0,
            size => self.vertices.len() / size,
        }
    }

    /// The `index`-th vertex as a slice of `vertex_size` floats
    pub fn vertex(&self, index: usize) -> Option<&[f32]> {
        let size = self.vertex_size();
        self.vertices.get(index * size..(index + 1) * size)
    }
}

// ============================================================================
// Materials
// ============================================================================

/// Texture role inside a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Diffuse,
    Emissive,
    Shininess,
    Specular,
    Reflection,
    Transparency,
    Normal,
}

impl TextureType {
    pub fn as_str(self) -> &'static str {
        match self {
            TextureType::Diffuse => "DIFFUSE",
            TextureType::Emissive => "EMISSIVE",
            TextureType::Shininess => "SHININESS",
            TextureType::Specular => "SPECULAR",
            TextureType::Reflection => "REFLECTION",
            TextureType::Transparency => "TRANSPARENCY",
            TextureType::Normal => "NORMAL",
        }
    }
}

/// Where a texture's pixels come from (used for copying, never serialized)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureSource {
    /// Absolute path of the source image file
    pub path: Option<PathBuf>,
    /// Embedded image bytes, preferred over `path` when present
    pub packed: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: String,
    pub texture_type: TextureType,
    /// File name relative to the model (basename unless textures are copied)
    pub filename: String,
    pub source: TextureSource,
}

/// Scalar and color attributes; `None` means "not written"
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialAttributes {
    pub diffuse: Option<[f32; 3]>,
    pub ambient: Option<[f32; 3]>,
    pub emissive: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    pub opacity: Option<f32>,
    pub shininess: Option<f32>,
    pub reflection: Option<[f32; 3]>,
}

impl MaterialAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: String,
    pub attributes: MaterialAttributes,
    pub textures: Vec<Texture>,
}

impl Material {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: MaterialAttributes::default(),
            textures: Vec::new(),
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Bone referenced by a node part, with its bind transform
#[derive(Debug, Clone, PartialEq)]
pub struct BoneBinding {
    /// Node id of the bone
    pub node: String,
    /// Armature-space rest matrix
    pub transform: Mat4,
    /// Position inside the node part's bone list (the vertex bone index)
    pub index: usize,
}

/// Binds one mesh part to one material inside a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodePart {
    pub material_id: String,
    pub mesh_part_id: String,
    pub bones: Vec<BoneBinding>,
    pub uv_mapping: Vec<Vec<u32>>,
}

impl NodePart {
    pub fn new(material_id: impl Into<String>, mesh_part_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            mesh_part_id: mesh_part_id.into(),
            bones: Vec::new(),
            uv_mapping: vec![Vec::new()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub parts: Vec<NodePart>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parts: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Node with the local transform decomposed from `matrix`
    pub fn from_matrix(id: impl Into<String>, matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
            ..Self::new(id)
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Depth-first search for a node by id, including `self`
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, including `self`
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }
}

// ============================================================================
// Animations
// ============================================================================

/// A sampled local transform at one point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time_millis: f32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Keyframe {
    pub fn from_matrix(time_millis: f32, matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            time_millis,
            translation,
            rotation,
            scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneAnimation {
    pub bone_id: String,
    pub keyframes: Vec<Keyframe>,
}

/// One baked action for one armature
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub id: String,
    pub bones: Vec<BoneAnimation>,
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub version: [u16; 2],
    pub id: String,
    pub meshes: Vec<MeshBuffer>,
    pub materials: Vec<Material>,
    pub nodes: Vec<Node>,
    pub animations: Vec<AnimationTrack>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            version: MODEL_VERSION,
            id: String::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            nodes: Vec::new(),
            animations: Vec::new(),
        }
    }
}

impl Model {
    /// Depth-first search across all root nodes
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find_map(|node| node.find(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(Node::subtree_len).sum()
    }

    pub fn material(&self, id: &str) -> Option<&Material> {
        self.materials.iter().find(|material| material.id == id)
    }

    /// Every texture of every material, in material order
    pub fn textures(&self) -> impl Iterator<Item = &Texture> + '_ {
        self.materials.iter().flat_map(|material| material.textures.iter())
    }
}
