//! Shared types and utilities for the G3D runtime model format
//!
//! This crate provides the in-memory model graph and its encoders, shared between:
//! - `g3d-export` (scene conversion pipeline)
//! - tooling that inspects or post-processes exported models
//!
//! # Modules
//!
//! - [`model`] - Model graph (meshes, materials, nodes, animations)
//! - [`packing`] - Vertex attribute bit-level helpers (packed colors, vertex hashing)
//! - [`formats`] - `.g3dj` (indented JSON) and `.g3db` (UBJSON) encoders

pub mod formats;
pub mod model;
pub mod packing;

// Re-export the model graph
pub use model::{
    AnimationTrack, BoneAnimation, BoneBinding, Keyframe, Material, MaterialAttributes, MeshBuffer,
    MeshPart, Model, Node, NodePart, PrimitiveType, Texture, TextureSource, TextureType,
    VertexFlag, MODEL_VERSION, vertex_size,
};

// Re-export commonly used packing items
pub use packing::{
    bits_to_float, float_bits, flags_equal, hash_flags, hash_vertex, pack_color,
    PACKED_COLOR_MASK,
};

// Re-export encoders
pub use formats::{encode_binary, encode_text, ToValue, Value};
