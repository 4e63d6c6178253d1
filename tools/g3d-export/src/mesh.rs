//! Mesh conversion
//!
//! Turns evaluated scene meshes into deduplicated G3D mesh buffers:
//! - [`layout`] - which vertex attributes a mesh exports
//! - [`face`] - per-face corner gathering and vertex encoding
//! - [`buffer`] - hash-based vertex deduplication and buffer bookkeeping
//! - [`partition`] - face to (buffer, mesh part, node part) allocation

pub mod buffer;
pub mod face;
pub mod layout;
pub mod partition;

pub use buffer::{MeshBufferBuilder, MeshStore};
pub use face::{build_face, BoneWeight, Face, FaceVertex};
pub use layout::{analyze_mesh, blend_weight_slots, SkinBinding, VertexLayout};
pub use partition::{partition_mesh, MeshNodeData, MeshSource, PartitionLimits};
