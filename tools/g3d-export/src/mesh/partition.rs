//! Face partitioning
//!
//! Assigns every face of a mesh to a (mesh buffer, mesh part, node part) triple.
//! A node part is one draw call: a single material and at most
//! `max_bones_per_nodepart` bones. Faces go to the first node part that fits
//! (the last one used is tried first) and a new part, possibly in a new buffer,
//! is opened when none does.

use g3d_common::{BoneBinding, NodePart, PrimitiveType};
use hashbrown::HashMap;
use tracing::{debug, warn};

use super::buffer::MeshStore;
use super::face::{build_face, Face};
use super::layout::{SkinBinding, VertexLayout};
use crate::error::{ExportError, LimitKind, Result};
use crate::options::ExportOptions;
use crate::scene::{BoneData, MeshData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLimits {
    pub max_vertices: usize,
    pub max_indices: usize,
    pub max_bones: usize,
}

impl From<&ExportOptions> for PartitionLimits {
    fn from(options: &ExportOptions) -> Self {
        Self {
            max_vertices: options.max_vertices_per_mesh,
            max_indices: options.max_indices_per_meshpart,
            max_bones: options.max_bones_per_nodepart,
        }
    }
}

/// Everything the partitioner needs to know about one mesh
pub struct MeshSource<'a> {
    pub mesh: &'a MeshData,
    /// Material id per material slot; `None` for an empty slot
    pub materials: &'a [Option<String>],
    pub skin: Option<&'a SkinBinding<'a>>,
    pub layout: &'a VertexLayout,
    pub primitive: PrimitiveType,
}

/// Node parts produced for one mesh, shared by every node that uses it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshNodeData {
    pub parts: Vec<NodePart>,
}

struct NodePartBuilder {
    material_id: String,
    mesh_part_id: String,
    buffer: usize,
    part: usize,
    bones: Vec<BoneBinding>,
    bone_slots: HashMap<String, usize>,
}

impl NodePartBuilder {
    fn missing_bones(&self, bones: &[&BoneData]) -> usize {
        bones
            .iter()
            .filter(|bone| !self.bone_slots.contains_key(bone.name.as_str()))
            .count()
    }

    /// Add any new bones, each taking the next free index
    fn merge_bones(&mut self, bones: &[&BoneData]) {
        for bone in bones {
            if self.bone_slots.contains_key(bone.name.as_str()) {
                continue;
            }
            let index = self.bones.len();
            self.bone_slots.insert(bone.name.clone(), index);
            self.bones.push(BoneBinding {
                node: bone.name.clone(),
                transform: bone.rest_matrix(),
                index,
            });
        }
    }

    fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_slots.get(name).copied()
    }

    fn build(self) -> NodePart {
        let mut part = NodePart::new(self.material_id, self.mesh_part_id);
        part.bones = self.bones;
        part
    }
}

struct Partitioner<'s, 'a> {
    source: &'s MeshSource<'a>,
    limits: PartitionLimits,
    store: &'s mut MeshStore,
    parts: Vec<NodePartBuilder>,
    last_used: Option<usize>,
}

/// Index `name` will have in `part` once the face's bones are merged into it;
/// a fresh part (`None`) numbers the face's bones from zero
fn prospective_bone_index(
    part: Option<&NodePartBuilder>,
    face_bones: &[&BoneData],
    name: &str,
) -> Option<usize> {
    if let Some(index) = part.and_then(|part| part.bone_index(name)) {
        return Some(index);
    }
    let base = part.map_or(0, |part| part.bones.len());
    face_bones
        .iter()
        .filter(|bone| part.is_none_or(|part| part.bone_index(&bone.name).is_none()))
        .position(|bone| bone.name == name)
        .map(|offset| base + offset)
}

impl<'s, 'a> Partitioner<'s, 'a> {
    /// Encoded corners of `face` as they would be stored through `part`
    fn encode_face(
        &self,
        face: &Face<'_>,
        part: Option<&NodePartBuilder>,
    ) -> Result<Vec<Vec<f32>>> {
        let bone_index = |name: &str| prospective_bone_index(part, &face.bones, name);
        face.vertices
            .iter()
            .map(|corner| corner.encode(self.source.mesh, self.source.layout, &bone_index))
            .collect()
    }

    fn fits(&self, part: &NodePartBuilder, material_id: &str, face: &Face<'_>) -> Result<bool> {
        if part.material_id != material_id {
            return Ok(false);
        }
        if !face.bones.is_empty()
            && part.bones.len() + part.missing_bones(&face.bones) > self.limits.max_bones
        {
            return Ok(false);
        }
        let buffer = self.store.buffer(part.buffer);
        if buffer.part(part.part).indices.len() + face.len() > self.limits.max_indices {
            return Ok(false);
        }
        if buffer.vertex_count() + face.len() <= self.limits.max_vertices {
            return Ok(true);
        }
        // Corners the buffer already holds take no new slot
        let vertices = self.encode_face(face, Some(part))?;
        Ok(buffer.vertex_count() + buffer.new_vertex_count(&vertices) <= self.limits.max_vertices)
    }

    fn select_node_part(&mut self, material_id: &str, face: &Face<'_>) -> Result<usize> {
        if let Some(last) = self.last_used {
            if self.fits(&self.parts[last], material_id, face)? {
                return Ok(last);
            }
        }
        for (index, part) in self.parts.iter().enumerate() {
            if self.fits(part, material_id, face)? {
                return Ok(index);
            }
        }

        let vertices = self.encode_face(face, None)?;
        let buffer = self.store.buffer_with_headroom(
            &self.source.layout.flags,
            &vertices,
            self.limits.max_vertices,
        );
        let mesh_part_id = self.store.next_part_id(&self.source.mesh.name);
        let part = self.store.buffer_mut(buffer).add_part(g3d_common::MeshPart::new(
            mesh_part_id.clone(),
            self.source.primitive,
        ));

        debug!(
            "{}: node part {} -> mesh part {} in buffer {}",
            self.source.mesh.name,
            self.parts.len(),
            mesh_part_id,
            buffer
        );
        self.parts.push(NodePartBuilder {
            material_id: material_id.to_string(),
            mesh_part_id,
            buffer,
            part,
            bones: Vec::new(),
            bone_slots: HashMap::new(),
        });
        Ok(self.parts.len() - 1)
    }

    fn add_face(&mut self, material_id: &str, face: &Face<'_>) -> Result<()> {
        let chosen = self.select_node_part(material_id, face)?;
        self.last_used = Some(chosen);

        let mesh = self.source.mesh;
        let node_part = &mut self.parts[chosen];
        node_part.merge_bones(&face.bones);
        if node_part.bones.len() > self.limits.max_bones {
            return Err(ExportError::NodePartBones {
                mesh: mesh.name.clone(),
                actual: node_part.bones.len(),
                max: self.limits.max_bones,
            });
        }

        let node_part = &self.parts[chosen];
        let vertices = self.encode_face(face, Some(node_part))?;
        let buffer = self.store.buffer_mut(node_part.buffer);
        for vertex in &vertices {
            let index = buffer.add_or_reuse(vertex);
            buffer.part_mut(node_part.part).indices.push(index);
        }

        let vertices = buffer.vertex_count();
        if vertices > self.limits.max_vertices {
            return Err(ExportError::LimitExceeded {
                mesh: mesh.name.clone(),
                limit: LimitKind::VerticesPerMesh,
                actual: vertices,
                max: self.limits.max_vertices,
            });
        }
        let indices = buffer.part(node_part.part).indices.len();
        if indices > self.limits.max_indices {
            return Err(ExportError::LimitExceeded {
                mesh: mesh.name.clone(),
                limit: LimitKind::IndicesPerMeshPart,
                actual: indices,
                max: self.limits.max_indices,
            });
        }
        Ok(())
    }
}

/// Partition every face of `source` into `store`
pub fn partition_mesh(
    source: &MeshSource<'_>,
    limits: PartitionLimits,
    store: &mut MeshStore,
) -> Result<MeshNodeData> {
    let mesh = source.mesh;
    let mut partitioner = Partitioner {
        source,
        limits,
        store,
        parts: Vec::new(),
        last_used: None,
    };

    for polygon in &mesh.polygons {
        let Some(material_id) = source
            .materials
            .get(polygon.material_index)
            .and_then(Option::as_deref)
        else {
            warn!(
                "Face of {} uses empty material slot {}, skipped",
                mesh.name, polygon.material_index
            );
            continue;
        };

        let face = build_face(mesh, polygon, source.layout, source.skin)?;
        partitioner.add_face(material_id, &face)?;
    }

    Ok(MeshNodeData {
        parts: partitioner
            .parts
            .into_iter()
            .map(NodePartBuilder::build)
            .collect(),
    })
}
