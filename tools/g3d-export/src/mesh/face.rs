//! Per-face vertex gathering and encoding
//!
//! A face is gathered once (corners plus their normalized bone weights), then
//! each corner is encoded into interleaved floats after the node part has
//! assigned indices to the face's bones.

use g3d_common::pack_color;

use super::layout::{SkinBinding, VertexLayout};
use crate::error::{ExportError, Result};
use crate::scene::{BoneData, MeshData, Polygon};

#[derive(Debug, Clone, Copy)]
pub struct BoneWeight<'a> {
    pub bone: &'a BoneData,
    pub weight: f32,
}

/// One face corner
#[derive(Debug, Clone)]
pub struct FaceVertex<'a> {
    pub vertex: usize,
    pub loop_index: usize,
    /// Valid bone influences, at most one per blend weight slot, normalized
    pub bones: Vec<BoneWeight<'a>>,
}

#[derive(Debug, Clone)]
pub struct Face<'a> {
    pub vertices: Vec<FaceVertex<'a>>,
    /// Distinct bones of all corners, in first-seen order
    pub bones: Vec<&'a BoneData>,
}

impl Face<'_> {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

pub fn build_face<'a>(
    mesh: &MeshData,
    polygon: &Polygon,
    layout: &VertexLayout,
    skin: Option<&SkinBinding<'a>>,
) -> Result<Face<'a>> {
    let mut face = Face {
        vertices: Vec::with_capacity(polygon.loop_total),
        bones: Vec::new(),
    };

    for loop_index in polygon.loops() {
        let corner = mesh
            .loops
            .get(loop_index)
            .ok_or_else(|| ExportError::missing("loop", &loop_index.to_string(), &mesh.name))?;
        let vertex = mesh.vertices.get(corner.vertex).ok_or_else(|| {
            ExportError::missing("vertex", &corner.vertex.to_string(), &mesh.name)
        })?;

        let mut bones: Vec<BoneWeight<'a>> = Vec::new();
        if let Some(skin) = skin {
            for group in &vertex.groups {
                if bones.len() == layout.blend_weights {
                    break;
                }
                let Some(bone) = skin.valid_bone(group) else {
                    continue;
                };
                if bones.iter().any(|b| b.bone.name == bone.name) {
                    continue;
                }
                bones.push(BoneWeight {
                    bone,
                    weight: group.weight,
                });
            }
            normalize_weights(&mut bones);
        }

        for weight in &bones {
            if !face.bones.iter().any(|b| b.name == weight.bone.name) {
                face.bones.push(weight.bone);
            }
        }

        face.vertices.push(FaceVertex {
            vertex: corner.vertex,
            loop_index,
            bones,
        });
    }

    Ok(face)
}

fn normalize_weights(bones: &mut [BoneWeight<'_>]) {
    let total: f32 = bones.iter().map(|b| b.weight).sum();
    for bone in bones {
        bone.weight = if total > 0.0 { bone.weight / total } else { 0.0 };
    }
}

impl FaceVertex<'_> {
    /// Interleaved floats in layout order. `bone_index` maps a bone name to its
    /// index in the node part.
    pub fn encode(
        &self,
        mesh: &MeshData,
        layout: &VertexLayout,
        bone_index: impl Fn(&str) -> Option<usize>,
    ) -> Result<Vec<f32>> {
        let mut data = Vec::with_capacity(layout.vertex_size());
        let vertex = &mesh.vertices[self.vertex];
        let corner = &mesh.loops[self.loop_index];

        data.extend_from_slice(&vertex.co);
        if layout.normal {
            data.extend_from_slice(&vertex.normal);
        }
        if layout.tangent {
            data.extend_from_slice(&corner.tangent);
        }
        if layout.binormal {
            data.extend_from_slice(&corner.bitangent);
        }

        if let Some(channel) = layout.color {
            let color = mesh
                .color_layers
                .get(channel.layer)
                .and_then(|layer| layer.data.get(self.loop_index))
                .copied()
                .unwrap_or([1.0; 4]);
            if channel.packed {
                data.push(pack_color(color));
            } else {
                data.extend_from_slice(&color);
            }
        }

        if let Some(channel) = layout.uv {
            let [u, v] = mesh
                .uv_layers
                .get(channel.layer)
                .and_then(|layer| layer.data.get(self.loop_index))
                .copied()
                .unwrap_or_default();
            data.push(u);
            data.push(if channel.flip { 1.0 - v } else { v });
        }

        if layout.blend_weights > 0 {
            if !self.bones.iter().any(|b| b.weight > 0.0) {
                return Err(ExportError::MissingWeights {
                    mesh: mesh.name.clone(),
                    vertex: self.vertex,
                });
            }
            for weight in &self.bones {
                let index = bone_index(&weight.bone.name)
                    .ok_or_else(|| ExportError::missing("bone", &weight.bone.name, &mesh.name))?;
                data.push(index as f32);
                data.push(weight.weight);
            }
            for _ in self.bones.len()..layout.blend_weights {
                data.extend_from_slice(&[0.0, 0.0]);
            }
        }

        debug_assert_eq!(data.len(), layout.vertex_size());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::layout::analyze_mesh;
    use crate::options::ExportOptions;
    use crate::scene::{ArmatureData, GroupWeight, MeshLoop, MeshVertex, UvLayer};
    use glam::Mat4;

    fn triangle() -> MeshData {
        MeshData {
            name: "tri".to_string(),
            vertices: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
                .iter()
                .map(|&co| MeshVertex {
                    co,
                    normal: [0.0, 0.0, 1.0],
                    groups: vec![],
                })
                .collect(),
            loops: (0..3)
                .map(|vertex| MeshLoop {
                    vertex,
                    ..Default::default()
                })
                .collect(),
            polygons: vec![Polygon {
                loop_start: 0,
                loop_total: 3,
                material_index: 0,
            }],
            uv_layers: vec![UvLayer {
                name: "uv".to_string(),
                active_render: true,
                data: vec![[0.0, 0.25], [1.0, 0.0], [0.0, 1.0]],
            }],
            ..Default::default()
        }
    }

    fn armature(names: &[&str]) -> ArmatureData {
        ArmatureData {
            name: "rig".to_string(),
            bones: names
                .iter()
                .map(|name| BoneData {
                    name: name.to_string(),
                    parent: None,
                    matrix_local: Mat4::IDENTITY.to_cols_array(),
                    length: 1.0,
                    deform: true,
                    rotation_mode: Default::default(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_encode_flips_uv() {
        let mesh = triangle();
        let options = ExportOptions {
            use_tangent: false,
            use_binormal: false,
            ..Default::default()
        };
        let layout = analyze_mesh(&mesh, &options, None);
        let face = build_face(&mesh, &mesh.polygons[0], &layout, None).unwrap();

        let data = face.vertices[0].encode(&mesh, &layout, |_| None).unwrap();
        assert_eq!(data, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.75]);
    }

    #[test]
    fn test_weights_are_normalized_and_padded() {
        let mut mesh = triangle();
        for vertex in &mut mesh.vertices {
            vertex.groups = vec![
                GroupWeight { group: 0, weight: 0.6 },
                GroupWeight { group: 1, weight: 0.2 },
            ];
        }
        mesh.vertices[2].groups.truncate(1);

        let rig = armature(&["a", "b"]);
        let groups = vec!["a".to_string(), "b".to_string()];
        let skin = SkinBinding::new(&groups, &rig, false);
        let options = ExportOptions {
            use_normal: false,
            use_tangent: false,
            use_binormal: false,
            use_uv: false,
            ..Default::default()
        };
        let layout = analyze_mesh(&mesh, &options, Some(&skin));
        assert_eq!(layout.blend_weights, 2);

        let face = build_face(&mesh, &mesh.polygons[0], &layout, Some(&skin)).unwrap();
        let face_bones: Vec<_> = face.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(face_bones, ["a", "b"]);

        let index = |name: &str| if name == "a" { Some(0) } else { Some(1) };
        let data = face.vertices[0].encode(&mesh, &layout, index).unwrap();
        assert_eq!(data.len(), 3 + 4);
        assert_eq!(data[3], 0.0);
        assert!((data[4] - 0.75).abs() < 1e-6);
        assert_eq!(data[5], 1.0);
        assert!((data[6] - 0.25).abs() < 1e-6);

        // Single influence: second slot padded with (0, 0)
        let data = face.vertices[2].encode(&mesh, &layout, index).unwrap();
        assert_eq!(&data[3..], &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unweighted_vertex_is_an_error() {
        let mut mesh = triangle();
        mesh.vertices[0].groups = vec![GroupWeight { group: 0, weight: 1.0 }];

        let rig = armature(&["a"]);
        let groups = vec!["a".to_string()];
        let skin = SkinBinding::new(&groups, &rig, false);
        let layout = analyze_mesh(&mesh, &ExportOptions::default(), Some(&skin));
        let face = build_face(&mesh, &mesh.polygons[0], &layout, Some(&skin)).unwrap();

        let err = face.vertices[1].encode(&mesh, &layout, |_| Some(0)).unwrap_err();
        assert!(matches!(err, ExportError::MissingWeights { vertex: 1, .. }));
    }
}
