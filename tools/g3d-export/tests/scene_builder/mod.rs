//! Programmatic scene generation for integration tests.
//!
//! Builds scene descriptions in memory (or as JSON on disk) with:
//! - meshes made of disjoint or shared triangles
//! - one default material
//! - armatures with optional vertex-group skinning
//! - keyframed location actions

#![allow(dead_code)]

use std::path::Path;

use glam::{Mat4, Vec3};

use g3d_export::scene::{
    Action, ActionGroup, ArmatureData, ArmatureObject, BoneData, Collection, EmptyObject, FCurve,
    GroupWeight, Interpolation, KeyframePoint, MaterialSource, MeshData, MeshLoop, MeshObject,
    MeshVertex, ObjectKind, Polygon, Principled, Scene, SceneObject, UvLayer,
};

pub const ROOT_COLLECTION: &str = "Scene Collection";
pub const MATERIAL: &str = "Material";

pub struct SceneBuilder {
    scene: Scene,
}

impl SceneBuilder {
    /// Empty scene with a root collection and one principled material
    pub fn new() -> Self {
        Self {
            scene: Scene {
                name: "test_scene".to_string(),
                fps: 24.0,
                collection: ROOT_COLLECTION.to_string(),
                collections: vec![Collection {
                    name: ROOT_COLLECTION.to_string(),
                    ..Default::default()
                }],
                materials: vec![MaterialSource {
                    name: MATERIAL.to_string(),
                    use_nodes: true,
                    principled: Some(Principled::default()),
                }],
                ..Default::default()
            },
        }
    }

    pub fn fps(mut self, fps: f32) -> Self {
        self.scene.fps = fps;
        self
    }

    pub fn mesh(mut self, mesh: MeshData) -> Self {
        self.scene.meshes.push(mesh);
        self
    }

    pub fn material(mut self, material: MaterialSource) -> Self {
        self.scene.materials.push(material);
        self
    }

    /// Add an object to the root collection
    pub fn object(self, object: SceneObject) -> Self {
        self.object_in(ROOT_COLLECTION, object)
    }

    pub fn object_in(mut self, collection: &str, object: SceneObject) -> Self {
        if let Some(c) = self
            .scene
            .collections
            .iter_mut()
            .find(|c| c.name == collection)
        {
            c.objects.push(object.name.clone());
        }
        self.scene.objects.push(object);
        self
    }

    /// Add a collection as a child of the root collection
    pub fn collection(mut self, collection: Collection) -> Self {
        self.scene.collections[0].children.push(collection.name.clone());
        self.scene.collections.push(collection);
        self
    }

    pub fn armature(mut self, armature: ArmatureData) -> Self {
        self.scene.armatures.push(armature);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.scene.actions.push(action);
        self
    }

    pub fn build(self) -> Scene {
        self.scene
    }

    pub fn write(self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.scene)?;
        std::fs::write(path, json)
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// Mesh from positions and triangle corner indices, with a flat +Z normal and a UV layer
pub fn mesh_from(name: &str, positions: &[[f32; 3]], triangles: &[[usize; 3]]) -> MeshData {
    let vertices = positions
        .iter()
        .map(|&co| MeshVertex {
            co,
            normal: [0.0, 0.0, 1.0],
            groups: vec![],
        })
        .collect();

    let mut loops = Vec::new();
    let mut polygons = Vec::new();
    let mut uvs = Vec::new();
    for triangle in triangles {
        polygons.push(Polygon {
            loop_start: loops.len(),
            loop_total: 3,
            material_index: 0,
        });
        for &vertex in triangle {
            loops.push(MeshLoop {
                vertex,
                tangent: [1.0, 0.0, 0.0],
                bitangent: [0.0, 1.0, 0.0],
            });
            let [x, y, _] = positions[vertex];
            uvs.push([x, y]);
        }
    }

    MeshData {
        name: name.to_string(),
        vertices,
        loops,
        polygons,
        uv_layers: vec![UvLayer {
            name: "UVMap".to_string(),
            active_render: true,
            data: uvs,
        }],
        color_layers: vec![],
    }
}

pub fn triangle(name: &str) -> MeshData {
    mesh_from(
        name,
        &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        &[[0, 1, 2]],
    )
}

/// `count` triangles sharing no vertices
pub fn disjoint_triangles(name: &str, count: usize) -> MeshData {
    let positions: Vec<[f32; 3]> = (0..count * 3)
        .map(|i| [i as f32, (i % 3) as f32, 0.0])
        .collect();
    let triangles: Vec<[usize; 3]> = (0..count).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]).collect();
    mesh_from(name, &positions, &triangles)
}

/// Weight every vertex fully to one vertex group
pub fn weight_vertices(mesh: &mut MeshData, groups: &[usize]) {
    for (vertex, &group) in mesh.vertices.iter_mut().zip(groups) {
        vertex.groups = vec![GroupWeight { group, weight: 1.0 }];
    }
}

// ============================================================================
// Objects
// ============================================================================

pub fn object(name: &str, kind: ObjectKind) -> SceneObject {
    SceneObject {
        name: name.to_string(),
        parent: None,
        matrix_world: Mat4::IDENTITY.to_cols_array(),
        hide_viewport: false,
        selected: true,
        display_type: Default::default(),
        kind,
    }
}

pub fn mesh_object(name: &str, mesh: &str) -> SceneObject {
    object(
        name,
        ObjectKind::Mesh(MeshObject {
            mesh: mesh.to_string(),
            material_slots: vec![Some(MATERIAL.to_string())],
            ..Default::default()
        }),
    )
}

pub fn skinned_object(name: &str, mesh: &str, armature: &str, groups: &[&str]) -> SceneObject {
    let mut object = mesh_object(name, mesh);
    if let ObjectKind::Mesh(data) = &mut object.kind {
        data.armature = Some(armature.to_string());
        data.vertex_groups = groups.iter().map(|g| g.to_string()).collect();
    }
    object
}

pub fn armature_object(name: &str, armature: &str) -> SceneObject {
    object(
        name,
        ObjectKind::Armature(ArmatureObject {
            armature: armature.to_string(),
        }),
    )
}

pub fn instance_object(name: &str, collection: &str) -> SceneObject {
    object(
        name,
        ObjectKind::Empty(EmptyObject {
            instance_collection: Some(collection.to_string()),
        }),
    )
}

pub fn at(mut object: SceneObject, translation: Vec3) -> SceneObject {
    object.matrix_world = Mat4::from_translation(translation).to_cols_array();
    object
}

pub fn child_of(mut object: SceneObject, parent: &str) -> SceneObject {
    object.parent = Some(parent.to_string());
    object
}

// ============================================================================
// Armatures and actions
// ============================================================================

pub fn bone(name: &str, parent: Option<&str>, head: Vec3, deform: bool) -> BoneData {
    BoneData {
        name: name.to_string(),
        parent: parent.map(str::to_string),
        matrix_local: Mat4::from_translation(head).to_cols_array(),
        length: 1.0,
        deform,
        rotation_mode: Default::default(),
    }
}

/// Flat armature of `count` deforming bones named `Bone0`, `Bone1`, ...
pub fn flat_armature(name: &str, count: usize) -> ArmatureData {
    ArmatureData {
        name: name.to_string(),
        bones: (0..count)
            .map(|i| bone(&format!("Bone{i}"), None, Vec3::new(i as f32, 0.0, 0.0), true))
            .collect(),
    }
}

/// Location X curve on `bone` with one key per `(frame, value)`
pub fn location_action(
    name: &str,
    bone: &str,
    keys: &[(f32, f32)],
    interpolation: Interpolation,
) -> Action {
    Action {
        name: name.to_string(),
        users: 1,
        groups: vec![ActionGroup {
            name: bone.to_string(),
            channels: vec![FCurve {
                data_path: format!("pose.bones[\"{bone}\"].location"),
                array_index: 0,
                keyframes: keys
                    .iter()
                    .map(|&(frame, value)| KeyframePoint {
                        co: [frame, value],
                        interpolation,
                        handle_left: None,
                        handle_right: None,
                    })
                    .collect(),
            }],
        }],
    }
}
