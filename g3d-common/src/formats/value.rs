//! Generic document tree shared by both encoders
//!
//! The model graph is lowered into [`Value`]s once; the text and binary encoders
//! only walk this tree. Objects keep insertion order so every document lists its
//! fields in the same order.

use glam::{Quat, Vec3};

use crate::model::{
    AnimationTrack, BoneAnimation, BoneBinding, Keyframe, Material, MeshBuffer, MeshPart, Model,
    Node, NodePart, Texture,
};

/// Indices per line in the text encoding of a mesh part
pub const INDICES_PER_ROW: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f32),
    Str(String),
    Array(Vec<Value>),
    /// Array that the text encoder breaks into lines of `row_len` items
    Rows { items: Vec<Value>, row_len: usize },
    Object(Vec<(&'static str, Value)>),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    pub fn floats(values: &[f32]) -> Self {
        Value::Array(values.iter().copied().map(Value::Float).collect())
    }

    pub fn array<T: ToValue>(items: &[T]) -> Self {
        Value::Array(items.iter().map(ToValue::to_value).collect())
    }

    /// Look up an object field by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Lowering into the document tree
pub trait ToValue {
    fn to_value(&self) -> Value;
}

fn vec3(v: Vec3) -> Value {
    Value::floats(&v.to_array())
}

/// Quaternions are written x, y, z, w
fn quat(q: Quat) -> Value {
    Value::floats(&q.to_array())
}

// ============================================================================
// Model graph
// ============================================================================

impl ToValue for Model {
    fn to_value(&self) -> Value {
        Value::Object(vec![
            (
                "version",
                Value::Array(self.version.iter().map(|&v| Value::Int(v.into())).collect()),
            ),
            ("id", Value::str(&self.id)),
            ("meshes", Value::array(&self.meshes)),
            ("materials", Value::array(&self.materials)),
            ("nodes", Value::array(&self.nodes)),
            ("animations", Value::array(&self.animations)),
        ])
    }
}

impl ToValue for MeshBuffer {
    fn to_value(&self) -> Value {
        let attributes = self
            .attributes
            .iter()
            .map(|flag| Value::str(&flag.name))
            .collect();
        Value::Object(vec![
            ("attributes", Value::Array(attributes)),
            (
                "vertices",
                Value::Rows {
                    items: self.vertices.iter().copied().map(Value::Float).collect(),
                    row_len: self.vertex_size(),
                },
            ),
            ("parts", Value::array(&self.parts)),
        ])
    }
}

impl ToValue for MeshPart {
    fn to_value(&self) -> Value {
        Value::Object(vec![
            ("id", Value::str(&self.id)),
            ("type", Value::str(self.primitive.as_str())),
            (
                "indices",
                Value::Rows {
                    items: self.indices.iter().map(|&i| Value::Int(i.into())).collect(),
                    row_len: INDICES_PER_ROW,
                },
            ),
        ])
    }
}

impl ToValue for Material {
    fn to_value(&self) -> Value {
        let attrs = &self.attributes;
        let mut fields = vec![("id", Value::str(&self.id))];

        if let Some(opacity) = attrs.opacity {
            fields.push(("opacity", Value::Float(opacity)));
        }
        if let Some(diffuse) = attrs.diffuse {
            fields.push(("diffuse", Value::floats(&diffuse)));
        }
        if let Some(emissive) = attrs.emissive {
            fields.push(("emissive", Value::floats(&emissive)));
        }
        if let Some(shininess) = attrs.shininess {
            fields.push(("shininess", Value::Float(shininess)));
        }
        if let Some(specular) = attrs.specular {
            fields.push(("specular", Value::floats(&specular)));
        }
        if let Some(reflection) = attrs.reflection {
            fields.push(("reflection", Value::floats(&reflection)));
        }
        if let Some(ambient) = attrs.ambient {
            fields.push(("ambient", Value::floats(&ambient)));
        }
        fields.push(("textures", Value::array(&self.textures)));

        Value::Object(fields)
    }
}

impl ToValue for Texture {
    fn to_value(&self) -> Value {
        Value::Object(vec![
            ("id", Value::str(&self.id)),
            ("filename", Value::str(&self.filename)),
            ("type", Value::str(self.texture_type.as_str())),
        ])
    }
}

impl ToValue for Node {
    fn to_value(&self) -> Value {
        let mut fields = vec![
            ("id", Value::str(&self.id)),
            ("rotation", quat(self.rotation)),
            ("scale", vec3(self.scale)),
            ("translation", vec3(self.translation)),
            ("parts", Value::array(&self.parts)),
        ];
        if !self.children.is_empty() {
            fields.push(("children", Value::array(&self.children)));
        }
        Value::Object(fields)
    }
}

impl ToValue for NodePart {
    fn to_value(&self) -> Value {
        let mut fields = vec![
            ("meshpartid", Value::str(&self.mesh_part_id)),
            ("materialid", Value::str(&self.material_id)),
        ];
        if !self.bones.is_empty() {
            fields.push(("bones", Value::array(&self.bones)));
        }
        let uv_mapping = self
            .uv_mapping
            .iter()
            .map(|mapping| Value::Array(mapping.iter().map(|&i| Value::Int(i.into())).collect()))
            .collect();
        fields.push(("uvMapping", Value::Array(uv_mapping)));
        Value::Object(fields)
    }
}

impl ToValue for BoneBinding {
    /// Bind pose decomposed from the rest matrix; vectors carry a trailing 0
    fn to_value(&self) -> Value {
        let (scale, rotation, translation) = self.transform.to_scale_rotation_translation();
        Value::Object(vec![
            ("node", Value::str(&self.node)),
            ("translation", Value::floats(&translation.extend(0.0).to_array())),
            ("rotation", quat(rotation)),
            ("scale", Value::floats(&scale.extend(0.0).to_array())),
        ])
    }
}

impl ToValue for AnimationTrack {
    fn to_value(&self) -> Value {
        Value::Object(vec![
            ("id", Value::str(&self.id)),
            ("bones", Value::array(&self.bones)),
        ])
    }
}

impl ToValue for BoneAnimation {
    fn to_value(&self) -> Value {
        Value::Object(vec![
            ("boneId", Value::str(&self.bone_id)),
            ("keyframes", Value::array(&self.keyframes)),
        ])
    }
}

impl ToValue for Keyframe {
    fn to_value(&self) -> Value {
        Value::Object(vec![
            ("keytime", Value::Float(self.time_millis)),
            ("rotation", quat(self.rotation)),
            ("translation", vec3(self.translation)),
            ("scale", vec3(self.scale)),
        ])
    }
}
