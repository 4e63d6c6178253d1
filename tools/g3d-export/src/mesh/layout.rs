//! Vertex layout analysis
//!
//! Decides which attributes a mesh exports, in a fixed order:
//! POSITION, NORMAL, TANGENT, BINORMAL, COLOR or COLORPACKED, TEXCOORD0,
//! then one BLENDWEIGHT slot per bone influence.

use g3d_common::VertexFlag;
use hashbrown::{HashMap, HashSet};

use crate::options::ExportOptions;
use crate::scene::{ArmatureData, BoneData, GroupWeight, MeshData};

/// Maps a skinned object's vertex groups onto its armature's bones
#[derive(Debug)]
pub struct SkinBinding<'a> {
    group_names: &'a [String],
    bones: HashMap<&'a str, &'a BoneData>,
}

impl<'a> SkinBinding<'a> {
    /// With `deform_only`, groups of non-deforming bones are ignored
    pub fn new(group_names: &'a [String], armature: &'a ArmatureData, deform_only: bool) -> Self {
        let bones = armature
            .bones
            .iter()
            .filter(|bone| bone.deform || !deform_only)
            .map(|bone| (bone.name.as_str(), bone))
            .collect();
        Self { group_names, bones }
    }

    /// The bone a group weight refers to, if the weight is positive and the group is a bone
    pub fn valid_bone(&self, element: &GroupWeight) -> Option<&'a BoneData> {
        if !(element.weight > 0.0) {
            return None;
        }
        let name = self.group_names.get(element.group)?;
        self.bones.get(name.as_str()).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorChannel {
    pub layer: usize,
    pub packed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UvChannel {
    pub layer: usize,
    pub flip: bool,
}

/// Attributes a mesh exports, and where each one reads from
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    pub flags: Vec<VertexFlag>,
    pub normal: bool,
    pub tangent: bool,
    pub binormal: bool,
    pub color: Option<ColorChannel>,
    pub uv: Option<UvChannel>,
    /// Number of (bone index, weight) slots per vertex
    pub blend_weights: usize,
}

impl VertexLayout {
    pub fn vertex_size(&self) -> usize {
        g3d_common::vertex_size(&self.flags)
    }
}

pub fn analyze_mesh(
    mesh: &MeshData,
    options: &ExportOptions,
    skin: Option<&SkinBinding<'_>>,
) -> VertexLayout {
    let mut flags = vec![VertexFlag::position()];

    if options.use_normal {
        flags.push(VertexFlag::normal());
    }
    if options.use_tangent {
        flags.push(VertexFlag::tangent());
    }
    if options.use_binormal {
        flags.push(VertexFlag::binormal());
    }

    let color = if options.use_color {
        active_layer(mesh.color_layers.iter().map(|l| l.active_render)).map(|layer| ColorChannel {
            layer,
            packed: options.packed_color,
        })
    } else {
        None
    };
    match color {
        Some(ColorChannel { packed: true, .. }) => flags.push(VertexFlag::color_packed()),
        Some(_) => flags.push(VertexFlag::color()),
        None => {}
    }

    let uv = if options.use_uv {
        active_layer(mesh.uv_layers.iter().map(|l| l.active_render)).map(|layer| UvChannel {
            layer,
            flip: options.flip_uv,
        })
    } else {
        None
    };
    if uv.is_some() {
        flags.push(VertexFlag::texcoord(0));
    }

    let blend_weights = skin
        .map(|skin| blend_weight_slots(mesh, skin, options.bones_per_vertex))
        .unwrap_or(0);
    flags.extend((0..blend_weights).map(VertexFlag::blend_weight));

    tracing::debug!(
        "Layout of {}: {} attributes, {} blend weights",
        mesh.name,
        flags.len(),
        blend_weights
    );

    VertexLayout {
        flags,
        normal: options.use_normal,
        tangent: options.use_tangent,
        binormal: options.use_binormal,
        color,
        uv,
        blend_weights,
    }
}

/// Largest number of distinct valid bones on any single vertex, capped at `limit`
pub fn blend_weight_slots(mesh: &MeshData, skin: &SkinBinding<'_>, limit: usize) -> usize {
    let mut slots = 0;
    let mut bones = HashSet::new();
    for vertex in &mesh.vertices {
        bones.clear();
        bones.extend(
            vertex
                .groups
                .iter()
                .filter_map(|group| skin.valid_bone(group))
                .map(|bone| bone.name.as_str()),
        );
        slots = slots.max(bones.len().min(limit));
        if slots == limit {
            break;
        }
    }
    slots
}

/// The render-active layer, else the first one
fn active_layer(active: impl Iterator<Item = bool>) -> Option<usize> {
    let mut first = None;
    for (index, is_active) in active.enumerate() {
        if is_active {
            return Some(index);
        }
        first.get_or_insert(index);
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ColorLayer, MeshVertex, UvLayer};

    fn bone(name: &str, deform: bool) -> BoneData {
        BoneData {
            name: name.to_string(),
            parent: None,
            matrix_local: glam::Mat4::IDENTITY.to_cols_array(),
            length: 1.0,
            deform,
            rotation_mode: Default::default(),
        }
    }

    fn weighted(groups: &[(usize, f32)]) -> MeshVertex {
        MeshVertex {
            co: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            groups: groups
                .iter()
                .map(|&(group, weight)| GroupWeight { group, weight })
                .collect(),
        }
    }

    fn names(layout: &VertexLayout) -> Vec<&str> {
        layout.flags.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_default_layout_order() {
        let mesh = MeshData {
            name: "m".to_string(),
            uv_layers: vec![UvLayer {
                name: "uv".to_string(),
                active_render: true,
                data: vec![],
            }],
            color_layers: vec![ColorLayer {
                name: "col".to_string(),
                active_render: false,
                data: vec![],
            }],
            ..Default::default()
        };

        let layout = analyze_mesh(&mesh, &ExportOptions::default(), None);
        assert_eq!(
            names(&layout),
            ["POSITION", "NORMAL", "TANGENT", "BINORMAL", "COLORPACKED", "TEXCOORD0"]
        );
        assert_eq!(layout.vertex_size(), 3 + 3 + 3 + 3 + 1 + 2);
        // No render-active color layer: falls back to the first
        assert_eq!(layout.color.map(|c| c.layer), Some(0));
    }

    #[test]
    fn test_disabled_attributes() {
        let options = ExportOptions {
            use_normal: false,
            use_tangent: false,
            use_binormal: false,
            packed_color: false,
            ..Default::default()
        };
        let mesh = MeshData {
            color_layers: vec![ColorLayer::default()],
            ..Default::default()
        };

        let layout = analyze_mesh(&mesh, &options, None);
        assert_eq!(names(&layout), ["POSITION", "COLOR"]);
        assert_eq!(layout.uv, None);
    }

    #[test]
    fn test_blend_weight_slots() {
        let armature = ArmatureData {
            name: "rig".to_string(),
            bones: vec![bone("a", true), bone("b", true), bone("c", false)],
        };
        let groups = vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "not_a_bone".to_string(),
        ];
        let mesh = MeshData {
            vertices: vec![
                weighted(&[(0, 1.0)]),
                weighted(&[(0, 0.5), (1, 0.5), (3, 1.0)]),
                weighted(&[(2, 1.0), (1, 0.0)]),
            ],
            ..Default::default()
        };

        let skin = SkinBinding::new(&groups, &armature, false);
        assert_eq!(blend_weight_slots(&mesh, &skin, 4), 2);
        assert_eq!(blend_weight_slots(&mesh, &skin, 1), 1);

        let layout = analyze_mesh(&mesh, &ExportOptions::default(), Some(&skin));
        assert_eq!(layout.blend_weights, 2);
        assert!(names(&layout).ends_with(&["BLENDWEIGHT0", "BLENDWEIGHT1"]));
    }

    #[test]
    fn test_deform_only_ignores_control_bones() {
        let armature = ArmatureData {
            name: "rig".to_string(),
            bones: vec![bone("ctrl", false)],
        };
        let groups = vec!["ctrl".to_string()];
        let skin = SkinBinding::new(&groups, &armature, true);
        assert!(skin.valid_bone(&GroupWeight { group: 0, weight: 1.0 }).is_none());

        let skin = SkinBinding::new(&groups, &armature, false);
        assert!(skin.valid_bone(&GroupWeight { group: 0, weight: 1.0 }).is_some());
        assert!(skin.valid_bone(&GroupWeight { group: 0, weight: 0.0 }).is_none());
        assert!(skin.valid_bone(&GroupWeight { group: 5, weight: 1.0 }).is_none());
    }
}
