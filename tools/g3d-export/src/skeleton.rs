//! Skeleton builder (armature bones -> node tree)
//!
//! Every exported bone becomes a node whose transform is its rest matrix relative
//! to the nearest exported ancestor bone. With `deform_only`, non-deforming bones
//! produce no node and their children attach to the closest deforming ancestor
//! (or become roots).

use g3d_common::Node;
use glam::{Mat4, Vec3};
use hashbrown::HashMap;

use crate::scene::{ArmatureData, BoneData};

#[derive(Debug, Clone, Copy, Default)]
pub struct SkeletonOptions {
    pub deform_only: bool,
    /// Append a `<bone>_end` node to every leaf bone
    pub add_tip: bool,
}

/// Bone node tree plus the rest pose each kept bone was exported with
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub roots: Vec<Node>,
    rest: HashMap<String, Mat4>,
}

impl Skeleton {
    /// Parent-relative rest matrix of an exported bone
    pub fn rest_pose(&self, bone: &str) -> Option<Mat4> {
        self.rest.get(bone).copied()
    }

    pub fn contains(&self, bone: &str) -> bool {
        self.rest.contains_key(bone)
    }

    /// Number of exported bones (tips excluded)
    pub fn bone_count(&self) -> usize {
        self.rest.len()
    }
}

struct SkeletonBuilder<'a> {
    children: HashMap<&'a str, Vec<&'a BoneData>>,
    options: SkeletonOptions,
    rest: HashMap<String, Mat4>,
}

impl<'a> SkeletonBuilder<'a> {
    fn keeps(&self, bone: &BoneData) -> bool {
        bone.deform || !self.options.deform_only
    }

    fn children_of(&self, bone: &BoneData) -> &[&'a BoneData] {
        self.children
            .get(bone.name.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append the nodes produced by `bone` to `out`
    fn build(&mut self, bone: &'a BoneData, ancestor: Option<&'a BoneData>, out: &mut Vec<Node>) {
        if !self.keeps(bone) {
            tracing::debug!("Skipping non-deform bone {}", bone.name);
            let children = self.children_of(bone).to_vec();
            for child in children {
                self.build(child, ancestor, out);
            }
            return;
        }

        let rest = match ancestor {
            Some(parent) => parent.rest_matrix().inverse() * bone.rest_matrix(),
            None => bone.rest_matrix(),
        };
        self.rest.insert(bone.name.clone(), rest);

        let mut node = Node::from_matrix(&bone.name, rest);
        let children = self.children_of(bone).to_vec();
        for child in children {
            self.build(child, Some(bone), &mut node.children);
        }

        if self.options.add_tip && node.children.is_empty() {
            let mut tip = Node::new(format!("{}_end", bone.name));
            tip.translation = Vec3::new(0.0, bone.length, 0.0);
            node.children.push(tip);
        }

        out.push(node);
    }
}

/// Build the bone node tree of an armature
pub fn build_skeleton(armature: &ArmatureData, options: SkeletonOptions) -> Skeleton {
    let mut children: HashMap<&str, Vec<&BoneData>> = HashMap::new();
    let mut roots = Vec::new();

    for bone in &armature.bones {
        match bone.parent.as_deref() {
            Some(parent) if armature.bone(parent).is_some() => {
                children.entry(parent).or_default().push(bone)
            }
            Some(parent) => {
                tracing::warn!(
                    "Bone {} of {} has unknown parent {}, treated as root",
                    bone.name,
                    armature.name,
                    parent
                );
                roots.push(bone);
            }
            None => roots.push(bone),
        }
    }

    let mut builder = SkeletonBuilder {
        children,
        options,
        rest: HashMap::new(),
    };
    let mut nodes = Vec::new();
    for root in roots {
        builder.build(root, None, &mut nodes);
    }

    tracing::debug!(
        "Skeleton of {}: {} bones, {} roots",
        armature.name,
        builder.rest.len(),
        nodes.len()
    );

    Skeleton {
        roots: nodes,
        rest: builder.rest,
    }
}
