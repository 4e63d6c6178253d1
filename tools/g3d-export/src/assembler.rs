//! Scene assembler
//!
//! Walks the scene's collection tree and turns every exported object into a node:
//! meshes are partitioned into shared buffers, armatures become bone trees with
//! baked animations, and empties instancing a collection pull that collection in
//! under a namespaced id. One assembler lives for exactly one export.

use g3d_common::{AnimationTrack, Model, Node};
use glam::{Mat4, Quat};
use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::animation::bake_actions;
use crate::error::{ExportError, Result};
use crate::material::MaterialCatalog;
use crate::mesh::{
    analyze_mesh, partition_mesh, MeshNodeData, MeshSource, MeshStore, PartitionLimits, SkinBinding,
};
use crate::options::ExportOptions;
use crate::scene::{
    ArmatureData, Collection, DisplayType, MeshObject, ObjectKind, Scene, SceneIndex, SceneObject,
};
use crate::skeleton::{build_skeleton, SkeletonOptions};

/// Rotation taking a Z-up scene to Y-up (-90 degrees around X)
pub fn y_up_rotation() -> Quat {
    Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)
}

/// Where traversed objects are being placed
#[derive(Debug, Clone, Copy)]
struct Placement<'p> {
    /// World matrix of the node the objects end up under
    parent_world: Mat4,
    selected_only: bool,
    /// Namespace for node ids inside instanced collections
    prefix: &'p str,
}

pub struct SceneAssembler<'a> {
    scene: &'a Scene,
    options: &'a ExportOptions,
    index: SceneIndex<'a>,
    materials: MaterialCatalog,
    meshes: MeshStore,
    /// Partition results per exported mesh; `None` when the mesh produced no parts
    mesh_nodes: HashMap<&'a str, Option<MeshNodeData>>,
    animations: Vec<AnimationTrack>,
    animation_ids: HashSet<String>,
    /// Objects and collections on the current traversal path
    object_path: HashSet<&'a str>,
    collection_path: HashSet<&'a str>,
    layer_path: HashSet<&'a str>,
}

/// Enter `name` on a traversal path, failing if it is already on it
fn enter<'a>(path: &mut HashSet<&'a str>, kind: &'static str, name: &'a str) -> Result<()> {
    if path.insert(name) {
        Ok(())
    } else {
        Err(ExportError::Cycle {
            kind,
            name: name.to_string(),
        })
    }
}

impl<'a> SceneAssembler<'a> {
    pub fn new(scene: &'a Scene, options: &'a ExportOptions) -> Self {
        Self {
            scene,
            options,
            index: SceneIndex::new(scene),
            materials: MaterialCatalog::new(),
            meshes: MeshStore::new(),
            mesh_nodes: HashMap::new(),
            animations: Vec::new(),
            animation_ids: HashSet::new(),
            object_path: HashSet::new(),
            collection_path: HashSet::new(),
            layer_path: HashSet::new(),
        }
    }

    /// Traverse the whole scene and produce the finished model
    pub fn assemble(mut self) -> Result<Model> {
        let root = self.index.collection(&self.scene.collection, "scene")?;
        let placement = Placement {
            parent_world: Mat4::IDENTITY,
            selected_only: self.options.selected_only,
            prefix: "",
        };

        let mut nodes = Vec::new();
        self.process_layer_collection(root, placement, &mut nodes)?;

        if self.options.y_up {
            let rotation = y_up_rotation();
            for node in &mut nodes {
                node.rotation = rotation * node.rotation;
                node.translation = rotation * node.translation;
            }
        }

        for node in &nodes {
            debug!("Root node {}", node.id);
        }

        Ok(Model {
            id: self.scene.name.clone(),
            meshes: self.meshes.into_meshes(),
            materials: self.materials.into_materials(),
            nodes,
            animations: self.animations,
            ..Default::default()
        })
    }

    // ------------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------------

    /// View-layer walk: the collection itself, then every child collection
    fn process_layer_collection(
        &mut self,
        collection: &'a Collection,
        placement: Placement<'_>,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        if collection.exclude {
            debug!("Skipping excluded collection {}", collection.name);
            return Ok(());
        }

        enter(&mut self.layer_path, "collection", &collection.name)?;
        let result = self.visit_layer_collection(collection, placement, out);
        self.layer_path.remove(collection.name.as_str());
        result
    }

    fn visit_layer_collection(
        &mut self,
        collection: &'a Collection,
        placement: Placement<'_>,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        self.process_collection(collection, placement, false, out)?;

        for child in &collection.children {
            let child = self.index.collection(child, &collection.name)?;
            self.process_layer_collection(child, placement, out)?;
        }
        Ok(())
    }

    fn process_collection(
        &mut self,
        collection: &'a Collection,
        placement: Placement<'_>,
        with_children: bool,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        if collection.hide_viewport {
            debug!("Skipping hidden collection {}", collection.name);
            return Ok(());
        }

        enter(&mut self.collection_path, "collection", &collection.name)?;
        let result = self.visit_collection(collection, placement, with_children, out);
        self.collection_path.remove(collection.name.as_str());
        result
    }

    fn visit_collection(
        &mut self,
        collection: &'a Collection,
        placement: Placement<'_>,
        with_children: bool,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        debug!(
            "Processing collection {} ({} objects)",
            collection.name,
            collection.objects.len()
        );

        for name in &collection.objects {
            let object = self.index.object(name, &collection.name)?;
            // Objects parented inside this collection are reached through their parent
            let reached_via_parent = object
                .parent
                .as_ref()
                .is_some_and(|parent| collection.objects.contains(parent));
            if !reached_via_parent {
                self.process_object(object, placement, out)?;
            }
        }

        if with_children {
            for child in &collection.children {
                let child = self.index.collection(child, &collection.name)?;
                self.process_collection(child, placement, with_children, out)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    fn process_children(
        &mut self,
        object: &SceneObject,
        placement: Placement<'_>,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        let children = self.index.children(&object.name).to_vec();
        for child in children {
            self.process_object(child, placement, out)?;
        }
        Ok(())
    }

    fn process_object(
        &mut self,
        object: &'a SceneObject,
        placement: Placement<'_>,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        enter(&mut self.object_path, "object", &object.name)?;
        let result = self.visit_object(object, placement, out);
        self.object_path.remove(object.name.as_str());
        result
    }

    fn visit_object(
        &mut self,
        object: &'a SceneObject,
        placement: Placement<'_>,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        let skipped = if object.hide_viewport {
            Some("hidden")
        } else if placement.selected_only && !object.selected {
            Some("not selected")
        } else if matches!(object.kind, ObjectKind::Unsupported) {
            warn!("Object {} has an unsupported type, not exported", object.name);
            Some("unsupported type")
        } else {
            None
        };
        if let Some(reason) = skipped {
            debug!("Skipping object {} ({}), children stay in place", object.name, reason);
            return self.process_children(object, placement, out);
        }

        let world = object.world_matrix();
        let local = placement.parent_world.inverse() * world;
        let mut node = Node::from_matrix(format!("{}{}", placement.prefix, object.name), local);
        let below = Placement {
            parent_world: world,
            ..placement
        };

        match &object.kind {
            ObjectKind::Mesh(mesh) => {
                match self.mesh_node_data(object, mesh, placement.selected_only)? {
                    Some(data) => node.parts = data.parts,
                    None => warn!("Mesh node {} has no parts", node.id),
                }
                debug!("New mesh node {}", node.id);
                self.process_children(object, below, &mut node.children)?;
                out.push(node);
            }
            ObjectKind::Armature(armature) => {
                let data = self.index.armature(&armature.armature, &object.name)?;
                self.build_armature(&mut node, data)?;
                debug!("New armature node {}", node.id);

                // Armature children stay at the armature's level
                let children = self.index.children(&object.name).to_vec();
                for child in children {
                    debug!("Armature child {} placed beside {}", child.name, node.id);
                    self.process_object(child, placement, out)?;
                }
                out.push(node);
            }
            ObjectKind::Empty(empty) => {
                debug!("New empty node {}", node.id);
                match empty.instance_collection.as_deref() {
                    Some(name) => {
                        let collection = self.index.collection(name, &object.name)?;
                        let prefix = format!("{}|", node.id);
                        let instance = Placement {
                            parent_world: Mat4::IDENTITY,
                            selected_only: false,
                            prefix: &prefix,
                        };
                        self.process_collection(collection, instance, true, &mut node.children)?;
                    }
                    None => {
                        let below = Placement {
                            selected_only: false,
                            ..below
                        };
                        self.process_children(object, below, &mut node.children)?;
                    }
                }
                out.push(node);
            }
            ObjectKind::Unsupported => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Meshes
    // ------------------------------------------------------------------------

    /// Node parts for a mesh object, partitioning its mesh on first use
    fn mesh_node_data(
        &mut self,
        object: &'a SceneObject,
        mesh_object: &'a MeshObject,
        selected_only: bool,
    ) -> Result<Option<MeshNodeData>> {
        let mesh_name = match mesh_object.evaluated_mesh.as_deref() {
            Some(evaluated) if self.options.apply_modifiers => evaluated,
            _ => mesh_object.mesh.as_str(),
        };
        if let Some(cached) = self.mesh_nodes.get(mesh_name) {
            debug!("Reusing partitioned mesh {} for {}", mesh_name, object.name);
            return Ok(cached.clone());
        }

        let data = self.partition_object(object, mesh_object, mesh_name, selected_only)?;
        self.mesh_nodes.insert(mesh_name, data.clone());
        Ok(data)
    }

    fn partition_object(
        &mut self,
        object: &'a SceneObject,
        mesh_object: &'a MeshObject,
        mesh_name: &str,
        selected_only: bool,
    ) -> Result<Option<MeshNodeData>> {
        let mesh = self.index.mesh(mesh_name, &object.name)?;
        if mesh.polygons.is_empty() {
            warn!("Mesh {} of {} has no faces", mesh.name, object.name);
            return Ok(None);
        }

        // Only slots some face actually uses produce a material
        let used: HashSet<usize> = mesh.polygons.iter().map(|p| p.material_index).collect();
        let mut materials = Vec::with_capacity(mesh_object.material_slots.len());
        for (slot, name) in mesh_object.material_slots.iter().enumerate() {
            let id = match name {
                Some(name) if used.contains(&slot) => {
                    let source = self.index.material(name, &object.name)?;
                    let material =
                        self.materials
                            .get_or_build(source, &self.scene.world, self.options.use_material);
                    Some(material.id.clone())
                }
                _ => None,
            };
            materials.push(id);
        }
        if materials.iter().all(Option::is_none) {
            warn!("Object {} has no materials", object.name);
            return Ok(None);
        }

        let armature = self.attached_armature(object, mesh_object, selected_only)?;
        let skin = armature.map(|armature| {
            SkinBinding::new(
                &mesh_object.vertex_groups,
                armature,
                self.options.deform_bones_only,
            )
        });

        let layout = analyze_mesh(mesh, self.options, skin.as_ref());
        let source = MeshSource {
            mesh,
            materials: &materials,
            skin: skin.as_ref(),
            layout: &layout,
            primitive: self
                .options
                .primitive_type
                .resolve(object.display_type == DisplayType::Wire),
        };

        let data = partition_mesh(&source, PartitionLimits::from(self.options), &mut self.meshes)?;
        debug!(
            "Partitioned {} into {} node parts ({} buffers total)",
            mesh.name,
            data.parts.len(),
            self.meshes.len()
        );
        Ok(Some(data))
    }

    /// The armature deforming a mesh, if it is exported along with it
    fn attached_armature(
        &self,
        object: &SceneObject,
        mesh_object: &MeshObject,
        selected_only: bool,
    ) -> Result<Option<&'a ArmatureData>> {
        if !self.options.use_armature {
            return Ok(None);
        }
        let Some(name) = mesh_object.armature.as_deref() else {
            return Ok(None);
        };

        let armature_object = self.index.object(name, &object.name)?;
        let ObjectKind::Armature(armature) = &armature_object.kind else {
            warn!("{} deforms {} but is not an armature", name, object.name);
            return Ok(None);
        };
        if armature_object.hide_viewport || (selected_only && !armature_object.selected) {
            debug!("Armature {} of {} is not exported, mesh stays rigid", name, object.name);
            return Ok(None);
        }
        self.index.armature(&armature.armature, name).map(Some)
    }

    // ------------------------------------------------------------------------
    // Armatures
    // ------------------------------------------------------------------------

    fn build_armature(&mut self, node: &mut Node, armature: &'a ArmatureData) -> Result<()> {
        let skeleton = build_skeleton(
            armature,
            SkeletonOptions {
                deform_only: self.options.deform_bones_only,
                add_tip: self.options.add_bone_tip,
            },
        );

        if self.options.use_actions && !self.scene.actions.is_empty() {
            let fps = self.options.fps.unwrap_or(self.scene.fps);
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ExportError::InvalidOption {
                    name: "fps",
                    reason: format!("{fps} is not a positive frame rate"),
                });
            }
            let tracks = bake_actions(
                &self.scene.actions,
                &node.id,
                armature,
                &skeleton,
                fps,
                &mut self.animation_ids,
            );
            self.animations.extend(tracks);
        }

        node.children.extend(skeleton.roots);
        Ok(())
    }
}

/// Build the model for a scene
pub fn assemble_scene(scene: &Scene, options: &ExportOptions) -> Result<Model> {
    SceneAssembler::new(scene, options).assemble()
}
