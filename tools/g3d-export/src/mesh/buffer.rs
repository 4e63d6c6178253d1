//! Deduplicating mesh buffers
//!
//! A [`MeshBufferBuilder`] owns one interleaved vertex buffer and hands out a
//! stable index per distinct vertex. Identity is the bit-level vertex hash from
//! [`g3d_common::hash_vertex`]; two vertices with the same hash share an index.

use g3d_common::{flags_equal, hash_flags, hash_vertex, MeshBuffer, MeshPart, VertexFlag};
use hashbrown::{HashMap, HashSet};

#[derive(Debug)]
pub struct MeshBufferBuilder {
    buffer: MeshBuffer,
    vertex_size: usize,
    vertex_index: HashMap<i32, u32>,
}

impl MeshBufferBuilder {
    pub fn new(attributes: Vec<VertexFlag>) -> Self {
        let buffer = MeshBuffer::new(attributes);
        Self {
            vertex_size: buffer.vertex_size(),
            buffer,
            vertex_index: HashMap::new(),
        }
    }

    pub fn attributes(&self) -> &[VertexFlag] {
        &self.buffer.attributes
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_index.len()
    }

    /// Index of `vertex`, appending it if no vertex with the same hash exists yet
    pub fn add_or_reuse(&mut self, vertex: &[f32]) -> u32 {
        debug_assert_eq!(vertex.len(), self.vertex_size, "vertex does not match layout");

        let next = self.vertex_index.len() as u32;
        let index = *self.vertex_index.entry(hash_vertex(vertex)).or_insert(next);
        if index == next {
            self.buffer.vertices.extend_from_slice(vertex);
        }
        index
    }

    /// How many of `vertices` this buffer does not hold yet, counting repeats once
    pub fn new_vertex_count(&self, vertices: &[Vec<f32>]) -> usize {
        let mut pending = HashSet::new();
        vertices
            .iter()
            .map(|vertex| hash_vertex(vertex))
            .filter(|hash| !self.vertex_index.contains_key(hash) && pending.insert(*hash))
            .count()
    }

    /// Append an empty part, returning its position in this buffer
    pub fn add_part(&mut self, part: MeshPart) -> usize {
        self.buffer.parts.push(part);
        self.buffer.parts.len() - 1
    }

    pub fn part(&self, index: usize) -> &MeshPart {
        &self.buffer.parts[index]
    }

    pub fn part_mut(&mut self, index: usize) -> &mut MeshPart {
        &mut self.buffer.parts[index]
    }

    pub fn build(self) -> MeshBuffer {
        self.buffer
    }
}

/// Every mesh buffer of an export, grouped by vertex layout
#[derive(Debug, Default)]
pub struct MeshStore {
    buffers: Vec<MeshBufferBuilder>,
    by_layout: HashMap<u64, Vec<usize>>,
    part_counters: HashMap<String, usize>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// First buffer with this exact layout that can take `vertices` without
    /// exceeding `max_vertices`, opening a new buffer when none qualifies
    pub fn buffer_with_headroom(
        &mut self,
        flags: &[VertexFlag],
        vertices: &[Vec<f32>],
        max_vertices: usize,
    ) -> usize {
        let key = hash_flags(flags);
        let candidates = self.by_layout.entry(key).or_default();

        let found = candidates.iter().copied().find(|&index| {
            let buffer = &self.buffers[index];
            flags_equal(buffer.attributes(), flags)
                && buffer.vertex_count() + buffer.new_vertex_count(vertices) <= max_vertices
        });

        match found {
            Some(index) => index,
            None => {
                let index = self.buffers.len();
                self.buffers.push(MeshBufferBuilder::new(flags.to_vec()));
                candidates.push(index);
                tracing::debug!("Opened mesh buffer {} ({} attributes)", index, flags.len());
                index
            }
        }
    }

    /// `<mesh>_part<n>`, counting per source mesh
    pub fn next_part_id(&mut self, mesh_name: &str) -> String {
        let counter = self.part_counters.entry_ref(mesh_name).or_insert(0);
        let id = format!("{mesh_name}_part{counter}");
        *counter += 1;
        id
    }

    pub fn buffer(&self, index: usize) -> &MeshBufferBuilder {
        &self.buffers[index]
    }

    pub fn buffer_mut(&mut self, index: usize) -> &mut MeshBufferBuilder {
        &mut self.buffers[index]
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn into_meshes(self) -> Vec<MeshBuffer> {
        self.buffers.into_iter().map(MeshBufferBuilder::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Vec<VertexFlag> {
        vec![VertexFlag::position()]
    }

    #[test]
    fn test_add_or_reuse_is_idempotent() {
        let mut builder = MeshBufferBuilder::new(layout());
        let first = builder.add_or_reuse(&[1.0, 2.0, 3.0]);
        let second = builder.add_or_reuse(&[1.0, 2.0, 3.0]);

        assert_eq!(first, second);
        assert_eq!(builder.vertex_count(), 1);
        assert_eq!(builder.build().vertices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_indices_follow_first_seen_order() {
        let mut builder = MeshBufferBuilder::new(layout());
        let indices: Vec<u32> = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            .iter()
            .map(|v| builder.add_or_reuse(v))
            .collect();

        assert_eq!(indices, vec![0, 1, 0, 2]);
        let buffer = builder.build();
        assert_eq!(buffer.vertices.len(), buffer.vertex_count() * buffer.vertex_size());
    }

    fn corners(xs: &[f32]) -> Vec<Vec<f32>> {
        xs.iter().map(|&x| vec![x, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_new_vertex_count_skips_known_and_repeated() {
        let mut builder = MeshBufferBuilder::new(layout());
        builder.add_or_reuse(&[0.0, 0.0, 0.0]);
        builder.add_or_reuse(&[1.0, 0.0, 0.0]);

        assert_eq!(builder.new_vertex_count(&corners(&[0.0, 1.0])), 0);
        assert_eq!(builder.new_vertex_count(&corners(&[0.0, 2.0, 2.0, 3.0])), 2);
    }

    #[test]
    fn test_store_shares_buffer_for_equal_layouts() {
        let mut store = MeshStore::new();
        let a = store.buffer_with_headroom(&layout(), &corners(&[0.0, 1.0, 2.0]), 10);
        let b = store.buffer_with_headroom(&layout(), &corners(&[3.0, 4.0, 5.0]), 10);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_splits_on_layout_order() {
        let mut store = MeshStore::new();
        let vertex = vec![vec![0.0; 6]];
        let a = store.buffer_with_headroom(
            &[VertexFlag::position(), VertexFlag::normal()],
            &vertex,
            10,
        );
        let b = store.buffer_with_headroom(
            &[VertexFlag::normal(), VertexFlag::position()],
            &vertex,
            10,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_store_opens_buffer_without_headroom() {
        let mut store = MeshStore::new();
        let first = store.buffer_with_headroom(&layout(), &corners(&[0.0, 1.0, 2.0]), 4);
        for v in corners(&[0.0, 1.0, 2.0]) {
            store.buffer_mut(first).add_or_reuse(&v);
        }

        let second = store.buffer_with_headroom(&layout(), &corners(&[3.0, 4.0, 5.0]), 4);
        assert_ne!(first, second);
        // Only the one vertex it does not hold yet counts against the first buffer
        assert_eq!(
            store.buffer_with_headroom(&layout(), &corners(&[0.0, 2.0, 3.0]), 4),
            first
        );
    }

    #[test]
    fn test_part_ids_count_per_mesh() {
        let mut store = MeshStore::new();
        assert_eq!(store.next_part_id("Cube"), "Cube_part0");
        assert_eq!(store.next_part_id("Cube"), "Cube_part1");
        assert_eq!(store.next_part_id("Plane"), "Plane_part0");
    }
}
