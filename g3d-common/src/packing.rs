//! Vertex attribute bit-level helpers
//!
//! Used by the mesh partitioner to:
//! - Pack RGBA colors into a single float (`COLORPACKED`)
//! - Hash interleaved vertex data for deduplication
//! - Compare and hash attribute layouts

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::model::VertexFlag;

/// Mask applied to packed ABGR colors.
///
/// Clearing bit 24 keeps the float exponent below all-ones, so a packed color is
/// never NaN or infinite. The runtime unpacks with the same loss in alpha precision.
pub const PACKED_COLOR_MASK: u32 = 0xFEFF_FFFF;

/// Reinterpret a float's IEEE-754 bits as a signed integer
#[inline]
pub fn float_bits(value: f32) -> i32 {
    value.to_bits() as i32
}

/// Reinterpret signed integer bits as an IEEE-754 float
#[inline]
pub fn bits_to_float(bits: i32) -> f32 {
    f32::from_bits(bits as u32)
}

#[inline]
fn unorm8(value: f32) -> u32 {
    (value.clamp(0.0, 1.0) * 255.0) as u32
}

/// Pack an RGBA color (components 0-1) into one float as masked ABGR8
pub fn pack_color(rgba: [f32; 4]) -> f32 {
    let abgr = (unorm8(rgba[3]) << 24)
        | (unorm8(rgba[2]) << 16)
        | (unorm8(rgba[1]) << 8)
        | unorm8(rgba[0]);
    f32::from_bits(abgr & PACKED_COLOR_MASK)
}

/// Deterministic hash over a vertex's float bits.
///
/// Starts at 1 and folds `31 * hash + bits` with wrapping 32-bit arithmetic, so
/// equal vertex data always hashes equal regardless of platform.
pub fn hash_vertex(data: &[f32]) -> i32 {
    data.iter().fold(1i32, |hash, &value| {
        hash.wrapping_mul(31).wrapping_add(float_bits(value))
    })
}

/// Two layouts match when they have the same flags in the same order
#[inline]
pub fn flags_equal(a: &[VertexFlag], b: &[VertexFlag]) -> bool {
    a == b
}

/// Layout hash consistent with [`flags_equal`]
pub fn hash_flags(flags: &[VertexFlag]) -> u64 {
    let mut hasher = DefaultHasher::new();
    flags.hash(&mut hasher);
    hasher.finish()
}
