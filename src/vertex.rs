use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

/// Offset, in floats, of the position within a vertex record.
pub const POSITION_OFFSET: usize = 0;
/// Offset, in floats, of the premultiplied color within a vertex record.
pub const COLOR_OFFSET: usize = POSITION_OFFSET + 2;
/// Offset, in floats, of the texture coordinate within a vertex record.
pub const UV_OFFSET: usize = COLOR_OFFSET + 4;
/// Offset, in floats, of the texture unit within a vertex record.
pub const UNIT_OFFSET: usize = UV_OFFSET + 2;
/// Number of floats in one vertex record.
pub const VERTEX_FLOATS: usize = UNIT_OFFSET + 1;
/// Number of floats in one quad.
pub const QUAD_FLOATS: usize = VERTEX_FLOATS * 4;
/// Size of one vertex record in bytes. This is the vertex stride.
pub const VERTEX_BYTES: usize = VERTEX_FLOATS * size_of::<f32>();
/// Size of one quad in bytes.
pub const QUAD_BYTES: usize = VERTEX_BYTES * 4;

/// One corner of a quad, laid out exactly as the vertex stage reads it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// The destination-space position.
    pub position: [f32; 2],
    /// The alpha-premultiplied color.
    pub color: [f32; 4],
    /// The normalized texture coordinate.
    pub uv: [f32; 2],
    /// The texture unit to sample from, stored as a float.
    pub unit: f32,
}

impl Vertex {
    /// Returns the texture unit as an integer.
    #[must_use]
    pub fn texture_unit(&self) -> u32 {
        self.unit.round() as u32
    }
}
