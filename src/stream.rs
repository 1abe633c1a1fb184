use crate::vertex::{Vertex, QUAD_FLOATS};

/// A growable staging area holding the vertex records of pending quads in
/// submission order.
///
/// Capacity is measured in quads and is always a power of two. Only the first
/// [`len()`](Self::len) quads hold meaningful data; anything beyond that is
/// left over from previous batches and is never read.
#[derive(Debug)]
pub struct StreamBuffer {
    data: Vec<f32>,
    capacity: usize,
    len: usize,
}

impl StreamBuffer {
    /// Returns an empty buffer able to hold `capacity` quads.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "stream capacity must be a power of two"
        );
        Self {
            data: vec![0.; capacity * QUAD_FLOATS],
            capacity,
            len: 0,
        }
    }

    /// Returns the number of pending quads.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no quads are pending.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of quads the buffer can hold before growing.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Doubles the capacity until `quads_needed` more quads fit. Returns true
    /// if the buffer grew.
    pub fn ensure_capacity(&mut self, quads_needed: usize) -> bool {
        let required = self.len + quads_needed;
        if required <= self.capacity {
            return false;
        }

        let mut capacity = self.capacity;
        while capacity < required {
            capacity *= 2;
        }

        let mut data = vec![0.; capacity * QUAD_FLOATS];
        data[..self.len * QUAD_FLOATS].copy_from_slice(self.as_floats());
        tracing::debug!(
            from = self.capacity,
            to = capacity,
            pending = self.len,
            "growing stream buffer"
        );
        self.data = data;
        self.capacity = capacity;
        true
    }

    /// Appends one quad. Vertices must be in quad winding order.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full. Call
    /// [`ensure_capacity()`](Self::ensure_capacity) first.
    pub fn write_quad(&mut self, quad: &[Vertex; 4]) {
        assert!(self.len < self.capacity, "stream buffer is full");
        let start = self.len * QUAD_FLOATS;
        self.data[start..start + QUAD_FLOATS].copy_from_slice(bytemuck::cast_slice(quad));
        self.len += 1;
    }

    /// Discards every pending quad. Capacity and storage are kept.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Returns the vertex data of every pending quad.
    #[must_use]
    pub fn as_floats(&self) -> &[f32] {
        &self.data[..self.len * QUAD_FLOATS]
    }

    /// Returns the vertex data of every pending quad as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_floats())
    }

    /// Returns the vertices of the pending quad at `index`.
    #[must_use]
    pub fn quad(&self, index: usize) -> Option<[Vertex; 4]> {
        if index >= self.len {
            return None;
        }

        let start = index * QUAD_FLOATS;
        let vertices: &[Vertex] = bytemuck::cast_slice(&self.data[start..start + QUAD_FLOATS]);
        <[Vertex; 4]>::try_from(vertices).ok()
    }
}
