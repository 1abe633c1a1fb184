/// The triangulation of one quad, relative to its first vertex: top-left,
/// top-right, bottom-left, then bottom-left, top-right, bottom-right.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// The largest number of quads a 16-bit index table can address.
pub const MAX_ADDRESSABLE_QUADS: usize = (u16::MAX as usize + 1) / 4;

/// A static index buffer triangulating up to a fixed number of quads.
#[derive(Debug, Clone)]
pub struct IndexTable {
    indices: Vec<u16>,
}

impl IndexTable {
    /// Builds the table for `max_quads` quads.
    ///
    /// # Panics
    ///
    /// Panics if `max_quads` exceeds [`MAX_ADDRESSABLE_QUADS`].
    #[must_use]
    pub fn new(max_quads: usize) -> Self {
        assert!(
            max_quads <= MAX_ADDRESSABLE_QUADS,
            "{} quads cannot be addressed with 16-bit indices",
            max_quads
        );
        let indices = (0..max_quads)
            .flat_map(|quad| {
                let first_vertex = (quad * 4) as u16;
                QUAD_INDICES.map(|index| first_vertex + index)
            })
            .collect();
        Self { indices }
    }

    /// Returns the number of quads this table covers.
    #[must_use]
    pub fn max_quads(&self) -> usize {
        self.indices.len() / QUAD_INDICES.len()
    }

    /// Returns every index in the table.
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        &self.indices
    }

    /// Returns the number of indices needed to draw `quads` quads.
    #[must_use]
    pub const fn index_count(quads: usize) -> u32 {
        (quads * QUAD_INDICES.len()) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangulates_each_quad() {
        let table = IndexTable::new(3);
        assert_eq!(table.max_quads(), 3);
        assert_eq!(
            table.as_slice(),
            &[0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7, 8, 9, 10, 10, 9, 11]
        );
    }

    #[test]
    fn every_index_stays_within_its_quad() {
        let table = IndexTable::new(MAX_ADDRESSABLE_QUADS);
        assert_eq!(table.as_slice().len(), MAX_ADDRESSABLE_QUADS * 6);
        for (position, &index) in table.as_slice().iter().enumerate() {
            let quad = position / 6;
            assert_eq!(usize::from(index) / 4, quad);
        }
        assert_eq!(table.as_slice().last(), Some(&u16::MAX));
    }

    #[test]
    #[should_panic]
    fn rejects_unaddressable_sizes() {
        let _ = IndexTable::new(MAX_ADDRESSABLE_QUADS + 1);
    }
}
