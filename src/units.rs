use std::collections::HashMap;

use crate::{backend::Backend, Error, Texture};

/// Assigns textures to the fixed set of units sampled by the fragment stage.
///
/// Units are handed out in first-seen order starting at zero and are never
/// reclaimed. Once every unit is taken, new textures are rejected with
/// [`Error::TextureUnitsExhausted`]; textures that already own a unit keep
/// working.
#[derive(Debug)]
pub struct TextureUnits {
    assigned: HashMap<u64, u32>,
    next_unit: u32,
    max_units: u32,
}

impl TextureUnits {
    /// Returns an empty cache for `max_units` units.
    #[must_use]
    pub fn new(max_units: u32) -> Self {
        Self {
            assigned: HashMap::new(),
            next_unit: 0,
            max_units,
        }
    }

    /// Returns the unit for `texture`, uploading it to `backend` the first
    /// time it is seen.
    pub fn resolve<B: Backend>(
        &mut self,
        texture: &Texture,
        backend: &mut B,
    ) -> crate::Result<u32> {
        if let Some(unit) = self.assigned.get(&texture.id()) {
            return Ok(*unit);
        }

        if self.next_unit >= self.max_units {
            return Err(Error::TextureUnitsExhausted {
                units: self.max_units,
            });
        }

        let unit = self.next_unit;
        backend.upload_texture(unit, texture)?;
        tracing::debug!(texture = texture.id(), unit, "bound texture to unit");
        self.next_unit += 1;
        self.assigned.insert(texture.id(), unit);
        Ok(unit)
    }

    /// Returns the unit assigned to `texture`, if any.
    #[must_use]
    pub fn get(&self, texture: &Texture) -> Option<u32> {
        self.assigned.get(&texture.id()).copied()
    }

    /// Returns the number of units assigned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Returns true if no units are assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Returns the number of units available.
    #[must_use]
    pub const fn max_units(&self) -> u32 {
        self.max_units
    }
}
