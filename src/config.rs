use crate::{index::MAX_ADDRESSABLE_QUADS, Error};

/// The default number of quads the stream buffer holds before growing.
pub const INITIAL_QUAD_CAPACITY: usize = 64;
/// The default and largest number of quads submitted by one draw call.
pub const MAX_QUADS: usize = MAX_ADDRESSABLE_QUADS;
/// The most texture units a program will ever be compiled for.
pub const MAX_TEXTURE_UNITS: u32 = 24;
/// Colors with an alpha below this value round to zero in an 8-bit target and
/// are skipped entirely.
pub const ALPHA_THRESHOLD: f32 = 0.5 / 255.;

/// Tunables for a [`SpriteBatch`](crate::SpriteBatch).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
#[must_use]
pub struct BatchConfig {
    /// The number of quads the stream buffer is created with. Must be a power
    /// of two.
    pub initial_quad_capacity: usize,
    /// The most quads a single flush may submit. A draw that would exceed this
    /// flushes first.
    pub max_quads_per_flush: usize,
    /// The most texture units to compile the program for. The backend's limit
    /// applies if it is lower.
    pub max_texture_units: u32,
    /// Draws made with a color whose alpha is below this value are skipped.
    pub alpha_threshold: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_quad_capacity: INITIAL_QUAD_CAPACITY,
            max_quads_per_flush: MAX_QUADS,
            max_texture_units: MAX_TEXTURE_UNITS,
            alpha_threshold: ALPHA_THRESHOLD,
        }
    }
}

impl BatchConfig {
    /// Sets the initial stream capacity, in quads.
    pub const fn with_initial_quad_capacity(mut self, quads: usize) -> Self {
        self.initial_quad_capacity = quads;
        self
    }

    /// Sets the per-flush quad cap.
    pub const fn with_max_quads_per_flush(mut self, quads: usize) -> Self {
        self.max_quads_per_flush = quads;
        self
    }

    /// Sets the texture unit cap.
    pub const fn with_max_texture_units(mut self, units: u32) -> Self {
        self.max_texture_units = units;
        self
    }

    /// Sets the visibility threshold for draw colors.
    pub const fn with_alpha_threshold(mut self, threshold: f32) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    /// Checks that every field is in range.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_quads_per_flush == 0 || self.max_quads_per_flush > MAX_ADDRESSABLE_QUADS {
            return Err(Error::InvalidConfig(format!(
                "max_quads_per_flush must be between 1 and {}, got {}",
                MAX_ADDRESSABLE_QUADS, self.max_quads_per_flush
            )));
        }
        if !self.initial_quad_capacity.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "initial_quad_capacity must be a power of two, got {}",
                self.initial_quad_capacity
            )));
        }
        if self.initial_quad_capacity > self.max_quads_per_flush {
            return Err(Error::InvalidConfig(format!(
                "initial_quad_capacity ({}) exceeds max_quads_per_flush ({})",
                self.initial_quad_capacity, self.max_quads_per_flush
            )));
        }
        if self.max_texture_units == 0 || self.max_texture_units > MAX_TEXTURE_UNITS {
            return Err(Error::InvalidConfig(format!(
                "max_texture_units must be between 1 and {}, got {}",
                MAX_TEXTURE_UNITS, self.max_texture_units
            )));
        }
        if !self.alpha_threshold.is_finite() || self.alpha_threshold < 0. {
            return Err(Error::InvalidConfig(format!(
                "alpha_threshold must be a non-negative number, got {}",
                self.alpha_threshold
            )));
        }
        Ok(())
    }
}
