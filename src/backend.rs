//! The contract a [`SpriteBatch`](crate::SpriteBatch) requires from the
//! graphics layer underneath it.
//!
//! A backend owns every GPU resource: the compiled program, a vertex buffer
//! that vertex bytes are uploaded into starting at offset zero, a static index
//! buffer, and a fixed-size array of texture slots sampled by the fragment
//! stage. Every call is synchronous and is expected to be complete, or at
//! least queued in order, when it returns.

use crate::{
    math::{Pixels, ScreenTransformation, Size},
    Color, Texture,
};

pub mod recording;
#[cfg(feature = "wgpu")]
pub mod gpu;

/// Limits reported by a [`Backend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// The number of textures the fragment stage can sample in one draw.
    pub max_texture_units: u32,
}

/// A rendering backend that sprite batches submit their work to.
pub trait Backend {
    /// Returns the limits of this backend.
    fn capabilities(&self) -> Capabilities;

    /// Compiles and links the sprite program for `texture_units` units. A
    /// failure must be reported as
    /// [`Error::ShaderCompilation`](crate::Error::ShaderCompilation) carrying
    /// the diagnostic log.
    fn create_program(&mut self, texture_units: u32) -> crate::Result<()>;

    /// Uploads the static index table. Called exactly once, during
    /// initialization.
    fn upload_indices(&mut self, indices: &[u16]) -> crate::Result<()>;

    /// Uploads `vertices` to the start of the vertex buffer, growing it if
    /// needed.
    fn upload_vertices(&mut self, vertices: &[u8]) -> crate::Result<()>;

    /// Uploads `texture` and binds it to `unit` using linear filtering and
    /// clamp-to-edge wrapping on both axes.
    fn upload_texture(&mut self, unit: u32, texture: &Texture) -> crate::Result<()>;

    /// Installs the projection used by subsequent draws on a target of `size`.
    fn set_projection(
        &mut self,
        size: Size<u32, Pixels>,
        projection: &ScreenTransformation,
    ) -> crate::Result<()>;

    /// Clears the render target to `color`.
    fn clear(&mut self, color: Color) -> crate::Result<()>;

    /// Draws `index_count` indices from the start of the index buffer as a
    /// triangle list.
    fn draw_indexed(&mut self, index_count: u32) -> crate::Result<()>;
}
