//! A headless [`Backend`] that records every call it receives.

use super::{Backend, Capabilities};
use crate::{
    math::{Pixels, ScreenTransformation, Size},
    vertex::Vertex,
    Color, Error, Texture,
};

/// A call received by a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// The program was compiled for `texture_units` units.
    CreateProgram {
        /// The number of units requested.
        texture_units: u32,
    },
    /// The index table was uploaded.
    UploadIndices(Vec<u16>),
    /// Vertex data was uploaded, decoded back into records.
    UploadVertices(Vec<Vertex>),
    /// A texture was bound to a unit.
    UploadTexture {
        /// The unit the texture was bound to.
        unit: u32,
        /// The [`Texture::id()`] of the texture.
        texture: u64,
    },
    /// A projection was installed.
    SetProjection {
        /// The size of the target.
        size: Size<u32, Pixels>,
        /// The projection matrix.
        projection: ScreenTransformation,
    },
    /// The target was cleared.
    Clear(Color),
    /// An indexed draw was issued.
    DrawIndexed {
        /// The number of indices drawn.
        index_count: u32,
    },
}

/// A [`RecordingBackend`] call that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    /// [`Backend::upload_texture`].
    UploadTexture,
    /// [`Backend::upload_vertices`].
    UploadVertices,
    /// [`Backend::draw_indexed`].
    DrawIndexed,
}

/// A [`Backend`] that performs no rendering and keeps a log of every call in
/// the order it was made.
#[derive(Debug)]
pub struct RecordingBackend {
    capabilities: Capabilities,
    compile_error: Option<String>,
    failures: Vec<Call>,
    commands: Vec<Command>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(Capabilities {
            max_texture_units: 16,
        })
    }
}

impl RecordingBackend {
    /// Returns a backend reporting `capabilities`.
    #[must_use]
    pub const fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            compile_error: None,
            failures: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Makes [`Backend::create_program`] fail with `log`.
    #[must_use]
    pub fn failing_compilation(mut self, log: impl Into<String>) -> Self {
        self.compile_error = Some(log.into());
        self
    }

    /// Makes the next `call` fail with [`Error::Backend`] without recording
    /// it. Queued failures are consumed in order.
    pub fn fail_next(&mut self, call: Call) {
        self.failures.push(call);
    }

    fn check(&mut self, call: Call) -> crate::Result<()> {
        match self.failures.iter().position(|failing| *failing == call) {
            Some(index) => {
                self.failures.remove(index);
                Err(Error::Backend(format!("{:?} failed", call)))
            }
            None => Ok(()),
        }
    }

    /// Returns every call received so far.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns and forgets every call received so far.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Returns the vertices of each draw call, in order. Each draw uses the
    /// most recent vertex upload.
    #[must_use]
    pub fn draws(&self) -> Vec<Vec<Vertex>> {
        let mut uploaded: &[Vertex] = &[];
        let mut draws = Vec::new();
        for command in &self.commands {
            match command {
                Command::UploadVertices(vertices) => uploaded = vertices,
                Command::DrawIndexed { index_count } => {
                    let vertex_count = (*index_count as usize / 6 * 4).min(uploaded.len());
                    draws.push(uploaded[..vertex_count].to_vec());
                }
                _ => {}
            }
        }
        draws
    }

    /// Returns the number of draw calls issued.
    #[must_use]
    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::DrawIndexed { .. }))
            .count()
    }

    /// Returns the number of texture uploads performed.
    #[must_use]
    pub fn texture_uploads(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::UploadTexture { .. }))
            .count()
    }
}

impl Backend for RecordingBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_program(&mut self, texture_units: u32) -> crate::Result<()> {
        if let Some(log) = &self.compile_error {
            return Err(Error::ShaderCompilation { log: log.clone() });
        }
        self.commands.push(Command::CreateProgram { texture_units });
        Ok(())
    }

    fn upload_indices(&mut self, indices: &[u16]) -> crate::Result<()> {
        self.commands.push(Command::UploadIndices(indices.to_vec()));
        Ok(())
    }

    fn upload_vertices(&mut self, vertices: &[u8]) -> crate::Result<()> {
        self.check(Call::UploadVertices)?;
        self.commands
            .push(Command::UploadVertices(bytemuck::pod_collect_to_vec(vertices)));
        Ok(())
    }

    fn upload_texture(&mut self, unit: u32, texture: &Texture) -> crate::Result<()> {
        self.check(Call::UploadTexture)?;
        self.commands.push(Command::UploadTexture {
            unit,
            texture: texture.id(),
        });
        Ok(())
    }

    fn set_projection(
        &mut self,
        size: Size<u32, Pixels>,
        projection: &ScreenTransformation,
    ) -> crate::Result<()> {
        self.commands.push(Command::SetProjection {
            size,
            projection: *projection,
        });
        Ok(())
    }

    fn clear(&mut self, color: Color) -> crate::Result<()> {
        self.commands.push(Command::Clear(color));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32) -> crate::Result<()> {
        self.check(Call::DrawIndexed)?;
        self.commands.push(Command::DrawIndexed { index_count });
        Ok(())
    }
}
