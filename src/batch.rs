use crate::{
    backend::Backend,
    config::BatchConfig,
    index::IndexTable,
    math::{
        normalized_region, quad_corners, Pixels, Point, Rect, ScreenTransformation, Size,
        SpriteRotation, Texels,
    },
    stream::StreamBuffer,
    units::TextureUnits,
    vertex::Vertex,
    Color, Error, Texture,
};

/// The state consumed by every draw until it is changed.
#[derive(Clone, Copy, Debug)]
struct RenderState {
    color: Color,
    size: Size<u32, Pixels>,
    projection: ScreenTransformation,
}

/// Packs textured quads into a single vertex stream and submits them to a
/// [`Backend`] in as few draw calls as possible.
///
/// Quads are drawn in the order [`draw_image()`](Self::draw_image) was called.
/// Nothing reaches the render target until [`flush()`](Self::flush) is called,
/// the per-flush quad cap is reached, or a state change that would otherwise
/// affect already-queued quads forces a flush.
#[derive(Debug)]
pub struct SpriteBatch<B: Backend> {
    backend: B,
    config: BatchConfig,
    state: RenderState,
    stream: StreamBuffer,
    indices: IndexTable,
    units: TextureUnits,
}

impl<B: Backend> SpriteBatch<B> {
    /// Initializes a batch for a render target of `size` using the default
    /// configuration.
    pub fn new(backend: B, size: Size<u32, Pixels>) -> crate::Result<Self> {
        Self::with_config(backend, size, BatchConfig::default())
    }

    /// Initializes a batch for a render target of `size`.
    ///
    /// Compiles the sprite program for as many texture units as both `config`
    /// and the backend allow, then uploads the index table and the initial
    /// projection.
    pub fn with_config(
        mut backend: B,
        size: Size<u32, Pixels>,
        config: BatchConfig,
    ) -> crate::Result<Self> {
        config.validate()?;

        let backend_units = backend.capabilities().max_texture_units;
        if backend_units == 0 {
            return Err(Error::NoTextureUnits);
        }
        if backend_units < config.max_texture_units {
            tracing::warn!(
                requested = config.max_texture_units,
                available = backend_units,
                "backend limits texture units"
            );
        }
        let texture_units = config.max_texture_units.min(backend_units);
        backend.create_program(texture_units)?;

        let indices = IndexTable::new(config.max_quads_per_flush);
        backend.upload_indices(indices.as_slice())?;

        let projection = ScreenTransformation::for_surface(size);
        backend.set_projection(size, &projection)?;

        tracing::debug!(
            texture_units,
            max_quads = config.max_quads_per_flush,
            capacity = config.initial_quad_capacity,
            "initialized sprite batch"
        );

        Ok(Self {
            backend,
            state: RenderState {
                color: Color::default(),
                size,
                projection,
            },
            stream: StreamBuffer::with_capacity(config.initial_quad_capacity),
            indices,
            units: TextureUnits::new(texture_units),
            config,
        })
    }

    /// Sets the color that subsequent draws are tinted with.
    pub fn set_color(&mut self, color: Color) {
        self.state.color = color;
    }

    /// Returns the current draw color.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.state.color
    }

    /// Flushes pending quads, then installs a projection for a render target of
    /// `size`.
    pub fn set_projection(&mut self, size: Size<u32, Pixels>) -> crate::Result<()> {
        self.flush()?;
        let projection = ScreenTransformation::for_surface(size);
        self.backend.set_projection(size, &projection)?;
        self.state.size = size;
        self.state.projection = projection;
        Ok(())
    }

    /// Returns the current projection.
    #[must_use]
    pub const fn projection(&self) -> ScreenTransformation {
        self.state.projection
    }

    /// Returns the size of the render target the projection was built for.
    #[must_use]
    pub const fn size(&self) -> Size<u32, Pixels> {
        self.state.size
    }

    /// Flushes pending quads, then clears the render target to `color`.
    pub fn clear(&mut self, color: Color) -> crate::Result<()> {
        self.flush()?;
        self.backend.clear(color)
    }

    /// Draws the region `source` of `texture` into `dest`.
    pub fn draw_image(
        &mut self,
        texture: &Texture,
        dest: Rect<f32, Pixels>,
        source: Rect<f32, Texels>,
    ) -> crate::Result<()> {
        self.draw_image_rotated(texture, dest, source, SpriteRotation::none())
    }

    /// Draws all of `texture` at its native size with its top-left corner at
    /// `location`.
    pub fn draw_texture(
        &mut self,
        texture: &Texture,
        location: Point<f32, Pixels>,
    ) -> crate::Result<()> {
        let size = texture.size().to_f32();
        self.draw_image(
            texture,
            Rect::new(location, size.cast_unit()),
            Rect::from_size(size),
        )
    }

    /// Draws the region `source` of `texture` into `dest`, rotated by
    /// `rotation`.
    ///
    /// Does nothing if the current color is invisible. Returns
    /// [`Error::InvalidGeometry`] if `texture` has no area, and
    /// [`Error::TextureUnitsExhausted`] if `texture` is new and every texture
    /// unit has already been assigned.
    pub fn draw_image_rotated(
        &mut self,
        texture: &Texture,
        dest: Rect<f32, Pixels>,
        source: Rect<f32, Texels>,
        rotation: SpriteRotation,
    ) -> crate::Result<()> {
        if !self.state.color.visible(self.config.alpha_threshold) {
            return Ok(());
        }

        let image_size = texture.size();
        if image_size.is_empty() {
            return Err(Error::InvalidGeometry {
                width: image_size.width,
                height: image_size.height,
            });
        }

        if self.stream.len() >= self.config.max_quads_per_flush {
            self.flush()?;
        }
        self.stream.ensure_capacity(1);

        let corners = quad_corners(&dest, &rotation);
        let unit = self.units.resolve(texture, &mut self.backend)?;
        let uvs = normalized_region(&source, image_size.to_f32());
        let color = self.state.color.premultiplied();

        let mut quad = [Vertex::default(); 4];
        for ((vertex, corner), uv) in quad.iter_mut().zip(corners).zip(uvs) {
            *vertex = Vertex {
                position: corner.to_array(),
                color,
                uv,
                unit: unit as f32,
            };
        }
        self.stream.write_quad(&quad);
        Ok(())
    }

    /// Uploads every pending quad and draws them with a single indexed draw
    /// call. Does nothing if no quads are pending.
    pub fn flush(&mut self) -> crate::Result<()> {
        if self.stream.is_empty() {
            return Ok(());
        }

        let quads = self.stream.len();
        tracing::trace!(quads, "flushing sprite batch");
        self.backend.upload_vertices(self.stream.as_bytes())?;
        self.backend.draw_indexed(IndexTable::index_count(quads))?;
        self.stream.reset();
        Ok(())
    }

    /// Returns the number of quads waiting for the next flush.
    #[must_use]
    pub const fn pending_quads(&self) -> usize {
        self.stream.len()
    }

    /// Returns the stream of pending quads.
    #[must_use]
    pub const fn stream(&self) -> &StreamBuffer {
        &self.stream
    }

    /// Returns the static index table.
    #[must_use]
    pub const fn indices(&self) -> &IndexTable {
        &self.indices
    }

    /// Returns the number of texture units the program was compiled for.
    #[must_use]
    pub const fn texture_units(&self) -> u32 {
        self.units.max_units()
    }

    /// Returns the texture unit assigned to `texture`, if it has been drawn.
    #[must_use]
    pub fn unit_for(&self, texture: &Texture) -> Option<u32> {
        self.units.get(texture)
    }

    /// Returns the configuration this batch was created with.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend mutably. Work submitted directly to the backend is
    /// not ordered with pending quads unless [`flush()`](Self::flush) is called
    /// first.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns the backend, discarding any pending quads.
    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::*;
    use crate::backend::recording::{Call, Command, RecordingBackend};

    fn texture(width: u32, height: u32) -> Texture {
        Texture::from_rgba(RgbaImage::new(width, height))
    }

    fn batch(config: BatchConfig) -> SpriteBatch<RecordingBackend> {
        let mut batch =
            SpriteBatch::with_config(RecordingBackend::default(), Size::new(640, 480), config)
                .unwrap();
        batch.backend_mut().take_commands();
        batch
    }

    fn rect<Unit>(x: f32, y: f32, width: f32, height: f32) -> Rect<f32, Unit> {
        Rect::new(Point::new(x, y), Size::new(width, height))
    }

    #[test]
    fn initialization_order() {
        let batch = SpriteBatch::with_config(
            RecordingBackend::default(),
            Size::new(640, 480),
            BatchConfig::default()
                .with_initial_quad_capacity(2)
                .with_max_quads_per_flush(2),
        )
        .unwrap();
        assert_eq!(
            batch.backend().commands(),
            &[
                Command::CreateProgram { texture_units: 16 },
                Command::UploadIndices(vec![0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7]),
                Command::SetProjection {
                    size: Size::new(640, 480),
                    projection: ScreenTransformation::for_surface(Size::new(640, 480)),
                },
            ]
        );
        assert_eq!(batch.texture_units(), 16);
        assert_eq!(batch.color(), Color::WHITE);
    }

    #[test]
    fn unit_count_is_capped_by_config() {
        let batch = batch(BatchConfig::default().with_max_texture_units(4));
        assert_eq!(batch.texture_units(), 4);
        assert_eq!(batch.config().max_texture_units, 4);
    }

    #[test]
    fn compilation_failures_are_reported() {
        let result = SpriteBatch::new(
            RecordingBackend::default().failing_compilation("0:12: unknown identifier"),
            Size::new(1, 1),
        );
        match result {
            Err(Error::ShaderCompilation { log }) => assert_eq!(log, "0:12: unknown identifier"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let result = SpriteBatch::with_config(
            RecordingBackend::default(),
            Size::new(1, 1),
            BatchConfig::default().with_initial_quad_capacity(3),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn writes_corners_uvs_and_premultiplied_color() {
        let mut batch = batch(BatchConfig::default());
        let image = texture(100, 100);
        batch.set_color(Color::new(1., 0., 0., 0.5));
        batch
            .draw_image(&image, rect(10., 20., 30., 40.), rect(25., 25., 50., 50.))
            .unwrap();

        let quad = batch.stream().quad(0).unwrap();
        let positions: Vec<_> = quad.iter().map(|vertex| vertex.position).collect();
        assert_eq!(positions, [[10., 20.], [40., 20.], [10., 60.], [40., 60.]]);
        let uvs: Vec<_> = quad.iter().map(|vertex| vertex.uv).collect();
        assert_eq!(uvs, [[0.25, 0.25], [0.75, 0.25], [0.25, 0.75], [0.75, 0.75]]);
        for vertex in &quad {
            assert_eq!(vertex.color, [0.5, 0., 0., 0.5]);
            assert_eq!(vertex.texture_unit(), 0);
        }
    }

    #[test]
    fn transparent_draws_have_no_effect() {
        let mut batch = batch(BatchConfig::default());
        batch.set_color(Color::WHITE.with_alpha(0.));
        batch
            .draw_image(&texture(4, 4), rect(0., 0., 4., 4.), rect(0., 0., 4., 4.))
            .unwrap();
        assert_eq!(batch.pending_quads(), 0);
        assert!(batch.backend().commands().is_empty());

        batch.flush().unwrap();
        assert!(batch.backend().commands().is_empty());
    }

    #[test]
    fn transparent_draws_are_skipped_at_zero_threshold() {
        let mut batch = batch(BatchConfig::default().with_alpha_threshold(0.));
        batch.set_color(Color::WHITE.with_alpha(0.));
        batch
            .draw_image(&texture(4, 4), rect(0., 0., 4., 4.), rect(0., 0., 4., 4.))
            .unwrap();
        assert_eq!(batch.pending_quads(), 0);
        assert_eq!(batch.backend().texture_uploads(), 0);

        batch.set_color(Color::WHITE.with_alpha(0.001));
        batch
            .draw_image(&texture(4, 4), rect(0., 0., 4., 4.), rect(0., 0., 4., 4.))
            .unwrap();
        assert_eq!(batch.pending_quads(), 1);
    }

    #[test]
    fn failed_texture_uploads_assign_no_unit() {
        let mut batch = batch(BatchConfig::default());
        let image = texture(4, 4);
        batch.backend_mut().fail_next(Call::UploadTexture);

        let result = batch.draw_image(&image, rect(0., 0., 4., 4.), rect(0., 0., 4., 4.));
        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(batch.unit_for(&image), None);
        assert_eq!(batch.pending_quads(), 0);
        assert!(batch.backend().commands().is_empty());

        batch
            .draw_image(&image, rect(0., 0., 4., 4.), rect(0., 0., 4., 4.))
            .unwrap();
        assert_eq!(batch.unit_for(&image), Some(0));
        assert_eq!(batch.pending_quads(), 1);
        assert_eq!(batch.backend().texture_uploads(), 1);
    }

    #[test]
    fn failed_vertex_uploads_keep_pending_quads() {
        let mut batch = batch(BatchConfig::default());
        let image = texture(4, 4);
        for x in 0..2 {
            batch
                .draw_image(&image, rect(x as f32, 0., 4., 4.), rect(0., 0., 4., 4.))
                .unwrap();
        }
        batch.backend_mut().fail_next(Call::UploadVertices);

        assert!(matches!(batch.flush(), Err(Error::Backend(_))));
        assert_eq!(batch.pending_quads(), 2);
        assert_eq!(batch.backend().draw_calls(), 0);

        batch.flush().unwrap();
        assert_eq!(batch.pending_quads(), 0);
        let draws = batch.backend().draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].len(), 8);
        assert_eq!(draws[0][4].position, [1., 0.]);
    }

    #[test]
    fn failed_draws_keep_pending_quads() {
        let mut batch = batch(BatchConfig::default());
        let image = texture(4, 4);
        batch
            .draw_image(&image, rect(0., 0., 4., 4.), rect(0., 0., 4., 4.))
            .unwrap();
        batch.backend_mut().fail_next(Call::DrawIndexed);

        assert!(matches!(batch.flush(), Err(Error::Backend(_))));
        assert_eq!(batch.pending_quads(), 1);
        assert_eq!(batch.backend().draw_calls(), 0);

        batch.flush().unwrap();
        assert_eq!(batch.pending_quads(), 0);
        assert_eq!(batch.backend().draw_calls(), 1);
        assert_eq!(
            batch.backend().commands().last(),
            Some(&Command::DrawIndexed { index_count: 6 })
        );
    }

    #[test]
    fn empty_images_are_rejected() {
        let mut batch = batch(BatchConfig::default());
        let result = batch.draw_image(&texture(0, 8), rect(0., 0., 1., 1.), rect(0., 0., 1., 1.));
        assert!(matches!(
            result,
            Err(Error::InvalidGeometry {
                width: 0,
                height: 8
            })
        ));
        assert_eq!(batch.pending_quads(), 0);
        assert!(batch.backend().commands().is_empty());
    }

    #[test]
    fn flushing_nothing_draws_nothing() {
        let mut batch = batch(BatchConfig::default());
        batch.flush().unwrap();
        batch.flush().unwrap();
        assert_eq!(batch.backend().draw_calls(), 0);
    }

    #[test]
    fn flush_uploads_pending_prefix_and_draws_once() {
        let mut batch = batch(BatchConfig::default());
        let image = texture(8, 8);
        for x in 0..3 {
            batch
                .draw_image(&image, rect(x as f32, 0., 1., 1.), rect(0., 0., 8., 8.))
                .unwrap();
        }
        batch.flush().unwrap();
        assert_eq!(batch.pending_quads(), 0);

        let commands = batch.backend().commands();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], Command::UploadTexture { unit: 0, .. }));
        match &commands[1] {
            Command::UploadVertices(vertices) => assert_eq!(vertices.len(), 12),
            other => panic!("expected a vertex upload, got {:?}", other),
        }
        assert_eq!(commands[2], Command::DrawIndexed { index_count: 18 });
    }

    #[test]
    fn reaching_the_cap_flushes_before_writing() {
        let mut batch = batch(
            BatchConfig::default()
                .with_initial_quad_capacity(1)
                .with_max_quads_per_flush(2),
        );
        let image = texture(8, 8);
        for x in 0..2 {
            batch
                .draw_image(&image, rect(x as f32, 0., 1., 1.), rect(0., 0., 8., 8.))
                .unwrap();
        }
        assert_eq!(batch.backend().draw_calls(), 0);
        assert_eq!(batch.pending_quads(), 2);

        batch
            .draw_image(&image, rect(2., 0., 1., 1.), rect(0., 0., 8., 8.))
            .unwrap();
        assert_eq!(batch.backend().draw_calls(), 1);
        assert_eq!(batch.pending_quads(), 1);
        assert_eq!(batch.stream().quad(0).unwrap()[0].position, [2., 0.]);
        assert_eq!(
            batch.backend().commands().last(),
            Some(&Command::DrawIndexed { index_count: 12 })
        );
    }

    #[test]
    fn growth_happens_below_the_cap() {
        let mut batch = batch(BatchConfig::default().with_initial_quad_capacity(2));
        let image = texture(8, 8);
        for x in 0..5 {
            batch
                .draw_image(&image, rect(x as f32, 0., 1., 1.), rect(0., 0., 8., 8.))
                .unwrap();
        }
        assert_eq!(batch.stream().capacity(), 8);
        assert_eq!(batch.backend().draw_calls(), 0);
        for x in 0..5 {
            assert_eq!(batch.stream().quad(x).unwrap()[0].position, [x as f32, 0.]);
        }

        batch.flush().unwrap();
        assert_eq!(batch.stream().capacity(), 8);
    }

    #[test]
    fn projection_changes_flush_first() {
        let mut batch = batch(BatchConfig::default());
        batch
            .draw_image(&texture(2, 2), rect(0., 0., 2., 2.), rect(0., 0., 2., 2.))
            .unwrap();
        batch.set_projection(Size::new(320, 200)).unwrap();

        let commands = batch.backend().commands();
        assert_eq!(commands[commands.len() - 2], Command::DrawIndexed { index_count: 6 });
        assert_eq!(
            commands[commands.len() - 1],
            Command::SetProjection {
                size: Size::new(320, 200),
                projection: ScreenTransformation::for_surface(Size::new(320, 200)),
            }
        );
        assert_eq!(batch.size(), Size::new(320, 200));
        assert_eq!(batch.pending_quads(), 0);
    }

    #[test]
    fn clearing_flushes_first() {
        let mut batch = batch(BatchConfig::default());
        batch
            .draw_image(&texture(2, 2), rect(0., 0., 2., 2.), rect(0., 0., 2., 2.))
            .unwrap();
        batch.clear(Color::BLACK).unwrap();
        let commands = batch.backend().commands();
        assert_eq!(commands[commands.len() - 2], Command::DrawIndexed { index_count: 6 });
        assert_eq!(commands[commands.len() - 1], Command::Clear(Color::BLACK));
    }

    #[test]
    fn exhausted_units_reject_new_images() {
        let mut batch = batch(BatchConfig::default().with_max_texture_units(1));
        let first = texture(2, 2);
        batch
            .draw_image(&first, rect(0., 0., 2., 2.), rect(0., 0., 2., 2.))
            .unwrap();
        let result = batch.draw_image(&texture(2, 2), rect(0., 0., 2., 2.), rect(0., 0., 2., 2.));
        assert!(matches!(
            result,
            Err(Error::TextureUnitsExhausted { units: 1 })
        ));
        assert_eq!(batch.pending_quads(), 1);

        batch
            .draw_image(&first, rect(2., 0., 2., 2.), rect(0., 0., 2., 2.))
            .unwrap();
        assert_eq!(batch.pending_quads(), 2);
    }

    #[test]
    fn draw_texture_uses_native_size() {
        let mut batch = batch(BatchConfig::default());
        batch
            .draw_texture(&texture(16, 8), Point::new(4., 4.))
            .unwrap();
        let quad = batch.stream().quad(0).unwrap();
        assert_eq!(quad[0].position, [4., 4.]);
        assert_eq!(quad[3].position, [20., 12.]);
        assert_eq!(quad[0].uv, [0., 0.]);
        assert_eq!(quad[3].uv, [1., 1.]);
    }
}
