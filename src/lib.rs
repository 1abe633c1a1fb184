//! A 2d sprite batching engine.
//!
//! A [`SpriteBatch`] accepts draw requests of the form "draw this region of
//! this image into this rectangle, optionally rotated, tinted with the current
//! color" and packs them as textured quads into a single growing vertex
//! stream. Pending quads are submitted to a [`Backend`](backend::Backend) with
//! one indexed draw call whenever [`SpriteBatch::flush()`] is called, the
//! per-flush quad limit is reached, or a state change requires it.
//!
//! Each vertex carries the index of the texture unit its image is bound to, so
//! quads using different images share a draw call as long as the number of
//! distinct images fits in the program's texture units.

#![forbid(unsafe_code)]
#![warn(
    clippy::cargo,
    missing_docs,
    clippy::nursery,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms,
)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
)]

pub mod backend;
mod batch;
mod color;
/// Tunable limits of a [`SpriteBatch`].
pub mod config;
mod error;
/// Generation of the static index table.
pub mod index;
/// Math types for 2d geometry.
pub mod math;
pub mod shader;
/// The growable stream of pending quads.
pub mod stream;
mod texture;
/// Texture unit assignment.
pub mod units;
/// The layout of a single vertex record.
pub mod vertex;

// Re-exports
pub use euclid;
pub use image;
#[cfg(feature = "wgpu")]
pub use wgpu;

#[cfg(feature = "wgpu")]
pub use self::backend::gpu::WgpuBackend;
pub use self::{
    backend::{recording::RecordingBackend, Backend, Capabilities},
    batch::SpriteBatch,
    color::Color,
    config::BatchConfig,
    error::Error,
    texture::Texture,
};

/// A collection of commonly used exports provided by this crate.
pub mod prelude {
    #[cfg(feature = "wgpu")]
    pub use super::WgpuBackend;
    pub use super::{
        include_texture,
        math::{Angle, Pixels, Point, Rect, Size, SpriteRotation, Texels, Vector},
        Backend, BatchConfig, Color, SpriteBatch, Texture,
    };
}

/// Alias for [`std::result::Result`] where the error type is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
