/// All errors that `quadbatch` can return.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The backend failed to compile or link the sprite program. The engine is
    /// unusable.
    #[error("error compiling sprite program: {log}")]
    ShaderCompilation {
        /// The diagnostic output reported by the backend.
        log: String,
    },
    /// An image with a zero width or height was used as a draw source.
    #[error("cannot draw from an image of size {width}x{height}")]
    InvalidGeometry {
        /// The width of the offending image.
        width: u32,
        /// The height of the offending image.
        height: u32,
    },
    /// A new image was drawn after every texture unit had been assigned.
    #[error("all {units} texture units are assigned")]
    TextureUnitsExhausted {
        /// The number of units available to the program.
        units: u32,
    },
    /// The backend reported that no texture units are available.
    #[error("the backend has no texture units available")]
    NoTextureUnits,
    /// A [`BatchConfig`](crate::BatchConfig) failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The backend failed to carry out a call.
    #[error("backend error: {0}")]
    Backend(String),
    /// An error opening an image.
    #[error("error reading image: {0}")]
    Image(#[from] image::ImageError),
    /// No GPU adapter could be found.
    #[cfg(feature = "wgpu")]
    #[error("no suitable gpu adapter found")]
    AdapterNotFound,
    /// The adapter refused to create a device.
    #[cfg(feature = "wgpu")]
    #[error("error requesting device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    /// The device reported a validation or out-of-memory error.
    #[cfg(feature = "wgpu")]
    #[error("gpu error: {0}")]
    Gpu(String),
    /// Reading the render target back to the cpu failed.
    #[cfg(feature = "wgpu")]
    #[error("error reading pixels: {0}")]
    Readback(String),
}
