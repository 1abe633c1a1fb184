use std::{
    convert::TryFrom,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use image::{DynamicImage, RgbaImage};

use crate::math::{Size, Texels};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

/// Embeds a texture in the binary.
#[macro_export]
macro_rules! include_texture {
    ($image_path:expr) => {{
        let image_bytes = std::include_bytes!($image_path);
        <$crate::Texture as std::convert::TryFrom<&[u8]>>::try_from(&image_bytes[..])
    }};
}

/// An image that can be drawn by a [`SpriteBatch`](crate::SpriteBatch). Cheap
/// to clone.
///
/// Identity is by handle: clones share an id and a texture unit, while two
/// textures created from identical pixels are distinct.
#[derive(Debug, Clone)]
pub struct Texture {
    id: u64,
    image: Arc<RgbaImage>,
}

impl Texture {
    /// Creates a new texture from an image.
    #[must_use]
    pub fn new(image: &DynamicImage) -> Self {
        Self::from_rgba(image.to_rgba8())
    }

    /// Creates a new texture taking ownership of `image`.
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            image: Arc::new(image),
        }
    }

    /// Loads a texture from an image at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let img = image::open(path)?;

        Ok(Self::new(&img))
    }

    /// The unique ID of this texture. This depends on load order and is not
    /// related to the image data in any way.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the size of the image in texels.
    #[must_use]
    pub fn size(&self) -> Size<u32, Texels> {
        let (width, height) = self.image.dimensions();
        Size::new(width, height)
    }

    /// Returns the image behind the texture.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Texture {}

impl<'a> TryFrom<&'a [u8]> for Texture {
    type Error = crate::Error;

    fn try_from(bytes: &[u8]) -> crate::Result<Self> {
        let img = image::load_from_memory(bytes)?;

        Ok(Self::new(&img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_by_handle() {
        let pixels = RgbaImage::new(2, 2);
        let first = Texture::from_rgba(pixels.clone());
        let second = Texture::from_rgba(pixels);
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
        assert_eq!(first.size(), Size::new(2, 2));
    }

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(3, 5))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let texture = Texture::try_from(&png[..]).unwrap();
        assert_eq!(texture.size(), Size::new(3, 5));
    }
}
