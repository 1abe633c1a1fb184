use palette::{rgb::Srgba, Component, IntoComponent, Srgb};

/// A RGBA color with f32 components, not premultiplied.
#[derive(Clone, Debug, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    r: f32,
    g: f32,
    b: f32,
    a: f32,
}

impl<U: Component + IntoComponent<f32>> From<Srgba<U>> for Color {
    fn from(color: Srgba<U>) -> Self {
        let color = color.into_format::<_, f32>();
        Self::new(
            color.color.red,
            color.color.green,
            color.color.blue,
            color.alpha,
        )
    }
}

impl<U: Component + IntoComponent<f32>> From<Srgb<U>> for Color {
    fn from(color: Srgb<U>) -> Self {
        let color = color.into_format::<f32>();
        Self::new(color.red, color.green, color.blue, 1.)
    }
}

impl From<Color> for Srgba {
    fn from(color: Color) -> Self {
        Self::new(color.r, color.g, color.b, color.a)
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    /// Returns a new color from straight (non-premultiplied) components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the red component.
    #[must_use]
    pub const fn red(&self) -> f32 {
        self.r
    }

    /// Returns the green component.
    #[must_use]
    pub const fn green(&self) -> f32 {
        self.g
    }

    /// Returns the blue component.
    #[must_use]
    pub const fn blue(&self) -> f32 {
        self.b
    }

    /// Returns the alpha component.
    #[must_use]
    pub const fn alpha(&self) -> f32 {
        self.a
    }

    /// Returns the color as an f32 array.
    #[must_use]
    pub const fn rgba(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Returns the color with red, green and blue scaled by alpha.
    #[must_use]
    pub fn premultiplied(&self) -> [f32; 4] {
        [self.r * self.a, self.g * self.a, self.b * self.a, self.a]
    }

    /// Returns true if alpha is at or above `threshold`. A color with no
    /// alpha is never visible.
    #[must_use]
    pub fn visible(&self, threshold: f32) -> bool {
        self.a > 0. && self.a >= threshold
    }

    /// Returns a new color using red, green, and blue from `self` and the
    /// parameter `alpha`.
    #[must_use]
    pub const fn with_alpha(mut self, alpha: f32) -> Self {
        self.a = alpha;
        self
    }
}

impl Color {
    /// Fully transparent black.
    pub const CLEAR_BLACK: Self = Self::new(0., 0., 0., 0.);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0., 0., 0., 1.);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1., 1., 1., 1.);
    /// Opaque red.
    pub const RED: Self = Self::new(1., 0., 0., 1.);
    /// Opaque green, equivalent to the CSS keyword `lime`.
    pub const LIME: Self = Self::new(0., 1., 0., 1.);
    /// Opaque blue.
    pub const BLUE: Self = Self::new(0., 0., 1., 1.);
}
