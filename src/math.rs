use approx::relative_eq;
use euclid::Rotation2D;

/// A unit representing destination-space pixels on the render target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Pixels;

/// A unit representing pixels within a source image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Texels;

/// A type representing an x and y coordinate.
pub type Point<T = f32, Unit = Pixels> = euclid::Point2D<T, Unit>;
/// A type representing a width and height.
pub type Size<T = f32, Unit = Pixels> = euclid::Size2D<T, Unit>;
/// A type representing a [`Point`] and [`Size`].
pub type Rect<T = f32, Unit = Pixels> = euclid::Rect<T, Unit>;
/// A type representing a vector with magnitudes x and y.
pub type Vector<T = f32, Unit = Pixels> = euclid::Vector2D<T, Unit>;
/// A type representing an angle of measurement.
pub type Angle = euclid::Angle<f32>;

/// A rotation of a quad around a point expressed relative to its top-left
/// corner.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct SpriteRotation {
    /// The angle to rotate around `origin`. Positive angles rotate from the +x
    /// axis towards the +y axis.
    pub angle: Option<Angle>,
    /// The pivot, relative to the top-left corner of the destination.
    pub origin: Vector<f32, Pixels>,
}

impl SpriteRotation {
    /// Returns a value that performs no rotation.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns a rotation around the top-left corner of the destination.
    pub fn around_top_left(angle: Angle) -> Self {
        Self {
            angle: Some(angle),
            origin: Vector::zero(),
        }
    }

    /// Returns a rotation around `origin`, relative to the top-left corner of
    /// the destination.
    pub const fn around(angle: Angle, origin: Vector<f32, Pixels>) -> Self {
        Self {
            angle: Some(angle),
            origin,
        }
    }

    /// Returns a rotation around the center of a destination of `size`.
    pub fn around_center(angle: Angle, size: Size<f32, Pixels>) -> Self {
        Self::around(angle, size.to_vector() / 2.)
    }

    fn effective_angle(&self) -> Option<Angle> {
        self.angle.filter(|angle| !relative_eq!(angle.radians, 0.))
    }
}

/// Returns the four corners of `dest` in quad winding order: top-left,
/// top-right, bottom-left, bottom-right. If `rotation` has an angle, every
/// corner is rotated around `dest.origin + rotation.origin`.
#[must_use]
pub fn quad_corners(
    dest: &Rect<f32, Pixels>,
    rotation: &SpriteRotation,
) -> [Point<f32, Pixels>; 4] {
    let corners = [
        dest.origin,
        Point::new(dest.max_x(), dest.min_y()),
        Point::new(dest.min_x(), dest.max_y()),
        dest.max(),
    ];

    match rotation.effective_angle() {
        Some(angle) => {
            let pivot = dest.origin.to_vector() + rotation.origin;
            let rotation = Rotation2D::<f32, Pixels, Pixels>::new(angle);
            corners.map(|corner| rotation.transform_point(corner - pivot) + pivot)
        }
        None => corners,
    }
}

/// Returns the four texture coordinates for `source` in quad winding order,
/// normalized against an image of `image_size`.
#[must_use]
pub fn normalized_region(
    source: &Rect<f32, Texels>,
    image_size: Size<f32, Texels>,
) -> [[f32; 2]; 4] {
    let min_u = source.min_x() / image_size.width;
    let max_u = source.max_x() / image_size.width;
    let min_v = source.min_y() / image_size.height;
    let max_v = source.max_y() / image_size.height;
    [
        [min_u, min_v],
        [max_u, min_v],
        [min_u, max_v],
        [max_u, max_v],
    ]
}

/// A column-major 4x4 matrix mapping destination pixels to clip space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenTransformation([f32; 16]);

impl ScreenTransformation {
    /// Returns an orthographic projection.
    #[must_use]
    pub fn ortho(left: f32, top: f32, right: f32, bottom: f32, near: f32, far: f32) -> Self {
        let tx = -((right + left) / (right - left));
        let ty = -((top + bottom) / (top - bottom));
        let tz = -((far + near) / (far - near));

        Self([
            // Column one
            2. / (right - left),
            0.,
            0.,
            0.,
            // Column two
            0.,
            2. / (top - bottom),
            0.,
            0.,
            // Column three
            0.,
            0.,
            -2. / (far - near),
            0.,
            // Column four
            tx,
            ty,
            tz,
            1.,
        ])
    }

    /// Returns the projection used for a render target of `size`, placing the
    /// origin at the top-left corner with y growing downwards.
    #[must_use]
    pub fn for_surface(size: Size<u32, Pixels>) -> Self {
        Self::ortho(0., 0., size.width as f32, size.height as f32, -1., 1.)
    }

    /// Returns the matrix in column-major order.
    #[must_use]
    pub const fn into_array(self) -> [f32; 16] {
        self.0
    }

    /// Returns the clip-space x and y of `point`.
    #[must_use]
    pub fn transform_point(&self, point: Point<f32, Pixels>) -> [f32; 2] {
        let m = &self.0;
        [
            m[0].mul_add(point.x, m[4].mul_add(point.y, m[12])),
            m[1].mul_add(point.x, m[5].mul_add(point.y, m[13])),
        ]
    }
}
