/// Minimum and maximum extents of a rectangular region.
///
/// Fonts use a Y-up coordinate system, so `y_min` is the bottom of the
/// region and `y_max` is the top.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BBox<T> {
    /// Minimum extent in the x direction.
    pub x_min: T,
    /// Minimum extent in the y direction.
    pub y_min: T,
    /// Maximum extent in the x direction.
    pub x_max: T,
    /// Maximum extent in the y direction.
    pub y_max: T,
}

impl<T> BBox<T> {
    /// Creates a new bounding box from the given extents.
    pub const fn new(x_min: T, y_min: T, x_max: T, y_max: T) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Maps `BBox<T>` to `BBox<U>` by applying a function to each extent.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BBox<U> {
        BBox {
            x_min: f(self.x_min),
            y_min: f(self.y_min),
            x_max: f(self.x_max),
            y_max: f(self.y_max),
        }
    }
}

impl<T: PartialOrd> BBox<T> {
    /// Returns true when the box contains no area.
    pub fn is_empty(&self) -> bool {
        self.x_min >= self.x_max || self.y_min >= self.y_max
    }
}
