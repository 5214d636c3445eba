//! Logical geometry primitives.
//!
//! All coordinates live in the graph's logical space unless stated otherwise.
//! Screen (DOM) coordinates only appear through [`ViewTransform`].

use serde::{Deserialize, Serialize};

/// A point in 2D space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f64,
    y: f64,
}

impl Point {
    /// Creates a new point with the given coordinates
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate
    pub fn x(self) -> f64 {
        self.x
    }

    /// Returns the y-coordinate
    pub fn y(self) -> f64 {
        self.y
    }

    /// Returns a copy of this point with a different x-coordinate
    pub fn with_x(self, x: f64) -> Self {
        Self { x, ..self }
    }

    /// Returns a copy of this point with a different y-coordinate
    pub fn with_y(self, y: f64) -> Self {
        Self { y, ..self }
    }

    /// Adds another point to this point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Returns the point halfway between this point and another
    pub fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Multiplies both coordinates by a factor
    pub fn scale(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns true if both coordinates are finite numbers
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns true if both coordinates are finite and within `limit` of the origin on each axis
    pub fn is_within(self, limit: f64) -> bool {
        self.is_finite() && self.x.abs() <= limit && self.y.abs() <= limit
    }
}

/// Width and height of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f64,
    height: f64,
}

impl Size {
    /// Creates a new size with the given width and height
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Returns the width
    pub fn width(self) -> f64 {
        self.width
    }

    /// Returns the height
    pub fn height(self) -> f64 {
        self.height
    }

    /// Returns the offset from a top-left corner to the center
    pub fn half(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Returns true if both width and height are zero
    pub fn is_zero(self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

/// Axis-aligned rectangle described by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    /// Creates a new bounds from a center point and a size
    pub fn new_from_center(center: Point, size: Size) -> Self {
        let half = size.half();
        Self {
            min_x: center.x - half.x,
            min_y: center.y - half.y,
            max_x: center.x + half.x,
            max_y: center.y + half.y,
        }
    }

    /// Creates a new bounds from a top-left point and a size
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        }
    }

    /// Smallest bounds containing every point, or `None` for an empty iterator
    ///
    /// # Examples
    ///
    /// ```
    /// # use tierflow_core::geometry::{Bounds, Point};
    /// let bounds = Bounds::from_points([Point::new(-80.0, 0.0), Point::new(80.0, 400.0)])
    ///     .expect("non-empty");
    /// assert_eq!(bounds.center(), Point::new(0.0, 200.0));
    /// assert_eq!(bounds.width(), 160.0);
    /// ```
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self {
                    min_x: p.x,
                    min_y: p.y,
                    max_x: p.x,
                    max_y: p.y,
                },
                Some(bounds) => Self {
                    min_x: bounds.min_x.min(p.x),
                    min_y: bounds.min_y.min(p.y),
                    max_x: bounds.max_x.max(p.x),
                    max_y: bounds.max_y.max(p.y),
                },
            })
        })
    }

    /// Returns the minimum x-coordinate of the bounds
    pub fn min_x(self) -> f64 {
        self.min_x
    }

    /// Returns the minimum y-coordinate of the bounds
    pub fn min_y(self) -> f64 {
        self.min_y
    }

    /// Returns the maximum x-coordinate of the bounds
    pub fn max_x(self) -> f64 {
        self.max_x
    }

    /// Returns the maximum y-coordinate of the bounds
    pub fn max_y(self) -> f64 {
        self.max_y
    }

    /// Returns the width of the bounds
    pub fn width(self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounds
    pub fn height(self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the top-left corner as a Point
    pub fn min_point(self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    /// Converts bounds to a Size
    pub fn to_size(self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Merges two bounds into the smallest bounds containing both
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Moves the bounds by the specified offset
    pub fn translate(&self, offset: Point) -> Self {
        Self {
            min_x: self.min_x + offset.x,
            min_y: self.min_y + offset.y,
            max_x: self.max_x + offset.x,
            max_y: self.max_y + offset.y,
        }
    }

    /// Returns true if every corner coordinate is finite and the bounds are not inverted
    pub fn is_valid(self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }
}

/// Pan/zoom state of the rendering surface.
///
/// Maps a logical point `p` to screen space as `p * scale + translate`
/// independently on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewTransform {
    tx: f64,
    ty: f64,
    sx: f64,
    sy: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewTransform {
    /// Creates a transform from a translation and a per-axis scale
    pub fn new(translate: Point, sx: f64, sy: f64) -> Self {
        Self {
            tx: translate.x,
            ty: translate.y,
            sx,
            sy,
        }
    }

    /// The transform that leaves every point unchanged
    pub fn identity() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            sx: 1.0,
            sy: 1.0,
        }
    }

    /// Returns the translation component
    pub fn translate(self) -> Point {
        Point::new(self.tx, self.ty)
    }

    /// Returns the horizontal scale factor
    pub fn scale_x(self) -> f64 {
        self.sx
    }

    /// Returns the vertical scale factor
    pub fn scale_y(self) -> f64 {
        self.sy
    }

    /// Replaces unusable components with neutral values.
    ///
    /// Non-finite translations become `0`; non-finite or non-positive scales
    /// become `1`. The result is always invertible.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tierflow_core::geometry::{Point, ViewTransform};
    /// let broken = ViewTransform::new(Point::new(f64::NAN, 20.0), 0.0, -2.0);
    /// let clean = broken.sanitized();
    /// assert_eq!(clean.translate(), Point::new(0.0, 20.0));
    /// assert_eq!(clean.scale_x(), 1.0);
    /// assert_eq!(clean.scale_y(), 1.0);
    /// ```
    pub fn sanitized(self) -> Self {
        let translate = |v: f64| if v.is_finite() { v } else { 0.0 };
        let scale = |v: f64| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        Self {
            tx: translate(self.tx),
            ty: translate(self.ty),
            sx: scale(self.sx),
            sy: scale(self.sy),
        }
    }

    /// Maps a logical point into screen space
    pub fn apply(self, point: Point) -> Point {
        Point::new(point.x * self.sx + self.tx, point.y * self.sy + self.ty)
    }

    /// Maps a screen point back into logical space
    pub fn invert(self, point: Point) -> Point {
        Point::new((point.x - self.tx) / self.sx, (point.y - self.ty) / self.sy)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(4.0, -6.0);

        assert_eq!(a.add_point(b), Point::new(14.0, 14.0));
        assert_eq!(a.sub_point(b), Point::new(6.0, 26.0));
        assert_eq!(a.midpoint(b), Point::new(7.0, 7.0));
        assert_eq!(a.scale(0.5), Point::new(5.0, 10.0));
        assert_approx_eq!(f64, Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_point_validity() {
        assert!(Point::new(1.0, -1.0).is_finite());
        assert!(!Point::new(f64::NAN, 0.0).is_finite());
        assert!(!Point::new(0.0, f64::INFINITY).is_finite());

        assert!(Point::new(10_000.0, -10_000.0).is_within(10_000.0));
        assert!(!Point::new(10_000.5, 0.0).is_within(10_000.0));
        assert!(!Point::new(f64::NAN, 0.0).is_within(10_000.0));
    }

    #[test]
    fn test_bounds_from_center_and_top_left_agree() {
        let size = Size::new(120.0, 40.0);
        let from_center = Bounds::new_from_center(Point::new(60.0, 20.0), size);
        let from_top_left = Bounds::new_from_top_left(Point::new(0.0, 0.0), size);

        assert_eq!(from_center, from_top_left);
        assert_eq!(from_center.to_size(), size);
    }

    #[test]
    fn test_bounds_from_points() {
        assert!(Bounds::from_points(Vec::new()).is_none());

        let bounds = Bounds::from_points([
            Point::new(-60.0, 200.0),
            Point::new(60.0, 200.0),
            Point::new(0.0, 0.0),
        ])
        .unwrap();
        assert_approx_eq!(f64, bounds.min_x(), -60.0);
        assert_approx_eq!(f64, bounds.max_x(), 60.0);
        assert_approx_eq!(f64, bounds.min_y(), 0.0);
        assert_approx_eq!(f64, bounds.max_y(), 200.0);
        assert_eq!(bounds.center(), Point::new(0.0, 100.0));
    }

    #[test]
    fn test_bounds_merge_and_translate() {
        let a = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let b = Bounds::new_from_top_left(Point::new(20.0, 5.0), Size::new(10.0, 10.0));
        let merged = a.merge(&b);
        assert_approx_eq!(f64, merged.width(), 30.0);
        assert_approx_eq!(f64, merged.height(), 15.0);

        let moved = merged.translate(Point::new(-15.0, 1.0));
        assert_eq!(moved.min_point(), Point::new(-15.0, 1.0));
        assert!(moved.is_valid());
    }

    #[test]
    fn test_transform_round_trip() {
        let transform = ViewTransform::new(Point::new(50.0, 20.0), 1.5, 1.5);
        let dom = transform.apply(Point::new(100.0, 100.0));
        assert_approx_eq!(f64, dom.x(), 200.0);
        assert_approx_eq!(f64, dom.y(), 170.0);

        let back = transform.invert(dom);
        assert_approx_eq!(f64, back.x(), 100.0, epsilon = 1e-6);
        assert_approx_eq!(f64, back.y(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_transform_sanitized_keeps_valid_values() {
        let transform = ViewTransform::new(Point::new(5.0, -5.0), 2.0, 0.5);
        assert_eq!(transform.sanitized(), transform);
        assert_eq!(ViewTransform::default(), ViewTransform::identity());
    }

    mod proptest_tests {
        use float_cmp::approx_eq;
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn transform_round_trip_recovers_point(
                x in -5000.0f64..5000.0,
                y in -5000.0f64..5000.0,
                tx in -1000.0f64..1000.0,
                ty in -1000.0f64..1000.0,
                sx in 0.1f64..4.0,
                sy in 0.1f64..4.0,
            ) {
                let transform = ViewTransform::new(Point::new(tx, ty), sx, sy);
                let back = transform.invert(transform.apply(Point::new(x, y)));
                prop_assert!(approx_eq!(f64, back.x(), x, epsilon = 1e-6));
                prop_assert!(approx_eq!(f64, back.y(), y, epsilon = 1e-6));
            }

            #[test]
            fn sanitized_transform_is_invertible(
                tx in proptest::num::f64::ANY,
                sx in proptest::num::f64::ANY,
                sy in proptest::num::f64::ANY,
            ) {
                let clean = ViewTransform::new(Point::new(tx, 0.0), sx, sy).sanitized();
                prop_assert!(clean.translate().is_finite());
                prop_assert!(clean.scale_x() > 0.0 && clean.scale_x().is_finite());
                prop_assert!(clean.scale_y() > 0.0 && clean.scale_y().is_finite());
            }

            #[test]
            fn bounds_contain_all_points(
                points in proptest::collection::vec((-1000.0f64..1000.0, -1000.0f64..1000.0), 1..20)
            ) {
                let bounds = Bounds::from_points(points.iter().map(|&(x, y)| Point::new(x, y))).unwrap();
                for (x, y) in points {
                    prop_assert!(bounds.min_x() <= x && x <= bounds.max_x());
                    prop_assert!(bounds.min_y() <= y && y <= bounds.max_y());
                }
            }
        }
    }
}
