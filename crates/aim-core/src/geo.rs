//! Image-space geometry: points, oriented rectangles and perspective maps
//!
//! Coordinates are pixels with the origin at the top-left corner of the frame
//! and `y` growing downwards. The origin doubles as the "nothing detected"
//! sentinel throughout the pipeline.

use crate::{CoreError, CoreResult};
use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point (or displacement) in image space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether this is the origin sentinel
    pub fn is_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Euclidean length when used as a vector
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point2) -> f64 {
        (*self - *other).norm()
    }

    pub fn dot(&self, other: &Point2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 2D cross product
    pub fn cross(&self, other: &Point2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Rotate about `center` by `theta` radians using the matrix
    /// `[cos -sin; sin cos]`
    pub fn rotate_about(&self, center: &Point2, theta: f64) -> Point2 {
        let (sin, cos) = theta.sin_cos();
        let rel = *self - *center;
        Point2::new(
            cos * rel.x - sin * rel.y + center.x,
            sin * rel.x + cos * rel.y + center.y,
        )
    }

    /// Centroid of a point set, origin for an empty set
    pub fn centroid(points: &[Point2]) -> Point2 {
        if points.is_empty() {
            return Point2::ORIGIN;
        }
        let n = points.len() as f64;
        let sum = points.iter().fold(Point2::ORIGIN, |acc, p| acc + *p);
        Point2::new(sum.x / n, sum.y / n)
    }

    /// Total order used to break ties between equally good candidates
    pub fn lexicographic_cmp(&self, other: &Point2) -> std::cmp::Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl Add for Point2 {
    type Output = Point2;

    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2 {
    type Output = Point2;

    fn mul(self, rhs: f64) -> Point2 {
        Point2::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Shoelace area of a closed polygon (absolute value)
pub fn polygon_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.cross(b))
        .sum();
    twice.abs() / 2.0
}

// ============================================================================
// ROTATED RECTANGLE
// ============================================================================

/// Oriented rectangle: center, side lengths and rotation in degrees
///
/// `width` is the extent along the direction given by `angle`, `height` the
/// extent perpendicular to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: Point2,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees
    pub angle: f64,
}

impl RotatedRect {
    pub fn new(center: Point2, width: f64, height: f64, angle: f64) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// `width / height`; infinite or NaN for a degenerate rectangle, which
    /// every band check rejects
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Corner points in a fixed winding order: the first two span the height
    /// side, the second and third span the width side.
    pub fn points(&self) -> [Point2; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let a = sin * 0.5;
        let b = cos * 0.5;
        let c = self.center;

        let p0 = Point2::new(
            c.x - a * self.height - b * self.width,
            c.y + b * self.height - a * self.width,
        );
        let p1 = Point2::new(
            c.x + a * self.height - b * self.width,
            c.y - b * self.height - a * self.width,
        );
        let p2 = Point2::new(2.0 * c.x - p0.x, 2.0 * c.y - p0.y);
        let p3 = Point2::new(2.0 * c.x - p1.x, 2.0 * c.y - p1.y);
        [p0, p1, p2, p3]
    }

    /// Axis-aligned rectangle from its top-left corner and size
    pub fn axis_aligned(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(
            Point2::new(x + width / 2.0, y + height / 2.0),
            width,
            height,
            0.0,
        )
    }
}

// ============================================================================
// HOMOGRAPHY
// ============================================================================

/// 3x3 perspective transform, row-major
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: [[f64; 3]; 3],
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            h: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    #[inline]
    pub fn apply(&self, p: Point2) -> Point2 {
        let w = self.h[2][0] * p.x + self.h[2][1] * p.y + self.h[2][2];
        let u = (self.h[0][0] * p.x + self.h[0][1] * p.y + self.h[0][2]) / w;
        let v = (self.h[1][0] * p.x + self.h[1][1] * p.y + self.h[1][2]) / w;
        Point2::new(u, v)
    }

    /// Exact perspective map sending each `src[i]` onto `dst[i]`.
    ///
    /// Solves the 8x8 linear system with `h[2][2] = 1`.
    pub fn from_quad(src: &[Point2; 4], dst: &[Point2; 4]) -> CoreResult<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for k in 0..4 {
            let (x, y) = (src[k].x, src[k].y);
            let (u, v) = (dst[k].x, dst[k].y);

            a[(k, 0)] = x;
            a[(k, 1)] = y;
            a[(k, 2)] = 1.0;
            a[(k, 6)] = -x * u;
            a[(k, 7)] = -y * u;
            b[k] = u;

            a[(k + 4, 3)] = x;
            a[(k + 4, 4)] = y;
            a[(k + 4, 5)] = 1.0;
            a[(k + 4, 6)] = -x * v;
            a[(k + 4, 7)] = -y * v;
            b[k + 4] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| CoreError::degenerate("perspective transform is singular"))?;

        Ok(Homography {
            h: [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]],
        })
    }
}
