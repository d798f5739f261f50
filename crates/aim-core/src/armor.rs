//! Armor plate descriptor

use crate::geo::{Homography, Point2, RotatedRect};
use crate::ArmorLabel;
use serde::{Deserialize, Serialize};

/// A detected quadrilateral target in image space.
///
/// Built once per detection or prediction and never mutated afterwards.
/// Frame-to-frame correspondence is done by spatial matching, so an armor
/// carries no identity. [`Armor::empty`] is the "nothing here" sentinel with
/// its center at the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armor {
    vertices: [Point2; 4],
    center: Point2,
    /// Degrees, direction of the width side
    angle: f64,
    aspect_ratio: f64,
    face_size: (u32, u32),
    /// Maps image coordinates onto the face rectangle
    trans: Homography,
    label: ArmorLabel,
}

impl Default for Armor {
    fn default() -> Self {
        Self::empty()
    }
}

impl Armor {
    /// The empty sentinel
    pub fn empty() -> Self {
        Self {
            vertices: [Point2::ORIGIN; 4],
            center: Point2::ORIGIN,
            angle: 0.0,
            aspect_ratio: 0.0,
            face_size: (0, 0),
            trans: Homography::identity(),
            label: ArmorLabel::Unknown,
        }
    }

    /// Armor covering an oriented rectangle
    pub fn from_rect(rect: &RotatedRect) -> Self {
        Self::from_vertices(rect.points())
    }

    /// Armor from four corners given in the [`RotatedRect::points`] winding:
    /// `v0 -> v1` spans the height, `v1 -> v2` spans the width.
    pub fn from_vertices(vertices: [Point2; 4]) -> Self {
        let [v0, v1, v2, v3] = vertices;
        let center = Point2::centroid(&vertices);
        if center.is_origin() && vertices.iter().all(Point2::is_origin) {
            return Self::empty();
        }

        let width = (v1.distance_to(&v2) + v0.distance_to(&v3)) / 2.0;
        let height = (v0.distance_to(&v1) + v3.distance_to(&v2)) / 2.0;
        let edge = v2 - v1;
        let angle = edge.y.atan2(edge.x).to_degrees();

        let face_w = width.round().max(1.0) as u32;
        let face_h = height.round().max(1.0) as u32;
        let face_corners = [
            Point2::new(0.0, face_h as f64),
            Point2::new(0.0, 0.0),
            Point2::new(face_w as f64, 0.0),
            Point2::new(face_w as f64, face_h as f64),
        ];
        let trans = Homography::from_quad(&vertices, &face_corners).unwrap_or_default();

        Self {
            vertices,
            center,
            angle,
            aspect_ratio: width / height,
            face_size: (face_w, face_h),
            trans,
            label: ArmorLabel::Unknown,
        }
    }

    /// Copy of this armor carrying a classifier label
    pub fn with_label(mut self, label: ArmorLabel) -> Self {
        self.label = label;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_origin()
    }

    pub fn center(&self) -> Point2 {
        self.center
    }

    pub fn vertices(&self) -> &[Point2; 4] {
        &self.vertices
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    pub fn face_size(&self) -> (u32, u32) {
        self.face_size
    }

    pub fn rectify_transform(&self) -> &Homography {
        &self.trans
    }

    pub fn label(&self) -> ArmorLabel {
        self.label
    }

    /// Rotate about `center` by `theta` radians.
    ///
    /// Only the three leading vertices are rotated; the fourth corner is
    /// completed from them, which is exact for a rectangle.
    pub fn rotated(&self, theta: f64, center: &Point2) -> Armor {
        let p0 = self.vertices[0].rotate_about(center, theta);
        let p1 = self.vertices[1].rotate_about(center, theta);
        let p2 = self.vertices[2].rotate_about(center, theta);
        let p3 = p0 + p2 - p1;
        Armor::from_vertices([p0, p1, p2, p3]).with_label(self.label)
    }

    /// Copy shifted by `offset`
    pub fn translated(&self, offset: Point2) -> Armor {
        Armor::from_vertices(self.vertices.map(|v| v + offset)).with_label(self.label)
    }

    /// Mean displacement of the corners under the rectification transform.
    ///
    /// Plates seen head-on and close to the face size score low.
    pub fn rectification_penalty(&self) -> f64 {
        let diff: f64 = self
            .vertices
            .iter()
            .map(|v| v.distance_to(&self.trans.apply(*v)))
            .sum();
        diff / 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_sentinel() {
        let armor = Armor::empty();
        assert!(armor.is_empty());
        assert_eq!(armor.center(), Point2::ORIGIN);
        assert_eq!(Armor::from_vertices([Point2::ORIGIN; 4]), armor);
    }

    #[test]
    fn test_center_is_vertex_centroid() {
        let rect = RotatedRect::new(Point2::new(200.0, 120.0), 60.0, 30.0, 20.0);
        let armor = Armor::from_rect(&rect);
        assert_relative_eq!(armor.center().x, 200.0, epsilon = 1e-9);
        assert_relative_eq!(armor.center().y, 120.0, epsilon = 1e-9);
        assert_relative_eq!(armor.aspect_ratio(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(armor.angle(), 20.0, epsilon = 1e-9);
        assert_eq!(armor.face_size(), (60, 30));
    }

    #[test]
    fn test_rotation_round_trip() {
        let center = Point2::new(300.0, 300.0);
        let armor = Armor::from_rect(&RotatedRect::new(Point2::new(420.0, 260.0), 50.0, 40.0, 12.0));
        let theta = 0.4;

        let back = armor.rotated(theta, &center).rotated(-theta, &center);
        for (a, b) in armor.vertices().iter().zip(back.vertices().iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-6);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-6);
        }
    }
}
