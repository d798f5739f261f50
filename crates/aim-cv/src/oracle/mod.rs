//! Image-processing primitives used by the detectors
//!
//! The detectors and classifiers only ever talk to [`ImageOracle`];
//! [`OpenCvOracle`] backs it with `imgproc`.

use crate::CvResult;
use aim_core::geo::polygon_area;
use aim_core::{Armor, Point2, RotatedRect, Team};
use image::{GrayImage, RgbImage};

mod opencv_backend;

pub use opencv_backend::OpenCvOracle;

/// One boundary of a binary image region
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point2>,
    /// Index of the enclosing contour in the same result set
    pub parent: Option<usize>,
    pub is_hole: bool,
}

/// Image-processing backend shared by all detectors.
///
/// Implementations must be stateless with respect to frames: nothing passed
/// in is retained after a call returns.
pub trait ImageOracle: Send + Sync {
    /// Binary threshold: pixels strictly above `thresh` become 255, the rest 0
    fn threshold(&self, image: &GrayImage, thresh: f64) -> CvResult<GrayImage>;

    /// Dilation with a square kernel of half-size `radius`
    fn dilate(&self, image: &GrayImage, radius: u32) -> CvResult<GrayImage>;

    /// Morphological closing (dilate then erode) with a square kernel of
    /// half-size `radius`
    fn close(&self, image: &GrayImage, radius: u32) -> CvResult<GrayImage>;

    /// Every outer and hole boundary of the non-zero regions, with hierarchy
    fn find_contours(&self, image: &GrayImage) -> CvResult<Vec<Contour>>;

    /// Closed polygon approximation within `epsilon` pixels
    fn approx_poly(&self, points: &[Point2], epsilon: f64) -> CvResult<Vec<Point2>>;

    /// Minimum-area enclosing rectangle, angle normalized to `[0, 90)`
    fn min_area_rect(&self, points: &[Point2]) -> CvResult<RotatedRect>;

    fn contour_area(&self, points: &[Point2]) -> CvResult<f64> {
        Ok(polygon_area(points))
    }

    /// Face of `armor`: warped onto its face rectangle, grayscale, triangle
    /// thresholded and cropped to the central square. Empty for the sentinel.
    fn face(&self, frame: &RgbImage, armor: &Armor) -> CvResult<GrayImage>;
}

/// Saturating channel difference isolating the enemy glow: `blue - red` when
/// the enemy is blue, `red - blue` otherwise.
pub fn color_difference(frame: &RgbImage, enemy: Team) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut out = GrayImage::new(width, height);
    for (dst, src) in out.pixels_mut().zip(frame.pixels()) {
        let [r, _, b] = src.0;
        dst.0[0] = match enemy {
            Team::Blue => b.saturating_sub(r),
            Team::Red | Team::Unknown => r.saturating_sub(b),
        };
    }
    out
}

/// Threshold, dilate and close: the binarization shared by the detectors
pub fn binarize<O: ImageOracle + ?Sized>(
    oracle: &O,
    frame: &RgbImage,
    enemy: Team,
    binary_th: f64,
    radius: u32,
) -> CvResult<GrayImage> {
    let diff = color_difference(frame, enemy);
    let binary = oracle.threshold(&diff, binary_th)?;
    let dilated = oracle.dilate(&binary, radius)?;
    oracle.close(&dilated, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_color_difference_saturates() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, Rgb([200, 0, 50]));
        frame.put_pixel(1, 0, Rgb([10, 0, 240]));

        let red = color_difference(&frame, Team::Red);
        assert_eq!(red.get_pixel(0, 0).0[0], 150);
        assert_eq!(red.get_pixel(1, 0).0[0], 0);

        let blue = color_difference(&frame, Team::Blue);
        assert_eq!(blue.get_pixel(0, 0).0[0], 0);
        assert_eq!(blue.get_pixel(1, 0).0[0], 230);
    }
}
