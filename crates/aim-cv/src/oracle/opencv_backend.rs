//! OpenCV-backed oracle

use super::{Contour, ImageOracle};
use crate::{CvError, CvResult};
use aim_core::{Armor, Point2, RotatedRect};
use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Point, Point2f, Rect, Scalar, Size, Vec4i, Vector, CV_8UC1},
    imgproc,
    prelude::*,
};

/// Oracle delegating to `imgproc`
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvOracle;

fn to_mat(image: &GrayImage) -> CvResult<Mat> {
    let (w, h) = image.dimensions();
    let mut mat = Mat::new_rows_cols_with_default(h as i32, w as i32, CV_8UC1, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}

fn from_mat(mat: &Mat) -> CvResult<GrayImage> {
    let bytes = mat.data_bytes()?.to_vec();
    GrayImage::from_raw(mat.cols() as u32, mat.rows() as u32, bytes)
        .ok_or_else(|| CvError::opencv("Mat size does not match its data"))
}

fn kernel(radius: u32) -> CvResult<Mat> {
    let r = radius as i32;
    Ok(imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        Size::new(2 * r + 1, 2 * r + 1),
        Point::new(r, r),
    )?)
}

fn to_vector(points: &[Point2]) -> Vector<Point2f> {
    points
        .iter()
        .map(|p| Point2f::new(p.x as f32, p.y as f32))
        .collect()
}

fn is_empty(image: &GrayImage) -> bool {
    image.width() == 0 || image.height() == 0
}

/// `minAreaRect` reports angles in `(0, 90]`; the detectors expect `[0, 90)`
fn normalize_angle(mut rect: RotatedRect) -> RotatedRect {
    while rect.angle < 0.0 {
        rect.angle += 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    while rect.angle >= 90.0 {
        rect.angle -= 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    rect
}

impl ImageOracle for OpenCvOracle {
    fn threshold(&self, image: &GrayImage, thresh: f64) -> CvResult<GrayImage> {
        if is_empty(image) {
            return Ok(image.clone());
        }
        let src = to_mat(image)?;
        let mut dst = Mat::default();
        imgproc::threshold(&src, &mut dst, thresh, 255.0, imgproc::THRESH_BINARY)?;
        from_mat(&dst)
    }

    fn dilate(&self, image: &GrayImage, radius: u32) -> CvResult<GrayImage> {
        if is_empty(image) {
            return Ok(image.clone());
        }
        let src = to_mat(image)?;
        let mut dst = Mat::default();
        imgproc::dilate(
            &src,
            &mut dst,
            &kernel(radius)?,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        from_mat(&dst)
    }

    fn close(&self, image: &GrayImage, radius: u32) -> CvResult<GrayImage> {
        if is_empty(image) {
            return Ok(image.clone());
        }
        let src = to_mat(image)?;
        let mut dst = Mat::default();
        imgproc::morphology_ex(
            &src,
            &mut dst,
            imgproc::MORPH_CLOSE,
            &kernel(radius)?,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        from_mat(&dst)
    }

    fn find_contours(&self, image: &GrayImage) -> CvResult<Vec<Contour>> {
        if is_empty(image) {
            return Ok(Vec::new());
        }
        let src = to_mat(image)?;
        let mut contours = Vector::<Vector<Point>>::new();
        let mut hierarchy = Vector::<Vec4i>::new();
        imgproc::find_contours_with_hierarchy(
            &src,
            &mut contours,
            &mut hierarchy,
            imgproc::RETR_TREE,
            imgproc::CHAIN_APPROX_NONE,
            Point::new(0, 0),
        )?;

        // hierarchy entries are [next, previous, first child, parent]
        let parents: Vec<Option<usize>> = hierarchy
            .iter()
            .map(|h| usize::try_from(h[3]).ok())
            .collect();
        let depth = |mut idx: usize| {
            let mut depth = 0;
            while let Some(parent) = parents.get(idx).copied().flatten() {
                depth += 1;
                idx = parent;
            }
            depth
        };

        Ok(contours
            .iter()
            .enumerate()
            .map(|(i, contour)| Contour {
                points: contour
                    .iter()
                    .map(|p| Point2::new(f64::from(p.x), f64::from(p.y)))
                    .collect(),
                parent: parents.get(i).copied().flatten(),
                is_hole: depth(i) % 2 == 1,
            })
            .collect())
    }

    fn approx_poly(&self, points: &[Point2], epsilon: f64) -> CvResult<Vec<Point2>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let mut approx = Vector::<Point2f>::new();
        imgproc::approx_poly_dp(&to_vector(points), &mut approx, epsilon, true)?;
        Ok(approx
            .iter()
            .map(|p| Point2::new(f64::from(p.x), f64::from(p.y)))
            .collect())
    }

    fn min_area_rect(&self, points: &[Point2]) -> CvResult<RotatedRect> {
        if points.is_empty() {
            return Ok(RotatedRect::default());
        }
        let rect = imgproc::min_area_rect(&to_vector(points))?;
        Ok(normalize_angle(RotatedRect::new(
            Point2::new(f64::from(rect.center.x), f64::from(rect.center.y)),
            f64::from(rect.size.width),
            f64::from(rect.size.height),
            f64::from(rect.angle),
        )))
    }

    fn contour_area(&self, points: &[Point2]) -> CvResult<f64> {
        if points.len() < 3 {
            return Ok(0.0);
        }
        Ok(imgproc::contour_area(&to_vector(points), false)?)
    }

    fn face(&self, frame: &RgbImage, armor: &Armor) -> CvResult<GrayImage> {
        let (w, h) = armor.face_size();
        if armor.is_empty() || w == 0 || h == 0 || frame.width() == 0 || frame.height() == 0 {
            return Ok(GrayImage::new(0, 0));
        }

        let gray = to_mat(&image::imageops::grayscale(frame))?;
        let trans = Mat::from_slice_2d(&armor.rectify_transform().h)?;
        let mut warped = Mat::default();
        imgproc::warp_perspective(
            &gray,
            &mut warped,
            &trans,
            Size::new(w as i32, h as i32),
            imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            Scalar::all(0.0),
        )?;

        let mut binary = Mat::default();
        imgproc::threshold(
            &warped,
            &mut binary,
            0.0,
            255.0,
            imgproc::THRESH_BINARY | imgproc::THRESH_TRIANGLE,
        )?;

        let edge = w.min(h) as i32;
        let square = Rect::new((w as i32 - edge) / 2, (h as i32 - edge) / 2, edge, edge);
        let face = Mat::roi(&binary, square)?.try_clone()?;
        from_mat(&face)
    }
}
