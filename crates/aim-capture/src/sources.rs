//! Frame sources without camera hardware

use crate::camera::Camera;
use crate::{CaptureError, CaptureResult};
use aim_core::{Direction, Point2, RotatedRect};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

// ============================================================================
// IMAGE DIRECTORY
// ============================================================================

/// Replays the images of a directory in file name order
pub struct ImageDirCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    index: usize,
    looping: bool,
    interval: Duration,
}

impl ImageDirCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        trace!("Constructed.");
        Self {
            dir: dir.into(),
            files: Vec::new(),
            index: 0,
            looping: false,
            interval: Duration::ZERO,
        }
    }

    /// Start over after the last image
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Pause between frames, to mimic a camera frame rate
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    }
}

impl Camera for ImageDirCamera {
    fn open(&mut self) -> CaptureResult<()> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| CaptureError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| Self::is_image(path))
            .collect();
        if files.is_empty() {
            return Err(CaptureError::EmptyDirectory(self.dir.clone()));
        }
        files.sort();
        debug!("{} images in {}", files.len(), self.dir.display());
        self.files = files;
        self.index = 0;
        Ok(())
    }

    fn grab(&mut self) -> CaptureResult<Option<RgbImage>> {
        if self.index >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Ok(None);
            }
            self.index = 0;
        }
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        let path = &self.files[self.index];
        self.index += 1;
        Ok(Some(image::open(path)?.to_rgb8()))
    }

    fn close(&mut self) -> CaptureResult<()> {
        self.files.clear();
        Ok(())
    }
}

// ============================================================================
// SYNTHETIC BUFF
// ============================================================================

/// Renders a rotating buff: a center square, four plates on a circle and an
/// L-shaped hammer trailing the target plate.
pub struct SyntheticBuffCamera {
    width: u32,
    height: u32,
    color: Rgb<u8>,
    direction: Direction,
    /// Degrees per second
    speed: f64,
    fps: f64,
    radius: f64,
    frame_index: u64,
    frame_limit: Option<u64>,
}

impl SyntheticBuffCamera {
    pub fn new(width: u32, height: u32, color: Rgb<u8>) -> Self {
        trace!("Constructed.");
        Self {
            width,
            height,
            color,
            direction: Direction::CounterClockwise,
            speed: 60.0,
            fps: 60.0,
            radius: 120.0,
            frame_index: 0,
            frame_limit: None,
        }
    }

    pub fn with_rotation(mut self, direction: Direction, speed: f64) -> Self {
        self.direction = direction;
        self.speed = speed;
        self
    }

    /// Stop after `limit` frames
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Angle of the target plate in frame `index`, radians, measured from
    /// the image y axis toward x
    pub fn target_angle(&self, index: u64) -> f64 {
        let sign = match self.direction {
            Direction::Clockwise => -1.0,
            Direction::CounterClockwise => 1.0,
            Direction::Unknown => 0.0,
        };
        (sign * self.speed * index as f64 / self.fps).to_radians()
    }

    pub fn center(&self) -> Point2 {
        Point2::new(f64::from(self.width / 2), f64::from(self.height / 2))
    }

    fn on_circle(&self, angle: f64, radius: f64) -> Point2 {
        self.center() + Point2::new(angle.sin(), angle.cos()) * radius
    }

    /// Frame `index` of the sequence
    pub fn render(&self, index: u64) -> RgbImage {
        let mut frame = RgbImage::new(self.width, self.height);
        let phi = self.target_angle(index);
        // Long side tangential
        let tilt = -phi.to_degrees();

        fill_rect(&mut frame, &RotatedRect::new(self.center(), 16.0, 16.0, 0.0), self.color);
        for k in 0..4 {
            let angle = phi + f64::from(k) * std::f64::consts::FRAC_PI_2;
            let plate = RotatedRect::new(self.on_circle(angle, self.radius), 44.0, 34.0, tilt - f64::from(k) * 90.0);
            fill_rect(&mut frame, &plate, self.color);
        }

        // Hammer: two arms of an L around a corner ahead of the target
        let corner = self.on_circle(phi + 0.6, self.radius + 45.0);
        let radial = Point2::new(phi.sin(), phi.cos());
        let tangential = Point2::new(phi.cos(), -phi.sin());
        let arm_long = RotatedRect::new(corner + tangential * 38.0, 100.0, 24.0, tilt);
        let arm_short = RotatedRect::new(corner - radial * 28.0, 24.0, 80.0, tilt);
        fill_rect(&mut frame, &arm_long, self.color);
        fill_rect(&mut frame, &arm_short, self.color);
        frame
    }
}

impl Camera for SyntheticBuffCamera {
    fn open(&mut self) -> CaptureResult<()> {
        self.frame_index = 0;
        Ok(())
    }

    fn grab(&mut self) -> CaptureResult<Option<RgbImage>> {
        if self.frame_limit.is_some_and(|limit| self.frame_index >= limit) {
            return Ok(None);
        }
        let frame = self.render(self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) -> CaptureResult<()> {
        Ok(())
    }
}

/// Paint the pixels whose centers fall inside `rect`
fn fill_rect(frame: &mut RgbImage, rect: &RotatedRect, color: Rgb<u8>) {
    let corners = rect.points();
    let (min_x, max_x) = corners
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let (min_y, max_y) = corners
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(frame.width());
    let y1 = (max_y.ceil().max(0.0) as u32).min(frame.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point2::new(f64::from(x), f64::from(y));
            if inside_convex(&corners, &p) {
                frame.put_pixel(x, y, color);
            }
        }
    }
}

fn inside_convex(polygon: &[Point2; 4], p: &Point2) -> bool {
    let mut sign = 0.0;
    for i in 0..4 {
        let a = polygon[i];
        let b = polygon[(i + 1) % 4];
        let c = (b - a).cross(&(*p - a));
        if c != 0.0 {
            if sign != 0.0 && c.signum() != sign {
                return false;
            }
            sign = c.signum();
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(frame: &RgbImage) -> usize {
        frame.pixels().filter(|p| p[0] > 0).count()
    }

    #[test]
    fn test_synthetic_frames_rotate() {
        let mut camera = SyntheticBuffCamera::new(640, 480, Rgb([255, 0, 0]));
        camera.open().unwrap();
        let first = camera.grab().unwrap().unwrap();
        let second = camera.grab().unwrap().unwrap();

        assert_eq!(first.dimensions(), (640, 480));
        assert!(lit(&first) > 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_synthetic_center_is_lit() {
        let camera = SyntheticBuffCamera::new(640, 480, Rgb([255, 0, 0]));
        let frame = camera.render(0);
        assert_eq!(frame.get_pixel(320, 240)[0], 255);
    }

    #[test]
    fn test_frame_limit() {
        let mut camera = SyntheticBuffCamera::new(64, 48, Rgb([0, 0, 255])).with_frame_limit(2);
        camera.open().unwrap();
        assert!(camera.grab().unwrap().is_some());
        assert!(camera.grab().unwrap().is_some());
        assert!(camera.grab().unwrap().is_none());
    }

    #[test]
    fn test_clockwise_angle_decreases() {
        let camera = SyntheticBuffCamera::new(64, 48, Rgb([255, 0, 0])).with_rotation(Direction::Clockwise, 30.0);
        assert!(camera.target_angle(10) < camera.target_angle(0));
    }

    #[test]
    fn test_image_dir_replays_sorted() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([2, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([1, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let mut camera = ImageDirCamera::new(dir.path());
        camera.open().unwrap();
        assert_eq!(camera.grab().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(camera.grab().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert!(camera.grab().unwrap().is_none());
    }

    #[test]
    fn test_image_dir_loops() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 4).save(dir.path().join("a.png")).unwrap();

        let mut camera = ImageDirCamera::new(dir.path()).looping(true);
        camera.open().unwrap();
        for _ in 0..3 {
            assert!(camera.grab().unwrap().is_some());
        }
    }

    #[test]
    fn test_empty_dir_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = ImageDirCamera::new(dir.path());
        assert!(matches!(camera.open(), Err(CaptureError::EmptyDirectory(_))));
    }
}
