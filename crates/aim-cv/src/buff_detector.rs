//! Rotating buff detection
//!
//! The enemy-colored glow is isolated by a channel difference, binarized and
//! cleaned up morphologically. Every contour is then measured independently
//! and sorted into the rotation center, the hammer icon and armor plates by
//! area and aspect-ratio bands relative to the center plate.

use crate::detector::{DetectionStats, Detector};
use crate::oracle::{self, Contour, ImageOracle, OpenCvOracle};
use crate::overlay::Overlay;
use crate::{CvResult, Frame};
use aim_core::{Armor, Buff, Point2, RotatedRect, Team};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Buff detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffDetectorParams {
    /// Threshold on the color difference image
    pub binary_th: f64,
    /// Half-size of the square morphology kernel
    pub se_erosion: u32,
    /// Polygon approximation epsilon
    pub ap_erosion: f64,

    /// Contours with fewer points are ignored
    pub contour_size_low_th: usize,
    pub rect_ratio_low_th: f64,
    pub rect_ratio_high_th: f64,

    pub contour_center_area_low_th: f64,
    pub contour_center_area_high_th: f64,
    pub rect_center_ratio_low_th: f64,
    pub rect_center_ratio_high_th: f64,
}

impl Default for BuffDetectorParams {
    fn default() -> Self {
        Self {
            binary_th: 220.0,
            se_erosion: 2,
            ap_erosion: 1.0,
            contour_size_low_th: 2,
            rect_ratio_low_th: 0.4,
            rect_ratio_high_th: 2.5,
            contour_center_area_low_th: 100.0,
            contour_center_area_high_th: 1000.0,
            rect_center_ratio_low_th: 0.6,
            rect_center_ratio_high_th: 1.67,
        }
    }
}

fn in_band(value: f64, low: f64, high: f64) -> bool {
    low <= value && value <= high
}

/// Measurements of one contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShapeMetrics {
    pub rect: RotatedRect,
    pub contour_area: f64,
    pub rect_area: f64,
    pub ratio: f64,
}

impl ShapeMetrics {
    pub fn new(rect: RotatedRect, contour_area: f64) -> Self {
        Self {
            rect,
            contour_area,
            rect_area: rect.area(),
            ratio: rect.aspect_ratio(),
        }
    }
}

impl BuffDetectorParams {
    fn is_center(&self, s: &ShapeMetrics) -> bool {
        in_band(
            s.contour_area,
            self.contour_center_area_low_th,
            self.contour_center_area_high_th,
        ) && in_band(
            s.ratio,
            self.rect_center_ratio_low_th,
            self.rect_center_ratio_high_th,
        )
    }

    fn is_armor(&self, s: &ShapeMetrics, center_area: f64) -> bool {
        in_band(s.ratio, self.rect_ratio_low_th, self.rect_ratio_high_th)
            && in_band(s.rect_area, 3.0 * center_area, 15.0 * center_area)
            && in_band(s.contour_area, 0.8 * s.rect_area, 1.2 * s.rect_area)
    }
}

fn is_hammer(s: &ShapeMetrics, center_area: f64) -> bool {
    s.rect_area > 1.2 * s.contour_area && in_band(s.rect_area, 20.0 * center_area, 80.0 * center_area)
}

/// Sub-contours of the hammer are as large as armor plates
fn excluded_by_hammer(s: &ShapeMetrics, hammer: &RotatedRect) -> bool {
    let area = hammer.area();
    area > 0.0 && (s.contour_area > 1.5 * area || s.rect_area > 0.7 * area)
}

/// Larger rectangle first, then the lexicographically smaller center
fn larger(a: &&ShapeMetrics, b: &&ShapeMetrics) -> Ordering {
    a.rect_area
        .partial_cmp(&b.rect_area)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.rect.center.lexicographic_cmp(&a.rect.center))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Classification {
    pub center: Option<RotatedRect>,
    pub hammer: RotatedRect,
    pub armors: Vec<RotatedRect>,
}

/// Sort measured contours into center, hammer and armor candidates.
///
/// The result does not depend on the order of `shapes`: among several
/// qualifying centers or hammers the largest rectangle wins, and armors are
/// returned in lexicographic center order.
pub(crate) fn classify(params: &BuffDetectorParams, shapes: &[ShapeMetrics]) -> Classification {
    let center = shapes.iter().filter(|s| params.is_center(s)).max_by(larger);
    let center_area = center.map_or(params.contour_center_area_low_th * 1.5, |s| s.rect_area);

    let hammer = shapes
        .iter()
        .filter(|s| !params.is_center(s) && is_hammer(s, center_area))
        .max_by(larger)
        .map(|s| s.rect)
        .unwrap_or_default();

    let accept = |s: &ShapeMetrics| {
        !params.is_center(s)
            && !is_hammer(s, center_area)
            && !excluded_by_hammer(s, &hammer)
            && params.is_armor(s, center_area)
    };

    #[cfg(feature = "parallel")]
    let mut armors: Vec<RotatedRect> = shapes.par_iter().filter(|s| accept(s)).map(|s| s.rect).collect();
    #[cfg(not(feature = "parallel"))]
    let mut armors: Vec<RotatedRect> = shapes.iter().filter(|s| accept(s)).map(|s| s.rect).collect();
    armors.sort_by(|a, b| a.center.lexicographic_cmp(&b.center));

    Classification {
        center: center.map(|s| s.rect),
        hammer,
        armors,
    }
}

/// Buff detector
pub struct BuffDetector<O: ImageOracle = OpenCvOracle> {
    params: BuffDetectorParams,
    enemy_team: Team,
    oracle: O,
    contours: Vec<Contour>,
    polygons: Vec<Vec<Point2>>,
    rects: Vec<RotatedRect>,
    center: Point2,
    hammer: RotatedRect,
    buff: Buff,
    stats: DetectionStats,
}

impl BuffDetector<OpenCvOracle> {
    pub fn new(enemy_team: Team) -> Self {
        Self::with_oracle(OpenCvOracle, enemy_team)
    }
}

impl<O: ImageOracle> BuffDetector<O> {
    pub fn with_oracle(oracle: O, enemy_team: Team) -> Self {
        trace!("Constructed.");
        Self {
            params: BuffDetectorParams::default(),
            enemy_team,
            oracle,
            contours: Vec::new(),
            polygons: Vec::new(),
            rects: Vec::new(),
            center: Point2::ORIGIN,
            hammer: RotatedRect::default(),
            buff: Buff::empty(),
            stats: DetectionStats::default(),
        }
    }

    pub fn set_enemy_team(&mut self, enemy_team: Team) {
        if enemy_team == Team::Unknown {
            warn!("Enemy team unknown, isolating the red glow.");
        }
        self.enemy_team = enemy_team;
    }

    pub fn enemy_team(&self) -> Team {
        self.enemy_team
    }

    pub fn stats(&self) -> &DetectionStats {
        &self.stats
    }

    /// Last detected buff
    pub fn buff(&self) -> &Buff {
        &self.buff
    }

    fn measure(&self, contour: &Contour) -> CvResult<Option<ShapeMetrics>> {
        if contour.points.len() < self.params.contour_size_low_th {
            return Ok(None);
        }
        let rect = self.oracle.min_area_rect(&contour.points)?;
        let contour_area = self.oracle.contour_area(&contour.points)?;
        Ok(Some(ShapeMetrics::new(rect, contour_area)))
    }

    fn find_rects(&mut self, frame: &Frame) -> CvResult<()> {
        let start = Instant::now();
        let params = &self.params;

        let binary = oracle::binarize(
            &self.oracle,
            frame,
            self.enemy_team,
            params.binary_th,
            params.se_erosion,
        )?;
        let contours = self.oracle.find_contours(&binary)?;
        let polygons = contours
            .iter()
            .map(|c| self.oracle.approx_poly(&c.points, params.ap_erosion))
            .collect::<CvResult<Vec<_>>>()?;
        debug!("Found contours: {}", contours.len());

        #[cfg(feature = "parallel")]
        let measured = contours
            .par_iter()
            .map(|c| self.measure(c))
            .collect::<CvResult<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let measured = contours
            .iter()
            .map(|c| self.measure(c))
            .collect::<CvResult<Vec<_>>>()?;
        let shapes: Vec<ShapeMetrics> = measured.into_iter().flatten().collect();

        let classified = classify(params, &shapes);
        if let Some(center) = &classified.center {
            debug!("center's area is {}", center.area());
        }
        debug!("the buff's hammer area is {}", classified.hammer.area());

        self.center = classified.center.map_or(Point2::ORIGIN, |r| r.center);
        self.hammer = classified.hammer;
        self.rects = classified.armors;
        self.contours = contours;
        self.polygons = polygons;
        self.stats.find_time = start.elapsed();
        Ok(())
    }

    fn match_armors(&mut self) {
        let start = Instant::now();
        let armors: Vec<Armor> = self.rects.iter().map(Armor::from_rect).collect();
        debug!("armors.size is {}", armors.len());

        self.stats.candidates_found += armors.len() as u64;
        self.buff = Buff::new(self.center, self.hammer, armors);
        if self.buff.target().is_empty() {
            debug!("can't find buff armor");
        }
        self.stats.match_time = start.elapsed();
    }

    fn visualize_armors(&self, overlay: &mut Overlay, add_label: bool) {
        let palette = overlay.palette().clone();
        let target = self.buff.target();

        for armor in self.buff.armors() {
            if armor.vertices() == target.vertices() {
                continue;
            }
            overlay.polygon(armor.vertices(), palette.candidate, 1);
            overlay.marker(armor.center(), palette.candidate);
            if add_label {
                let c = armor.center();
                overlay.label(format!("{:.2}, {:.2}", c.x, c.y), armor.vertices()[1], palette.candidate);
            }
        }

        if !target.is_empty() {
            overlay.polygon(target.vertices(), palette.target, 1);
            overlay.marker(target.center(), palette.target);
            if add_label {
                let c = target.center();
                overlay.label(format!("{:.2}, {:.2}", c.x, c.y), target.vertices()[1], palette.target);
            }
        }
    }
}

impl<O: ImageOracle> Detector for BuffDetector<O> {
    type Target = Buff;
    type Params = BuffDetectorParams;

    fn params(&self) -> &BuffDetectorParams {
        &self.params
    }

    fn set_params(&mut self, params: BuffDetectorParams) {
        self.params = params;
    }

    fn default_params(&self) -> BuffDetectorParams {
        BuffDetectorParams::default()
    }

    fn detect(&mut self, frame: &Frame) -> CvResult<Vec<Buff>> {
        debug!("Detecting");
        self.find_rects(frame)?;
        self.match_armors();
        self.stats.frames_processed += 1;
        debug!("Detected.");
        Ok(vec![self.buff.clone()])
    }

    fn visualize_result(&self, overlay: &mut Overlay, verbose: i32) {
        if verbose <= 0 {
            return;
        }
        let palette = overlay.palette().clone();

        if verbose > 10 {
            for contour in &self.contours {
                overlay.polygon(&contour.points, palette.contour, 1);
            }
            for polygon in &self.polygons {
                overlay.polygon(polygon, palette.polygon, 1);
            }
        }

        if verbose > 1 {
            overlay.status(format!(
                "{} armors in {} ms.",
                self.buff.armors().len(),
                self.stats.match_time.as_millis()
            ));
            overlay.status(format!(
                "{} rects in {} ms.",
                self.rects.len(),
                self.stats.find_time.as_millis()
            ));
        }

        if verbose > 3 {
            overlay.polygon(&self.hammer.points(), palette.target, 1);
            overlay.marker(self.buff.center(), palette.target);
        }

        self.visualize_armors(overlay, verbose > 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(x: f64, y: f64, w: f64, h: f64, contour_area: f64) -> ShapeMetrics {
        ShapeMetrics::new(RotatedRect::new(Point2::new(x, y), w, h, 0.0), contour_area)
    }

    /// Center 23x23, hammer 123x103 with an L-shaped contour, four plates
    fn scene() -> Vec<ShapeMetrics> {
        vec![
            shape(320.0, 240.0, 23.0, 23.0, 529.0),
            shape(440.0, 90.0, 123.0, 103.0, 6369.0),
            shape(320.0, 90.0, 53.0, 43.0, 2279.0),
            shape(470.0, 240.0, 43.0, 53.0, 2279.0),
            shape(320.0, 390.0, 53.0, 43.0, 2279.0),
            shape(170.0, 240.0, 43.0, 53.0, 2279.0),
        ]
    }

    #[test]
    fn test_classify_scene() {
        let result = classify(&BuffDetectorParams::default(), &scene());
        assert_eq!(result.center.unwrap().center, Point2::new(320.0, 240.0));
        assert_eq!(result.hammer.center, Point2::new(440.0, 90.0));
        assert_eq!(result.armors.len(), 4);
    }

    #[test]
    fn test_classify_is_order_independent() {
        let params = BuffDetectorParams::default();
        let forward = classify(&params, &scene());
        let mut reversed = scene();
        reversed.reverse();
        let mut rotated = scene();
        rotated.rotate_left(3);

        assert_eq!(forward, classify(&params, &reversed));
        assert_eq!(forward, classify(&params, &rotated));
    }

    #[test]
    fn test_largest_center_wins() {
        let params = BuffDetectorParams::default();
        let shapes = vec![
            shape(100.0, 100.0, 15.0, 15.0, 225.0),
            shape(200.0, 200.0, 25.0, 25.0, 625.0),
        ];
        let result = classify(&params, &shapes);
        assert_eq!(result.center.unwrap().center, Point2::new(200.0, 200.0));
    }

    #[test]
    fn test_center_band_is_inclusive() {
        let params = BuffDetectorParams::default();
        let edge = shape(50.0, 50.0, 10.0, 10.0, params.contour_center_area_low_th);
        assert!(params.is_center(&edge));
    }

    #[test]
    fn test_hammer_guard_rejects_large_candidates() {
        let hammer = RotatedRect::new(Point2::ORIGIN, 100.0, 100.0, 0.0);
        assert!(excluded_by_hammer(&shape(0.0, 0.0, 90.0, 90.0, 8100.0), &hammer));
        assert!(!excluded_by_hammer(&shape(0.0, 0.0, 50.0, 40.0, 2000.0), &hammer));
        assert!(!excluded_by_hammer(
            &shape(0.0, 0.0, 90.0, 90.0, 8100.0),
            &RotatedRect::default()
        ));
    }

    #[test]
    fn test_no_center_uses_fallback_area() {
        // 150 px² fallback: plates must lie within [450, 2250]
        let params = BuffDetectorParams::default();
        let shapes = vec![shape(10.0, 10.0, 40.0, 16.0, 640.0), shape(90.0, 10.0, 53.0, 43.0, 2279.0)];
        let result = classify(&params, &shapes);
        assert!(result.center.is_none());
        assert_eq!(result.armors.len(), 1);
        assert_eq!(result.armors[0].center, Point2::new(10.0, 10.0));
    }

    #[test]
    fn test_black_frame_yields_empty_buff() {
        let mut detector = BuffDetector::new(Team::Red);
        let frame = Frame::new(64, 48);
        let buffs = detector.detect(&frame).unwrap();

        assert_eq!(buffs.len(), 1);
        assert!(buffs[0].armors().is_empty());
        assert!(buffs[0].target().is_empty());
        assert!(buffs[0].center().is_origin());
        assert_eq!(detector.stats().frames_processed, 1);
    }

    #[test]
    fn test_visualize_noop_for_zero_verbosity() {
        let detector = BuffDetector::new(Team::Blue);
        let mut overlay = Overlay::default();
        detector.visualize_result(&mut overlay, 0);
        detector.visualize_result(&mut overlay, -3);
        assert!(overlay.is_empty());
    }
}
