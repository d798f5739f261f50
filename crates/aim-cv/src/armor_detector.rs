//! Armor plate detection from paired light bars
//!
//! Armor plates are flanked by two glowing bars. Bars are found as elongated,
//! roughly upright contours of the enemy color; two bars of similar length
//! and tilt, side by side at plate distance, make one armor.

use crate::detector::{DetectionStats, Detector};
use crate::oracle::{self, Contour, ImageOracle, OpenCvOracle};
use crate::overlay::Overlay;
use crate::{CvResult, Frame};
use aim_core::{Armor, Point2, RotatedRect, Team};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Armor detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorDetectorParams {
    pub binary_th: f64,
    pub se_erosion: u32,
    pub ap_erosion: f64,

    pub contour_size_low_th: usize,
    pub contour_area_low_th: f64,
    pub contour_area_high_th: f64,
    /// Long over short side of a bar
    pub bar_ratio_low_th: f64,
    pub bar_ratio_high_th: f64,
    /// Degrees from upright
    pub bar_tilt_high_th: f64,

    /// Degrees between the two bars of a plate
    pub angle_diff_th: f64,
    /// Longer over shorter bar
    pub length_ratio_high_th: f64,
    /// Bar distance in mean bar lengths
    pub center_dist_low_th: f64,
    pub center_dist_high_th: f64,
    /// Vertical bar offset in mean bar lengths
    pub height_diff_th: f64,
}

impl Default for ArmorDetectorParams {
    fn default() -> Self {
        Self {
            binary_th: 100.0,
            se_erosion: 1,
            ap_erosion: 1.0,
            contour_size_low_th: 4,
            contour_area_low_th: 20.0,
            contour_area_high_th: 5000.0,
            bar_ratio_low_th: 2.0,
            bar_ratio_high_th: 20.0,
            bar_tilt_high_th: 30.0,
            angle_diff_th: 10.0,
            length_ratio_high_th: 1.6,
            center_dist_low_th: 1.0,
            center_dist_high_th: 5.0,
            height_diff_th: 0.5,
        }
    }
}

impl ArmorDetectorParams {
    /// Small, dim plates seen from the far side of the field
    pub fn long_range() -> Self {
        Self {
            binary_th: 60.0,
            contour_size_low_th: 3,
            contour_area_low_th: 4.0,
            contour_area_high_th: 800.0,
            bar_ratio_low_th: 1.5,
            length_ratio_high_th: 2.0,
            height_diff_th: 0.8,
            ..Default::default()
        }
    }
}

/// Parameter profile of an [`ArmorDetector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmorProfile {
    Armor,
    Snipe,
}

impl fmt::Display for ArmorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmorProfile::Armor => write!(f, "armor"),
            ArmorProfile::Snipe => write!(f, "snipe"),
        }
    }
}

/// One glowing bar beside an armor plate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightBar {
    pub center: Point2,
    pub length: f64,
    pub width: f64,
    /// Degrees from upright, positive when the lower end leans right
    pub tilt: f64,
    pub top: Point2,
    pub bottom: Point2,
}

impl LightBar {
    pub fn from_rect(rect: &RotatedRect) -> Self {
        let (length, width, axis_deg) = if rect.width >= rect.height {
            (rect.width, rect.height, rect.angle)
        } else {
            (rect.height, rect.width, rect.angle + 90.0)
        };
        let (sin, cos) = axis_deg.to_radians().sin_cos();
        let mut axis = Point2::new(cos, sin);
        if axis.y < 0.0 || (axis.y == 0.0 && axis.x < 0.0) {
            axis = axis * -1.0;
        }
        let half = axis * (length / 2.0);
        Self {
            center: rect.center,
            length,
            width,
            tilt: axis.x.atan2(axis.y).to_degrees(),
            top: rect.center - half,
            bottom: rect.center + half,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.length / self.width
    }
}

impl ArmorDetectorParams {
    fn is_bar(&self, bar: &LightBar, contour_area: f64) -> bool {
        self.contour_area_low_th <= contour_area
            && contour_area <= self.contour_area_high_th
            && self.bar_ratio_low_th <= bar.ratio()
            && bar.ratio() <= self.bar_ratio_high_th
            && bar.tilt.abs() <= self.bar_tilt_high_th
    }

    /// Pairing cost of two bars, `None` when they can not flank one plate
    fn pair_score(&self, a: &LightBar, b: &LightBar) -> Option<f64> {
        let tilt_diff = (a.tilt - b.tilt).abs();
        if tilt_diff > self.angle_diff_th {
            return None;
        }
        let (short, long) = if a.length < b.length {
            (a.length, b.length)
        } else {
            (b.length, a.length)
        };
        if short <= 0.0 || long / short > self.length_ratio_high_th {
            return None;
        }
        let mean = (a.length + b.length) / 2.0;
        let dist = a.center.distance_to(&b.center) / mean;
        if dist < self.center_dist_low_th || dist > self.center_dist_high_th {
            return None;
        }
        let height_diff = (a.center.y - b.center.y).abs() / mean;
        if height_diff > self.height_diff_th {
            return None;
        }
        Some(tilt_diff / self.angle_diff_th.max(f64::EPSILON) + height_diff)
    }
}

/// Greedy pairing, best score first; each bar is used at most once
pub(crate) fn match_bars(params: &ArmorDetectorParams, bars: &[LightBar]) -> Vec<Armor> {
    let mut pairs = Vec::new();
    for i in 0..bars.len() {
        for j in (i + 1)..bars.len() {
            if let Some(score) = params.pair_score(&bars[i], &bars[j]) {
                pairs.push((score, i, j));
            }
        }
    }
    pairs.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (a.1, a.2).cmp(&(b.1, b.2)))
    });

    let mut used = vec![false; bars.len()];
    let mut armors = Vec::new();
    for (_, i, j) in pairs {
        if used[i] || used[j] {
            continue;
        }
        used[i] = true;
        used[j] = true;
        let (left, right) = if bars[i].center.x <= bars[j].center.x {
            (&bars[i], &bars[j])
        } else {
            (&bars[j], &bars[i])
        };
        armors.push(Armor::from_vertices([left.bottom, left.top, right.top, right.bottom]));
    }
    armors.sort_by(|a, b| a.center().lexicographic_cmp(&b.center()));
    armors
}

/// Armor detector, also used with the long-range profile for sniping
pub struct ArmorDetector<O: ImageOracle = OpenCvOracle> {
    profile: ArmorProfile,
    params: ArmorDetectorParams,
    enemy_team: Team,
    oracle: O,
    contours: Vec<Contour>,
    bars: Vec<LightBar>,
    armors: Vec<Armor>,
    stats: DetectionStats,
}

impl ArmorDetector<OpenCvOracle> {
    pub fn new(profile: ArmorProfile, enemy_team: Team) -> Self {
        Self::with_oracle(OpenCvOracle, profile, enemy_team)
    }
}

impl<O: ImageOracle> ArmorDetector<O> {
    pub fn with_oracle(oracle: O, profile: ArmorProfile, enemy_team: Team) -> Self {
        trace!("Constructed {} detector.", profile);
        let mut detector = Self {
            profile,
            params: ArmorDetectorParams::default(),
            enemy_team,
            oracle,
            contours: Vec::new(),
            bars: Vec::new(),
            armors: Vec::new(),
            stats: DetectionStats::default(),
        };
        detector.params = detector.default_params();
        detector
    }

    pub fn set_enemy_team(&mut self, enemy_team: Team) {
        if enemy_team == Team::Unknown {
            warn!("Enemy team unknown, isolating the red glow.");
        }
        self.enemy_team = enemy_team;
    }

    pub fn profile(&self) -> ArmorProfile {
        self.profile
    }

    pub fn stats(&self) -> &DetectionStats {
        &self.stats
    }

    pub fn bars(&self) -> &[LightBar] {
        &self.bars
    }

    fn measure(&self, contour: &Contour) -> CvResult<Option<LightBar>> {
        if contour.is_hole || contour.points.len() < self.params.contour_size_low_th {
            return Ok(None);
        }
        let rect = self.oracle.min_area_rect(&contour.points)?;
        let area = self.oracle.contour_area(&contour.points)?;
        let bar = LightBar::from_rect(&rect);
        Ok(self.params.is_bar(&bar, area).then_some(bar))
    }

    fn find_bars(&mut self, frame: &Frame) -> CvResult<()> {
        let start = Instant::now();
        let binary = oracle::binarize(
            &self.oracle,
            frame,
            self.enemy_team,
            self.params.binary_th,
            self.params.se_erosion,
        )?;
        let contours = self.oracle.find_contours(&binary)?;
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

        let mut bars: Vec<LightBar> = measured.into_iter().flatten().collect();
        bars.sort_by(|a, b| a.center.lexicographic_cmp(&b.center));
        debug!("Found light bars: {}", bars.len());

        self.contours = contours;
        self.bars = bars;
        self.stats.find_time = start.elapsed();
        Ok(())
    }

    fn match_armors(&mut self) {
        let start = Instant::now();
        self.armors = match_bars(&self.params, &self.bars);
        self.stats.candidates_found += self.armors.len() as u64;
        debug!("Found armors: {}", self.armors.len());
        self.stats.match_time = start.elapsed();
    }
}

impl<O: ImageOracle> Detector for ArmorDetector<O> {
    type Target = Armor;
    type Params = ArmorDetectorParams;

    fn params(&self) -> &ArmorDetectorParams {
        &self.params
    }

    fn set_params(&mut self, params: ArmorDetectorParams) {
        self.params = params;
    }

    fn default_params(&self) -> ArmorDetectorParams {
        match self.profile {
            ArmorProfile::Armor => ArmorDetectorParams::default(),
            ArmorProfile::Snipe => ArmorDetectorParams::long_range(),
        }
    }

    fn detect(&mut self, frame: &Frame) -> CvResult<Vec<Armor>> {
        debug!("Detecting");
        self.find_bars(frame)?;
        self.match_armors();
        self.stats.frames_processed += 1;
        debug!("Detected.");
        Ok(self.armors.clone())
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
        }

        if verbose > 1 {
            overlay.status(format!(
                "{} bars in {} ms.",
                self.bars.len(),
                self.stats.find_time.as_millis()
            ));
            overlay.status(format!(
                "{} armors in {} ms.",
                self.armors.len(),
                self.stats.match_time.as_millis()
            ));
        }

        if verbose > 3 {
            for bar in &self.bars {
                overlay.line(bar.top, bar.bottom, palette.polygon, 1);
            }
        }

        for armor in &self.armors {
            overlay.polygon(armor.vertices(), palette.candidate, 1);
            if verbose > 2 {
                overlay.label(armor.label().to_string(), armor.vertices()[1], palette.candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;

    fn paint(frame: &mut Frame, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                frame.put_pixel(x, y, color);
            }
        }
    }

    fn upright(x: f64, y: f64, length: f64) -> LightBar {
        LightBar::from_rect(&RotatedRect::new(Point2::new(x, y), 5.0, length, 0.0))
    }

    #[test]
    fn test_light_bar_orientation() {
        let bar = upright(10.0, 50.0, 30.0);
        assert_relative_eq!(bar.length, 30.0);
        assert_relative_eq!(bar.tilt, 0.0, epsilon = 1e-9);
        assert!(bar.top.y < bar.bottom.y);
        assert_relative_eq!(bar.top.y, 35.0, epsilon = 1e-9);
    }

    #[test]
    fn test_match_bars_pairs_neighbours() {
        let params = ArmorDetectorParams::default();
        let bars = vec![
            upright(100.0, 100.0, 30.0),
            upright(160.0, 100.0, 30.0),
            upright(400.0, 100.0, 30.0),
        ];
        let armors = match_bars(&params, &bars);
        assert_eq!(armors.len(), 1);
        assert_relative_eq!(armors[0].center().x, 130.0, epsilon = 1e-9);
        assert_relative_eq!(armors[0].center().y, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bar_used_once() {
        let params = ArmorDetectorParams::default();
        let bars = vec![
            upright(100.0, 100.0, 30.0),
            upright(150.0, 100.0, 30.0),
            upright(200.0, 100.0, 30.0),
        ];
        assert_eq!(match_bars(&params, &bars).len(), 1);
    }

    #[test]
    fn test_detect_synthetic_plate() {
        let mut frame = Frame::new(320, 200);
        paint(&mut frame, 97, 85, 6, 30, Rgb([255, 0, 0]));
        paint(&mut frame, 157, 85, 6, 30, Rgb([255, 0, 0]));
        // Own-team bars are ignored
        paint(&mut frame, 250, 85, 6, 30, Rgb([0, 0, 255]));

        let mut detector = ArmorDetector::new(ArmorProfile::Armor, Team::Red);
        let armors = detector.detect(&frame).unwrap();

        assert_eq!(detector.bars().len(), 2);
        assert_eq!(armors.len(), 1);
        assert!((armors[0].center().x - 129.5).abs() < 1.0);
        assert!((armors[0].center().y - 99.5).abs() < 1.0);
    }

    #[test]
    fn test_profiles_have_distinct_defaults() {
        let armor = ArmorDetector::new(ArmorProfile::Armor, Team::Blue);
        let snipe = ArmorDetector::new(ArmorProfile::Snipe, Team::Blue);
        assert_eq!(armor.params(), &ArmorDetectorParams::default());
        assert_eq!(snipe.params(), &ArmorDetectorParams::long_range());
        assert!(snipe.params().contour_area_low_th < armor.params().contour_area_low_th);
    }
}
