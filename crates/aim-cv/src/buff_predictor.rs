//! Rotating buff prediction
//!
//! The spin direction is fixed once from five target samples. The angle the
//! target travels during the system latency comes from integrating the
//! angular speed model `a + b·sin(ω·t)` over `[t, t + Δ]`, where `t` is the
//! time left in the engagement window.

use crate::overlay::Overlay;
use crate::{params, CvResult};
use aim_core::{Armor, Buff, Direction, Point2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Samples needed to decide the spin direction
pub const DIRECTION_SAMPLES: usize = 5;

/// Motion model constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffPredictorParams {
    /// Total system latency Δ in seconds
    pub delay: f64,
    /// Constant speed term `a`, degrees per second
    pub speed_offset: f64,
    /// Oscillating speed amplitude `b`, degrees per second
    pub speed_amplitude: f64,
    /// Angular frequency `ω` of the speed oscillation, radians per second
    pub angular_frequency: f64,
    /// Length of the engagement window in seconds
    pub engagement_secs: f64,
}

impl Default for BuffPredictorParams {
    fn default() -> Self {
        Self {
            delay: 3.0,
            speed_offset: 1.305,
            speed_amplitude: 0.785,
            angular_frequency: 1.884,
            engagement_secs: 90.0,
        }
    }
}

impl BuffPredictorParams {
    /// Degrees travelled over `[t, t + Δ]`
    pub fn predicted_angle(&self, t: f64) -> f64 {
        let (a, b, w, d) = (
            self.speed_offset,
            self.speed_amplitude,
            self.angular_frequency,
            self.delay,
        );
        a * d + b / w * ((w * t).cos() - (w * (t + d)).cos())
    }
}

/// Angle of `p` around `center`, measured from the image y axis
fn rotated_angle(p: &Point2, center: &Point2) -> f64 {
    let rel = *p - *center;
    rel.x.atan2(rel.y)
}

/// Wrap into `[-π, π)`
fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Spin direction from consecutive samples around `center`, `Unknown` when
/// the deltas cancel out exactly.
pub fn direction_from_samples(samples: &[Point2], center: &Point2) -> Direction {
    let angles: Vec<f64> = samples.iter().map(|p| rotated_angle(p, center)).collect();
    let sum: f64 = angles.windows(2).map(|w| wrap_angle(w[1] - w[0])).sum();
    if sum > 0.0 {
        Direction::CounterClockwise
    } else if sum < 0.0 {
        Direction::Clockwise
    } else {
        Direction::Unknown
    }
}

pub struct BuffPredictor {
    params: BuffPredictorParams,
    direction: Direction,
    samples: VecDeque<Point2>,
    buff: Buff,
    predict: Armor,
    end_time: Instant,
    /// Candidate count when the session started
    initial_count: Option<usize>,
    duration_direction: Duration,
    duration_predict: Duration,
}

impl Default for BuffPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl BuffPredictor {
    pub fn new() -> Self {
        let mut predictor = Self {
            params: BuffPredictorParams::default(),
            direction: Direction::Unknown,
            samples: VecDeque::with_capacity(DIRECTION_SAMPLES),
            buff: Buff::empty(),
            predict: Armor::empty(),
            end_time: Instant::now(),
            initial_count: None,
            duration_direction: Duration::ZERO,
            duration_predict: Duration::ZERO,
        };
        predictor.set_time(0.0);
        trace!("Constructed.");
        predictor
    }

    /// Start a session from already detected buffs, oldest first
    pub fn with_buffs(buffs: &[Buff]) -> Self {
        let mut predictor = Self::new();
        predictor.start_session(buffs);
        predictor
    }

    /// Forget the direction and samples and start over from `buffs`
    pub fn start_session(&mut self, buffs: &[Buff]) {
        self.direction = Direction::Unknown;
        self.samples.clear();
        self.predict = Armor::empty();
        self.buff = Buff::empty();
        self.initial_count = None;
        for buff in buffs {
            self.push_sample(buff.target().center());
            self.set_buff(buff.clone());
        }
        debug!("Session started with {} samples", self.samples.len());
    }

    pub fn load_params(&mut self, path: &Path) -> CvResult<()> {
        self.params = params::load_or_init(path, BuffPredictorParams::default)?;
        Ok(())
    }

    pub fn params(&self) -> &BuffPredictorParams {
        &self.params
    }

    /// Latest detection. The first one with candidates fixes the count that
    /// `reset_time` compares against.
    pub fn set_buff(&mut self, buff: Buff) {
        debug!("Buff center is {}, {}", buff.center().x, buff.center().y);
        if self.initial_count.is_none() && !buff.armors().is_empty() {
            self.initial_count = Some(buff.armors().len());
        }
        self.buff = buff;
    }

    pub fn buff(&self) -> &Buff {
        &self.buff
    }

    pub fn prediction(&self) -> &Armor {
        &self.predict
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Start the engagement window `time` seconds ago
    pub fn set_time(&mut self, time: f64) {
        self.set_time_at(time, Instant::now());
    }

    pub fn set_time_at(&mut self, time: f64, now: Instant) {
        let remaining = Duration::try_from_secs_f64((self.params.engagement_secs - time).max(0.0))
            .unwrap_or(Duration::ZERO);
        self.end_time = now + remaining;

        let wall = chrono::Local::now();
        let end = wall + chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::zero());
        debug!(
            "Engagement deadline {} (now {})",
            end.format("%H:%M:%S%.3f"),
            wall.format("%H:%M:%S%.3f")
        );
    }

    /// Restart the window when candidates disappeared since the session
    /// started. Returns whether it was restarted.
    pub fn reset_time(&mut self) -> bool {
        let current = self.buff.armors().len();
        match self.initial_count {
            Some(initial) if current < initial => {
                self.set_time(0.0);
                info!("Reset time ({} of {} armors).", current, initial);
                true
            }
            _ => false,
        }
    }

    /// Seconds left until the deadline
    pub fn time_left(&self, now: Instant) -> f64 {
        self.end_time.saturating_duration_since(now).as_secs_f64()
    }

    fn push_sample(&mut self, sample: Point2) {
        if sample.is_origin() {
            return;
        }
        if self.samples.len() == DIRECTION_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn match_direction(&mut self) {
        if self.direction != Direction::Unknown {
            return;
        }
        let start = Instant::now();
        self.push_sample(self.buff.target().center());

        let center = self.buff.center();
        if self.samples.len() == DIRECTION_SAMPLES && !center.is_origin() {
            let samples: Vec<Point2> = self.samples.iter().copied().collect();
            self.direction = direction_from_samples(&samples, &center);
            debug!("Buff's direction is {}", self.direction);
        }
        self.duration_direction = start.elapsed();
    }

    fn match_predict(&mut self, now: Instant) {
        let start = Instant::now();
        self.predict = Armor::empty();

        let center = self.buff.center();
        if center.is_origin() {
            warn!("Center is empty.");
            return;
        }
        if self.buff.target().is_empty() {
            warn!("Target center is empty.");
            return;
        }
        if self.direction == Direction::Unknown {
            debug!("Direction unknown, no prediction.");
            return;
        }

        let mut theta = self.params.predicted_angle(self.time_left(now));
        if self.direction == Direction::Clockwise {
            theta = -theta;
        }
        debug!("Delta theta : {} deg", theta);

        self.predict = self.buff.target().rotated(theta.to_radians(), &center);
        self.duration_predict = start.elapsed();
    }

    pub fn predict(&mut self) -> Vec<Armor> {
        self.predict_at(Instant::now())
    }

    /// Prediction relative to `now` as the current instant
    pub fn predict_at(&mut self, now: Instant) -> Vec<Armor> {
        debug!("Predicting.");
        self.match_direction();
        self.match_predict(now);
        debug!("Predicted.");
        vec![self.predict.clone()]
    }

    pub fn visualize_prediction(&self, overlay: &mut Overlay, verbose: i32) {
        if verbose <= 0 || self.predict.is_empty() {
            return;
        }
        let palette = overlay.palette().clone();

        overlay.polygon(self.predict.vertices(), palette.prediction, 8);
        overlay.line(self.buff.center(), self.predict.center(), palette.target, 3);

        if verbose > 2 {
            let c = self.predict.center();
            overlay.label(format!("{:.2}, {:.2}", c.x, c.y), self.predict.vertices()[1], palette.target);
            overlay.status(format!(
                "Direction {} in {} ms.",
                self.direction,
                self.duration_direction.as_millis()
            ));
            overlay.status(format!(
                "Find predict in {} ms.",
                self.duration_predict.as_millis()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::RotatedRect;
    use approx::assert_relative_eq;

    const CENTER: Point2 = Point2 { x: 320.0, y: 240.0 };

    /// Buff whose target sits at `phi` radians around the center
    fn buff_at(phi: f64, plates: usize) -> Buff {
        let p = CENTER + Point2::new(phi.sin(), phi.cos()) * 150.0;
        let mut armors = vec![Armor::from_rect(&RotatedRect::new(p, 53.0, 43.0, 0.0))];
        for k in 1..plates {
            let q = CENTER + Point2::new((phi + k as f64).sin(), (phi + k as f64).cos()) * 150.0;
            armors.push(Armor::from_rect(&RotatedRect::new(q, 53.0, 43.0, 0.0)));
        }
        let hammer = RotatedRect::new(p, 120.0, 100.0, 0.0);
        Buff::new(CENTER, hammer, armors)
    }

    fn feed(predictor: &mut BuffPredictor, phis: &[f64]) -> Vec<Armor> {
        let mut out = Vec::new();
        for &phi in phis {
            predictor.set_buff(buff_at(phi, 1));
            out = predictor.predict();
        }
        out
    }

    #[test]
    fn test_fewer_than_five_samples_stay_unknown() {
        let mut predictor = BuffPredictor::new();
        let out = feed(&mut predictor, &[0.0, 0.1, 0.2, 0.3]);
        assert_eq!(predictor.direction(), Direction::Unknown);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_empty());
    }

    #[test]
    fn test_increasing_angles_are_counter_clockwise() {
        let mut predictor = BuffPredictor::new();
        let out = feed(&mut predictor, &[0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(predictor.direction(), Direction::CounterClockwise);
        assert!(!out[0].is_empty());
    }

    #[test]
    fn test_decreasing_angles_are_clockwise() {
        let mut predictor = BuffPredictor::new();
        feed(&mut predictor, &[0.4, 0.3, 0.2, 0.1, 0.0]);
        assert_eq!(predictor.direction(), Direction::Clockwise);
    }

    #[test]
    fn test_deltas_wrap_across_pi() {
        let samples: Vec<Point2> = [3.0, 3.1, -3.1, -3.0, -2.9]
            .iter()
            .map(|phi: &f64| CENTER + Point2::new(phi.sin(), phi.cos()) * 100.0)
            .collect();
        assert_eq!(direction_from_samples(&samples, &CENTER), Direction::CounterClockwise);
    }

    #[test]
    fn test_stationary_target_stays_unknown() {
        let mut predictor = BuffPredictor::new();
        feed(&mut predictor, &[0.2; 6]);
        assert_eq!(predictor.direction(), Direction::Unknown);
    }

    #[test]
    fn test_direction_is_frozen() {
        let mut predictor = BuffPredictor::new();
        feed(&mut predictor, &[0.0, 0.1, 0.2, 0.3, 0.4]);
        feed(&mut predictor, &[0.4, 0.3, 0.2, 0.1, 0.0]);
        assert_eq!(predictor.direction(), Direction::CounterClockwise);
    }

    #[test]
    fn test_predicted_angle_at_zero() {
        let params = BuffPredictorParams::default();
        let expected = 1.305 * 3.0 + 0.785 / 1.884 * (1.0 - (1.884_f64 * 3.0).cos());
        assert_relative_eq!(params.predicted_angle(0.0), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_prediction_rotates_target_about_center() {
        let mut predictor = BuffPredictor::with_buffs(&[
            buff_at(0.0, 1),
            buff_at(0.1, 1),
            buff_at(0.2, 1),
            buff_at(0.3, 1),
        ]);
        let now = Instant::now();
        // Deadline reached: t = 0
        predictor.set_time_at(90.0, now);
        predictor.set_buff(buff_at(0.4, 1));
        let out = predictor.predict_at(now);

        assert_eq!(predictor.direction(), Direction::CounterClockwise);
        let theta = BuffPredictorParams::default().predicted_angle(0.0).to_radians();
        let target = predictor.buff().target().center();
        let expected = target.rotate_about(&CENTER, theta);
        assert_relative_eq!(out[0].center().x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(out[0].center().y, expected.y, epsilon = 1e-6);
    }

    #[test]
    fn test_clockwise_negates_angle() {
        let mut predictor = BuffPredictor::with_buffs(&[
            buff_at(0.4, 1),
            buff_at(0.3, 1),
            buff_at(0.2, 1),
            buff_at(0.1, 1),
        ]);
        let now = Instant::now();
        predictor.set_time_at(90.0, now);
        predictor.set_buff(buff_at(0.0, 1));
        let out = predictor.predict_at(now);

        assert_eq!(predictor.direction(), Direction::Clockwise);
        let theta = -BuffPredictorParams::default().predicted_angle(0.0).to_radians();
        let expected = predictor.buff().target().center().rotate_about(&CENTER, theta);
        assert_relative_eq!(out[0].center().x, expected.x, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_center_gives_sentinel() {
        let mut predictor = BuffPredictor::new();
        feed(&mut predictor, &[0.0, 0.1, 0.2, 0.3, 0.4]);
        predictor.set_buff(Buff::empty());
        assert!(predictor.predict()[0].is_empty());
        assert_eq!(predictor.direction(), Direction::CounterClockwise);
    }

    #[test]
    fn test_start_session_forgets_direction() {
        let mut predictor = BuffPredictor::new();
        feed(&mut predictor, &[0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(predictor.direction(), Direction::CounterClockwise);

        predictor.start_session(&[]);
        assert_eq!(predictor.direction(), Direction::Unknown);
        assert!(predictor.buff().center().is_origin());

        feed(&mut predictor, &[0.4, 0.3, 0.2, 0.1, 0.0]);
        assert_eq!(predictor.direction(), Direction::Clockwise);
    }

    #[test]
    fn test_reset_time_only_when_count_drops() {
        let mut predictor = BuffPredictor::with_buffs(&[buff_at(0.0, 3)]);
        predictor.set_buff(buff_at(0.1, 3));
        assert!(!predictor.reset_time());
        predictor.set_buff(buff_at(0.1, 4));
        assert!(!predictor.reset_time());
        predictor.set_buff(buff_at(0.2, 2));
        assert!(predictor.reset_time());
    }

    #[test]
    fn test_count_waits_for_candidates() {
        let mut predictor = BuffPredictor::new();
        predictor.set_buff(Buff::empty());
        assert!(!predictor.reset_time());
        predictor.set_buff(buff_at(0.0, 3));
        assert!(!predictor.reset_time());
        predictor.set_buff(buff_at(0.1, 2));
        assert!(predictor.reset_time());
    }

    #[test]
    fn test_set_time_sets_remaining_window() {
        let mut predictor = BuffPredictor::new();
        let now = Instant::now();
        predictor.set_time_at(30.0, now);
        assert_relative_eq!(predictor.time_left(now), 60.0, epsilon = 1e-6);
        predictor.set_time_at(120.0, now);
        assert_eq!(predictor.time_left(now), 0.0);
    }
}
