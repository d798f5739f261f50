//! Constant-velocity Kalman filter on an image point
//!
//! State is `[x, y, vx, vy]` with velocities in pixels per second; only the
//! position is measured.

use aim_core::Point2;
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use tracing::trace;

const INITIAL_VARIANCE: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct KalmanTracker {
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    process_noise: f64,
    measurement_noise: f64,
    /// Seconds between two updates
    dt: f64,
    initialized: bool,
    update_count: u64,
}

impl KalmanTracker {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity() * INITIAL_VARIANCE,
            process_noise,
            measurement_noise,
            dt: 1.0 / 60.0,
            initialized: false,
            update_count: 0,
        }
    }

    /// Restart at `at` with zero velocity
    pub fn initialize(&mut self, at: Point2) {
        self.state = Vector4::new(at.x, at.y, 0.0, 0.0);
        self.covariance = Matrix4::identity() * INITIAL_VARIANCE;
        self.initialized = true;
        self.update_count = 1;
        trace!("Kalman filter initialized at ({}, {})", at.x, at.y);
    }

    /// Forget everything; the next update initializes again
    pub fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity() * INITIAL_VARIANCE;
        self.initialized = false;
        self.update_count = 0;
    }

    /// Advance one time step
    pub fn predict(&mut self) -> Point2 {
        if !self.initialized {
            return Point2::ORIGIN;
        }
        let f = self.transition(self.dt);
        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise_matrix();
        self.position()
    }

    /// Predict, then correct with a measured position
    pub fn update(&mut self, measured: Point2) -> Point2 {
        if !self.initialized {
            self.initialize(measured);
            return measured;
        }
        self.predict();

        let h = Self::measurement_matrix();
        let z = Vector2::new(measured.x, measured.y);
        let residual = z - h * self.state;
        let s = h * self.covariance * h.transpose() + Matrix2::identity() * self.measurement_noise;
        let Some(s_inv) = s.try_inverse() else {
            return measured;
        };
        let gain = self.covariance * h.transpose() * s_inv;

        self.state += gain * residual;
        self.covariance = (Matrix4::identity() - gain * h) * self.covariance;
        self.update_count += 1;
        trace!(
            "Updated position: ({:.1}, {:.1}), velocity: ({:.1}, {:.1})",
            self.state[0],
            self.state[1],
            self.state[2],
            self.state[3]
        );
        self.position()
    }

    /// Position `horizon` seconds ahead without touching the filter
    pub fn extrapolate(&self, horizon: f64) -> Point2 {
        let ahead = self.transition(horizon) * self.state;
        Point2::new(ahead[0], ahead[1])
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> Point2 {
        Point2::new(self.state[2], self.state[3])
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn set_dt(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn transition(&self, dt: f64) -> Matrix4<f64> {
        let mut f = Matrix4::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        f
    }

    fn measurement_matrix() -> Matrix2x4<f64> {
        Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0,
        )
    }

    /// Discrete white-noise acceleration
    fn process_noise_matrix(&self) -> Matrix4<f64> {
        let dt2 = self.dt * self.dt;
        let dt3 = dt2 * self.dt;
        let dt4 = dt2 * dt2;
        let q = self.process_noise;
        Matrix4::new(
            dt4 / 4.0 * q, 0.0, dt3 / 2.0 * q, 0.0, //
            0.0, dt4 / 4.0 * q, 0.0, dt3 / 2.0 * q, //
            dt3 / 2.0 * q, 0.0, dt2 * q, 0.0, //
            0.0, dt3 / 2.0 * q, 0.0, dt2 * q,
        )
    }
}

impl Default for KalmanTracker {
    fn default() -> Self {
        Self::new(0.01, 0.1)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initialization() {
        let mut tracker = KalmanTracker::default();
        assert!(!tracker.is_initialized());
        assert_eq!(tracker.predict(), Point2::ORIGIN);

        tracker.initialize(Point2::new(100.0, 200.0));
        assert!(tracker.is_initialized());
        assert_relative_eq!(tracker.position().x, 100.0);
        assert_relative_eq!(tracker.position().y, 200.0);
    }

    #[test]
    fn test_velocity_converges() {
        let mut tracker = KalmanTracker::default();
        tracker.set_dt(1.0);
        for i in 0..10 {
            tracker.update(Point2::new(100.0 + i as f64 * 10.0, 200.0));
        }
        let v = tracker.velocity();
        assert!(v.x > 8.0 && v.x < 12.0, "vx = {}", v.x);
        assert!(v.y.abs() < 1.0);
    }

    #[test]
    fn test_extrapolate_leaves_state() {
        let mut tracker = KalmanTracker::default();
        tracker.set_dt(1.0);
        tracker.initialize(Point2::new(100.0, 100.0));
        tracker.update(Point2::new(110.0, 100.0));

        let before = tracker.position();
        let ahead = tracker.extrapolate(1.0);
        assert!(ahead.x > before.x);
        assert_eq!(tracker.position(), before);
    }

    #[test]
    fn test_reset() {
        let mut tracker = KalmanTracker::default();
        tracker.update(Point2::new(5.0, 5.0));
        tracker.reset();
        assert!(!tracker.is_initialized());
        assert_eq!(tracker.update_count(), 0);
    }
}
