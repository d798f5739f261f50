//! Latency compensation for the tracked armor
//!
//! The armor center is filtered with a constant-velocity Kalman filter and
//! extrapolated by the configured latency; the plate is shifted to the
//! extrapolated center.

use crate::kalman::KalmanTracker;
use crate::overlay::Overlay;
use crate::{params, CvResult};
use aim_core::Armor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Filter used for the armor center
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterMethod {
    /// Pass the armor through
    Unknown,
    #[default]
    Kf,
    /// Not available, runs as `Kf`
    Ekf,
}

impl fmt::Display for FilterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMethod::Unknown => write!(f, "UNKNOWN"),
            FilterMethod::Kf => write!(f, "KF"),
            FilterMethod::Ekf => write!(f, "EKF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorPredictorParams {
    pub method: FilterMethod,
    /// Acceleration variance, px²/s⁴
    pub process_noise: f64,
    /// Center measurement variance, px²
    pub measurement_noise: f64,
    /// Seconds between frames when no earlier update is known
    pub frame_dt: f64,
    /// Seconds from exposure to actuation
    pub latency: f64,
    /// Center jump in pixels that restarts the filter
    pub max_jump: f64,
}

impl Default for ArmorPredictorParams {
    fn default() -> Self {
        Self {
            method: FilterMethod::Kf,
            process_noise: 500.0,
            measurement_noise: 4.0,
            frame_dt: 1.0 / 60.0,
            latency: 0.05,
            max_jump: 80.0,
        }
    }
}

pub struct ArmorPredictor {
    params: ArmorPredictorParams,
    filter: KalmanTracker,
    armor: Armor,
    predict: Armor,
    last_update: Option<Instant>,
    ekf_warned: bool,
}

impl Default for ArmorPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmorPredictor {
    pub fn new() -> Self {
        Self::with_params(ArmorPredictorParams::default())
    }

    pub fn with_params(params: ArmorPredictorParams) -> Self {
        trace!("Constructed.");
        Self {
            filter: KalmanTracker::new(params.process_noise, params.measurement_noise),
            params,
            armor: Armor::empty(),
            predict: Armor::empty(),
            last_update: None,
            ekf_warned: false,
        }
    }

    pub fn load_params(&mut self, path: &Path) -> CvResult<()> {
        let params = params::load_or_init(path, ArmorPredictorParams::default)?;
        *self = Self::with_params(params);
        Ok(())
    }

    pub fn params(&self) -> &ArmorPredictorParams {
        &self.params
    }

    pub fn set_armor(&mut self, armor: Armor) {
        self.armor = armor;
    }

    pub fn armor(&self) -> &Armor {
        &self.armor
    }

    pub fn prediction(&self) -> &Armor {
        &self.predict
    }

    pub fn predict(&mut self) -> Vec<Armor> {
        self.predict_at(Instant::now())
    }

    /// One-element list with the compensated armor, or the empty sentinel
    /// when no armor was set.
    pub fn predict_at(&mut self, now: Instant) -> Vec<Armor> {
        if self.armor.is_empty() {
            if self.filter.is_initialized() {
                debug!("Target lost, filter reset.");
            }
            self.filter.reset();
            self.last_update = None;
            self.predict = Armor::empty();
            return vec![self.predict.clone()];
        }

        self.predict = match self.params.method {
            FilterMethod::Unknown => self.armor.clone(),
            FilterMethod::Ekf => {
                if !self.ekf_warned {
                    warn!("EKF is not available, using KF.");
                    self.ekf_warned = true;
                }
                self.filter_armor(now)
            }
            FilterMethod::Kf => self.filter_armor(now),
        };
        vec![self.predict.clone()]
    }

    fn filter_armor(&mut self, now: Instant) -> Armor {
        let measured = self.armor.center();
        let dt = self
            .last_update
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .filter(|dt| *dt > 0.0 && *dt < 1.0)
            .unwrap_or(self.params.frame_dt);
        self.last_update = Some(now);

        if self.filter.is_initialized()
            && self.filter.position().distance_to(&measured) > self.params.max_jump
        {
            debug!("Armor jumped, filter restarted.");
            self.filter.reset();
        }

        self.filter.set_dt(dt);
        self.filter.update(measured);
        let ahead = self.filter.extrapolate(self.params.latency);
        debug!(
            "Measured ({:.1}, {:.1}), predicted ({:.1}, {:.1})",
            measured.x, measured.y, ahead.x, ahead.y
        );
        self.armor.translated(ahead - measured)
    }

    pub fn visualize_prediction(&self, overlay: &mut Overlay, verbose: i32) {
        if verbose <= 0 || self.predict.is_empty() {
            return;
        }
        let palette = overlay.palette().clone();
        overlay.polygon(self.predict.vertices(), palette.prediction, 2);
        overlay.line(self.armor.center(), self.predict.center(), palette.target, 2);
        if verbose > 2 {
            let v = self.filter.velocity();
            overlay.status(format!("{} velocity {:.1}, {:.1} px/s.", self.params.method, v.x, v.y));
        }
    }
}
