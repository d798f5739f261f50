//! # Aim CV - Vision Module
//!
//! Target detection and prediction for the aim assistant.
//! Features:
//! - Rotating buff detection from contour shape classification
//! - Armor plate detection from paired light bars, with a long-range profile
//!   for sniping
//! - Buff spin direction inference and latency-compensated pose prediction
//! - Kalman filtering of the tracked armor
//! - Strategy selection from the robot role and RFID tag
//!
//! ## Pipeline
//!
//! Each frame goes through the active strategy of an [`AimAssistant`]:
//! 1. The frame is reduced to the enemy glow and binarized by an
//!    [`ImageOracle`]
//! 2. A detector classifies contours into targets
//! 3. Armor candidates are labeled and ranked, the buff target is picked
//! 4. The matching predictor compensates the target for latency
//!
//! Detectors and predictors also describe their diagnostics as an
//! [`Overlay`] that the [`OverlayRenderer`] draws onto a frame.

pub mod aim_assistant;
pub mod armor_detector;
pub mod armor_predictor;
pub mod buff_detector;
pub mod buff_predictor;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod kalman;
pub mod oracle;
pub mod overlay;
pub mod params;
pub mod renderer;

pub use aim_assistant::AimAssistant;
pub use armor_detector::{ArmorDetector, ArmorDetectorParams, ArmorProfile};
pub use armor_predictor::{ArmorPredictor, ArmorPredictorParams, FilterMethod};
pub use buff_detector::{BuffDetector, BuffDetectorParams};
pub use buff_predictor::{BuffPredictor, BuffPredictorParams};
pub use classifier::{ArmorClassifier, NoopClassifier, TemplateClassifier};
pub use config::{AimConfig, ParamPaths, RenderingConfig};
pub use detector::{DetectionStats, Detector};
pub use error::{CvError, CvResult};
pub use kalman::KalmanTracker;
pub use oracle::{ImageOracle, OpenCvOracle};
pub use overlay::{Color, Overlay, Palette};
pub use renderer::OverlayRenderer;

/// 3-channel 8-bit frame, channels in RGB order
pub type Frame = image::RgbImage;
