//! Strategy orchestration
//!
//! The assistant owns one detector and predictor per strategy and picks the
//! active pair from the robot role and the RFID tag it stands on.

use crate::armor_detector::{ArmorDetector, ArmorProfile};
use crate::armor_predictor::ArmorPredictor;
use crate::buff_detector::BuffDetector;
use crate::buff_predictor::BuffPredictor;
use crate::classifier::{self, ArmorClassifier, NoopClassifier, TemplateClassifier};
use crate::config::{AimConfig, ParamPaths};
use crate::detector::Detector;
use crate::oracle::{ImageOracle, OpenCvOracle};
use crate::overlay::{Overlay, Palette};
use crate::{CvResult, Frame};
use aim_core::{AimMethod, Arm, Armor, Buff, Point2, Rfid, Team};
use std::cmp::Ordering;
use tracing::{debug, info, trace};

/// Method selected by a tag for a role, `None` when the pair changes nothing
pub fn method_for(arm: Arm, rfid: Rfid) -> Option<AimMethod> {
    match (arm, rfid) {
        (Arm::Unknown, _) => Some(AimMethod::Unknown),
        (Arm::Hero, Rfid::Snipe) => Some(AimMethod::Snipe),
        (Arm::Hero, Rfid::Unknown) => Some(AimMethod::Armor),
        (Arm::Infantry, Rfid::Buff) => Some(AimMethod::Buff),
        (Arm::Infantry, Rfid::Unknown) => Some(AimMethod::Armor),
        (Arm::Sentry, _) => Some(AimMethod::Armor),
        _ => None,
    }
}

/// Aiming score of an armor in a frame of `width` x `height`: distance to the
/// image center plus the mean rectification displacement. Lower is better.
pub fn aim_score(armor: &Armor, width: u32, height: u32) -> f64 {
    let image_center = Point2::new(f64::from(width / 2), f64::from(height / 2));
    armor.center().distance_to(&image_center) + armor.rectification_penalty()
}

/// Sort armors best first
pub fn rank_armors(armors: &mut [Armor], width: u32, height: u32) {
    armors.sort_by(|a, b| {
        aim_score(a, width, height)
            .partial_cmp(&aim_score(b, width, height))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.center().lexicographic_cmp(&b.center()))
    });
}

pub struct AimAssistant<C: ArmorClassifier = NoopClassifier, O: ImageOracle + Clone = OpenCvOracle> {
    arm: Arm,
    method: AimMethod,
    armor_detector: ArmorDetector<O>,
    buff_detector: BuffDetector<O>,
    snipe_detector: ArmorDetector<O>,
    armor_predictor: ArmorPredictor,
    buff_predictor: BuffPredictor,
    classifier: C,
    /// Candidates of the last armor or snipe frame, best first
    ranked: Vec<Armor>,
    palette: Palette,
}

impl AimAssistant {
    pub fn new(arm: Arm) -> Self {
        Self::with_parts(arm, NoopClassifier, OpenCvOracle)
    }
}

impl AimAssistant<Box<dyn ArmorClassifier>> {
    /// Assistant for a configured robot, with its parameter files and armor
    /// templates loaded
    pub fn from_config(config: &AimConfig) -> CvResult<Self> {
        config.validate()?;
        let classifier: Box<dyn ArmorClassifier> = match &config.templates {
            Some(dir) => Box::new(TemplateClassifier::load_dir(dir)?),
            None => Box::new(NoopClassifier),
        };
        let mut assistant = Self::with_parts(config.arm, classifier, OpenCvOracle);
        assistant.palette = config.palette.clone();
        assistant.load_params(&config.params)?;
        assistant.set_enemy_team(config.enemy_team);
        Ok(assistant)
    }
}

impl<C: ArmorClassifier, O: ImageOracle + Clone> AimAssistant<C, O> {
    pub fn with_parts(arm: Arm, classifier: C, oracle: O) -> Self {
        trace!("Constructed.");
        Self {
            arm,
            method: AimMethod::Unknown,
            armor_detector: ArmorDetector::with_oracle(oracle.clone(), ArmorProfile::Armor, Team::Unknown),
            buff_detector: BuffDetector::with_oracle(oracle.clone(), Team::Unknown),
            snipe_detector: ArmorDetector::with_oracle(oracle, ArmorProfile::Snipe, Team::Unknown),
            armor_predictor: ArmorPredictor::new(),
            buff_predictor: BuffPredictor::new(),
            classifier,
            ranked: Vec::new(),
            palette: Palette::default(),
        }
    }

    pub fn load_params(&mut self, paths: &ParamPaths) -> CvResult<()> {
        self.armor_detector.load_params(&paths.armor)?;
        self.buff_detector.load_params(&paths.buff)?;
        self.snipe_detector.load_params(&paths.snipe)?;
        self.armor_predictor.load_params(&paths.armor_predictor)?;
        self.buff_predictor.load_params(&paths.buff_predictor)?;
        debug!("Params loaded.");
        Ok(())
    }

    pub fn set_enemy_team(&mut self, enemy_team: Team) {
        self.armor_detector.set_enemy_team(enemy_team);
        self.buff_detector.set_enemy_team(enemy_team);
        self.snipe_detector.set_enemy_team(enemy_team);
        debug!("Enemy team : {}", enemy_team);
    }

    /// Switch strategy for the tag. Entering buff mode starts a new buff
    /// tracking session.
    pub fn set_rfid(&mut self, rfid: Rfid) {
        if let Some(method) = method_for(self.arm, rfid) {
            if method == AimMethod::Buff && self.method != AimMethod::Buff {
                self.buff_predictor.start_session(&[]);
            }
            self.method = method;
        }
        info!("Now Arms : {}, AimMethod : {}", self.arm, self.method);
    }

    pub fn set_arm(&mut self, arm: Arm) {
        self.arm = arm;
        debug!("Arm : {}", arm);
    }

    /// Seconds elapsed in the buff engagement window
    pub fn set_time(&mut self, time: f64) {
        self.buff_predictor.set_time(time);
    }

    pub fn arm(&self) -> Arm {
        self.arm
    }

    pub fn method(&self) -> AimMethod {
        self.method
    }

    pub fn ranked(&self) -> &[Armor] {
        &self.ranked
    }

    pub fn buff_predictor(&self) -> &BuffPredictor {
        &self.buff_predictor
    }

    pub fn armor_predictor(&self) -> &ArmorPredictor {
        &self.armor_predictor
    }

    /// Predicted armors for this frame. An empty armor means nothing to aim
    /// at.
    pub fn aim(&mut self, frame: &Frame) -> CvResult<Vec<Armor>> {
        if self.method == AimMethod::Unknown {
            self.method = AimMethod::Armor;
        }

        match self.method {
            AimMethod::Buff => {
                let buffs = self.buff_detector.detect(frame)?;
                let buff = buffs.last().cloned().unwrap_or_else(Buff::empty);
                self.buff_predictor.set_buff(buff);
                self.buff_predictor.reset_time();
                Ok(self.buff_predictor.predict())
            }
            method => {
                let armors = if method == AimMethod::Snipe {
                    self.snipe_detector.detect(frame)?
                } else {
                    self.armor_detector.detect(frame)?
                };
                let mut armors = classifier::classify_all(&self.classifier, armors, frame);
                rank_armors(&mut armors, frame.width(), frame.height());

                let target = armors.first().cloned().unwrap_or_else(Armor::empty);
                self.ranked = armors;
                self.armor_predictor.set_armor(target);
                Ok(self.armor_predictor.predict())
            }
        }
    }

    /// Diagnostics of the active strategy only
    pub fn visualize_result(&self, verbose: i32) -> Overlay {
        let mut overlay = Overlay::new(self.palette.clone());
        match self.method {
            AimMethod::Armor => {
                self.armor_detector.visualize_result(&mut overlay, verbose);
                self.armor_predictor.visualize_prediction(&mut overlay, verbose);
            }
            AimMethod::Buff => {
                self.buff_detector.visualize_result(&mut overlay, verbose);
                self.buff_predictor.visualize_prediction(&mut overlay, verbose);
            }
            AimMethod::Snipe => {
                self.snipe_detector.visualize_result(&mut overlay, verbose);
                self.armor_predictor.visualize_prediction(&mut overlay, verbose);
            }
            AimMethod::Unknown => {}
        }
        overlay
    }
}

// ============================================================================
// TESTS
// ============================================================================
