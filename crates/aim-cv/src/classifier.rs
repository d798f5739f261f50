//! Armor label classification

use crate::oracle::{ImageOracle, OpenCvOracle};
use crate::{CvError, CvResult, Frame};
use aim_core::{Armor, ArmorLabel};
use image::GrayImage;
use image::imageops::{self, FilterType};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, trace, warn};

const TEMPLATE_EXTENSIONS: [&str; 3] = ["png", "jpg", "bmp"];

/// Assigns a label to a detected armor, typically from its rectified face.
#[cfg_attr(test, mockall::automock)]
pub trait ArmorClassifier: Send + Sync {
    fn classify(&self, armor: &Armor, frame: &Frame) -> ArmorLabel;
}

impl<C: ArmorClassifier + ?Sized> ArmorClassifier for Box<C> {
    fn classify(&self, armor: &Armor, frame: &Frame) -> ArmorLabel {
        (**self).classify(armor, frame)
    }
}

/// Classifier used when no model is loaded: every armor stays unlabeled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClassifier;

impl ArmorClassifier for NoopClassifier {
    fn classify(&self, _armor: &Armor, _frame: &Frame) -> ArmorLabel {
        ArmorLabel::Unknown
    }
}

/// Nearest-template classifier over binary armor faces.
///
/// The face is scaled to each template and compared pixel by pixel; the best
/// template labels the armor when at least `min_match` of its pixels agree.
pub struct TemplateClassifier<O: ImageOracle = OpenCvOracle> {
    oracle: O,
    templates: Vec<(ArmorLabel, GrayImage)>,
    min_match: f64,
}

impl TemplateClassifier<OpenCvOracle> {
    pub fn new(templates: Vec<(ArmorLabel, GrayImage)>) -> Self {
        Self::with_oracle(OpenCvOracle, templates)
    }

    /// One template per image in `dir`, named after its label (`1.png`,
    /// `SENTRY.png`). Files with other names are skipped.
    pub fn load_dir(dir: &Path) -> CvResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| CvError::template(dir, e.into()))?;
        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(label) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<ArmorLabel>().ok())
            else {
                warn!("Skipping template {}: not a label name", path.display());
                continue;
            };
            let image = image::open(&path).map_err(|e| CvError::template(&path, e))?;
            templates.push((label, image.to_luma8()));
        }
        debug!("Loaded {} armor templates from {}", templates.len(), dir.display());
        Ok(Self::new(templates))
    }
}

impl<O: ImageOracle> TemplateClassifier<O> {
    pub fn with_oracle(oracle: O, templates: Vec<(ArmorLabel, GrayImage)>) -> Self {
        trace!("Constructed.");
        Self {
            oracle,
            templates,
            min_match: 0.8,
        }
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

/// Share of pixels on the same side of mid-gray in `face` and `template`
fn match_ratio(face: &GrayImage, template: &GrayImage) -> f64 {
    let (w, h) = template.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let scaled = imageops::resize(face, w, h, FilterType::Nearest);
    let agree = scaled
        .pixels()
        .zip(template.pixels())
        .filter(|(a, b)| (a.0[0] > 127) == (b.0[0] > 127))
        .count();
    agree as f64 / f64::from(w * h)
}

impl<O: ImageOracle> ArmorClassifier for TemplateClassifier<O> {
    fn classify(&self, armor: &Armor, frame: &Frame) -> ArmorLabel {
        let face = match self.oracle.face(frame, armor) {
            Ok(face) if face.width() > 0 && face.height() > 0 => face,
            Ok(_) => return ArmorLabel::Unknown,
            Err(e) => {
                warn!("Face extraction failed: {}", e);
                return ArmorLabel::Unknown;
            }
        };

        let best = self
            .templates
            .iter()
            .map(|(label, template)| (*label, match_ratio(&face, template)))
            .fold(None, |best: Option<(ArmorLabel, f64)>, (label, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((label, score)),
            });

        match best {
            Some((label, score)) if score >= self.min_match => {
                trace!("Armor at {:?} matches {} ({:.2})", armor.center(), label, score);
                label
            }
            _ => ArmorLabel::Unknown,
        }
    }
}

/// Label every armor, dropping empty sentinels. Order is kept.
pub fn classify_all<C: ArmorClassifier + ?Sized>(classifier: &C, armors: Vec<Armor>, frame: &Frame) -> Vec<Armor> {
    let label = |armor: Armor| {
        let label = classifier.classify(&armor, frame);
        armor.with_label(label)
    };

    #[cfg(feature = "parallel")]
    let labeled = armors.into_par_iter().map(label).filter(|a| !a.is_empty()).collect();
    #[cfg(not(feature = "parallel"))]
    let labeled = armors.into_iter().map(label).filter(|a| !a.is_empty()).collect();
    labeled
}
