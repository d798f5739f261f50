//! Common contract of the frame detectors

use crate::overlay::Overlay;
use crate::{params, CvResult, Frame};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Statistics of a detector
#[derive(Debug, Default, Clone)]
pub struct DetectionStats {
    pub frames_processed: u64,
    /// Candidates accepted over all frames
    pub candidates_found: u64,
    /// Binarization, contour extraction and classification of the last frame
    pub find_time: Duration,
    /// Target assembly of the last frame
    pub match_time: Duration,
}

/// A detector turns one frame into zero or more targets.
///
/// Parameters are loaded once through the self-healing JSON store and are
/// not changed while frames are being processed. Detection never keeps the
/// frame after it returns and gives no identity guarantee across calls.
pub trait Detector {
    type Target;
    type Params: Serialize + DeserializeOwned + Clone;

    fn params(&self) -> &Self::Params;

    fn set_params(&mut self, params: Self::Params);

    /// Values written out when the parameter file is missing or unreadable
    fn default_params(&self) -> Self::Params;

    fn load_params(&mut self, path: &Path) -> CvResult<()> {
        let params = params::load_or_init(path, || self.default_params())?;
        self.set_params(params);
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> CvResult<Vec<Self::Target>>;

    /// Record diagnostics of the last detection. Higher tiers draw strictly
    /// more; nothing is drawn for `verbose <= 0`.
    fn visualize_result(&self, overlay: &mut Overlay, verbose: i32);
}
