//! Camera contract

use crate::CaptureResult;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A frame source driven by the grab thread.
///
/// `grab` blocks until the next frame is available and returns `None` when
/// the source is exhausted.
#[cfg_attr(test, mockall::automock)]
pub trait Camera: Send {
    fn open(&mut self) -> CaptureResult<()>;

    fn grab(&mut self) -> CaptureResult<Option<RgbImage>>;

    fn close(&mut self) -> CaptureResult<()>;
}

/// Output size of the grabbed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `frame` scaled to this size, unchanged when it already matches
    pub fn fit(&self, frame: RgbImage) -> RgbImage {
        if frame.dimensions() == (self.width, self.height) {
            frame
        } else {
            imageops::resize(&frame, self.width, self.height, FilterType::Triangle)
        }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}
