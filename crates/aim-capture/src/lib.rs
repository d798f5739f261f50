//! # Aim Capture - Frame Acquisition
//!
//! One grab thread per camera publishes the newest frame into a
//! [`FrameSlot`]; the processing loop blocks on the slot. Frames are
//! optionally resized to a configured [`FrameSize`] before publishing.
//!
//! Sources:
//! - [`ImageDirCamera`] replays recorded images
//! - [`SyntheticBuffCamera`] renders a rotating buff

pub mod camera;
pub mod error;
pub mod grab;
pub mod slot;
pub mod sources;

pub use camera::{Camera, FrameSize};
pub use error::{CaptureError, CaptureResult};
pub use grab::GrabThread;
pub use slot::FrameSlot;
pub use sources::{ImageDirCamera, SyntheticBuffCamera};
