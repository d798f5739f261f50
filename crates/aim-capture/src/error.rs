//! Error types for frame acquisition

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Can not open camera: {0}")]
    Open(String),

    #[error("Grab failed: {0}")]
    Grab(String),

    #[error("No images in {0}")]
    EmptyDirectory(PathBuf),

    #[error("Can not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Grab thread: {0}")]
    Thread(String),
}

impl CaptureError {
    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open(msg.into())
    }

    pub fn grab(msg: impl Into<String>) -> Self {
        Self::Grab(msg.into())
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
