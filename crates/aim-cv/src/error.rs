//! Error types for the CV module

use aim_core::CoreError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in CV operations.
///
/// "Target not found" is never an error: empty results and sentinel armors
/// cover that case.
#[derive(Error, Debug)]
pub enum CvError {
    #[error("OpenCV error: {0}")]
    OpenCV(String),

    #[error("Can not read params {path}: {source}")]
    ParamIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed params {path}: {source}")]
    ParamFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Can not load template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CvError {
    pub fn opencv(msg: impl Into<String>) -> Self {
        Self::OpenCV(msg.into())
    }

    pub fn param_io(path: &Path, source: std::io::Error) -> Self {
        Self::ParamIo {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn param_format(path: &Path, source: serde_json::Error) -> Self {
        Self::ParamFormat {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn template(path: &Path, source: image::ImageError) -> Self {
        Self::Template {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<opencv::Error> for CvError {
    fn from(err: opencv::Error) -> Self {
        Self::OpenCV(err.to_string())
    }
}

pub type CvResult<T> = Result<T, CvError>;
