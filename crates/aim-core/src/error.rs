//! Error types for the aim assistant core

use thiserror::Error;

/// Core error type shared by all aim crates
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Unknown variant for {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl CoreError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
