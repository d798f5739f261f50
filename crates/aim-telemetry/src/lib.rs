//! # Aim Telemetry - Metrics
//!
//! Prometheus metrics for the aim assistant processing loop:
//! - Frames processed and discarded by the capture slot
//! - Targets emitted
//! - Per-strategy processing time
//! - Current aim method and buff spin direction

use aim_core::{AimMethod, Direction};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics text is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Can not write metrics to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Metrics collector for the processing loop
pub struct MetricsCollector {
    registry: Registry,

    frames_processed: IntCounterVec,
    frames_discarded: IntCounter,
    targets_emitted: IntCounter,
    processing_time: HistogramVec,

    aim_method: IntGauge,
    buff_direction: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let frames_processed = IntCounterVec::new(
            Opts::new("aim_frames_processed_total", "Frames processed by aim method"),
            &["method"],
        )?;
        registry.register(Box::new(frames_processed.clone()))?;

        let frames_discarded = IntCounter::new(
            "aim_frames_discarded_total",
            "Frames replaced in the capture slot before being consumed",
        )?;
        registry.register(Box::new(frames_discarded.clone()))?;

        let targets_emitted = IntCounter::new(
            "aim_targets_emitted_total",
            "Non-empty predicted armors",
        )?;
        registry.register(Box::new(targets_emitted.clone()))?;

        let processing_time = HistogramVec::new(
            HistogramOpts::new("aim_processing_seconds", "Frame processing time")
                .buckets(vec![0.001, 0.0025, 0.005, 0.01, 0.02, 0.035, 0.05, 0.1, 0.25]),
            &["method"],
        )?;
        registry.register(Box::new(processing_time.clone()))?;

        let aim_method = IntGauge::new("aim_method", "Active aim method code")?;
        registry.register(Box::new(aim_method.clone()))?;

        let buff_direction = IntGauge::new(
            "aim_buff_direction",
            "Buff spin direction: 0 unknown, 1 clockwise, -1 counter-clockwise",
        )?;
        registry.register(Box::new(buff_direction.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            frames_processed,
            frames_discarded,
            targets_emitted,
            processing_time,
            aim_method,
            buff_direction,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Metrics in the Prometheus text format
    pub fn export(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Replace `path` with the current text exposition
    pub fn write_to(&self, path: &Path) -> TelemetryResult<()> {
        let text = self.export()?;
        std::fs::write(path, text).map_err(|source| TelemetryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Metrics written to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // PROCESSING
    // ========================================================================

    /// Record one processed frame and the armors predicted for it
    pub fn record_frame(&self, method: AimMethod, processing_time_secs: f64, targets: u64) {
        let label = method.to_string();
        self.frames_processed.with_label_values(&[&label]).inc();
        self.processing_time
            .with_label_values(&[&label])
            .observe(processing_time_secs);
        self.targets_emitted.inc_by(targets);
        self.aim_method.set(method.code());
    }

    /// Bring the discard counter up to the slot's running total
    pub fn set_frames_discarded(&self, total: u64) {
        let current = self.frames_discarded.get();
        if total > current {
            self.frames_discarded.inc_by(total - current);
        }
    }

    pub fn set_buff_direction(&self, direction: Direction) {
        self.buff_direction.set(match direction {
            Direction::Unknown => 0,
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        assert!(MetricsCollector::new().is_ok());
    }

    #[test]
    fn test_metrics_export() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.record_frame(AimMethod::Buff, 0.004, 1);
        metrics.set_buff_direction(Direction::CounterClockwise);

        let export = metrics.export().unwrap();
        assert!(export.contains("aim_frames_processed_total{method=\"BUFF\"} 1"));
        assert!(export.contains("aim_targets_emitted_total 1"));
        assert!(export.contains("aim_method 2"));
        assert!(export.contains("aim_buff_direction -1"));
    }

    #[test]
    fn test_discarded_follows_total() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.set_frames_discarded(3);
        metrics.set_frames_discarded(2);
        metrics.set_frames_discarded(5);
        assert!(metrics.export().unwrap().contains("aim_frames_discarded_total 5"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        let metrics = MetricsCollector::new().unwrap();
        metrics.write_to(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("aim_method"));
    }
}
