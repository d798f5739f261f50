//! Runner configuration

use aim_capture::{Camera, FrameSize, ImageDirCamera, SyntheticBuffCamera};
use aim_core::{Direction, Rfid, Team};
use aim_cv::AimConfig;
use image::Rgb;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Rotating buff rendered in the enemy color
    Synthetic {
        #[serde(default = "default_direction")]
        direction: Direction,
        /// Degrees per second
        #[serde(default = "default_speed")]
        speed: f64,
        #[serde(default)]
        frame_limit: Option<u64>,
    },
    /// Recorded images, replayed in file name order
    Directory {
        path: PathBuf,
        #[serde(default)]
        looping: bool,
        #[serde(default)]
        interval_ms: u64,
    },
}

fn default_direction() -> Direction {
    Direction::CounterClockwise
}

fn default_speed() -> f64 {
    60.0
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Synthetic {
            direction: default_direction(),
            speed: default_speed(),
            frame_limit: None,
        }
    }
}

impl SourceConfig {
    pub fn build(&self, size: FrameSize, enemy_team: Team) -> Box<dyn Camera> {
        match self {
            SourceConfig::Synthetic {
                direction,
                speed,
                frame_limit,
            } => {
                let color = match enemy_team {
                    Team::Blue => Rgb([0, 0, 255]),
                    _ => Rgb([255, 0, 0]),
                };
                let mut camera = SyntheticBuffCamera::new(size.width, size.height, color)
                    .with_rotation(*direction, *speed);
                if let Some(limit) = frame_limit {
                    camera = camera.with_frame_limit(*limit);
                }
                Box::new(camera)
            }
            SourceConfig::Directory {
                path,
                looping,
                interval_ms,
            } => Box::new(
                ImageDirCamera::new(path)
                    .looping(*looping)
                    .with_interval(Duration::from_millis(*interval_ms)),
            ),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub source: SourceConfig,
    pub frame_size: FrameSize,
    pub aim: AimConfig,
    /// Tag read at startup
    pub rfid: Rfid,
    /// Seconds already elapsed in the buff engagement window
    pub game_time: f64,
    /// Annotated frames are saved here when set
    pub render_dir: Option<PathBuf>,
    /// Save every n-th annotated frame
    pub render_every: u64,
    /// Prometheus text exposition is written here when set
    pub metrics_path: Option<PathBuf>,
    /// Frames between two metrics writes
    pub metrics_every: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            frame_size: FrameSize::default(),
            aim: AimConfig::default(),
            rfid: Rfid::Unknown,
            game_time: 0.0,
            render_dir: None,
            render_every: 30,
            metrics_path: None,
            metrics_every: 60,
        }
    }
}

impl RunnerConfig {
    /// Load `path` (optional) overlaid with `AIM_` environment variables,
    /// nested keys separated by `__`
    pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(::config::Environment::with_prefix("AIM").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load `path` only
    pub fn from_file(path: &Path) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Configuration for the synthetic buff demo
    pub fn demo() -> Self {
        let mut config = Self::default();
        config.aim = AimConfig::infantry(Team::Red);
        config.rfid = Rfid::Buff;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::Arm;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.frame_size, FrameSize::new(640, 480));
        assert!(matches!(config.source, SourceConfig::Synthetic { .. }));
        assert!(config.metrics_path.is_none());
    }

    #[test]
    fn test_demo_preset() {
        let config = RunnerConfig::demo();
        assert_eq!(config.aim.arm, Arm::Infantry);
        assert_eq!(config.rfid, Rfid::Buff);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aim.toml");
        std::fs::write(
            &path,
            r#"
rfid = "SNIPE"
game_time = 12.5

[aim]
arm = "HERO"
enemy_team = "BLUE"

[source]
kind = "directory"
path = "recordings"
looping = true
"#,
        )
        .unwrap();

        let config = RunnerConfig::from_file(&path).unwrap();
        assert_eq!(config.rfid, Rfid::Snipe);
        assert_eq!(config.game_time, 12.5);
        assert_eq!(config.aim.arm, Arm::Hero);
        assert_eq!(config.aim.enemy_team, Team::Blue);
        assert_eq!(config.aim.verbosity, 0);
        assert_eq!(config.render_every, 30);
        assert_eq!(
            config.source,
            SourceConfig::Directory {
                path: PathBuf::from("recordings"),
                looping: true,
                interval_ms: 0,
            }
        );
    }
}
