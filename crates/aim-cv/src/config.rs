//! Configuration for the CV module

use crate::overlay::Palette;
use crate::{CvError, CvResult};
use aim_core::{Arm, Team};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for an aim assistant instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AimConfig {
    /// Robot role carrying the camera
    pub arm: Arm,
    pub enemy_team: Team,
    /// Parameter files of the detectors and predictors
    pub params: ParamPaths,
    /// Armor face templates, one image per label. Armors stay unlabeled
    /// when unset.
    pub templates: Option<PathBuf>,
    /// Diagnostic tier passed to `visualize_result`
    pub verbosity: i32,
    pub palette: Palette,
    pub rendering: RenderingConfig,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            arm: Arm::Infantry,
            enemy_team: Team::Unknown,
            params: ParamPaths::default(),
            templates: None,
            verbosity: 0,
            palette: Palette::default(),
            rendering: RenderingConfig::default(),
        }
    }
}

/// One JSON file per detector and predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamPaths {
    pub armor: PathBuf,
    pub buff: PathBuf,
    pub snipe: PathBuf,
    pub armor_predictor: PathBuf,
    pub buff_predictor: PathBuf,
}

impl Default for ParamPaths {
    fn default() -> Self {
        Self::in_dir("runtime/params")
    }
}

impl ParamPaths {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            armor: dir.join("armor_detector.json"),
            buff: dir.join("buff_detector.json"),
            snipe: dir.join("snipe_detector.json"),
            armor_predictor: dir.join("armor_predictor.json"),
            buff_predictor: dir.join("buff_predictor.json"),
        }
    }

    pub fn all(&self) -> [&PathBuf; 5] {
        [
            &self.armor,
            &self.buff,
            &self.snipe,
            &self.armor_predictor,
            &self.buff_predictor,
        ]
    }
}

/// Rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Draw contours, polygons and armor outlines
    pub draw_polylines: bool,
    /// Draw center and target markers
    pub draw_markers: bool,
    /// Half-diagonal of the diamond marker in pixels
    pub marker_size: u32,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            draw_polylines: true,
            draw_markers: true,
            marker_size: 10,
        }
    }
}

impl AimConfig {
    /// Hero: armor targeting, long-range snipe on the snipe tag
    pub fn hero(enemy_team: Team) -> Self {
        Self {
            arm: Arm::Hero,
            enemy_team,
            ..Default::default()
        }
    }

    /// Infantry: armor targeting, buff on the buff tag
    pub fn infantry(enemy_team: Team) -> Self {
        Self {
            arm: Arm::Infantry,
            enemy_team,
            ..Default::default()
        }
    }

    /// Sentry: armor targeting only
    pub fn sentry(enemy_team: Team) -> Self {
        Self {
            arm: Arm::Sentry,
            enemy_team,
            ..Default::default()
        }
    }

    /// Reject parameter paths that can not name a file, or that collide
    pub fn validate(&self) -> CvResult<()> {
        let paths = self.params.all();
        for (i, path) in paths.iter().enumerate() {
            if path.file_name().is_none() {
                return Err(CvError::invalid_config(format!(
                    "parameter path {} has no file name",
                    path.display()
                )));
            }
            if paths[..i].contains(path) {
                return Err(CvError::invalid_config(format!(
                    "parameter path {} is used twice",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Config with every diagnostic tier enabled
    pub fn debugging(self) -> Self {
        Self {
            verbosity: 11,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_paths_in_dir() {
        let paths = ParamPaths::in_dir("/tmp/aim");
        assert_eq!(paths.buff, PathBuf::from("/tmp/aim/buff_detector.json"));
        assert_eq!(paths.snipe, PathBuf::from("/tmp/aim/snipe_detector.json"));
    }

    #[test]
    fn test_validate_rejects_shared_file() {
        let mut config = AimConfig::default();
        assert!(config.validate().is_ok());
        config.params.snipe = config.params.armor.clone();
        assert!(matches!(config.validate(), Err(CvError::InvalidConfig(_))));
    }

    #[test]
    fn test_presets() {
        let hero = AimConfig::hero(Team::Blue).debugging();
        assert_eq!(hero.arm, Arm::Hero);
        assert_eq!(hero.enemy_team, Team::Blue);
        assert!(hero.verbosity > 10);
    }
}
