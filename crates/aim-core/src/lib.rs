//! # Aim Core
//!
//! Core domain types for the aim assistant: image-space geometry, the armor
//! and buff target descriptors, and the robot/game state enums that drive
//! strategy selection. Shared by the CV, capture and runner crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod armor;
pub mod buff;
pub mod error;
pub mod geo;

pub use armor::Armor;
pub use buff::Buff;
pub use error::{CoreError, CoreResult};
pub use geo::{Homography, Point2, RotatedRect};

// ============================================================================
// GAME STATE
// ============================================================================

/// Team color of a robot or target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Team {
    #[default]
    Unknown,
    Red,
    Blue,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Unknown => write!(f, "UNKNOWN"),
            Team::Red => write!(f, "RED"),
            Team::Blue => write!(f, "BLUE"),
        }
    }
}

impl FromStr for Team {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Team::Unknown),
            "RED" => Ok(Team::Red),
            "BLUE" => Ok(Team::Blue),
            other => Err(CoreError::unknown_variant("team", other)),
        }
    }
}

/// Role ("arm") of the robot carrying the camera
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Arm {
    #[default]
    Unknown,
    Hero,
    Infantry,
    Sentry,
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::Unknown => write!(f, "UNKNOWN"),
            Arm::Hero => write!(f, "HERO"),
            Arm::Infantry => write!(f, "INFANTRY"),
            Arm::Sentry => write!(f, "SENTRY"),
        }
    }
}

impl FromStr for Arm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Arm::Unknown),
            "HERO" => Ok(Arm::Hero),
            "INFANTRY" => Ok(Arm::Infantry),
            "SENTRY" => Ok(Arm::Sentry),
            other => Err(CoreError::unknown_variant("arm", other)),
        }
    }
}

/// RFID tag currently read by the robot. `Unknown` means no tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rfid {
    #[default]
    Unknown,
    Snipe,
    Buff,
}

impl fmt::Display for Rfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rfid::Unknown => write!(f, "UNKNOWN"),
            Rfid::Snipe => write!(f, "SNIPE"),
            Rfid::Buff => write!(f, "BUFF"),
        }
    }
}

impl FromStr for Rfid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" | "NONE" => Ok(Rfid::Unknown),
            "SNIPE" => Ok(Rfid::Snipe),
            "BUFF" => Ok(Rfid::Buff),
            other => Err(CoreError::unknown_variant("rfid", other)),
        }
    }
}

/// Active detection/prediction strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AimMethod {
    #[default]
    Unknown,
    Armor,
    Buff,
    Snipe,
}

impl AimMethod {
    /// Numeric code, used for the method gauge
    pub fn code(&self) -> i64 {
        match self {
            AimMethod::Unknown => 0,
            AimMethod::Armor => 1,
            AimMethod::Buff => 2,
            AimMethod::Snipe => 3,
        }
    }
}

impl fmt::Display for AimMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AimMethod::Unknown => write!(f, "UNKNOWN"),
            AimMethod::Armor => write!(f, "ARMOR"),
            AimMethod::Buff => write!(f, "BUFF"),
            AimMethod::Snipe => write!(f, "SNIPE"),
        }
    }
}

/// Spin direction of the buff as seen in the image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Unknown,
    Clockwise,
    CounterClockwise,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Unknown => write!(f, "UNKNOWN"),
            Direction::Clockwise => write!(f, "CW"),
            Direction::CounterClockwise => write!(f, "CCW"),
        }
    }
}

/// Classifier label of an armor plate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmorLabel {
    #[default]
    Unknown,
    Hero,
    Engineer,
    Infantry3,
    Infantry4,
    Infantry5,
    Sentry,
    Outpost,
    Base,
}

impl fmt::Display for ArmorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmorLabel::Unknown => write!(f, "UNKNOWN"),
            ArmorLabel::Hero => write!(f, "1"),
            ArmorLabel::Engineer => write!(f, "2"),
            ArmorLabel::Infantry3 => write!(f, "3"),
            ArmorLabel::Infantry4 => write!(f, "4"),
            ArmorLabel::Infantry5 => write!(f, "5"),
            ArmorLabel::Sentry => write!(f, "SENTRY"),
            ArmorLabel::Outpost => write!(f, "OUTPOST"),
            ArmorLabel::Base => write!(f, "BASE"),
        }
    }
}

impl FromStr for ArmorLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(ArmorLabel::Unknown),
            "1" | "HERO" => Ok(ArmorLabel::Hero),
            "2" | "ENGINEER" => Ok(ArmorLabel::Engineer),
            "3" => Ok(ArmorLabel::Infantry3),
            "4" => Ok(ArmorLabel::Infantry4),
            "5" => Ok(ArmorLabel::Infantry5),
            "SENTRY" => Ok(ArmorLabel::Sentry),
            "OUTPOST" => Ok(ArmorLabel::Outpost),
            "BASE" => Ok(ArmorLabel::Base),
            other => Err(CoreError::unknown_variant("armor label", other)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
