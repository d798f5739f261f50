//! Rotating buff: rotation center, hammer icon and armor candidates

use crate::armor::Armor;
use crate::geo::{Point2, RotatedRect};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One frame's view of the rotating buff.
///
/// `target` is the candidate nearest to the hammer center when there are
/// candidates and the hammer has positive area, otherwise the empty armor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    center: Point2,
    hammer: RotatedRect,
    armors: Vec<Armor>,
    target: Armor,
}

impl Buff {
    pub fn new(center: Point2, hammer: RotatedRect, armors: Vec<Armor>) -> Self {
        let target = Self::nearest_to_hammer(&hammer, &armors).unwrap_or_default();
        Self {
            center,
            hammer,
            armors,
            target,
        }
    }

    /// Buff with nothing detected
    pub fn empty() -> Self {
        Self::default()
    }

    /// Candidate closest to the hammer center.
    ///
    /// Equal distances fall back to the lexicographic order of the centers so
    /// the choice does not depend on candidate order.
    fn nearest_to_hammer(hammer: &RotatedRect, armors: &[Armor]) -> Option<Armor> {
        if hammer.area() <= 0.0 {
            return None;
        }
        armors
            .iter()
            .min_by(|a, b| {
                let da = a.center().distance_to(&hammer.center);
                let db = b.center().distance_to(&hammer.center);
                da.partial_cmp(&db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.center().lexicographic_cmp(&b.center()))
            })
            .cloned()
    }

    pub fn center(&self) -> Point2 {
        self.center
    }

    pub fn hammer(&self) -> &RotatedRect {
        &self.hammer
    }

    pub fn armors(&self) -> &[Armor] {
        &self.armors
    }

    pub fn target(&self) -> &Armor {
        &self.target
    }
}
