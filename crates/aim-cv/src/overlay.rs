//! Diagnostic display list
//!
//! Detectors and predictors describe what they want drawn; the
//! [`OverlayRenderer`](crate::renderer::OverlayRenderer) or any other sink
//! decides how to show it.

use aim_core::Point2;
use serde::{Deserialize, Serialize};

/// RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const RED: Color = Color(255, 0, 0);
    pub const GREEN: Color = Color(0, 255, 0);
    pub const YELLOW: Color = Color(255, 255, 0);
    pub const WHITE: Color = Color(255, 255, 255);
}

/// Colors used for each kind of diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Armor candidates that are not the target
    pub candidate: Color,
    /// Selected target, hammer and rotation center
    pub target: Color,
    /// Raw contours
    pub contour: Color,
    /// Simplified polygons and light bars
    pub polygon: Color,
    pub prediction: Color,
    /// Status lines
    pub text: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            candidate: Color::GREEN,
            target: Color::RED,
            contour: Color::RED,
            polygon: Color::YELLOW,
            prediction: Color::YELLOW,
            text: Color::GREEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polyline {
        points: Vec<Point2>,
        closed: bool,
        color: Color,
        thickness: u32,
    },
    /// Diamond marker
    Marker { at: Point2, color: Color },
    Label {
        text: String,
        at: Point2,
        color: Color,
    },
}

/// Vertical spacing of stacked status lines
const STATUS_LINE_HEIGHT: f64 = 24.0;

#[derive(Debug, Clone, Default)]
pub struct Overlay {
    palette: Palette,
    shapes: Vec<Shape>,
    status_lines: usize,
}

impl Overlay {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            shapes: Vec::new(),
            status_lines: 0,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn polygon(&mut self, points: &[Point2], color: Color, thickness: u32) {
        self.shapes.push(Shape::Polyline {
            points: points.to_vec(),
            closed: true,
            color,
            thickness,
        });
    }

    pub fn line(&mut self, from: Point2, to: Point2, color: Color, thickness: u32) {
        self.shapes.push(Shape::Polyline {
            points: vec![from, to],
            closed: false,
            color,
            thickness,
        });
    }

    pub fn marker(&mut self, at: Point2, color: Color) {
        self.shapes.push(Shape::Marker { at, color });
    }

    pub fn label(&mut self, text: impl Into<String>, at: Point2, color: Color) {
        self.shapes.push(Shape::Label {
            text: text.into(),
            at,
            color,
        });
    }

    /// Label stacked below the previous status line at the left edge
    pub fn status(&mut self, text: impl Into<String>) {
        self.status_lines += 1;
        let at = Point2::new(0.0, STATUS_LINE_HEIGHT * self.status_lines as f64);
        let color = self.palette.text;
        self.label(text, at, color);
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Label { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
        self.status_lines = 0;
    }
}
