//! Overlay rendering onto RGB frames
//!
//! Rasterizes the polylines and markers of an [`Overlay`]. Text labels are
//! not rasterized; [`OverlayRenderer::format_overlay_text`] collects them for
//! logging.

use crate::config::RenderingConfig;
use crate::overlay::{Color, Overlay, Shape};
use aim_core::Point2;
use image::{Rgb, RgbImage};
use tracing::trace;

/// Renders diagnostic overlays on video frames
pub struct OverlayRenderer {
    config: RenderingConfig,
}

impl OverlayRenderer {
    pub fn new(config: &RenderingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Draw every shape of `overlay` on `frame`, returns the number drawn
    pub fn render(&self, frame: &mut RgbImage, overlay: &Overlay) -> usize {
        let mut drawn = 0;
        for shape in overlay.shapes() {
            match shape {
                Shape::Polyline {
                    points,
                    closed,
                    color,
                    thickness,
                } if self.config.draw_polylines => {
                    draw_polyline(frame, points, *closed, *color, *thickness);
                    drawn += 1;
                }
                Shape::Marker { at, color } if self.config.draw_markers => {
                    self.draw_marker(frame, *at, *color);
                    drawn += 1;
                }
                _ => {}
            }
        }
        trace!("Rendered {} of {} shapes", drawn, overlay.len());
        drawn
    }

    fn draw_marker(&self, frame: &mut RgbImage, at: Point2, color: Color) {
        let r = f64::from(self.config.marker_size);
        let diamond = [
            Point2::new(at.x, at.y - r),
            Point2::new(at.x + r, at.y),
            Point2::new(at.x, at.y + r),
            Point2::new(at.x - r, at.y),
        ];
        draw_polyline(frame, &diamond, true, color, 1);
    }

    /// Text of every label, one per line (for logging/debugging)
    pub fn format_overlay_text(&self, overlay: &Overlay) -> String {
        overlay.labels().fold(String::new(), |mut out, text| {
            out.push_str(text);
            out.push('\n');
            out
        })
    }
}

fn draw_polyline(frame: &mut RgbImage, points: &[Point2], closed: bool, color: Color, thickness: u32) {
    if points.len() == 1 {
        draw_line(frame, points[0], points[0], color, thickness);
    }
    for pair in points.windows(2) {
        draw_line(frame, pair[0], pair[1], color, thickness);
    }
    if closed && points.len() > 2 {
        draw_line(frame, points[points.len() - 1], points[0], color, thickness);
    }
}

/// Bresenham line with a square brush
fn draw_line(frame: &mut RgbImage, from: Point2, to: Point2, color: Color, thickness: u32) {
    let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
    let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = i64::from(thickness.max(1) - 1) / 2;

    loop {
        plot(frame, x0, y0, half, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn plot(frame: &mut RgbImage, x: i64, y: i64, half: i64, color: Color) {
    let (w, h) = (i64::from(frame.width()), i64::from(frame.height()));
    for py in (y - half)..=(y + half) {
        for px in (x - half)..=(x + half) {
            if px >= 0 && py >= 0 && px < w && py < h {
                frame.put_pixel(px as u32, py as u32, Rgb([color.0, color.1, color.2]));
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Palette;

    #[test]
    fn test_render_polygon_and_marker() {
        let renderer = OverlayRenderer::new(&RenderingConfig::default());
        let mut overlay = Overlay::new(Palette::default());
        let square = [
            Point2::new(10.0, 10.0),
            Point2::new(30.0, 10.0),
            Point2::new(30.0, 30.0),
            Point2::new(10.0, 30.0),
        ];
        overlay.polygon(&square, Color::GREEN, 1);
        overlay.marker(Point2::new(60.0, 60.0), Color::RED);
        overlay.status("2 armors in 1 ms.");

        let mut frame = RgbImage::new(100, 100);
        assert_eq!(renderer.render(&mut frame, &overlay), 2);
        assert_eq!(frame.get_pixel(20, 10), &Rgb([0, 255, 0]));
        assert_eq!(frame.get_pixel(10, 20), &Rgb([0, 255, 0]));
        assert_eq!(frame.get_pixel(60, 50), &Rgb([255, 0, 0]));
        assert_eq!(frame.get_pixel(20, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_shapes_outside_frame_are_clipped() {
        let renderer = OverlayRenderer::new(&RenderingConfig::default());
        let mut overlay = Overlay::new(Palette::default());
        overlay.line(Point2::new(-50.0, 5.0), Point2::new(500.0, 5.0), Color::WHITE, 3);

        let mut frame = RgbImage::new(20, 10);
        renderer.render(&mut frame, &overlay);
        assert_eq!(frame.get_pixel(19, 5), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_format_overlay_text() {
        let renderer = OverlayRenderer::new(&RenderingConfig::default());
        let mut overlay = Overlay::new(Palette::default());
        overlay.status("Direction CW in 0 ms.");
        overlay.label("320.00, 90.00", Point2::new(300.0, 80.0), Color::RED);

        let text = renderer.format_overlay_text(&overlay);
        assert!(text.contains("Direction CW"));
        assert!(text.contains("320.00, 90.00"));
    }
}
