//! Figure model and PNG rasterization
//!
//! Scripts build figures through the plotting calls injected by the engine;
//! the capture sink serializes each emitted figure to a base64-encoded PNG.
//! Rasterization is deterministic, so identical figures encode to identical
//! blobs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
/// Margin around the plot area, in pixels
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([96, 96, 96]);
/// Series colors, cycled in plot order
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
];

#[derive(Debug, Error)]
pub enum FigureError {
    #[error("failed to encode figure as PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// One line series of (x, y) points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub points: Vec<(f64, f64)>,
}

/// A figure under construction by the running script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Figure {
    pub series: Vec<Series>,
}

impl Figure {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn add_series(&mut self, points: Vec<(f64, f64)>) {
        self.series.push(Series { points });
    }

    /// Rasterize to an in-memory PNG
    pub fn render_png(&self) -> Result<Vec<u8>, FigureError> {
        let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
        draw_frame(&mut canvas);

        let (x_range, y_range) = self.bounds();
        for (index, series) in self.series.iter().enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            for pair in series.points.windows(2) {
                let a = project(pair[0], x_range, y_range);
                let b = project(pair[1], x_range, y_range);
                draw_segment(&mut canvas, a, b, color);
            }
            if series.points.len() == 1 {
                let center = project(series.points[0], x_range, y_range);
                draw_dot(&mut canvas, center, color);
            }
        }

        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    /// Rasterize and base64-encode
    pub fn to_base64_png(&self) -> Result<String, FigureError> {
        Ok(STANDARD.encode(self.render_png()?))
    }

    /// Data bounds over all finite points, padded when degenerate
    fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;

        for series in &self.series {
            for &(x, y) in &series.points {
                if x.is_finite() && y.is_finite() {
                    x_min = x_min.min(x);
                    x_max = x_max.max(x);
                    y_min = y_min.min(y);
                    y_max = y_max.max(y);
                }
            }
        }

        if x_min > x_max || y_min > y_max {
            return ((0.0, 1.0), (0.0, 1.0));
        }
        if x_min == x_max {
            x_min -= 0.5;
            x_max += 0.5;
        }
        if y_min == y_max {
            y_min -= 0.5;
            y_max += 0.5;
        }
        ((x_min, x_max), (y_min, y_max))
    }
}

fn project(point: (f64, f64), x_range: (f64, f64), y_range: (f64, f64)) -> (f64, f64) {
    let plot_w = (WIDTH - 2 * MARGIN) as f64;
    let plot_h = (HEIGHT - 2 * MARGIN) as f64;
    let px = MARGIN as f64 + (point.0 - x_range.0) / (x_range.1 - x_range.0) * plot_w;
    let py = (HEIGHT - MARGIN) as f64 - (point.1 - y_range.0) / (y_range.1 - y_range.0) * plot_h;
    (px, py)
}

fn draw_segment(canvas: &mut RgbImage, a: (f64, f64), b: (f64, f64), color: Rgb<u8>) {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return;
    }
    let steps = ((b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil() as usize).max(1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = a.0 + (b.0 - a.0) * t;
        let y = a.1 + (b.1 - a.1) * t;
        put_pixel_clamped(canvas, x.round() as i64, y.round() as i64, color);
    }
}

fn draw_dot(canvas: &mut RgbImage, center: (f64, f64), color: Rgb<u8>) {
    let cx = center.0.round() as i64;
    let cy = center.1.round() as i64;
    for dx in -1..=1 {
        for dy in -1..=1 {
            put_pixel_clamped(canvas, cx + dx, cy + dy, color);
        }
    }
}

fn draw_frame(canvas: &mut RgbImage) {
    let left = MARGIN as i64;
    let right = (WIDTH - MARGIN) as i64 - 1;
    let top = MARGIN as i64;
    let bottom = (HEIGHT - MARGIN) as i64 - 1;
    for x in left..=right {
        put_pixel_clamped(canvas, x, top, FRAME);
        put_pixel_clamped(canvas, x, bottom, FRAME);
    }
    for y in top..=bottom {
        put_pixel_clamped(canvas, left, y, FRAME);
        put_pixel_clamped(canvas, right, y, FRAME);
    }
}

fn put_pixel_clamped(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < WIDTH && (y as u32) < HEIGHT {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}
