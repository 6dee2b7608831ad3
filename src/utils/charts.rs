//! Diagnostic Chart Generator
//!
//! Renders scatter charts of evaluation results. The output format follows
//! the file extension: `.svg` is written as markup, `.png` (or no extension)
//! is rasterised with `imageproc` using the bundled DejaVu Sans face. Both
//! carry the title, axis labels, tick values, grid and markers.

use std::fs;
use std::path::Path;

use ab_glyph::FontRef;
use image::{imageops, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{Result, TrainKitError};

/// Chart size in pixels (6.4 x 4.8 inches at 150 dpi)
pub const CHART_WIDTH: u32 = 960;
pub const CHART_HEIGHT: u32 = 720;

const MARGIN_TOP: f64 = 70.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 90.0;
const MARGIN_LEFT: f64 = 100.0;

const MARKER_RADIUS: f64 = 5.0;
const GRID_LINES: usize = 5;

const TITLE_SIZE: f32 = 24.0;
const LABEL_SIZE: f32 = 18.0;
const TICK_SIZE: f32 = 14.0;

const COLOR_BLUE: [u8; 3] = [0, 0, 255];
const COLOR_GRID: [u8; 3] = [236, 240, 241];
const COLOR_AXIS: [u8; 3] = [44, 62, 80];
const COLOR_TEXT: [u8; 3] = [44, 62, 80];
const COLOR_BACKGROUND: [u8; 3] = [255, 255, 255];

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

pub const LDPA_TITLE: &str = "Long Distance Prediction Accuracy";
pub const LDPA_X_LABEL: &str = "Distance Between Open / Close";
pub const LDPA_Y_LABEL: &str = "Prediction Accuracy";

/// Prediction accuracy per open/close distance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub distances: Vec<f64>,
    pub accuracies: Vec<f64>,
}

impl PlotData {
    pub fn new(distances: Vec<f64>, accuracies: Vec<f64>) -> Self {
        Self {
            distances,
            accuracies,
        }
    }

    /// Pair up the two series, dropping points with a non-finite coordinate.
    ///
    /// Fails when the series have different lengths.
    pub fn points(&self) -> Result<Vec<(f64, f64)>> {
        if self.distances.len() != self.accuracies.len() {
            return Err(TrainKitError::Render(format!(
                "x and y must have the same length: {} distances, {} accuracies",
                self.distances.len(),
                self.accuracies.len()
            )));
        }

        Ok(self
            .distances
            .iter()
            .zip(&self.accuracies)
            .map(|(&x, &y)| (x, y))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect())
    }
}

impl From<(Vec<f64>, Vec<f64>)> for PlotData {
    fn from((distances, accuracies): (Vec<f64>, Vec<f64>)) -> Self {
        Self::new(distances, accuracies)
    }
}

/// Output format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFormat {
    Svg,
    Png,
}

impl ChartFormat {
    /// `.svg` or `.png`, case-insensitive. A path without extension is PNG.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("svg") => Ok(ChartFormat::Svg),
            Some("png") | None => Ok(ChartFormat::Png),
            Some(other) => Err(TrainKitError::Render(format!(
                "unsupported chart format {:?} for {:?}",
                other, path
            ))),
        }
    }
}

/// A single-series scatter chart
#[derive(Debug, Clone)]
pub struct ScatterChart<'a> {
    pub title: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub color: [u8; 3],
}

impl ScatterChart<'static> {
    /// Accuracy over open/close distance, blue markers
    pub fn long_distance_prediction_accuracy() -> Self {
        Self {
            title: LDPA_TITLE,
            x_label: LDPA_X_LABEL,
            y_label: LDPA_Y_LABEL,
            color: COLOR_BLUE,
        }
    }
}

impl ScatterChart<'_> {
    /// Render `data` and write it to `output_path`, replacing any existing file
    pub fn save(&self, data: &PlotData, output_path: &Path) -> Result<()> {
        let format = ChartFormat::from_path(output_path)?;
        let points = data.points()?;

        match format {
            ChartFormat::Svg => fs::write(output_path, self.render_svg(&points))?,
            ChartFormat::Png => self
                .render_png(&points)?
                .save_with_format(output_path, ImageFormat::Png)?,
        }

        debug!("Chart with {} points written to {:?}", points.len(), output_path);
        Ok(())
    }

    /// Render an SVG document
    pub fn render_svg(&self, points: &[(f64, f64)]) -> String {
        let frame = Frame::fit(points);
        let width = CHART_WIDTH as f64;
        let height = CHART_HEIGHT as f64;

        let mut svg = String::new();

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
            width, height, width, height
        ));
        svg.push_str(&format!(
            r#"<rect width="{}" height="{}" fill="white"/>"#,
            width, height
        ));

        // Title
        svg.push_str(&format!(
            r#"<text x="{}" y="40" text-anchor="middle" font-family="Arial, sans-serif" font-size="24" fill="{}">{}</text>"#,
            width / 2.0,
            hex(COLOR_TEXT),
            escape_xml(self.title)
        ));

        // Grid and tick values
        for i in 0..=GRID_LINES {
            let t = i as f64 / GRID_LINES as f64;

            let y = frame.bottom() - t * frame.plot_height();
            let y_value = frame.y_min + t * (frame.y_max - frame.y_min);
            svg.push_str(&format!(
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
                MARGIN_LEFT,
                y,
                frame.right(),
                y,
                hex(COLOR_GRID)
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
                MARGIN_LEFT - 10.0,
                y + 5.0,
                hex(COLOR_TEXT),
                format_tick(y_value, frame.y_max - frame.y_min)
            ));

            let x = MARGIN_LEFT + t * frame.plot_width();
            let x_value = frame.x_min + t * (frame.x_max - frame.x_min);
            svg.push_str(&format!(
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
                x,
                MARGIN_TOP,
                x,
                frame.bottom(),
                hex(COLOR_GRID)
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
                x,
                frame.bottom() + 25.0,
                hex(COLOR_TEXT),
                format_tick(x_value, frame.x_max - frame.x_min)
            ));
        }

        // Axes
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
            MARGIN_LEFT,
            frame.bottom(),
            frame.right(),
            frame.bottom(),
            hex(COLOR_AXIS)
        ));
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
            MARGIN_LEFT,
            MARGIN_TOP,
            MARGIN_LEFT,
            frame.bottom(),
            hex(COLOR_AXIS)
        ));

        // Axis labels
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" fill="{}">{}</text>"#,
            MARGIN_LEFT + frame.plot_width() / 2.0,
            height - 25.0,
            hex(COLOR_TEXT),
            escape_xml(self.x_label)
        ));
        svg.push_str(&format!(
            r#"<text x="30" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" fill="{}" transform="rotate(-90 30 {})">{}</text>"#,
            height / 2.0,
            hex(COLOR_TEXT),
            height / 2.0,
            escape_xml(self.y_label)
        ));

        // Markers
        for &(x, y) in points {
            let (px, py) = frame.to_pixel(x, y);
            svg.push_str(&format!(
                r#"<circle cx="{}" cy="{}" r="{}" fill="{}"/>"#,
                px,
                py,
                MARKER_RADIUS,
                hex(self.color)
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    /// Rasterise the chart
    pub fn render_png(&self, points: &[(f64, f64)]) -> Result<RgbImage> {
        let font = FontRef::try_from_slice(FONT_DATA)
            .map_err(|e| TrainKitError::Render(format!("Failed to load chart font: {e}")))?;
        let frame = Frame::fit(points);
        let width = CHART_WIDTH as f64;
        let height = CHART_HEIGHT as f64;
        let mut img = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, Rgb(COLOR_BACKGROUND));

        draw_text_centered(&mut img, &font, TITLE_SIZE, self.title, width / 2.0, 20.0);

        for i in 0..=GRID_LINES {
            let t = i as f64 / GRID_LINES as f64;

            let y = frame.bottom() - t * frame.plot_height();
            let y_value = frame.y_min + t * (frame.y_max - frame.y_min);
            draw_line_segment_mut(
                &mut img,
                (MARGIN_LEFT as f32, y as f32),
                (frame.right() as f32, y as f32),
                Rgb(COLOR_GRID),
            );
            let tick = format_tick(y_value, frame.y_max - frame.y_min);
            let (tick_width, _) = text_size(TICK_SIZE, &font, &tick);
            draw_text_mut(
                &mut img,
                Rgb(COLOR_TEXT),
                (MARGIN_LEFT - 10.0) as i32 - tick_width as i32,
                (y - 9.0) as i32,
                TICK_SIZE,
                &font,
                &tick,
            );

            let x = MARGIN_LEFT + t * frame.plot_width();
            let x_value = frame.x_min + t * (frame.x_max - frame.x_min);
            draw_line_segment_mut(
                &mut img,
                (x as f32, MARGIN_TOP as f32),
                (x as f32, frame.bottom() as f32),
                Rgb(COLOR_GRID),
            );
            let tick = format_tick(x_value, frame.x_max - frame.x_min);
            draw_text_centered(&mut img, &font, TICK_SIZE, &tick, x, frame.bottom() + 12.0);
        }

        draw_filled_rect_mut(
            &mut img,
            Rect::at(MARGIN_LEFT as i32, frame.bottom() as i32 - 1).of_size(frame.plot_width() as u32, 2),
            Rgb(COLOR_AXIS),
        );
        draw_filled_rect_mut(
            &mut img,
            Rect::at(MARGIN_LEFT as i32 - 1, MARGIN_TOP as i32).of_size(2, frame.plot_height() as u32),
            Rgb(COLOR_AXIS),
        );

        draw_text_centered(
            &mut img,
            &font,
            LABEL_SIZE,
            self.x_label,
            MARGIN_LEFT + frame.plot_width() / 2.0,
            height - 42.0,
        );
        draw_text_vertical(&mut img, &font, LABEL_SIZE, self.y_label, 18.0, height / 2.0);

        for &(x, y) in points {
            let (px, py) = frame.to_pixel(x, y);
            draw_filled_circle_mut(
                &mut img,
                (px.round() as i32, py.round() as i32),
                MARKER_RADIUS as i32,
                Rgb(self.color),
            );
        }

        Ok(img)
    }
}

/// Scatter accuracy against distance and write the chart to `save_path`
pub fn plot_long_distance_prediction_accuracy(data: &PlotData, save_path: &Path) -> Result<()> {
    ScatterChart::long_distance_prediction_accuracy().save(data, save_path)
}

/// Data ranges and their mapping onto the plot area
#[derive(Debug, Clone, Copy)]
struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    /// Data bounds padded by 5% on each side
    fn fit(points: &[(f64, f64)]) -> Self {
        if points.is_empty() {
            return Self {
                x_min: 0.0,
                x_max: 1.0,
                y_min: 0.0,
                y_max: 1.0,
            };
        }

        let (x_min, x_max, y_min, y_max) = find_ranges(points);
        let (x_min, x_max) = pad_range(x_min, x_max);
        let (y_min, y_max) = pad_range(y_min, y_max);

        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    fn plot_width(&self) -> f64 {
        CHART_WIDTH as f64 - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f64 {
        CHART_HEIGHT as f64 - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn right(&self) -> f64 {
        MARGIN_LEFT + self.plot_width()
    }

    fn bottom(&self) -> f64 {
        MARGIN_TOP + self.plot_height()
    }

    fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let px = MARGIN_LEFT + (x - self.x_min) / (self.x_max - self.x_min) * self.plot_width();
        let py = self.bottom() - (y - self.y_min) / (self.y_max - self.y_min) * self.plot_height();
        (px, py)
    }
}

fn find_ranges(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    (x_min, x_max, y_min, y_max)
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span == 0.0 {
        return (min - 0.5, max + 0.5);
    }
    (min - span * 0.05, max + span * 0.05)
}

fn format_tick(value: f64, span: f64) -> String {
    if span >= 10.0 {
        format!("{:.0}", value)
    } else if span >= 1.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Draw `text` horizontally centred on `cx` with its top at `top`
fn draw_text_centered(img: &mut RgbImage, font: &FontRef, size: f32, text: &str, cx: f64, top: f64) {
    let (text_width, _) = text_size(size, font, text);
    let left = cx - text_width as f64 / 2.0;
    draw_text_mut(img, Rgb(COLOR_TEXT), left as i32, top as i32, size, font, text);
}

/// Draw `text` reading bottom to top, vertically centred on `cy`
fn draw_text_vertical(img: &mut RgbImage, font: &FontRef, size: f32, text: &str, left: f64, cy: f64) {
    let (text_width, _) = text_size(size, font, text);
    let mut strip = RgbImage::from_pixel(
        text_width + 4,
        (size * 1.4).ceil() as u32,
        Rgb(COLOR_BACKGROUND),
    );
    draw_text_mut(&mut strip, Rgb(COLOR_TEXT), 2, 0, size, font, text);

    let rotated = imageops::rotate270(&strip);
    let top = cy - rotated.height() as f64 / 2.0;
    imageops::overlay(img, &rotated, left as i64, top as i64);
}

fn hex(color: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
