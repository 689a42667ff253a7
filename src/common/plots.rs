//! Plotting infrastructure for multi-panel comparison charts
//!
//! Charts are described as plain data ([`Figure`], [`LinePanel`], [`BoxPanel`])
//! and rendered to PNG with the [`plotters`] bitmap backend. Building the
//! description is separate from drawing it, so chart contents can be checked
//! without any font rendering.

use crate::analysis::stats::percentile_sorted;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during plot generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("Failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Failed to save plot to file: {0}")]
    FileSave(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

type Result<T> = core::result::Result<T, PlotError>;

/// A single panel, 6x4 inches at 110 DPI
pub const SINGLE_SIZE: (u32, u32) = (660, 440);
/// Three panels side by side
pub const TRIPLE_SIZE: (u32, u32) = (1980, 440);
/// Time series and per-pod charts
pub const WIDE_SIZE: (u32, u32) = (1320, 660);
/// 2x2 grid
pub const GRID_SIZE: (u32, u32) = (1760, 1100);

/// One line on a [`LinePanel`]
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend entry; [`None`] keeps the series out of the legend
    pub label: Option<String>,
    /// Index into the colour palette
    pub color: usize,
    pub points: Vec<(f64, f64)>,
    /// Draws a circle on every point
    pub markers: bool,
    /// `1.0` is fully opaque
    pub opacity: f64,
}

impl Series {
    /// Creates an opaque series with point markers
    pub fn new(label: Option<String>, color: usize, points: Vec<(f64, f64)>) -> Self {
        Self {
            label,
            color,
            points,
            markers: true,
            opacity: 1.0,
        }
    }
}

/// A line chart with shared axes
#[derive(Debug, Clone, PartialEq)]
pub struct LinePanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    /// Fixed Y axis; fitted to the data when [`None`]
    pub y_range: Option<Range<f64>>,
}

/// Five-number summary of one box on a [`BoxPanel`]
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub label: String,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
}

impl BoxStats {
    /// Computes quartiles and whiskers for `values`.
    ///
    /// Whiskers reach the most extreme data points within 1.5 IQR of the box.
    /// Returns [`None`] when there are no finite values.
    pub fn from_values(label: &str, values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile_sorted(&sorted, 25.0);
        let median = percentile_sorted(&sorted, 50.0);
        let q3 = percentile_sorted(&sorted, 75.0);
        let reach = 1.5 * (q3 - q1);

        let lower_whisker = sorted
            .iter()
            .copied()
            .find(|v| *v >= q1 - reach)
            .unwrap_or(q1);
        let upper_whisker = sorted
            .iter()
            .rev()
            .copied()
            .find(|v| *v <= q3 + reach)
            .unwrap_or(q3);

        Some(Self {
            label: label.to_string(),
            lower_whisker,
            q1,
            median,
            q3,
            upper_whisker,
        })
    }
}

/// A box plot, one box per category
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPanel {
    pub title: String,
    pub y_label: String,
    pub boxes: Vec<BoxStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Line(LinePanel),
    Box(BoxPanel),
}

/// A full PNG: an optional overall title above a grid of panels
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: Option<String>,
    pub size: (u32, u32),
    /// `(rows, columns)`
    pub layout: (usize, usize),
    pub panels: Vec<Panel>,
}

impl Figure {
    /// Whether any panel has something to draw
    pub fn has_data(&self) -> bool {
        self.panels.iter().any(|panel| match panel {
            Panel::Line(line) => line.series.iter().any(|s| !s.points.is_empty()),
            Panel::Box(boxes) => !boxes.boxes.is_empty(),
        })
    }
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Renders `figure` and saves it as a PNG at `output_path`
///
/// # Arguments
/// * `figure` - Panels and layout to draw
/// * `output_path` - Path where the PNG file should be saved
///
/// # Returns
/// * `Ok(())` - If the chart was successfully created and saved
/// * `Err(PlotError)` - If the figure is malformed or drawing failed
pub fn render_figure(figure: &Figure, output_path: &Path) -> Result<()> {
    let (rows, columns) = figure.layout;
    if figure.panels.is_empty() {
        return Err(PlotError::InvalidData("Figure has no panels".to_string()));
    }
    if figure.panels.len() > rows * columns {
        return Err(PlotError::InvalidData(format!(
            "{} panels do not fit a {}x{} layout",
            figure.panels.len(),
            rows,
            columns
        )));
    }

    let root = BitMapBackend::new(output_path, figure.size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let content = match &figure.title {
        Some(title) => root
            .titled(title, ("sans-serif", 26))
            .map_err(|e| PlotError::DrawingArea(e.to_string()))?,
        None => root.clone(),
    };

    for (area, panel) in content.split_evenly(figure.layout).iter().zip(&figure.panels) {
        match panel {
            Panel::Line(line) => draw_line_panel(area, line)?,
            Panel::Box(boxes) => draw_box_panel(area, boxes)?,
        }
    }

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    Ok(())
}

fn draw_line_panel(area: &Area<'_>, panel: &LinePanel) -> Result<()> {
    let points = || panel.series.iter().flat_map(|s| s.points.iter());
    let x_range = fit_range(points().map(|(x, _)| *x));
    let y_range = panel
        .y_range
        .clone()
        .unwrap_or_else(|| fit_range(points().map(|(_, y)| *y)));

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .label_style(("sans-serif", 14))
        .light_line_style(BLACK.mix(0.05))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    for series in &panel.series {
        let color = Palette99::pick(series.color).mix(series.opacity);
        let style = color.stroke_width(2);

        let annotation = chart
            .draw_series(LineSeries::new(series.points.iter().copied(), style))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
        if let Some(label) = &series.label {
            annotation
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }

        if series.markers {
            chart
                .draw_series(
                    series
                        .points
                        .iter()
                        .map(|point| Circle::new(*point, 3, color.filled())),
                )
                .map_err(|e| PlotError::Drawing(e.to_string()))?;
        }
    }

    if panel.series.iter().any(|s| s.label.is_some()) {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.3))
            .label_font(("sans-serif", 12))
            .draw()
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }

    Ok(())
}

fn draw_box_panel(area: &Area<'_>, panel: &BoxPanel) -> Result<()> {
    let count = panel.boxes.len();
    let x_range = -0.5..(count.max(1) as f64 - 0.5);
    let y_range = fit_range(
        panel
            .boxes
            .iter()
            .flat_map(|b| [b.lower_whisker, b.upper_whisker]),
    );

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    let category = |x: &f64| {
        let index = x.round();
        if (x - index).abs() > 0.01 || index < 0.0 {
            return String::new();
        }
        panel
            .boxes
            .get(index as usize)
            .map(|b| b.label.clone())
            .unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(count.max(1))
        .x_label_formatter(&category)
        .y_desc(panel.y_label.as_str())
        .label_style(("sans-serif", 14))
        .light_line_style(BLACK.mix(0.05))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    for (index, stats) in panel.boxes.iter().enumerate() {
        let center = index as f64;
        let (left, right) = (center - 0.3, center + 0.3);
        let fill = Palette99::pick(index).mix(0.7);

        chart
            .draw_series([
                Rectangle::new([(left, stats.q1), (right, stats.q3)], fill.filled()),
                Rectangle::new([(left, stats.q1), (right, stats.q3)], BLACK.stroke_width(1)),
            ])
            .map_err(|e| PlotError::Drawing(e.to_string()))?;

        chart
            .draw_series([
                PathElement::new(vec![(left, stats.median), (right, stats.median)], BLACK.stroke_width(2)),
                PathElement::new(vec![(center, stats.q3), (center, stats.upper_whisker)], BLACK.stroke_width(1)),
                PathElement::new(vec![(center, stats.q1), (center, stats.lower_whisker)], BLACK.stroke_width(1)),
                PathElement::new(
                    vec![(center - 0.15, stats.upper_whisker), (center + 0.15, stats.upper_whisker)],
                    BLACK.stroke_width(1),
                ),
                PathElement::new(
                    vec![(center - 0.15, stats.lower_whisker), (center + 0.15, stats.lower_whisker)],
                    BLACK.stroke_width(1),
                ),
            ])
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }

    Ok(())
}

/// Axis range covering `values` with 5% padding on each side
fn fit_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if min > max {
        return 0.0..1.0;
    }
    if min == max {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
        return (min - pad)..(max + pad);
    }

    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn line_figure(points: Vec<(f64, f64)>) -> Figure {
        Figure {
            title: Some("Test Figure".to_string()),
            size: SINGLE_SIZE,
            layout: (1, 1),
            panels: vec![Panel::Line(LinePanel {
                title: "Panel".to_string(),
                x_label: "x".to_string(),
                y_label: "y".to_string(),
                series: vec![Series::new(Some("exp".to_string()), 0, points)],
                y_range: None,
            })],
        }
    }

    #[test]
    fn test_fit_range() {
        assert_eq!(fit_range(std::iter::empty()), 0.0..1.0);
        assert_eq!(fit_range([0.0].into_iter()), -1.0..1.0);
        assert_eq!(fit_range([10.0].into_iter()), 9.0..11.0);
        assert_eq!(fit_range([0.0, 100.0, f64::NAN].into_iter()), -5.0..105.0);
    }

    #[test]
    fn test_box_stats() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let stats = BoxStats::from_values("exp", &values).unwrap();

        assert_eq!(stats.q1, 2.25);
        assert_eq!(stats.median, 3.5);
        assert_eq!(stats.q3, 4.75);
        assert_eq!(stats.lower_whisker, 1.0);
        // 100 lies beyond q3 + 1.5 IQR and is treated as an outlier
        assert_eq!(stats.upper_whisker, 5.0);

        assert!(BoxStats::from_values("empty", &[]).is_none());
        assert!(BoxStats::from_values("nan", &[f64::NAN]).is_none());
    }

    #[test]
    fn test_has_data() {
        assert!(line_figure(vec![(1.0, 1.0)]).has_data());
        assert!(!line_figure(Vec::new()).has_data());
    }

    #[test]
    fn test_render_rejects_bad_layout() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("bad.png");

        let mut figure = line_figure(vec![(1.0, 1.0)]);
        figure.panels.push(figure.panels[0].clone());
        let result = render_figure(&figure, &output_path);
        assert!(matches!(result, Err(PlotError::InvalidData(_))));

        figure.panels.clear();
        let result = render_figure(&figure, &output_path);
        assert!(matches!(result, Err(PlotError::InvalidData(_))));
    }

    #[test]
    #[ignore = "Font rendering not available in test environment"]
    fn test_render_line_figure() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("line.png");

        let figure = line_figure(vec![(1.0, 10.0), (2.0, 20.0), (4.0, 35.0)]);
        render_figure(&figure, &output_path).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    #[ignore = "Font rendering not available in test environment"]
    fn test_render_box_figure() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("box.png");

        let figure = Figure {
            title: None,
            size: WIDE_SIZE,
            layout: (1, 2),
            panels: vec![Panel::Box(BoxPanel {
                title: "Distribution".to_string(),
                y_label: "Value".to_string(),
                boxes: vec![
                    BoxStats::from_values("a", &[1.0, 2.0, 3.0]).unwrap(),
                    BoxStats::from_values("b", &[2.0, 4.0, 8.0]).unwrap(),
                ],
            })],
        };
        render_figure(&figure, &output_path).unwrap();
        assert!(output_path.exists());
    }
}
