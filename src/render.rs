// Chart and KPI derivations over a frame history

use crate::models::{Metrics, TelemetryFrame};

pub const DEFAULT_CHART_WIDTH: f64 = 600.0;
pub const DEFAULT_CHART_HEIGHT: f64 = 200.0;
pub const GRID_DIVISIONS: usize = 5;

/// `(index, value)` for frames that carry `parameter`, in arrival order.
/// Frames without it are skipped, not zero-filled; `index` counts the kept points.
pub fn series<'a, I>(frames: I, parameter: &str) -> Vec<(usize, f64)>
where
    I: IntoIterator<Item = &'a TelemetryFrame>,
{
    frames
        .into_iter()
        .filter_map(|f| f.get(parameter))
        .enumerate()
        .collect()
}

/// Vertical extent of the buffered points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YRange {
    pub min: f64,
    pub max: f64,
}

impl YRange {
    /// `None` for an empty series.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        values.into_iter().fold(None, |acc, v| match acc {
            None => Some(YRange { min: v, max: v }),
            Some(r) => Some(YRange {
                min: r.min.min(v),
                max: r.max.max(v),
            }),
        })
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// `max - min`, or 1 when flat.
    pub fn span(&self) -> f64 {
        if self.is_degenerate() {
            1.0
        } else {
            self.max - self.min
        }
    }

    /// Position of `value` in `[0, 1]`. A flat series sits at 0.5.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return 0.5;
        }
        let span = self.span();
        let t = if span.is_finite() {
            (value - self.min) / span
        } else {
            // `max - min` overflowed; halve everything first
            (value / 2.0 - self.min / 2.0) / (self.max / 2.0 - self.min / 2.0)
        };
        t.clamp(0.0, 1.0)
    }
}

/// Drawing surface in canvas coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
}

impl Default for ChartGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
        }
    }
}

impl ChartGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Y coordinates of the horizontal grid lines, top to bottom.
    pub fn grid_lines(&self) -> Vec<f64> {
        (0..=GRID_DIVISIONS)
            .map(|i| self.height / GRID_DIVISIONS as f64 * i as f64)
            .collect()
    }

    /// Canvas points for the line, or `None` when there are fewer than two samples
    /// (the surface then shows the grid only).
    pub fn polyline(&self, points: &[(usize, f64)]) -> Option<Vec<(f64, f64)>> {
        if points.len() < 2 {
            return None;
        }
        let range = YRange::from_values(points.iter().map(|&(_, v)| v))?;
        let step = self.width / (points.len() - 1) as f64;
        Some(
            points
                .iter()
                .map(|&(i, v)| {
                    let x = step * i as f64;
                    let y = self.height - range.normalize(v) * self.height;
                    (x, y)
                })
                .collect(),
        )
    }
}

/// Everything needed to draw one parameter's chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub parameter: String,
    pub headline: f64,
    pub range: Option<YRange>,
    pub grid: Vec<f64>,
    pub line: Option<Vec<(f64, f64)>>,
}

impl ChartView {
    pub fn build<'a, I>(frames: I, parameter: &str, geometry: ChartGeometry) -> Self
    where
        I: IntoIterator<Item = &'a TelemetryFrame>,
    {
        let frames: Vec<&TelemetryFrame> = frames.into_iter().collect();
        let points = series(frames.iter().copied(), parameter);
        ChartView {
            parameter: parameter.to_string(),
            headline: headline_value(frames.iter().copied(), parameter),
            range: YRange::from_values(points.iter().map(|&(_, v)| v)),
            grid: geometry.grid_lines(),
            line: geometry.polyline(&points),
        }
    }
}

/// Most recent reading of `parameter`, 0 before any sample arrives.
pub fn headline_value<'a, I>(frames: I, parameter: &str) -> f64
where
    I: IntoIterator<Item = &'a TelemetryFrame>,
    I::IntoIter: DoubleEndedIterator,
{
    frames
        .into_iter()
        .rev()
        .find_map(|f| f.get(parameter))
        .unwrap_or(0.0)
}

pub fn format_reading(value: f64) -> String {
    format!("{:.2}", value)
}

/// KPI tile text: two decimals, or `-` when the latest frame lacks the parameter.
pub fn kpi_text(latest: &Metrics, parameter: &str) -> String {
    latest
        .get(parameter)
        .map(|&v| format_reading(v))
        .unwrap_or_else(|| "-".to_string())
}

/// `temperature=21.50 pressure=-` style line for logs.
pub fn kpi_line(latest: &Metrics, parameters: &[String]) -> String {
    if parameters.is_empty() {
        return latest
            .iter()
            .map(|(k, v)| format!("{}={}", k, format_reading(*v)))
            .collect::<Vec<_>>()
            .join(" ");
    }
    parameters
        .iter()
        .map(|p| format!("{}={}", p, kpi_text(latest, p)))
        .collect::<Vec<_>>()
        .join(" ")
}
