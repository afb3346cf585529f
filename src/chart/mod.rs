pub mod options;
pub mod paint;
pub mod surface;

use crate::export::ExportError;
use crate::tier::Tier;
use eframe::egui;
use options::{OptionLayer, OptionsBuilder};
use serde_json::{json, Value};
use surface::{ChartHost, ChartInstance, ChartSurface};

pub const PRIMARY: &str = "#0d6efd";
pub const PRIMARY_FILL: &str = "#0d6efd20";
pub const PRESENT: &str = "#198754";
pub const ABSENT: &str = "#dc3545";
pub const LATE: &str = "#ffc107";

const BREAKDOWN_LABELS: [&str; 3] = ["Present", "Absent", "Late"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Trend,
    Comparison,
    Breakdown,
    Mixed,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [Self::Trend, Self::Comparison, Self::Breakdown, Self::Mixed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Comparison => "comparison",
            Self::Breakdown => "breakdown",
            Self::Mixed => "mixed",
        }
    }

    /// The host chart type the configuration is declared as.
    pub fn host_type(self) -> &'static str {
        match self {
            Self::Trend => "line",
            Self::Comparison | Self::Mixed => "bar",
            Self::Breakdown => "doughnut",
        }
    }

    fn layers(self) -> Vec<OptionLayer> {
        match self {
            Self::Trend => vec![options::percent_axis()],
            Self::Comparison => vec![options::percent_axis(), options::hidden_legend()],
            Self::Breakdown => vec![options::bottom_legend(), options::no_scales()],
            Self::Mixed => vec![options::secondary_percent_axis()],
        }
    }
}

/// Source data for a chart. Series charts read `labels`/`values`; breakdown
/// reads the `present`/`absent`/`late` totals; mixed reads all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub present: Vec<f64>,
    pub absent: Vec<f64>,
    pub late: Vec<f64>,
}

impl ChartData {
    pub fn series(labels: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            labels,
            values,
            ..Self::default()
        }
    }

    pub fn breakdown(present: f64, absent: f64, late: f64) -> Self {
        Self {
            present: vec![present],
            absent: vec![absent],
            late: vec![late],
            ..Self::default()
        }
    }

    pub fn breakdown_totals(&self) -> [f64; 3] {
        [
            self.present.iter().sum(),
            self.absent.iter().sum(),
            self.late.iter().sum(),
        ]
    }

    /// Labelled values for series charts, falling back to the breakdown totals.
    fn resolved_series(&self) -> (Vec<String>, Vec<f64>) {
        if self.values.is_empty() && !(self.present.is_empty() && self.absent.is_empty()) {
            let labels = BREAKDOWN_LABELS.iter().map(|label| label.to_string()).collect();
            return (labels, self.breakdown_totals().to_vec());
        }
        (self.labels.clone(), self.values.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub data: ChartData,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: impl Into<String>, data: ChartData) -> Self {
        Self {
            kind,
            title: title.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartHandle {
    pub mount: String,
    pub kind: ChartKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartMetrics {
    pub total: f64,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: &'static str,
    pub text: String,
}

/// A pending PNG export: the chart area to crop from the next window capture.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageExport {
    pub mount: String,
    pub filename: String,
    pub rect: egui::Rect,
}

pub struct ChartRenderer<H: ChartHost = ChartSurface> {
    host: H,
}

impl Default for ChartRenderer<ChartSurface> {
    fn default() -> Self {
        Self::new(ChartSurface::default())
    }
}

impl<H: ChartHost> ChartRenderer<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Configures a chart at `mount`, replacing whatever was there. Returns
    /// `None` when the mount does not exist.
    pub fn build(
        &mut self,
        mount: &str,
        kind: ChartKind,
        data: ChartData,
        overrides: &[OptionLayer],
    ) -> Option<ChartHandle> {
        if !self.host.has_mount(mount) {
            tracing::debug!(mount, "chart mount not found");
            return None;
        }

        let builder = OptionsBuilder::default()
            .layers(&kind.layers())
            .layers(overrides);
        tracing::debug!(mount, kind = kind.as_str(), layers = ?builder.layer_names(), "building chart");
        let options = builder.build();
        let config = json!({
            "type": kind.host_type(),
            "data": chart_datasets(kind, &data),
            "options": options,
        });

        self.host.destroy(mount);
        self.host.attach(
            mount,
            ChartInstance {
                kind,
                config,
                data,
                overrides: overrides.to_vec(),
                painted_rect: None,
            },
        );
        Some(ChartHandle {
            mount: mount.to_string(),
            kind,
        })
    }

    /// Rebuilds the chart at `mount` with the same data under `kind`.
    /// Does nothing when the mount holds no chart.
    pub fn change_type(&mut self, mount: &str, kind: ChartKind) -> Option<ChartHandle> {
        let existing = self.host.chart(mount)?;
        let data = existing.data.clone();
        let overrides = existing.overrides.clone();
        self.build(mount, kind, data, &overrides)
    }

    pub fn export_as_image(
        &self,
        mount: &str,
        filename: Option<&str>,
    ) -> Result<ImageExport, ExportError> {
        let chart = self
            .host
            .chart(mount)
            .ok_or_else(|| ExportError::MissingMount(mount.to_string()))?;
        let rect = chart.painted_rect.ok_or(ExportError::NothingToExport)?;
        let filename = match filename {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("{mount}.png"),
        };
        Ok(ImageExport {
            mount: mount.to_string(),
            filename,
            rect,
        })
    }

    pub fn chart_metrics(&self, handle: &ChartHandle) -> Option<ChartMetrics> {
        let chart = self.host.chart(&handle.mount)?;
        let values: Vec<f64> = chart.config["data"]["datasets"][0]["data"]
            .as_array()?
            .iter()
            .filter_map(Value::as_f64)
            .collect();
        metrics(&values)
    }
}

fn metrics(values: &[f64]) -> Option<ChartMetrics> {
    if values.is_empty() {
        return None;
    }
    let total: f64 = values.iter().sum();
    let average = total / values.len() as f64;
    Some(ChartMetrics {
        total,
        average: (average * 100.0).round() / 100.0,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        count: values.len(),
    })
}

pub fn bar_color(value: f64) -> &'static str {
    Tier::from_percentage(value).color_hex()
}

fn chart_datasets(kind: ChartKind, data: &ChartData) -> Value {
    match kind {
        ChartKind::Trend => {
            let (labels, values) = data.resolved_series();
            json!({
                "labels": labels,
                "datasets": [{
                    "label": "Attendance %",
                    "data": values,
                    "borderColor": PRIMARY,
                    "backgroundColor": PRIMARY_FILL,
                    "borderWidth": 3,
                    "tension": 0.4,
                    "fill": true
                }]
            })
        }
        ChartKind::Comparison => {
            let (labels, values) = data.resolved_series();
            let colors: Vec<&str> = values.iter().map(|value| bar_color(*value)).collect();
            json!({
                "labels": labels,
                "datasets": [{
                    "label": "Attendance %",
                    "data": values,
                    "backgroundColor": colors,
                    "borderColor": colors,
                    "borderWidth": 1,
                    "borderRadius": 6
                }]
            })
        }
        ChartKind::Breakdown => json!({
            "labels": BREAKDOWN_LABELS,
            "datasets": [{
                "data": data.breakdown_totals(),
                "backgroundColor": [PRESENT, ABSENT, LATE],
                "borderWidth": 0,
                "cutout": "60%"
            }]
        }),
        ChartKind::Mixed => json!({
            "labels": data.labels,
            "datasets": [
                {
                    "type": "bar",
                    "label": "Present",
                    "data": data.present,
                    "backgroundColor": PRESENT,
                    "borderWidth": 1
                },
                {
                    "type": "bar",
                    "label": "Absent",
                    "data": data.absent,
                    "backgroundColor": ABSENT,
                    "borderWidth": 1
                },
                {
                    "type": "line",
                    "label": "Attendance %",
                    "data": data.values,
                    "borderColor": PRIMARY,
                    "borderWidth": 3,
                    "tension": 0.4,
                    "fill": false,
                    "yAxisID": "y1"
                }
            ]
        }),
    }
}

fn share_of(value: f64, total: f64) -> String {
    if total > 0.0 {
        format!("{:.1}", value / total * 100.0)
    } else {
        "0".to_string()
    }
}

/// Legend rows for a breakdown: `"<label>: <value> (<share>%)"`.
pub fn legend_entries(totals: [f64; 3]) -> Vec<LegendEntry> {
    let total: f64 = totals.iter().sum();
    BREAKDOWN_LABELS
        .iter()
        .zip([PRESENT, ABSENT, LATE])
        .zip(totals)
        .map(|((label, color), value)| LegendEntry {
            label: label.to_string(),
            color,
            text: format!("{label}: {value} ({}%)", share_of(value, total)),
        })
        .collect()
}

pub fn tooltip_lines(kind: ChartKind, label: &str, value: f64, total: f64) -> Vec<String> {
    match kind {
        ChartKind::Trend => vec![format!("Attendance: {value:.1}%")],
        ChartKind::Comparison => vec![
            format!("Attendance: {value:.1}%"),
            format!("Status: {}", Tier::from_percentage(value).chart_label()),
        ],
        ChartKind::Breakdown => vec![format!("{label}: {value} ({}%)", share_of(value, total))],
        ChartKind::Mixed => vec![format!("{label}: {value}")],
    }
}
