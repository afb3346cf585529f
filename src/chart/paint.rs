use super::surface::ChartInstance;
use super::{legend_entries, tooltip_lines, ChartKind};
use crate::theme::{hex_color, Theme};
use eframe::egui::{self, pos2, vec2, Align2, Color32, CornerRadius, FontId, Pos2, Rect, Sense, Shape, Stroke};
use serde_json::Value;
use std::f32::consts::TAU;

const CHART_HEIGHT: f32 = 220.0;
const AXIS_GUTTER: f32 = 36.0;
const LABEL_GUTTER: f32 = 18.0;
const GRID_STEPS: [f64; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

fn labels(config: &Value) -> Vec<String> {
    config["data"]["labels"]
        .as_array()
        .map(|labels| {
            labels
                .iter()
                .map(|label| label.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn dataset(config: &Value, index: usize) -> &Value {
    &config["data"]["datasets"][index]
}

fn values(dataset: &Value) -> Vec<f64> {
    dataset["data"]
        .as_array()
        .map(|values| values.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect())
        .unwrap_or_default()
}

/// Reads a colour that is either a single string or a per-datum array.
fn color_at(dataset: &Value, key: &str, index: usize, fallback: Color32) -> Color32 {
    let raw = match &dataset[key] {
        Value::Array(colors) => colors.get(index).and_then(Value::as_str),
        Value::String(color) => Some(color.as_str()),
        _ => None,
    };
    raw.and_then(hex_color).unwrap_or(fallback)
}

fn plot_area(rect: Rect, right_axis: bool) -> Rect {
    let right = if right_axis { AXIS_GUTTER } else { 8.0 };
    Rect::from_min_max(
        pos2(rect.left() + AXIS_GUTTER, rect.top() + 8.0),
        pos2(rect.right() - right, rect.bottom() - LABEL_GUTTER),
    )
}

fn y_for(plot: Rect, value: f64, max: f64) -> f32 {
    let ratio = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
    plot.bottom() - plot.height() * ratio as f32
}

fn slot_center(plot: Rect, index: usize, count: usize) -> f32 {
    let slot = plot.width() / count.max(1) as f32;
    plot.left() + slot * (index as f32 + 0.5)
}

fn paint_grid(painter: &egui::Painter, plot: Rect, max: f64, suffix: &str, theme: &Theme, left: bool) {
    let font = FontId::proportional(10.0);
    for step in GRID_STEPS {
        let value = max * step / 100.0;
        let y = y_for(plot, value, max);
        if left {
            painter.line_segment(
                [pos2(plot.left(), y), pos2(plot.right(), y)],
                Stroke::new(1.0, theme.border_subtle),
            );
            painter.text(
                pos2(plot.left() - 4.0, y),
                Align2::RIGHT_CENTER,
                format!("{value:.0}{suffix}"),
                font.clone(),
                theme.text_muted,
            );
        } else {
            painter.text(
                pos2(plot.right() + 4.0, y),
                Align2::LEFT_CENTER,
                format!("{value:.0}{suffix}"),
                font.clone(),
                theme.text_muted,
            );
        }
    }
}

fn paint_x_labels(painter: &egui::Painter, plot: Rect, labels: &[String], theme: &Theme) {
    let font = FontId::proportional(10.0);
    for (index, label) in labels.iter().enumerate() {
        painter.text(
            pos2(slot_center(plot, index, labels.len()), plot.bottom() + 3.0),
            Align2::CENTER_TOP,
            label,
            font.clone(),
            theme.text_muted,
        );
    }
}

fn hovered_slot(response: &egui::Response, plot: Rect, count: usize) -> Option<usize> {
    let pointer = response.hover_pos()?;
    if count == 0 || !plot.contains(pointer) {
        return None;
    }
    let slot = plot.width() / count as f32;
    Some((((pointer.x - plot.left()) / slot) as usize).min(count - 1))
}

/// Paints `chart` into the next slot of `ui` and returns the allocated response.
pub fn paint_chart(ui: &mut egui::Ui, chart: &ChartInstance, theme: &Theme) -> egui::Response {
    let width = ui.available_width().max(240.0);
    let (rect, response) = ui.allocate_exact_size(vec2(width, CHART_HEIGHT), Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, CornerRadius::same(8), theme.surface_0);

    let config = &chart.config;
    if let Some(title) = config["options"]["plugins"]["title"]["text"].as_str() {
        if !title.is_empty() {
            painter.text(
                rect.center_top() + vec2(0.0, 2.0),
                Align2::CENTER_TOP,
                title,
                FontId::proportional(11.0),
                theme.text_muted,
            );
        }
    }

    let tooltip = match chart.kind {
        ChartKind::Trend => paint_trend(&painter, rect, config, theme, &response),
        ChartKind::Comparison => paint_bars(&painter, rect, config, theme, &response),
        ChartKind::Breakdown => paint_doughnut(&painter, rect, config, theme),
        ChartKind::Mixed => paint_mixed(&painter, rect, config, theme, &response),
    };

    match tooltip {
        Some(lines) => response.on_hover_text_at_pointer(lines.join("\n")),
        None => response,
    }
}

fn paint_trend(
    painter: &egui::Painter,
    rect: Rect,
    config: &Value,
    theme: &Theme,
    response: &egui::Response,
) -> Option<Vec<String>> {
    let plot = plot_area(rect, false);
    let labels = labels(config);
    let series = dataset(config, 0);
    let values = values(series);
    paint_grid(painter, plot, 100.0, "%", theme, true);
    paint_x_labels(painter, plot, &labels, theme);

    let color = color_at(series, "borderColor", 0, theme.accent_primary);
    let points: Vec<Pos2> = values
        .iter()
        .enumerate()
        .map(|(index, value)| pos2(slot_center(plot, index, values.len()), y_for(plot, *value, 100.0)))
        .collect();
    if points.len() > 1 {
        painter.add(Shape::line(points.clone(), Stroke::new(3.0, color)));
    }
    for point in &points {
        painter.circle_filled(*point, 3.5, color);
    }

    let index = hovered_slot(response, plot, values.len())?;
    let label = labels.get(index).map(String::as_str).unwrap_or_default();
    Some(tooltip_lines(ChartKind::Trend, label, values[index], 0.0))
}

fn paint_bars(
    painter: &egui::Painter,
    rect: Rect,
    config: &Value,
    theme: &Theme,
    response: &egui::Response,
) -> Option<Vec<String>> {
    let plot = plot_area(rect, false);
    let labels = labels(config);
    let series = dataset(config, 0);
    let values = values(series);
    paint_grid(painter, plot, 100.0, "%", theme, true);
    paint_x_labels(painter, plot, &labels, theme);

    let slot = plot.width() / values.len().max(1) as f32;
    for (index, value) in values.iter().enumerate() {
        let center = slot_center(plot, index, values.len());
        let bar = Rect::from_min_max(
            pos2(center - slot * 0.3, y_for(plot, *value, 100.0)),
            pos2(center + slot * 0.3, plot.bottom()),
        );
        painter.rect_filled(
            bar,
            CornerRadius::same(6),
            color_at(series, "backgroundColor", index, theme.accent_primary),
        );
    }

    let index = hovered_slot(response, plot, values.len())?;
    let label = labels.get(index).map(String::as_str).unwrap_or_default();
    Some(tooltip_lines(ChartKind::Comparison, label, values[index], 0.0))
}

fn paint_doughnut(
    painter: &egui::Painter,
    rect: Rect,
    config: &Value,
    theme: &Theme,
) -> Option<Vec<String>> {
    let series = dataset(config, 0);
    let totals = values(series);
    let total: f64 = totals.iter().sum();
    let legend_height = 20.0;
    let center = pos2(rect.center().x, rect.top() + (rect.height() - legend_height) / 2.0 + 6.0);
    let outer = ((rect.height() - legend_height) / 2.0 - 12.0).max(20.0);
    let thickness = outer * 0.4;
    let radius = outer - thickness / 2.0;

    if total <= 0.0 {
        painter.circle_stroke(center, radius, Stroke::new(thickness, theme.surface_3));
    } else {
        let mut start = -TAU / 4.0;
        for (index, value) in totals.iter().enumerate() {
            let sweep = TAU * (*value / total) as f32;
            if sweep <= 0.0 {
                continue;
            }
            let steps = ((sweep / TAU) * 96.0).ceil().max(2.0) as usize;
            let arc: Vec<Pos2> = (0..=steps)
                .map(|step| {
                    let angle = start + sweep * step as f32 / steps as f32;
                    center + vec2(angle.cos(), angle.sin()) * radius
                })
                .collect();
            let color = color_at(series, "backgroundColor", index, theme.accent_primary);
            painter.add(Shape::line(arc, Stroke::new(thickness, color)));
            start += sweep;
        }
    }

    let mut totals_fixed = [0.0; 3];
    for (slot, value) in totals_fixed.iter_mut().zip(totals.iter()) {
        *slot = *value;
    }
    let entries = legend_entries(totals_fixed);
    let column = rect.width() / entries.len() as f32;
    for (index, entry) in entries.iter().enumerate() {
        let anchor = pos2(
            rect.left() + column * (index as f32 + 0.5),
            rect.bottom() - legend_height / 2.0,
        );
        let swatch = anchor - vec2(column * 0.4, 0.0);
        painter.circle_filled(
            swatch,
            4.0,
            hex_color(entry.color).unwrap_or(theme.accent_primary),
        );
        painter.text(
            swatch + vec2(8.0, 0.0),
            Align2::LEFT_CENTER,
            &entry.text,
            FontId::proportional(11.0),
            theme.text_primary,
        );
    }
    None
}

fn paint_mixed(
    painter: &egui::Painter,
    rect: Rect,
    config: &Value,
    theme: &Theme,
    response: &egui::Response,
) -> Option<Vec<String>> {
    let plot = plot_area(rect, true);
    let labels = labels(config);
    let present_set = dataset(config, 0);
    let absent_set = dataset(config, 1);
    let line_set = dataset(config, 2);
    let present = values(present_set);
    let absent = values(absent_set);
    let percentages = values(line_set);

    let count = labels.len().max(present.len()).max(percentages.len());
    let max_count = present
        .iter()
        .chain(absent.iter())
        .copied()
        .fold(0.0_f64, f64::max)
        .max(1.0);
    paint_grid(painter, plot, max_count, "", theme, true);
    paint_grid(painter, plot, 100.0, "%", theme, false);
    paint_x_labels(painter, plot, &labels, theme);

    let slot = plot.width() / count.max(1) as f32;
    for index in 0..count {
        let center = slot_center(plot, index, count);
        for (offset, (set, series)) in [(-1.0, (present_set, &present)), (0.0, (absent_set, &absent))] {
            let Some(value) = series.get(index) else {
                continue;
            };
            let left = center + offset * slot * 0.35;
            let bar = Rect::from_min_max(
                pos2(left, y_for(plot, *value, max_count)),
                pos2(left + slot * 0.35, plot.bottom()),
            );
            painter.rect_filled(bar, CornerRadius::same(3), color_at(set, "backgroundColor", 0, theme.accent_muted));
        }
    }

    let line_color = color_at(line_set, "borderColor", 0, theme.accent_primary);
    let points: Vec<Pos2> = percentages
        .iter()
        .enumerate()
        .map(|(index, value)| pos2(slot_center(plot, index, count), y_for(plot, *value, 100.0)))
        .collect();
    if points.len() > 1 {
        painter.add(Shape::line(points.clone(), Stroke::new(3.0, line_color)));
    }
    for point in &points {
        painter.circle_filled(*point, 3.0, line_color);
    }

    let index = hovered_slot(response, plot, count)?;
    let label = labels.get(index).map(String::as_str).unwrap_or_default();
    let mut lines = Vec::new();
    for (name, series) in [("Present", &present), ("Absent", &absent), ("Attendance %", &percentages)] {
        if let Some(value) = series.get(index) {
            lines.extend(tooltip_lines(ChartKind::Mixed, name, *value, 0.0));
        }
    }
    if !label.is_empty() {
        lines.insert(0, label.to_string());
    }
    Some(lines)
}
