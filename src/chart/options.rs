//! Layered chart options.
//!
//! Every chart starts from [`baseline`] and applies named layers in order.
//! Objects merge key by key; any other value (scalars, arrays, null) replaces
//! what was there. A layer therefore only touches the paths it names.

use serde_json::{json, Value};

const FONT_FAMILY: &str = "Segoe UI, Tahoma, Geneva, Verdana, sans-serif";

#[derive(Debug, Clone, PartialEq)]
pub struct OptionLayer {
    pub name: String,
    pub value: Value,
}

impl OptionLayer {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    base: Value,
    layers: Vec<OptionLayer>,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new(baseline())
    }
}

impl OptionsBuilder {
    pub fn new(base: Value) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    pub fn layer(mut self, layer: OptionLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers<'a>(mut self, layers: impl IntoIterator<Item = &'a OptionLayer>) -> Self {
        self.layers.extend(layers.into_iter().cloned());
        self
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name.as_str()).collect()
    }

    pub fn build(&self) -> Value {
        let mut options = self.base.clone();
        for layer in &self.layers {
            deep_merge(&mut options, &layer.value);
        }
        options
    }
}

pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

/// Shared grid, legend and tooltip presentation.
pub fn baseline() -> Value {
    json!({
        "responsive": true,
        "maintainAspectRatio": false,
        "plugins": {
            "legend": {
                "display": true,
                "position": "top",
                "labels": {
                    "usePointStyle": true,
                    "padding": 20,
                    "font": { "family": FONT_FAMILY, "size": 12 }
                }
            },
            "tooltip": {
                "backgroundColor": "rgba(0, 0, 0, 0.8)",
                "titleColor": "white",
                "bodyColor": "white",
                "borderColor": "#0d6efd",
                "borderWidth": 1,
                "cornerRadius": 8,
                "padding": 12,
                "displayColors": false
            }
        },
        "scales": {
            "x": {
                "grid": { "display": true, "color": "rgba(0, 0, 0, 0.1)" },
                "ticks": { "font": { "family": FONT_FAMILY, "size": 11 } }
            },
            "y": {
                "grid": { "display": true, "color": "rgba(0, 0, 0, 0.1)" },
                "ticks": { "font": { "family": FONT_FAMILY, "size": 11 } }
            }
        }
    })
}

pub fn percent_axis() -> OptionLayer {
    OptionLayer::new(
        "percent-axis",
        json!({
            "scales": {
                "y": { "beginAtZero": true, "min": 0, "max": 100, "ticks": { "suffix": "%" } }
            }
        }),
    )
}

pub fn hidden_legend() -> OptionLayer {
    OptionLayer::new(
        "hidden-legend",
        json!({ "plugins": { "legend": { "display": false } } }),
    )
}

pub fn bottom_legend() -> OptionLayer {
    OptionLayer::new(
        "bottom-legend",
        json!({ "plugins": { "legend": { "position": "bottom" } } }),
    )
}

pub fn no_scales() -> OptionLayer {
    OptionLayer::new(
        "no-scales",
        json!({ "scales": { "x": { "display": false }, "y": { "display": false } } }),
    )
}

pub fn secondary_percent_axis() -> OptionLayer {
    OptionLayer::new(
        "secondary-percent-axis",
        json!({
            "scales": {
                "y": { "beginAtZero": true, "position": "left" },
                "y1": {
                    "position": "right",
                    "beginAtZero": true,
                    "min": 0,
                    "max": 100,
                    "grid": { "drawOnChartArea": false },
                    "ticks": { "suffix": "%" }
                }
            }
        }),
    )
}

pub fn title(text: &str) -> OptionLayer {
    OptionLayer::new(
        "title",
        json!({ "plugins": { "title": { "display": !text.is_empty(), "text": text } } }),
    )
}
