use super::options::OptionLayer;
use super::{ChartData, ChartKind};
use eframe::egui;
use serde_json::Value;
use std::collections::BTreeMap;

/// A configured chart occupying one mount.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInstance {
    pub kind: ChartKind,
    pub config: Value,
    pub data: ChartData,
    pub overrides: Vec<OptionLayer>,
    pub painted_rect: Option<egui::Rect>,
}

/// The charting host: named mounts that may each hold one chart.
pub trait ChartHost {
    fn add_mount(&mut self, mount: &str);
    fn has_mount(&self, mount: &str) -> bool;
    fn chart(&self, mount: &str) -> Option<&ChartInstance>;
    fn attach(&mut self, mount: &str, chart: ChartInstance);
    fn destroy(&mut self, mount: &str) -> Option<ChartInstance>;
    fn clear(&mut self);
}

#[derive(Debug, Default)]
pub struct ChartSurface {
    mounts: BTreeMap<String, Option<ChartInstance>>,
}

impl ChartSurface {
    pub fn chart_count(&self) -> usize {
        self.mounts.values().filter(|slot| slot.is_some()).count()
    }

    pub fn record_painted_rect(&mut self, mount: &str, rect: egui::Rect) {
        if let Some(Some(chart)) = self.mounts.get_mut(mount) {
            chart.painted_rect = Some(rect);
        }
    }
}

impl ChartHost for ChartSurface {
    fn add_mount(&mut self, mount: &str) {
        self.mounts.entry(mount.to_string()).or_insert(None);
    }

    fn has_mount(&self, mount: &str) -> bool {
        self.mounts.contains_key(mount)
    }

    fn chart(&self, mount: &str) -> Option<&ChartInstance> {
        self.mounts.get(mount).and_then(Option::as_ref)
    }

    fn attach(&mut self, mount: &str, chart: ChartInstance) {
        if let Some(slot) = self.mounts.get_mut(mount) {
            *slot = Some(chart);
        }
    }

    fn destroy(&mut self, mount: &str) -> Option<ChartInstance> {
        self.mounts.get_mut(mount).and_then(Option::take)
    }

    fn clear(&mut self) {
        self.mounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> ChartInstance {
        ChartInstance {
            kind: ChartKind::Trend,
            config: Value::Null,
            data: ChartData::default(),
            overrides: Vec::new(),
            painted_rect: None,
        }
    }

    #[test]
    fn attach_requires_an_existing_mount() {
        let mut surface = ChartSurface::default();
        surface.attach("missing", instance());
        assert_eq!(surface.chart_count(), 0);

        surface.add_mount("chart");
        surface.attach("chart", instance());
        assert_eq!(surface.chart_count(), 1);
    }

    #[test]
    fn destroy_keeps_the_mount() {
        let mut surface = ChartSurface::default();
        surface.add_mount("chart");
        surface.attach("chart", instance());
        assert!(surface.destroy("chart").is_some());
        assert!(surface.has_mount("chart"));
        assert!(surface.destroy("chart").is_none());
    }
}
