use serde::{Deserialize, Serialize};

/// Default line palette, cycled by series index.
pub const LINE_COLORS: [&str; 9] = [
    "#F1C232", "#1259f8", "#cb4b4b", "#4da74d", "#9440ed", "#61e0ed", "#ed6d2c", "#ed13c6",
    "#bbed59",
];

/// Series color as supplied by the host: a literal CSS color or a palette slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesColor {
    Named(String),
    Palette(usize),
}

/// Host-supplied series description.
///
/// `key` is the series identity: two specs with the same key are the same
/// series, even if other fields changed between updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSpec {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub y_key: Option<String>,
    #[serde(default)]
    pub color: Option<SeriesColor>,
    /// Preferred sub-chart index. Series without one land in graph `0`.
    #[serde(default)]
    pub graph: Option<usize>,
}

impl SeriesSpec {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            y_key: None,
            color: None,
            graph: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_y_key(mut self, y_key: impl Into<String>) -> Self {
        self.y_key = Some(y_key.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: SeriesColor) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub fn with_graph(mut self, graph: usize) -> Self {
        self.graph = Some(graph);
        self
    }
}

/// Series as handed to one sub-chart of a multigraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultigraphSeries {
    pub key: String,
    pub name: String,
    pub color: String,
    pub multigrapher_series_index: usize,
    pub multigrapher_graph_index: usize,
    pub axis_index: Option<usize>,
}

impl MultigraphSeries {
    #[must_use]
    pub fn decorate(
        spec: &SeriesSpec,
        series_index: usize,
        graph_index: usize,
        axis_index: Option<usize>,
    ) -> Self {
        Self {
            key: spec.key.clone(),
            name: resolve_series_name(spec, series_index),
            color: resolve_series_color(spec.color.as_ref(), series_index),
            multigrapher_series_index: series_index,
            multigrapher_graph_index: graph_index,
            axis_index,
        }
    }
}

#[must_use]
pub fn resolve_series_color(color: Option<&SeriesColor>, series_index: usize) -> String {
    match color {
        Some(SeriesColor::Named(named)) => named.clone(),
        Some(SeriesColor::Palette(slot)) => LINE_COLORS[slot % LINE_COLORS.len()].to_owned(),
        None => LINE_COLORS[series_index % LINE_COLORS.len()].to_owned(),
    }
}

#[must_use]
pub fn resolve_series_name(spec: &SeriesSpec, series_index: usize) -> String {
    spec.name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| spec.y_key.as_deref().filter(|y_key| !y_key.is_empty()))
        .map_or_else(|| series_index.to_string(), str::to_owned)
}
