//! Archive metadata model.

use crate::coord::LatLonBounds;

/// Descriptive fields the embedding tool supplies for the tileset.
#[derive(Debug, Clone)]
pub struct TilesetInfo {
    pub name: String,
    pub description: String,
    pub attribution: String,
    pub version: String,
    /// Overlay tilesets are meant to be drawn on top of a base layer.
    pub overlay: bool,
    /// Opaque per-layer statistics blob stored under the `json` key.
    pub layer_stats_json: String,
}

impl Default for TilesetInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            attribution: String::new(),
            version: "1".to_string(),
            overlay: false,
            layer_stats_json: "{}".to_string(),
        }
    }
}

/// The full metadata entry set written to the archive, assembled through a
/// builder chain.
#[derive(Debug, Clone, Default)]
pub struct ArchiveMetadata {
    name: String,
    format: String,
    description: String,
    attribution: String,
    version: String,
    kind: String,
    bounds: String,
    center: String,
    minzoom: u8,
    maxzoom: u8,
    json: String,
}

impl ArchiveMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// `baselayer` or `overlay`.
    pub fn overlay(mut self, overlay: bool) -> Self {
        self.kind = if overlay { "overlay" } else { "baselayer" }.to_string();
        self
    }

    /// Records the geographic bounds and the derived center point.
    pub fn bounds_and_center(mut self, bounds: &LatLonBounds, minzoom: u8, maxzoom: u8) -> Self {
        self.bounds = bounds.bounds_string();
        self.center = bounds.center_string(minzoom, maxzoom);
        self
    }

    pub fn minzoom(mut self, minzoom: u8) -> Self {
        self.minzoom = minzoom;
        self
    }

    pub fn maxzoom(mut self, maxzoom: u8) -> Self {
        self.maxzoom = maxzoom;
        self
    }

    pub fn json(mut self, json: impl Into<String>) -> Self {
        self.json = json.into();
        self
    }

    /// The conventional key/value entry set, in a stable order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("format", self.format.clone()),
            ("description", self.description.clone()),
            ("attribution", self.attribution.clone()),
            ("version", self.version.clone()),
            ("type", self.kind.clone()),
            ("bounds", self.bounds.clone()),
            ("center", self.center.clone()),
            ("minzoom", self.minzoom.to_string()),
            ("maxzoom", self.maxzoom.to_string()),
            ("json", self.json.clone()),
        ]
    }

    /// Assembles the full entry set for a tileset over the given coverage.
    pub fn for_tileset(
        info: &TilesetInfo,
        bounds: &LatLonBounds,
        minzoom: u8,
        maxzoom: u8,
    ) -> Self {
        Self::new()
            .name(&info.name)
            .format("pbf")
            .description(&info.description)
            .attribution(&info.attribution)
            .version(&info.version)
            .overlay(info.overlay)
            .bounds_and_center(bounds, minzoom, maxzoom)
            .minzoom(minzoom)
            .maxzoom(maxzoom)
            .json(&info.layer_stats_json)
    }
}
