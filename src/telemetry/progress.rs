//! Progress line and shutdown summary.

use super::format::{format_integer, format_storage};
use super::registry::TelemetryRegistry;
use crate::coord::TileExtents;
use tracing::debug;

/// Builds the periodic "last tile" line.
///
/// Shape: `last tile: z/x/y (zZ P%) batch sizes: MIN-MAX URL` where `P` is
/// how far across the zoom's column extent the writer has advanced, and the
/// URL is an openstreetmap.org deep link for eyeballing the area. Before the
/// first committed tile the line reads `last tile: n/a`.
///
/// Polling consumes the batch-size range accumulated since the last call.
pub fn last_tile_line(registry: &TelemetryRegistry, extents: &TileExtents) -> String {
    let batch_range = match registry.take_batch_range() {
        Some((min, max)) => format!("{}-{}", min, max),
        None => "-".to_string(),
    };
    match registry.last_tile() {
        None => "last tile: n/a".to_string(),
        Some(coord) => {
            let extent = extents.for_zoom(coord.z());
            let advanced = u64::from(coord.x() + 1).saturating_sub(u64::from(extent.min_x));
            let percent = (100 * advanced) / u64::from(extent.width());
            format!(
                "last tile: {}/{}/{} (z{} {}%) batch sizes: {} {}",
                coord.z(),
                coord.x(),
                coord.y(),
                coord.z(),
                percent,
                batch_range,
                coord.osm_debug_url()
            )
        }
    }
}

/// Logs the per-zoom size summary and run totals at shutdown.
pub fn log_zoom_summary(registry: &TelemetryRegistry, minzoom: u8, maxzoom: u8) {
    debug!("tile stats:");
    let summaries = registry.zoom_summaries(minzoom, maxzoom);
    let mut sum_bytes = 0u64;
    let mut sum_tiles = 0u64;
    let mut max_max = 0u64;
    for summary in &summaries {
        sum_bytes += summary.total_bytes;
        sum_tiles += summary.tiles;
        max_max = max_max.max(summary.max_bytes);
        debug!(
            "z{} avg:{} max:{}",
            summary.zoom,
            format_storage(summary.avg_bytes()),
            format_storage(summary.max_bytes)
        );
    }
    debug!(
        "all avg:{} max:{}",
        format_storage(sum_bytes / sum_tiles.max(1)),
        format_storage(max_max)
    );
    debug!(" # features: {}", format_integer(registry.features_processed()));
    debug!("    # tiles: {}", format_integer(registry.tiles_written()));
}
