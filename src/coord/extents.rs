//! Per-zoom tile ranges covered by a run.
//!
//! The writer's progress line reports how far across the current zoom the
//! output has advanced; that needs the column range the run will touch at
//! each zoom, which depends only on the configured geographic bounds.

use super::bounds::LatLonBounds;
use std::f64::consts::PI;

/// A rectangular tile range at one zoom. `max_x`/`max_y` are exclusive, so a
/// non-empty extent always has a positive span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomExtent {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl ZoomExtent {
    /// Number of columns in the extent.
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }
}

/// Tile ranges for every zoom from 0 to the configured maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileExtents {
    by_zoom: Vec<ZoomExtent>,
}

impl TileExtents {
    /// Full-world coverage at every zoom.
    pub fn whole_world(maxzoom: u8) -> Self {
        let by_zoom = (0..=maxzoom)
            .map(|z| {
                let n = 1u32 << z;
                ZoomExtent {
                    min_x: 0,
                    max_x: n,
                    min_y: 0,
                    max_y: n,
                }
            })
            .collect();
        Self { by_zoom }
    }

    /// Coverage derived from a geographic bounding box, widened outward to
    /// whole tiles at each zoom.
    pub fn from_bounds(bounds: &LatLonBounds, maxzoom: u8) -> Self {
        let by_zoom = (0..=maxzoom)
            .map(|z| {
                let n = 1u32 << z;
                let min_x = tile_x(bounds.west, z).floor().clamp(0.0, (n - 1) as f64) as u32;
                let max_x = tile_x(bounds.east, z).ceil().clamp(1.0, n as f64) as u32;
                // North has the smaller row.
                let min_y = tile_y(bounds.north, z).floor().clamp(0.0, (n - 1) as f64) as u32;
                let max_y = tile_y(bounds.south, z).ceil().clamp(1.0, n as f64) as u32;
                ZoomExtent {
                    min_x,
                    max_x: max_x.max(min_x + 1),
                    min_y,
                    max_y: max_y.max(min_y + 1),
                }
            })
            .collect();
        Self { by_zoom }
    }

    /// The extent for one zoom. `z` must not exceed the maxzoom the extents
    /// were built for.
    pub fn for_zoom(&self, z: u8) -> ZoomExtent {
        self.by_zoom[usize::from(z)]
    }

    pub fn maxzoom(&self) -> u8 {
        (self.by_zoom.len() - 1) as u8
    }
}

/// Fractional column of a longitude at a zoom.
fn tile_x(lon: f64, z: u8) -> f64 {
    let n = f64::from(1u32 << z);
    (lon + 180.0) / 360.0 * n
}

/// Fractional row of a latitude at a zoom.
fn tile_y(lat: f64, z: u8) -> f64 {
    let n = f64::from(1u32 << z);
    let lat_rad = lat.to_radians();
    (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n
}
