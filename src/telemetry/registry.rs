//! Lock-free atomic counters for pipeline progress.
//!
//! All operations use `Relaxed` ordering; the counters are independent
//! measurements and nothing synchronizes through them.

use crate::coord::TileCoord;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "no tile written yet".
const NO_TILE: u64 = u64::MAX;

/// Process-wide counters for one pipeline run.
///
/// Per-zoom tile counts are written by the single writer thread; byte sums
/// and max watermarks are written by every encoder worker; all of them may
/// be read concurrently by a progress logger.
pub struct TelemetryRegistry {
    maxzoom: u8,
    tiles_by_zoom: Vec<AtomicU64>,
    tile_bytes_by_zoom: Vec<AtomicU64>,
    max_tile_bytes_by_zoom: Vec<AtomicU64>,
    features_processed: AtomicU64,
    memoized_tiles: AtomicU64,
    /// Packed coord of the last tile committed, or [`NO_TILE`].
    last_tile_written: AtomicU64,
    /// Smallest batch committed since the last poll; reset to MAX on poll.
    min_batch_len: AtomicU64,
    /// Largest batch committed since the last poll; reset to 0 on poll.
    max_batch_len: AtomicU64,
}

/// Per-zoom roll-up for the shutdown summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomSummary {
    pub zoom: u8,
    pub tiles: u64,
    pub total_bytes: u64,
    pub max_bytes: u64,
}

impl ZoomSummary {
    /// Mean encoded size, zero when no tiles were written at this zoom.
    pub fn avg_bytes(&self) -> u64 {
        self.total_bytes / self.tiles.max(1)
    }
}

impl TelemetryRegistry {
    pub fn new(maxzoom: u8) -> Self {
        let zooms = usize::from(maxzoom) + 1;
        Self {
            maxzoom,
            tiles_by_zoom: (0..zooms).map(|_| AtomicU64::new(0)).collect(),
            tile_bytes_by_zoom: (0..zooms).map(|_| AtomicU64::new(0)).collect(),
            max_tile_bytes_by_zoom: (0..zooms).map(|_| AtomicU64::new(0)).collect(),
            features_processed: AtomicU64::new(0),
            memoized_tiles: AtomicU64::new(0),
            last_tile_written: AtomicU64::new(NO_TILE),
            min_batch_len: AtomicU64::new(u64::MAX),
            max_batch_len: AtomicU64::new(0),
        }
    }

    pub fn maxzoom(&self) -> u8 {
        self.maxzoom
    }

    // === Encoder-side ===

    /// Record source features examined while building tiles.
    pub fn add_features_processed(&self, count: u64) {
        self.features_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a tile whose bytes were replayed from the previous tile.
    pub fn tile_memoized(&self) {
        self.memoized_tiles.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one tile's uncompressed encoded size at a zoom.
    pub fn tile_encoded(&self, zoom: u8, encoded_len: u64) {
        let z = usize::from(zoom);
        self.tile_bytes_by_zoom[z].fetch_add(encoded_len, Ordering::Relaxed);
        self.max_tile_bytes_by_zoom[z].fetch_max(encoded_len, Ordering::Relaxed);
    }

    // === Writer-side ===

    /// Record one tile committed to the archive.
    pub fn tile_written(&self, zoom: u8) {
        self.tiles_by_zoom[usize::from(zoom)].fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the most recently committed tile.
    pub fn set_last_tile(&self, coord: TileCoord) {
        self.last_tile_written
            .store(u64::from(coord.encoded()), Ordering::Relaxed);
    }

    /// Record a committed batch's length for the min/max range.
    pub fn batch_committed(&self, len: u64) {
        self.min_batch_len.fetch_min(len, Ordering::Relaxed);
        self.max_batch_len.fetch_max(len, Ordering::Relaxed);
    }

    // === Reader-side (progress logger) ===

    /// The most recently committed tile, if any.
    pub fn last_tile(&self) -> Option<TileCoord> {
        match self.last_tile_written.load(Ordering::Relaxed) {
            NO_TILE => None,
            encoded => Some(TileCoord::decode(encoded as u32)),
        }
    }

    /// Takes the (min, max) batch-length range accumulated since the last
    /// poll, resetting the accumulators. `None` when no batch completed.
    pub fn take_batch_range(&self) -> Option<(u64, u64)> {
        let min = self.min_batch_len.swap(u64::MAX, Ordering::Relaxed);
        let max = self.max_batch_len.swap(0, Ordering::Relaxed);
        if min > max {
            None
        } else {
            Some((min, max))
        }
    }

    pub fn features_processed(&self) -> u64 {
        self.features_processed.load(Ordering::Relaxed)
    }

    pub fn memoized_tiles(&self) -> u64 {
        self.memoized_tiles.load(Ordering::Relaxed)
    }

    pub fn tiles_at_zoom(&self, zoom: u8) -> u64 {
        self.tiles_by_zoom[usize::from(zoom)].load(Ordering::Relaxed)
    }

    /// Total tiles committed across all zooms.
    pub fn tiles_written(&self) -> u64 {
        self.tiles_by_zoom
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Per-zoom roll-ups for `minzoom..=maxzoom`.
    pub fn zoom_summaries(&self, minzoom: u8, maxzoom: u8) -> Vec<ZoomSummary> {
        (minzoom..=maxzoom.min(self.maxzoom))
            .map(|zoom| {
                let z = usize::from(zoom);
                ZoomSummary {
                    zoom,
                    tiles: self.tiles_by_zoom[z].load(Ordering::Relaxed),
                    total_bytes: self.tile_bytes_by_zoom[z].load(Ordering::Relaxed),
                    max_bytes: self.max_tile_bytes_by_zoom[z].load(Ordering::Relaxed),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_bytes_accumulate_per_zoom() {
        let registry = TelemetryRegistry::new(14);

        registry.tile_encoded(5, 100);
        registry.tile_encoded(5, 300);
        registry.tile_encoded(6, 50);

        let summaries = registry.zoom_summaries(5, 6);
        assert_eq!(summaries[0].total_bytes, 400);
        assert_eq!(summaries[0].max_bytes, 300);
        assert_eq!(summaries[1].total_bytes, 50);
    }

    #[test]
    fn test_max_watermark_is_monotonic() {
        let registry = TelemetryRegistry::new(14);

        registry.tile_encoded(3, 500);
        registry.tile_encoded(3, 100);

        assert_eq!(registry.zoom_summaries(3, 3)[0].max_bytes, 500);
    }

    #[test]
    fn test_tiles_written_sums_zooms() {
        let registry = TelemetryRegistry::new(14);

        registry.tile_written(0);
        registry.tile_written(7);
        registry.tile_written(7);

        assert_eq!(registry.tiles_at_zoom(7), 2);
        assert_eq!(registry.tiles_written(), 3);
    }

    #[test]
    fn test_last_tile_starts_empty() {
        let registry = TelemetryRegistry::new(14);
        assert_eq!(registry.last_tile(), None);

        let coord = TileCoord::of_xyz(4, 2, 3);
        registry.set_last_tile(coord);
        assert_eq!(registry.last_tile(), Some(coord));
    }

    #[test]
    fn test_batch_range_resets_on_poll() {
        let registry = TelemetryRegistry::new(14);
        assert_eq!(registry.take_batch_range(), None);

        registry.batch_committed(10);
        registry.batch_committed(3);
        registry.batch_committed(25);

        assert_eq!(registry.take_batch_range(), Some((3, 25)));
        assert_eq!(registry.take_batch_range(), None);
    }

    #[test]
    fn test_avg_bytes_handles_empty_zoom() {
        let summary = ZoomSummary {
            zoom: 4,
            tiles: 0,
            total_bytes: 0,
            max_bytes: 0,
        };
        assert_eq!(summary.avg_bytes(), 0);
    }
}
