//! Pipeline configuration.
//!
//! Everything the embedding tool can tune lives here; `validate` rejects
//! combinations the pipeline cannot honor before any work starts.

use crate::coord::{self, LatLonBounds, TileExtents};
use std::time::Duration;
use thiserror::Error;

/// Default upper bound on tiles per batch.
pub const DEFAULT_MAX_TILES_PER_BATCH: usize = 1_000;
/// Default upper bound on aggregate features per batch.
pub const DEFAULT_MAX_FEATURES_PER_BATCH: u64 = 10_000;
/// Default capacity of each inter-stage queue, in batches.
pub const DEFAULT_QUEUE_SIZE: usize = 5_000;
/// Default uncompressed size above which a tile is logged as oversized.
pub const DEFAULT_OVERSIZED_TILE_BYTES: usize = 1_000_000;

/// Errors raised by [`PipelineConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maxzoom {0} exceeds the supported maximum of {max}", max = coord::MAX_ZOOM)]
    ZoomTooDeep(u8),

    #[error("minzoom {minzoom} exceeds maxzoom {maxzoom}")]
    ZoomRangeInverted { minzoom: u8, maxzoom: u8 },

    #[error("at least one encoder thread is required")]
    NoThreads,

    #[error("batch bounds must be positive")]
    EmptyBatchBound,

    #[error("queue size must be positive")]
    EmptyQueue,

    #[error("extents cover zooms up to {extents_maxzoom}, but maxzoom is {maxzoom}")]
    ExtentsTooShallow { extents_maxzoom: u8, maxzoom: u8 },
}

/// Tunables for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lowest zoom written to the archive.
    pub minzoom: u8,
    /// Highest zoom written to the archive, at most [`coord::MAX_ZOOM`].
    pub maxzoom: u8,
    /// Number of encoder workers.
    pub threads: usize,
    /// When true, the writer drains batches in reader-emission order and the
    /// archive is written in strictly ascending tile order.
    pub emit_tiles_in_order: bool,
    /// Delay archive index creation until after all tiles are written.
    pub defer_index_creation: bool,
    /// Run vacuum/analyze on the archive before closing it.
    pub optimize_db: bool,
    /// Per-zoom tile ranges the run covers, for progress reporting.
    pub extents: TileExtents,
    /// Geographic bounds recorded in the archive metadata.
    pub lat_lon_bounds: LatLonBounds,
    /// How often the progress line is logged.
    pub log_interval: Duration,
    /// Capacity of each inter-stage queue, in batches.
    pub queue_size: usize,
    /// Maximum tiles per batch.
    pub max_tiles_per_batch: usize,
    /// Maximum aggregate features per batch.
    pub max_features_per_batch: u64,
    /// Uncompressed tile size above which a warning is logged.
    pub oversized_tile_bytes: usize,
    /// Reuse the previous tile's bytes when adjacent tiles have equal
    /// contents. Disable when the upstream store cannot guarantee that
    /// equal-content tiles build byte-identical encodings.
    pub memoize_identical_tiles: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            minzoom: 0,
            maxzoom: coord::MAX_ZOOM,
            threads: 1,
            emit_tiles_in_order: true,
            defer_index_creation: false,
            optimize_db: false,
            extents: TileExtents::whole_world(coord::MAX_ZOOM),
            lat_lon_bounds: LatLonBounds::WORLD,
            log_interval: Duration::from_secs(10),
            queue_size: DEFAULT_QUEUE_SIZE,
            max_tiles_per_batch: DEFAULT_MAX_TILES_PER_BATCH,
            max_features_per_batch: DEFAULT_MAX_FEATURES_PER_BATCH,
            oversized_tile_bytes: DEFAULT_OVERSIZED_TILE_BYTES,
            memoize_identical_tiles: true,
        }
    }
}

impl PipelineConfig {
    /// Configuration covering a geographic box: bounds, extents and zoom
    /// range in one step.
    pub fn for_bounds(bounds: LatLonBounds, minzoom: u8, maxzoom: u8) -> Self {
        Self {
            minzoom,
            maxzoom,
            extents: TileExtents::from_bounds(&bounds, maxzoom),
            lat_lon_bounds: bounds,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maxzoom > coord::MAX_ZOOM {
            return Err(ConfigError::ZoomTooDeep(self.maxzoom));
        }
        if self.minzoom > self.maxzoom {
            return Err(ConfigError::ZoomRangeInverted {
                minzoom: self.minzoom,
                maxzoom: self.maxzoom,
            });
        }
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.max_tiles_per_batch == 0 || self.max_features_per_batch == 0 {
            return Err(ConfigError::EmptyBatchBound);
        }
        if self.queue_size == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        if self.extents.maxzoom() < self.maxzoom {
            return Err(ConfigError::ExtentsTooShallow {
                extents_maxzoom: self.extents.maxzoom(),
                maxzoom: self.maxzoom,
            });
        }
        Ok(())
    }
}
