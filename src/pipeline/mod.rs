//! Streaming tile assembly pipeline.
//!
//! A four-stage graph connected by bounded queues:
//!
//! ```text
//! FeatureStore → Reader → Encoder (xN) → Writer → TileArchive
//!                  │                        ▲
//!                  └── pending batches ─────┘   (ordered topology)
//! ```
//!
//! The reader cuts the ordered tile stream into batches. Encoder workers
//! turn each batch into compressed tile bytes and resolve the batch's
//! one-shot completion handle. The writer appends batches to the archive,
//! one transaction per batch.
//!
//! # Topologies
//!
//! With `emit_tiles_in_order` set, the reader tees every batch's completion
//! handle into the writer's queue at emission time, so the writer drains
//! batches in reader order and awaits each one; the archive ends up in
//! strictly ascending tile order no matter how the encoder workers are
//! scheduled. Without it, encoder workers hand completed batches to the
//! writer as they finish, and only within-batch order is guaranteed.
//!
//! # Back-pressure and teardown
//!
//! Every queue is bounded; a full queue parks the producer, an empty one
//! parks the consumer. End of stream is signaled by closing a queue. A fatal
//! error in any stage tears the graph down through closed queues, and the
//! supervisor reports the root cause rather than the teardown fallout.

mod batch;
mod encoder;
mod error;
mod reader;
mod writer;

pub use error::{EncodeError, PipelineError};

use crate::archive::{ArchiveMetadata, TileArchive, TilesetInfo};
use crate::config::PipelineConfig;
use crate::coord::TileExtents;
use crate::telemetry::{last_tile_line, log_zoom_summary, TelemetryRegistry};
use crate::tile::{FeatureStore, PostProcessorRegistry};
use batch::{PendingBatch, TileBatch};
use encoder::EncoderShared;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{self, JoinHandle};
use tracing::info;
use writer::WriterOptions;

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Tiles committed to the archive.
    pub tiles_written: u64,
    /// Source features examined by the encoders.
    pub features_processed: u64,
    /// Tiles whose bytes were replayed from an equal-content neighbor.
    pub memoized_tiles: u64,
}

/// Runs the full pipeline to completion.
///
/// Consumes the store's tile stream, writes every tile to `archive`, and
/// returns the run totals. Fails on the first unrecoverable error in any
/// stage; the archive keeps everything committed before the failure.
pub async fn run_pipeline(
    store: Box<dyn FeatureStore>,
    archive: Box<dyn TileArchive>,
    postprocessors: PostProcessorRegistry,
    tileset: TilesetInfo,
    config: PipelineConfig,
) -> Result<PipelineSummary, PipelineError> {
    let telemetry = Arc::new(TelemetryRegistry::new(config.maxzoom));
    run_pipeline_with_telemetry(store, archive, postprocessors, tileset, config, telemetry).await
}

/// [`run_pipeline`] with a caller-supplied telemetry registry, for embedders
/// that poll progress from their own logger.
pub async fn run_pipeline_with_telemetry(
    store: Box<dyn FeatureStore>,
    archive: Box<dyn TileArchive>,
    postprocessors: PostProcessorRegistry,
    tileset: TilesetInfo,
    config: PipelineConfig,
    telemetry: Arc<TelemetryRegistry>,
) -> Result<PipelineSummary, PipelineError> {
    config.validate()?;

    let total_features = store.num_features();
    let metadata = ArchiveMetadata::for_tileset(
        &tileset,
        &config.lat_lon_bounds,
        config.minzoom,
        config.maxzoom,
    );
    let ordered = config.emit_tiles_in_order;

    let (encoder_tx, encoder_rx) = mpsc::channel::<TileBatch>(config.queue_size);
    let (writer_tx, writer_rx) = mpsc::channel::<PendingBatch>(config.queue_size);
    let encoder_rx = Arc::new(Mutex::new(encoder_rx));

    let reader: JoinHandle<Result<(), PipelineError>> = {
        let tiles = store.into_iter();
        let writer_tx = ordered.then(|| writer_tx.clone());
        let max_tiles = config.max_tiles_per_batch;
        let max_features = config.max_features_per_batch;
        task::spawn_blocking(move || {
            reader::read_features(tiles, encoder_tx, writer_tx, max_tiles, max_features)
        })
    };

    let shared = Arc::new(EncoderShared {
        telemetry: Arc::clone(&telemetry),
        postprocessors: Arc::new(postprocessors),
        memoize: config.memoize_identical_tiles,
        oversized_tile_bytes: config.oversized_tile_bytes,
    });
    let encoders: Vec<JoinHandle<Result<(), PipelineError>>> = (0..config.threads)
        .map(|_| {
            let rx = Arc::clone(&encoder_rx);
            let shared = Arc::clone(&shared);
            let writer_tx = (!ordered).then(|| writer_tx.clone());
            task::spawn_blocking(move || encoder::encode_batches(rx, writer_tx, shared))
        })
        .collect();

    // Only the stages may keep queue ends alive: the writer queue must close
    // when its last sender exits, and the encoder queue's receiver must drop
    // with the last worker so a parked reader wakes up on worker death.
    drop(writer_tx);
    drop(encoder_rx);

    let writer: JoinHandle<Result<(), PipelineError>> = {
        let options = WriterOptions {
            metadata,
            defer_index_creation: config.defer_index_creation,
            optimize_db: config.optimize_db,
            enforce_order: ordered,
        };
        let telemetry = Arc::clone(&telemetry);
        task::spawn_blocking(move || writer::write_tiles(archive, writer_rx, options, telemetry))
    };

    let progress = task::spawn(progress_loop(
        Arc::clone(&telemetry),
        config.extents.clone(),
        config.log_interval,
        total_features,
    ));

    let mut failure: Option<PipelineError> = None;
    let mut secondary: Option<PipelineError> = None;
    let handles = std::iter::once(writer)
        .chain(encoders)
        .chain(std::iter::once(reader));
    for handle in handles {
        let result = handle
            .await
            .unwrap_or_else(|e| Err(PipelineError::Stage(format!("stage panicked: {}", e))));
        if let Err(err) = result {
            if err.is_secondary() {
                secondary.get_or_insert(err);
            } else {
                failure.get_or_insert(err);
            }
        }
    }
    progress.abort();

    if let Some(err) = failure.or(secondary) {
        return Err(err);
    }

    info!(
        features_processed = telemetry.features_processed(),
        features_total = total_features,
        "{}",
        last_tile_line(&telemetry, &config.extents)
    );
    log_zoom_summary(&telemetry, config.minzoom, config.maxzoom);

    Ok(PipelineSummary {
        tiles_written: telemetry.tiles_written(),
        features_processed: telemetry.features_processed(),
        memoized_tiles: telemetry.memoized_tiles(),
    })
}

/// Logs the progress line until aborted.
async fn progress_loop(
    telemetry: Arc<TelemetryRegistry>,
    extents: TileExtents,
    interval: std::time::Duration,
    total_features: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick resolves immediately; skip it so the first line lands
    // one interval into the run.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        info!(
            features_processed = telemetry.features_processed(),
            features_total = total_features,
            "{}",
            last_tile_line(&telemetry, &extents)
        );
    }
}
