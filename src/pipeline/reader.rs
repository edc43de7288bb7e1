//! Reader stage: batch former.
//!
//! Consumes the upstream tile stream in order and cuts it into batches
//! bounded by a tile count and an aggregate feature count. Runs on a
//! blocking task; a full downstream queue simply parks it.

use super::batch::{PendingBatch, TileBatch};
use super::error::PipelineError;
use crate::tile::TileFeatures;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Reads every tile from `tiles`, emitting batches into the encoder queue
/// and, when `writer_tx` is present (ordered topology), teeing each batch's
/// pending half into the writer queue in the same step.
///
/// A new batch starts once the current one holds `max_tiles_per_batch`
/// tiles, or when the incoming tile's features would push the batch past
/// `max_features_per_batch`. A tile larger than the feature bound still
/// ships, alone in its own batch.
pub(crate) fn read_features(
    tiles: Box<dyn Iterator<Item = Arc<dyn TileFeatures>> + Send>,
    encoder_tx: mpsc::Sender<TileBatch>,
    writer_tx: Option<mpsc::Sender<PendingBatch>>,
    max_tiles_per_batch: usize,
    max_features_per_batch: u64,
) -> Result<(), PipelineError> {
    let ordered = writer_tx.is_some();
    let mut current_zoom: i16 = -1;
    let (mut batch, mut routed_pending) = TileBatch::new(!ordered);
    let mut features_in_batch: u64 = 0;

    for tile in tiles {
        let zoom = tile.coord().z();
        if i16::from(zoom) > current_zoom {
            info!("starting z{}", zoom);
            current_zoom = i16::from(zoom);
        }

        let tile_features = tile.num_features_to_emit();
        if !batch.is_empty()
            && (batch.len() >= max_tiles_per_batch
                || features_in_batch + tile_features > max_features_per_batch)
        {
            emit(&encoder_tx, &writer_tx, batch, routed_pending)?;
            (batch, routed_pending) = TileBatch::new(!ordered);
            features_in_batch = 0;
        }

        features_in_batch += tile_features;
        batch.tiles.push(tile);
    }

    if !batch.is_empty() {
        emit(&encoder_tx, &writer_tx, batch, routed_pending)?;
    }
    Ok(())
}

fn emit(
    encoder_tx: &mpsc::Sender<TileBatch>,
    writer_tx: &Option<mpsc::Sender<PendingBatch>>,
    batch: TileBatch,
    routed_pending: Option<PendingBatch>,
) -> Result<(), PipelineError> {
    encoder_tx
        .blocking_send(batch)
        .map_err(|_| PipelineError::Stage("encoder queue closed".to_string()))?;
    if let (Some(writer_tx), Some(pending)) = (writer_tx, routed_pending) {
        writer_tx
            .blocking_send(pending)
            .map_err(|_| PipelineError::Stage("writer queue closed".to_string()))?;
    }
    Ok(())
}
