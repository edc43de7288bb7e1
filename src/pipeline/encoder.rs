//! Encoder stage: parallel tile encoding with adjacent-tile memoization.
//!
//! N workers pull batches off a shared queue. Within a batch, tiles are
//! encoded in input order; when consecutive tiles report equal contents the
//! previous tile's encoded and compressed bytes are replayed instead of
//! rebuilt. The memo is worker-local and the contents handle resets at each
//! batch boundary, so reuse never crosses workers or batches.

use super::batch::{PendingBatch, TileBatch};
use super::error::{EncodeError, PipelineError};
use crate::telemetry::TelemetryRegistry;
use crate::tile::{gzip_compress, PostProcessorRegistry, TileEntry, TileFeatures};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

/// State shared by every encoder worker.
pub(crate) struct EncoderShared {
    pub telemetry: Arc<TelemetryRegistry>,
    pub postprocessors: Arc<PostProcessorRegistry>,
    pub memoize: bool,
    pub oversized_tile_bytes: usize,
}

/// Last-seen trio for one worker: the features handle plus the encoded and
/// compressed bytes it produced.
struct Memo {
    last: Option<Arc<dyn TileFeatures>>,
    encoded: Vec<u8>,
    gzipped: Vec<u8>,
}

/// Worker loop: drains the shared batch queue until it closes.
///
/// Each batch's completion handle is resolved exactly once, with the entries
/// or with the error that killed the batch. In unordered mode the batch's
/// pending half is forwarded to `writer_tx` afterwards so the writer sees
/// the result either way.
pub(crate) fn encode_batches(
    rx: Arc<Mutex<mpsc::Receiver<TileBatch>>>,
    writer_tx: Option<mpsc::Sender<PendingBatch>>,
    shared: Arc<EncoderShared>,
) -> Result<(), PipelineError> {
    let mut memo = Memo {
        last: None,
        encoded: Vec::new(),
        gzipped: Vec::new(),
    };

    loop {
        let batch = { rx.blocking_lock().blocking_recv() };
        let Some(mut batch) = batch else {
            return Ok(());
        };
        let pending = batch.pending.take();

        match encode_batch(&batch.tiles, &mut memo, &shared) {
            Ok(entries) => {
                // The writer may already be gone on teardown; that failure
                // surfaces through its own stage result.
                let _ = batch.done.send(Ok(entries));
                forward(pending, &writer_tx)?;
            }
            Err(err) => {
                let failure = PipelineError::Stage(format!("batch failed to encode: {}", err));
                let _ = batch.done.send(Err(err));
                forward(pending, &writer_tx)?;
                return Err(failure);
            }
        }
    }
}

fn forward(
    pending: Option<PendingBatch>,
    writer_tx: &Option<mpsc::Sender<PendingBatch>>,
) -> Result<(), PipelineError> {
    if let (Some(pending), Some(writer_tx)) = (pending, writer_tx) {
        writer_tx
            .blocking_send(pending)
            .map_err(|_| PipelineError::Stage("writer queue closed".to_string()))?;
    }
    Ok(())
}

/// Encodes one batch, in input order.
fn encode_batch(
    tiles: &[Arc<dyn TileFeatures>],
    memo: &mut Memo,
    shared: &EncoderShared,
) -> Result<Vec<TileEntry>, EncodeError> {
    // Contents equality is only trusted against the immediately preceding
    // tile of the same run; the handle resets at each batch boundary.
    memo.last = None;

    let mut entries = Vec::with_capacity(tiles.len());
    for tile_features in tiles {
        let coord = tile_features.coord();
        shared
            .telemetry
            .add_features_processed(tile_features.num_features_processed());

        let reuse = shared.memoize
            && memo
                .last
                .as_ref()
                .is_some_and(|last| tile_features.has_same_contents(last.as_ref()));

        if reuse {
            shared.telemetry.tile_memoized();
        } else {
            let mut tile = tile_features
                .build_tile()
                .map_err(|e| EncodeError::Build {
                    coord,
                    message: e.message,
                })?;
            shared.postprocessors.apply(coord.z(), &mut tile)?;
            let encoded = tile.encode();
            let gzipped =
                gzip_compress(&encoded).map_err(|source| EncodeError::Compress { coord, source })?;
            if encoded.len() > shared.oversized_tile_bytes {
                warn!("{} {}kb uncompressed", coord, encoded.len() / 1024);
            }
            memo.last = Some(Arc::clone(tile_features));
            memo.encoded = encoded;
            memo.gzipped = gzipped;
        }

        shared
            .telemetry
            .tile_encoded(coord.z(), memo.encoded.len() as u64);
        entries.push(TileEntry {
            coord,
            bytes: memo.gzipped.clone(),
        });
    }
    Ok(entries)
}
