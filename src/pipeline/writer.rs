//! Writer stage: archive appender.
//!
//! The single consumer of the pending-batch queue. Awaits each batch's
//! completion handle, then appends its entries inside one archive
//! transaction, so a crash mid-run leaves the archive valid up to the last
//! committed batch.

use super::batch::PendingBatch;
use super::error::PipelineError;
use crate::archive::{ArchiveMetadata, TileArchive};
use crate::coord::TileCoord;
use crate::telemetry::TelemetryRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Writer-stage settings carved out of the pipeline configuration.
pub(crate) struct WriterOptions {
    pub metadata: ArchiveMetadata,
    pub defer_index_creation: bool,
    pub optimize_db: bool,
    /// Set in the ordered topology: every tile must sort strictly after the
    /// previous one, across batch boundaries.
    pub enforce_order: bool,
}

/// Drains pending batches until the queue closes.
pub(crate) fn write_tiles(
    mut archive: Box<dyn TileArchive>,
    mut rx: mpsc::Receiver<PendingBatch>,
    options: WriterOptions,
    telemetry: Arc<TelemetryRegistry>,
) -> Result<(), PipelineError> {
    archive.setup_schema()?;
    if options.defer_index_creation {
        info!("deferring index creation until after tiles are written");
    } else {
        archive.add_index()?;
    }
    archive.set_metadata(&options.metadata)?;

    let mut last_tile: Option<TileCoord> = None;
    while let Some(pending) = rx.blocking_recv() {
        let entries = match pending.done.blocking_recv() {
            Ok(Ok(entries)) => entries,
            Ok(Err(encode_err)) => return Err(PipelineError::Encode(encode_err)),
            // The sender was dropped without completing; the failing stage
            // reports the root cause.
            Err(_) => {
                return Err(PipelineError::Stage(
                    "batch abandoned before completion".to_string(),
                ))
            }
        };

        let mut writer = archive.batched_writer()?;
        let mut batch_len = 0u64;
        for entry in &entries {
            if options.enforce_order {
                if let Some(prev) = last_tile {
                    if prev >= entry.coord {
                        // Transaction dropped here, so the offending tile and
                        // the rest of its batch never reach the archive.
                        return Err(PipelineError::TileOrder {
                            prev,
                            next: entry.coord,
                        });
                    }
                }
            }
            writer.write(entry.coord, &entry.bytes)?;
            telemetry.tile_written(entry.coord.z());
            last_tile = Some(entry.coord);
            batch_len += 1;
        }
        writer.commit()?;

        telemetry.batch_committed(batch_len);
        if let Some(tile) = last_tile {
            telemetry.set_last_tile(tile);
        }
    }

    if options.defer_index_creation {
        archive.add_index()?;
    }
    if options.optimize_db {
        archive.vacuum_analyze()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::batch::TileBatch;
    use crate::archive::{MbtilesArchive, TilesetInfo};
    use crate::coord::LatLonBounds;
    use crate::pipeline::error::EncodeError;
    use crate::tile::TileEntry;
    use std::sync::Arc;

    fn options(enforce_order: bool) -> WriterOptions {
        WriterOptions {
            metadata: ArchiveMetadata::for_tileset(
                &TilesetInfo::default(),
                &LatLonBounds::WORLD,
                0,
                14,
            ),
            defer_index_creation: false,
            optimize_db: false,
            enforce_order,
        }
    }

    fn entry(x: i32, y: i32, z: u8, byte: u8) -> TileEntry {
        TileEntry {
            coord: TileCoord::of_xyz(x, y, z),
            bytes: vec![byte],
        }
    }

    fn run_writer(
        batches: Vec<Result<Vec<TileEntry>, EncodeError>>,
        enforce_order: bool,
    ) -> (Result<(), PipelineError>, Arc<TelemetryRegistry>) {
        let (tx, rx) = mpsc::channel(100);
        for result in batches {
            let (batch, pending) = TileBatch::new(false);
            batch.done.send(result).ok();
            tx.try_send(pending.unwrap()).unwrap();
        }
        drop(tx);

        let telemetry = Arc::new(TelemetryRegistry::new(14));
        let archive = Box::new(MbtilesArchive::open_in_memory().unwrap());
        let result = write_tiles(archive, rx, options(enforce_order), Arc::clone(&telemetry));
        (result, telemetry)
    }

    #[test]
    fn test_writes_batches_in_queue_order() {
        let (result, telemetry) = run_writer(
            vec![
                Ok(vec![entry(0, 3, 2, 1), entry(1, 0, 2, 2)]),
                Ok(vec![entry(0, 0, 3, 3)]),
            ],
            true,
        );
        result.unwrap();

        assert_eq!(telemetry.tiles_written(), 3);
        assert_eq!(telemetry.tiles_at_zoom(2), 2);
        assert_eq!(telemetry.tiles_at_zoom(3), 1);
        assert_eq!(telemetry.last_tile(), Some(TileCoord::of_xyz(0, 0, 3)));
        assert_eq!(telemetry.take_batch_range(), Some((1, 2)));
    }

    #[test]
    fn test_rejects_out_of_order_tiles() {
        let (result, telemetry) = run_writer(
            vec![Ok(vec![entry(5, 0, 4, 1)]), Ok(vec![entry(2, 0, 4, 2)])],
            true,
        );

        assert!(matches!(result, Err(PipelineError::TileOrder { .. })));
        // The offending tile was rejected before being written.
        assert_eq!(telemetry.tiles_written(), 1);
        assert_eq!(telemetry.last_tile(), Some(TileCoord::of_xyz(5, 0, 4)));
    }

    #[test]
    fn test_unordered_mode_skips_the_order_check() {
        let (result, telemetry) = run_writer(
            vec![Ok(vec![entry(5, 0, 4, 1)]), Ok(vec![entry(2, 0, 4, 2)])],
            false,
        );
        result.unwrap();
        assert_eq!(telemetry.tiles_written(), 2);
    }

    #[test]
    fn test_encode_failure_propagates() {
        let failure = EncodeError::Build {
            coord: TileCoord::of_xyz(0, 0, 0),
            message: "boom".to_string(),
        };
        let (result, telemetry) = run_writer(vec![Err(failure)], true);

        assert!(matches!(result, Err(PipelineError::Encode(_))));
        assert_eq!(telemetry.tiles_written(), 0);
    }

    #[test]
    fn test_abandoned_batch_is_a_stage_failure() {
        let (tx, rx) = mpsc::channel(10);
        let (batch, pending) = TileBatch::new(false);
        tx.try_send(pending.unwrap()).unwrap();
        drop(batch); // Sender dropped without completing.
        drop(tx);

        let telemetry = Arc::new(TelemetryRegistry::new(14));
        let archive = Box::new(MbtilesArchive::open_in_memory().unwrap());
        let result = write_tiles(archive, rx, options(true), telemetry);
        assert!(matches!(result, Err(PipelineError::Stage(_))));
    }

    #[test]
    fn test_empty_queue_still_writes_metadata() {
        let (result, telemetry) = run_writer(Vec::new(), true);
        result.unwrap();
        assert_eq!(telemetry.tiles_written(), 0);
        assert_eq!(telemetry.last_tile(), None);
    }
}
