//! Tile archive abstraction and the mbtiles implementation.
//!
//! The writer stage talks to the archive through [`TileArchive`] so the
//! storage backend stays swappable; [`MbtilesArchive`] is the production
//! implementation. Each batch of tiles is appended through a scoped
//! [`BatchedTileWriter`] that maps to one database transaction: dropping the
//! writer without committing rolls the batch back.

mod mbtiles;
mod metadata;

pub use mbtiles::MbtilesArchive;
pub use metadata::{ArchiveMetadata, TilesetInfo};

use crate::coord::TileCoord;
use thiserror::Error;

/// Errors raised by archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("archive i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A scoped, transactional appender for one batch of tiles.
pub trait BatchedTileWriter {
    /// Appends one tile. Rows are stored under the TMS row convention.
    fn write(&mut self, coord: TileCoord, bytes: &[u8]) -> Result<(), ArchiveError>;

    /// Commits the batch. Dropping the writer without committing discards
    /// every tile written through it.
    fn commit(self: Box<Self>) -> Result<(), ArchiveError>;
}

/// The operations the writer stage needs from a tile archive.
pub trait TileArchive: Send {
    /// Creates tables. Must be called before any other operation.
    fn setup_schema(&mut self) -> Result<(), ArchiveError>;

    /// Creates the tile lookup index. May be called before the first write
    /// or deferred until after the last one.
    fn add_index(&mut self) -> Result<(), ArchiveError>;

    /// Persists the archive's metadata entries.
    fn set_metadata(&mut self, metadata: &ArchiveMetadata) -> Result<(), ArchiveError>;

    /// Opens a transactional writer for one batch.
    fn batched_writer(&mut self) -> Result<Box<dyn BatchedTileWriter + '_>, ArchiveError>;

    /// Reclaims space and refreshes query planner statistics.
    fn vacuum_analyze(&mut self) -> Result<(), ArchiveError>;
}
