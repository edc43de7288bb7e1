//! Mbtiles (SQLite) tile archive.
//!
//! Rows are stored under the TMS convention: `tile_row = (2^z - 1) - y`.
//! The connection is owned by a single writer for the duration of a run;
//! pragmas trade crash durability for write throughput, and a clean close
//! flushes everything.

use super::metadata::ArchiveMetadata;
use super::{ArchiveError, BatchedTileWriter, TileArchive};
use crate::coord::TileCoord;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use tracing::debug;

/// A tile archive backed by an mbtiles SQLite database.
pub struct MbtilesArchive {
    conn: Connection,
}

impl MbtilesArchive {
    /// Opens (creating if needed) an archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        Ok(Self { conn })
    }

    /// Opens a throwaway in-memory archive.
    pub fn open_in_memory() -> Result<Self, ArchiveError> {
        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        Ok(Self { conn })
    }

    fn apply_pragmas(conn: &Connection) -> Result<(), ArchiveError> {
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.pragma_update(None, "journal_mode", "MEMORY")?;
        Ok(())
    }

    /// Reads one tile back, undoing the TMS row flip.
    pub fn tile(&self, coord: TileCoord) -> Result<Option<Vec<u8>>, ArchiveError> {
        let bytes = self
            .conn
            .query_row(
                "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                params![coord.z(), coord.x(), coord.tms_y()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes)
    }

    /// Total number of tile rows.
    pub fn tile_count(&self) -> Result<u64, ArchiveError> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All tile rows in insertion order, as (z, x, tms_row).
    pub fn tile_rows(&self) -> Result<Vec<(u8, u32, u32)>, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare("SELECT zoom_level, tile_column, tile_row FROM tiles ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One metadata value by key.
    pub fn metadata_value(&self, name: &str) -> Result<Option<String>, ArchiveError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl TileArchive for MbtilesArchive {
    fn setup_schema(&mut self) -> Result<(), ArchiveError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metadata (name TEXT NOT NULL PRIMARY KEY, value TEXT);
             CREATE TABLE IF NOT EXISTS tiles (
                 zoom_level INTEGER,
                 tile_column INTEGER,
                 tile_row INTEGER,
                 tile_data BLOB
             );",
        )?;
        Ok(())
    }

    fn add_index(&mut self) -> Result<(), ArchiveError> {
        debug!("creating tile index");
        self.conn.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS tile_index
             ON tiles (zoom_level, tile_column, tile_row);",
        )?;
        Ok(())
    }

    fn set_metadata(&mut self, metadata: &ArchiveMetadata) -> Result<(), ArchiveError> {
        let tx = self.conn.transaction()?;
        for (name, value) in metadata.entries() {
            tx.execute(
                "INSERT OR REPLACE INTO metadata (name, value) VALUES (?1, ?2)",
                params![name, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn batched_writer(&mut self) -> Result<Box<dyn BatchedTileWriter + '_>, ArchiveError> {
        let tx = self.conn.transaction()?;
        Ok(Box::new(MbtilesBatchedWriter { tx }))
    }

    fn vacuum_analyze(&mut self) -> Result<(), ArchiveError> {
        debug!("running vacuum/analyze");
        self.conn.execute_batch("VACUUM; ANALYZE;")?;
        Ok(())
    }
}

struct MbtilesBatchedWriter<'conn> {
    tx: Transaction<'conn>,
}

impl BatchedTileWriter for MbtilesBatchedWriter<'_> {
    fn write(&mut self, coord: TileCoord, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.tx
            .prepare_cached(
                "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![coord.z(), coord.x(), coord.tms_y(), bytes])?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), ArchiveError> {
        self.tx.commit()?;
        Ok(())
    }
}
