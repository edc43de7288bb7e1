//! Error types for the tile pipeline.
//!
//! Errors are categorized by where they arise so the supervisor can report
//! the root cause rather than the teardown noise that follows it.

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use crate::coord::TileCoord;
use crate::tile::PostProcessError;
use thiserror::Error;

/// Failure while turning one tile's features into compressed bytes.
///
/// Any of these fails the whole batch: no partial batch is ever delivered
/// to the writer.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The upstream store could not assemble the tile.
    #[error("building tile {coord} failed: {message}")]
    Build { coord: TileCoord, message: String },

    /// A registered layer post-processor rejected the tile.
    #[error(transparent)]
    PostProcess(#[from] PostProcessError),

    /// Gzip compression failed.
    #[error("compressing tile {coord} failed: {source}")]
    Compress {
        coord: TileCoord,
        source: std::io::Error,
    },
}

/// Fatal pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A batch failed to encode; observed by the writer on await.
    #[error("tile encoding failed: {0}")]
    Encode(#[from] EncodeError),

    /// Archive schema, write, index, or vacuum failure.
    #[error("tile archive failed: {0}")]
    Archive(#[from] ArchiveError),

    /// Tiles reached the writer out of order. This is a bug in the upstream
    /// store or the pipeline itself and is never recovered.
    #[error("tiles reached the writer out of order: {prev} then {next}")]
    TileOrder { prev: TileCoord, next: TileCoord },

    /// A stage terminated abnormally (closed queue, abandoned batch, panic).
    /// Usually secondary to one of the errors above.
    #[error("pipeline stage failed: {0}")]
    Stage(String),
}

impl PipelineError {
    /// Whether this error is teardown fallout rather than a root cause.
    pub(crate) fn is_secondary(&self) -> bool {
        matches!(self, PipelineError::Stage(_))
    }
}
